use crate::core::Value;

/// In-memory copy of a fully drained result.
///
/// Values are flattened row by row (row0col0, row0col1, ..., row1col0, ...). Replay is an
/// index into the immutable value list, so reset and exhaustion are plain range checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowBuffer {
    values: Vec<Value>,
    position: usize,
}

impl RowBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one backend row, columns in order
    pub fn push_row(&mut self, row: Vec<Value>) {
        self.values.extend(row);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.values.len()
    }

    pub fn next_value(&mut self) -> Option<&Value> {
        let value = self.values.get(self.position)?;
        self.position += 1;
        Some(value)
    }

    /// Next `width` values as one row; `None` when fewer than `width` remain
    pub fn next_row(&mut self, width: usize) -> Option<&[Value]> {
        if width == 0 {
            return None;
        }
        let end = self.position.checked_add(width)?;
        let row = self.values.get(self.position..end)?;
        self.position = end;
        Some(row)
    }
}
