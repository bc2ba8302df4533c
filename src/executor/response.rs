use super::resource_tracker::{CursorToken, ResourceTracker};
use super::row_buffer::RowBuffer;
use crate::core::{ProxyError, Value};
use crate::protocol::{HeaderDescription, OkPacket, TextResultRowPacket};

/// Where the rows of a query response come from
#[derive(Debug)]
pub enum RowSource {
    /// Live cursor held by the resource tracker
    Streaming(CursorToken),
    /// Result fully copied into proxy memory
    Buffered(RowBuffer),
}

impl RowSource {
    /// Next row, `None` once the source is exhausted.
    ///
    /// Exhaustion does not release a streaming cursor; that stays with the session manager.
    pub fn next_row(
        &mut self,
        tracker: &mut ResourceTracker,
        column_count: usize,
    ) -> Result<Option<Vec<Value>>, ProxyError> {
        match self {
            Self::Streaming(token) => tracker.fetch(*token),
            Self::Buffered(buffer) => Ok(buffer.next_row(column_count).map(<[Value]>::to_vec)),
        }
    }

    #[must_use]
    pub const fn token(&self) -> Option<CursorToken> {
        match self {
            Self::Streaming(token) => Some(*token),
            Self::Buffered(_) => None,
        }
    }
}

/// Header description paired with its row source
#[derive(Debug)]
pub struct QueryResponse {
    pub header: HeaderDescription,
    pub rows: RowSource,
    next_sequence_id: u8,
}

impl QueryResponse {
    #[must_use]
    pub fn new(header: HeaderDescription, rows: RowSource) -> Self {
        let next_sequence_id = header.next_sequence_id();
        Self { header, rows, next_sequence_id }
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.header.column_count()
    }

    /// Next row as a text protocol packet, sequence ids continuing after the header
    pub fn next_packet(
        &mut self,
        tracker: &mut ResourceTracker,
    ) -> Result<Option<TextResultRowPacket>, ProxyError> {
        let column_count = self.column_count();
        let Some(row) = self.rows.next_row(tracker, column_count)? else {
            return Ok(None);
        };
        let sequence_id = self.next_sequence_id;
        self.next_sequence_id = self.next_sequence_id.wrapping_add(1);
        Ok(Some(TextResultRowPacket {
            sequence_id,
            values: row.iter().map(Value::to_text_bytes).collect(),
        }))
    }
}

/// Uniform outcome of one execution: a result header or an acknowledgement, never both
#[derive(Debug)]
pub enum ExecuteResponse {
    Query(QueryResponse),
    Update(OkPacket),
}

impl ExecuteResponse {
    #[must_use]
    pub fn query(header: HeaderDescription, rows: RowSource) -> Self {
        Self::Query(QueryResponse::new(header, rows))
    }

    #[must_use]
    pub const fn as_query(&self) -> Option<&QueryResponse> {
        match self {
            Self::Query(query) => Some(query),
            Self::Update(_) => None,
        }
    }

    #[must_use]
    pub const fn as_update(&self) -> Option<&OkPacket> {
        match self {
            Self::Update(ok) => Some(ok),
            Self::Query(_) => None,
        }
    }
}
