use serde::{Deserialize, Serialize};
use super::data_type::ColumnType;

/// Per-column descriptor as reported by the backend's result metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnMetadata {
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub table: String,
    pub name: String,
    /// Alias from the select list, falls back to `name`
    #[serde(default)]
    pub label: Option<String>,
    pub column_type: ColumnType,
    #[serde(default = "default_column_length")]
    pub column_length: u32,
    #[serde(default)]
    pub decimals: u8,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

const fn default_column_length() -> u32 {
    255
}

const fn default_nullable() -> bool {
    true
}

impl ColumnMetadata {
    #[must_use]
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            schema: String::new(),
            table: String::new(),
            name: name.to_string(),
            label: None,
            column_type,
            column_length: default_column_length(),
            decimals: 0,
            nullable: default_nullable(),
        }
    }

    #[must_use]
    pub fn with_table(mut self, schema: &str, table: &str) -> Self {
        self.schema = schema.to_string();
        self.table = table.to_string();
        self
    }

    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Ordered column list of a result set
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ResultMetadata {
    pub columns: Vec<ColumnMetadata>,
}

impl ResultMetadata {
    #[must_use]
    pub const fn new(columns: Vec<ColumnMetadata>) -> Self {
        Self { columns }
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}
