use serde::{Deserialize, Serialize};

/// Column type as exposed by backend result metadata.
///
/// `mysql_type` gives the protocol type code written into column definitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    // Numeric types
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    Decimal,
    // String types
    Varchar,
    Char,
    Text,
    // Date/Time types
    Date,
    Timestamp,
    DateTime,
    // Special types
    Json,
    Blob,
    Null,
}

impl ColumnType {
    #[must_use]
    pub const fn mysql_type(self) -> u8 {
        match self {
            Self::TinyInt => 0x01,
            Self::SmallInt => 0x02,
            Self::Integer => 0x03,
            Self::Float => 0x04,
            Self::Double => 0x05,
            Self::Null => 0x06,
            Self::Timestamp => 0x07,
            Self::BigInt => 0x08,
            Self::Date => 0x0a,
            Self::DateTime => 0x0c,
            Self::Varchar => 0x0f,
            Self::Json => 0xf5,
            Self::Decimal => 0xf6,
            Self::Blob => 0xfc,
            Self::Text => 0xfd,
            Self::Char => 0xfe,
        }
    }
}
