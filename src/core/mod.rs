// Module declarations
pub mod error;
pub mod value;
pub mod data_type;
pub mod column;

// Re-exports for convenience
pub use error::{BackendError, ProxyError};
pub use value::Value;
pub use data_type::ColumnType;
pub use column::{ColumnMetadata, ResultMetadata};
