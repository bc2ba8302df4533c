// Shardexec - backend execution core of a database-sharding proxy
// Runs routed SQL against a backend and turns the outcome into MySQL response packets

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::multiple_crate_versions)]

// Core structures (values, column metadata, errors)
pub mod core;

// Backend driver capability + scripted in-memory backend
pub mod backend;

// Execution core (strategy selection, row buffer, resource tracker, execute worker)
pub mod executor;

// Response packets (header description, acknowledgement, rows)
pub mod protocol;

// Configuration (file + ENV)
pub mod config;

// Re-export commonly used types for convenience
pub use crate::core::{BackendError, ColumnMetadata, ColumnType, ProxyError, ResultMetadata, Value};
pub use crate::backend::{
    BackendCursor, BackendStatement, FetchMode, GeneratedKeys, MemoryBackend, Script,
};
pub use crate::executor::{
    ContextId, CursorToken, ExecuteResponse, ExecuteWorker, ExecutionPath, ExecutionRequest,
    QueryResponse, ResourceStrategy, ResourceTracker, RowBuffer, RowSource, StatementClass,
};
pub use crate::protocol::{build_acknowledgement, build_header, HeaderDescription, OkPacket};
pub use crate::config::ProxyConfig;
