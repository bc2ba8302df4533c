//! Executor module - runs routed statements against a backend
//!
//! Structure:
//! - strategy: statement class × resource strategy → execution path
//! - row_buffer: in-memory copy of a drained result (connection-strict queries)
//! - resource_tracker: live cursors kept open across client round-trips (memory-strict queries)
//! - response: uniform query/acknowledgement response and row sources
//! - worker: the execute worker driving the four execution paths

pub mod strategy;
pub mod row_buffer;
pub mod resource_tracker;
pub mod response;
pub mod worker;

pub use strategy::{ExecutionPath, ResourceStrategy, StatementClass};
pub use row_buffer::RowBuffer;
pub use resource_tracker::{ContextId, CursorToken, ResourceTracker};
pub use response::{ExecuteResponse, QueryResponse, RowSource};
pub use worker::{ExecuteWorker, ExecutionRequest};
