//! Backend driver capability
//!
//! The execution core talks to a physical data source only through these two traits.
//! A real deployment wires them to a database driver; `memory` provides a scripted
//! implementation for tests and the command-line harness.
pub mod memory;

use crate::core::{BackendError, ResultMetadata, Value};

pub use memory::{MemoryBackend, Script};

pub type BackendResult<T> = Result<T, BackendError>;

/// Cursor fetch behaviour requested before a query is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Driver default, may prefetch or fully materialize the result
    #[default]
    Default,
    /// Forward-only cursor that pulls a single row per fetch
    RowByRow,
}

/// Whether an update should also report the keys it generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedKeys {
    Return,
    NoReturn,
}

/// A live handle over an in-progress result set
pub trait BackendCursor: Send {
    /// Column count and per-column descriptors, in backend order
    fn metadata(&self) -> BackendResult<ResultMetadata>;

    /// Advances to the next row and returns its values, `None` once exhausted
    fn fetch(&mut self) -> BackendResult<Option<Vec<Value>>>;

    /// Closing twice is a no-op
    fn close(&mut self) -> BackendResult<()>;

    fn is_closed(&self) -> bool;
}

/// A prepared statement bound to one backend connection.
///
/// Closing the statement releases the connection it holds, per the driver's ownership contract.
pub trait BackendStatement: Send {
    fn set_fetch_mode(&mut self, mode: FetchMode) -> BackendResult<()>;

    fn execute_query(&mut self, sql: &str) -> BackendResult<Box<dyn BackendCursor>>;

    /// Returns the number of affected rows
    fn execute_update(&mut self, sql: &str, keys: GeneratedKeys) -> BackendResult<u64>;

    /// Executes a statement of unknown shape, `true` when it produced a result set
    fn execute(&mut self, sql: &str) -> BackendResult<bool>;

    /// Hands over the result set produced by the last `execute`
    fn result_set(&mut self) -> BackendResult<Option<Box<dyn BackendCursor>>>;

    /// Update count of the last `execute` that produced no result set
    fn update_count(&self) -> BackendResult<u64>;

    /// Keys generated by the last `execute_update` that asked for them
    fn generated_keys(&mut self) -> BackendResult<Box<dyn BackendCursor>>;

    /// Closing twice is a no-op
    fn close(&mut self) -> BackendResult<()>;

    fn is_closed(&self) -> bool;
}
