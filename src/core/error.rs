use thiserror::Error;

use crate::executor::CursorToken;

/// Native error reported by a backend data source.
///
/// Carries the driver's vendor code, SQL state and message untouched; translating
/// them into client error packets is the protocol layer's job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{code}] {sql_state}: {message}")]
pub struct BackendError {
    pub code: i32,
    pub sql_state: String,
    pub message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(code: i32, sql_state: &str, message: &str) -> Self {
        Self {
            code,
            sql_state: sql_state.to_string(),
            message: message.to_string(),
        }
    }

    /// Error raised when an operation hits an already closed statement or cursor
    #[must_use]
    pub fn closed(what: &str) -> Self {
        Self::new(0, "HY010", &format!("{what} is closed"))
    }
}

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Backend execution error: {0}")]
    BackendExecution(#[from] BackendError),
    #[error("Cursor {0} is not tracked")]
    UnknownCursor(CursorToken),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Fixture error: {0}")]
    Fixture(#[from] serde_json::Error),
}
