//! Execution strategy selection
//!
//! Statement class × resource strategy → execution path. Pure, no side effects.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shape of a routed statement, assigned by the parsing/routing layer before execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementClass {
    Query,
    Update,
    /// May or may not produce a result set (DDL, procedure calls, ...)
    Generic,
}

/// Memory/connection tradeoff for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResourceStrategy {
    /// Stream rows from a live backend cursor; the connection stays busy until released
    #[default]
    #[serde(rename = "MEMORY_STRICTLY", alias = "memory_strict", alias = "memory")]
    MemoryStrict,
    /// Materialize the whole result in proxy memory and release the connection at once
    #[serde(rename = "CONNECTION_STRICTLY", alias = "connection_strict", alias = "connection")]
    ConnectionStrict,
}

impl FromStr for ResourceStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory_strictly" | "memory_strict" | "memory" => Ok(Self::MemoryStrict),
            "connection_strictly" | "connection_strict" | "connection" => {
                Ok(Self::ConnectionStrict)
            }
            other => Err(format!("Unknown resource strategy: {other}")),
        }
    }
}

impl fmt::Display for ResourceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryStrict => write!(f, "MEMORY_STRICTLY"),
            Self::ConnectionStrict => write!(f, "CONNECTION_STRICTLY"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionPath {
    StreamingQuery,
    BufferingQuery,
    Update,
    Generic,
}

impl ExecutionPath {
    /// Only queries depend on the resource strategy
    #[must_use]
    pub const fn select(class: StatementClass, strategy: ResourceStrategy) -> Self {
        match (class, strategy) {
            (StatementClass::Query, ResourceStrategy::MemoryStrict) => Self::StreamingQuery,
            (StatementClass::Query, ResourceStrategy::ConnectionStrict) => Self::BufferingQuery,
            (StatementClass::Update, _) => Self::Update,
            (StatementClass::Generic, _) => Self::Generic,
        }
    }
}
