//! Execute worker
//!
//! Runs one routed statement against its backend statement handle along the path picked by
//! `ExecutionPath::select`, and turns the outcome into an `ExecuteResponse`.
//!
//! Cleanup contract:
//! - streaming queries hand cursor + statement to the resource tracker;
//! - every other path closes what it opened before returning;
//! - on failure, whatever the path opened is closed before the error propagates.
use tracing::{debug, warn};

use super::resource_tracker::{ContextId, ResourceTracker};
use super::response::{ExecuteResponse, RowSource};
use super::row_buffer::RowBuffer;
use super::strategy::{ExecutionPath, ResourceStrategy, StatementClass};
use crate::backend::{BackendCursor, BackendResult, BackendStatement, FetchMode, GeneratedKeys};
use crate::core::{BackendError, ProxyError, ResultMetadata};
use crate::protocol::{build_acknowledgement, build_header};

/// One routed statement ready to run, owning its prepared backend statement
pub struct ExecutionRequest {
    pub sql: String,
    pub class: StatementClass,
    pub strategy: ResourceStrategy,
    pub return_generated_keys: bool,
    pub statement: Box<dyn BackendStatement>,
}

impl ExecutionRequest {
    pub fn new(sql: &str, class: StatementClass, statement: Box<dyn BackendStatement>) -> Self {
        Self {
            sql: sql.to_string(),
            class,
            strategy: ResourceStrategy::default(),
            return_generated_keys: false,
            statement,
        }
    }

    #[must_use]
    pub const fn with_strategy(mut self, strategy: ResourceStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub const fn with_generated_keys(mut self, return_generated_keys: bool) -> Self {
        self.return_generated_keys = return_generated_keys;
        self
    }

    #[must_use]
    pub const fn path(&self) -> ExecutionPath {
        ExecutionPath::select(self.class, self.strategy)
    }
}

pub struct ExecuteWorker<'a> {
    tracker: &'a mut ResourceTracker,
    context: ContextId,
}

impl<'a> ExecuteWorker<'a> {
    pub fn new(tracker: &'a mut ResourceTracker, context: ContextId) -> Self {
        Self { tracker, context }
    }

    pub fn execute(&mut self, request: ExecutionRequest) -> Result<ExecuteResponse, ProxyError> {
        let path = request.path();
        let ExecutionRequest {
            sql,
            strategy,
            return_generated_keys,
            statement,
            ..
        } = request;
        debug!(context = %self.context, ?path, %sql, "executing statement");

        match path {
            ExecutionPath::StreamingQuery => self.execute_query_streaming(&sql, statement),
            ExecutionPath::BufferingQuery => Self::execute_query_buffering(&sql, statement),
            ExecutionPath::Update => Self::execute_update(&sql, statement, return_generated_keys),
            ExecutionPath::Generic => self.execute_generic(&sql, strategy, statement),
        }
    }

    /// Row-by-row cursor left open and tracked; only the header is built here
    fn execute_query_streaming(
        &mut self,
        sql: &str,
        mut statement: Box<dyn BackendStatement>,
    ) -> Result<ExecuteResponse, ProxyError> {
        let executed = statement
            .set_fetch_mode(FetchMode::RowByRow)
            .and_then(|()| statement.execute_query(sql));
        match executed {
            Ok(cursor) => self.stream(statement, cursor),
            Err(e) => Err(abort(statement.as_mut(), None, e)),
        }
    }

    /// Whole result copied into a row buffer, cursor and statement closed before returning
    fn execute_query_buffering(
        sql: &str,
        mut statement: Box<dyn BackendStatement>,
    ) -> Result<ExecuteResponse, ProxyError> {
        match statement.execute_query(sql) {
            Ok(cursor) => Self::buffer(statement, cursor),
            Err(e) => Err(abort(statement.as_mut(), None, e)),
        }
    }

    fn execute_update(
        sql: &str,
        mut statement: Box<dyn BackendStatement>,
        return_generated_keys: bool,
    ) -> Result<ExecuteResponse, ProxyError> {
        let executed = if return_generated_keys {
            statement
                .execute_update(sql, GeneratedKeys::Return)
                .and_then(|affected_rows| Ok((affected_rows, generated_key(statement.as_mut())?)))
        } else {
            statement
                .execute_update(sql, GeneratedKeys::NoReturn)
                .map(|affected_rows| (affected_rows, 0))
        };

        match executed {
            Ok((affected_rows, last_insert_id)) => {
                statement.close()?;
                debug!(affected_rows, last_insert_id, "update executed");
                Ok(ExecuteResponse::Update(build_acknowledgement(affected_rows, last_insert_id)))
            }
            Err(e) => Err(abort(statement.as_mut(), None, e)),
        }
    }

    /// Statement of unknown shape: described like a query when it yields a result set,
    /// acknowledged with its update count otherwise
    fn execute_generic(
        &mut self,
        sql: &str,
        strategy: ResourceStrategy,
        mut statement: Box<dyn BackendStatement>,
    ) -> Result<ExecuteResponse, ProxyError> {
        let has_result_set = match statement.execute(sql) {
            Ok(has_result_set) => has_result_set,
            Err(e) => return Err(abort(statement.as_mut(), None, e)),
        };

        if has_result_set {
            let cursor = match statement.result_set() {
                Ok(Some(cursor)) => cursor,
                Ok(None) => {
                    let e = BackendError::new(
                        0,
                        "HY000",
                        "Statement reported a result set but returned none",
                    );
                    return Err(abort(statement.as_mut(), None, e));
                }
                Err(e) => return Err(abort(statement.as_mut(), None, e)),
            };
            return self.describe(strategy, statement, cursor);
        }

        match statement.update_count() {
            Ok(update_count) => {
                statement.close()?;
                Ok(ExecuteResponse::Update(build_acknowledgement(update_count, 0)))
            }
            Err(e) => Err(abort(statement.as_mut(), None, e)),
        }
    }

    /// Builds the query response for an open cursor under the given strategy
    fn describe(
        &mut self,
        strategy: ResourceStrategy,
        statement: Box<dyn BackendStatement>,
        cursor: Box<dyn BackendCursor>,
    ) -> Result<ExecuteResponse, ProxyError> {
        match strategy {
            ResourceStrategy::MemoryStrict => self.stream(statement, cursor),
            ResourceStrategy::ConnectionStrict => Self::buffer(statement, cursor),
        }
    }

    fn stream(
        &mut self,
        mut statement: Box<dyn BackendStatement>,
        mut cursor: Box<dyn BackendCursor>,
    ) -> Result<ExecuteResponse, ProxyError> {
        let metadata = match cursor.metadata() {
            Ok(metadata) => metadata,
            Err(e) => return Err(abort(statement.as_mut(), Some(cursor.as_mut()), e)),
        };

        let token = self.tracker.track(self.context, statement, cursor);
        debug!(%token, columns = metadata.column_count(), "streaming query result");
        Ok(ExecuteResponse::query(build_header(&metadata), RowSource::Streaming(token)))
    }

    fn buffer(
        mut statement: Box<dyn BackendStatement>,
        mut cursor: Box<dyn BackendCursor>,
    ) -> Result<ExecuteResponse, ProxyError> {
        let (metadata, buffer) = match drain(cursor.as_mut()) {
            Ok(drained) => drained,
            Err(e) => return Err(abort(statement.as_mut(), Some(cursor.as_mut()), e)),
        };

        let closed = cursor.close();
        closed.and(statement.close())?;
        debug!(values = buffer.len(), "buffered query result");
        Ok(ExecuteResponse::query(build_header(&metadata), RowSource::Buffered(buffer)))
    }
}

/// Reads metadata, then every row, flattened row by row.
///
/// Each row must carry exactly one value per column, or replay would lose alignment.
fn drain(cursor: &mut dyn BackendCursor) -> BackendResult<(ResultMetadata, RowBuffer)> {
    let metadata = cursor.metadata()?;
    let width = metadata.column_count();
    let mut buffer = RowBuffer::new();
    let mut rows = 0usize;
    while let Some(row) = cursor.fetch()? {
        if row.len() != width {
            return Err(BackendError::new(
                0,
                "S1000",
                &format!("Row {rows} has {} values, result declares {width} columns", row.len()),
            ));
        }
        buffer.push_row(row);
        rows += 1;
    }
    buffer.reset();
    Ok((metadata, buffer))
}

/// First generated key as a number, 0 when the backend reports none
fn generated_key(statement: &mut dyn BackendStatement) -> BackendResult<u64> {
    let mut keys = statement.generated_keys()?;
    let key = keys.fetch().and_then(|row| {
        match row.and_then(|values| values.into_iter().next()) {
            None => Ok(0),
            Some(value) if value.is_null() => Ok(0),
            Some(value) => value.as_u64().ok_or_else(|| {
                BackendError::new(0, "S1009", &format!("Generated key '{value}' is not a number"))
            }),
        }
    });

    match key {
        Ok(key) => {
            keys.close()?;
            Ok(key)
        }
        Err(e) => {
            close_cursor_quietly(keys.as_mut());
            Err(e)
        }
    }
}

/// Closes what a failed path opened, then hands back the original error
fn abort(
    statement: &mut dyn BackendStatement,
    cursor: Option<&mut dyn BackendCursor>,
    error: BackendError,
) -> ProxyError {
    warn!(code = error.code, sql_state = %error.sql_state, "statement failed: {}", error.message);
    if let Some(cursor) = cursor {
        close_cursor_quietly(cursor);
    }
    if let Err(e) = statement.close() {
        warn!(error = %e, "failed to close statement after execution error");
    }
    error.into()
}

fn close_cursor_quietly(cursor: &mut dyn BackendCursor) {
    if let Err(e) = cursor.close() {
        warn!(error = %e, "failed to close cursor after execution error");
    }
}
