//! Scripted in-memory backend
//!
//! Responses are registered per SQL text. Every statement and cursor handed out is counted
//! until closed, so tests can assert that no backend resource leaks.
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{BackendCursor, BackendResult, BackendStatement, FetchMode, GeneratedKeys};
use crate::core::{BackendError, ColumnMetadata, ColumnType, ResultMetadata, Value};

/// Scripted outcome of one SQL text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Script {
    ResultSet {
        columns: ResultMetadata,
        rows: Vec<Vec<Value>>,
        /// Fetching this row (0-based) fails as if the connection dropped
        #[serde(default)]
        fail_at_row: Option<usize>,
        #[serde(default)]
        fail_metadata: bool,
    },
    Update {
        affected_rows: u64,
        #[serde(default)]
        generated_keys: Vec<Value>,
    },
    Error {
        code: i32,
        sql_state: String,
        message: String,
    },
}

impl Script {
    #[must_use]
    pub const fn result_set(columns: Vec<ColumnMetadata>, rows: Vec<Vec<Value>>) -> Self {
        Self::ResultSet {
            columns: ResultMetadata::new(columns),
            rows,
            fail_at_row: None,
            fail_metadata: false,
        }
    }

    #[must_use]
    pub const fn update(affected_rows: u64, generated_keys: Vec<Value>) -> Self {
        Self::Update { affected_rows, generated_keys }
    }

    #[must_use]
    pub fn error(code: i32, sql_state: &str, message: &str) -> Self {
        Self::Error {
            code,
            sql_state: sql_state.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct BackendState {
    scripts: HashMap<String, Script>,
    open_statements: usize,
    open_cursors: usize,
    fetch_modes: Vec<FetchMode>,
    keys_requested: Vec<bool>,
}

/// Handle to a scripted backend; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a fixture: a JSON object mapping SQL text to a script
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let scripts: HashMap<String, Script> = serde_json::from_str(json)?;
        let backend = Self::new();
        backend.lock().scripts = scripts;
        Ok(backend)
    }

    pub fn register(&self, sql: &str, script: Script) {
        self.lock().scripts.insert(sql.to_string(), script);
    }

    /// Opens a statement on a fresh connection
    #[must_use]
    pub fn statement(&self) -> MemoryStatement {
        self.lock().open_statements += 1;
        MemoryStatement {
            state: Arc::clone(&self.state),
            fetch_mode: FetchMode::Default,
            last_result: None,
            last_update_count: None,
            last_keys: None,
            closed: false,
        }
    }

    #[must_use]
    pub fn open_statements(&self) -> usize {
        self.lock().open_statements
    }

    #[must_use]
    pub fn open_cursors(&self) -> usize {
        self.lock().open_cursors
    }

    /// Fetch mode in effect for each executed query, in execution order
    #[must_use]
    pub fn fetch_modes(&self) -> Vec<FetchMode> {
        self.lock().fetch_modes.clone()
    }

    /// Whether each executed update asked for generated keys, in execution order
    #[must_use]
    pub fn keys_requested(&self) -> Vec<bool> {
        self.lock().keys_requested.clone()
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().expect("backend state poisoned")
    }
}

fn lock(state: &Mutex<BackendState>) -> MutexGuard<'_, BackendState> {
    state.lock().expect("backend state poisoned")
}

fn syntax_error(sql: &str) -> BackendError {
    BackendError::new(
        1064,
        "42000",
        &format!("You have an error in your SQL syntax near '{sql}'"),
    )
}

pub struct MemoryStatement {
    state: Arc<Mutex<BackendState>>,
    fetch_mode: FetchMode,
    last_result: Option<Box<dyn BackendCursor>>,
    last_update_count: Option<u64>,
    last_keys: Option<Vec<Value>>,
    closed: bool,
}

impl MemoryStatement {
    fn script(&self, sql: &str) -> BackendResult<Script> {
        if self.closed {
            return Err(BackendError::closed("Statement"));
        }
        match lock(&self.state).scripts.get(sql) {
            Some(Script::Error { code, sql_state, message }) => {
                Err(BackendError::new(*code, sql_state, message))
            }
            Some(script) => Ok(script.clone()),
            None => Err(syntax_error(sql)),
        }
    }

    fn open_cursor(&self, metadata: ResultMetadata, rows: Vec<Vec<Value>>) -> MemoryCursor {
        lock(&self.state).open_cursors += 1;
        MemoryCursor {
            state: Arc::clone(&self.state),
            metadata,
            rows: rows.into(),
            fetched: 0,
            fail_at_row: None,
            fail_metadata: false,
            closed: false,
        }
    }

    fn reset_results(&mut self) -> BackendResult<()> {
        self.last_update_count = None;
        self.last_keys = None;
        if let Some(mut cursor) = self.last_result.take() {
            cursor.close()?;
        }
        Ok(())
    }
}

impl BackendStatement for MemoryStatement {
    fn set_fetch_mode(&mut self, mode: FetchMode) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::closed("Statement"));
        }
        self.fetch_mode = mode;
        Ok(())
    }

    fn execute_query(&mut self, sql: &str) -> BackendResult<Box<dyn BackendCursor>> {
        let script = self.script(sql)?;
        self.reset_results()?;
        lock(&self.state).fetch_modes.push(self.fetch_mode);
        match script {
            Script::ResultSet { columns, rows, fail_at_row, fail_metadata } => {
                let mut cursor = self.open_cursor(columns, rows);
                cursor.fail_at_row = fail_at_row;
                cursor.fail_metadata = fail_metadata;
                Ok(Box::new(cursor))
            }
            _ => Err(BackendError::new(
                0,
                "S1009",
                "Can not issue data manipulation statements with executeQuery()",
            )),
        }
    }

    fn execute_update(&mut self, sql: &str, keys: GeneratedKeys) -> BackendResult<u64> {
        let script = self.script(sql)?;
        self.reset_results()?;
        match script {
            Script::Update { affected_rows, generated_keys } => {
                let requested = keys == GeneratedKeys::Return;
                lock(&self.state).keys_requested.push(requested);
                if requested {
                    self.last_keys = Some(generated_keys);
                }
                Ok(affected_rows)
            }
            _ => Err(BackendError::new(
                0,
                "S1009",
                "Can not issue executeUpdate() for statements that produce result sets",
            )),
        }
    }

    fn execute(&mut self, sql: &str) -> BackendResult<bool> {
        let script = self.script(sql)?;
        self.reset_results()?;
        match script {
            Script::ResultSet { columns, rows, fail_at_row, fail_metadata } => {
                let mut cursor = self.open_cursor(columns, rows);
                cursor.fail_at_row = fail_at_row;
                cursor.fail_metadata = fail_metadata;
                self.last_result = Some(Box::new(cursor));
                Ok(true)
            }
            Script::Update { affected_rows, .. } => {
                self.last_update_count = Some(affected_rows);
                Ok(false)
            }
            Script::Error { code, sql_state, message } => {
                Err(BackendError::new(code, &sql_state, &message))
            }
        }
    }

    fn result_set(&mut self) -> BackendResult<Option<Box<dyn BackendCursor>>> {
        if self.closed {
            return Err(BackendError::closed("Statement"));
        }
        Ok(self.last_result.take())
    }

    fn update_count(&self) -> BackendResult<u64> {
        if self.closed {
            return Err(BackendError::closed("Statement"));
        }
        self.last_update_count
            .ok_or_else(|| BackendError::new(0, "HY000", "No update count available"))
    }

    fn generated_keys(&mut self) -> BackendResult<Box<dyn BackendCursor>> {
        if self.closed {
            return Err(BackendError::closed("Statement"));
        }
        let keys = self.last_keys.take().ok_or_else(|| {
            BackendError::new(0, "S1009", "Generated keys not requested")
        })?;
        let metadata = ResultMetadata::new(vec![ColumnMetadata::new(
            "GENERATED_KEY",
            ColumnType::BigInt,
        )]);
        let rows = keys.into_iter().map(|key| vec![key]).collect();
        Ok(Box::new(self.open_cursor(metadata, rows)))
    }

    fn close(&mut self) -> BackendResult<()> {
        if self.closed {
            return Ok(());
        }
        self.reset_results()?;
        self.closed = true;
        lock(&self.state).open_statements -= 1;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

pub struct MemoryCursor {
    state: Arc<Mutex<BackendState>>,
    metadata: ResultMetadata,
    rows: VecDeque<Vec<Value>>,
    fetched: usize,
    fail_at_row: Option<usize>,
    fail_metadata: bool,
    closed: bool,
}

impl BackendCursor for MemoryCursor {
    fn metadata(&self) -> BackendResult<ResultMetadata> {
        if self.closed {
            return Err(BackendError::closed("Result set"));
        }
        if self.fail_metadata {
            return Err(BackendError::new(0, "HY000", "Result set metadata unavailable"));
        }
        Ok(self.metadata.clone())
    }

    fn fetch(&mut self) -> BackendResult<Option<Vec<Value>>> {
        if self.closed {
            return Err(BackendError::closed("Result set"));
        }
        if self.fail_at_row == Some(self.fetched) {
            return Err(BackendError::new(
                2013,
                "HY000",
                "Lost connection to backend during query",
            ));
        }
        let row = self.rows.pop_front();
        if row.is_some() {
            self.fetched += 1;
        }
        Ok(row)
    }

    fn close(&mut self) -> BackendResult<()> {
        if !self.closed {
            self.closed = true;
            lock(&self.state).open_cursors -= 1;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Script {
        Script::result_set(
            vec![
                ColumnMetadata::new("id", ColumnType::BigInt),
                ColumnMetadata::new("name", ColumnType::Varchar),
            ],
            vec![vec![Value::Integer(1), Value::from("a")]],
        )
    }

    #[test]
    fn test_statement_and_cursor_are_counted_until_closed() {
        let backend = MemoryBackend::new();
        backend.register("SELECT * FROM t_user", users());

        let mut stmt = backend.statement();
        let mut cursor = stmt.execute_query("SELECT * FROM t_user").unwrap();
        assert_eq!(backend.open_statements(), 1);
        assert_eq!(backend.open_cursors(), 1);

        cursor.close().unwrap();
        cursor.close().unwrap();
        assert!(cursor.fetch().is_err());
        assert_eq!(backend.open_cursors(), 0);

        stmt.close().unwrap();
        assert_eq!(backend.open_statements(), 0);
    }

    #[test]
    fn test_unknown_sql_is_syntax_error() {
        let backend = MemoryBackend::new();
        let mut stmt = backend.statement();
        let err = stmt.execute("SELEKT 1").unwrap_err();
        assert_eq!(err.code, 1064);
    }

    #[test]
    fn test_fail_at_row() {
        let backend = MemoryBackend::new();
        backend.register(
            "SELECT 1",
            Script::ResultSet {
                columns: ResultMetadata::new(vec![ColumnMetadata::new("1", ColumnType::BigInt)]),
                rows: vec![vec![Value::Integer(1)], vec![Value::Integer(1)]],
                fail_at_row: Some(1),
                fail_metadata: false,
            },
        );
        let mut stmt = backend.statement();
        let mut cursor = stmt.execute_query("SELECT 1").unwrap();
        assert!(cursor.fetch().unwrap().is_some());
        assert_eq!(cursor.fetch().unwrap_err().code, 2013);
    }

    #[test]
    fn test_generic_execute_hands_over_result_set() {
        let backend = MemoryBackend::new();
        backend.register("CALL p()", users());
        let mut stmt = backend.statement();
        assert!(stmt.execute("CALL p()").unwrap());
        let cursor = stmt.result_set().unwrap();
        assert!(cursor.is_some());
        assert!(stmt.result_set().unwrap().is_none());
    }

    #[test]
    fn test_from_json_fixture() {
        let json = r#"{
            "INSERT INTO t_order VALUES (1)": {
                "kind": "update",
                "affected_rows": 1,
                "generated_keys": [{"Integer": 7}]
            },
            "SELECT id FROM t_order": {
                "kind": "result_set",
                "columns": [{ "name": "id", "column_type": "BIG_INT" }],
                "rows": [[{"Integer": 7}]]
            }
        }"#;
        let backend = MemoryBackend::from_json(json).unwrap();
        let mut stmt = backend.statement();
        let affected = stmt
            .execute_update("INSERT INTO t_order VALUES (1)", GeneratedKeys::Return)
            .unwrap();
        assert_eq!(affected, 1);
        let mut keys = stmt.generated_keys().unwrap();
        assert_eq!(keys.fetch().unwrap(), Some(vec![Value::Integer(7)]));
        keys.close().unwrap();
        stmt.close().unwrap();
        assert_eq!(backend.open_statements(), 0);
        assert_eq!(backend.open_cursors(), 0);
    }
}
