// End-to-end execution paths against the scripted backend
use shardexec::{
    ColumnMetadata, ColumnType, ContextId, ExecuteResponse, ExecuteWorker, ExecutionRequest,
    MemoryBackend, ProxyError, ResourceStrategy, ResourceTracker, ResultMetadata, RowSource,
    Script, StatementClass, Value,
};

const SELECT: &str = "SELECT user_id, name FROM t_user";
const INSERT: &str = "INSERT INTO t_user (name) VALUES ('d')";
const CALL: &str = "CALL refresh_stats()";
const ALTER: &str = "ALTER TABLE t_user ADD COLUMN age INT";

fn columns() -> Vec<ColumnMetadata> {
    vec![
        ColumnMetadata::new("user_id", ColumnType::BigInt).with_table("ds_0", "t_user"),
        ColumnMetadata::new("name", ColumnType::Varchar).with_table("ds_0", "t_user"),
    ]
}

fn rows() -> Vec<Vec<Value>> {
    vec![
        vec![Value::Integer(1), Value::from("a")],
        vec![Value::Integer(2), Value::from("b")],
        vec![Value::Integer(3), Value::from("c")],
    ]
}

fn backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.register(SELECT, Script::result_set(columns(), rows()));
    backend.register(INSERT, Script::update(1, vec![Value::Integer(4)]));
    backend.register(CALL, Script::result_set(columns(), rows()));
    backend.register(ALTER, Script::update(0, Vec::new()));
    backend
}

fn execute(
    tracker: &mut ResourceTracker,
    context: ContextId,
    request: ExecutionRequest,
) -> Result<ExecuteResponse, ProxyError> {
    ExecuteWorker::new(tracker, context).execute(request)
}

fn routed(backend: &MemoryBackend, sql: &str, class: StatementClass) -> ExecutionRequest {
    ExecutionRequest::new(sql, class, Box::new(backend.statement()))
}

fn query(backend: &MemoryBackend, sql: &str, strategy: ResourceStrategy) -> ExecutionRequest {
    routed(backend, sql, StatementClass::Query).with_strategy(strategy)
}

#[test]
fn test_memory_strict_query_streams_from_tracked_cursor() {
    let backend = backend();
    let mut tracker = ResourceTracker::new();
    let context = ContextId::new(1);

    let request = query(&backend, SELECT, ResourceStrategy::MemoryStrict);
    let response = execute(&mut tracker, context, request).unwrap();
    let ExecuteResponse::Query(mut query) = response else {
        panic!("expected query response");
    };

    assert_eq!(query.column_count(), 2);
    assert_eq!(query.header.field_count.column_count, 2);
    let token = query.rows.token().expect("streaming rows");
    assert!(tracker.is_tracked(token));
    assert_eq!(backend.open_cursors(), 1);
    assert_eq!(backend.open_statements(), 1);

    let mut seen = Vec::new();
    while let Some(packet) = query.next_packet(&mut tracker).unwrap() {
        seen.push(packet);
    }
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].sequence_id, 5);
    assert_eq!(seen[2].values, vec![Some(b"3".to_vec()), Some(b"c".to_vec())]);

    // Exhaustion alone does not release the cursor
    assert!(tracker.is_tracked(token));
    assert_eq!(tracker.release_all(context), 1);
    assert_eq!(backend.open_cursors(), 0);
    assert_eq!(backend.open_statements(), 0);
}

#[test]
fn test_connection_strict_query_buffers_row_major_and_closes_cursor() {
    let backend = backend();
    let mut tracker = ResourceTracker::new();
    let context = ContextId::new(1);

    let request = query(&backend, SELECT, ResourceStrategy::ConnectionStrict);
    let response = execute(&mut tracker, context, request).unwrap();
    let ExecuteResponse::Query(query) = response else {
        panic!("expected query response");
    };
    let RowSource::Buffered(mut buffer) = query.rows else {
        panic!("expected buffered rows");
    };

    assert_eq!(buffer.len(), rows().len() * columns().len());
    let mut values = Vec::new();
    while let Some(value) = buffer.next_value() {
        values.push(value.clone());
    }
    assert_eq!(values, rows().concat());
    assert!(buffer.next_value().is_none());

    assert_eq!(backend.open_cursors(), 0);
    assert_eq!(backend.open_statements(), 0);
    assert_eq!(tracker.tracked(context), 0);
}

#[test]
fn test_update_reports_generated_key_only_when_requested() {
    let backend = backend();
    let mut tracker = ResourceTracker::new();
    let context = ContextId::new(1);

    let with_keys = routed(&backend, INSERT, StatementClass::Update).with_generated_keys(true);
    let ok = match execute(&mut tracker, context, with_keys).unwrap() {
        ExecuteResponse::Update(ok) => ok,
        ExecuteResponse::Query(_) => panic!("expected acknowledgement"),
    };
    assert_eq!(ok.statements_ok(), 1);
    assert_eq!(ok.affected_rows, 1);
    assert_eq!(ok.last_insert_id, 4);

    let without_keys = routed(&backend, INSERT, StatementClass::Update);
    let ok = match execute(&mut tracker, context, without_keys).unwrap() {
        ExecuteResponse::Update(ok) => ok,
        ExecuteResponse::Query(_) => panic!("expected acknowledgement"),
    };
    assert_eq!(ok.last_insert_id, 0);
    assert_eq!(backend.keys_requested(), vec![true, false]);
    assert_eq!(backend.open_statements(), 0);
}

#[test]
fn test_update_without_backend_keys_reports_zero() {
    let backend = backend();
    backend.register(INSERT, Script::update(2, Vec::new()));
    let mut tracker = ResourceTracker::new();

    let request = routed(&backend, INSERT, StatementClass::Update).with_generated_keys(true);
    let response = execute(&mut tracker, ContextId::new(1), request).unwrap();
    let ok = response.as_update().expect("acknowledgement");
    assert_eq!(ok.affected_rows, 2);
    assert_eq!(ok.last_insert_id, 0);
    assert_eq!(backend.open_cursors(), 0);
}

#[test]
fn test_update_strategy_does_not_matter() {
    let backend = backend();
    let mut tracker = ResourceTracker::new();

    for strategy in [ResourceStrategy::MemoryStrict, ResourceStrategy::ConnectionStrict] {
        let request = routed(&backend, INSERT, StatementClass::Update).with_strategy(strategy);
        let response = execute(&mut tracker, ContextId::new(1), request).unwrap();
        assert_eq!(response.as_update().unwrap().affected_rows, 1);
    }
    assert!(tracker.is_empty());
}

#[test]
fn test_generic_with_result_set_returns_header() {
    let backend = backend();
    let mut tracker = ResourceTracker::new();
    let context = ContextId::new(1);

    let request = routed(&backend, CALL, StatementClass::Generic).with_generated_keys(true);
    let response = execute(&mut tracker, context, request).unwrap();
    let query = response.as_query().expect("header response");
    assert_eq!(query.column_count(), 2);
    assert!(matches!(query.rows, RowSource::Streaming(_)));
    assert_eq!(tracker.tracked(context), 1);
    assert!(backend.keys_requested().is_empty());

    let request = routed(&backend, CALL, StatementClass::Generic)
        .with_strategy(ResourceStrategy::ConnectionStrict);
    let response = execute(&mut tracker, context, request).unwrap();
    let query = response.as_query().expect("header response");
    assert!(matches!(&query.rows, RowSource::Buffered(buffer) if buffer.len() == 6));
    assert_eq!(tracker.tracked(context), 1);

    tracker.release_all(context);
    assert_eq!(backend.open_cursors(), 0);
    assert_eq!(backend.open_statements(), 0);
}

#[test]
fn test_generic_without_result_set_acknowledges_update_count() {
    let backend = backend();
    backend.register(ALTER, Script::update(7, vec![Value::Integer(99)]));
    let mut tracker = ResourceTracker::new();

    let request = routed(&backend, ALTER, StatementClass::Generic).with_generated_keys(true);
    let response = execute(&mut tracker, ContextId::new(1), request).unwrap();
    let ok = response.as_update().expect("acknowledgement");
    assert_eq!(ok.statements_ok(), 1);
    assert_eq!(ok.affected_rows, 7);
    assert_eq!(ok.last_insert_id, 0);
    assert_eq!(backend.open_statements(), 0);
}

#[test]
fn test_query_failure_leaves_nothing_behind() {
    let backend = backend();
    backend.register(SELECT, Script::error(1146, "42S02", "Table 'ds_0.t_user' doesn't exist"));
    let context = ContextId::new(1);

    for strategy in [ResourceStrategy::MemoryStrict, ResourceStrategy::ConnectionStrict] {
        let mut tracker = ResourceTracker::new();
        let err = execute(&mut tracker, context, query(&backend, SELECT, strategy)).unwrap_err();

        match err {
            ProxyError::BackendExecution(e) => {
                assert_eq!(e.code, 1146);
                assert_eq!(e.sql_state, "42S02");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(tracker.tracked(context), 0);
        assert_eq!(backend.open_cursors(), 0);
        assert_eq!(backend.open_statements(), 0);
    }
}

#[test]
fn test_fetch_failure_while_buffering_closes_statement() {
    let backend = backend();
    backend.register(
        SELECT,
        Script::ResultSet {
            columns: ResultMetadata::new(columns()),
            rows: rows(),
            fail_at_row: Some(2),
            fail_metadata: false,
        },
    );
    let mut tracker = ResourceTracker::new();

    let request = query(&backend, SELECT, ResourceStrategy::ConnectionStrict);
    let err = execute(&mut tracker, ContextId::new(1), request).unwrap_err();

    assert!(matches!(err, ProxyError::BackendExecution(ref e) if e.code == 2013));
    assert_eq!(backend.open_cursors(), 0);
    assert_eq!(backend.open_statements(), 0);
    assert!(tracker.is_empty());
}

#[test]
fn test_ragged_rows_are_rejected_while_buffering() {
    let backend = backend();
    backend.register(
        SELECT,
        Script::result_set(
            columns(),
            vec![
                vec![Value::Integer(1)],
                vec![Value::Integer(2), Value::Integer(3)],
                vec![Value::Integer(4), Value::Integer(5)],
            ],
        ),
    );
    let mut tracker = ResourceTracker::new();

    let request = query(&backend, SELECT, ResourceStrategy::ConnectionStrict);
    let err = execute(&mut tracker, ContextId::new(1), request).unwrap_err();

    assert!(matches!(err, ProxyError::BackendExecution(ref e) if e.sql_state == "S1000"));
    assert_eq!(backend.open_cursors(), 0);
    assert_eq!(backend.open_statements(), 0);
    assert!(tracker.is_empty());
}

#[test]
fn test_update_failure_closes_statement() {
    let backend = backend();
    backend.register(INSERT, Script::error(1062, "23000", "Duplicate entry '4' for key 'PRIMARY'"));
    let mut tracker = ResourceTracker::new();

    let request = routed(&backend, INSERT, StatementClass::Update).with_generated_keys(true);
    let err = execute(&mut tracker, ContextId::new(1), request).unwrap_err();

    assert!(matches!(err, ProxyError::BackendExecution(ref e) if e.code == 1062));
    assert_eq!(backend.open_statements(), 0);
    assert!(backend.keys_requested().is_empty());
}

#[test]
fn test_generic_failure_closes_statement() {
    let backend = backend();
    let mut tracker = ResourceTracker::new();

    let request = routed(&backend, "DROP TABEL t_user", StatementClass::Generic);
    let err = execute(&mut tracker, ContextId::new(1), request).unwrap_err();

    assert!(matches!(err, ProxyError::BackendExecution(ref e) if e.code == 1064));
    assert_eq!(backend.open_statements(), 0);
}

#[test]
fn test_contexts_are_released_independently() {
    let backend = backend();
    let mut tracker = ResourceTracker::new();
    let first = ContextId::new(1);
    let second = ContextId::new(2);

    execute(&mut tracker, first, query(&backend, SELECT, ResourceStrategy::MemoryStrict)).unwrap();
    execute(&mut tracker, second, query(&backend, SELECT, ResourceStrategy::MemoryStrict)).unwrap();
    assert_eq!(backend.open_cursors(), 2);

    assert_eq!(tracker.release_all(first), 1);
    assert_eq!(tracker.tracked(second), 1);
    assert_eq!(backend.open_cursors(), 1);
}

#[test]
fn test_concurrent_sessions_do_not_see_each_other() {
    let sessions: Vec<(MemoryBackend, u64)> = (1..=2).map(|id| (backend(), id)).collect();

    std::thread::scope(|scope| {
        for (backend, id) in &sessions {
            scope.spawn(move || {
                let mut tracker = ResourceTracker::new();
                let context = ContextId::new(*id);
                let other = ContextId::new(3 - *id);

                for _ in 0..10 {
                    let request = query(backend, SELECT, ResourceStrategy::MemoryStrict);
                    let response = execute(&mut tracker, context, request).unwrap();
                    let token = response.as_query().and_then(|q| q.rows.token()).unwrap();
                    assert_eq!(token.context(), context);
                }

                assert_eq!(tracker.tracked(context), 10);
                assert_eq!(tracker.tracked(other), 0);
                assert_eq!(backend.open_cursors(), 10);

                assert_eq!(tracker.release_all(other), 0);
                assert_eq!(tracker.release_all(context), 10);
                assert_eq!(backend.open_cursors(), 0);
                assert_eq!(backend.open_statements(), 0);
            });
        }
    });
}
