//! Failure injection through the catcher, driven with the statement-level API.

use fakedb::{
    Driver, DriverConn, Error, FakeConfig, FakeDriver, FakeResponse, NamedValue, Rows, Stmt, Tx,
    Value, registry,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn args(values: &[Value]) -> Vec<NamedValue> {
    NamedValue::positional(values)
}

#[test]
fn bad_connection_hooks_toggle_at_runtime() {
    let driver = FakeDriver::new(FakeConfig::database("hooks_bad_conn"));
    let broken = Arc::new(AtomicBool::new(true));
    let query_flag = Arc::clone(&broken);
    let exec_flag = Arc::clone(&broken);
    driver.catcher().attach([
        FakeResponse::new("SELECT balance")
            .with_rows(vec!["balance".into()], vec![vec![Value::BigInt(10)]])
            .with_query_exception(move || query_flag.load(Ordering::SeqCst)),
        FakeResponse::new("UPDATE accounts")
            .with_rows_affected(1)
            .with_exec_exception(move || exec_flag.load(Ordering::SeqCst)),
    ]);
    let conn = driver.open("hooks_bad_conn").unwrap();

    let select = conn.prepare("SELECT balance FROM accounts").unwrap();
    let update = conn.prepare("UPDATE accounts SET balance = 0").unwrap();
    assert!(select.query(&[]).unwrap_err().is_bad_conn());
    assert!(update.exec(&[]).unwrap_err().is_bad_conn());

    broken.store(false, Ordering::SeqCst);
    let mut rows = select.query(&[]).unwrap();
    let row = rows.next_row().unwrap().unwrap();
    assert_eq!(row.get_as::<i64>(0).unwrap(), 10);
    assert_eq!(update.exec(&[]).unwrap().rows_affected(), 1);
    registry::unregister("hooks_bad_conn");
}

#[test]
fn commit_and_rollback_hooks() {
    let driver = FakeDriver::new(FakeConfig::database("hooks_tx"));
    let commits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&commits);
    driver
        .catcher()
        .set_hook_bad_commit(move || counter.fetch_add(1, Ordering::SeqCst) == 0)
        .set_hook_bad_rollback(|| false);
    let conn = driver.connect().unwrap();

    assert!(conn.begin().unwrap().commit().unwrap_err().is_bad_conn());
    assert!(!conn.in_transaction());
    conn.begin().unwrap().commit().unwrap();
    conn.begin().unwrap().rollback().unwrap();
    assert_eq!(commits.load(Ordering::SeqCst), 2);

    driver.catcher().reset();
    conn.begin().unwrap().commit().unwrap();
    assert_eq!(commits.load(Ordering::SeqCst), 2);
    registry::unregister("hooks_tx");
}

#[test]
fn callbacks_see_bound_sql_and_args() {
    let driver = FakeDriver::new(FakeConfig::database("hooks_callback"));
    let seen: Arc<Mutex<Vec<(String, Vec<Value>)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    driver.catcher().attach([FakeResponse::new("INSERT INTO audit")
        .with_last_insert_id(42)
        .with_callback(move |sql, args| {
            sink.lock()
                .unwrap()
                .push((sql.to_string(), NamedValue::values(args)));
        })]);
    let conn = driver.connect().unwrap();

    let result = conn
        .prepare("INSERT INTO audit (who, what) VALUES (?, ?)")
        .unwrap()
        .exec(&args(&[Value::from("ann"), Value::BigInt(5)]))
        .unwrap();
    assert_eq!(result.last_insert_id().unwrap(), 42);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, r#"INSERT INTO audit (who, what) VALUES ("ann", 5)"#);
    assert_eq!(seen[0].1, vec![Value::from("ann"), Value::BigInt(5)]);
    registry::unregister("hooks_callback");
}

#[test]
fn once_responses_fall_through_to_the_dataset() {
    registry::load_json("hooks_once", r#"{"jobs": [{"id": 1, "state": "queued"}]}"#).unwrap();
    let driver = FakeDriver::new(FakeConfig::database("hooks_once"));
    driver.catcher().attach([FakeResponse::new("FROM jobs")
        .with_error(Error::Custom("lock timeout".into()))
        .once()]);
    let conn = driver.connect().unwrap();
    let stmt = conn.prepare("SELECT state FROM jobs WHERE id = ?").unwrap();

    let err = stmt.query(&args(&[Value::BigInt(1)])).unwrap_err();
    assert_eq!(err.to_string(), "lock timeout");
    assert!(driver.catcher().is_empty());

    let mut rows = stmt.query(&args(&[Value::BigInt(1)])).unwrap();
    let row = rows.next_row().unwrap().unwrap();
    assert_eq!(row.get_named::<String>("state").unwrap(), "queued");
    registry::unregister("hooks_once");
}

#[test]
fn args_restrict_which_response_matches() {
    let driver = FakeDriver::new(FakeConfig::database("hooks_args"));
    driver.catcher().attach([FakeResponse::new("FROM users")
        .with_args(vec![Value::BigInt(7)])
        .with_rows(vec!["name".into()], vec![vec![Value::from("canned")]])]);
    let conn = driver.connect().unwrap();
    let stmt = conn.prepare("SELECT name FROM users WHERE id = ?").unwrap();

    let mut rows = stmt.query(&args(&[Value::BigInt(7)])).unwrap();
    assert_eq!(rows.collect_rows().unwrap().len(), 1);

    // No dataset table, so the evaluator answers with an empty result.
    let mut rows = stmt.query(&args(&[Value::BigInt(8)])).unwrap();
    assert_eq!(rows.columns(), ["name"]);
    assert!(rows.next_row().unwrap().is_none());
    registry::unregister("hooks_args");
}

#[test]
fn row_errors_and_multiple_result_sets() {
    let driver = FakeDriver::new(FakeConfig::database("hooks_rows"));
    driver.catcher().attach([FakeResponse::new("FROM events")
        .with_rows(
            vec!["id".into()],
            vec![vec![Value::BigInt(1)], vec![Value::BigInt(2)]],
        )
        .with_row_error(1, Error::Custom("connection reset".into()))]);
    let conn = driver.connect().unwrap();

    let stmt = conn.prepare("SELECT id FROM events; SELECT ? AS tag").unwrap();
    assert_eq!(stmt.num_input(), 1);
    let mut rows = stmt.query(&args(&[Value::from("x")])).unwrap();

    assert!(rows.next_row().unwrap().is_some());
    assert_eq!(
        rows.next_row().unwrap_err().to_string(),
        "connection reset"
    );
    assert!(rows.has_next_result_set());
    assert!(rows.next_result_set().unwrap());
    assert_eq!(rows.columns(), ["tag"]);
    let row = rows.next_row().unwrap().unwrap();
    assert_eq!(row.get_named::<String>("tag").unwrap(), "x");
    assert!(!rows.next_result_set().unwrap());

    rows.close().unwrap();
    assert!(rows.next_row().is_err());
    registry::unregister("hooks_rows");
}
