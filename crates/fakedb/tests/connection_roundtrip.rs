//! End-to-end checks of the async `Connection` surface.

use asupersync::runtime::RuntimeBuilder;
use fakedb::{
    Connection, Cx, Error, FakeConfig, FakeDriver, FakeResponse, Outcome, TransactionOps, Value,
    registry,
};
use std::io::Write;

fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

#[test]
fn crud_against_a_registered_dataset() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    registry::load_json(
        "roundtrip_crud",
        r#"{"users": [{"id": 1, "name": "ann", "age": 31}, {"id": 2, "name": "bob", "age": 25}]}"#,
    )
    .unwrap();
    let conn = FakeDriver::new(FakeConfig::database("roundtrip_crud").create_if_missing(false))
        .connect()
        .unwrap();

    rt.block_on(async {
        let id = unwrap_outcome(
            conn.insert(
                &cx,
                "INSERT INTO users (name, age) VALUES (?, ?)",
                &[Value::Text("cy".into()), Value::BigInt(40)],
            )
            .await,
        );
        assert_eq!(id, 3);

        let rows = unwrap_outcome(
            conn.query(
                &cx,
                "SELECT name FROM users WHERE age > ? ORDER BY name",
                &[Value::BigInt(30)],
            )
            .await,
        );
        let names: Vec<String> = rows
            .iter()
            .map(|r| r.get_named::<String>("name").unwrap())
            .collect();
        assert_eq!(names, vec!["ann", "cy"]);

        let updated = unwrap_outcome(
            conn.execute(
                &cx,
                "UPDATE users SET age = age + 1 WHERE name = ?",
                &[Value::Text("bob".into())],
            )
            .await,
        );
        assert_eq!(updated, 1);

        let deleted = unwrap_outcome(
            conn.execute(&cx, "DELETE FROM users WHERE id < ?", &[Value::BigInt(3)])
                .await,
        );
        assert_eq!(deleted, 2);

        let row = unwrap_outcome(conn.query_one(&cx, "SELECT COUNT(*) AS n FROM users", &[]).await)
            .expect("count row");
        assert_eq!(row.get_named::<i64>("n").unwrap(), 1);
    });
    registry::unregister("roundtrip_crud");
}

#[test]
fn fixture_seeds_an_empty_dataset() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"orders": {{"columns": ["id", "total"], "rows": [[1, 9.5], [2, 20.0]]}}}}"#
    )
    .unwrap();
    let driver = FakeDriver::new(FakeConfig::database("roundtrip_fixture").fixture(file.path()));
    let conn = driver.connect().unwrap();

    rt.block_on(async {
        let rows = unwrap_outcome(
            conn.query(&cx, "SELECT id FROM orders WHERE total > 10", &[])
                .await,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_as::<i64>(0).unwrap(), 2);
    });

    // A second connection reuses the dataset instead of reseeding it.
    let other = driver.connect().unwrap();
    rt.block_on(async {
        unwrap_outcome(
            other
                .execute(&cx, "DELETE FROM orders WHERE id = 1", &[])
                .await,
        );
        let rows = unwrap_outcome(conn.query(&cx, "SELECT id FROM orders", &[]).await);
        assert_eq!(rows.len(), 1);
    });
    registry::unregister("roundtrip_fixture");
}

#[test]
fn canned_responses_shadow_the_dataset() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    let driver = FakeDriver::new(FakeConfig::database("roundtrip_canned"));
    driver.catcher().attach([
        FakeResponse::new("FROM reports WHERE id = 7")
            .with_rows(vec!["title".into()], vec![vec![Value::Text("q3".into())]]),
        FakeResponse::new("FROM reports").with_error(Error::Custom("reports offline".into())),
    ]);
    let conn = driver.connect().unwrap();

    rt.block_on(async {
        let rows = unwrap_outcome(
            conn.query(&cx, "SELECT title FROM reports WHERE id = ?", &[Value::BigInt(7)])
                .await,
        );
        assert_eq!(rows[0].get_named::<String>("title").unwrap(), "q3");

        match conn
            .query(&cx, "SELECT title FROM reports WHERE id = ?", &[Value::BigInt(8)])
            .await
        {
            Outcome::Err(e) => assert_eq!(e.to_string(), "reports offline"),
            _ => panic!("expected the canned error"),
        }
    });
    registry::unregister("roundtrip_canned");
}

#[test]
fn transaction_commit_and_closed_connection() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let conn = FakeDriver::new(FakeConfig::database("roundtrip_tx"))
        .connect()
        .unwrap();

    rt.block_on(async {
        let tx = unwrap_outcome(conn.begin(&cx).await);
        assert!(conn.in_transaction());
        let n = unwrap_outcome(
            tx.execute(&cx, "INSERT INTO log (msg) VALUES (?)", &[Value::Text("hi".into())])
                .await,
        );
        assert_eq!(n, 1);
        unwrap_outcome(tx.commit(&cx).await);
        assert!(!conn.in_transaction());

        assert!(conn.is_valid(&cx).await);
        let prepared = unwrap_outcome(conn.prepare(&cx, "SELECT msg FROM log WHERE msg = ?").await);
        assert_eq!(prepared.param_count(), 1);
        let rows = unwrap_outcome(
            conn.query_prepared(&cx, &prepared, &[Value::Text("hi".into())])
                .await,
        );
        assert_eq!(rows.len(), 1);

        let probe = conn.clone();
        conn.close(&cx).await.unwrap();
        assert!(!probe.is_valid(&cx).await);
        assert!(matches!(
            probe.query(&cx, "SELECT 1", &[]).await,
            Outcome::Err(Error::Connection(_))
        ));
    });
    registry::unregister("roundtrip_tx");
}

#[test]
fn batch_stops_at_first_failure() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let conn = FakeDriver::new(FakeConfig::database("roundtrip_batch"))
        .connect()
        .unwrap();

    rt.block_on(async {
        let counts = unwrap_outcome(
            conn.batch(
                &cx,
                &[
                    ("INSERT INTO t (a) VALUES (1)".to_string(), vec![]),
                    ("UPDATE t SET a = ?".to_string(), vec![Value::BigInt(2)]),
                ],
            )
            .await,
        );
        assert_eq!(counts, vec![1, 1]);

        let outcome = conn
            .batch(
                &cx,
                &[
                    ("DELETE FROM t".to_string(), vec![]),
                    ("CREATE TABLE x (a INT)".to_string(), vec![]),
                ],
            )
            .await;
        assert!(matches!(outcome, Outcome::Err(Error::Query(_))));
    });
    registry::unregister("roundtrip_batch");
}
