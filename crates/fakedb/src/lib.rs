//! Fake SQL driver for exercising database code in tests.
//!
//! `fakedb` implements the driver traits from `fakedb-core` against named
//! in-memory datasets instead of a real server. Statements are bound by
//! splicing literal arguments into the SQL text and then answered in one of
//! two ways:
//!
//! - a [`FakeResponse`] attached to the driver's [`Catcher`] whose pattern
//!   occurs in the bound query, or
//! - the built-in evaluator, which runs a small SQL subset
//!   (SELECT/INSERT/UPDATE/DELETE) against the dataset.
//!
//! Responses can inject errors, bad-connection failures, per-row errors and
//! callbacks, so failure paths are as easy to drive as happy ones.
//!
//! # Example
//!
//! ```rust,ignore
//! use fakedb::{FakeConfig, FakeDriver, FakeResponse, registry};
//! use fakedb::{Connection, Cx, Outcome, Value};
//!
//! registry::load_json("shop", r#"{"users": [{"id": 1, "name": "ann"}]}"#)?;
//! let driver = FakeDriver::new(FakeConfig::database("shop"));
//! driver.catcher().attach([FakeResponse::new("FROM audit")
//!     .with_rows(vec!["n".into()], vec![vec![Value::BigInt(3)]])]);
//!
//! let conn = driver.connect()?;
//! let cx = Cx::for_testing();
//! match conn.query(&cx, "SELECT name FROM users WHERE id = ?", &[Value::BigInt(1)]).await {
//!     Outcome::Ok(rows) => assert_eq!(rows.len(), 1),
//!     _ => unreachable!(),
//! }
//! ```
//!
//! Writes are immediate. Transactions track that one is open and run the
//! catcher's commit/rollback hooks but never undo anything.

pub mod bind;
pub mod catcher;
pub mod config;
pub mod conn;
pub mod connection;
pub mod dataset;
pub mod registry;
pub mod rows;
pub mod sql;
pub mod stmt;
pub mod tx;

pub use bind::Command;
pub use catcher::{Catcher, Exceptions, FakeResponse};
pub use config::FakeConfig;
pub use conn::{FakeConn, FakeDriver};
pub use connection::FakeTransaction;
pub use dataset::{Dataset, Record, Table};
pub use rows::RowsCursor;
pub use sql::{ResultSet, SqlOutput};
pub use stmt::FakeStmt;
pub use tx::FakeTx;

pub use fakedb_core::{
    ColumnInfo, Connection, Cx, Driver, DriverConn, Error, ExecResult, IsolationLevel,
    NamedValue, Outcome, PreparedStatement, Result, Row, Rows, Stmt, TransactionOps, Tx, Value,
};
