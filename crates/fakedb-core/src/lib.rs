//! Driver SPI for fakedb.
//!
//! This crate provides the abstractions a driver implements and test code
//! consumes:
//!
//! - `Value` and `Row` for parameters and results
//! - `Connection` / `TransactionOps` for async, connection-level access
//! - `Driver`, `DriverConn`, `Stmt`, `Rows` and `Tx` for the statement-level
//!   lifecycle (prepare, bind, execute, iterate, close)
//! - `Outcome` and `Cx` re-exported from asupersync for cancel-correct operations

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod driver;
pub mod error;
pub mod row;
pub mod value;

pub use connection::{Connection, IsolationLevel, PreparedStatement, TransactionOps};
pub use driver::{Driver, DriverConn, ExecResult, NamedValue, Rows, Stmt, Tx};
pub use error::{Error, Result};
pub use row::{ColumnInfo, FromValue, Row};
pub use value::Value;
