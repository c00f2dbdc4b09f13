//! Statement-level driver SPI.
//!
//! These synchronous traits model the lifecycle a generic database layer
//! drives: open a connection, prepare a statement, bind arguments, execute
//! or iterate a cursor, then close everything. [`crate::Connection`] is the
//! async, connection-level surface built on top of them.

use crate::error::{Error, QueryErrorKind, Result};
use crate::row::Row;
use crate::value::Value;

/// A bound argument with its 1-based ordinal and optional name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub ordinal: usize,
    pub name: Option<String>,
    pub value: Value,
}

impl NamedValue {
    /// Wrap positional values, numbering them from 1.
    pub fn positional(values: &[Value]) -> Vec<NamedValue> {
        values
            .iter()
            .enumerate()
            .map(|(i, value)| NamedValue {
                ordinal: i + 1,
                name: None,
                value: value.clone(),
            })
            .collect()
    }

    /// Strip ordinals and names, keeping the values in order.
    pub fn values(args: &[NamedValue]) -> Vec<Value> {
        args.iter().map(|arg| arg.value.clone()).collect()
    }
}

/// The outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    last_insert_id: Option<i64>,
    rows_affected: u64,
}

impl ExecResult {
    /// Result of an INSERT.
    pub const fn new(last_insert_id: i64, rows_affected: u64) -> Self {
        Self {
            last_insert_id: Some(last_insert_id),
            rows_affected,
        }
    }

    /// Result of an UPDATE or DELETE, which has no insert id.
    pub const fn affected(rows_affected: u64) -> Self {
        Self {
            last_insert_id: None,
            rows_affected,
        }
    }

    /// The id generated by an INSERT.
    pub fn last_insert_id(&self) -> Result<i64> {
        self.last_insert_id.ok_or_else(|| {
            Error::query(
                QueryErrorKind::Unsupported,
                None,
                "LastInsertId is not supported by this statement",
            )
        })
    }

    /// Number of rows changed by the statement.
    pub const fn rows_affected(&self) -> u64 {
        self.rows_affected
    }
}

/// Opens connections by database name.
pub trait Driver {
    type Conn: DriverConn;

    fn open(&self, name: &str) -> Result<Self::Conn>;
}

/// A connection that can prepare statements and begin transactions.
pub trait DriverConn {
    type Stmt: Stmt;
    type Tx: Tx;

    /// Prepare `sql` for execution. Placeholders are `?`.
    fn prepare(&self, sql: &str) -> Result<Self::Stmt>;

    /// Begin a transaction. Only one may be open at a time.
    fn begin(&self) -> Result<Self::Tx>;

    /// Close the connection. Statements prepared on it stop working.
    fn close(&self) -> Result<()>;
}

/// A prepared statement.
pub trait Stmt {
    type Rows: Rows;

    /// Close the statement. Closing twice is not an error.
    fn close(&mut self) -> Result<()>;

    /// Number of placeholder parameters.
    fn num_input(&self) -> usize;

    /// Execute a statement that doesn't return rows, such as an INSERT or UPDATE.
    fn exec(&self, args: &[NamedValue]) -> Result<ExecResult>;

    /// Execute a statement that may return rows, such as a SELECT.
    fn query(&self, args: &[NamedValue]) -> Result<Self::Rows>;
}

/// A cursor over one or more result sets.
pub trait Rows {
    /// Column names of the current result set.
    fn columns(&self) -> &[String];

    /// Advance to the next row. `Ok(None)` once the set is exhausted.
    fn next_row(&mut self) -> Result<Option<Row>>;

    /// Close the cursor. Closing twice is not an error.
    fn close(&mut self) -> Result<()>;

    fn has_next_result_set(&self) -> bool {
        false
    }

    /// Move to the next result set. Returns `false` when there is none.
    fn next_result_set(&mut self) -> Result<bool> {
        Ok(false)
    }
}

/// An open transaction.
pub trait Tx {
    fn commit(self) -> Result<()>;
    fn rollback(self) -> Result<()>;
}
