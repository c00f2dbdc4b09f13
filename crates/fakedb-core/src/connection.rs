//! The async, connection-level surface test code talks to.
//!
//! Every call takes an asupersync `Cx` and resolves to an `Outcome`, so a
//! fake connection can stand in wherever a real driver's connection is
//! expected.

use crate::error::{Error, QueryErrorKind, Result};
use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};
use std::future::Future;

/// Isolation level requested when a transaction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// The level as it is spelled in `SET TRANSACTION ISOLATION LEVEL`.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Handle returned by [`Connection::prepare`].
///
/// It carries the SQL text, the number of `?` placeholders, and for
/// SELECTs the output column names known at prepare time.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    id: u64,
    sql: String,
    param_count: usize,
    columns: Option<Vec<String>>,
}

impl PreparedStatement {
    #[must_use]
    pub fn new(id: u64, sql: String, param_count: usize) -> Self {
        Self {
            id,
            sql,
            param_count,
            columns: None,
        }
    }

    /// A handle whose result columns are already known.
    #[must_use]
    pub fn with_columns(id: u64, sql: String, param_count: usize, columns: Vec<String>) -> Self {
        Self {
            columns: Some(columns),
            ..Self::new(id, sql, param_count)
        }
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub const fn param_count(&self) -> usize {
        self.param_count
    }

    /// Result column names, when the statement is a SELECT.
    #[must_use]
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Fail unless exactly [`Self::param_count`] values are supplied.
    pub fn validate_params(&self, params: &[Value]) -> Result<()> {
        if params.len() == self.param_count {
            return Ok(());
        }
        Err(Error::query(
            QueryErrorKind::Database,
            Some(self.sql.as_str()),
            format!(
                "prepared statement {} takes {} parameters, got {}",
                self.id,
                self.param_count,
                params.len()
            ),
        ))
    }
}

/// Query, mutate and start transactions on one connection.
///
/// ```rust,ignore
/// let rows = conn.query(&cx, "SELECT * FROM users WHERE id = ?", &[Value::BigInt(1)]).await;
///
/// let tx = conn.begin(&cx).await?;
/// tx.execute(&cx, "INSERT INTO logs (msg) VALUES (?)", &[Value::from("action")]).await;
/// tx.commit(&cx).await;
/// ```
pub trait Connection: Send + Sync {
    /// Transaction handle borrowing the connection.
    type Tx<'conn>: TransactionOps
    where
        Self: 'conn;

    /// Every row of every result set.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, crate::Error>> + Send;

    /// The first row, or `None` for an empty result.
    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, crate::Error>> + Send;

    /// Rows affected by an INSERT, UPDATE or DELETE.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, crate::Error>> + Send;

    /// Id of the last row an INSERT wrote.
    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, crate::Error>> + Send;

    /// Run statements in order, collecting rows affected. The first failure
    /// aborts the batch.
    fn batch(
        &self,
        cx: &Cx,
        statements: &[(String, Vec<Value>)],
    ) -> impl Future<Output = Outcome<Vec<u64>, crate::Error>> + Send;

    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, crate::Error>> + Send;

    fn begin_with(
        &self,
        cx: &Cx,
        isolation: IsolationLevel,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, crate::Error>> + Send;

    fn prepare(
        &self,
        cx: &Cx,
        sql: &str,
    ) -> impl Future<Output = Outcome<PreparedStatement, crate::Error>> + Send;

    fn query_prepared(
        &self,
        cx: &Cx,
        stmt: &PreparedStatement,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, crate::Error>> + Send;

    fn execute_prepared(
        &self,
        cx: &Cx,
        stmt: &PreparedStatement,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, crate::Error>> + Send;

    fn ping(&self, cx: &Cx) -> impl Future<Output = Outcome<(), crate::Error>> + Send;

    /// `ping` as a bool.
    fn is_valid(&self, cx: &Cx) -> impl Future<Output = bool> + Send {
        async {
            match self.ping(cx).await {
                Outcome::Ok(()) => true,
                Outcome::Err(_) | Outcome::Cancelled(_) | Outcome::Panicked(_) => false,
            }
        }
    }

    /// Close the connection. Later calls on any handle to it fail.
    fn close(self, cx: &Cx) -> impl Future<Output = Result<()>> + Send;
}

/// Work done inside an open transaction.
pub trait TransactionOps: Send {
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, crate::Error>> + Send;

    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, crate::Error>> + Send;

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, crate::Error>> + Send;

    /// Push a named savepoint.
    fn savepoint(
        &self,
        cx: &Cx,
        name: &str,
    ) -> impl Future<Output = Outcome<(), crate::Error>> + Send;

    /// Drop savepoints created after `name`.
    fn rollback_to(
        &self,
        cx: &Cx,
        name: &str,
    ) -> impl Future<Output = Outcome<(), crate::Error>> + Send;

    /// Drop `name` and every savepoint after it.
    fn release(
        &self,
        cx: &Cx,
        name: &str,
    ) -> impl Future<Output = Outcome<(), crate::Error>> + Send;

    fn commit(self, cx: &Cx) -> impl Future<Output = Outcome<(), crate::Error>> + Send;

    fn rollback(self, cx: &Cx) -> impl Future<Output = Outcome<(), crate::Error>> + Send;
}
