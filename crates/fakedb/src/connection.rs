//! The async [`Connection`] surface of [`FakeConn`].
//!
//! Every method does its work synchronously through the statement-level
//! driver and hands back a ready future.

use crate::conn::FakeConn;
use crate::tx::FakeTx;
use fakedb_core::error::TransactionErrorKind;
use fakedb_core::{
    Connection, Cx, DriverConn, Error, IsolationLevel, NamedValue, Outcome, PreparedStatement,
    Result, Row, Rows, Stmt, TransactionOps, Tx, Value,
};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

static NEXT_STATEMENT_ID: AtomicU64 = AtomicU64::new(1);

impl FakeConn {
    fn query_sync(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut stmt = DriverConn::prepare(self, sql)?;
        let mut rows = stmt.query(&NamedValue::positional(params))?;
        let collected = rows.collect_rows();
        rows.close()?;
        stmt.close()?;
        collected
    }

    fn execute_sync(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let mut stmt = DriverConn::prepare(self, sql)?;
        let result = stmt.exec(&NamedValue::positional(params));
        stmt.close()?;
        result.map(|r| r.rows_affected())
    }

    fn insert_sync(&self, sql: &str, params: &[Value]) -> Result<i64> {
        let mut stmt = DriverConn::prepare(self, sql)?;
        let result = stmt.exec(&NamedValue::positional(params));
        stmt.close()?;
        result?.last_insert_id()
    }

    fn ping_sync(&self) -> Result<()> {
        self.ensure_open()
    }
}

/// An open transaction borrowed from a [`FakeConn`].
///
/// Dropping it without commit or rollback ends the transaction silently.
pub struct FakeTransaction<'conn> {
    conn: &'conn FakeConn,
    tx: Option<FakeTx>,
    isolation: IsolationLevel,
    savepoints: Mutex<Vec<String>>,
}

impl<'conn> FakeTransaction<'conn> {
    fn new(conn: &'conn FakeConn, tx: FakeTx, isolation: IsolationLevel) -> Self {
        Self {
            conn,
            tx: Some(tx),
            isolation,
            savepoints: Mutex::new(Vec::new()),
        }
    }

    /// The requested isolation level. It is recorded only.
    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    /// Savepoint names, oldest first.
    pub fn savepoints(&self) -> Vec<String> {
        self.savepoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn savepoint_sync(&self, name: &str) -> Result<()> {
        self.conn.ping_sync()?;
        self.savepoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.to_string());
        tracing::trace!(savepoint = name, "Savepoint created");
        Ok(())
    }

    /// Drop savepoints newer than `name`; `keep` decides whether `name` stays.
    fn unwind_to(&self, name: &str, keep: bool) -> Result<()> {
        let mut savepoints = self
            .savepoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(pos) = savepoints.iter().rposition(|s| s == name) else {
            return Err(Error::transaction(
                TransactionErrorKind::SavepointNotFound,
                format!("no such savepoint: {}", name),
            ));
        };
        savepoints.truncate(if keep { pos + 1 } else { pos });
        Ok(())
    }

    fn finish(&mut self, commit: bool) -> Result<()> {
        let Some(tx) = self.tx.take() else {
            return Err(Error::transaction(
                TransactionErrorKind::NotActive,
                "transaction already finished",
            ));
        };
        if commit { tx.commit() } else { tx.rollback() }
    }
}

impl Drop for FakeTransaction<'_> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            tracing::debug!("Transaction dropped without commit or rollback");
            tx.discard();
        }
    }
}

impl std::fmt::Debug for FakeTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeTransaction")
            .field("database", &self.conn.database())
            .field("active", &self.tx.is_some())
            .field("isolation", &self.isolation)
            .finish_non_exhaustive()
    }
}

impl Connection for FakeConn {
    type Tx<'conn>
        = FakeTransaction<'conn>
    where
        Self: 'conn;

    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.query_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn query_one(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let result = self
            .query_sync(sql, params)
            .map(|rows| rows.into_iter().next());
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.execute_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        let result = self.insert_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn batch(
        &self,
        _cx: &Cx,
        statements: &[(String, Vec<Value>)],
    ) -> impl Future<Output = Outcome<Vec<u64>, Error>> + Send {
        let mut results = Vec::with_capacity(statements.len());
        let mut error = None;

        for (sql, params) in statements {
            match self.execute_sync(sql, params) {
                Ok(n) => results.push(n),
                Err(e) => {
                    error = Some(e);
                    break;
                }
            }
        }

        async move {
            match error {
                Some(e) => Outcome::Err(e),
                None => Outcome::Ok(results),
            }
        }
    }

    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        self.begin_with(cx, IsolationLevel::default())
    }

    fn begin_with(
        &self,
        _cx: &Cx,
        isolation: IsolationLevel,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        let result = DriverConn::begin(self).map(|tx| {
            tracing::debug!(isolation = isolation.as_sql(), "Isolation level recorded");
            FakeTransaction::new(self, tx, isolation)
        });
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn prepare(
        &self,
        _cx: &Cx,
        sql: &str,
    ) -> impl Future<Output = Outcome<PreparedStatement, Error>> + Send {
        let result = DriverConn::prepare(self, sql).and_then(|mut stmt| {
            let param_count = stmt.num_input();
            let columns = stmt.describe()?;
            stmt.close()?;
            let id = NEXT_STATEMENT_ID.fetch_add(1, Ordering::Relaxed);
            Ok(match columns {
                Some(columns) => {
                    PreparedStatement::with_columns(id, sql.to_string(), param_count, columns)
                }
                None => PreparedStatement::new(id, sql.to_string(), param_count),
            })
        });
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn query_prepared(
        &self,
        _cx: &Cx,
        stmt: &PreparedStatement,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = stmt
            .validate_params(params)
            .and_then(|()| self.query_sync(stmt.sql(), params));
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn execute_prepared(
        &self,
        _cx: &Cx,
        stmt: &PreparedStatement,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = stmt
            .validate_params(params)
            .and_then(|()| self.execute_sync(stmt.sql(), params));
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn ping(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = self.ping_sync();
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    async fn close(self, _cx: &Cx) -> Result<()> {
        DriverConn::close(&self)
    }
}

impl TransactionOps for FakeTransaction<'_> {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.conn.query_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn query_one(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let result = self
            .conn
            .query_sync(sql, params)
            .map(|rows| rows.into_iter().next());
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.conn.execute_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn savepoint(&self, _cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = self.savepoint_sync(name);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn rollback_to(&self, _cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = self.unwind_to(name, true);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn release(&self, _cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = self.unwind_to(name, false);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    async fn commit(mut self, _cx: &Cx) -> Outcome<(), Error> {
        self.finish(true).map_or_else(Outcome::Err, Outcome::Ok)
    }

    async fn rollback(mut self, _cx: &Cx) -> Outcome<(), Error> {
        self.finish(false).map_or_else(Outcome::Err, Outcome::Ok)
    }
}
