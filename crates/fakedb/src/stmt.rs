//! Prepared statements.

use crate::bind::{self, Command};
use crate::catcher::FakeResponse;
use crate::conn::ConnShared;
use crate::rows::RowsCursor;
use crate::sql::ResultSet;
use fakedb_core::error::{ConnectionError, ConnectionErrorKind, QueryErrorKind};
use fakedb_core::{Error, ExecResult, NamedValue, Result, Stmt, Value};
use rand::Rng;
use std::sync::Arc;

const CLOSED_MESSAGE: &str = "fake_db_driver: statement has been closed";

fn closed_error() -> Error {
    Error::query(QueryErrorKind::Database, None, CLOSED_MESSAGE)
}

/// A prepared statement on a [`crate::FakeConn`].
///
/// Text holding several `;`-separated statements prepares a chain: `query`
/// returns one result set per statement and `exec` runs them in order.
#[derive(Debug)]
pub struct FakeStmt {
    conn: Arc<ConnShared>,
    query: String,
    command: Command,
    placeholders: usize,
    closed: bool,
    next: Option<Box<FakeStmt>>,
}

impl FakeStmt {
    pub(crate) fn new(conn: Arc<ConnShared>, query: String, next: Option<FakeStmt>) -> Self {
        let command = Command::classify(&query);
        let placeholders = bind::count_placeholders(&bind::strip_double_quotes(&query));
        Self {
            conn,
            query,
            command,
            placeholders,
            closed: false,
            next: next.map(Box::new),
        }
    }

    /// The statement text as prepared.
    pub fn sql(&self) -> &str {
        &self.query
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of statements in the chain, this one included.
    pub fn chain_len(&self) -> usize {
        self.chain().count()
    }

    fn chain(&self) -> impl Iterator<Item = &FakeStmt> {
        std::iter::successors(Some(self), |stmt| stmt.next.as_deref())
    }

    /// Split `args` across the chain by placeholder count. The last statement
    /// gets whatever is left.
    fn split_args<'a>(&self, args: &'a [NamedValue]) -> Vec<(&FakeStmt, &'a [NamedValue])> {
        let total = self.chain_len();
        let mut rest = args;
        self.chain()
            .enumerate()
            .map(|(i, stmt)| {
                let take = if i + 1 == total {
                    rest.len()
                } else {
                    stmt.placeholders.min(rest.len())
                };
                let (mine, tail) = rest.split_at(take);
                rest = tail;
                (stmt, mine)
            })
            .collect()
    }

    /// Result columns of this statement, when it is a SELECT the evaluator
    /// understands. Placeholders are bound to NULL for the lookup.
    pub fn describe(&self) -> Result<Option<Vec<String>>> {
        if self.closed {
            return Err(closed_error());
        }
        if self.command != Command::Select {
            return Ok(None);
        }
        let nulls = vec![Value::Null; self.placeholders];
        let bound = bind::bind(
            &bind::strip_double_quotes(&self.query),
            &NamedValue::positional(&nulls),
        );
        Ok(self.conn.describe(&bound).ok().flatten())
    }

    /// Bind `args` and resolve the answer: a matching catcher response, or
    /// the outcome of running the bound SQL against the dataset.
    fn resolve(&self, args: &[NamedValue]) -> Result<(String, FakeResponse)> {
        if self.closed {
            return Err(closed_error());
        }
        self.conn.ensure_open()?;

        let bound = bind::bind(&bind::strip_double_quotes(&self.query), args);
        if let Some(response) = self.conn.catcher.find_response(&bound, args) {
            tracing::debug!(sql = %bound, pattern = response.pattern(), "Answered by catcher");
            return Ok((bound, response));
        }
        let response = match self.command {
            Command::Other(_) => FakeResponse::default(),
            _ => FakeResponse::from_output(self.conn.run(&bound)?),
        };
        Ok((bound, response))
    }

    fn exec_one(&self, args: &[NamedValue]) -> Result<ExecResult> {
        let (bound, response) = self.resolve(args)?;
        tracing::debug!(command = self.command.as_str(), sql = %bound, "exec");

        if response.exceptions().exec_bad_connection() {
            return Err(Error::bad_conn());
        }
        if let Some(err) = response.error() {
            return Err(err.clone());
        }
        if let Some(callback) = response.callback() {
            callback(bound.as_str(), args);
        }

        match self.command {
            Command::Insert => {
                let mut id = response.last_insert_id();
                if id == 0 {
                    id = rand::thread_rng().gen_range(1..i64::MAX);
                }
                Ok(ExecResult::new(id, response.rows_affected().max(1)))
            }
            Command::Update | Command::Delete => Ok(ExecResult::affected(response.rows_affected())),
            _ => Err(Error::query(
                QueryErrorKind::Unsupported,
                Some(bound.as_str()),
                format!(
                    "unimplemented statement Exec command type of {:?}",
                    self.command.as_str()
                ),
            )),
        }
    }

    fn query_one(&self, args: &[NamedValue]) -> Result<(ResultSet, Option<(usize, Error)>)> {
        let (bound, response) = self.resolve(args)?;
        tracing::debug!(command = self.command.as_str(), sql = %bound, "query");

        if response.exceptions().query_bad_connection() {
            return Err(Error::bad_conn());
        }
        if let Some(err) = response.error() {
            return Err(err.clone());
        }
        if let Some(callback) = response.callback() {
            callback(bound.as_str(), args);
        }
        Ok((response.reply().clone(), response.row_error().cloned()))
    }
}

impl Stmt for FakeStmt {
    type Rows = RowsCursor;

    fn close(&mut self) -> Result<()> {
        if self.conn.is_closed() {
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Disconnected,
                message: "fakedb: statement's connection is already closed".to_string(),
            }));
        }
        self.closed = true;
        match self.next.as_deref_mut() {
            Some(next) => next.close(),
            None => Ok(()),
        }
    }

    fn num_input(&self) -> usize {
        self.chain().map(|stmt| stmt.placeholders).sum()
    }

    #[tracing::instrument(level = "debug", skip(self, args), fields(sql = %self.query))]
    fn exec(&self, args: &[NamedValue]) -> Result<ExecResult> {
        let mut rows_affected = 0;
        let mut last_insert_id = None;
        for (stmt, part) in self.split_args(args) {
            let result = stmt.exec_one(part)?;
            rows_affected += result.rows_affected();
            if let Ok(id) = result.last_insert_id() {
                last_insert_id = Some(id);
            }
        }
        Ok(match last_insert_id {
            Some(id) => ExecResult::new(id, rows_affected),
            None => ExecResult::affected(rows_affected),
        })
    }

    #[tracing::instrument(level = "debug", skip(self, args), fields(sql = %self.query))]
    fn query(&self, args: &[NamedValue]) -> Result<RowsCursor> {
        let sets = self
            .split_args(args)
            .into_iter()
            .map(|(stmt, part)| stmt.query_one(part))
            .collect::<Result<Vec<_>>>()?;
        Ok(RowsCursor::with_errors(sets))
    }
}
