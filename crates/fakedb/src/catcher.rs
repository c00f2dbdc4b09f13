//! Canned responses matched by query text.
//!
//! A [`Catcher`] holds an ordered list of [`FakeResponse`]s. When a
//! statement runs, the bound query is offered to the catcher first; the
//! first response whose pattern occurs in the query (and whose expected
//! arguments, if any, equal the bound ones) answers instead of the
//! in-memory dataset. Responses also carry the failure hooks a test uses
//! to simulate broken connections.

use crate::dataset::Record;
use crate::sql::{ResultSet, SqlOutput};
use fakedb_core::{Error, NamedValue, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// A failure hook. Returning `true` makes the guarded operation fail with
/// [`Error::bad_conn`].
pub type Hook = Arc<dyn Fn() -> bool + Send + Sync>;

/// Invoked with the bound query and its arguments after a statement succeeds.
pub type Callback = Arc<dyn Fn(&str, &[NamedValue]) + Send + Sync>;

/// Bad-connection hooks for statement execution.
#[derive(Clone, Default)]
pub struct Exceptions {
    pub hook_query_bad_connection: Option<Hook>,
    pub hook_exec_bad_connection: Option<Hook>,
}

impl Exceptions {
    pub fn query_bad_connection(&self) -> bool {
        self.hook_query_bad_connection
            .as_ref()
            .is_some_and(|hook| hook())
    }

    pub fn exec_bad_connection(&self) -> bool {
        self.hook_exec_bad_connection
            .as_ref()
            .is_some_and(|hook| hook())
    }
}

impl fmt::Debug for Exceptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exceptions")
            .field(
                "hook_query_bad_connection",
                &self.hook_query_bad_connection.is_some(),
            )
            .field(
                "hook_exec_bad_connection",
                &self.hook_exec_bad_connection.is_some(),
            )
            .finish()
    }
}

/// A canned answer for queries containing `pattern`.
#[derive(Clone, Default)]
pub struct FakeResponse {
    pattern: String,
    args: Option<Vec<Value>>,
    reply: ResultSet,
    rows_affected: u64,
    last_insert_id: i64,
    error: Option<Error>,
    exceptions: Exceptions,
    callback: Option<Callback>,
    once: bool,
    row_error: Option<(usize, Error)>,
}

impl FakeResponse {
    /// Respond to any query containing `pattern`. An empty pattern matches everything.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    /// Build the response a dataset run produced.
    pub(crate) fn from_output(output: SqlOutput) -> Self {
        match output {
            SqlOutput::Rows(reply) => Self {
                reply,
                ..Self::default()
            },
            SqlOutput::Mutation {
                rows_affected,
                last_insert_id,
            } => Self {
                rows_affected,
                last_insert_id: last_insert_id.unwrap_or(0),
                ..Self::default()
            },
        }
    }

    /// Only match when the bound arguments equal `args`.
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = Some(args);
        self
    }

    /// Reply with these records. Column names come from the first record.
    pub fn with_reply(mut self, records: Vec<Record>) -> Self {
        self.reply = ResultSet::from_records(&records);
        self
    }

    /// Reply with explicit columns and positional rows.
    pub fn with_rows(mut self, columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        self.reply = ResultSet::new(columns, rows);
        self
    }

    pub fn with_rows_affected(mut self, rows_affected: u64) -> Self {
        self.rows_affected = rows_affected;
        self
    }

    /// Insert id reported by `exec`. Zero means "pick a random id".
    pub fn with_last_insert_id(mut self, id: i64) -> Self {
        self.last_insert_id = id;
        self
    }

    /// Fail matching statements with `error`.
    pub fn with_error(mut self, error: Error) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_query_exception(mut self, hook: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.exceptions.hook_query_bad_connection = Some(Arc::new(hook));
        self
    }

    pub fn with_exec_exception(mut self, hook: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.exceptions.hook_exec_bad_connection = Some(Arc::new(hook));
        self
    }

    pub fn with_callback(
        mut self,
        callback: impl Fn(&str, &[NamedValue]) + Send + Sync + 'static,
    ) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Remove the response from the catcher after its first match.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Fail the cursor with `error` when it reaches row `position` (0-based).
    ///
    /// A position at or past the last row fires when the cursor would
    /// otherwise report the end of the result set.
    pub fn with_row_error(mut self, position: usize, error: Error) -> Self {
        self.row_error = Some((position, error));
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn reply(&self) -> &ResultSet {
        &self.reply
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    pub fn last_insert_id(&self) -> i64 {
        self.last_insert_id
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn exceptions(&self) -> &Exceptions {
        &self.exceptions
    }

    pub fn callback(&self) -> Option<&Callback> {
        self.callback.as_ref()
    }

    pub fn row_error(&self) -> Option<&(usize, Error)> {
        self.row_error.as_ref()
    }

    pub fn is_once(&self) -> bool {
        self.once
    }

    /// Does this response answer `query` bound with `args`?
    pub fn matches(&self, query: &str, args: &[NamedValue]) -> bool {
        if !query.contains(&self.pattern) {
            return false;
        }
        match &self.args {
            Some(expected) => {
                expected.len() == args.len()
                    && expected.iter().zip(args).all(|(e, a)| *e == a.value)
            }
            None => true,
        }
    }
}

impl fmt::Debug for FakeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeResponse")
            .field("pattern", &self.pattern)
            .field("args", &self.args)
            .field("reply", &self.reply)
            .field("rows_affected", &self.rows_affected)
            .field("last_insert_id", &self.last_insert_id)
            .field("error", &self.error)
            .field("exceptions", &self.exceptions)
            .field("callback", &self.callback.is_some())
            .field("once", &self.once)
            .field("row_error", &self.row_error)
            .finish()
    }
}

/// Ordered registry of canned responses plus transaction hooks.
#[derive(Default)]
pub struct Catcher {
    responses: Mutex<Vec<FakeResponse>>,
    logging: AtomicBool,
    hook_bad_commit: RwLock<Option<Hook>>,
    hook_bad_rollback: RwLock<Option<Hook>>,
}

impl fmt::Debug for Catcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catcher")
            .field("responses", &self.len())
            .field("logging", &self.logging())
            .finish_non_exhaustive()
    }
}

impl Catcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append responses. Earlier responses take precedence.
    pub fn attach(&self, responses: impl IntoIterator<Item = FakeResponse>) -> &Self {
        let mut list = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        let before = list.len();
        list.extend(responses);
        tracing::debug!(added = list.len() - before, total = list.len(), "Attached responses");
        self
    }

    /// Drop every response and hook, and turn logging off.
    pub fn reset(&self) -> &Self {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self
            .hook_bad_commit
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        *self
            .hook_bad_rollback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.logging.store(false, Ordering::Relaxed);
        self
    }

    pub fn len(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Emit an `info` event for every lookup.
    pub fn set_logging(&self, enabled: bool) -> &Self {
        self.logging.store(enabled, Ordering::Relaxed);
        self
    }

    pub fn logging(&self) -> bool {
        self.logging.load(Ordering::Relaxed)
    }

    /// The first response matching `query` and `args`.
    ///
    /// A one-time response is removed by the lookup that returns it.
    pub fn find_response(&self, query: &str, args: &[NamedValue]) -> Option<FakeResponse> {
        let mut list = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        let found = list
            .iter()
            .position(|response| response.matches(query, args))
            .map(|idx| {
                if list[idx].once {
                    list.remove(idx)
                } else {
                    list[idx].clone()
                }
            });
        drop(list);

        if self.logging() {
            match &found {
                Some(response) => tracing::info!(
                    query,
                    args = ?NamedValue::values(args),
                    pattern = response.pattern(),
                    "Catcher matched response"
                ),
                None => tracing::info!(
                    query,
                    args = ?NamedValue::values(args),
                    "Catcher found no response"
                ),
            }
        }
        found
    }

    /// Make `commit` fail with a bad-connection error whenever `hook` returns true.
    pub fn set_hook_bad_commit(&self, hook: impl Fn() -> bool + Send + Sync + 'static) -> &Self {
        *self
            .hook_bad_commit
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
        self
    }

    /// Make `rollback` fail with a bad-connection error whenever `hook` returns true.
    pub fn set_hook_bad_rollback(&self, hook: impl Fn() -> bool + Send + Sync + 'static) -> &Self {
        *self
            .hook_bad_rollback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
        self
    }

    pub(crate) fn bad_commit(&self) -> bool {
        Self::fire(&self.hook_bad_commit)
    }

    pub(crate) fn bad_rollback(&self) -> bool {
        Self::fire(&self.hook_bad_rollback)
    }

    fn fire(slot: &RwLock<Option<Hook>>) -> bool {
        // Clone out so the hook runs without the lock held.
        let hook = slot.read().unwrap_or_else(PoisonError::into_inner).clone();
        hook.is_some_and(|hook| hook())
    }
}
