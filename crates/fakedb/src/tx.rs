//! Transactions on a fake connection.
//!
//! There is nothing to commit or undo: writes land in the dataset as soon as
//! a statement runs. A transaction only tracks that one is open, and lets the
//! catcher's commit and rollback hooks fail the call.

use crate::conn::ConnShared;
use fakedb_core::{Error, Result, Tx};
use std::sync::Arc;

#[derive(Debug)]
pub struct FakeTx {
    conn: Arc<ConnShared>,
}

impl FakeTx {
    pub(crate) fn new(conn: Arc<ConnShared>) -> Self {
        Self { conn }
    }

    /// End the transaction without consulting any hook.
    pub(crate) fn discard(self) {
        self.conn.end_tx();
    }
}

impl Tx for FakeTx {
    fn commit(self) -> Result<()> {
        self.conn.end_tx();
        tracing::debug!(database = %self.conn.name, "Transaction committed");
        if self.conn.catcher.bad_commit() {
            return Err(Error::bad_conn());
        }
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        self.conn.end_tx();
        tracing::debug!(database = %self.conn.name, "Transaction rolled back");
        if self.conn.catcher.bad_rollback() {
            return Err(Error::bad_conn());
        }
        Ok(())
    }
}
