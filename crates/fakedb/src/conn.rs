//! The fake driver and its connections.

use crate::bind;
use crate::catcher::Catcher;
use crate::config::{self, FakeConfig};
use crate::registry::{self, SharedDataset};
use crate::sql::{self, SqlOutput};
use crate::stmt::FakeStmt;
use crate::tx::FakeTx;
use fakedb_core::error::{
    ConnectionError, ConnectionErrorKind, Error, QueryErrorKind, Result, TransactionErrorKind,
};
use fakedb_core::{Driver, DriverConn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Opens [`FakeConn`]s against registered datasets.
///
/// Every connection opened by one driver shares its [`Catcher`].
#[derive(Debug, Clone)]
pub struct FakeDriver {
    config: FakeConfig,
    catcher: Arc<Catcher>,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new(FakeConfig::default())
    }
}

impl FakeDriver {
    pub fn new(config: FakeConfig) -> Self {
        let catcher = Arc::new(Catcher::new());
        catcher.set_logging(config.log_lookups);
        Self { config, catcher }
    }

    /// Share an existing catcher, e.g. one the test keeps a handle to.
    pub fn with_catcher(mut self, catcher: Arc<Catcher>) -> Self {
        self.catcher = catcher;
        self
    }

    pub fn catcher(&self) -> &Arc<Catcher> {
        &self.catcher
    }

    pub fn config(&self) -> &FakeConfig {
        &self.config
    }

    /// Open the dataset named in the config.
    pub fn connect(&self) -> Result<FakeConn> {
        self.open(&self.config.database)
    }

    fn resolve_dataset(&self, name: &str) -> Result<SharedDataset> {
        let shared = match registry::get(name) {
            Some(shared) => shared,
            None if self.config.create_if_missing || self.config.fixture.is_some() => {
                registry::open_or_create(name)
            }
            None => {
                return Err(Error::Connection(ConnectionError {
                    kind: ConnectionErrorKind::Connect,
                    message: format!("fakedb: no dataset registered as {:?}", name),
                }));
            }
        };

        if registry::lock(&shared).is_empty() {
            if let Some(fixture) = self.config.load_fixture()? {
                let mut dataset = registry::lock(&shared);
                // Another connection may have seeded it while the file was read.
                if dataset.is_empty() {
                    *dataset = fixture;
                    tracing::debug!(database = name, "Seeded dataset from fixture");
                }
            }
        }
        Ok(shared)
    }
}

impl Driver for FakeDriver {
    type Conn = FakeConn;

    #[tracing::instrument(level = "debug", skip(self))]
    fn open(&self, name: &str) -> Result<FakeConn> {
        config::check_database_name(name)?;
        self.config.validate()?;
        let dataset = self.resolve_dataset(name)?;
        tracing::debug!(database = name, "Opened fake connection");
        Ok(FakeConn {
            shared: Arc::new(ConnShared {
                name: name.to_string(),
                dataset,
                catcher: Arc::clone(&self.catcher),
                closed: AtomicBool::new(false),
                in_tx: AtomicBool::new(false),
            }),
        })
    }
}

/// State shared by a connection and the statements and transactions it hands out.
#[derive(Debug)]
pub(crate) struct ConnShared {
    pub(crate) name: String,
    dataset: SharedDataset,
    pub(crate) catcher: Arc<Catcher>,
    closed: AtomicBool,
    in_tx: AtomicBool,
}

impl ConnShared {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Disconnected,
                message: format!("fakedb: connection to {:?} is closed", self.name),
            }));
        }
        Ok(())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Run bound SQL against the connection's dataset.
    pub(crate) fn run(&self, sql: &str) -> Result<SqlOutput> {
        let mut dataset = registry::lock(&self.dataset);
        sql::run(sql, &mut dataset)
    }

    /// Result columns of a bound SELECT, read from the dataset's schema.
    pub(crate) fn describe(&self, sql: &str) -> Result<Option<Vec<String>>> {
        let dataset = registry::lock(&self.dataset);
        sql::describe(sql, &dataset)
    }

    /// Clear the current transaction. Returns whether one was active.
    pub(crate) fn end_tx(&self) -> bool {
        self.in_tx.swap(false, Ordering::AcqRel)
    }
}

/// A connection to a named in-memory dataset.
///
/// Cloning yields another handle to the same connection.
#[derive(Debug, Clone)]
pub struct FakeConn {
    shared: Arc<ConnShared>,
}

impl FakeConn {
    /// Name of the dataset this connection is bound to.
    pub fn database(&self) -> &str {
        &self.shared.name
    }

    pub fn catcher(&self) -> &Arc<Catcher> {
        &self.shared.catcher
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn in_transaction(&self) -> bool {
        self.shared.in_tx.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        self.shared.ensure_open()
    }
}

impl DriverConn for FakeConn {
    type Stmt = FakeStmt;
    type Tx = FakeTx;

    fn prepare(&self, sql: &str) -> Result<FakeStmt> {
        self.shared.ensure_open()?;
        let mut pieces = bind::split_statements(sql);
        tracing::trace!(sql, statements = pieces.len(), "Preparing statement");

        let mut chain: Option<FakeStmt> = None;
        while let Some(piece) = pieces.pop() {
            chain = Some(FakeStmt::new(Arc::clone(&self.shared), piece, chain));
        }
        chain.ok_or_else(|| Error::query(QueryErrorKind::Syntax, Some(sql), "empty query"))
    }

    fn begin(&self) -> Result<FakeTx> {
        self.shared.ensure_open()?;
        if self.shared.in_tx.swap(true, Ordering::AcqRel) {
            return Err(Error::transaction(
                TransactionErrorKind::NestedNotSupported,
                "fakedb: already in a transaction",
            ));
        }
        tracing::debug!(database = %self.shared.name, "Transaction started");
        Ok(FakeTx::new(Arc::clone(&self.shared)))
    }

    fn close(&self) -> Result<()> {
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            self.shared.end_tx();
            tracing::debug!(database = %self.shared.name, "Connection closed");
        }
        Ok(())
    }
}
