//! Error types for fakedb operations.
//!
//! Errors are `Clone` so a fixture can hand the same error back on every
//! matching call.

use std::fmt;
use std::sync::Arc;

/// The primary error type for all driver operations.
#[derive(Debug, Clone)]
pub enum Error {
    /// Connection-related errors (open, close, broken connection)
    Connection(ConnectionError),
    /// Query execution errors
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Transaction errors
    Transaction(TransactionError),
    /// Configuration errors
    Config(ConfigError),
    /// I/O errors
    Io(Arc<std::io::Error>),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to open the connection
    Connect,
    /// Operation on a connection that was already closed
    Disconnected,
    /// The driver reports the connection as unusable; callers may retry on a fresh one
    BadConnection,
}

#[derive(Debug, Clone)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub position: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Table or column not found
    NotFound,
    /// Statement type the driver does not handle
    Unsupported,
    /// Other database error
    Database,
}

#[derive(Debug, Clone)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// A transaction is already open on this connection
    NestedNotSupported,
    /// No transaction is open
    NotActive,
    /// Savepoint not found
    SavepointNotFound,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub message: String,
}

impl Error {
    /// The error a driver returns when it considers its connection broken.
    pub fn bad_conn() -> Self {
        Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::BadConnection,
            message: "driver: bad connection".to_string(),
        })
    }

    /// Is this the driver's bad-connection signal?
    pub fn is_bad_conn(&self) -> bool {
        matches!(
            self,
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::BadConnection,
                ..
            })
        )
    }

    /// Is this a connection error that likely requires reconnection?
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Io(_))
    }

    /// Build a query error of the given kind.
    pub fn query(kind: QueryErrorKind, sql: Option<&str>, message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            kind,
            sql: sql.map(str::to_string),
            message: message.into(),
            position: None,
        })
    }

    /// Build a transaction error of the given kind.
    pub fn transaction(kind: TransactionErrorKind, message: impl Into<String>) -> Self {
        Error::Transaction(TransactionError {
            kind,
            message: message.into(),
        })
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e),
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{} (at offset {})", self.message, pos),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_conn_is_detected() {
        let err = Error::bad_conn();
        assert!(err.is_bad_conn());
        assert!(err.is_connection_error());
        assert_eq!(err.to_string(), "Connection error: driver: bad connection");

        let other = Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Disconnected,
            message: "closed".to_string(),
        });
        assert!(!other.is_bad_conn());
        assert!(other.is_connection_error());
    }

    #[test]
    fn query_error_carries_sql() {
        let err = Error::query(QueryErrorKind::Syntax, Some("SELEC 1"), "unexpected token");
        assert_eq!(err.sql(), Some("SELEC 1"));
        assert_eq!(err.to_string(), "Query error: unexpected token");

        let positioned = Error::Query(QueryError {
            kind: QueryErrorKind::Syntax,
            sql: None,
            message: "unterminated string".to_string(),
            position: Some(7),
        });
        assert_eq!(
            positioned.to_string(),
            "Query error: unterminated string (at offset 7)"
        );
    }

    #[test]
    fn custom_errors_display_verbatim() {
        let err = Error::Custom("fixture failure".to_string());
        assert_eq!(err.to_string(), "fixture failure");
        assert!(err.sql().is_none());
        assert!(!err.is_bad_conn());
    }

    #[test]
    fn io_errors_expose_source() {
        use std::error::Error as _;

        let err = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(err.source().is_some());
        assert!(err.clone().is_connection_error());
    }
}
