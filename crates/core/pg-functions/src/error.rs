//! Error types for function management operations

use crate::{
    db::ConnError,
    functions::{NotFoundError, catalog::MapError, ddl::CompileError, signature::ValidationError},
};

/// SQLSTATE raised when a statement is cancelled, including by `statement_timeout`
const QUERY_CANCELED: &str = "57014";

/// Errors that can occur when managing functions
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request is malformed: a missing field or a malformed type name.
    #[error("Invalid function declaration: {0}")]
    Validation(#[from] ValidationError),

    /// The request cannot be rendered into a statement.
    #[error("Cannot compile function statement: {0}")]
    Compilation(#[from] CompileError),

    /// A catalog row could not be mapped to a descriptor.
    #[error("Cannot read function from catalog: {0}")]
    Mapping(#[from] MapError),

    /// The database rejected a statement. `message` is the server's message, verbatim.
    #[error("{message}")]
    Execution { code: Option<String>, message: String },

    /// The requested function does not exist.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// The statement was cancelled or timed out before completing.
    #[error("Operation cancelled or timed out: {0}")]
    CancelledOrTimedOut(#[source] sqlx::Error),

    #[error("Error connecting to database: {0}")]
    ConnectionError(#[source] sqlx::Error),

    #[error("Error executing database query: {0}")]
    Database(#[source] sqlx::Error),
}

impl Error {
    /// Stable, machine-readable code for this error kind
    ///
    /// Codes are SCREAMING_SNAKE_CASE and do not change between releases.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Compilation(_) => "COMPILATION_ERROR",
            Error::Mapping(_) => "CATALOG_MAPPING_ERROR",
            Error::Execution { .. } => "EXECUTION_ERROR",
            Error::NotFound(_) => "FUNCTION_NOT_FOUND",
            Error::CancelledOrTimedOut(_) => "CANCELLED_OR_TIMED_OUT",
            Error::ConnectionError(_) => "CONNECTION_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns `true` if the requested function does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Returns `true` if the error is likely to be a transient connection issue.
    ///
    /// The following errors are considered connection errors:
    /// - `Error::ConnectionError`: the initial connection to the database failed.
    /// - `sqlx::Error::Io`: an I/O error, often a network issue or a closed socket.
    /// - `sqlx::Error::Tls`: an error during the TLS handshake.
    /// - `sqlx::Error::PoolClosed`: the pool was closed while an operation was pending.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Error::ConnectionError(_) => true,
            Error::Database(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for Error {
    /// Classify a driver error.
    ///
    /// Server-side errors become [`Error::Execution`] carrying the SQLSTATE and message, except
    /// for cancellations. Pool acquisition timeouts count as timeouts. Anything else is a
    /// transport or decoding failure.
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(QUERY_CANCELED) => {
                Error::CancelledOrTimedOut(sqlx::Error::Database(db_err))
            }
            sqlx::Error::Database(db_err) => Error::Execution {
                code: db_err.code().map(|code| code.into_owned()),
                message: db_err.message().to_string(),
            },
            sqlx::Error::PoolTimedOut => Error::CancelledOrTimedOut(sqlx::Error::PoolTimedOut),
            err => Error::Database(err),
        }
    }
}

impl From<ConnError> for Error {
    fn from(err: ConnError) -> Self {
        match err {
            ConnError::ConnectionError(err) => Error::ConnectionError(err),
        }
    }
}
