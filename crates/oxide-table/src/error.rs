//! Error types for table access.

use oxide_query::QueryError;
use thiserror::Error;

/// Errors raised by tables and connections.
///
/// Failed validation is not an error: it is reported as
/// [`SaveOutcome::FailedCheck`](crate::SaveOutcome::FailedCheck).
#[derive(Debug, Error)]
pub enum TableError {
    /// A query could not be composed.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The connection failed outside of the driver.
    #[error("connection error: {0}")]
    Connection(String),

    /// The caller asked for something the table or connection cannot do.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for table operations.
pub type Result<T> = std::result::Result<T, TableError>;
