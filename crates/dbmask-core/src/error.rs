use thiserror::Error;

/// Errors raised by the database collaborator and the helpers around it.
#[derive(Debug, Error)]
pub enum DbError {
    /// The instance could not be reached or refused authentication.
    #[error("connection error: {0}")]
    Connection(String),
    /// A statement failed on the server.
    #[error("query failed: {message}")]
    Query { message: String, sql: String },
    /// A statement exceeded the command timeout.
    #[error("command timed out after {seconds}s")]
    Timeout { seconds: u64, sql: String },
    /// An identifier failed validation before quoting.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    /// A requested feature is not supported by the adapter.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl DbError {
    pub fn query(message: impl Into<String>, sql: impl Into<String>) -> Self {
        DbError::Query {
            message: message.into(),
            sql: sql.into(),
        }
    }

    /// Statement text attached to the error, when there is one.
    pub fn sql(&self) -> Option<&str> {
        match self {
            DbError::Query { sql, .. } | DbError::Timeout { sql, .. } => Some(sql.as_str()),
            _ => None,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, DbError::Connection(_))
    }
}

/// Convenience alias for results returned by the database layer.
pub type Result<T> = std::result::Result<T, DbError>;
