use thiserror::Error;

use dbmask_config::ConfigError;
use dbmask_core::{DbError, SqlType};

use crate::model::MaskingReport;

/// Errors raised by the value generators.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("unsupported generation type '{masking_type}/{}'", sub_type.as_deref().unwrap_or("-"))]
    UnsupportedGenerationType {
        masking_type: String,
        sub_type: Option<String>,
    },
    #[error("value '{value}' from {kind} cannot be stored in a {sql_type:?} column")]
    IncompatibleType {
        kind: String,
        value: String,
        sql_type: SqlType,
    },
    #[error("invalid constraint for {kind}: {message}")]
    InvalidConstraint { kind: String, message: String },
}

impl GenerationError {
    pub fn unsupported(masking_type: &str, sub_type: Option<&str>) -> Self {
        Self::UnsupportedGenerationType {
            masking_type: masking_type.to_string(),
            sub_type: sub_type.map(str::to_string),
        }
    }

    pub fn constraint(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConstraint {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// How far an error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Stop the run after run-level cleanup.
    Fatal,
    /// Record the table as failed and continue with the next one.
    Table,
}

/// Errors emitted by the masking orchestrator.
#[derive(Debug, Error)]
pub enum MaskingError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("generation error in column '{column}': {source}")]
    Generation {
        column: String,
        #[source]
        source: GenerationError,
    },
    #[error("table {table} does not match the configuration: {message}")]
    Schema { table: String, message: String },
    #[error("uniqueness exhausted for {table}: {attempts} retries used (limit {limit})")]
    UniquenessExhausted {
        table: String,
        attempts: u64,
        limit: u64,
    },
    #[error("connection error: {0}")]
    Connection(String),
    #[error("batch {batch} failed for {table}: {source}")]
    BatchExecution {
        table: String,
        batch: u64,
        #[source]
        source: DbError,
    },
    #[error("database error: {0}")]
    Database(#[from] DbError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("masking run aborted: {source}")]
    Aborted {
        report: Box<MaskingReport>,
        #[source]
        source: Box<MaskingError>,
    },
}

impl MaskingError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn generation(column: impl Into<String>, source: GenerationError) -> Self {
        Self::Generation {
            column: column.into(),
            source,
        }
    }

    pub fn schema(table: impl ToString, message: impl Into<String>) -> Self {
        Self::Schema {
            table: table.to_string(),
            message: message.into(),
        }
    }

    /// Classify the error for the orchestrator's continue-or-stop decision.
    pub fn scope(&self) -> ErrorScope {
        match self {
            MaskingError::Configuration(_)
            | MaskingError::UniquenessExhausted { .. }
            | MaskingError::Connection(_)
            | MaskingError::Io(_)
            | MaskingError::Csv(_)
            | MaskingError::Json(_)
            | MaskingError::Aborted { .. } => ErrorScope::Fatal,
            MaskingError::Database(err) if err.is_connection() => ErrorScope::Fatal,
            MaskingError::BatchExecution { source, .. } if source.is_connection() => {
                ErrorScope::Fatal
            }
            MaskingError::Generation { .. }
            | MaskingError::Schema { .. }
            | MaskingError::BatchExecution { .. }
            | MaskingError::Database(_) => ErrorScope::Table,
        }
    }

    /// Report attached to an aborted run, if any.
    pub fn report(&self) -> Option<&MaskingReport> {
        match self {
            MaskingError::Aborted { report, .. } => Some(report.as_ref()),
            _ => None,
        }
    }
}

impl From<ConfigError> for MaskingError {
    fn from(err: ConfigError) -> Self {
        MaskingError::Configuration(err.to_string())
    }
}

/// Result type for masking operations.
pub type Result<T> = std::result::Result<T, MaskingError>;
