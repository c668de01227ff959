//! Error types for the event query engine

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or contradictory filter input. Never retried.
    #[error("Invalid predicate `{predicate}`: {reason}")]
    InvalidPredicate { predicate: String, reason: String },

    /// A timestamp without an explicit UTC offset.
    #[error("Ambiguous time in `{field}`: '{value}' has no timezone offset")]
    AmbiguousTime { field: String, value: String },

    /// A translatable field with no entries at all.
    #[error("Missing translation for field `{field}`")]
    MissingTranslation { field: String },

    #[error("Invalid event {id}: {reason}")]
    InvalidEvent { id: String, reason: String },

    /// Propagated unchanged from the storage layer.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_predicate(predicate: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidPredicate {
            predicate: predicate.into(),
            reason: reason.into(),
        }
    }

    pub fn ambiguous_time(field: impl Into<String>, value: impl Into<String>) -> Self {
        Error::AmbiguousTime {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn invalid_event(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidEvent {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Whether the fault lies with the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidPredicate { .. } | Error::AmbiguousTime { .. }
        )
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::StorageUnavailable(Box::new(err))
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Error::StorageUnavailable(Box::new(err))
    }
}

/// Non-fatal, informational signals attached to a plan and its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// The caller asked for more rows per page than allowed.
    PageSizeClamped { requested: usize, max: usize },
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Advisory::PageSizeClamped { requested, max } => {
                write!(f, "page size {requested} clamped to {max}")
            }
        }
    }
}
