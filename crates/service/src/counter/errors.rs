use thiserror::Error;

use crate::errors::StoreError;

/// Failures of a single increment. Every store outcome maps to exactly one kind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CounterError {
    #[error("counter document `{id}` not found")]
    NotFound { id: String },
    #[error("document store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("conditional replace kept conflicting after {attempts} attempts")]
    ConflictRetryExhausted { attempts: u32 },
    #[error("unexpected store failure: {0}")]
    Unknown(String),
}

impl CounterError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            CounterError::NotFound { .. } => 2001,
            CounterError::StoreUnavailable(_) => 2002,
            CounterError::ConflictRetryExhausted { .. } => 2003,
            CounterError::Unknown(_) => 2100,
        }
    }

    /// Short label for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            CounterError::NotFound { .. } => "not_found",
            CounterError::StoreUnavailable(_) => "store_unavailable",
            CounterError::ConflictRetryExhausted { .. } => "conflict_retry_exhausted",
            CounterError::Unknown(_) => "unknown",
        }
    }
}

impl From<StoreError> for CounterError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => CounterError::NotFound { id },
            StoreError::Unavailable(msg) => CounterError::StoreUnavailable(msg),
            // a conflict outside the retry loop is not expected
            StoreError::Conflict(id) => CounterError::Unknown(format!("unexpected conflict on {id}")),
            StoreError::Other(msg) => CounterError::Unknown(msg),
        }
    }
}
