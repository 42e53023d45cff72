use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use service::CounterError;
use thiserror::Error;
use tracing::error;

use crate::observability::FAILURES_TOTAL;

pub const STORE_UNAVAILABLE_MESSAGE: &str =
    "Document store client not initialized. Check application settings.";
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal server error occurred.";

/// Handler error. Renders a plain-text body; store details stay in the logs.
#[derive(Debug)]
pub struct ApiError(pub CounterError);

impl From<CounterError> for ApiError {
    fn from(e: CounterError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let (status, msg) = match &err {
            CounterError::NotFound { id } => (
                StatusCode::NOT_FOUND,
                format!("The document '{id}' was not found in the database."),
            ),
            CounterError::StoreUnavailable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, STORE_UNAVAILABLE_MESSAGE.to_string())
            }
            CounterError::ConflictRetryExhausted { .. } | CounterError::Unknown(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE.to_string())
            }
        };
        FAILURES_TOTAL.with_label_values(&[err.kind()]).inc();
        error!(kind = err.kind(), code = err.code(), error = %err, status = status.as_u16(), "increment failed");
        (status, msg).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
