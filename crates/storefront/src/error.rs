//! Application error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(
        "Cannot delete category \"{name}\" because it is being used by {count} product(s). \
         Please remove or reassign these products first."
    )]
    InUse { name: String, count: u64 },

    #[error("datastore error")]
    Datastore(StoreError),
}

impl AppError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => AppError::Validation(format!("{what} already exists")),
            other => AppError::Datastore(other),
        }
    }
}

/// JSON error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InUse { .. } => StatusCode::BAD_REQUEST,
            AppError::Datastore(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Driver details stay in the log
        let error = match &self {
            AppError::Datastore(e) => {
                tracing::error!(error = %e, cause = e.cause(), "datastore error");
                e.public_message().to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_becomes_validation() {
        let err = AppError::from(StoreError::Duplicate("category name".to_string()));
        assert!(matches!(err, AppError::Validation(ref m) if m == "category name already exists"));
    }

    #[test]
    fn timeout_stays_datastore() {
        let err = AppError::from(StoreError::Timeout);
        assert!(matches!(err, AppError::Datastore(StoreError::Timeout)));
    }

    #[test]
    fn in_use_message_names_count() {
        let err = AppError::InUse {
            name: "Electronics".to_string(),
            count: 1,
        };
        let message = err.to_string();
        assert!(message.contains("\"Electronics\""));
        assert!(message.contains("1 product(s)"));
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            AppError::validation("bad").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("category").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Datastore(StoreError::Network("reset".to_string()))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
