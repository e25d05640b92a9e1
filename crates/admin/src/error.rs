//! Unified error handling for admin.
//!
//! Every error leaves as a JSON body `{"error": "..."}`. Server-side failures
//! are captured to Sentry first and reported to the client without detail.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use numisma_backend::{AuthApiError, BackendError, RepositoryError};
use serde_json::json;
use thiserror::Error;

/// Application-level error type for the admin panel.
#[derive(Debug, Error)]
pub enum AppError {
    /// Repository operation failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Backend request failed outside a repository.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Sign-in against the auth service failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthApiError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with the record's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session error: {err}"))
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Repository(RepositoryError::NotFound) | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Repository(RepositoryError::Conflict(_)) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Repository(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Backend(_) | Self::Auth(AuthApiError::Backend(_)) => StatusCode::BAD_GATEWAY,
            Self::Auth(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show to the client.
    fn public_message(&self) -> String {
        match self {
            Self::Repository(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Repository(RepositoryError::Conflict(_)) => "Already exists".to_string(),
            Self::Repository(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Backend(_) | Self::Auth(AuthApiError::Backend(_)) => {
                "External service error".to_string()
            }
            Self::Auth(_) => "Invalid credentials".to_string(),
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Repository(RepositoryError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Auth(AuthApiError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Conflict("delivered".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Repository(RepositoryError::Unavailable("poisoned".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Repository(RepositoryError::DataCorruption("row 7".into()));
        assert_eq!(err.public_message(), "Internal server error");
        let err = AppError::Auth(AuthApiError::InvalidCredentials);
        assert_eq!(err.public_message(), "Invalid credentials");
    }
}
