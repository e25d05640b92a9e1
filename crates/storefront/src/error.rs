//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`;
//! every error leaves as a JSON body `{"error": "..."}`, and validation
//! failures add a field-keyed `fields` map.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use numisma_backend::{AuthApiError, BackendError, RepositoryError};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::AuthError;
use crate::services::payment::PaymentError;

/// Field-keyed validation messages.
///
/// Keys are the request field names (`"name"`, `"phone"`, `"coin_3_front"`),
/// so clients can attach each message to its input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message; the first message for a field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `Ok(())` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` carrying every recorded message.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }

    /// Like [`Self::into_result`] but keeps the map as the error, for
    /// callers that merge several validations.
    ///
    /// # Errors
    ///
    /// Returns `self` when anything was recorded.
    pub fn into_result_fields(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Field and message pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// A single-field error.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session error: {err}"))
    }
}

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Repository operation failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Backend request failed outside a repository (storage, health).
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Payment provider rejected or could not handle a request.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Request fields failed validation.
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a FieldErrors>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Repository(RepositoryError::Conflict(_)) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Repository(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Backend(BackendError::RateLimited(_)) | Self::RateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::Auth(err) => match err {
                AuthError::Api(
                    AuthApiError::InvalidCredentials
                    | AuthApiError::InvalidOtp
                    | AuthApiError::InvalidSession,
                )
                | AuthError::MissingCode
                | AuthError::StateMismatch => StatusCode::UNAUTHORIZED,
                AuthError::Api(AuthApiError::EmailNotConfirmed) => StatusCode::FORBIDDEN,
                AuthError::Api(AuthApiError::UserAlreadyExists) => StatusCode::CONFLICT,
                AuthError::Api(AuthApiError::WeakPassword(_))
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidPhone(_)
                | AuthError::PasswordMismatch => StatusCode::UNPROCESSABLE_ENTITY,
                AuthError::Api(AuthApiError::Backend(_)) => StatusCode::BAD_GATEWAY,
                AuthError::Repository(_) | AuthError::Session(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Payment(PaymentError::UnknownReference(_)) => StatusCode::NOT_FOUND,
            Self::Payment(PaymentError::ZeroAmount) => StatusCode::BAD_REQUEST,
            Self::Payment(PaymentError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
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
            Self::Backend(BackendError::RateLimited(_)) | Self::RateLimited => {
                "Too many requests, please slow down".to_string()
            }
            Self::Backend(_) => "External service error".to_string(),
            Self::Auth(err) => match err {
                AuthError::Api(AuthApiError::InvalidCredentials) => {
                    "Invalid credentials".to_string()
                }
                AuthError::Api(AuthApiError::InvalidOtp) => {
                    "Invalid or expired verification code".to_string()
                }
                AuthError::Api(AuthApiError::InvalidSession)
                | AuthError::MissingCode
                | AuthError::StateMismatch => "Session expired, please sign in again".to_string(),
                AuthError::Api(AuthApiError::EmailNotConfirmed) => {
                    "Please confirm your email address first".to_string()
                }
                AuthError::Api(AuthApiError::UserAlreadyExists) => {
                    "An account with this email already exists".to_string()
                }
                AuthError::Api(AuthApiError::WeakPassword(msg)) => msg.clone(),
                AuthError::InvalidEmail(e) => e.to_string(),
                AuthError::InvalidPhone(e) => e.to_string(),
                AuthError::PasswordMismatch => "Passwords do not match".to_string(),
                AuthError::Api(AuthApiError::Backend(_)) => "External service error".to_string(),
                AuthError::Repository(_) | AuthError::Session(_) => {
                    "Authentication error".to_string()
                }
            },
            Self::Payment(PaymentError::Unavailable(_)) => {
                "Payment service unavailable, please try again".to_string()
            }
            Self::Payment(e) => e.to_string(),
            Self::Validation(_) => "Please correct the highlighted fields".to_string(),
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

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let message = self.public_message();
        let fields = match &self {
            Self::Validation(fields) => Some(fields),
            _ => None,
        };

        (
            status,
            Json(ErrorBody {
                error: &message,
                fields,
            }),
        )
            .into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a user action.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("coin-123".to_string());
        assert_eq!(err.to_string(), "Not found: coin-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Repository(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Repository(RepositoryError::DataCorruption(
                "bad".into()
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Backend(BackendError::Api {
                status: 500,
                message: "down".into()
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::Api(AuthApiError::UserAlreadyExists))),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_field_errors() {
        let mut errors = FieldErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.add("phone", "Phone must have 10 digits");
        errors.add("phone", "ignored");
        assert_eq!(errors.get("phone"), Some("Phone must have 10 digits"));

        let err = errors.into_result().unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_validation_body_has_fields() {
        let response =
            AppError::Validation(FieldErrors::single("name", "Name is required")).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["fields"]["name"], "Name is required");
        assert!(body["error"].is_string());
    }
}
