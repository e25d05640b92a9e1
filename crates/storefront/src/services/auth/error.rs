//! Authentication error types.

use numisma_backend::{AuthApiError, RepositoryError};
use numisma_core::{EmailError, PhoneError};
use thiserror::Error;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The auth API refused the request.
    #[error(transparent)]
    Api(#[from] AuthApiError),

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Invalid phone number.
    #[error("invalid phone: {0}")]
    InvalidPhone(#[from] PhoneError),

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// OTP or OAuth callback arrived without a code.
    #[error("missing verification code")]
    MissingCode,

    /// OAuth `state` did not match the value stored in the session.
    #[error("oauth state mismatch")]
    StateMismatch,

    /// Profile lookup or creation failed.
    #[error("profile error: {0}")]
    Repository(#[from] RepositoryError),

    /// Session store failure.
    #[error("session error: {0}")]
    Session(String),
}

impl From<tower_sessions::session::Error> for AuthError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Session(err.to_string())
    }
}
