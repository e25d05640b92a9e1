//! Authentication extractors.
//!
//! The signed-in user lives in the session under
//! [`session_keys::CURRENT_USER`]. Both extractors refresh the backend access
//! token when it is about to expire and write the rotated tokens back to the
//! session. A refresh the backend refuses signs the user out.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// ```rust,ignore
/// async fn handler(RequireAuth(user): RequireAuth) -> String {
///     format!("Hello, {}!", user.id)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Why an authenticated request was refused.
#[derive(Debug)]
pub enum AuthRejection {
    /// No user in the session.
    Unauthorized,
    /// The backend refused to refresh the user's tokens.
    SessionExpired,
    /// The session layer is missing or failed.
    Session(String),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => AppError::Unauthorized("Please sign in".to_string()),
            Self::SessionExpired => {
                AppError::Unauthorized("Session expired, please sign in again".to_string())
            }
            Self::Session(e) => AppError::Internal(e),
        }
        .into_response()
    }
}

/// Load the session user, refreshing tokens when they are close to expiry.
async fn load_user(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>, AuthRejection> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or_else(|| AuthRejection::Session("session layer missing".to_string()))?;

    let Some(mut user) = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .map_err(|e| AuthRejection::Session(e.to_string()))?
    else {
        return Ok(None);
    };

    if user.needs_refresh(Utc::now()) {
        match AuthService::new(state.repos()).refresh(&mut user).await {
            Ok(()) => {
                debug!(user_id = %user.id, "Access token refreshed");
                if let Err(e) = set_current_user(session, &user).await {
                    warn!(error = %e, "Failed to store refreshed tokens");
                }
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Token refresh failed, signing out");
                if let Err(e) = clear_current_user(session).await {
                    warn!(error = %e, "Failed to clear expired session");
                }
                return Err(AuthRejection::SessionExpired);
            }
        }
    }

    set_sentry_user(&user.id, user.email.as_ref().map(numisma_core::Email::as_str));
    Ok(Some(user))
}

impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        load_user(parts, &state)
            .await?
            .map(Self)
            .ok_or(AuthRejection::Unauthorized)
    }
}

/// Extractor for the signed-in user, if any. Never rejects.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(Self(load_user(parts, &state).await.ok().flatten()))
    }
}

/// Store the signed-in user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Remove the signed-in user and their snapshots from the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    session
        .remove::<serde_json::Value>(session_keys::CART_SNAPSHOT)
        .await?;
    session
        .remove::<serde_json::Value>(session_keys::WISHLIST_SNAPSHOT)
        .await?;
    clear_sentry_user();
    Ok(())
}
