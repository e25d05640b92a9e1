//! Authentication extractor for admin.
//!
//! The session only proves who signed in. The profile's role is read again on
//! every request, so an admin demoted from the users tab loses access on
//! their next call rather than when the session expires.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use numisma_core::Role;
use tower_sessions::Session;
use tracing::warn;

use crate::error::AppError;
use crate::models::{CurrentAdmin, session_keys};
use crate::state::AppState;

/// Extractor that requires a signed-in admin.
///
/// ```rust,ignore
/// async fn protected_handler(RequireAdmin(admin): RequireAdmin) -> String {
///     format!("Hello, {}!", admin.name)
/// }
/// ```
pub struct RequireAdmin(pub CurrentAdmin);

/// Why an admin request was refused.
#[derive(Debug)]
pub enum AdminRejection {
    /// No admin in the session.
    Unauthorized,
    /// Signed in, but the profile is no longer an admin.
    Forbidden,
    /// Session layer missing or the profile lookup failed.
    Internal(String),
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => AppError::Unauthorized("Please sign in".to_string()),
            Self::Forbidden => AppError::Forbidden("Admin access required".to_string()),
            Self::Internal(e) => AppError::Internal(e),
        }
        .into_response()
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AdminRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AdminRejection::Internal("session layer missing".to_string()))?;

        let admin: CurrentAdmin = session
            .get(session_keys::CURRENT_ADMIN)
            .await
            .map_err(|e| AdminRejection::Internal(e.to_string()))?
            .ok_or(AdminRejection::Unauthorized)?;

        let profile = state
            .repos()
            .profiles
            .get(admin.id)
            .await
            .map_err(|e| AdminRejection::Internal(e.to_string()))?;
        if profile.map(|p| p.role) != Some(Role::Admin) {
            warn!(admin_id = %admin.id, "Admin role revoked, ending session");
            if let Err(e) = session.flush().await {
                warn!(error = %e, "Failed to flush revoked admin session");
            }
            return Err(AdminRejection::Forbidden);
        }

        sentry::configure_scope(|scope| {
            scope.set_user(Some(sentry::User {
                id: Some(admin.id.to_string()),
                email: admin.email.as_ref().map(|e| e.as_str().to_string()),
                ..Default::default()
            }));
        });
        Ok(Self(admin))
    }
}
