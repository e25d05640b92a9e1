//! Admin sign-in.
//!
//! Admins sign in with the same email and password they use on the
//! storefront. Only profiles with the admin role get a session.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use numisma_core::{Email, ProfileId};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{CurrentAdmin, session_keys};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The signed-in admin as sent to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminView<'a> {
    pub id: ProfileId,
    pub email: Option<&'a str>,
    pub name: &'a str,
}

impl<'a> From<&'a CurrentAdmin> for AdminView<'a> {
    fn from(admin: &'a CurrentAdmin) -> Self {
        Self {
            id: admin.id,
            email: admin.email.as_ref().map(Email::as_str),
            name: &admin.name,
        }
    }
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>> {
    let email = Email::parse(&body.email)
        .map_err(|_| AppError::BadRequest("Enter a valid email address".to_string()))?;
    let repos = state.repos();

    let auth = repos.auth.sign_in_with_password(&email, &body.password).await?;
    let profile = repos.profiles.get(auth.user.id).await?;
    let Some(profile) = profile.filter(|p| p.is_admin()) else {
        warn!(user_id = %auth.user.id, "Non-admin attempted admin sign-in");
        if let Err(e) = repos.auth.sign_out(&auth.access_token).await {
            warn!(error = %e, "Failed to revoke non-admin session");
        }
        return Err(AppError::Forbidden("Admin access required".to_string()));
    };

    let admin = CurrentAdmin::new(&profile, auth.access_token);
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_ADMIN, &admin).await?;
    info!(admin_id = %admin.id, "Admin signed in");

    Ok(Json(serde_json::json!({ "admin": AdminView::from(&admin) })))
}

/// `POST /api/auth/logout`
///
/// Works without the admin role so a demoted admin can still end the session.
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<StatusCode> {
    if let Some(admin) = session
        .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await?
    {
        if let Err(e) = state.repos().auth.sign_out(&admin.access_token).await {
            warn!(error = %e, "Backend sign-out failed");
        }
        info!(admin_id = %admin.id, "Admin signed out");
    }
    session.flush().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me`
pub async fn me(RequireAdmin(admin): RequireAdmin) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "admin": AdminView::from(&admin) }))
}
