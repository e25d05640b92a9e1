//! Users tab: profile search, role toggle and identity verification.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use numisma_backend::models::{Page, Profile, ProfileUpdate};
use numisma_core::ProfileId;
use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::routes::page_request;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct VerifiedRequest {
    pub verified: bool,
}

/// `GET /api/users?search=&page=&limit=`
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<UserQuery>,
) -> Result<Json<Page<Profile>>> {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let page = state
        .repos()
        .profiles
        .list(search, page_request(query.page, query.limit))
        .await?;
    Ok(Json(page))
}

/// `GET /api/users/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProfileId>,
) -> Result<Json<Profile>> {
    let profile = state
        .repos()
        .profiles
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("user".to_string()))?;
    Ok(Json(profile))
}

/// `POST /api/users/{id}/role`
///
/// Switches between user and admin. Admins cannot demote themselves, which
/// keeps at least the acting admin in place.
pub async fn toggle_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProfileId>,
) -> Result<Json<Profile>> {
    if id == admin.id {
        return Err(AppError::Conflict(
            "You cannot change your own role".to_string(),
        ));
    }
    let profiles = &state.repos().profiles;
    let current = profiles
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("user".to_string()))?;

    let role = current.role.toggled();
    let update = ProfileUpdate {
        role: Some(role),
        ..ProfileUpdate::default()
    };
    let profile = profiles.update(id, &update).await?;
    info!(admin_id = %admin.id, user_id = %id, role = %role, "User role changed");
    Ok(Json(profile))
}

/// `PUT /api/users/{id}/verified`
pub async fn set_verified(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProfileId>,
    Json(body): Json<VerifiedRequest>,
) -> Result<Json<Profile>> {
    let update = ProfileUpdate {
        is_verified: Some(body.verified),
        ..ProfileUpdate::default()
    };
    let profile = state.repos().profiles.update(id, &update).await?;
    info!(admin_id = %admin.id, user_id = %id, verified = body.verified, "User verification changed");
    Ok(Json(profile))
}
