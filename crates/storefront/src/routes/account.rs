//! Account route handlers: profile, avatar and in-app notifications.

use axum::{
    Json,
    extract::{Multipart, State},
};
use numisma_backend::models::Profile;
use tower_sessions::Session;

use crate::error::{FieldErrors, Result};
use crate::middleware::{RequireAuth, set_current_user};
use crate::routes::upload::Upload;
use crate::services::notification::InboxMessage;
use crate::services::profile::{ProfileForm, ProfileService};
use crate::state::AppState;

/// `GET /api/account/profile`
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Profile>> {
    Ok(Json(ProfileService::new(state.repos()).get(user.id).await?))
}

/// `PATCH /api/account/profile`
///
/// The session copy of the name and phone follows the stored profile.
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(mut user): RequireAuth,
    Json(form): Json<ProfileForm>,
) -> Result<Json<Profile>> {
    let profile = ProfileService::new(state.repos())
        .update(user.id, form)
        .await?;

    user.full_name.clone_from(&profile.full_name);
    user.phone.clone_from(&profile.phone);
    set_current_user(&session, &user).await?;

    Ok(Json(profile))
}

/// `POST /api/account/avatar` (multipart, one `avatar` file)
pub async fn upload_avatar(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<Json<Profile>> {
    let mut upload = Upload::read(multipart).await?;
    let image = upload
        .take_image("avatar")
        .ok_or_else(|| FieldErrors::single("avatar", "Choose an image to upload"))?;
    let profile = ProfileService::new(state.repos())
        .set_avatar(user.id, &image)
        .await?;
    Ok(Json(profile))
}

/// `GET /api/account/notifications`
pub async fn notifications(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Json<Vec<InboxMessage>> {
    Json(state.inbox().messages(user.id))
}
