//! Coin verification wizard route handlers.
//!
//! The draft lives in [`crate::verification::DraftStore`]; the session only
//! holds its id. Signing in is optional until the user wants to see past
//! submissions.

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use numisma_backend::models::VerificationSubmission;
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use tracing::info;

use crate::error::{AppError, FieldErrors, Result};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::session_keys;
use crate::routes::upload::Upload;
use crate::services::verification::VerificationService;
use crate::state::AppState;
use crate::verification::{DraftId, SharedDraft, Side, WizardStep};

#[derive(Debug, Deserialize)]
pub struct DetailsRequest {
    pub name: String,
    pub phone: String,
    pub coin_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct BackRequest {
    pub step: WizardStep,
}

/// The session's draft, if it has not expired.
async fn current_draft(state: &AppState, session: &Session) -> Result<(DraftId, SharedDraft)> {
    let id: DraftId = session
        .get(session_keys::VERIFICATION_DRAFT)
        .await?
        .ok_or_else(|| AppError::NotFound("verification draft".to_string()))?;
    match state.drafts().get(id).await {
        Some(draft) => Ok((id, draft)),
        None => {
            session
                .remove::<DraftId>(session_keys::VERIFICATION_DRAFT)
                .await?;
            Err(AppError::NotFound("verification draft".to_string()))
        }
    }
}

fn service(state: &AppState) -> VerificationService<'_> {
    VerificationService::new(state.repos(), state.payments(), state.notifier())
}

/// `POST /api/verification`
///
/// Starts a fresh draft, dropping any earlier one.
pub async fn start(State(state): State<AppState>, session: Session) -> Result<Response> {
    if let Ok((old, _)) = current_draft(&state, &session).await {
        state.drafts().remove(old).await;
    }
    let (id, draft) = state.drafts().create().await;
    session.insert(session_keys::VERIFICATION_DRAFT, id).await?;
    info!(draft_id = %id, "Verification draft started");

    let draft = draft.lock().await;
    Ok((StatusCode::CREATED, Json(draft.view())).into_response())
}

/// `GET /api/verification`
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Response> {
    let (_, draft) = current_draft(&state, &session).await?;
    let draft = draft.lock().await;
    Ok(Json(draft.view()).into_response())
}

/// `PUT /api/verification/details`
///
/// The fields are kept even when they fail validation.
pub async fn details(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<DetailsRequest>,
) -> Result<Response> {
    let (_, draft) = current_draft(&state, &session).await?;
    let mut draft = draft.lock().await;
    draft.set_details(&body.name, &body.phone, body.coin_count)?;
    Ok(Json(draft.view()).into_response())
}

/// `POST /api/verification/advance`
pub async fn advance(State(state): State<AppState>, session: Session) -> Result<Response> {
    let (_, draft) = current_draft(&state, &session).await?;
    let mut draft = draft.lock().await;
    draft.advance()?;
    Ok(Json(draft.view()).into_response())
}

/// `POST /api/verification/photos` (multipart: `slot`, `side`, `image`)
pub async fn attach(
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Response> {
    let mut upload = Upload::read(multipart).await?;
    let mut errors = FieldErrors::new();
    let slot: Option<u8> = upload.parse("slot", &mut errors);
    let side: Option<Side> = upload.parse("side", &mut errors);
    let image = upload.take_image("image");
    if slot.is_none() {
        errors.add("slot", "Slot is required");
    }
    if side.is_none() {
        errors.add("side", "Side must be front or back");
    }
    if image.is_none() {
        errors.add("image", "Choose a photo to upload");
    }
    let (Some(slot), Some(side), Some(image)) = (slot, side, image) else {
        return Err(errors.into());
    };

    let (_, draft) = current_draft(&state, &session).await?;
    let mut draft = draft.lock().await;
    draft.attach(slot, side, image)?;
    Ok(Json(draft.view()).into_response())
}

/// `POST /api/verification/back`
pub async fn back(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<BackRequest>,
) -> Result<Response> {
    let (_, draft) = current_draft(&state, &session).await?;
    let mut draft = draft.lock().await;
    service(&state).go_back(&mut draft, body.step).await?;
    Ok(Json(draft.view()).into_response())
}

/// `POST /api/verification/pay`
///
/// Issues the payment for the quoted total and moves to the payment step.
pub async fn pay(State(state): State<AppState>, session: Session) -> Result<Response> {
    let (_, draft) = current_draft(&state, &session).await?;
    let mut draft = draft.lock().await;
    let intent = service(&state).begin_payment(&mut draft).await?;
    Ok(Json(json!({ "payment": intent, "draft": draft.view() })).into_response())
}

/// `POST /api/verification/submit`
///
/// Confirms the payment and stores the submission. The draft is dropped on
/// success.
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<(StatusCode, Json<VerificationSubmission>)> {
    let (id, draft) = current_draft(&state, &session).await?;
    let submission = {
        let mut draft = draft.lock().await;
        service(&state).submit(user.as_ref(), &mut draft).await?
    };

    state.drafts().remove(id).await;
    session
        .remove::<DraftId>(session_keys::VERIFICATION_DRAFT)
        .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// `GET /api/verification/mine`
pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<VerificationSubmission>>> {
    Ok(Json(service(&state).mine(user.id).await?))
}
