//! Verification queue: paid submissions waiting for an expert.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use numisma_backend::models::{Page, SubmissionReview, VerificationSubmission};
use numisma_core::{SubmissionId, SubmissionStatus};
use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::routes::page_request;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub status: Option<SubmissionStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Check that a submission in `current` may be moved to `next`.
///
/// Experts pick a submission up (`in_review`) and then record a verdict.
/// A verdict is final.
fn check_review(current: SubmissionStatus, next: SubmissionStatus) -> Result<()> {
    if next == SubmissionStatus::Pending {
        return Err(AppError::BadRequest(
            "A submission cannot be moved back to pending".to_string(),
        ));
    }
    if current.is_final() {
        return Err(AppError::Conflict(format!(
            "Submission already reviewed as {current}"
        )));
    }
    Ok(())
}

/// `GET /api/verifications?status=&page=&limit=`
///
/// Oldest first so the queue is worked in order.
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<QueueQuery>,
) -> Result<Json<Page<VerificationSubmission>>> {
    let page = state
        .repos()
        .verifications
        .list(query.status, page_request(query.page, query.limit))
        .await?;
    Ok(Json(page))
}

/// `GET /api/verifications/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<SubmissionId>,
) -> Result<Json<VerificationSubmission>> {
    let submission = state
        .repos()
        .verifications
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("submission".to_string()))?;
    Ok(Json(submission))
}

/// `POST /api/verifications/{id}/review`
pub async fn review(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<SubmissionId>,
    Json(mut body): Json<SubmissionReview>,
) -> Result<Json<VerificationSubmission>> {
    let verifications = &state.repos().verifications;
    let current = verifications
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("submission".to_string()))?;
    check_review(current.status, body.status)?;

    body.expert_notes = body
        .expert_notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let submission = verifications.review(id, &body).await?;
    info!(
        admin_id = %admin.id,
        submission_id = %id,
        status = %submission.status,
        "Verification reviewed"
    );
    Ok(Json(submission))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_moves_forward() {
        assert!(check_review(SubmissionStatus::Pending, SubmissionStatus::InReview).is_ok());
        assert!(check_review(SubmissionStatus::InReview, SubmissionStatus::Authentic).is_ok());
        assert!(check_review(SubmissionStatus::Pending, SubmissionStatus::Rejected).is_ok());
    }

    #[test]
    fn test_verdict_is_final() {
        assert!(matches!(
            check_review(SubmissionStatus::Authentic, SubmissionStatus::NotAuthentic),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            check_review(SubmissionStatus::InReview, SubmissionStatus::Pending),
            Err(AppError::BadRequest(_))
        ));
    }
}
