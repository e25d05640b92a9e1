//! Newsletter subscription route handlers.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::error::Result;
use crate::services::newsletter::NewsletterService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// `POST /api/newsletter`
///
/// `201` for a new or re-activated subscription, `200` when the address was
/// already subscribed.
#[instrument(skip(state, body))]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let (subscription, already) = NewsletterService::new(state.repos())
        .subscribe(&body.email)
        .await?;
    let status = if already {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(json!({ "subscription": subscription, "alreadySubscribed": already })),
    ))
}

/// `POST /api/newsletter/unsubscribe`
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<serde_json::Value>> {
    let subscription = NewsletterService::new(state.repos())
        .unsubscribe(&body.email)
        .await?;
    Ok(Json(json!({ "subscription": subscription })))
}

/// `GET /api/newsletter?email=`
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<EmailRequest>,
) -> Result<Json<serde_json::Value>> {
    let subscribed = NewsletterService::new(state.repos())
        .is_subscribed(&query.email)
        .await?;
    Ok(Json(json!({ "subscribed": subscribed })))
}
