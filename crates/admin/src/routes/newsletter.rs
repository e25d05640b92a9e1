//! Newsletter tab: subscriber list.

use axum::{
    Json,
    extract::{Query, State},
};
use numisma_backend::models::{NewsletterSubscription, Page};
use serde::Deserialize;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::routes::page_request;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubscriberQuery {
    /// Only active subscribers (default); `false` includes unsubscribed rows.
    #[serde(default = "default_true")]
    pub subscribed: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

const fn default_true() -> bool {
    true
}

/// `GET /api/newsletter?subscribed=&page=&limit=`
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<SubscriberQuery>,
) -> Result<Json<Page<NewsletterSubscription>>> {
    let page = state
        .repos()
        .newsletter
        .list(query.subscribed, page_request(query.page, query.limit))
        .await?;
    Ok(Json(page))
}
