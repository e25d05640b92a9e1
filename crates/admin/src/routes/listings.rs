//! Listings tab: every listing regardless of stock, with edits and the
//! verified badge.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use numisma_backend::models::{CoinListing, ListingUpdate, Page};
use numisma_core::CoinId;
use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::routes::{PageQuery, page_request};
use crate::state::AppState;

/// `GET /api/listings?page=&limit=`
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<CoinListing>>> {
    let page = state
        .repos()
        .listings
        .list_all(page_request(query.page, query.limit))
        .await?;
    Ok(Json(page))
}

async fn load(state: &AppState, id: CoinId) -> Result<CoinListing> {
    state
        .repos()
        .listings
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("listing".to_string()))
}

/// `GET /api/listings/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CoinId>,
) -> Result<Json<CoinListing>> {
    Ok(Json(load(&state, id).await?))
}

/// `PATCH /api/listings/{id}`
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CoinId>,
    Json(update): Json<ListingUpdate>,
) -> Result<Json<CoinListing>> {
    if update.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }
    if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::BadRequest("Title cannot be blank".to_string()));
    }
    let listing = state.repos().listings.update(id, &update).await?;
    info!(admin_id = %admin.id, coin_id = %id, "Listing updated");
    Ok(Json(listing))
}

/// `POST /api/listings/{id}/verify`
///
/// Flips the verified badge.
pub async fn toggle_verified(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CoinId>,
) -> Result<Json<CoinListing>> {
    let current = load(&state, id).await?;
    let update = ListingUpdate {
        verified: Some(!current.verified),
        ..ListingUpdate::default()
    };
    let listing = state.repos().listings.update(id, &update).await?;
    info!(admin_id = %admin.id, coin_id = %id, verified = listing.verified, "Listing verification changed");
    Ok(Json(listing))
}
