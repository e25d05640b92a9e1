//! Wishlist route handlers, with the same optimistic snapshot as the cart.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use numisma_backend::models::CoinListing;
use numisma_core::CoinId;
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{WishlistSnapshot, session_keys};
use crate::services::optimistic::{SessionSnapshot, SnapshotStore, apply};
use crate::services::wishlist::WishlistService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SaveCoin {
    pub coin_id: CoinId,
}

fn snapshot(session: &Session) -> SessionSnapshot<'_, WishlistSnapshot> {
    SessionSnapshot::new(session, session_keys::WISHLIST_SNAPSHOT)
}

/// `GET /api/wishlist`
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<CoinListing>>> {
    let listings = WishlistService::new(state.repos()).list(user.id).await?;
    snapshot(&session)
        .save(&WishlistSnapshot(listings.iter().map(|l| l.id).collect()))
        .await?;
    Ok(Json(listings))
}

/// `POST /api/wishlist`
///
/// `201` when the coin was added, `200` when it was already saved.
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Json(body): Json<SaveCoin>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let service = WishlistService::new(state.repos());
    let added = apply(
        &snapshot(&session),
        |saved: &mut WishlistSnapshot| {
            saved.0.insert(body.coin_id);
        },
        service.add(user.id, body.coin_id),
    )
    .await?;

    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    let count = snapshot(&session).load().await?.count();
    Ok((status, Json(json!({ "added": added, "count": count }))))
}

/// `DELETE /api/wishlist/{coin_id}`
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(coin_id): Path<CoinId>,
) -> Result<Json<serde_json::Value>> {
    let service = WishlistService::new(state.repos());
    apply(
        &snapshot(&session),
        |saved: &mut WishlistSnapshot| {
            saved.0.remove(&coin_id);
        },
        service.remove(user.id, coin_id),
    )
    .await?;

    let count = snapshot(&session).load().await?.count();
    Ok(Json(json!({ "count": count })))
}
