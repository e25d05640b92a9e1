//! Cart route handlers.
//!
//! Changes update the session [`CartSnapshot`] first so the badge count
//! moves immediately, then wait for the backend. A rejected change restores
//! the previous snapshot.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use numisma_core::CoinId;
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;

use crate::error::Result;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{CartSnapshot, session_keys};
use crate::services::cart::{CartService, CartView, MAX_LINE_QUANTITY};
use crate::services::optimistic::{SessionSnapshot, SnapshotStore, apply};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub coin_id: CoinId,
    #[serde(default = "one")]
    pub quantity: u32,
}

const fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantity {
    pub quantity: u32,
}

fn snapshot(session: &Session) -> SessionSnapshot<'_, CartSnapshot> {
    SessionSnapshot::new(session, session_keys::CART_SNAPSHOT)
}

async fn count(session: &Session) -> Result<u32> {
    Ok(snapshot(session).load().await?.count())
}

/// `GET /api/cart`
///
/// Also resynchronises the snapshot with the backend rows.
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartView>> {
    let view = CartService::new(state.repos()).view(user.id).await?;
    snapshot(&session).save(&view.snapshot()).await?;
    Ok(Json(view))
}

/// `POST /api/cart`
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddToCart>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let service = CartService::new(state.repos());
    let item = apply(
        &snapshot(&session),
        |cart: &mut CartSnapshot| {
            let line = cart.0.entry(body.coin_id).or_default();
            *line = line.saturating_add(body.quantity).min(MAX_LINE_QUANTITY);
        },
        service.add(user.id, body.coin_id, body.quantity),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "item": item, "count": count(&session).await? })),
    ))
}

/// `PATCH /api/cart/{coin_id}`; a quantity of zero removes the line.
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(coin_id): Path<CoinId>,
    Json(body): Json<UpdateQuantity>,
) -> Result<Json<serde_json::Value>> {
    let service = CartService::new(state.repos());
    let item = apply(
        &snapshot(&session),
        |cart: &mut CartSnapshot| {
            if body.quantity == 0 {
                cart.0.remove(&coin_id);
            } else {
                cart.0.insert(coin_id, body.quantity);
            }
        },
        service.update(user.id, coin_id, body.quantity),
    )
    .await?;

    Ok(Json(json!({ "item": item, "count": count(&session).await? })))
}

/// `DELETE /api/cart/{coin_id}`
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(coin_id): Path<CoinId>,
) -> Result<Json<serde_json::Value>> {
    let service = CartService::new(state.repos());
    apply(
        &snapshot(&session),
        |cart: &mut CartSnapshot| {
            cart.0.remove(&coin_id);
        },
        service.remove(user.id, coin_id),
    )
    .await?;

    Ok(Json(json!({ "count": count(&session).await? })))
}

/// `DELETE /api/cart`
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<StatusCode> {
    let service = CartService::new(state.repos());
    apply(
        &snapshot(&session),
        |cart: &mut CartSnapshot| cart.0.clear(),
        service.clear(user.id),
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/cart/count`
///
/// Reads the snapshot only; signed-out visitors get zero.
pub async fn badge(session: Session, OptionalAuth(user): OptionalAuth) -> Result<Json<serde_json::Value>> {
    let count = match user {
        Some(_) => count(&session).await?,
        None => 0,
    };
    Ok(Json(json!({ "count": count })))
}
