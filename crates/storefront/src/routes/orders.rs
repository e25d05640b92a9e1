//! Checkout and order history route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use numisma_backend::models::{Order, OrderWithItems, ShippingAddress};
use numisma_core::OrderId;
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{CartSnapshot, session_keys};
use crate::services::checkout::{CheckoutService, PlacedOrder};
use crate::services::payment::PaymentIntent;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: ShippingAddress,
}

fn checkout(state: &AppState) -> CheckoutService<'_> {
    CheckoutService::new(state.repos(), state.payments(), state.notifier())
}

/// `POST /api/checkout`
///
/// Places the order from the cart and returns the payment to make. The cart
/// snapshot is emptied with the cart.
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<PlacedOrder>)> {
    let placed = checkout(&state)
        .place_order(&user, body.shipping_address)
        .await?;
    session
        .insert(session_keys::CART_SNAPSHOT, CartSnapshot::default())
        .await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

/// `GET /api/orders`
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(checkout(&state).list(&user).await?))
}

/// `GET /api/orders/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderWithItems>> {
    Ok(Json(checkout(&state).get(&user, id).await?))
}

/// `POST /api/orders/{id}/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(checkout(&state).cancel(&user, id).await?))
}

/// `POST /api/orders/{id}/confirm-payment`
///
/// The buyer reports the QR payment as made.
pub async fn confirm_payment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(checkout(&state).confirm_payment(&user, id).await?))
}

/// `POST /api/orders/{id}/payment`
///
/// A fresh payment code after the previous one expired.
pub async fn reissue_payment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<PaymentIntent>> {
    Ok(Json(checkout(&state).reissue_payment(&user, id).await?))
}
