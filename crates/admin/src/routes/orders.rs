//! Orders tab: every customer's orders and fulfilment status changes.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use numisma_backend::Repositories;
use numisma_backend::models::{ListingUpdate, Order, OrderItem, OrderWithItems, Page};
use numisma_core::{OrderId, OrderStatus};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::routes::page_request;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// `GET /api/orders?status=&page=&limit=`
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Page<Order>>> {
    let page = state
        .repos()
        .orders
        .list(query.status, page_request(query.page, query.limit))
        .await?;
    Ok(Json(page))
}

async fn load(repos: &Repositories, id: OrderId) -> Result<Order> {
    repos
        .orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("order".to_string()))
}

/// `GET /api/orders/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderWithItems>> {
    let repos = state.repos();
    let order = load(repos, id).await?;
    let items = repos.orders.items(id).await?;
    Ok(Json(OrderWithItems { order, items }))
}

/// `PUT /api/orders/{id}/status`
///
/// Moves an order one step along its lifecycle. Cancelling puts the items
/// back into stock.
pub async fn set_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Order>> {
    let repos = state.repos();
    let current = load(repos, id).await?;
    if !current.status.can_transition_to(body.status) {
        return Err(AppError::Conflict(format!(
            "Cannot move an order from {} to {}",
            current.status, body.status
        )));
    }

    let order = repos.orders.set_status(id, body.status).await?;
    if body.status == OrderStatus::Cancelled {
        let items = repos.orders.items(id).await?;
        restock(repos, &items).await;
    }
    info!(
        admin_id = %admin.id,
        order_id = %id,
        from = %current.status,
        to = %order.status,
        "Order status changed"
    );
    Ok(Json(order))
}

/// Best effort: a failed restock is logged, the status change stands.
///
/// Stock is read past the listing cache; the storefront may have sold units
/// since this process last looked.
async fn restock(repos: &Repositories, items: &[OrderItem]) {
    for item in items {
        let listing = match repos.listings.get_fresh(item.coin_id).await {
            Ok(Some(listing)) => listing,
            Ok(None) => {
                warn!(coin_id = %item.coin_id, "Cannot restock a deleted listing");
                continue;
            }
            Err(e) => {
                warn!(coin_id = %item.coin_id, error = %e, "Failed to load listing for restock");
                continue;
            }
        };
        let update = ListingUpdate {
            stock_quantity: Some(listing.stock_quantity.saturating_add(item.quantity)),
            ..ListingUpdate::default()
        };
        if let Err(e) = repos.listings.update(item.coin_id, &update).await {
            warn!(coin_id = %item.coin_id, error = %e, "Failed to restock listing");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use numisma_backend::InMemoryBackend;
    use numisma_backend::models::{NewCoinListing, NewOrder, NewOrderItem, ShippingAddress};
    use numisma_backend::repository::CachedListings;
    use numisma_core::{PhoneNumber, Price, ProfileId, Rarity};

    use super::*;

    #[tokio::test]
    async fn test_restock_ignores_stale_cache() {
        let backend = InMemoryBackend::new();
        let storefront = backend.repositories();
        let repos = Repositories {
            listings: Arc::new(CachedListings::new(Arc::clone(&storefront.listings))),
            ..storefront.clone()
        };

        let coin = repos
            .listings
            .create(&NewCoinListing {
                title: "Kutch Kori".to_string(),
                description: None,
                mint_date: None,
                region: None,
                value: Price::new(300),
                rarity: Rarity::Rare,
                metal: None,
                dynasty: None,
                ruler: None,
                condition: None,
                images: vec![],
                stock_quantity: 4,
                seller_id: None,
            })
            .await
            .unwrap()
            .id;
        // The admin views the listing while it still has 4 in stock.
        assert_eq!(repos.listings.get(coin).await.unwrap().unwrap().stock_quantity, 4);

        // The storefront sells all four.
        let order = storefront
            .orders
            .create(&NewOrder {
                user_id: ProfileId::generate(),
                status: OrderStatus::Pending,
                total: Price::new(1200),
                shipping_address: ShippingAddress {
                    full_name: "Asha Rao".to_string(),
                    line1: "4 Fort Road".to_string(),
                    line2: None,
                    city: "Bhuj".to_string(),
                    state: "Gujarat".to_string(),
                    postal_code: "370001".to_string(),
                    country: "India".to_string(),
                    phone: PhoneNumber::parse("9876543210").unwrap(),
                },
            })
            .await
            .unwrap();
        let items = storefront
            .orders
            .add_items(&[NewOrderItem {
                order_id: order.id,
                coin_id: coin,
                title: "Kutch Kori".to_string(),
                price: Price::new(300),
                quantity: 4,
            }])
            .await
            .unwrap();
        storefront
            .listings
            .update(
                coin,
                &ListingUpdate {
                    stock_quantity: Some(0),
                    ..ListingUpdate::default()
                },
            )
            .await
            .unwrap();

        restock(&repos, &items).await;
        let listing = storefront.listings.get(coin).await.unwrap().unwrap();
        assert_eq!(listing.stock_quantity, 4);
    }
}
