//! Checkout: cart to order, payment request and order lifecycle for buyers.
//!
//! Placing an order snapshots each cart line into `order_items`, requests
//! payment, takes the quantities out of stock and empties the cart. The
//! order stays `pending` until its payment is confirmed, then moves to
//! `processing`.
//!
//! There are no cross-table transactions; each step is a separate backend
//! call. When a step after the order row exists fails, the order is
//! cancelled, taken stock is put back and the payment request is voided, so
//! the cart is left as it was and a retry places a fresh order.

use numisma_backend::Repositories;
use numisma_backend::models::{
    ListingUpdate, NewOrder, NewOrderItem, Order, OrderItem, OrderWithItems, ShippingAddress,
};
use numisma_backend::repository::{CartRepository, ListingRepository, OrderRepository};
use numisma_core::{Currency, OrderId, OrderStatus};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::{AppError, FieldErrors, Result};
use crate::models::CurrentUser;
use crate::services::cart::{CartLine, CartService};
use crate::services::notification::{Notification, NotificationDispatcher, Recipient};
use crate::services::payment::{
    PaymentError, PaymentIntent, PaymentOutcome, PaymentProvider, PaymentRequest,
};

/// A freshly placed order with the payment to make.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order: OrderWithItems,
    pub payment: PaymentIntent,
}

/// Payment reference for an order: `ORD-` and the first eight hex digits of
/// its id.
#[must_use]
pub fn payment_reference(order_id: OrderId) -> String {
    let prefix: String = order_id.as_uuid().simple().to_string().chars().take(8).collect();
    format!("ORD-{}", prefix.to_uppercase())
}

fn check_address(address: &ShippingAddress) -> Result<()> {
    let mut errors = FieldErrors::new();
    for field in address.missing_fields() {
        errors.add(format!("shipping_address.{field}"), "Required");
    }
    errors.into_result()
}

fn check_stock(lines: &[CartLine]) -> Result<()> {
    let mut errors = FieldErrors::new();
    for line in lines {
        if line.quantity > line.listing.stock_quantity {
            let message = if line.listing.stock_quantity == 0 {
                format!("{} is sold out", line.listing.title)
            } else {
                format!(
                    "Only {} of {} left",
                    line.listing.stock_quantity, line.listing.title
                )
            };
            errors.add(format!("coin_{}", line.coin_id), message);
        }
    }
    errors.into_result()
}

pub struct CheckoutService<'a> {
    repos: &'a Repositories,
    cart: &'a dyn CartRepository,
    listings: &'a dyn ListingRepository,
    orders: &'a dyn OrderRepository,
    payments: &'a dyn PaymentProvider,
    notifier: &'a NotificationDispatcher,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub fn new(
        repos: &'a Repositories,
        payments: &'a dyn PaymentProvider,
        notifier: &'a NotificationDispatcher,
    ) -> Self {
        Self {
            repos,
            cart: repos.cart.as_ref(),
            listings: repos.listings.as_ref(),
            orders: repos.orders.as_ref(),
            payments,
            notifier,
        }
    }

    /// Turn the user's cart into a pending order and request payment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for a blank address field or a line
    /// exceeding stock, `AppError::BadRequest` for an empty cart, and the
    /// backend or payment error otherwise. Any failure after the order row
    /// is written cancels the order again.
    #[instrument(skip(self, user, address), fields(user_id = %user.id))]
    pub async fn place_order(
        &self,
        user: &CurrentUser,
        address: ShippingAddress,
    ) -> Result<PlacedOrder> {
        check_address(&address)?;
        let cart = CartService::new(self.repos).view(user.id).await?;
        if cart.is_empty() {
            return Err(AppError::BadRequest("Your cart is empty".to_string()));
        }
        check_stock(&cart.lines)?;

        let order = self
            .orders
            .create(&NewOrder {
                user_id: user.id,
                status: OrderStatus::Pending,
                total: cart.subtotal,
                shipping_address: address,
            })
            .await?;
        let new_items: Vec<NewOrderItem> = cart
            .lines
            .iter()
            .map(|line| NewOrderItem {
                order_id: order.id,
                coin_id: line.coin_id,
                title: line.listing.title.clone(),
                price: line.listing.value,
                quantity: line.quantity,
            })
            .collect();
        let items = match self.orders.add_items(&new_items).await {
            Ok(items) => items,
            Err(e) => return Err(self.abandon(order.id, &[], None, e.into()).await),
        };

        let reference = payment_reference(order.id);
        let payment = match self.payments.create(&order_payment(&order, &reference)).await {
            Ok(intent) => intent,
            Err(e) => return Err(self.abandon(order.id, &[], None, e.into()).await),
        };
        let order = match self
            .orders
            .set_payment_reference(order.id, &reference)
            .await
        {
            Ok(order) => order,
            Err(e) => {
                return Err(self
                    .abandon(order.id, &[], Some(&reference), e.into())
                    .await);
            }
        };

        for item in &items {
            self.adjust_stock(item, u32::saturating_sub).await;
        }
        if let Err(e) = self.cart.clear(user.id).await {
            return Err(self
                .abandon(order.id, &items, Some(&reference), e.into())
                .await);
        }

        info!(order_id = %order.id, total = %order.total, "Order placed");
        self.notifier
            .dispatch(&Notification::new(
                Recipient::from(user),
                format!("Order {reference} received"),
                format!(
                    "We have received your order of {} item(s) totalling {}. Scan the payment code to complete it.",
                    items.len(),
                    order.total.display(Currency::INR)
                ),
            ))
            .await;

        Ok(PlacedOrder {
            order: OrderWithItems { order, items },
            payment,
        })
    }

    /// Undo a partly placed order and hand back the error that stopped it.
    ///
    /// `taken` are the items already taken out of stock.
    async fn abandon(
        &self,
        order_id: OrderId,
        taken: &[OrderItem],
        reference: Option<&str>,
        error: AppError,
    ) -> AppError {
        warn!(order_id = %order_id, error = %error, "Checkout failed, cancelling order");
        if let Err(e) = self.orders.set_status(order_id, OrderStatus::Cancelled).await {
            warn!(order_id = %order_id, error = %e, "Failed to cancel abandoned order");
        }
        for item in taken {
            self.adjust_stock(item, u32::saturating_add).await;
        }
        if let Some(reference) = reference {
            if let Err(e) = self.payments.fail(reference, "checkout failed").await {
                warn!(error = %e, "Failed to void payment request");
            }
        }
        error
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the backend query fails.
    pub async fn list(&self, user: &CurrentUser) -> Result<Vec<Order>> {
        Ok(self.orders.list_for_user(user.id).await?)
    }

    /// One of the user's orders with its items.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the order does not exist or belongs
    /// to someone else.
    pub async fn get(&self, user: &CurrentUser, order_id: OrderId) -> Result<OrderWithItems> {
        let order = self.owned(user, order_id).await?;
        let items = self.orders.items(order_id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Cancel a pending order, putting its items back into stock.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` once the order has left `pending`.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn cancel(&self, user: &CurrentUser, order_id: OrderId) -> Result<Order> {
        let order = self.owned(user, order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Only pending orders can be cancelled; this one is {}",
                order.status.as_str()
            )));
        }

        let order = self
            .orders
            .set_status(order_id, OrderStatus::Cancelled)
            .await?;
        let items = self.orders.items(order_id).await?;
        self.restock(&items).await;

        if let Some(reference) = &order.payment_reference {
            match self.payments.fail(reference, "order cancelled").await {
                Ok(()) | Err(PaymentError::UnknownReference(_)) => {}
                Err(e) => warn!(error = %e, "Failed to void payment request"),
            }
        }
        info!(order_id = %order.id, "Order cancelled");
        Ok(order)
    }

    /// Record that the user has paid. A confirmed payment moves the order to
    /// `processing`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` when the order is not pending, has no
    /// payment request, or the provider reports the payment as failed or
    /// still pending.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn confirm_payment(&self, user: &CurrentUser, order_id: OrderId) -> Result<Order> {
        let order = self.owned(user, order_id).await?;
        if !order.status.can_transition_to(OrderStatus::Processing) {
            return Err(AppError::Conflict(format!(
                "Order is {}, not awaiting payment",
                order.status.as_str()
            )));
        }
        let reference = order
            .payment_reference
            .as_deref()
            .ok_or_else(|| AppError::Conflict("Order has no payment request".to_string()))?;

        let outcome = match self.payments.confirm(reference).await {
            Ok(outcome) => outcome,
            Err(PaymentError::UnknownReference(_)) => {
                warn!(order_id = %order_id, "Payment request expired");
                return Err(AppError::Conflict(
                    "Payment request expired; request a new payment code".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };
        match outcome {
            PaymentOutcome::Succeeded => {}
            PaymentOutcome::Pending => {
                return Err(AppError::Conflict("Payment not received yet".to_string()));
            }
            PaymentOutcome::Failed(reason) => {
                return Err(AppError::Conflict(format!("Payment failed: {reason}")));
            }
        }

        let order = self
            .orders
            .set_status(order_id, OrderStatus::Processing)
            .await?;
        info!(order_id = %order.id, "Order paid");
        self.notifier
            .dispatch(&Notification::new(
                Recipient::from(user),
                format!("Payment received for {reference}"),
                "Thank you. Your coins are being prepared for shipping.",
            ))
            .await;
        Ok(order)
    }

    /// Issue a new payment code for a pending order whose request expired
    /// or was lost.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` when the order is not pending or its
    /// payment was already received.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn reissue_payment(
        &self,
        user: &CurrentUser,
        order_id: OrderId,
    ) -> Result<PaymentIntent> {
        let order = self.owned(user, order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Order is {}, not awaiting payment",
                order.status.as_str()
            )));
        }
        let reference = payment_reference(order.id);
        match self.payments.status(&reference).await {
            Ok(PaymentOutcome::Succeeded) => {
                return Err(AppError::Conflict(
                    "Payment already received; confirm it instead".to_string(),
                ));
            }
            Ok(_) | Err(PaymentError::UnknownReference(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let intent = self
            .payments
            .create(&order_payment(&order, &reference))
            .await?;
        if order.payment_reference.as_deref() != Some(reference.as_str()) {
            self.orders
                .set_payment_reference(order.id, &reference)
                .await?;
        }
        info!(order_id = %order.id, "Payment code reissued");
        Ok(intent)
    }

    async fn owned(&self, user: &CurrentUser, order_id: OrderId) -> Result<Order> {
        self.orders
            .get(order_id)
            .await?
            .filter(|order| order.user_id == user.id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))
    }

    async fn restock(&self, items: &[OrderItem]) {
        for item in items {
            self.adjust_stock(item, u32::saturating_add).await;
        }
    }

    /// Apply `change(stock, item.quantity)` to the listing's current stock.
    ///
    /// Reads past the listing cache. Stock changes are best effort; a
    /// failure is logged for an operator.
    async fn adjust_stock(&self, item: &OrderItem, change: fn(u32, u32) -> u32) {
        let listing = match self.listings.get_fresh(item.coin_id).await {
            Ok(Some(listing)) => listing,
            Ok(None) => {
                warn!(coin_id = %item.coin_id, "Cannot change stock of a deleted listing");
                return;
            }
            Err(e) => {
                warn!(coin_id = %item.coin_id, error = %e, "Failed to load listing for stock change");
                return;
            }
        };
        let quantity = change(listing.stock_quantity, item.quantity);
        let update = ListingUpdate {
            stock_quantity: Some(quantity),
            ..ListingUpdate::default()
        };
        if let Err(e) = self.listings.update(item.coin_id, &update).await {
            warn!(coin_id = %item.coin_id, quantity, error = %e, "Failed to update stock");
        }
    }
}

fn order_payment(order: &Order, reference: &str) -> PaymentRequest {
    PaymentRequest {
        reference: reference.to_string(),
        amount: order.total,
        note: format!("Numisma order {reference}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use numisma_backend::InMemoryBackend;
    use numisma_backend::models::NewCoinListing;
    use numisma_backend::repository::CachedListings;
    use numisma_core::{CoinId, PhoneNumber, Price, ProfileId, Rarity, Role};

    use super::*;
    use crate::config::PaymentConfig;
    use crate::services::notification::InAppInbox;
    use crate::services::payment::QrPaymentProvider;

    fn user() -> CurrentUser {
        CurrentUser {
            id: ProfileId::generate(),
            email: None,
            phone: None,
            full_name: Some("Ravi".to_string()),
            role: Role::User,
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now(),
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Ravi Kumar".to_string(),
            line1: "12 Mint Street".to_string(),
            line2: None,
            city: "Chennai".to_string(),
            state: "Tamil Nadu".to_string(),
            postal_code: "600001".to_string(),
            country: "India".to_string(),
            phone: PhoneNumber::parse("9876543210").unwrap(),
        }
    }

    fn payments() -> QrPaymentProvider {
        QrPaymentProvider::new(PaymentConfig {
            upi_id: "numisma@okbank".to_string(),
            payee_name: "Numisma".to_string(),
        })
    }

    async fn listing(repos: &Repositories, value: u64, stock: u32) -> CoinId {
        repos
            .listings
            .create(&NewCoinListing {
                title: "Travancore Chuckram".to_string(),
                description: None,
                mint_date: None,
                region: None,
                value: Price::new(value),
                rarity: Rarity::Uncommon,
                metal: None,
                dynasty: None,
                ruler: None,
                condition: None,
                images: vec![],
                stock_quantity: stock,
                seller_id: None,
            })
            .await
            .unwrap()
            .id
    }

    /// A provider that cannot be reached.
    struct UnreachablePayments;

    #[async_trait]
    impl PaymentProvider for UnreachablePayments {
        async fn create(&self, _: &PaymentRequest) -> std::result::Result<PaymentIntent, PaymentError> {
            Err(PaymentError::Unavailable("connection refused".to_string()))
        }

        async fn status(&self, reference: &str) -> std::result::Result<PaymentOutcome, PaymentError> {
            Err(PaymentError::UnknownReference(reference.to_string()))
        }

        async fn confirm(&self, reference: &str) -> std::result::Result<PaymentOutcome, PaymentError> {
            Err(PaymentError::UnknownReference(reference.to_string()))
        }

        async fn fail(&self, reference: &str, _: &str) -> std::result::Result<(), PaymentError> {
            Err(PaymentError::UnknownReference(reference.to_string()))
        }
    }

    async fn stock(repos: &Repositories, coin: CoinId) -> u32 {
        repos
            .listings
            .get_fresh(coin)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity
    }

    async fn statuses(repos: &Repositories, buyer: &CurrentUser) -> Vec<OrderStatus> {
        repos
            .orders
            .list_for_user(buyer.id)
            .await
            .unwrap()
            .iter()
            .map(|o| o.status)
            .collect()
    }

    #[test]
    fn test_payment_reference() {
        let id: OrderId = "0a1b2c3d-0000-4000-8000-000000000000".parse().unwrap();
        assert_eq!(payment_reference(id), "ORD-0A1B2C3D");
    }

    #[tokio::test]
    async fn test_place_confirm_flow() {
        let repos = InMemoryBackend::new().repositories();
        let payments = payments();
        let inbox = InAppInbox::new();
        let notifier = NotificationDispatcher::logging(inbox.clone());
        let service = CheckoutService::new(&repos, &payments, &notifier);
        let buyer = user();

        let coin = listing(&repos, 250, 3).await;
        CartService::new(&repos).add(buyer.id, coin, 2).await.unwrap();

        let placed = service.place_order(&buyer, address()).await.unwrap();
        assert_eq!(placed.order.order.total, Price::new(500));
        assert_eq!(placed.order.order.status, OrderStatus::Pending);
        assert_eq!(placed.order.items.len(), 1);
        assert!(placed.payment.payment_uri.starts_with("upi://pay"));
        assert_eq!(repos.listings.get(coin).await.unwrap().unwrap().stock_quantity, 1);
        assert!(repos.cart.list(buyer.id).await.unwrap().is_empty());
        assert_eq!(inbox.messages(buyer.id).len(), 1);

        let order = service
            .confirm_payment(&buyer, placed.order.order.id)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Processing);

        let err = service.cancel(&buyer, order.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_cancel_restocks() {
        let repos = InMemoryBackend::new().repositories();
        let payments = payments();
        let notifier = NotificationDispatcher::default();
        let service = CheckoutService::new(&repos, &payments, &notifier);
        let buyer = user();

        let coin = listing(&repos, 90, 4).await;
        CartService::new(&repos).add(buyer.id, coin, 4).await.unwrap();
        let placed = service.place_order(&buyer, address()).await.unwrap();
        assert_eq!(repos.listings.get(coin).await.unwrap().unwrap().stock_quantity, 0);

        let order = service.cancel(&buyer, placed.order.order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(repos.listings.get(coin).await.unwrap().unwrap().stock_quantity, 4);

        let reference = placed.payment.reference;
        assert!(matches!(
            payments.status(&reference).await.unwrap(),
            PaymentOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_validation() {
        let repos = InMemoryBackend::new().repositories();
        let payments = payments();
        let notifier = NotificationDispatcher::default();
        let service = CheckoutService::new(&repos, &payments, &notifier);
        let buyer = user();

        let err = service.place_order(&buyer, address()).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let blank = ShippingAddress {
            city: " ".to_string(),
            ..address()
        };
        let err = service.place_order(&buyer, blank).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref f) if f.contains("shipping_address.city")));

        let coin = listing(&repos, 10, 2).await;
        CartService::new(&repos).add(buyer.id, coin, 2).await.unwrap();
        repos
            .listings
            .update(
                coin,
                &ListingUpdate {
                    stock_quantity: Some(1),
                    ..ListingUpdate::default()
                },
            )
            .await
            .unwrap();
        let err = service.place_order(&buyer, address()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref f) if f.contains(&format!("coin_{coin}"))));
    }

    #[tokio::test]
    async fn test_other_users_order_is_hidden() {
        let repos = InMemoryBackend::new().repositories();
        let payments = payments();
        let notifier = NotificationDispatcher::default();
        let service = CheckoutService::new(&repos, &payments, &notifier);
        let buyer = user();

        let coin = listing(&repos, 10, 2).await;
        CartService::new(&repos).add(buyer.id, coin, 1).await.unwrap();
        let placed = service.place_order(&buyer, address()).await.unwrap();

        assert!(matches!(
            service.get(&user(), placed.order.order.id).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(service.list(&buyer).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_payments_leave_cart_alone() {
        let repos = InMemoryBackend::new().repositories();
        let payments = UnreachablePayments;
        let notifier = NotificationDispatcher::default();
        let service = CheckoutService::new(&repos, &payments, &notifier);
        let buyer = user();

        let coin = listing(&repos, 250, 3).await;
        CartService::new(&repos).add(buyer.id, coin, 2).await.unwrap();

        let err = service.place_order(&buyer, address()).await.unwrap_err();
        assert!(matches!(err, AppError::Payment(PaymentError::Unavailable(_))));

        let cart = repos.cart.list(buyer.id).await.unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 2);
        assert_eq!(stock(&repos, coin).await, 3);
        assert_eq!(statuses(&repos, &buyer).await, vec![OrderStatus::Cancelled]);
    }

    #[tokio::test]
    async fn test_failed_items_insert_cancels_order() {
        let backend = InMemoryBackend::new();
        let repos = backend.repositories();
        let payments = payments();
        let notifier = NotificationDispatcher::default();
        let service = CheckoutService::new(&repos, &payments, &notifier);
        let buyer = user();

        let coin = listing(&repos, 250, 3).await;
        CartService::new(&repos).add(buyer.id, coin, 1).await.unwrap();

        backend.break_operation("orders.add_items");
        let err = service.place_order(&buyer, address()).await.unwrap_err();
        assert!(matches!(err, AppError::Repository(_)));

        let orders = repos.orders.list_for_user(buyer.id).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Cancelled);
        assert!(matches!(
            payments.status(&payment_reference(orders[0].id)).await,
            Err(PaymentError::UnknownReference(_))
        ));
        assert_eq!(repos.cart.list(buyer.id).await.unwrap().len(), 1);
        assert_eq!(stock(&repos, coin).await, 3);
    }

    #[tokio::test]
    async fn test_failed_cart_clear_undoes_order() {
        let backend = InMemoryBackend::new();
        let repos = backend.repositories();
        let payments = payments();
        let notifier = NotificationDispatcher::default();
        let service = CheckoutService::new(&repos, &payments, &notifier);
        let buyer = user();

        let coin = listing(&repos, 250, 3).await;
        CartService::new(&repos).add(buyer.id, coin, 2).await.unwrap();

        backend.break_operation("cart.clear");
        let err = service.place_order(&buyer, address()).await.unwrap_err();
        assert!(matches!(err, AppError::Repository(_)));

        let orders = repos.orders.list_for_user(buyer.id).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Cancelled);
        assert!(matches!(
            payments.status(&payment_reference(orders[0].id)).await.unwrap(),
            PaymentOutcome::Failed(_)
        ));
        assert_eq!(stock(&repos, coin).await, 3);
        assert_eq!(repos.cart.list(buyer.id).await.unwrap().len(), 1);

        // Once the backend recovers a retry places exactly one live order.
        backend.restore("cart.clear");
        service.place_order(&buyer, address()).await.unwrap();
        assert_eq!(stock(&repos, coin).await, 1);
        let mut seen = statuses(&repos, &buyer).await;
        seen.sort_by_key(|s| s.as_str());
        assert_eq!(seen, vec![OrderStatus::Cancelled, OrderStatus::Pending]);
    }

    #[tokio::test]
    async fn test_restock_reads_past_listing_cache() {
        let backend = InMemoryBackend::new();
        let admin = backend.repositories();
        let storefront = Repositories {
            listings: Arc::new(CachedListings::new(Arc::clone(&admin.listings))),
            ..admin.clone()
        };
        let payments = payments();
        let notifier = NotificationDispatcher::default();
        let service = CheckoutService::new(&storefront, &payments, &notifier);
        let buyer = user();

        let coin = listing(&admin, 90, 4).await;
        CartService::new(&storefront).add(buyer.id, coin, 2).await.unwrap();
        let placed = service.place_order(&buyer, address()).await.unwrap();
        assert_eq!(storefront.listings.get(coin).await.unwrap().unwrap().stock_quantity, 2);

        // New stock arrives through the admin process; the storefront cache
        // still says 2.
        admin
            .listings
            .update(
                coin,
                &ListingUpdate {
                    stock_quantity: Some(10),
                    ..ListingUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(storefront.listings.get(coin).await.unwrap().unwrap().stock_quantity, 2);

        service.cancel(&buyer, placed.order.order.id).await.unwrap();
        assert_eq!(stock(&admin, coin).await, 12);
    }

    #[tokio::test]
    async fn test_expired_payment_can_be_reissued() {
        let repos = InMemoryBackend::new().repositories();
        let notifier = NotificationDispatcher::default();
        let buyer = user();

        let coin = listing(&repos, 250, 3).await;
        CartService::new(&repos).add(buyer.id, coin, 1).await.unwrap();
        let before_restart = payments();
        let placed = CheckoutService::new(&repos, &before_restart, &notifier)
            .place_order(&buyer, address())
            .await
            .unwrap();
        let order_id = placed.order.order.id;

        let after_restart = payments();
        let service = CheckoutService::new(&repos, &after_restart, &notifier);
        let err = service.confirm_payment(&buyer, order_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("expired")));
        assert_eq!(statuses(&repos, &buyer).await, vec![OrderStatus::Pending]);

        let intent = service.reissue_payment(&buyer, order_id).await.unwrap();
        assert_eq!(intent.reference, placed.payment.reference);
        assert_eq!(intent.amount, Price::new(250));

        let order = service.confirm_payment(&buyer, order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert!(matches!(
            service.reissue_payment(&buyer, order_id).await,
            Err(AppError::Conflict(_))
        ));
    }
}
