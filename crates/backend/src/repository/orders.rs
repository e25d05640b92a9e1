use async_trait::async_trait;
use numisma_core::{OrderId, OrderStatus, Price, ProfileId};
use serde::Deserialize;
use tracing::instrument;

use super::RepositoryError;
use crate::client::BackendClient;
use crate::models::tables::{ORDER_ITEMS, ORDERS};
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem, Page, PageRequest};
use crate::query::Direction;

/// Access to `orders` and `order_items`.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError>;

    async fn add_items(&self, items: &[NewOrderItem]) -> Result<Vec<OrderItem>, RepositoryError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError>;

    /// A user's orders, newest first.
    async fn list_for_user(&self, user_id: ProfileId) -> Result<Vec<Order>, RepositoryError>;

    /// All orders, newest first, optionally by status (admin view).
    async fn list(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>, RepositoryError>;

    /// Write a new status. Transition rules are enforced by callers.
    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, RepositoryError>;

    async fn set_payment_reference(
        &self,
        id: OrderId,
        reference: &str,
    ) -> Result<Order, RepositoryError>;

    async fn count(&self, status: Option<OrderStatus>) -> Result<u64, RepositoryError>;

    /// Sum of totals over orders that were not cancelled.
    async fn revenue(&self) -> Result<Price, RepositoryError>;
}

pub struct RestOrderRepository {
    client: BackendClient,
}

impl RestOrderRepository {
    #[must_use]
    pub const fn new(client: BackendClient) -> Self {
        Self { client }
    }

    async fn patch(&self, id: OrderId, body: serde_json::Value) -> Result<Order, RepositoryError> {
        let rows: Vec<Order> = self
            .client
            .from(ORDERS)
            .eq("id", id)
            .update(&body)
            .await?;
        rows.into_iter().next().ok_or(RepositoryError::NotFound)
    }
}

#[derive(Deserialize)]
struct TotalRow {
    total: Price,
}

#[async_trait]
impl OrderRepository for RestOrderRepository {
    #[instrument(skip(self, order), fields(user_id = %order.user_id, total = %order.total))]
    async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let rows: Vec<Order> = self.client.from(ORDERS).insert(order).await?;
        rows.into_iter().next().ok_or(RepositoryError::NotFound)
    }

    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn add_items(&self, items: &[NewOrderItem]) -> Result<Vec<OrderItem>, RepositoryError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.client.from(ORDER_ITEMS).insert(items).await?)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .client
            .from(ORDERS)
            .eq("id", id)
            .fetch_optional()
            .await?)
    }

    #[instrument(skip(self))]
    async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        Ok(self
            .client
            .from(ORDER_ITEMS)
            .eq("order_id", order_id)
            .fetch()
            .await?)
    }

    #[instrument(skip(self))]
    async fn list_for_user(&self, user_id: ProfileId) -> Result<Vec<Order>, RepositoryError> {
        Ok(self
            .client
            .from(ORDERS)
            .eq("user_id", user_id)
            .order("created_at", Direction::Descending)
            .fetch()
            .await?)
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>, RepositoryError> {
        let (from, to) = page.range();
        let mut query = self.client.from(ORDERS).select("*");
        if let Some(status) = status {
            query = query.eq("status", status);
        }
        let (rows, count) = query
            .order("created_at", Direction::Descending)
            .range(from, to)
            .fetch_page()
            .await?;
        Ok(Page::new(rows, count, page))
    }

    #[instrument(skip(self))]
    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, RepositoryError> {
        self.patch(
            id,
            serde_json::json!({ "status": status, "updated_at": chrono::Utc::now() }),
        )
        .await
    }

    #[instrument(skip(self, reference))]
    async fn set_payment_reference(
        &self,
        id: OrderId,
        reference: &str,
    ) -> Result<Order, RepositoryError> {
        self.patch(
            id,
            serde_json::json!({ "payment_reference": reference, "updated_at": chrono::Utc::now() }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn count(&self, status: Option<OrderStatus>) -> Result<u64, RepositoryError> {
        let mut query = self.client.from(ORDERS);
        if let Some(status) = status {
            query = query.eq("status", status);
        }
        Ok(query.count().await?)
    }

    #[instrument(skip(self))]
    async fn revenue(&self) -> Result<Price, RepositoryError> {
        let rows: Vec<TotalRow> = self
            .client
            .from(ORDERS)
            .select("total")
            .neq("status", OrderStatus::Cancelled)
            .fetch()
            .await?;
        Ok(rows.into_iter().map(|r| r.total).sum())
    }
}
