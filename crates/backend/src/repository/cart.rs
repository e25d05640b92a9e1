use async_trait::async_trait;
use numisma_core::{CartItemId, CoinId, ProfileId};
use tracing::instrument;

use super::RepositoryError;
use crate::client::BackendClient;
use crate::models::tables::CART_ITEMS;
use crate::models::{CartItem, NewCartItem};
use crate::query::Direction;

/// Access to `cart_items`.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// A user's lines, oldest first.
    async fn list(&self, user_id: ProfileId) -> Result<Vec<CartItem>, RepositoryError>;

    async fn get(
        &self,
        user_id: ProfileId,
        coin_id: CoinId,
    ) -> Result<Option<CartItem>, RepositoryError>;

    /// Insert a new line; `Conflict` if the pair already exists.
    async fn insert(&self, item: &NewCartItem) -> Result<CartItem, RepositoryError>;

    async fn set_quantity(
        &self,
        id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem, RepositoryError>;

    async fn remove(&self, user_id: ProfileId, coin_id: CoinId) -> Result<(), RepositoryError>;

    async fn clear(&self, user_id: ProfileId) -> Result<(), RepositoryError>;
}

pub struct RestCartRepository {
    client: BackendClient,
}

impl RestCartRepository {
    #[must_use]
    pub const fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CartRepository for RestCartRepository {
    #[instrument(skip(self))]
    async fn list(&self, user_id: ProfileId) -> Result<Vec<CartItem>, RepositoryError> {
        Ok(self
            .client
            .from(CART_ITEMS)
            .eq("user_id", user_id)
            .order("created_at", Direction::Ascending)
            .fetch()
            .await?)
    }

    #[instrument(skip(self))]
    async fn get(
        &self,
        user_id: ProfileId,
        coin_id: CoinId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        Ok(self
            .client
            .from(CART_ITEMS)
            .eq("user_id", user_id)
            .eq("coin_id", coin_id)
            .fetch_optional()
            .await?)
    }

    #[instrument(skip(self))]
    async fn insert(&self, item: &NewCartItem) -> Result<CartItem, RepositoryError> {
        let rows: Vec<CartItem> = self.client.from(CART_ITEMS).insert(item).await?;
        rows.into_iter().next().ok_or(RepositoryError::NotFound)
    }

    #[instrument(skip(self))]
    async fn set_quantity(
        &self,
        id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem, RepositoryError> {
        let rows: Vec<CartItem> = self
            .client
            .from(CART_ITEMS)
            .eq("id", id)
            .update(&serde_json::json!({ "quantity": quantity }))
            .await?;
        rows.into_iter().next().ok_or(RepositoryError::NotFound)
    }

    #[instrument(skip(self))]
    async fn remove(&self, user_id: ProfileId, coin_id: CoinId) -> Result<(), RepositoryError> {
        self.client
            .from(CART_ITEMS)
            .eq("user_id", user_id)
            .eq("coin_id", coin_id)
            .delete()
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear(&self, user_id: ProfileId) -> Result<(), RepositoryError> {
        self.client
            .from(CART_ITEMS)
            .eq("user_id", user_id)
            .delete()
            .await?;
        Ok(())
    }
}
