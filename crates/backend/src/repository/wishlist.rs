use async_trait::async_trait;
use numisma_core::{CoinId, ProfileId};
use tracing::instrument;

use super::RepositoryError;
use crate::client::BackendClient;
use crate::models::tables::WISHLIST_ITEMS;
use crate::models::{NewWishlistItem, WishlistItem};
use crate::query::Direction;

/// Access to `wishlist_items`.
#[async_trait]
pub trait WishlistRepository: Send + Sync {
    /// A user's saved coins, newest first.
    async fn list(&self, user_id: ProfileId) -> Result<Vec<WishlistItem>, RepositoryError>;

    async fn contains(&self, user_id: ProfileId, coin_id: CoinId) -> Result<bool, RepositoryError>;

    /// Insert; `Conflict` if the pair already exists.
    async fn add(&self, item: &NewWishlistItem) -> Result<WishlistItem, RepositoryError>;

    async fn remove(&self, user_id: ProfileId, coin_id: CoinId) -> Result<(), RepositoryError>;
}

pub struct RestWishlistRepository {
    client: BackendClient,
}

impl RestWishlistRepository {
    #[must_use]
    pub const fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WishlistRepository for RestWishlistRepository {
    #[instrument(skip(self))]
    async fn list(&self, user_id: ProfileId) -> Result<Vec<WishlistItem>, RepositoryError> {
        Ok(self
            .client
            .from(WISHLIST_ITEMS)
            .eq("user_id", user_id)
            .order("created_at", Direction::Descending)
            .fetch()
            .await?)
    }

    #[instrument(skip(self))]
    async fn contains(&self, user_id: ProfileId, coin_id: CoinId) -> Result<bool, RepositoryError> {
        let count = self
            .client
            .from(WISHLIST_ITEMS)
            .eq("user_id", user_id)
            .eq("coin_id", coin_id)
            .count()
            .await?;
        Ok(count > 0)
    }

    #[instrument(skip(self))]
    async fn add(&self, item: &NewWishlistItem) -> Result<WishlistItem, RepositoryError> {
        let rows: Vec<WishlistItem> = self.client.from(WISHLIST_ITEMS).insert(item).await?;
        rows.into_iter().next().ok_or(RepositoryError::NotFound)
    }

    #[instrument(skip(self))]
    async fn remove(&self, user_id: ProfileId, coin_id: CoinId) -> Result<(), RepositoryError> {
        self.client
            .from(WISHLIST_ITEMS)
            .eq("user_id", user_id)
            .eq("coin_id", coin_id)
            .delete()
            .await?;
        Ok(())
    }
}
