use async_trait::async_trait;
use numisma_core::{CoinId, ProfileId};
use tracing::instrument;

use super::{RepositoryError, convert_rows, single};
use crate::client::BackendClient;
use crate::models::review::CoinReviewRow;
use crate::models::tables::COIN_REVIEWS;
use crate::models::{CoinReview, NewReview};
use crate::query::Direction;

/// Access to `coin_reviews`.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Reviews of a coin, newest first.
    async fn list_for_coin(&self, coin_id: CoinId) -> Result<Vec<CoinReview>, RepositoryError>;

    async fn create(&self, review: &NewReview) -> Result<CoinReview, RepositoryError>;

    /// Whether the user has already reviewed the coin.
    async fn has_reviewed(
        &self,
        user_id: ProfileId,
        coin_id: CoinId,
    ) -> Result<bool, RepositoryError>;

    async fn count(&self) -> Result<u64, RepositoryError>;
}

pub struct RestReviewRepository {
    client: BackendClient,
}

impl RestReviewRepository {
    #[must_use]
    pub const fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReviewRepository for RestReviewRepository {
    #[instrument(skip(self))]
    async fn list_for_coin(&self, coin_id: CoinId) -> Result<Vec<CoinReview>, RepositoryError> {
        let rows: Vec<CoinReviewRow> = self
            .client
            .from(COIN_REVIEWS)
            .eq("coin_id", coin_id)
            .order("created_at", Direction::Descending)
            .fetch()
            .await?;
        convert_rows(rows)
    }

    #[instrument(skip(self, review), fields(coin_id = %review.coin_id))]
    async fn create(&self, review: &NewReview) -> Result<CoinReview, RepositoryError> {
        let rows: Vec<CoinReviewRow> = self.client.from(COIN_REVIEWS).insert(review).await?;
        single(rows)
    }

    #[instrument(skip(self))]
    async fn has_reviewed(
        &self,
        user_id: ProfileId,
        coin_id: CoinId,
    ) -> Result<bool, RepositoryError> {
        let count = self
            .client
            .from(COIN_REVIEWS)
            .eq("user_id", user_id)
            .eq("coin_id", coin_id)
            .count()
            .await?;
        Ok(count > 0)
    }

    #[instrument(skip(self))]
    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.client.from(COIN_REVIEWS).count().await?)
    }
}
