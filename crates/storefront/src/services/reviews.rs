//! Coin reviews.
//!
//! A user may review the same coin more than once; repeat reviews are
//! stored and logged.

use numisma_backend::Repositories;
use numisma_backend::models::{CoinReview, NewReview};
use numisma_backend::repository::{ListingRepository, ReviewRepository};
use numisma_core::{CoinId, ProfileId, Rating};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::{AppError, FieldErrors, Result};

const COMMENT_MAX: usize = 2000;

/// Review as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewForm {
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

pub struct ReviewService<'a> {
    reviews: &'a dyn ReviewRepository,
    listings: &'a dyn ListingRepository,
}

impl<'a> ReviewService<'a> {
    #[must_use]
    pub fn new(repos: &'a Repositories) -> Self {
        Self {
            reviews: repos.reviews.as_ref(),
            listings: repos.listings.as_ref(),
        }
    }

    /// Reviews of a coin, newest first.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the backend query fails.
    pub async fn list(&self, coin_id: CoinId) -> Result<Vec<CoinReview>> {
        Ok(self.reviews.list_for_coin(coin_id).await?)
    }

    /// Store a review by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for a rating outside 1-5 or an
    /// overlong comment, and `AppError::NotFound` for an unknown coin.
    #[instrument(skip(self, form), fields(rating = form.rating))]
    pub async fn submit(
        &self,
        user_id: ProfileId,
        coin_id: CoinId,
        form: ReviewForm,
    ) -> Result<CoinReview> {
        let mut errors = FieldErrors::new();
        let rating = Rating::new(form.rating).map_err(|e| errors.add("rating", e.to_string()));
        let comment = form
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if comment
            .as_ref()
            .is_some_and(|c| c.chars().count() > COMMENT_MAX)
        {
            errors.add(
                "comment",
                format!("Comment must be at most {COMMENT_MAX} characters"),
            );
        }
        let Ok(rating) = rating else {
            return Err(errors.into());
        };
        errors.into_result()?;

        if self.listings.get(coin_id).await?.is_none() {
            return Err(AppError::NotFound(format!("coin {coin_id}")));
        }
        if self.reviews.has_reviewed(user_id, coin_id).await? {
            info!("User is reviewing this coin again");
        }

        let review = self
            .reviews
            .create(&NewReview {
                coin_id,
                user_id,
                rating,
                comment,
            })
            .await?;
        info!(review_id = %review.id, "Review stored");
        Ok(review)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use numisma_backend::InMemoryBackend;
    use numisma_backend::models::NewCoinListing;
    use numisma_core::{Price, Rarity};

    use super::*;

    async fn seed(repos: &Repositories) -> CoinId {
        repos
            .listings
            .create(&NewCoinListing {
                title: "Shah Jahan Rupee".to_string(),
                description: None,
                mint_date: None,
                region: Some("India".to_string()),
                value: Price::new(1500),
                rarity: Rarity::Rare,
                metal: None,
                dynasty: None,
                ruler: None,
                condition: None,
                images: vec![],
                stock_quantity: 1,
                seller_id: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_rating_bounds() {
        let repos = InMemoryBackend::new().repositories();
        let coin = seed(&repos).await;
        let service = ReviewService::new(&repos);
        let user = ProfileId::generate();

        for rating in [0, 6, -1] {
            let err = service
                .submit(user, coin, ReviewForm { rating, comment: None })
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(ref f) if f.contains("rating")));
        }
    }

    #[tokio::test]
    async fn test_duplicate_reviews_allowed() {
        let repos = InMemoryBackend::new().repositories();
        let coin = seed(&repos).await;
        let service = ReviewService::new(&repos);
        let user = ProfileId::generate();

        for rating in [3, 5] {
            service
                .submit(
                    user,
                    coin,
                    ReviewForm {
                        rating,
                        comment: Some(" Lovely patina ".to_string()),
                    },
                )
                .await
                .unwrap();
        }
        let reviews = service.list(coin).await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert!(reviews.iter().all(|r| r.comment.as_deref() == Some("Lovely patina")));
    }

    #[tokio::test]
    async fn test_unknown_coin() {
        let repos = InMemoryBackend::new().repositories();
        let service = ReviewService::new(&repos);
        assert!(matches!(
            service
                .submit(
                    ProfileId::generate(),
                    CoinId::generate(),
                    ReviewForm { rating: 4, comment: None }
                )
                .await,
            Err(AppError::NotFound(_))
        ));
    }
}
