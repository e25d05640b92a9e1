//! Wishlist backed by `wishlist_items`.

use numisma_backend::models::{CoinListing, NewWishlistItem};
use numisma_backend::repository::{ListingRepository, WishlistRepository};
use numisma_backend::{Repositories, RepositoryError};
use numisma_core::{CoinId, ProfileId};
use tracing::{debug, instrument};

use crate::error::{AppError, Result};
use crate::models::WishlistSnapshot;

pub struct WishlistService<'a> {
    wishlist: &'a dyn WishlistRepository,
    listings: &'a dyn ListingRepository,
}

impl<'a> WishlistService<'a> {
    #[must_use]
    pub fn new(repos: &'a Repositories) -> Self {
        Self {
            wishlist: repos.wishlist.as_ref(),
            listings: repos.listings.as_ref(),
        }
    }

    /// Saved listings, most recently saved first. Missing listings are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the backend query fails.
    pub async fn list(&self, user_id: ProfileId) -> Result<Vec<CoinListing>> {
        let items = self.wishlist.list(user_id).await?;
        let ids: Vec<CoinId> = items.iter().map(|i| i.coin_id).collect();
        let mut listings = self.listings.get_many(&ids).await?;
        listings.sort_by_key(|l| ids.iter().position(|id| *id == l.id));
        Ok(listings)
    }

    /// Save a coin. Saving a coin twice is a no-op.
    ///
    /// Returns whether a row was added.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown coin.
    #[instrument(skip(self))]
    pub async fn add(&self, user_id: ProfileId, coin_id: CoinId) -> Result<bool> {
        if self.listings.get(coin_id).await?.is_none() {
            return Err(AppError::NotFound(format!("coin {coin_id}")));
        }
        if self.wishlist.contains(user_id, coin_id).await? {
            return Ok(false);
        }
        match self.wishlist.add(&NewWishlistItem { user_id, coin_id }).await {
            Ok(_) => Ok(true),
            Err(RepositoryError::Conflict(_)) => {
                debug!("Coin already on wishlist");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a coin. Removing an absent coin is not an error.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the backend call fails.
    pub async fn remove(&self, user_id: ProfileId, coin_id: CoinId) -> Result<()> {
        self.wishlist.remove(user_id, coin_id).await?;
        Ok(())
    }

    /// Coin ids on the wishlist.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the backend query fails.
    pub async fn snapshot(&self, user_id: ProfileId) -> Result<WishlistSnapshot> {
        Ok(WishlistSnapshot(
            self.wishlist
                .list(user_id)
                .await?
                .into_iter()
                .map(|item| item.coin_id)
                .collect(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use numisma_backend::InMemoryBackend;
    use numisma_backend::models::NewCoinListing;
    use numisma_core::{Price, Rarity};

    use super::*;

    async fn listing(repos: &Repositories, title: &str) -> CoinId {
        repos
            .listings
            .create(&NewCoinListing {
                title: title.to_string(),
                description: None,
                mint_date: None,
                region: None,
                value: Price::new(75),
                rarity: Rarity::Uncommon,
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
    async fn test_duplicate_add_is_noop() {
        let repos = InMemoryBackend::new().repositories();
        let coin = listing(&repos, "Double Eagle").await;
        let service = WishlistService::new(&repos);
        let user = ProfileId::generate();

        assert!(service.add(user, coin).await.unwrap());
        assert!(!service.add(user, coin).await.unwrap());
        assert_eq!(service.list(user).await.unwrap().len(), 1);
        assert!(service.snapshot(user).await.unwrap().contains(coin));

        service.remove(user, coin).await.unwrap();
        service.remove(user, coin).await.unwrap();
        assert_eq!(service.snapshot(user).await.unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_coin() {
        let repos = InMemoryBackend::new().repositories();
        let service = WishlistService::new(&repos);
        assert!(matches!(
            service.add(ProfileId::generate(), CoinId::generate()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
