//! Shopping cart backed by `cart_items`.
//!
//! One row per (user, coin). Adding a coin that is already in the cart
//! merges the quantity into the existing row.

use std::collections::HashMap;

use numisma_backend::models::{CartItem, CoinListing, NewCartItem};
use numisma_backend::repository::{CartRepository, ListingRepository};
use numisma_backend::{Repositories, RepositoryError};
use numisma_core::{CoinId, Price, ProfileId};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::{AppError, FieldErrors, Result};
use crate::models::CartSnapshot;

/// Units of one coin allowed in a cart line.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// A cart row joined with its listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub coin_id: CoinId,
    pub quantity: u32,
    pub listing: CoinListing,
    pub line_total: Price,
}

/// The whole cart.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub subtotal: Price,
    pub count: u32,
}

impl CartView {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot(
            self.lines
                .iter()
                .map(|line| (line.coin_id, line.quantity))
                .collect(),
        )
    }
}

fn check_quantity(quantity: u32) -> Result<()> {
    if (1..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(FieldErrors::single(
            "quantity",
            format!("Quantity must be between 1 and {MAX_LINE_QUANTITY}"),
        )
        .into())
    }
}

pub struct CartService<'a> {
    cart: &'a dyn CartRepository,
    listings: &'a dyn ListingRepository,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub fn new(repos: &'a Repositories) -> Self {
        Self {
            cart: repos.cart.as_ref(),
            listings: repos.listings.as_ref(),
        }
    }

    /// Cart lines with listings, subtotal and unit count.
    ///
    /// Rows whose listing no longer exists are left out.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the backend query fails.
    pub async fn view(&self, user_id: ProfileId) -> Result<CartView> {
        let items = self.cart.list(user_id).await?;
        if items.is_empty() {
            return Ok(CartView::default());
        }

        let ids: Vec<CoinId> = items.iter().map(|i| i.coin_id).collect();
        let mut listings: HashMap<CoinId, CoinListing> = self
            .listings
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|l| (l.id, l))
            .collect();

        let mut view = CartView::default();
        for item in items {
            let Some(listing) = listings.remove(&item.coin_id) else {
                warn!(coin_id = %item.coin_id, "Cart row references a missing listing");
                continue;
            };
            let line_total = listing.value.times(item.quantity);
            view.subtotal = view.subtotal + line_total;
            view.count = view.count.saturating_add(item.quantity);
            view.lines.push(CartLine {
                coin_id: item.coin_id,
                quantity: item.quantity,
                listing,
                line_total,
            });
        }
        Ok(view)
    }

    /// Add `quantity` units of a coin, merging with an existing row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown coin, `AppError::Conflict`
    /// when it is out of stock, and a validation error for a bad quantity.
    #[instrument(skip(self))]
    pub async fn add(&self, user_id: ProfileId, coin_id: CoinId, quantity: u32) -> Result<CartItem> {
        check_quantity(quantity)?;
        let listing = self
            .listings
            .get_fresh(coin_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("coin {coin_id}")))?;
        if !listing.in_stock() {
            return Err(AppError::Conflict(format!("{} is out of stock", listing.title)));
        }

        if let Some(existing) = self.cart.get(user_id, coin_id).await? {
            return self.merge(&existing, quantity).await;
        }

        let new = NewCartItem {
            user_id,
            coin_id,
            quantity,
        };
        match self.cart.insert(&new).await {
            Ok(item) => {
                info!("Added to cart");
                Ok(item)
            }
            // A concurrent add created the row first.
            Err(RepositoryError::Conflict(_)) => {
                let existing = self
                    .cart
                    .get(user_id, coin_id)
                    .await?
                    .ok_or(RepositoryError::NotFound)?;
                self.merge(&existing, quantity).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn merge(&self, existing: &CartItem, quantity: u32) -> Result<CartItem> {
        let merged = existing
            .quantity
            .saturating_add(quantity)
            .min(MAX_LINE_QUANTITY);
        let item = self.cart.set_quantity(existing.id, merged).await?;
        info!(quantity = merged, "Merged cart quantity");
        Ok(item)
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the coin is not in the cart.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        user_id: ProfileId,
        coin_id: CoinId,
        quantity: u32,
    ) -> Result<Option<CartItem>> {
        if quantity == 0 {
            self.remove(user_id, coin_id).await?;
            return Ok(None);
        }
        check_quantity(quantity)?;
        let existing = self
            .cart
            .get(user_id, coin_id)
            .await?
            .ok_or_else(|| AppError::NotFound("cart line".to_string()))?;
        Ok(Some(self.cart.set_quantity(existing.id, quantity).await?))
    }

    /// Remove a coin from the cart. Removing an absent coin is not an error.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the backend call fails.
    pub async fn remove(&self, user_id: ProfileId, coin_id: CoinId) -> Result<()> {
        self.cart.remove(user_id, coin_id).await?;
        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the backend call fails.
    pub async fn clear(&self, user_id: ProfileId) -> Result<()> {
        self.cart.clear(user_id).await?;
        Ok(())
    }

    /// Coin id to quantity, straight from the cart rows.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the backend query fails.
    pub async fn snapshot(&self, user_id: ProfileId) -> Result<CartSnapshot> {
        Ok(CartSnapshot(
            self.cart
                .list(user_id)
                .await?
                .into_iter()
                .map(|item| (item.coin_id, item.quantity))
                .collect(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use numisma_backend::InMemoryBackend;
    use numisma_backend::models::{ListingUpdate, NewCoinListing};
    use numisma_backend::repository::CachedListings;
    use numisma_core::Rarity;

    use super::*;

    async fn listing(repos: &Repositories, title: &str, value: u64, stock: u32) -> CoinId {
        repos
            .listings
            .create(&NewCoinListing {
                title: title.to_string(),
                description: None,
                mint_date: None,
                region: None,
                value: Price::new(value),
                rarity: Rarity::Common,
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

    #[tokio::test]
    async fn test_add_twice_merges() {
        let repos = InMemoryBackend::new().repositories();
        let coin = listing(&repos, "Anna", 40, 10).await;
        let service = CartService::new(&repos);
        let user = ProfileId::generate();

        service.add(user, coin, 1).await.unwrap();
        service.add(user, coin, 2).await.unwrap();

        let rows = repos.cart.list(user).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 3);

        let view = service.view(user).await.unwrap();
        assert_eq!(view.subtotal, Price::new(120));
        assert_eq!(view.count, 3);
        assert_eq!(view.snapshot(), service.snapshot(user).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let repos = InMemoryBackend::new().repositories();
        let coin = listing(&repos, "Pice", 5, 10).await;
        let service = CartService::new(&repos);
        let user = ProfileId::generate();

        assert!(matches!(
            service.update(user, coin, 2).await,
            Err(AppError::NotFound(_))
        ));

        service.add(user, coin, 1).await.unwrap();
        let item = service.update(user, coin, 5).await.unwrap().unwrap();
        assert_eq!(item.quantity, 5);

        assert!(service.update(user, coin, 0).await.unwrap().is_none());
        assert!(service.view(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_stock_and_bad_quantity() {
        let repos = InMemoryBackend::new().repositories();
        let sold_out = listing(&repos, "Gold Fanam", 900, 0).await;
        let service = CartService::new(&repos);
        let user = ProfileId::generate();

        assert!(matches!(
            service.add(user, sold_out, 1).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            service.add(user, sold_out, 0).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_sold_out_elsewhere_is_rejected() {
        let backend = InMemoryBackend::new();
        let admin = backend.repositories();
        let storefront = Repositories {
            listings: Arc::new(CachedListings::new(Arc::clone(&admin.listings))),
            ..admin.clone()
        };
        let coin = listing(&admin, "Mysore Paisa", 15, 1).await;
        // Cached as in stock.
        assert!(storefront.listings.get(coin).await.unwrap().unwrap().in_stock());

        admin
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

        assert!(matches!(
            CartService::new(&storefront)
                .add(ProfileId::generate(), coin, 1)
                .await,
            Err(AppError::Conflict(_))
        ));
    }
}

