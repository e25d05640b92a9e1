//! Coin marketplace: browsing, listing detail and seller listings.

use numisma_backend::models::{
    CoinListing, CoinReview, ListingFilters, NewCoinListing, Page, PageRequest,
};
use numisma_backend::repository::{ListingRepository, ReviewRepository};
use numisma_backend::storage::{ObjectStorage, object_path};
use numisma_backend::Repositories;
use numisma_core::types::rating::average;
use numisma_core::{CoinId, ImageFile, Price, ProfileId, Rarity};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{AppError, FieldErrors, Result};

/// Related listings shown on a detail page.
const RELATED_LIMIT: u32 = 4;

/// Photos accepted per listing.
pub const MAX_LISTING_IMAGES: usize = 8;

const TITLE_MAX: usize = 200;

/// A listing with its reviews and a few related coins.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDetail {
    pub listing: CoinListing,
    pub reviews: Vec<CoinReview>,
    pub average_rating: Option<f64>,
    pub related: Vec<CoinListing>,
}

/// Seller-entered listing fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingForm {
    pub title: String,
    pub description: Option<String>,
    pub mint_date: Option<String>,
    pub region: Option<String>,
    pub value: Option<u64>,
    pub rarity: Option<Rarity>,
    pub metal: Option<String>,
    pub dynasty: Option<String>,
    pub ruler: Option<String>,
    pub condition: Option<String>,
    pub stock_quantity: Option<u32>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ListingForm {
    /// Check the form and build the listing row (without photos).
    ///
    /// # Errors
    ///
    /// Returns field errors for a missing title, value or rarity and a zero
    /// stock quantity.
    pub fn validate(self, seller_id: ProfileId) -> std::result::Result<NewCoinListing, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = self.title.trim().to_string();
        if title.is_empty() {
            errors.add("title", "Title is required");
        } else if title.chars().count() > TITLE_MAX {
            errors.add("title", format!("Title must be at most {TITLE_MAX} characters"));
        }
        match self.value {
            None | Some(0) => errors.add("value", "Value must be greater than zero"),
            Some(_) => {}
        }
        if self.rarity.is_none() {
            errors.add("rarity", "Rarity is required");
        }
        let stock_quantity = self.stock_quantity.unwrap_or(1);
        if stock_quantity == 0 {
            errors.add("stock_quantity", "Stock must be at least 1");
        }

        errors.into_result_fields()?;

        Ok(NewCoinListing {
            title,
            description: non_blank(self.description),
            mint_date: non_blank(self.mint_date),
            region: non_blank(self.region),
            value: Price::new(self.value.unwrap_or_default()),
            rarity: self.rarity.unwrap_or(Rarity::Common),
            metal: non_blank(self.metal),
            dynasty: non_blank(self.dynasty),
            ruler: non_blank(self.ruler),
            condition: non_blank(self.condition),
            images: Vec::new(),
            stock_quantity,
            seller_id: Some(seller_id),
        })
    }
}

/// Marketplace service.
pub struct MarketplaceService<'a> {
    listings: &'a dyn ListingRepository,
    reviews: &'a dyn ReviewRepository,
    storage: &'a dyn ObjectStorage,
}

impl<'a> MarketplaceService<'a> {
    #[must_use]
    pub fn new(repos: &'a Repositories) -> Self {
        Self {
            listings: repos.listings.as_ref(),
            reviews: repos.reviews.as_ref(),
            storage: repos.storage.as_ref(),
        }
    }

    /// Browse in-stock listings.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the backend query fails.
    pub async fn browse(
        &self,
        filters: &ListingFilters,
        page: PageRequest,
    ) -> Result<Page<CoinListing>> {
        Ok(self.listings.list(filters, page).await?)
    }

    /// A listing with reviews, average rating and related coins.
    ///
    /// Out-of-stock listings can still be viewed by direct link.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id.
    #[instrument(skip(self))]
    pub async fn detail(&self, id: CoinId) -> Result<ListingDetail> {
        let listing = self
            .listings
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("coin {id}")))?;

        let reviews = self.reviews.list_for_coin(id).await?;
        let average_rating = average(reviews.iter().map(|r| r.rating));
        let related = self.related(&listing).await;

        Ok(ListingDetail {
            listing,
            reviews,
            average_rating,
            related,
        })
    }

    /// In-stock listings from the same region, excluding `listing`.
    ///
    /// Failures are logged and yield no related listings.
    async fn related(&self, listing: &CoinListing) -> Vec<CoinListing> {
        let Some(region) = listing.region.clone() else {
            return Vec::new();
        };
        let filters = ListingFilters {
            region: Some(region),
            ..ListingFilters::default()
        };
        match self
            .listings
            .list(&filters, PageRequest::new(1, RELATED_LIMIT + 1))
            .await
        {
            Ok(page) => page
                .data
                .into_iter()
                .filter(|other| other.id != listing.id)
                .take(RELATED_LIMIT as usize)
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to load related listings");
                Vec::new()
            }
        }
    }

    /// Create a listing for `seller_id`, uploading its photos first.
    ///
    /// Photos already uploaded are removed again if the listing cannot be
    /// stored.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for bad fields or too many photos, and
    /// the storage or repository error otherwise.
    #[instrument(skip(self, form, images), fields(images = images.len()))]
    pub async fn create_listing(
        &self,
        seller_id: ProfileId,
        form: ListingForm,
        images: Vec<ImageFile>,
    ) -> Result<CoinListing> {
        let mut errors = FieldErrors::new();
        if images.len() > MAX_LISTING_IMAGES {
            errors.add(
                "images",
                format!("At most {MAX_LISTING_IMAGES} photos per listing"),
            );
        }
        let mut listing = match form.validate(seller_id) {
            Ok(listing) => {
                errors.into_result()?;
                listing
            }
            Err(form_errors) => {
                for (field, message) in form_errors.iter() {
                    errors.add(field, message);
                }
                return Err(errors.into());
            }
        };

        let batch = Uuid::new_v4();
        let mut uploaded = Vec::with_capacity(images.len());
        for (index, image) in images.iter().enumerate() {
            let path = object_path("listings", seller_id, &format!("{batch}-{index}"), image);
            match self.storage.upload(&path, image).await {
                Ok(url) => {
                    uploaded.push(path);
                    listing.images.push(url);
                }
                Err(e) => {
                    self.discard(&uploaded).await;
                    return Err(e.into());
                }
            }
        }

        match self.listings.create(&listing).await {
            Ok(created) => {
                info!(coin_id = %created.id, seller_id = %seller_id, "Listing created");
                Ok(created)
            }
            Err(e) => {
                self.discard(&uploaded).await;
                Err(e.into())
            }
        }
    }

    async fn discard(&self, paths: &[String]) {
        for path in paths {
            if let Err(e) = self.storage.remove(path).await {
                warn!(path = %path, error = %e, "Failed to remove orphaned upload");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use numisma_backend::InMemoryBackend;
    use numisma_backend::models::NewReview;
    use numisma_core::Rating;

    use super::*;

    fn form(title: &str, region: &str, value: u64) -> ListingForm {
        ListingForm {
            title: title.to_string(),
            region: Some(region.to_string()),
            value: Some(value),
            rarity: Some(Rarity::Rare),
            stock_quantity: Some(2),
            ..ListingForm::default()
        }
    }

    fn image() -> ImageFile {
        ImageFile::new("front.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF]).unwrap()
    }

    #[test]
    fn test_form_validation() {
        let errors = ListingForm::default()
            .validate(ProfileId::generate())
            .unwrap_err();
        assert!(errors.contains("title"));
        assert!(errors.contains("value"));
        assert!(errors.contains("rarity"));

        let listing = ListingForm {
            description: Some("   ".to_string()),
            ..form(" Mohur ", "India", 500)
        }
        .validate(ProfileId::generate())
        .unwrap();
        assert_eq!(listing.title, "Mohur");
        assert_eq!(listing.description, None);
    }

    #[tokio::test]
    async fn test_create_and_detail() {
        let backend = InMemoryBackend::new();
        let repos = backend.repositories();
        let service = MarketplaceService::new(&repos);
        let seller = ProfileId::generate();

        let coin = service
            .create_listing(seller, form("Akbar Mohur", "India", 9000), vec![image()])
            .await
            .unwrap();
        assert_eq!(coin.images.len(), 1);
        assert_eq!(backend.storage().len(), 1);

        let sibling = service
            .create_listing(seller, form("Jahangir Rupee", "India", 1200), vec![])
            .await
            .unwrap();
        service
            .create_listing(seller, form("Victoria Penny", "Britain", 300), vec![])
            .await
            .unwrap();

        for stars in [4, 5] {
            repos
                .reviews
                .create(&NewReview {
                    coin_id: coin.id,
                    user_id: ProfileId::generate(),
                    rating: Rating::new(stars).unwrap(),
                    comment: None,
                })
                .await
                .unwrap();
        }

        let detail = service.detail(coin.id).await.unwrap();
        assert_eq!(detail.reviews.len(), 2);
        assert_eq!(detail.average_rating, Some(4.5));
        let related: Vec<CoinId> = detail.related.iter().map(|l| l.id).collect();
        assert_eq!(related, vec![sibling.id]);
    }

    #[tokio::test]
    async fn test_too_many_images() {
        let backend = InMemoryBackend::new();
        let repos = backend.repositories();
        let service = MarketplaceService::new(&repos);

        let images = vec![image(); MAX_LISTING_IMAGES + 1];
        let err = service
            .create_listing(ProfileId::generate(), form("Anna", "India", 10), images)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref f) if f.contains("images")));
        assert!(backend.storage().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_listing() {
        let repos = InMemoryBackend::new().repositories();
        let service = MarketplaceService::new(&repos);
        assert!(matches!(
            service.detail(CoinId::generate()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
