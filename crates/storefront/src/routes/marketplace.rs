//! Marketplace route handlers: browsing, listing detail, new listings and
//! reviews.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use numisma_backend::models::{CoinListing, CoinReview, ListingFilters, ListingSort, Page, PageRequest};
use numisma_core::{CoinId, Price, Rarity};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{FieldErrors, Result};
use crate::middleware::RequireAuth;
use crate::routes::upload::Upload;
use crate::services::marketplace::{ListingDetail, ListingForm, MarketplaceService};
use crate::services::reviews::{ReviewForm, ReviewService};
use crate::state::AppState;

/// Browse query string.
#[derive(Debug, Default, Deserialize)]
pub struct BrowseQuery {
    pub search: Option<String>,
    pub region: Option<String>,
    pub rarity: Option<Rarity>,
    pub min_value: Option<u64>,
    pub max_value: Option<u64>,
    pub verified: Option<bool>,
    pub sort: Option<ListingSort>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl BrowseQuery {
    fn into_parts(self) -> (ListingFilters, PageRequest) {
        let page = PageRequest::new(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(PageRequest::DEFAULT_LIMIT),
        );
        let filters = ListingFilters {
            search: self.search,
            region: self.region,
            rarity: self.rarity,
            min_value: self.min_value.map(Price::new),
            max_value: self.max_value.map(Price::new),
            verified: self.verified,
            seller_id: None,
            sort: self.sort.unwrap_or_default(),
        };
        (filters, page)
    }
}

/// `GET /api/coins`
pub async fn browse(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<Page<CoinListing>>> {
    let (filters, page) = query.into_parts();
    let listings = MarketplaceService::new(state.repos())
        .browse(&filters, page)
        .await?;
    Ok(Json(listings))
}

/// `GET /api/coins/{id}`
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<CoinId>,
) -> Result<Json<ListingDetail>> {
    let detail = MarketplaceService::new(state.repos()).detail(id).await?;
    Ok(Json(detail))
}

/// Listing fields from the text parts of a multipart form.
fn listing_form(upload: &Upload) -> Result<ListingForm> {
    let mut errors = FieldErrors::new();
    let form = ListingForm {
        title: upload.string("title").unwrap_or_default(),
        description: upload.string("description"),
        mint_date: upload.string("mint_date"),
        region: upload.string("region"),
        value: upload.parse("value", &mut errors),
        rarity: upload.parse("rarity", &mut errors),
        metal: upload.string("metal"),
        dynasty: upload.string("dynasty"),
        ruler: upload.string("ruler"),
        condition: upload.string("condition"),
        stock_quantity: upload.parse("stock_quantity", &mut errors),
    };
    errors.into_result()?;
    Ok(form)
}

/// `POST /api/coins` (multipart: listing fields plus `images` files)
#[instrument(skip(state, user, multipart), fields(seller_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CoinListing>)> {
    let upload = Upload::read(multipart).await?;
    let form = listing_form(&upload)?;
    let listing = MarketplaceService::new(state.repos())
        .create_listing(user.id, form, upload.into_images())
        .await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

/// `GET /api/coins/{id}/reviews`
pub async fn reviews(
    State(state): State<AppState>,
    Path(id): Path<CoinId>,
) -> Result<Json<Vec<CoinReview>>> {
    Ok(Json(ReviewService::new(state.repos()).list(id).await?))
}

/// `POST /api/coins/{id}/reviews`
pub async fn add_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<CoinId>,
    Json(form): Json<ReviewForm>,
) -> Result<(StatusCode, Json<CoinReview>)> {
    let review = ReviewService::new(state.repos())
        .submit(user.id, id, form)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browse_defaults() {
        let (filters, page) = BrowseQuery::default().into_parts();
        assert_eq!(filters, ListingFilters::default());
        assert_eq!(page, PageRequest::new(1, PageRequest::DEFAULT_LIMIT));
    }

    #[test]
    fn test_browse_price_range() {
        let query = BrowseQuery {
            min_value: Some(500),
            max_value: Some(2000),
            page: Some(0),
            limit: Some(500),
            ..BrowseQuery::default()
        };
        let (filters, page) = query.into_parts();
        assert_eq!(filters.min_value, Some(Price::new(500)));
        assert_eq!(filters.max_value, Some(Price::new(2000)));
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, PageRequest::MAX_LIMIT);
    }
}
