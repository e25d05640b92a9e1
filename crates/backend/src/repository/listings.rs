use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use numisma_core::CoinId;
use tracing::{debug, instrument};

use super::{RepositoryError, convert_rows, single};
use crate::client::BackendClient;
use crate::models::listing::CoinListingRow;
use crate::models::tables::COIN_LISTINGS;
use crate::models::{
    CoinListing, ListingFilters, ListingSort, ListingUpdate, NewCoinListing, Page, PageRequest,
};
use crate::query::{Direction, TableQuery, or_ilike};

/// Access to `coin_listings`.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// Browse in-stock listings matching `filters`.
    async fn list(
        &self,
        filters: &ListingFilters,
        page: PageRequest,
    ) -> Result<Page<CoinListing>, RepositoryError>;

    async fn get(&self, id: CoinId) -> Result<Option<CoinListing>, RepositoryError>;

    /// Like [`get`](Self::get) but always read from the backend. Use this
    /// for stock arithmetic; another process may have changed the row.
    async fn get_fresh(&self, id: CoinId) -> Result<Option<CoinListing>, RepositoryError>;

    /// Listings for a set of ids, in no particular order. Missing ids are skipped.
    async fn get_many(&self, ids: &[CoinId]) -> Result<Vec<CoinListing>, RepositoryError>;

    async fn create(&self, listing: &NewCoinListing) -> Result<CoinListing, RepositoryError>;

    async fn update(
        &self,
        id: CoinId,
        update: &ListingUpdate,
    ) -> Result<CoinListing, RepositoryError>;

    /// Every listing regardless of stock, newest first (admin view).
    async fn list_all(&self, page: PageRequest) -> Result<Page<CoinListing>, RepositoryError>;

    /// Number of listings, optionally only verified ones.
    async fn count(&self, verified: Option<bool>) -> Result<u64, RepositoryError>;
}

/// REST binding. Every call goes to the backend; wrap it in
/// [`CachedListings`] for cached detail lookups.
pub struct RestListingRepository {
    client: BackendClient,
}

impl RestListingRepository {
    #[must_use]
    pub const fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

fn apply_filters(mut query: TableQuery, filters: &ListingFilters) -> TableQuery {
    query = query.gt("stock_quantity", 0);
    if let Some(search) = filters.search_term() {
        query = query.or(&or_ilike(&["title", "description", "region"], search));
    }
    if let Some(region) = filters.region_term() {
        query = query.ilike_exact("region", region);
    }
    if let Some(rarity) = filters.rarity {
        query = query.eq("rarity", rarity.label());
    }
    if let Some(min) = filters.min_value {
        query = query.gte("value", min.amount());
    }
    if let Some(max) = filters.max_value {
        query = query.lte("value", max.amount());
    }
    if let Some(verified) = filters.verified {
        query = query.eq("verified", verified);
    }
    if let Some(seller) = filters.seller_id {
        query = query.eq("seller_id", seller);
    }
    match filters.sort {
        ListingSort::Newest => query.order("created_at", Direction::Descending),
        ListingSort::PriceLowHigh => query.order("value", Direction::Ascending),
        ListingSort::PriceHighLow => query.order("value", Direction::Descending),
        ListingSort::Title => query.order("title", Direction::Ascending),
    }
}

#[async_trait]
impl ListingRepository for RestListingRepository {
    #[instrument(skip(self))]
    async fn list(
        &self,
        filters: &ListingFilters,
        page: PageRequest,
    ) -> Result<Page<CoinListing>, RepositoryError> {
        let (from, to) = page.range();
        let query = apply_filters(self.client.from(COIN_LISTINGS).select("*"), filters);
        let (rows, count): (Vec<CoinListingRow>, u64) =
            query.range(from, to).fetch_page().await?;
        Ok(Page::new(convert_rows(rows)?, count, page))
    }

    #[instrument(skip(self))]
    async fn get(&self, id: CoinId) -> Result<Option<CoinListing>, RepositoryError> {
        let row: Option<CoinListingRow> = self
            .client
            .from(COIN_LISTINGS)
            .eq("id", id)
            .fetch_optional()
            .await?;
        row.map(CoinListing::try_from)
            .transpose()
            .map_err(RepositoryError::DataCorruption)
    }

    async fn get_fresh(&self, id: CoinId) -> Result<Option<CoinListing>, RepositoryError> {
        self.get(id).await
    }

    #[instrument(skip(self), fields(count = ids.len()))]
    async fn get_many(&self, ids: &[CoinId]) -> Result<Vec<CoinListing>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<CoinListingRow> = self
            .client
            .from(COIN_LISTINGS)
            .in_list("id", ids)
            .fetch()
            .await?;
        convert_rows(rows)
    }

    #[instrument(skip(self, listing), fields(title = %listing.title))]
    async fn create(&self, listing: &NewCoinListing) -> Result<CoinListing, RepositoryError> {
        let rows: Vec<CoinListingRow> = self.client.from(COIN_LISTINGS).insert(listing).await?;
        single(rows)
    }

    #[instrument(skip(self, update))]
    async fn update(
        &self,
        id: CoinId,
        update: &ListingUpdate,
    ) -> Result<CoinListing, RepositoryError> {
        let rows: Vec<CoinListingRow> = self
            .client
            .from(COIN_LISTINGS)
            .eq("id", id)
            .update(update)
            .await?;
        single(rows)
    }

    #[instrument(skip(self))]
    async fn list_all(&self, page: PageRequest) -> Result<Page<CoinListing>, RepositoryError> {
        let (from, to) = page.range();
        let (rows, count): (Vec<CoinListingRow>, u64) = self
            .client
            .from(COIN_LISTINGS)
            .select("*")
            .order("created_at", Direction::Descending)
            .range(from, to)
            .fetch_page()
            .await?;
        Ok(Page::new(convert_rows(rows)?, count, page))
    }

    #[instrument(skip(self))]
    async fn count(&self, verified: Option<bool>) -> Result<u64, RepositoryError> {
        let mut query = self.client.from(COIN_LISTINGS);
        if let Some(verified) = verified {
            query = query.eq("verified", verified);
        }
        Ok(query.count().await?)
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Caches single-listing lookups for 5 minutes in front of another binding.
///
/// The cache is per process. Writes made through this handle invalidate
/// it; writes from anywhere else do not, so [`ListingRepository::get`] may
/// be stale and [`ListingRepository::get_fresh`] bypasses it.
pub struct CachedListings {
    inner: Arc<dyn ListingRepository>,
    cache: Cache<CoinId, CoinListing>,
}

impl CachedListings {
    #[must_use]
    pub fn new(inner: Arc<dyn ListingRepository>) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();
        Self { inner, cache }
    }
}

#[async_trait]
impl ListingRepository for CachedListings {
    async fn list(
        &self,
        filters: &ListingFilters,
        page: PageRequest,
    ) -> Result<Page<CoinListing>, RepositoryError> {
        self.inner.list(filters, page).await
    }

    #[instrument(skip(self))]
    async fn get(&self, id: CoinId) -> Result<Option<CoinListing>, RepositoryError> {
        if let Some(listing) = self.cache.get(&id).await {
            debug!("Cache hit for listing");
            return Ok(Some(listing));
        }
        self.get_fresh(id).await
    }

    async fn get_fresh(&self, id: CoinId) -> Result<Option<CoinListing>, RepositoryError> {
        let listing = self.inner.get_fresh(id).await?;
        match &listing {
            Some(listing) => self.cache.insert(id, listing.clone()).await,
            None => self.cache.invalidate(&id).await,
        }
        Ok(listing)
    }

    async fn get_many(&self, ids: &[CoinId]) -> Result<Vec<CoinListing>, RepositoryError> {
        self.inner.get_many(ids).await
    }

    async fn create(&self, listing: &NewCoinListing) -> Result<CoinListing, RepositoryError> {
        self.inner.create(listing).await
    }

    async fn update(
        &self,
        id: CoinId,
        update: &ListingUpdate,
    ) -> Result<CoinListing, RepositoryError> {
        let result = self.inner.update(id, update).await;
        self.cache.invalidate(&id).await;
        result
    }

    async fn list_all(&self, page: PageRequest) -> Result<Page<CoinListing>, RepositoryError> {
        self.inner.list_all(page).await
    }

    async fn count(&self, verified: Option<bool>) -> Result<u64, RepositoryError> {
        self.inner.count(verified).await
    }
}
