//! Search catalog builder.
//!
//! Adds featured coin titles from live listings to the static catalog.

use std::sync::Arc;

use numisma_backend::RepositoryError;
use numisma_backend::models::{ListingFilters, PageRequest};
use numisma_backend::repository::ListingRepository;
use tracing::{error, info, instrument};

use crate::content::CourseCatalog;

use super::{SearchCatalog, SearchIndex};

/// Newest listings included as coin entries.
const FEATURED_COINS: u32 = 24;

/// Spawn a background task that rebuilds the catalog with featured coins.
///
/// Until it completes, the index keeps serving the catalog it was created
/// with.
pub fn build_catalog_async(
    index: SearchIndex,
    listings: Arc<dyn ListingRepository>,
    courses: CourseCatalog,
) {
    info!("Spawning background search catalog build task");
    tokio::spawn(async move {
        match build_catalog(listings.as_ref(), &courses).await {
            Ok(catalog) => {
                let entries = catalog.len();
                index.replace(catalog);
                info!(entries, "Search catalog is now ready");
            }
            Err(e) => {
                error!(error = %e, "Failed to build search catalog");
            }
        }
    });
}

/// Build the catalog from the newest in-stock listings.
///
/// # Errors
///
/// Returns the repository error if listings cannot be fetched.
#[instrument(skip_all)]
pub async fn build_catalog(
    listings: &dyn ListingRepository,
    courses: &CourseCatalog,
) -> Result<SearchCatalog, RepositoryError> {
    let page = listings
        .list(
            &ListingFilters::default(),
            PageRequest::new(1, FEATURED_COINS),
        )
        .await?;

    let coins: Vec<(String, String)> = page
        .data
        .into_iter()
        .map(|listing| (listing.title, format!("/marketplace/{}", listing.id)))
        .collect();
    info!(coins = coins.len(), "Fetched featured coins");

    Ok(SearchCatalog::build(courses, &coins))
}
