//! Repository traits, one per backend table, and their REST bindings.
//!
//! Services depend on the traits through [`Repositories`], so the REST
//! binding can be swapped for [`crate::memory::InMemoryBackend`] in tests and
//! local runs.

mod cart;
mod enrollments;
mod listings;
mod newsletter;
mod orders;
mod profiles;
mod reviews;
mod verifications;
mod wishlist;

use std::sync::Arc;

use thiserror::Error;

use crate::auth::{AuthClient, AuthProvider};
use crate::client::BackendClient;
use crate::error::BackendError;
use crate::storage::{ObjectStorage, StorageClient};

pub use cart::{CartRepository, RestCartRepository};
pub use enrollments::{EnrollmentRepository, RestEnrollmentRepository};
pub use listings::{CachedListings, ListingRepository, RestListingRepository};
pub use newsletter::{NewsletterRepository, RestNewsletterRepository};
pub use orders::{OrderRepository, RestOrderRepository};
pub use profiles::{ProfileRepository, RestProfileRepository};
pub use reviews::{RestReviewRepository, ReviewRepository};
pub use verifications::{RestVerificationRepository, VerificationRepository};
pub use wishlist::{RestWishlistRepository, WishlistRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Backend request failed.
    #[error("backend error: {0}")]
    Backend(#[source] BackendError),

    /// Row not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored row failed validation.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// In-process store unusable (poisoned lock).
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl From<BackendError> for RepositoryError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(_) => Self::NotFound,
            BackendError::Conflict(message) => Self::Conflict(message),
            BackendError::Parse(e) => Self::DataCorruption(e.to_string()),
            other => Self::Backend(other),
        }
    }
}

/// Validate raw rows into models, reporting the first bad row.
pub(crate) fn convert_rows<R, T>(rows: Vec<R>) -> Result<Vec<T>, RepositoryError>
where
    T: TryFrom<R, Error = String>,
{
    rows.into_iter()
        .map(|row| T::try_from(row).map_err(RepositoryError::DataCorruption))
        .collect()
}

/// First row of a `return=representation` response, or `NotFound`.
pub(crate) fn single<R, T>(rows: Vec<R>) -> Result<T, RepositoryError>
where
    T: TryFrom<R, Error = String>,
{
    convert_rows(rows)?
        .into_iter()
        .next()
        .ok_or(RepositoryError::NotFound)
}

// =============================================================================
// Repositories
// =============================================================================

/// Every repository plus the auth and storage collaborators.
///
/// Cheap to clone; each handle is an `Arc<dyn ...>`.
#[derive(Clone)]
pub struct Repositories {
    pub profiles: Arc<dyn ProfileRepository>,
    pub listings: Arc<dyn ListingRepository>,
    pub cart: Arc<dyn CartRepository>,
    pub wishlist: Arc<dyn WishlistRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub newsletter: Arc<dyn NewsletterRepository>,
    pub verifications: Arc<dyn VerificationRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub auth: Arc<dyn AuthProvider>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}

impl Repositories {
    /// Bind every repository to the hosted backend.
    #[must_use]
    pub fn rest(client: &BackendClient) -> Self {
        Self {
            profiles: Arc::new(RestProfileRepository::new(client.clone())),
            listings: Arc::new(CachedListings::new(Arc::new(RestListingRepository::new(
                client.clone(),
            )))),
            cart: Arc::new(RestCartRepository::new(client.clone())),
            wishlist: Arc::new(RestWishlistRepository::new(client.clone())),
            reviews: Arc::new(RestReviewRepository::new(client.clone())),
            orders: Arc::new(RestOrderRepository::new(client.clone())),
            newsletter: Arc::new(RestNewsletterRepository::new(client.clone())),
            verifications: Arc::new(RestVerificationRepository::new(client.clone())),
            enrollments: Arc::new(RestEnrollmentRepository::new(client.clone())),
            auth: Arc::new(AuthClient::new(client.clone())),
            storage: Arc::new(StorageClient::new(client.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_mapping() {
        assert!(matches!(
            RepositoryError::from(BackendError::NotFound("x".into())),
            RepositoryError::NotFound
        ));
        assert!(matches!(
            RepositoryError::from(BackendError::Conflict("dup".into())),
            RepositoryError::Conflict(m) if m == "dup"
        ));
        assert!(matches!(
            RepositoryError::from(BackendError::RateLimited(1)),
            RepositoryError::Backend(_)
        ));
    }
}
