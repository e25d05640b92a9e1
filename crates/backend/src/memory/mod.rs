//! In-process bindings of every repository, the auth API and storage.
//!
//! Used by tests and by local runs with `BACKEND_MODE=memory`. State lives behind one
//! `RwLock`; a poisoned lock surfaces as [`RepositoryError::Unavailable`].
//! No row-level policies are applied; callers filter by user id the same way
//! they do against the hosted backend.

mod auth;
mod repos;
mod storage;

use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::{
    CartItem, CoinListing, CoinReview, Enrollment, NewsletterSubscription, Order, OrderItem,
    Profile, VerificationSubmission, WishlistItem,
};
use crate::repository::{Repositories, RepositoryError};

pub use auth::InMemoryAuth;
pub use storage::InMemoryStorage;

#[derive(Default)]
struct Tables {
    profiles: Vec<Profile>,
    listings: Vec<CoinListing>,
    cart: Vec<CartItem>,
    wishlist: Vec<WishlistItem>,
    reviews: Vec<CoinReview>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    newsletter: Vec<NewsletterSubscription>,
    verifications: Vec<VerificationSubmission>,
    enrollments: Vec<Enrollment>,
}

/// Every table held in memory.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    tables: Arc<RwLock<Tables>>,
    outages: Arc<RwLock<HashSet<&'static str>>>,
    auth: InMemoryAuth,
    storage: InMemoryStorage,
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend").finish_non_exhaustive()
    }
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every repository bound to this backend.
    #[must_use]
    pub fn repositories(&self) -> Repositories {
        Repositories {
            profiles: Arc::new(self.clone()),
            listings: Arc::new(self.clone()),
            cart: Arc::new(self.clone()),
            wishlist: Arc::new(self.clone()),
            reviews: Arc::new(self.clone()),
            orders: Arc::new(self.clone()),
            newsletter: Arc::new(self.clone()),
            verifications: Arc::new(self.clone()),
            enrollments: Arc::new(self.clone()),
            auth: Arc::new(self.auth.clone()),
            storage: Arc::new(self.storage.clone()),
        }
    }

    /// The auth binding, for reading issued OTP codes in tests.
    #[must_use]
    pub const fn auth(&self) -> &InMemoryAuth {
        &self.auth
    }

    /// The storage binding, for inspecting uploads in tests.
    #[must_use]
    pub const fn storage(&self) -> &InMemoryStorage {
        &self.storage
    }

    /// Make `operation` fail with [`RepositoryError::Unavailable`] until
    /// [`restore`](Self::restore) is called.
    ///
    /// Supported: `cart.clear`, `orders.add_items`,
    /// `orders.set_payment_reference`.
    pub fn break_operation(&self, operation: &'static str) {
        if let Ok(mut outages) = self.outages.write() {
            outages.insert(operation);
        }
    }

    pub fn restore(&self, operation: &'static str) {
        if let Ok(mut outages) = self.outages.write() {
            outages.remove(operation);
        }
    }

    fn check(&self, operation: &'static str) -> Result<(), RepositoryError> {
        let outages = self
            .outages
            .read()
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;
        if outages.contains(operation) {
            return Err(RepositoryError::Unavailable(format!("{operation} is down")));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, RepositoryError> {
        self.tables
            .read()
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, RepositoryError> {
        self.tables
            .write()
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))
    }
}
