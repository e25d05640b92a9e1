//! Coin verification submissions.
//!
//! - [`pricing`] - per-coin price and the bonus slot
//! - [`wizard`] - the step state machine held while the user fills it in
//!
//! Drafts live server-side in [`DraftStore`], keyed by an id kept in the
//! user's session, and expire after an hour of inactivity.

pub mod pricing;
pub mod wizard;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::Mutex;

pub use pricing::{BASE_PRICE, BONUS_THRESHOLD, CoinCountError, MAX_COINS, MIN_COINS, Quote};
pub use wizard::{DraftId, DraftView, Side, SlotView, VerificationDraft, WizardStep};

/// Idle time before a draft is dropped.
const DRAFT_IDLE: Duration = Duration::from_secs(60 * 60);

/// Drafts held at once. Each can carry up to 14 photographs.
const MAX_DRAFTS: u64 = 500;

/// A draft shared between requests of the same session.
pub type SharedDraft = Arc<Mutex<VerificationDraft>>;

/// Server-side draft storage.
#[derive(Clone)]
pub struct DraftStore {
    cache: Cache<DraftId, SharedDraft>,
}

impl std::fmt::Debug for DraftStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftStore")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl Default for DraftStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DraftStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(MAX_DRAFTS)
                .time_to_idle(DRAFT_IDLE)
                .build(),
        }
    }

    /// Start a new draft.
    pub async fn create(&self) -> (DraftId, SharedDraft) {
        let draft = VerificationDraft::new();
        let id = draft.id;
        let shared = Arc::new(Mutex::new(draft));
        self.cache.insert(id, Arc::clone(&shared)).await;
        (id, shared)
    }

    pub async fn get(&self, id: DraftId) -> Option<SharedDraft> {
        self.cache.get(&id).await
    }

    pub async fn remove(&self, id: DraftId) {
        self.cache.invalidate(&id).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_draft_store_roundtrip() {
        let store = DraftStore::new();
        let (id, draft) = store.create().await;
        draft
            .lock()
            .await
            .set_details("Asha Rao", "9876543210", 3)
            .unwrap();

        let again = store.get(id).await.unwrap();
        assert_eq!(again.lock().await.coin_count(), 3);

        store.remove(id).await;
        assert!(store.get(id).await.is_none());
    }
}
