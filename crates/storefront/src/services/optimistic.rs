//! Optimistic updates of client-visible snapshots.
//!
//! The cart and wishlist badges read session snapshots rather than the
//! backend. A mutation is applied to the snapshot first, then the backend
//! write is awaited; if the write fails the snapshot taken before the change
//! is restored and the backend error is returned.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tower_sessions::Session;
use tracing::{error, warn};

use crate::error::Result;

/// Where a snapshot is kept between requests.
#[async_trait]
pub trait SnapshotStore<T>: Send + Sync {
    /// Current snapshot, or the default when none was stored.
    async fn load(&self) -> Result<T>;

    async fn save(&self, value: &T) -> Result<()>;
}

/// A snapshot stored under one session key.
pub struct SessionSnapshot<'a, T> {
    session: &'a Session,
    key: &'static str,
    _value: PhantomData<fn() -> T>,
}

impl<'a, T> SessionSnapshot<'a, T> {
    #[must_use]
    pub const fn new(session: &'a Session, key: &'static str) -> Self {
        Self {
            session,
            key,
            _value: PhantomData,
        }
    }
}

#[async_trait]
impl<T> SnapshotStore<T> for SessionSnapshot<'_, T>
where
    T: Serialize + DeserializeOwned + Default + Send + Sync,
{
    async fn load(&self) -> Result<T> {
        Ok(self.session.get::<T>(self.key).await?.unwrap_or_default())
    }

    async fn save(&self, value: &T) -> Result<()> {
        self.session.insert(self.key, value).await?;
        Ok(())
    }
}

/// Apply `change` to the stored snapshot, then await `confirm`.
///
/// On success the changed snapshot stays. On failure the previous snapshot
/// is written back before the error is returned.
///
/// # Errors
///
/// Returns the snapshot store's error, or `confirm`'s error after rolling
/// back.
pub async fn apply<T, R, S, F, Fut>(store: &S, change: F, confirm: Fut) -> Result<R>
where
    T: Clone + Send + Sync,
    S: SnapshotStore<T> + ?Sized,
    F: FnOnce(&mut T) + Send,
    Fut: Future<Output = Result<R>> + Send,
{
    let before = store.load().await?;
    let mut after = before.clone();
    change(&mut after);
    store.save(&after).await?;

    match confirm.await {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!(error = %e, "Backend rejected change, rolling back snapshot");
            if let Err(rollback) = store.save(&before).await {
                error!(error = %rollback, "Failed to roll back snapshot");
            }
            Err(e)
        }
    }
}
