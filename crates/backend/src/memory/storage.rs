use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use numisma_core::ImageFile;
use tracing::debug;

use crate::error::BackendError;
use crate::storage::ObjectStorage;

const BUCKET: &str = "images";

/// [`ObjectStorage`] that keeps uploads in memory.
///
/// Public URLs have the form `memory://images/{path}`.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    objects: Arc<RwLock<HashMap<String, ImageFile>>>,
}

impl InMemoryStorage {
    /// Whether an object exists at `path`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.objects
            .read()
            .is_ok_and(|objects| objects.contains_key(path))
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().map_or(0, |objects| objects.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> BackendError {
        BackendError::Api {
            status: 500,
            message: format!("storage unavailable: {e}"),
        }
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn upload(&self, path: &str, image: &ImageFile) -> Result<String, BackendError> {
        self.objects
            .write()
            .map_err(Self::poisoned)?
            .insert(path.to_string(), image.clone());
        debug!(path = %path, size = image.len(), "Stored image in memory");
        Ok(self.public_url(path))
    }

    async fn remove(&self, path: &str) -> Result<(), BackendError> {
        self.objects.write().map_err(Self::poisoned)?.remove(path);
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://{BUCKET}/{path}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_and_remove() {
        let storage = InMemoryStorage::default();
        let image = ImageFile::new("a.png", "image/png", vec![1, 2]).unwrap();
        let url = storage.upload("avatars/u/a.png", &image).await.unwrap();
        assert_eq!(url, "memory://images/avatars/u/a.png");
        assert!(storage.contains("avatars/u/a.png"));
        storage.remove("avatars/u/a.png").await.unwrap();
        assert!(storage.is_empty());
    }
}
