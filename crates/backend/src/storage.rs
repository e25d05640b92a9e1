//! File storage for avatars, listing photos and verification photographs.

use async_trait::async_trait;
use numisma_core::ImageFile;
use reqwest::Method;
use tracing::{info, instrument};

use crate::client::BackendClient;
use crate::error::BackendError;

/// Object storage collaborator.
///
/// Objects are addressed by a `/`-separated path inside the configured
/// bucket and are publicly readable once uploaded.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload (or overwrite) an image and return its public URL.
    async fn upload(&self, path: &str, image: &ImageFile) -> Result<String, BackendError>;

    /// Remove an object. Missing objects are not an error.
    async fn remove(&self, path: &str) -> Result<(), BackendError>;

    /// Public URL of an object, whether or not it exists.
    fn public_url(&self, path: &str) -> String;
}

/// Object path for an upload: `{folder}/{owner}/{name}.{ext}`.
#[must_use]
pub fn object_path(folder: &str, owner: impl std::fmt::Display, name: &str, image: &ImageFile) -> String {
    format!("{folder}/{owner}/{name}.{}", image.extension())
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

// =============================================================================
// StorageClient
// =============================================================================

/// [`ObjectStorage`] bound to the hosted `/storage/v1` API.
#[derive(Debug, Clone)]
pub struct StorageClient {
    client: BackendClient,
}

impl StorageClient {
    #[must_use]
    pub const fn new(client: BackendClient) -> Self {
        Self { client }
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "object/{}/{}",
            urlencoding::encode(self.client.storage_bucket()),
            encode_path(path)
        )
    }
}

#[async_trait]
impl ObjectStorage for StorageClient {
    #[instrument(skip(self, image), fields(size = image.len(), content_type = image.content_type()))]
    async fn upload(&self, path: &str, image: &ImageFile) -> Result<String, BackendError> {
        let url = self.client.storage_url(&self.object_url(path))?;
        let request = self
            .client
            .request(Method::POST, url)
            .header("Content-Type", image.content_type())
            .header("x-upsert", "true")
            .body(image.bytes().to_vec());
        self.client.send(request).await?;

        info!(path = %path, "Image uploaded");
        Ok(self.public_url(path))
    }

    #[instrument(skip(self))]
    async fn remove(&self, path: &str) -> Result<(), BackendError> {
        let url = self.client.storage_url(&self.object_url(path))?;
        match self.client.send(self.client.request(Method::DELETE, url)).await {
            Ok(_) | Err(BackendError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn public_url(&self, path: &str) -> String {
        let relative = format!(
            "storage/v1/object/public/{}/{}",
            urlencoding::encode(self.client.storage_bucket()),
            encode_path(path)
        );
        self.client.base_url().join(&relative).map_or_else(
            |_| format!("{}{relative}", self.client.base_url()),
            |url| url.to_string(),
        )
    }
}
