//! Application state shared across handlers.

use std::sync::Arc;

use numisma_backend::{BackendClient, BackendError, InMemoryBackend, Repositories};

use crate::config::{AdminConfig, BackendMode};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("backend client: {0}")]
    Backend(#[from] BackendError),
    #[error("backend_mode is rest but no backend configuration was loaded")]
    MissingBackendConfig,
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    repos: Repositories,
    backend: Option<BackendClient>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("base_url", &self.inner.config.base_url)
            .finish_non_exhaustive()
    }
}

impl AppState {
    #[must_use]
    pub fn new(config: AdminConfig, repos: Repositories, backend: Option<BackendClient>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                repos,
                backend,
            }),
        }
    }

    /// Build state for `config.backend_mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend client cannot be built.
    pub fn from_config(config: AdminConfig) -> Result<Self, StateError> {
        let (repos, backend) = match config.backend_mode {
            BackendMode::Rest => {
                let backend_config = config
                    .backend
                    .as_ref()
                    .ok_or(StateError::MissingBackendConfig)?;
                let client = BackendClient::new(backend_config)?;
                (Repositories::rest(&client), Some(client))
            }
            BackendMode::Memory => {
                tracing::warn!("Using in-memory backend; nothing will persist");
                (InMemoryBackend::new().repositories(), None)
            }
        };
        Ok(Self::new(config, repos, backend))
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Repositories bound with the service key.
    #[must_use]
    pub fn repos(&self) -> &Repositories {
        &self.inner.repos
    }

    /// Hosted backend client; `None` in memory mode.
    #[must_use]
    pub fn backend(&self) -> Option<&BackendClient> {
        self.inner.backend.as_ref()
    }
}
