//! Application state shared across handlers.

use std::sync::Arc;

use numisma_backend::{BackendClient, BackendError, InMemoryBackend, Repositories};

use crate::config::{BackendMode, StorefrontConfig};
use crate::content::{ContentError, CourseCatalog};
use crate::search::{SearchCatalog, SearchIndex, build_catalog_async};
use crate::services::notification::{InAppInbox, NotificationDispatcher};
use crate::services::payment::{PaymentProvider, QrPaymentProvider};
use crate::verification::DraftStore;

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("backend client: {0}")]
    Backend(#[from] BackendError),
    #[error("content: {0}")]
    Content(#[from] ContentError),
    #[error("backend_mode is rest but no backend configuration was loaded")]
    MissingBackendConfig,
}

/// Application state shared across all handlers.
///
/// Cheap to clone; everything sits behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    repos: Repositories,
    backend: Option<BackendClient>,
    courses: CourseCatalog,
    search: SearchIndex,
    drafts: DraftStore,
    payments: Arc<dyn PaymentProvider>,
    notifier: NotificationDispatcher,
    inbox: InAppInbox,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("base_url", &self.inner.config.base_url)
            .field("courses", &self.inner.courses.len())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build state from already-constructed parts.
    ///
    /// Payments use the QR provider from `config.payment`; notifications are
    /// logged, with in-app messages kept in memory.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        repos: Repositories,
        courses: CourseCatalog,
        backend: Option<BackendClient>,
    ) -> Self {
        let inbox = InAppInbox::new();
        let payments: Arc<dyn PaymentProvider> =
            Arc::new(QrPaymentProvider::new(config.payment.clone()));
        let search = SearchIndex::new(SearchCatalog::build(&courses, &[]));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                repos,
                backend,
                courses,
                search,
                drafts: DraftStore::new(),
                payments,
                notifier: NotificationDispatcher::logging(inbox.clone()),
                inbox,
            }),
        }
    }

    /// Build state for `config.backend_mode`, loading courses from
    /// `config.content_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend client cannot be built or the content
    /// directory cannot be read.
    pub fn from_config(config: StorefrontConfig) -> Result<Self, StateError> {
        let courses = CourseCatalog::load(&config.content_dir)?;
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
        Ok(Self::new(config, repos, courses, backend))
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn repos(&self) -> &Repositories {
        &self.inner.repos
    }

    /// Hosted backend client; `None` in memory mode.
    #[must_use]
    pub fn backend(&self) -> Option<&BackendClient> {
        self.inner.backend.as_ref()
    }

    #[must_use]
    pub fn courses(&self) -> &CourseCatalog {
        &self.inner.courses
    }

    #[must_use]
    pub fn search(&self) -> &SearchIndex {
        &self.inner.search
    }

    #[must_use]
    pub fn drafts(&self) -> &DraftStore {
        &self.inner.drafts
    }

    #[must_use]
    pub fn payments(&self) -> &dyn PaymentProvider {
        self.inner.payments.as_ref()
    }

    #[must_use]
    pub fn notifier(&self) -> &NotificationDispatcher {
        &self.inner.notifier
    }

    #[must_use]
    pub fn inbox(&self) -> &InAppInbox {
        &self.inner.inbox
    }

    /// Rebuild the search catalog with live listings in the background.
    pub fn start_search_indexing(&self) {
        build_catalog_async(
            self.inner.search.clone(),
            self.inner.repos.listings.clone(),
            self.inner.courses.clone(),
        );
    }
}
