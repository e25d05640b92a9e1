use async_trait::async_trait;
use numisma_core::{Email, ProfileId, Role};
use tracing::instrument;

use super::{RepositoryError, convert_rows, single};
use crate::client::BackendClient;
use crate::models::profile::ProfileRow;
use crate::models::tables::PROFILES;
use crate::models::{NewProfile, Page, PageRequest, Profile, ProfileUpdate};
use crate::query::{Direction, or_ilike};

/// Access to `profiles`.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get(&self, id: ProfileId) -> Result<Option<Profile>, RepositoryError>;

    async fn get_by_email(&self, email: &Email) -> Result<Option<Profile>, RepositoryError>;

    /// Insert a profile; `Conflict` if the id exists.
    async fn create(&self, profile: &NewProfile) -> Result<Profile, RepositoryError>;

    /// Apply a partial update; `NotFound` if the id does not exist.
    async fn update(&self, id: ProfileId, update: &ProfileUpdate)
    -> Result<Profile, RepositoryError>;

    /// Newest first, optionally filtered by name/email substring.
    async fn list(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Profile>, RepositoryError>;

    async fn count(&self, role: Option<Role>) -> Result<u64, RepositoryError>;
}

pub struct RestProfileRepository {
    client: BackendClient,
}

impl RestProfileRepository {
    #[must_use]
    pub const fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProfileRepository for RestProfileRepository {
    #[instrument(skip(self))]
    async fn get(&self, id: ProfileId) -> Result<Option<Profile>, RepositoryError> {
        let row: Option<ProfileRow> = self
            .client
            .from(PROFILES)
            .eq("id", id)
            .fetch_optional()
            .await?;
        row.map(Profile::try_from)
            .transpose()
            .map_err(RepositoryError::DataCorruption)
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn get_by_email(&self, email: &Email) -> Result<Option<Profile>, RepositoryError> {
        let row: Option<ProfileRow> = self
            .client
            .from(PROFILES)
            .eq("email", email)
            .fetch_optional()
            .await?;
        row.map(Profile::try_from)
            .transpose()
            .map_err(RepositoryError::DataCorruption)
    }

    #[instrument(skip(self, profile), fields(id = %profile.id))]
    async fn create(&self, profile: &NewProfile) -> Result<Profile, RepositoryError> {
        let rows: Vec<ProfileRow> = self.client.from(PROFILES).insert(profile).await?;
        single(rows)
    }

    #[instrument(skip(self, update))]
    async fn update(
        &self,
        id: ProfileId,
        update: &ProfileUpdate,
    ) -> Result<Profile, RepositoryError> {
        let rows: Vec<ProfileRow> = self
            .client
            .from(PROFILES)
            .eq("id", id)
            .update(update)
            .await?;
        single(rows)
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Profile>, RepositoryError> {
        let (from, to) = page.range();
        let mut query = self.client.from(PROFILES).select("*");
        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            query = query.or(&or_ilike(&["full_name", "email"], search));
        }
        let (rows, count): (Vec<ProfileRow>, u64) = query
            .order("created_at", Direction::Descending)
            .range(from, to)
            .fetch_page()
            .await?;
        Ok(Page::new(convert_rows(rows)?, count, page))
    }

    #[instrument(skip(self))]
    async fn count(&self, role: Option<Role>) -> Result<u64, RepositoryError> {
        let mut query = self.client.from(PROFILES);
        if let Some(role) = role {
            query = query.eq("role", role);
        }
        Ok(query.count().await?)
    }
}
