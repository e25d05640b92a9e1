use async_trait::async_trait;
use numisma_core::Email;
use tracing::instrument;

use super::{RepositoryError, convert_rows, single};
use crate::client::BackendClient;
use crate::models::newsletter::NewsletterSubscriptionRow;
use crate::models::tables::NEWSLETTER_SUBSCRIPTIONS;
use crate::models::{NewsletterSubscription, Page, PageRequest};
use crate::query::Direction;

/// Access to `newsletter_subscriptions`.
#[async_trait]
pub trait NewsletterRepository: Send + Sync {
    async fn get(&self, email: &Email) -> Result<Option<NewsletterSubscription>, RepositoryError>;

    /// Create or toggle the subscription for `email`.
    async fn set_subscribed(
        &self,
        email: &Email,
        subscribed: bool,
    ) -> Result<NewsletterSubscription, RepositoryError>;

    /// Newest first, optionally only active subscribers.
    async fn list(
        &self,
        subscribed_only: bool,
        page: PageRequest,
    ) -> Result<Page<NewsletterSubscription>, RepositoryError>;

    async fn count_subscribed(&self) -> Result<u64, RepositoryError>;
}

pub struct RestNewsletterRepository {
    client: BackendClient,
}

impl RestNewsletterRepository {
    #[must_use]
    pub const fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NewsletterRepository for RestNewsletterRepository {
    #[instrument(skip(self), fields(email = %email))]
    async fn get(&self, email: &Email) -> Result<Option<NewsletterSubscription>, RepositoryError> {
        let row: Option<NewsletterSubscriptionRow> = self
            .client
            .from(NEWSLETTER_SUBSCRIPTIONS)
            .eq("email", email)
            .fetch_optional()
            .await?;
        row.map(NewsletterSubscription::try_from)
            .transpose()
            .map_err(RepositoryError::DataCorruption)
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn set_subscribed(
        &self,
        email: &Email,
        subscribed: bool,
    ) -> Result<NewsletterSubscription, RepositoryError> {
        let body = serde_json::json!({
            "email": email.as_str(),
            "is_subscribed": subscribed,
            "updated_at": chrono::Utc::now(),
        });
        let rows: Vec<NewsletterSubscriptionRow> = self
            .client
            .from(NEWSLETTER_SUBSCRIPTIONS)
            .upsert(&body, "email")
            .await?;
        single(rows)
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        subscribed_only: bool,
        page: PageRequest,
    ) -> Result<Page<NewsletterSubscription>, RepositoryError> {
        let (from, to) = page.range();
        let mut query = self.client.from(NEWSLETTER_SUBSCRIPTIONS).select("*");
        if subscribed_only {
            query = query.eq("is_subscribed", true);
        }
        let (rows, count): (Vec<NewsletterSubscriptionRow>, u64) = query
            .order("created_at", Direction::Descending)
            .range(from, to)
            .fetch_page()
            .await?;
        Ok(Page::new(convert_rows(rows)?, count, page))
    }

    #[instrument(skip(self))]
    async fn count_subscribed(&self) -> Result<u64, RepositoryError> {
        Ok(self
            .client
            .from(NEWSLETTER_SUBSCRIPTIONS)
            .eq("is_subscribed", true)
            .count()
            .await?)
    }
}
