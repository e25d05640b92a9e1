//! Newsletter subscriptions. Rows are toggled, never deleted.

use numisma_backend::Repositories;
use numisma_backend::models::NewsletterSubscription;
use numisma_backend::repository::NewsletterRepository;
use numisma_core::Email;
use tracing::{info, instrument};

use crate::error::{AppError, FieldErrors, Result};

fn parse_email(email: &str) -> Result<Email> {
    Email::parse(email).map_err(|e| FieldErrors::single("email", e.to_string()).into())
}

pub struct NewsletterService<'a> {
    newsletter: &'a dyn NewsletterRepository,
}

impl<'a> NewsletterService<'a> {
    #[must_use]
    pub fn new(repos: &'a Repositories) -> Self {
        Self {
            newsletter: repos.newsletter.as_ref(),
        }
    }

    /// Subscribe, re-activating an earlier subscription.
    ///
    /// Returns the row and whether it was already active.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed email.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, email: &str) -> Result<(NewsletterSubscription, bool)> {
        let email = parse_email(email)?;
        let already = self
            .newsletter
            .get(&email)
            .await?
            .is_some_and(|s| s.is_subscribed);
        let subscription = self.newsletter.set_subscribed(&email, true).await?;
        if !already {
            info!("Newsletter subscription activated");
        }
        Ok((subscription, already))
    }

    /// Turn a subscription off.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the email never subscribed.
    #[instrument(skip(self))]
    pub async fn unsubscribe(&self, email: &str) -> Result<NewsletterSubscription> {
        let email = parse_email(email)?;
        if self.newsletter.get(&email).await?.is_none() {
            return Err(AppError::NotFound("subscription".to_string()));
        }
        let subscription = self.newsletter.set_subscribed(&email, false).await?;
        info!("Newsletter subscription deactivated");
        Ok(subscription)
    }

    /// Whether `email` is currently subscribed.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed email.
    pub async fn is_subscribed(&self, email: &str) -> Result<bool> {
        let email = parse_email(email)?;
        Ok(self
            .newsletter
            .get(&email)
            .await?
            .is_some_and(|s| s.is_subscribed))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use numisma_backend::InMemoryBackend;

    use super::*;

    #[tokio::test]
    async fn test_toggle_keeps_row() {
        let repos = InMemoryBackend::new().repositories();
        let service = NewsletterService::new(&repos);

        let (first, already) = service.subscribe("Collector@Example.com").await.unwrap();
        assert!(!already);
        let (_, already) = service.subscribe("collector@example.com").await.unwrap();
        assert!(already);

        let off = service.unsubscribe("collector@example.com").await.unwrap();
        assert_eq!(off.id, first.id);
        assert!(!service.is_subscribed("collector@example.com").await.unwrap());

        let (again, already) = service.subscribe("collector@example.com").await.unwrap();
        assert!(!already);
        assert_eq!(again.id, first.id);
    }

    #[tokio::test]
    async fn test_errors() {
        let repos = InMemoryBackend::new().repositories();
        let service = NewsletterService::new(&repos);

        assert!(matches!(
            service.subscribe("nope").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.unsubscribe("never@example.com").await,
            Err(AppError::NotFound(_))
        ));
    }
}
