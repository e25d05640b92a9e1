//! Newsletter subscriptions (`newsletter_subscriptions`).

use chrono::{DateTime, Utc};
use numisma_core::{Email, SubscriptionId};
use serde::{Deserialize, Serialize};

/// A subscriber. Rows are toggled, never deleted; `email` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsletterSubscription {
    pub id: SubscriptionId,
    pub email: Email,
    pub is_subscribed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored shape of a subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct NewsletterSubscriptionRow {
    pub id: SubscriptionId,
    pub email: String,
    pub is_subscribed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<NewsletterSubscriptionRow> for NewsletterSubscription {
    type Error = String;

    fn try_from(row: NewsletterSubscriptionRow) -> Result<Self, Self::Error> {
        let email =
            Email::parse(&row.email).map_err(|e| format!("invalid email in subscription {}: {e}", row.id))?;
        Ok(Self {
            id: row.id,
            email,
            is_subscribed: row.is_subscribed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
