//! User notifications over email, SMS and the in-app inbox.
//!
//! [`NotificationDispatcher`] fans a [`Notification`] out to every configured
//! [`Notifier`] concurrently and reports each channel's outcome separately.
//! One failing channel never hides the result of the others.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use numisma_core::{Email, PhoneNumber, ProfileId};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::models::CurrentUser;

/// Messages kept per user in the in-app inbox.
const INBOX_LIMIT: usize = 50;

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    InApp,
}

impl Channel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::InApp => "in_app",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a notification is for. Channels without an address are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipient {
    pub user_id: Option<ProfileId>,
    pub email: Option<Email>,
    pub phone: Option<PhoneNumber>,
}

impl Recipient {
    const fn reachable_by(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.email.is_some(),
            Channel::Sms => self.phone.is_some(),
            Channel::InApp => self.user_id.is_some(),
        }
    }
}

impl From<&CurrentUser> for Recipient {
    fn from(user: &CurrentUser) -> Self {
        Self {
            user_id: Some(user.id),
            email: user.email.clone(),
            phone: user.phone.clone(),
        }
    }
}

/// A message to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: Recipient,
    pub subject: String,
    pub body: String,
}

impl Notification {
    #[must_use]
    pub fn new(recipient: Recipient, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient,
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Outcome on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed(String),
    /// Accepted by the provider, delivery not yet confirmed.
    Pending,
}

/// Failures a notifier can report.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("recipient has no address for {0}")]
    NoAddress(Channel),
    #[error("provider error: {0}")]
    Provider(String),
}

/// A delivery channel implementation.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, notification: &Notification) -> Result<DeliveryStatus, NotifyError>;
}

/// Per-channel outcomes of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub deliveries: Vec<(Channel, DeliveryStatus)>,
}

impl DeliveryReport {
    #[must_use]
    pub fn status(&self, channel: Channel) -> Option<&DeliveryStatus> {
        self.deliveries
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, status)| status)
    }

    #[must_use]
    pub fn all_sent(&self) -> bool {
        self.deliveries
            .iter()
            .all(|(_, status)| *status == DeliveryStatus::Sent)
    }

    pub fn failures(&self) -> impl Iterator<Item = (Channel, &str)> {
        self.deliveries.iter().filter_map(|(channel, status)| match status {
            DeliveryStatus::Failed(reason) => Some((*channel, reason.as_str())),
            _ => None,
        })
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Sends a notification on every channel the recipient can be reached by.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let channels: Vec<Channel> = self.notifiers.iter().map(|n| n.channel()).collect();
        f.debug_struct("NotificationDispatcher")
            .field("channels", &channels)
            .finish()
    }
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Development setup: email and SMS are logged, in-app goes to `inbox`.
    #[must_use]
    pub fn logging(inbox: InAppInbox) -> Self {
        Self::new(vec![
            Arc::new(LoggingNotifier::new(Channel::Email)),
            Arc::new(LoggingNotifier::new(Channel::Sms)),
            Arc::new(inbox),
        ])
    }

    /// Deliver on every reachable channel concurrently.
    #[instrument(skip_all, fields(subject = %notification.subject))]
    pub async fn dispatch(&self, notification: &Notification) -> DeliveryReport {
        let sends = self
            .notifiers
            .iter()
            .filter(|n| notification.recipient.reachable_by(n.channel()))
            .map(|notifier| async move {
                let channel = notifier.channel();
                let status = match notifier.send(notification).await {
                    Ok(status) => status,
                    Err(e) => DeliveryStatus::Failed(e.to_string()),
                };
                (channel, status)
            });

        let report = DeliveryReport {
            deliveries: join_all(sends).await,
        };
        for (channel, reason) in report.failures() {
            warn!(channel = %channel, reason = %reason, "Notification delivery failed");
        }
        report
    }
}

// =============================================================================
// Notifiers
// =============================================================================

/// Writes the message to the log instead of sending it.
#[derive(Debug, Clone, Copy)]
pub struct LoggingNotifier {
    channel: Channel,
}

impl LoggingNotifier {
    #[must_use]
    pub const fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, notification: &Notification) -> Result<DeliveryStatus, NotifyError> {
        let recipient = &notification.recipient;
        let address = match self.channel {
            Channel::Email => recipient.email.as_ref().map(ToString::to_string),
            Channel::Sms => recipient.phone.as_ref().map(ToString::to_string),
            Channel::InApp => recipient.user_id.map(|id| id.to_string()),
        }
        .ok_or(NotifyError::NoAddress(self.channel))?;

        info!(
            channel = %self.channel,
            to = %address,
            subject = %notification.subject,
            "Notification (logged, not sent)"
        );
        Ok(DeliveryStatus::Sent)
    }
}

/// A message in a user's in-app inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxMessage {
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// In-app notifications held in process, newest first, capped per user.
#[derive(Clone, Default)]
pub struct InAppInbox {
    messages: Arc<RwLock<HashMap<ProfileId, Vec<InboxMessage>>>>,
}

impl std::fmt::Debug for InAppInbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InAppInbox").finish_non_exhaustive()
    }
}

impl InAppInbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A user's messages, newest first.
    #[must_use]
    pub fn messages(&self, user_id: ProfileId) -> Vec<InboxMessage> {
        self.messages
            .read()
            .ok()
            .and_then(|m| m.get(&user_id).cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for InAppInbox {
    fn channel(&self) -> Channel {
        Channel::InApp
    }

    async fn send(&self, notification: &Notification) -> Result<DeliveryStatus, NotifyError> {
        let user_id = notification
            .recipient
            .user_id
            .ok_or(NotifyError::NoAddress(Channel::InApp))?;

        let mut messages = self
            .messages
            .write()
            .map_err(|e| NotifyError::Provider(e.to_string()))?;
        let inbox = messages.entry(user_id).or_default();
        inbox.insert(
            0,
            InboxMessage {
                subject: notification.subject.clone(),
                body: notification.body.clone(),
                created_at: Utc::now(),
            },
        );
        inbox.truncate(INBOX_LIMIT);
        Ok(DeliveryStatus::Sent)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct BrokenSms;

    #[async_trait]
    impl Notifier for BrokenSms {
        fn channel(&self) -> Channel {
            Channel::Sms
        }

        async fn send(&self, _: &Notification) -> Result<DeliveryStatus, NotifyError> {
            Err(NotifyError::Provider("gateway timeout".to_string()))
        }
    }

    struct QueuedEmail;

    #[async_trait]
    impl Notifier for QueuedEmail {
        fn channel(&self) -> Channel {
            Channel::Email
        }

        async fn send(&self, _: &Notification) -> Result<DeliveryStatus, NotifyError> {
            Ok(DeliveryStatus::Pending)
        }
    }

    fn recipient() -> Recipient {
        Recipient {
            user_id: Some(ProfileId::generate()),
            email: Some(Email::parse("asha@example.com").unwrap()),
            phone: Some(PhoneNumber::parse("9876543210").unwrap()),
        }
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported_per_channel() {
        let inbox = InAppInbox::new();
        let dispatcher = NotificationDispatcher::new(vec![
            Arc::new(QueuedEmail),
            Arc::new(BrokenSms),
            Arc::new(inbox.clone()),
        ]);
        let notification = Notification::new(recipient(), "Order placed", "Thanks!");

        let report = dispatcher.dispatch(&notification).await;
        assert_eq!(report.status(Channel::Email), Some(&DeliveryStatus::Pending));
        assert!(matches!(
            report.status(Channel::Sms),
            Some(DeliveryStatus::Failed(reason)) if reason.contains("gateway timeout")
        ));
        assert_eq!(report.status(Channel::InApp), Some(&DeliveryStatus::Sent));
        assert!(!report.all_sent());

        let user_id = notification.recipient.user_id.unwrap();
        assert_eq!(inbox.messages(user_id)[0].subject, "Order placed");
    }

    #[tokio::test]
    async fn test_unreachable_channels_skipped() {
        let dispatcher = NotificationDispatcher::logging(InAppInbox::new());
        let notification = Notification::new(
            Recipient {
                phone: Some(PhoneNumber::parse("9876543210").unwrap()),
                ..Recipient::default()
            },
            "Submission received",
            "We will review your coins shortly.",
        );

        let report = dispatcher.dispatch(&notification).await;
        assert_eq!(report.deliveries, vec![(Channel::Sms, DeliveryStatus::Sent)]);
        assert!(report.all_sent());
    }

    #[tokio::test]
    async fn test_inbox_is_capped() {
        let inbox = InAppInbox::new();
        let r = recipient();
        let user_id = r.user_id.unwrap();
        for i in 0..(INBOX_LIMIT + 5) {
            inbox
                .send(&Notification::new(r.clone(), format!("#{i}"), ""))
                .await
                .unwrap();
        }
        let messages = inbox.messages(user_id);
        assert_eq!(messages.len(), INBOX_LIMIT);
        assert_eq!(messages[0].subject, format!("#{}", INBOX_LIMIT + 4));
    }
}
