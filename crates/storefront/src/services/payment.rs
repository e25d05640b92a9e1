//! Payment collection.
//!
//! Payments are requested through a [`PaymentProvider`] and later confirmed.
//! Every provider call reports an explicit [`PaymentOutcome`]; nothing is
//! assumed to have succeeded.
//!
//! [`QrPaymentProvider`] encodes a UPI payment URI for the customer to scan.
//! There is no callback from the payer's bank: the payment counts as
//! received when the confirmation action is taken. Issued requests are held
//! in process for a day; after that, or after a restart, the reference is
//! unknown and a new request has to be issued.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use numisma_core::{Currency, Price};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::config::PaymentConfig;

/// Errors talking to a payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("unknown payment reference: {0}")]
    UnknownReference(String),
    #[error("payment amount must be greater than zero")]
    ZeroAmount,
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
}

/// What to charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Caller-chosen reference, unique per charge.
    pub reference: String,
    pub amount: Price,
    /// Shown in the payer's app.
    pub note: String,
}

/// An issued payment request the customer can act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub reference: String,
    pub amount: Price,
    /// URI to encode as a QR code or open directly on mobile.
    pub payment_uri: String,
}

/// Result of a payment check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded,
    Failed(String),
    Pending,
}

/// External payment collaborator.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Issue a payment request.
    async fn create(&self, request: &PaymentRequest) -> Result<PaymentIntent, PaymentError>;

    /// Current state of a payment without changing it.
    async fn status(&self, reference: &str) -> Result<PaymentOutcome, PaymentError>;

    /// Confirm that the payment was made.
    async fn confirm(&self, reference: &str) -> Result<PaymentOutcome, PaymentError>;

    /// Mark a payment as failed (cancelled order, expired request).
    async fn fail(&self, reference: &str, reason: &str) -> Result<(), PaymentError>;
}

/// How long an issued request can be confirmed.
const PAYMENT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Requests held at once.
const MAX_PAYMENTS: u64 = 10_000;

type SharedOutcome = Arc<Mutex<PaymentOutcome>>;

/// UPI QR-code payments confirmed by an explicit action.
#[derive(Clone)]
pub struct QrPaymentProvider {
    config: PaymentConfig,
    payments: Cache<String, SharedOutcome>,
}

impl std::fmt::Debug for QrPaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrPaymentProvider")
            .field("upi_id", &self.config.upi_id)
            .field("payments", &self.payments.entry_count())
            .finish_non_exhaustive()
    }
}

impl QrPaymentProvider {
    #[must_use]
    pub fn new(config: PaymentConfig) -> Self {
        Self::with_ttl(config, PAYMENT_TTL)
    }

    /// A provider whose requests expire `ttl` after they were issued.
    #[must_use]
    pub fn with_ttl(config: PaymentConfig, ttl: Duration) -> Self {
        Self {
            config,
            payments: Cache::builder()
                .max_capacity(MAX_PAYMENTS)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// `upi://pay` URI for a request.
    #[must_use]
    pub fn payment_uri(&self, request: &PaymentRequest) -> String {
        format!(
            "upi://pay?pa={}&pn={}&am={}&cu={}&tn={}&tr={}",
            urlencoding::encode(&self.config.upi_id),
            urlencoding::encode(&self.config.payee_name),
            request.amount.amount(),
            Currency::INR.code(),
            urlencoding::encode(&request.note),
            urlencoding::encode(&request.reference),
        )
    }

    async fn outcome(&self, reference: &str) -> Result<SharedOutcome, PaymentError> {
        self.payments
            .get(reference)
            .await
            .ok_or_else(|| PaymentError::UnknownReference(reference.to_string()))
    }
}

#[async_trait]
impl PaymentProvider for QrPaymentProvider {
    #[instrument(skip(self), fields(reference = %request.reference, amount = %request.amount))]
    async fn create(&self, request: &PaymentRequest) -> Result<PaymentIntent, PaymentError> {
        if request.amount == Price::ZERO {
            return Err(PaymentError::ZeroAmount);
        }
        self.payments
            .insert(
                request.reference.clone(),
                Arc::new(Mutex::new(PaymentOutcome::Pending)),
            )
            .await;
        info!("Payment requested");

        Ok(PaymentIntent {
            reference: request.reference.clone(),
            amount: request.amount,
            payment_uri: self.payment_uri(request),
        })
    }

    async fn status(&self, reference: &str) -> Result<PaymentOutcome, PaymentError> {
        let outcome = self.outcome(reference).await?;
        let outcome = outcome.lock().await.clone();
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn confirm(&self, reference: &str) -> Result<PaymentOutcome, PaymentError> {
        let shared = self.outcome(reference).await?;
        let mut outcome = shared.lock().await;

        if *outcome == PaymentOutcome::Pending {
            *outcome = PaymentOutcome::Succeeded;
            info!("Payment confirmed");
        } else if let PaymentOutcome::Failed(reason) = &*outcome {
            warn!(reason = %reason, "Confirmation of a failed payment ignored");
        }
        Ok(outcome.clone())
    }

    #[instrument(skip(self))]
    async fn fail(&self, reference: &str, reason: &str) -> Result<(), PaymentError> {
        let shared = self.outcome(reference).await?;
        let mut outcome = shared.lock().await;
        if *outcome != PaymentOutcome::Succeeded {
            *outcome = PaymentOutcome::Failed(reason.to_string());
        }
        Ok(())
    }
}
