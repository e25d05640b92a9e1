//! Paying for and submitting a verification draft.
//!
//! The wizard in [`crate::verification`] only tracks state. This service
//! talks to the payment provider, uploads the photographs and stores the
//! submission once the payment is confirmed.

use std::collections::BTreeMap;

use numisma_backend::Repositories;
use numisma_backend::models::{NewVerificationSubmission, SubmittedCoin, VerificationSubmission};
use numisma_backend::repository::VerificationRepository;
use numisma_backend::storage::{ObjectStorage, object_path};
use numisma_core::{Currency, PhoneNumber, ProfileId, SubmissionStatus};
use tracing::{info, instrument, warn};

use crate::error::{AppError, FieldErrors, Result};
use crate::models::CurrentUser;
use crate::services::notification::{Notification, NotificationDispatcher, Recipient};
use crate::services::payment::{PaymentIntent, PaymentOutcome, PaymentProvider, PaymentRequest};
use crate::verification::{DraftId, Side, VerificationDraft, WizardStep};

/// Payment reference for a draft: `VER-` and the first eight hex digits of
/// the draft id.
#[must_use]
pub fn payment_reference(draft_id: DraftId) -> String {
    let prefix: String = draft_id.to_string().chars().take(8).collect();
    format!("VER-{}", prefix.to_uppercase())
}

pub struct VerificationService<'a> {
    verifications: &'a dyn VerificationRepository,
    storage: &'a dyn ObjectStorage,
    payments: &'a dyn PaymentProvider,
    notifier: &'a NotificationDispatcher,
}

impl<'a> VerificationService<'a> {
    #[must_use]
    pub fn new(
        repos: &'a Repositories,
        payments: &'a dyn PaymentProvider,
        notifier: &'a NotificationDispatcher,
    ) -> Self {
        Self {
            verifications: repos.verifications.as_ref(),
            storage: repos.storage.as_ref(),
            payments,
            notifier,
        }
    }

    /// `Upload -> Payment`: request payment for the quoted total.
    ///
    /// # Errors
    ///
    /// Returns the wizard's field errors when details or photographs are
    /// incomplete, and the payment error if the request cannot be issued.
    #[instrument(skip(self, draft), fields(draft_id = %draft.id))]
    pub async fn begin_payment(&self, draft: &mut VerificationDraft) -> Result<PaymentIntent> {
        let quote = draft.ready_for_payment()?;
        let request = PaymentRequest {
            reference: payment_reference(draft.id),
            amount: quote.total_price,
            note: format!("Verification of {} coin(s)", quote.coin_count),
        };
        let intent = self.payments.create(&request).await?;
        draft.begin_payment(intent.clone())?;
        info!(amount = %intent.amount, "Verification payment requested");
        Ok(intent)
    }

    /// Step back in the wizard. Leaving the payment step voids the payment
    /// request so a new one is issued next time.
    ///
    /// # Errors
    ///
    /// Returns the wizard's field errors.
    pub async fn go_back(
        &self,
        draft: &mut VerificationDraft,
        target: WizardStep,
    ) -> Result<WizardStep> {
        let reference = draft.payment().map(|p| p.reference.clone());
        let step = draft.go_back(target)?;
        if let (Some(reference), None) = (reference, draft.payment()) {
            if let Err(e) = self.payments.fail(&reference, "returned to edit").await {
                warn!(error = %e, "Failed to void verification payment");
            }
        }
        Ok(step)
    }

    /// Confirm the payment, upload every photograph and store the
    /// submission. The draft moves to `Success`.
    ///
    /// Photographs already uploaded are removed again if anything after the
    /// payment fails.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` outside the payment step,
    /// `AppError::Conflict` when the payment is still pending or failed, and
    /// the storage or repository error otherwise.
    #[instrument(skip(self, user, draft), fields(draft_id = %draft.id))]
    pub async fn submit(
        &self,
        user: Option<&CurrentUser>,
        draft: &mut VerificationDraft,
    ) -> Result<VerificationSubmission> {
        if draft.step() != WizardStep::Payment {
            return Err(FieldErrors::single("step", "Request a payment code first").into());
        }
        let intent = draft
            .payment()
            .cloned()
            .ok_or_else(|| FieldErrors::single("step", "Request a payment code first"))?;
        let quote = draft
            .quote()
            .ok_or_else(|| FieldErrors::single("coin_count", "Choose between 1 and 6 coins"))?;
        let phone = PhoneNumber::parse(draft.phone())
            .map_err(|e| FieldErrors::single("phone", e.to_string()))?;

        match self.payments.confirm(&intent.reference).await? {
            PaymentOutcome::Succeeded => {}
            PaymentOutcome::Pending => {
                return Err(AppError::Conflict("Payment not received yet".to_string()));
            }
            PaymentOutcome::Failed(reason) => {
                return Err(AppError::Conflict(format!("Payment failed: {reason}")));
            }
        }

        let owner = user.map_or_else(|| "anonymous".to_string(), |u| u.id.to_string());
        let mut uploaded = Vec::new();
        let mut slots: BTreeMap<u8, (Option<String>, Option<String>)> = BTreeMap::new();
        for (slot, side, image) in draft.images() {
            let name = format!("{}-{slot}-{}", draft.id, side.as_str());
            let path = object_path("verifications", &owner, &name, image);
            match self.storage.upload(&path, image).await {
                Ok(url) => {
                    uploaded.push(path);
                    let entry = slots.entry(slot).or_default();
                    match side {
                        Side::Front => entry.0 = Some(url),
                        Side::Back => entry.1 = Some(url),
                    }
                }
                Err(e) => {
                    self.discard(&uploaded).await;
                    return Err(e.into());
                }
            }
        }

        let coins: Vec<SubmittedCoin> = slots
            .into_iter()
            .filter_map(|(slot, (front, back))| {
                Some(SubmittedCoin {
                    slot,
                    front_url: front?,
                    back_url: back?,
                    bonus: quote.is_bonus_slot(slot),
                })
            })
            .collect();

        let new = NewVerificationSubmission {
            user_id: user.map(|u| u.id),
            name: draft.name().to_string(),
            phone: phone.clone(),
            coin_count: quote.coin_count,
            total_coins: quote.total_coins_to_upload,
            total_price: quote.total_price,
            coins,
            payment_reference: Some(intent.reference.clone()),
            status: SubmissionStatus::Pending,
        };
        let submission = match self.verifications.create(&new).await {
            Ok(submission) => submission,
            Err(e) => {
                self.discard(&uploaded).await;
                return Err(e.into());
            }
        };
        draft.complete(submission.id);
        info!(submission_id = %submission.id, coins = quote.total_coins_to_upload, "Verification submitted");

        let recipient = Recipient {
            phone: Some(phone),
            ..user.map(Recipient::from).unwrap_or_default()
        };
        self.notifier
            .dispatch(&Notification::new(
                recipient,
                "Verification request received",
                format!(
                    "We received {} coin(s) for verification and your payment of {}. An expert will review the photographs shortly.",
                    quote.total_coins_to_upload,
                    quote.total_price.display(Currency::INR)
                ),
            ))
            .await;

        Ok(submission)
    }

    /// The user's submissions, newest first.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the backend query fails.
    pub async fn mine(&self, user_id: ProfileId) -> Result<Vec<VerificationSubmission>> {
        Ok(self.verifications.list_for_user(user_id).await?)
    }

    async fn discard(&self, paths: &[String]) {
        for path in paths {
            if let Err(e) = self.storage.remove(path).await {
                warn!(path = %path, error = %e, "Failed to remove orphaned upload");
            }
        }
    }
}
