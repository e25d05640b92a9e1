//! Verification submission wizard.
//!
//! `Details -> Upload -> Payment -> Success`. Each forward move validates the
//! step being left; a failed validation leaves the step unchanged and
//! returns a field-keyed error map. Going back is allowed to any earlier step
//! whose own fields are still valid. `Success` is only reached through
//! [`VerificationDraft::complete`], once the submission has been stored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use numisma_core::{ImageFile, PhoneNumber, SubmissionId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FieldErrors;
use crate::services::payment::PaymentIntent;

use super::pricing::Quote;

/// Wizard position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Details,
    Upload,
    Payment,
    Success,
}

impl WizardStep {
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Details => Some(Self::Upload),
            Self::Upload => Some(Self::Payment),
            Self::Payment => Some(Self::Success),
            Self::Success => None,
        }
    }
}

/// Which face of the coin a photograph shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Front,
    Back,
}

impl Side {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Back => "back",
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" | "obverse" => Ok(Self::Front),
            "back" | "reverse" => Ok(Self::Back),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

/// Field key for a slot photograph, e.g. `coin_3_front`.
#[must_use]
pub fn image_field(slot: u8, side: Side) -> String {
    format!("coin_{slot}_{}", side.as_str())
}

/// Both photographs of one coin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotImages {
    pub front: Option<ImageFile>,
    pub back: Option<ImageFile>,
}

impl SlotImages {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.front.is_some() && self.back.is_some()
    }

    fn set(&mut self, side: Side, image: ImageFile) {
        match side {
            Side::Front => self.front = Some(image),
            Side::Back => self.back = Some(image),
        }
    }
}

/// Draft identifier stored in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(Uuid);

impl DraftId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for DraftId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An in-progress submission. Photographs stay in memory until the draft
/// is submitted.
#[derive(Debug, Clone)]
pub struct VerificationDraft {
    pub id: DraftId,
    step: WizardStep,
    name: String,
    phone: String,
    coin_count: u8,
    slots: BTreeMap<u8, SlotImages>,
    payment: Option<PaymentIntent>,
    submission_id: Option<SubmissionId>,
    pub created_at: DateTime<Utc>,
}

impl Default for VerificationDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationDraft {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: DraftId::generate(),
            step: WizardStep::Details,
            name: String::new(),
            phone: String::new(),
            coin_count: 1,
            slots: BTreeMap::new(),
            payment: None,
            submission_id: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn step(&self) -> WizardStep {
        self.step
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Phone as typed; normalized on submission.
    #[must_use]
    pub fn phone(&self) -> &str {
        &self.phone
    }

    #[must_use]
    pub const fn coin_count(&self) -> u8 {
        self.coin_count
    }

    #[must_use]
    pub const fn payment(&self) -> Option<&PaymentIntent> {
        self.payment.as_ref()
    }

    #[must_use]
    pub const fn submission_id(&self) -> Option<SubmissionId> {
        self.submission_id
    }

    /// Quote for the current coin count. The count is kept in range by
    /// [`Self::set_details`], so this only fails on a corrupted draft.
    #[must_use]
    pub fn quote(&self) -> Option<Quote> {
        Quote::new(i64::from(self.coin_count)).ok()
    }

    #[must_use]
    pub fn slot(&self, slot: u8) -> Option<&SlotImages> {
        self.slots.get(&slot)
    }

    /// Record the details step.
    ///
    /// Fields are stored even when invalid so the form can be re-shown.
    /// Lowering the coin count drops photographs of slots that no longer
    /// exist. Only allowed before payment.
    ///
    /// # Errors
    ///
    /// Returns the field errors of the details step.
    pub fn set_details(
        &mut self,
        name: &str,
        phone: &str,
        coin_count: i64,
    ) -> Result<(), FieldErrors> {
        if self.step >= WizardStep::Payment {
            return Err(FieldErrors::single(
                "step",
                "Details cannot change once payment has started",
            ));
        }

        self.name = name.trim().to_string();
        self.phone = phone.trim().to_string();

        let mut errors = FieldErrors::new();
        match Quote::new(coin_count) {
            Ok(quote) => {
                self.coin_count = quote.coin_count;
                let last = quote.total_coins_to_upload;
                self.slots.retain(|slot, _| *slot <= last);
            }
            Err(e) => errors.add("coin_count", e.to_string()),
        }

        let details = self.validate_details();
        for field in ["name", "phone"] {
            if let Some(message) = details.get(field) {
                errors.add(field, message);
            }
        }

        errors.into_result_fields()
    }

    /// Attach a photograph to a slot, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns a field error when the slot does not exist for the current
    /// coin count or when payment has already started.
    pub fn attach(&mut self, slot: u8, side: Side, image: ImageFile) -> Result<(), FieldErrors> {
        let field = image_field(slot, side);
        if self.step >= WizardStep::Payment {
            return Err(FieldErrors::single(
                field,
                "Photographs cannot change once payment has started",
            ));
        }
        let total = self.quote().map_or(0, |q| q.total_coins_to_upload);
        if slot == 0 || slot > total {
            return Err(FieldErrors::single(
                field,
                format!("Slot must be between 1 and {total}"),
            ));
        }
        self.slots.entry(slot).or_default().set(side, image);
        Ok(())
    }

    /// Errors of the details step.
    #[must_use]
    pub fn validate_details(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.name.is_empty() {
            errors.add("name", "Name is required");
        }
        if let Err(e) = PhoneNumber::parse(&self.phone) {
            errors.add("phone", e.to_string());
        }
        if self.quote().is_none() {
            errors.add("coin_count", "Choose between 1 and 6 coins");
        }
        errors
    }

    /// Errors of the upload step: every slot, bonus included, needs both sides.
    #[must_use]
    pub fn validate_uploads(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        let Some(quote) = self.quote() else {
            errors.add("coin_count", "Choose between 1 and 6 coins");
            return errors;
        };
        for slot in quote.slots() {
            let images = self.slots.get(&slot);
            if images.and_then(|s| s.front.as_ref()).is_none() {
                errors.add(image_field(slot, Side::Front), "Front photo is required");
            }
            if images.and_then(|s| s.back.as_ref()).is_none() {
                errors.add(image_field(slot, Side::Back), "Back photo is required");
            }
        }
        errors
    }

    /// Errors of every step before `step`.
    fn validate_through(&self, step: WizardStep) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if step > WizardStep::Details {
            merge(&mut errors, self.validate_details());
        }
        if step > WizardStep::Upload {
            merge(&mut errors, self.validate_uploads());
        }
        errors
    }

    /// Move forward one step from `Details` or `Upload`.
    ///
    /// `Payment -> Success` is [`Self::complete`]; `Upload -> Payment` goes
    /// through [`Self::begin_payment`].
    ///
    /// # Errors
    ///
    /// Returns the current step's field errors; the step is unchanged.
    pub fn advance(&mut self) -> Result<WizardStep, FieldErrors> {
        match self.step {
            WizardStep::Details => {
                self.validate_details().into_result_fields()?;
                self.step = WizardStep::Upload;
            }
            WizardStep::Upload => {
                return Err(FieldErrors::single(
                    "step",
                    "Continue to payment to generate a payment code",
                ));
            }
            WizardStep::Payment => {
                return Err(FieldErrors::single(
                    "step",
                    "Confirm payment to finish the submission",
                ));
            }
            WizardStep::Success => {}
        }
        Ok(self.step)
    }

    /// Check that every photograph is present before a payment is requested.
    ///
    /// # Errors
    ///
    /// Returns the upload errors, or a step error outside `Upload`.
    pub fn ready_for_payment(&self) -> Result<Quote, FieldErrors> {
        if self.step != WizardStep::Upload {
            return Err(FieldErrors::single("step", "Upload your photographs first"));
        }
        self.validate_through(WizardStep::Payment).into_result_fields()?;
        self.quote()
            .ok_or_else(|| FieldErrors::single("coin_count", "Choose between 1 and 6 coins"))
    }

    /// `Upload -> Payment` with the payment request that was issued.
    ///
    /// # Errors
    ///
    /// Same as [`Self::ready_for_payment`].
    pub fn begin_payment(&mut self, intent: PaymentIntent) -> Result<(), FieldErrors> {
        self.ready_for_payment()?;
        self.payment = Some(intent);
        self.step = WizardStep::Payment;
        Ok(())
    }

    /// `Payment -> Success` once the submission is stored.
    pub fn complete(&mut self, submission_id: SubmissionId) {
        self.submission_id = Some(submission_id);
        self.step = WizardStep::Success;
    }

    /// Go back to an earlier step.
    ///
    /// # Errors
    ///
    /// Refuses forward moves, moves out of `Success`, and targets whose
    /// preceding steps no longer validate.
    pub fn go_back(&mut self, target: WizardStep) -> Result<WizardStep, FieldErrors> {
        if self.step == WizardStep::Success {
            return Err(FieldErrors::single("step", "Submission is already complete"));
        }
        if target > self.step {
            return Err(FieldErrors::single("step", "Cannot skip ahead"));
        }
        self.validate_through(target).into_result_fields()?;
        if target < WizardStep::Payment {
            self.payment = None;
        }
        self.step = target;
        Ok(self.step)
    }

    /// Every photograph in slot order, with its side and bonus flag.
    pub fn images(&self) -> impl Iterator<Item = (u8, Side, &ImageFile)> {
        self.slots.iter().flat_map(|(slot, images)| {
            [
                images.front.as_ref().map(|i| (*slot, Side::Front, i)),
                images.back.as_ref().map(|i| (*slot, Side::Back, i)),
            ]
            .into_iter()
            .flatten()
        })
    }

    /// Client-facing view without image bytes.
    #[must_use]
    pub fn view(&self) -> DraftView<'_> {
        let quote = self.quote();
        let slots = quote
            .map(|q| {
                q.slots()
                    .map(|slot| {
                        let images = self.slots.get(&slot);
                        SlotView {
                            slot,
                            bonus: q.is_bonus_slot(slot),
                            front: images.is_some_and(|s| s.front.is_some()),
                            back: images.is_some_and(|s| s.back.is_some()),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        DraftView {
            id: self.id,
            step: self.step,
            name: &self.name,
            phone: &self.phone,
            quote,
            slots,
            payment: self.payment.as_ref(),
            submission_id: self.submission_id,
        }
    }
}

fn merge(into: &mut FieldErrors, from: FieldErrors) {
    for (field, message) in from.iter() {
        into.add(field, message);
    }
}

/// Upload state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub slot: u8,
    pub bonus: bool,
    pub front: bool,
    pub back: bool,
}

/// JSON view of a draft.
#[derive(Debug, Serialize)]
pub struct DraftView<'a> {
    pub id: DraftId,
    pub step: WizardStep,
    pub name: &'a str,
    pub phone: &'a str,
    pub quote: Option<Quote>,
    pub slots: Vec<SlotView>,
    pub payment: Option<&'a PaymentIntent>,
    pub submission_id: Option<SubmissionId>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::payment::PaymentIntent;
    use numisma_core::Price;

    fn image() -> ImageFile {
        ImageFile::new("coin.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF]).unwrap()
    }

    fn intent() -> PaymentIntent {
        PaymentIntent {
            reference: "VER-1".to_string(),
            amount: Price::new(100),
            payment_uri: "upi://pay?pa=numisma@upi".to_string(),
        }
    }

    fn upload_all(draft: &mut VerificationDraft) {
        let total = draft.quote().unwrap().total_coins_to_upload;
        for slot in 1..=total {
            draft.attach(slot, Side::Front, image()).unwrap();
            draft.attach(slot, Side::Back, image()).unwrap();
        }
    }

    #[test]
    fn test_details_validation() {
        let mut draft = VerificationDraft::new();
        let errors = draft.set_details("  ", "12345", 9).unwrap_err();
        assert!(errors.contains("name"));
        assert!(errors.contains("phone"));
        assert!(errors.contains("coin_count"));
        assert!(draft.advance().is_err());
        assert_eq!(draft.step(), WizardStep::Details);

        draft.set_details("Asha Rao", "(987) 654-3210", 2).unwrap();
        assert_eq!(draft.advance().unwrap(), WizardStep::Upload);
    }

    #[test]
    fn test_upload_requires_both_sides_of_every_slot() {
        let mut draft = VerificationDraft::new();
        draft.set_details("Asha Rao", "9876543210", 5).unwrap();
        draft.advance().unwrap();

        for slot in 1..=5 {
            draft.attach(slot, Side::Front, image()).unwrap();
            draft.attach(slot, Side::Back, image()).unwrap();
        }
        // Bonus slot 6 still missing.
        let errors = draft.begin_payment(intent()).unwrap_err();
        assert!(errors.contains("coin_6_front"));
        assert!(errors.contains("coin_6_back"));
        assert_eq!(draft.step(), WizardStep::Upload);

        draft.attach(6, Side::Front, image()).unwrap();
        assert!(draft.begin_payment(intent()).is_err());
        draft.attach(6, Side::Back, image()).unwrap();
        draft.begin_payment(intent()).unwrap();
        assert_eq!(draft.step(), WizardStep::Payment);
        assert_eq!(draft.images().count(), 12);
    }

    #[test]
    fn test_attach_rejects_missing_slot() {
        let mut draft = VerificationDraft::new();
        draft.set_details("Asha Rao", "9876543210", 2).unwrap();
        assert!(draft.attach(0, Side::Front, image()).is_err());
        assert!(draft.attach(3, Side::Front, image()).is_err());
        assert!(draft.attach(2, Side::Back, image()).is_ok());
    }

    #[test]
    fn test_lowering_count_drops_slots() {
        let mut draft = VerificationDraft::new();
        draft.set_details("Asha Rao", "9876543210", 6).unwrap();
        upload_all(&mut draft);
        assert_eq!(draft.images().count(), 14);

        draft.set_details("Asha Rao", "9876543210", 2).unwrap();
        assert_eq!(draft.images().count(), 4);
        assert!(draft.slot(3).is_none());
    }

    #[test]
    fn test_no_forward_skipping() {
        let mut draft = VerificationDraft::new();
        draft.set_details("Asha Rao", "9876543210", 1).unwrap();
        assert!(draft.go_back(WizardStep::Upload).is_err());
        assert!(draft.begin_payment(intent()).is_err());
    }

    #[test]
    fn test_go_back() {
        let mut draft = VerificationDraft::new();
        draft.set_details("Asha Rao", "9876543210", 1).unwrap();
        draft.advance().unwrap();
        upload_all(&mut draft);
        draft.begin_payment(intent()).unwrap();

        assert_eq!(draft.go_back(WizardStep::Upload).unwrap(), WizardStep::Upload);
        assert!(draft.payment().is_none());
        assert_eq!(draft.go_back(WizardStep::Details).unwrap(), WizardStep::Details);
    }

    #[test]
    fn test_complete_is_final() {
        let mut draft = VerificationDraft::new();
        draft.set_details("Asha Rao", "9876543210", 1).unwrap();
        draft.advance().unwrap();
        upload_all(&mut draft);
        draft.begin_payment(intent()).unwrap();
        draft.complete(SubmissionId::generate());

        assert_eq!(draft.step(), WizardStep::Success);
        assert!(draft.go_back(WizardStep::Details).is_err());
        assert!(draft.set_details("B", "9876543210", 1).is_err());
    }

    #[test]
    fn test_view_marks_bonus_slot() {
        let mut draft = VerificationDraft::new();
        draft.set_details("Asha Rao", "9876543210", 5).unwrap();
        draft.attach(6, Side::Front, image()).unwrap();
        let view = draft.view();
        assert_eq!(view.slots.len(), 6);
        let bonus = view.slots.last().unwrap();
        assert!(bonus.bonus && bonus.front && !bonus.back);
        assert_eq!(view.quote.unwrap().total_price, Price::new(100));
    }
}
