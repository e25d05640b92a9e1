//! Coin verification submissions (`verification_submissions`).

use chrono::{DateTime, Utc};
use numisma_core::{PhoneNumber, Price, ProfileId, SubmissionId, SubmissionStatus};
use serde::{Deserialize, Serialize};

/// Photographs uploaded for one coin slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedCoin {
    /// 1-based slot number.
    pub slot: u8,
    pub front_url: String,
    pub back_url: String,
    /// Free slot granted for paying for five or more coins.
    #[serde(default)]
    pub bonus: bool,
}

/// A paid request for expert review of coin photographs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationSubmission {
    pub id: SubmissionId,
    pub user_id: Option<ProfileId>,
    pub name: String,
    pub phone: PhoneNumber,
    /// Paid coins.
    pub coin_count: u8,
    /// Paid coins plus any bonus slot.
    pub total_coins: u8,
    pub total_price: Price,
    pub coins: Vec<SubmittedCoin>,
    pub payment_reference: Option<String>,
    pub status: SubmissionStatus,
    pub expert_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored shape of a submission.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationSubmissionRow {
    pub id: SubmissionId,
    #[serde(default)]
    pub user_id: Option<ProfileId>,
    pub name: String,
    pub phone: String,
    pub coin_count: u8,
    pub total_coins: u8,
    pub total_price: Price,
    #[serde(default)]
    pub coins: Vec<SubmittedCoin>,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub status: SubmissionStatus,
    #[serde(default)]
    pub expert_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<VerificationSubmissionRow> for VerificationSubmission {
    type Error = String;

    fn try_from(row: VerificationSubmissionRow) -> Result<Self, Self::Error> {
        let phone = PhoneNumber::parse(&row.phone)
            .map_err(|e| format!("invalid phone on submission {}: {e}", row.id))?;
        if usize::from(row.total_coins) != row.coins.len() {
            return Err(format!(
                "submission {} has {} coin slots but total_coins = {}",
                row.id,
                row.coins.len(),
                row.total_coins
            ));
        }
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            phone,
            coin_count: row.coin_count,
            total_coins: row.total_coins,
            total_price: row.total_price,
            coins: row.coins,
            payment_reference: row.payment_reference,
            status: row.status,
            expert_notes: row.expert_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVerificationSubmission {
    pub user_id: Option<ProfileId>,
    pub name: String,
    pub phone: PhoneNumber,
    pub coin_count: u8,
    pub total_coins: u8,
    pub total_price: Price,
    pub coins: Vec<SubmittedCoin>,
    pub payment_reference: Option<String>,
    pub status: SubmissionStatus,
}

/// Expert decision on a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReview {
    pub status: SubmissionStatus,
    #[serde(default)]
    pub expert_notes: Option<String>,
}
