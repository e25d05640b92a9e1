//! Coin reviews (`coin_reviews`).

use chrono::{DateTime, Utc};
use numisma_core::{CoinId, ProfileId, Rating, ReviewId};
use serde::{Deserialize, Serialize};

/// A rating with optional comment left on a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoinReview {
    pub id: ReviewId,
    pub coin_id: CoinId,
    pub user_id: ProfileId,
    pub rating: Rating,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Stored shape of a review. `rating` is a plain integer column.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinReviewRow {
    pub id: ReviewId,
    pub coin_id: CoinId,
    pub user_id: ProfileId,
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CoinReviewRow> for CoinReview {
    type Error = String;

    fn try_from(row: CoinReviewRow) -> Result<Self, Self::Error> {
        let rating = Rating::new(row.rating).map_err(|e| format!("{e} on review {}", row.id))?;
        Ok(Self {
            id: row.id,
            coin_id: row.coin_id,
            user_id: row.user_id,
            rating,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    pub coin_id: CoinId,
    pub user_id: ProfileId,
    pub rating: Rating,
    pub comment: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_rating_is_rejected() {
        let row: CoinReviewRow = serde_json::from_value(serde_json::json!({
            "id": "0b5f4f1e-8a3c-4e7e-9d2e-6f1f3c1a2b3c",
            "coin_id": "1b5f4f1e-8a3c-4e7e-9d2e-6f1f3c1a2b3c",
            "user_id": "2b5f4f1e-8a3c-4e7e-9d2e-6f1f3c1a2b3c",
            "rating": 7,
            "created_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(CoinReview::try_from(row).is_err());
    }
}
