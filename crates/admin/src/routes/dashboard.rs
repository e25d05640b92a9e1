//! Dashboard overview counts.

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use numisma_core::{OrderStatus, Price, Role, SubmissionStatus};
use serde::Serialize;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub users: UserStats,
    pub listings: ListingStats,
    pub orders: OrderStats,
    pub verifications: StatusCounts,
    pub reviews: u64,
    pub subscribers: u64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total: u64,
    pub admins: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingStats {
    pub total: u64,
    pub verified: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    #[serde(flatten)]
    pub counts: StatusCounts,
    /// Sum over orders that were not cancelled.
    pub revenue: Price,
}

/// A total plus one count per status, keyed by the stored status text.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: u64,
    pub by_status: BTreeMap<&'static str, u64>,
}

impl StatusCounts {
    fn new(by_status: impl IntoIterator<Item = (&'static str, u64)>) -> Self {
        let by_status: BTreeMap<_, _> = by_status.into_iter().collect();
        Self {
            total: by_status.values().sum(),
            by_status,
        }
    }
}

/// `GET /api/stats`
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<DashboardStats>> {
    let repos = state.repos();

    let order_counts = try_join_all(OrderStatus::ALL.into_iter().map(|status| async move {
        repos
            .orders
            .count(Some(status))
            .await
            .map(|n| (status.as_str(), n))
    }));
    let submission_counts = try_join_all(SubmissionStatus::ALL.into_iter().map(|status| async move {
        repos
            .verifications
            .count(Some(status))
            .await
            .map(|n| (status.as_str(), n))
    }));

    let (
        users,
        admins,
        listings,
        verified,
        order_counts,
        revenue,
        submission_counts,
        reviews,
        subscribers,
    ) = futures::try_join!(
        repos.profiles.count(None),
        repos.profiles.count(Some(Role::Admin)),
        repos.listings.count(None),
        repos.listings.count(Some(true)),
        order_counts,
        repos.orders.revenue(),
        submission_counts,
        repos.reviews.count(),
        repos.newsletter.count_subscribed(),
    )?;

    Ok(Json(DashboardStats {
        users: UserStats {
            total: users,
            admins,
        },
        listings: ListingStats {
            total: listings,
            verified,
        },
        orders: OrderStats {
            counts: StatusCounts::new(order_counts),
            revenue,
        },
        verifications: StatusCounts::new(submission_counts),
        reviews,
        subscribers,
        generated_at: Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_counts_total() {
        let counts = StatusCounts::new([("pending", 2), ("shipped", 3), ("cancelled", 0)]);
        assert_eq!(counts.total, 5);
        assert_eq!(counts.by_status.get("shipped"), Some(&3));
    }
}
