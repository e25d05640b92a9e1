use async_trait::async_trait;
use numisma_core::{ProfileId, SubmissionId, SubmissionStatus};
use tracing::instrument;

use super::{RepositoryError, convert_rows, single};
use crate::client::BackendClient;
use crate::models::tables::VERIFICATION_SUBMISSIONS;
use crate::models::verification::VerificationSubmissionRow;
use crate::models::{
    NewVerificationSubmission, Page, PageRequest, SubmissionReview, VerificationSubmission,
};
use crate::query::Direction;

/// Access to `verification_submissions`.
#[async_trait]
pub trait VerificationRepository: Send + Sync {
    async fn create(
        &self,
        submission: &NewVerificationSubmission,
    ) -> Result<VerificationSubmission, RepositoryError>;

    async fn get(&self, id: SubmissionId) -> Result<Option<VerificationSubmission>, RepositoryError>;

    /// A user's submissions, newest first.
    async fn list_for_user(
        &self,
        user_id: ProfileId,
    ) -> Result<Vec<VerificationSubmission>, RepositoryError>;

    /// All submissions, oldest first so the queue is worked in order.
    async fn list(
        &self,
        status: Option<SubmissionStatus>,
        page: PageRequest,
    ) -> Result<Page<VerificationSubmission>, RepositoryError>;

    /// Record an expert decision.
    async fn review(
        &self,
        id: SubmissionId,
        review: &SubmissionReview,
    ) -> Result<VerificationSubmission, RepositoryError>;

    async fn count(&self, status: Option<SubmissionStatus>) -> Result<u64, RepositoryError>;
}

pub struct RestVerificationRepository {
    client: BackendClient,
}

impl RestVerificationRepository {
    #[must_use]
    pub const fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VerificationRepository for RestVerificationRepository {
    #[instrument(skip(self, submission), fields(coins = submission.total_coins))]
    async fn create(
        &self,
        submission: &NewVerificationSubmission,
    ) -> Result<VerificationSubmission, RepositoryError> {
        let rows: Vec<VerificationSubmissionRow> = self
            .client
            .from(VERIFICATION_SUBMISSIONS)
            .insert(submission)
            .await?;
        single(rows)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: SubmissionId) -> Result<Option<VerificationSubmission>, RepositoryError> {
        let row: Option<VerificationSubmissionRow> = self
            .client
            .from(VERIFICATION_SUBMISSIONS)
            .eq("id", id)
            .fetch_optional()
            .await?;
        row.map(VerificationSubmission::try_from)
            .transpose()
            .map_err(RepositoryError::DataCorruption)
    }

    #[instrument(skip(self))]
    async fn list_for_user(
        &self,
        user_id: ProfileId,
    ) -> Result<Vec<VerificationSubmission>, RepositoryError> {
        let rows: Vec<VerificationSubmissionRow> = self
            .client
            .from(VERIFICATION_SUBMISSIONS)
            .eq("user_id", user_id)
            .order("created_at", Direction::Descending)
            .fetch()
            .await?;
        convert_rows(rows)
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        status: Option<SubmissionStatus>,
        page: PageRequest,
    ) -> Result<Page<VerificationSubmission>, RepositoryError> {
        let (from, to) = page.range();
        let mut query = self.client.from(VERIFICATION_SUBMISSIONS).select("*");
        if let Some(status) = status {
            query = query.eq("status", status);
        }
        let (rows, count): (Vec<VerificationSubmissionRow>, u64) = query
            .order("created_at", Direction::Ascending)
            .range(from, to)
            .fetch_page()
            .await?;
        Ok(Page::new(convert_rows(rows)?, count, page))
    }

    #[instrument(skip(self, review), fields(status = %review.status))]
    async fn review(
        &self,
        id: SubmissionId,
        review: &SubmissionReview,
    ) -> Result<VerificationSubmission, RepositoryError> {
        let body = serde_json::json!({
            "status": review.status,
            "expert_notes": review.expert_notes,
            "updated_at": chrono::Utc::now(),
        });
        let rows: Vec<VerificationSubmissionRow> = self
            .client
            .from(VERIFICATION_SUBMISSIONS)
            .eq("id", id)
            .update(&body)
            .await?;
        single(rows)
    }

    #[instrument(skip(self))]
    async fn count(&self, status: Option<SubmissionStatus>) -> Result<u64, RepositoryError> {
        let mut query = self.client.from(VERIFICATION_SUBMISSIONS);
        if let Some(status) = status {
            query = query.eq("status", status);
        }
        Ok(query.count().await?)
    }
}
