use async_trait::async_trait;
use numisma_core::ProfileId;
use tracing::instrument;

use super::RepositoryError;
use crate::client::BackendClient;
use crate::models::tables::COURSE_ENROLLMENTS;
use crate::models::{Enrollment, NewEnrollment};
use crate::query::Direction;

/// Access to `course_enrollments`.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Insert; `Conflict` if already enrolled.
    async fn enroll(&self, enrollment: &NewEnrollment) -> Result<Enrollment, RepositoryError>;

    /// A user's enrollments, newest first.
    async fn list_for_user(&self, user_id: ProfileId) -> Result<Vec<Enrollment>, RepositoryError>;

    async fn is_enrolled(
        &self,
        user_id: ProfileId,
        course_slug: &str,
    ) -> Result<bool, RepositoryError>;
}

pub struct RestEnrollmentRepository {
    client: BackendClient,
}

impl RestEnrollmentRepository {
    #[must_use]
    pub const fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EnrollmentRepository for RestEnrollmentRepository {
    #[instrument(skip(self, enrollment), fields(course = %enrollment.course_slug))]
    async fn enroll(&self, enrollment: &NewEnrollment) -> Result<Enrollment, RepositoryError> {
        let rows: Vec<Enrollment> = self
            .client
            .from(COURSE_ENROLLMENTS)
            .insert(enrollment)
            .await?;
        rows.into_iter().next().ok_or(RepositoryError::NotFound)
    }

    #[instrument(skip(self))]
    async fn list_for_user(&self, user_id: ProfileId) -> Result<Vec<Enrollment>, RepositoryError> {
        Ok(self
            .client
            .from(COURSE_ENROLLMENTS)
            .eq("user_id", user_id)
            .order("enrolled_at", Direction::Descending)
            .fetch()
            .await?)
    }

    #[instrument(skip(self))]
    async fn is_enrolled(
        &self,
        user_id: ProfileId,
        course_slug: &str,
    ) -> Result<bool, RepositoryError> {
        let count = self
            .client
            .from(COURSE_ENROLLMENTS)
            .eq("user_id", user_id)
            .eq("course_slug", course_slug)
            .count()
            .await?;
        Ok(count > 0)
    }
}
