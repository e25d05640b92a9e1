//! Course catalog and enrollments.

use chrono::{DateTime, Utc};
use numisma_backend::Repositories;
use numisma_backend::RepositoryError;
use numisma_backend::models::{Enrollment, NewEnrollment};
use numisma_backend::repository::EnrollmentRepository;
use numisma_core::ProfileId;
use serde::Serialize;
use tracing::{info, instrument};

use crate::content::{Course, CourseCatalog, CourseSummary};
use crate::error::{AppError, Result};

/// A course the user is enrolled in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourse<'a> {
    pub course: CourseSummary<'a>,
    pub enrolled_at: DateTime<Utc>,
}

pub struct CourseService<'a> {
    catalog: &'a CourseCatalog,
    enrollments: &'a dyn EnrollmentRepository,
}

impl<'a> CourseService<'a> {
    #[must_use]
    pub fn new(catalog: &'a CourseCatalog, repos: &'a Repositories) -> Self {
        Self {
            catalog,
            enrollments: repos.enrollments.as_ref(),
        }
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown slug.
    pub fn get(&self, slug: &str) -> Result<&'a Course> {
        self.catalog
            .get(slug)
            .ok_or_else(|| AppError::NotFound(format!("course {slug}")))
    }

    /// Enroll in a course. Enrolling twice returns the first enrollment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown slug.
    #[instrument(skip(self))]
    pub async fn enroll(&self, user_id: ProfileId, slug: &str) -> Result<Enrollment> {
        let course = self.get(slug)?;
        let new = NewEnrollment {
            user_id,
            course_slug: course.slug.clone(),
        };
        match self.enrollments.enroll(&new).await {
            Ok(enrollment) => {
                info!("Enrolled");
                Ok(enrollment)
            }
            Err(RepositoryError::Conflict(_)) => self
                .enrollments
                .list_for_user(user_id)
                .await?
                .into_iter()
                .find(|e| e.course_slug == course.slug)
                .ok_or(AppError::Repository(RepositoryError::NotFound)),
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    ///
    /// Returns a repository error if the backend query fails.
    pub async fn is_enrolled(&self, user_id: ProfileId, slug: &str) -> Result<bool> {
        Ok(self.enrollments.is_enrolled(user_id, slug).await?)
    }

    /// The user's courses, newest enrollment first. Enrollments for courses
    /// no longer in the catalog are skipped.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the backend query fails.
    pub async fn enrolled(&self, user_id: ProfileId) -> Result<Vec<EnrolledCourse<'a>>> {
        let catalog = self.catalog;
        Ok(self
            .enrollments
            .list_for_user(user_id)
            .await?
            .into_iter()
            .filter_map(|e| {
                catalog.get(&e.course_slug).map(|course| EnrolledCourse {
                    course: course.into(),
                    enrolled_at: e.enrolled_at,
                })
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use numisma_backend::InMemoryBackend;

    use super::*;
    use crate::content::parse_course;

    fn catalog() -> CourseCatalog {
        CourseCatalog::from_courses(vec![
            parse_course(
                "coin-grading-basics".into(),
                "---\ntitle: Coin Grading Basics\ndescription: Sheldon scale.\nprice: 0\n---\nBody",
            )
            .unwrap(),
        ])
    }

    #[tokio::test]
    async fn test_enroll_is_idempotent() {
        let catalog = catalog();
        let repos = InMemoryBackend::new().repositories();
        let service = CourseService::new(&catalog, &repos);
        let user = ProfileId::generate();

        let first = service.enroll(user, "coin-grading-basics").await.unwrap();
        let second = service.enroll(user, "coin-grading-basics").await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(service.is_enrolled(user, "coin-grading-basics").await.unwrap());

        let mine = service.enrolled(user).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].course.title, "Coin Grading Basics");
    }

    #[tokio::test]
    async fn test_unknown_course() {
        let catalog = catalog();
        let repos = InMemoryBackend::new().repositories();
        let service = CourseService::new(&catalog, &repos);
        assert!(matches!(
            service.enroll(ProfileId::generate(), "nope").await,
            Err(AppError::NotFound(_))
        ));
    }
}
