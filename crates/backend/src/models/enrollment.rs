//! Course enrollments (`course_enrollments`).

use chrono::{DateTime, Utc};
use numisma_core::{EnrollmentId, ProfileId};
use serde::{Deserialize, Serialize};

/// A user enrolled in a course. `(user_id, course_slug)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: ProfileId,
    pub course_slug: String,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEnrollment {
    pub user_id: ProfileId,
    pub course_slug: String,
}
