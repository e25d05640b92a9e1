//! Course route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use numisma_backend::models::Enrollment;
use serde::{Deserialize, Serialize};

use crate::content::{Course, CourseLevel, CourseSummary};
use crate::error::Result;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::services::courses::CourseService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LevelQuery {
    pub level: Option<CourseLevel>,
}

/// A course page with the viewer's enrollment state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail<'a> {
    #[serde(flatten)]
    pub course: &'a Course,
    pub enrolled: bool,
}

/// `GET /api/courses?level=beginner`
pub async fn index(State(state): State<AppState>, Query(query): Query<LevelQuery>) -> Response {
    let courses: Vec<CourseSummary<'_>> = state
        .courses()
        .by_level(query.level)
        .map(CourseSummary::from)
        .collect();
    Json(courses).into_response()
}

/// `GET /api/courses/{slug}`
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(slug): Path<String>,
) -> Result<Response> {
    let service = CourseService::new(state.courses(), state.repos());
    let course = service.get(&slug)?;
    let enrolled = match &user {
        Some(user) => service.is_enrolled(user.id, &slug).await?,
        None => false,
    };
    Ok(Json(CourseDetail { course, enrolled }).into_response())
}

/// `POST /api/courses/{slug}/enroll`
pub async fn enroll(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
) -> Result<(StatusCode, Json<Enrollment>)> {
    let enrollment = CourseService::new(state.courses(), state.repos())
        .enroll(user.id, &slug)
        .await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// `GET /api/courses/mine`
pub async fn mine(State(state): State<AppState>, RequireAuth(user): RequireAuth) -> Result<Response> {
    let enrolled = CourseService::new(state.courses(), state.repos())
        .enrolled(user.id)
        .await?;
    Ok(Json(enrolled).into_response())
}
