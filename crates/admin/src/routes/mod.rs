//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (backend reachable)
//!
//! # Auth
//! POST /api/auth/login                  - Email sign-in (admin role required)
//! POST /api/auth/logout                 - Sign out
//! GET  /api/auth/me                     - Current admin
//!
//! # Dashboard
//! GET  /api/stats                       - Overview counts
//!
//! # Users
//! GET  /api/users                       - Profiles (?search=)
//! GET  /api/users/{id}                  - Profile
//! POST /api/users/{id}/role             - Toggle user/admin
//! PUT  /api/users/{id}/verified         - Set identity verification
//!
//! # Listings
//! GET  /api/listings                    - All listings, any stock
//! GET  /api/listings/{id}               - Listing
//! PATCH /api/listings/{id}              - Edit price, stock, text
//! POST /api/listings/{id}/verify        - Toggle verified badge
//!
//! # Verifications
//! GET  /api/verifications               - Queue (?status=)
//! GET  /api/verifications/{id}          - Submission
//! POST /api/verifications/{id}/review   - Record a decision
//!
//! # Orders
//! GET  /api/orders                      - All orders (?status=)
//! GET  /api/orders/{id}                 - Order with items
//! PUT  /api/orders/{id}/status          - Move along the lifecycle
//!
//! # Newsletter
//! GET  /api/newsletter                  - Subscribers (?subscribed=)
//! ```

pub mod auth;
pub mod dashboard;
pub mod listings;
pub mod newsletter;
pub mod orders;
pub mod users;
pub mod verifications;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use numisma_backend::models::PageRequest;
use serde::Deserialize;

use crate::state::AppState;

/// Rows per page on admin tables.
pub const ADMIN_PAGE_SIZE: u32 = 25;

/// Plain `?page=&limit=` query.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Page request from optional query values, clamped by [`PageRequest::new`].
#[must_use]
pub fn page_request(page: Option<u32>, limit: Option<u32>) -> PageRequest {
    PageRequest::new(page.unwrap_or(1), limit.unwrap_or(ADMIN_PAGE_SIZE))
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::list))
        .route("/{id}", get(users::show))
        .route("/{id}/role", post(users::toggle_role))
        .route("/{id}/verified", put(users::set_verified))
}

fn listing_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(listings::list))
        .route("/{id}", get(listings::show).patch(listings::update))
        .route("/{id}/verify", post(listings::toggle_verified))
}

fn verification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(verifications::list))
        .route("/{id}", get(verifications::show))
        .route("/{id}/review", post(verifications::review))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", put(orders::set_status))
}

/// Create all routes for admin.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .nest("/auth", auth_routes())
        .route("/stats", get(dashboard::stats))
        .nest("/users", user_routes())
        .nest("/listings", listing_routes())
        .nest("/verifications", verification_routes())
        .nest("/orders", order_routes())
        .route("/newsletter", get(newsletter::list));

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api)
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(backend) = state.backend() else {
        return StatusCode::OK;
    };
    match backend.health().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Backend not ready");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
