//! HTTP route handlers for the storefront JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (backend reachable)
//!
//! # Auth (auth rate limit)
//! POST /api/auth/signup                 - Email signup
//! POST /api/auth/login                  - Email sign-in
//! GET  /api/auth/oauth/{provider}       - Redirect to OAuth provider
//! GET  /api/auth/callback               - OAuth callback
//! POST /api/auth/logout                 - Sign out
//! GET  /api/auth/me                     - Current user and badge counts
//! POST /api/auth/otp/send               - Send SMS code (OTP rate limit)
//! POST /api/auth/otp/verify             - Sign in with SMS code (OTP rate limit)
//!
//! # Marketplace
//! GET  /api/coins                       - Browse listings
//! POST /api/coins                       - New listing (multipart)
//! GET  /api/coins/{id}                  - Listing detail
//! GET  /api/coins/{id}/reviews          - Reviews
//! POST /api/coins/{id}/reviews          - Add review
//!
//! # Cart and wishlist
//! GET  /api/cart                        - Cart with totals
//! POST /api/cart                        - Add coin
//! DELETE /api/cart                      - Empty cart
//! GET  /api/cart/count                  - Badge count
//! PATCH /api/cart/{coin_id}             - Set quantity
//! DELETE /api/cart/{coin_id}            - Remove coin
//! GET  /api/wishlist                    - Saved coins
//! POST /api/wishlist                    - Save coin
//! DELETE /api/wishlist/{coin_id}        - Unsave coin
//!
//! # Orders
//! POST /api/checkout                    - Place order from cart
//! GET  /api/orders                      - Order history
//! GET  /api/orders/{id}                 - Order with items
//! POST /api/orders/{id}/cancel          - Cancel pending order
//! POST /api/orders/{id}/confirm-payment - Report payment made
//! POST /api/orders/{id}/payment         - New payment code for a pending order
//!
//! # Account
//! GET  /api/account/profile             - Profile
//! PATCH /api/account/profile            - Update profile
//! POST /api/account/avatar              - Upload avatar (multipart)
//! GET  /api/account/notifications       - In-app inbox
//!
//! # Courses
//! GET  /api/courses                     - Catalog (?level=)
//! GET  /api/courses/mine                - Enrolled courses
//! GET  /api/courses/{slug}              - Course detail
//! POST /api/courses/{slug}/enroll       - Enroll
//!
//! # Verification wizard
//! POST /api/verification                - Start draft
//! GET  /api/verification                - Current draft
//! PUT  /api/verification/details        - Name, phone, coin count
//! POST /api/verification/advance        - Details -> Upload
//! POST /api/verification/photos         - Attach photo (multipart)
//! POST /api/verification/back           - Return to earlier step
//! POST /api/verification/pay            - Upload -> Payment
//! POST /api/verification/submit         - Payment -> Success
//! GET  /api/verification/mine           - Past submissions
//!
//! # Search and newsletter
//! GET  /api/search                      - Quick search
//! GET  /api/search/resolve              - Enter-key target
//! GET  /api/newsletter                  - Subscription status
//! POST /api/newsletter                  - Subscribe
//! POST /api/newsletter/unsubscribe      - Unsubscribe
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod courses;
pub mod marketplace;
pub mod newsletter;
pub mod orders;
pub mod search;
pub mod upload;
pub mod verification;
pub mod wishlist;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{delete, get, patch, post, put},
};
use numisma_core::MAX_IMAGE_BYTES;

use crate::middleware::rate_limit::RateLimiterLayer;
use crate::services::marketplace::MAX_LISTING_IMAGES;
use crate::state::AppState;
use upload::FORM_OVERHEAD_BYTES;

/// Per-group rate limiters. The binary supplies them; tests run without.
pub struct RateLimits {
    pub auth: RateLimiterLayer,
    pub otp: RateLimiterLayer,
    pub api: RateLimiterLayer,
}

/// Body limit for a form carrying `photos` images.
fn upload_limit(photos: usize) -> DefaultBodyLimit {
    DefaultBodyLimit::max(MAX_IMAGE_BYTES * photos + FORM_OVERHEAD_BYTES)
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/oauth/{provider}", get(auth::oauth_start))
        .route("/callback", get(auth::oauth_callback))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the phone OTP routes router.
pub fn otp_routes() -> Router<AppState> {
    Router::new()
        .route("/send", post(auth::send_otp))
        .route("/verify", post(auth::verify_otp))
}

fn coin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(marketplace::browse)
                .post(marketplace::create)
                .layer(upload_limit(MAX_LISTING_IMAGES)),
        )
        .route("/{id}", get(marketplace::detail))
        .route(
            "/{id}/reviews",
            get(marketplace::reviews).post(marketplace::add_review),
        )
}

fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add).delete(cart::clear))
        .route("/count", get(cart::badge))
        .route("/{coin_id}", patch(cart::update).delete(cart::remove))
}

fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::show).post(wishlist::add))
        .route("/{coin_id}", delete(wishlist::remove))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/confirm-payment", post(orders::confirm_payment))
        .route("/{id}/payment", post(orders::reissue_payment))
}

fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(account::profile).patch(account::update_profile),
        )
        .route(
            "/avatar",
            post(account::upload_avatar).layer(upload_limit(1)),
        )
        .route("/notifications", get(account::notifications))
}

fn course_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(courses::index))
        .route("/mine", get(courses::mine))
        .route("/{slug}", get(courses::show))
        .route("/{slug}/enroll", post(courses::enroll))
}

fn verification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(verification::show).post(verification::start))
        .route("/details", put(verification::details))
        .route("/advance", post(verification::advance))
        .route(
            "/photos",
            post(verification::attach).layer(upload_limit(1)),
        )
        .route("/back", post(verification::back))
        .route("/pay", post(verification::pay))
        .route("/submit", post(verification::submit))
        .route("/mine", get(verification::mine))
}

/// Everything under `/api` except auth.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/coins", coin_routes())
        .nest("/cart", cart_routes())
        .nest("/wishlist", wishlist_routes())
        .route("/checkout", post(orders::place))
        .nest("/orders", order_routes())
        .nest("/account", account_routes())
        .nest("/courses", course_routes())
        .nest("/verification", verification_routes())
        .route("/search", get(search::search))
        .route("/search/resolve", get(search::resolve))
        .route(
            "/newsletter",
            get(newsletter::status).post(newsletter::subscribe),
        )
        .route("/newsletter/unsubscribe", post(newsletter::unsubscribe))
}

/// Create all routes for the storefront.
pub fn routes(limits: Option<RateLimits>) -> Router<AppState> {
    let (auth, otp, api) = match limits {
        Some(limits) => (
            auth_routes().layer(limits.auth),
            otp_routes().layer(limits.otp),
            api_routes().layer(limits.api),
        ),
        None => (auth_routes(), otp_routes(), api_routes()),
    };

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api.nest("/auth", auth.nest("/otp", otp)))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Checks the hosted backend; always ready in memory mode.
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
