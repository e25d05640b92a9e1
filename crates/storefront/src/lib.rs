//! Numisma storefront library.
//!
//! The marketplace, course and verification JSON API as a library, so the
//! binary and the integration tests build the same [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod content;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod search;
pub mod services;
pub mod state;
pub mod verification;

use axum::Router;
use axum::http::Request;
use tower_http::trace::TraceLayer;

use routes::RateLimits;
use state::AppState;

/// The storefront router with sessions, request ids and request tracing.
///
/// Rate limiting needs a client address from the fronting proxy, so it is
/// only switched on when `limits` is given.
pub fn app(state: AppState, limits: Option<RateLimits>) -> Router {
    let session_layer = middleware::create_session_layer(state.config());

    routes::routes(limits)
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<axum::body::Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
