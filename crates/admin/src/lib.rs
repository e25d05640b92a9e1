//! Numisma admin library.
//!
//! The admin dashboard API as a library, so the binary and the integration
//! tests build the same [`app`].
//!
//! # Security
//!
//! This crate runs with the backend's service key, which bypasses row-level
//! policies. Every route except health and login requires a profile with the
//! admin role.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

use state::AppState;

/// The admin router with sessions and request tracing.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config());

    routes::routes()
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
