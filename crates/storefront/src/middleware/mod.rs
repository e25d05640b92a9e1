//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request spans)
//! 3. Request id (recorded on the span, echoed in the response)
//! 4. Session layer (tower-sessions, in-memory store)
//! 5. Rate limiting (governor), per route group
//!
//! The auth extractors in [`auth`] run inside handlers, after all layers.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{AuthRejection, OptionalAuth, RequireAuth, clear_current_user, set_current_user};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter, otp_rate_limiter};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
