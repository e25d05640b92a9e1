//! HTTP middleware stack for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (added by the binary)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions, in memory, SameSite=Strict)
//! 4. [`RequireAdmin`] on every route except health and login

pub mod auth;
pub mod session;

pub use auth::{AdminRejection, RequireAdmin};
pub use session::create_session_layer;
