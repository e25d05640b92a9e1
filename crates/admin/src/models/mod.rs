//! Session-held models for admin.
//!
//! Persistent records live in `numisma_backend::models`.

pub mod session;

pub use session::{CurrentAdmin, keys as session_keys};
