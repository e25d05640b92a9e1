//! Session-held models for the storefront.
//!
//! Persistent records live in `numisma_backend::models`; this module only
//! holds what the storefront keeps in the session between requests.

pub mod session;

pub use session::{CartSnapshot, CurrentUser, WishlistSnapshot, keys as session_keys};
