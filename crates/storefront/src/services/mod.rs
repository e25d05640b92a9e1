//! Domain services behind the route handlers.
//!
//! Services borrow what they need from [`crate::state::AppState`] for the
//! length of one request: `XService::new(&state.repos)` and so on. They hold
//! no state of their own.

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod courses;
pub mod marketplace;
pub mod newsletter;
pub mod notification;
pub mod optimistic;
pub mod payment;
pub mod profile;
pub mod reviews;
pub mod verification;
pub mod wishlist;
