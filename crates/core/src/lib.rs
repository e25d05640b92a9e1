//! Numisma Core - Shared types library.
//!
//! This crate provides common types used across all Numisma components:
//! - `backend` - Client and repositories for the hosted backend
//! - `storefront` - Public marketplace, courses and verification API
//! - `admin` - Internal administration dashboard
//! - `cli` - Command-line tools for seeding and management
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, phones, ratings,
//!   image blobs and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
