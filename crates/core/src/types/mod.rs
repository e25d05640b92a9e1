//! Core types for Numisma.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod image;
pub mod phone;
pub mod price;
pub mod rarity;
pub mod rating;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use image::{ImageError, ImageFile, MAX_IMAGE_BYTES};
pub use phone::{PhoneError, PhoneNumber};
pub use price::{Currency, Price};
pub use rarity::Rarity;
pub use rating::{Rating, RatingError};
pub use status::*;
