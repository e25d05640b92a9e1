//! Session-related types for admin authentication.

use numisma_backend::models::Profile;
use numisma_core::{Email, ProfileId};
use serde::{Deserialize, Serialize};

/// Session-stored admin identity.
///
/// The access token is kept only so logout can revoke it; admin queries run
/// with the service key.
#[derive(Clone, Serialize, Deserialize)]
pub struct CurrentAdmin {
    /// Profile id (same as the auth user id).
    pub id: ProfileId,
    pub email: Option<Email>,
    /// Display name.
    pub name: String,
    pub access_token: String,
}

impl std::fmt::Debug for CurrentAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentAdmin")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl CurrentAdmin {
    #[must_use]
    pub fn new(profile: &Profile, access_token: String) -> Self {
        Self {
            id: profile.id,
            email: profile.email.clone(),
            name: profile.display_name(),
            access_token,
        }
    }
}

/// Session keys for admin authentication data.
pub mod keys {
    /// Key for storing the current logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";
}
