//! Session-related types.
//!
//! Types stored in the session for authentication state and the cart and
//! wishlist snapshots used for badge counts.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use numisma_backend::AuthSession;
use numisma_backend::models::Profile;
use numisma_core::{CoinId, Email, PhoneNumber, ProfileId, Role};
use serde::{Deserialize, Serialize};

/// Seconds before expiry at which the access token is refreshed.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Session-stored user identity and backend tokens.
///
/// Tokens stay server-side in the session store; the cookie only carries the
/// session id.
#[derive(Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: ProfileId,
    pub email: Option<Email>,
    pub phone: Option<PhoneNumber>,
    pub full_name: Option<String>,
    pub role: Role,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for CurrentUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl CurrentUser {
    /// Build from a fresh auth session and the user's profile row.
    #[must_use]
    pub fn new(session: &AuthSession, profile: &Profile) -> Self {
        let expires_in = i64::try_from(session.expires_in).unwrap_or(i64::MAX);
        Self {
            id: profile.id,
            email: profile.email.clone(),
            phone: profile.phone.clone(),
            full_name: profile.full_name.clone(),
            role: profile.role,
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: Utc::now() + Duration::seconds(expires_in),
        }
    }

    /// Replace the tokens after a refresh.
    pub fn rotate(&mut self, session: &AuthSession) {
        let expires_in = i64::try_from(session.expires_in).unwrap_or(i64::MAX);
        self.access_token.clone_from(&session.access_token);
        self.refresh_token.clone_from(&session.refresh_token);
        self.expires_at = Utc::now() + Duration::seconds(expires_in);
    }

    /// Whether the access token expires within the refresh margin.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now < Duration::seconds(REFRESH_MARGIN_SECS)
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

/// Coin id to quantity, mirrored from the user's cart rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot(pub BTreeMap<CoinId, u32>);

impl CartSnapshot {
    /// Total units across every line.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.0.values().copied().fold(0, u32::saturating_add)
    }

    #[must_use]
    pub fn quantity(&self, coin_id: CoinId) -> u32 {
        self.0.get(&coin_id).copied().unwrap_or(0)
    }
}

/// Coin ids on the user's wishlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistSnapshot(pub BTreeSet<CoinId>);

impl WishlistSnapshot {
    #[must_use]
    pub fn count(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn contains(&self, coin_id: CoinId) -> bool {
        self.0.contains(&coin_id)
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the PKCE verifier of an in-flight OAuth sign-in.
    pub const OAUTH_VERIFIER: &str = "oauth_verifier";

    /// Key for the OAuth `state` value (CSRF protection).
    pub const OAUTH_STATE: &str = "oauth_state";

    /// Key for the cart snapshot.
    pub const CART_SNAPSHOT: &str = "cart_snapshot";

    /// Key for the wishlist snapshot.
    pub const WISHLIST_SNAPSHOT: &str = "wishlist_snapshot";

    /// Key for the verification wizard draft id.
    pub const VERIFICATION_DRAFT: &str = "verification_draft";
}
