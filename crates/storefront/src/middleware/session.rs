//! Session layer configuration.
//!
//! Sessions are held in process memory: the cookie carries only the session
//! id, while backend tokens and snapshots stay server-side. A restart signs
//! everyone out.

use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "numisma_session";

/// Idle time before a session expires (7 days).
const SESSION_IDLE_DAYS: i64 = 7;

/// Create the session layer.
///
/// `SameSite=Lax` so the OAuth callback, a top-level redirect from the
/// provider, still carries the cookie holding the PKCE verifier.
#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::days(SESSION_IDLE_DAYS)))
        .with_secure(config.is_secure())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
