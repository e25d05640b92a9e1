use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use chrono::Utc;
use numisma_core::{Email, PhoneNumber, ProfileId};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::info;
use url::Url;

use crate::auth::{AuthApiError, AuthProvider, AuthSession, AuthUser, OAuthProvider, Pkce, SignUp};
use crate::error::BackendError;

const MIN_PASSWORD_LEN: usize = 6;
const TOKEN_LEN: usize = 40;
const SESSION_SECS: u64 = 3600;

#[derive(Default)]
struct AuthState {
    /// email -> (user, password digest)
    accounts: HashMap<String, (AuthUser, String)>,
    /// ten-digit phone -> user
    phone_users: HashMap<String, AuthUser>,
    /// ten-digit phone -> pending code
    otps: HashMap<String, String>,
    /// authorization code -> (challenge, user)
    oauth_codes: HashMap<String, (String, AuthUser)>,
    /// access token -> user
    sessions: HashMap<String, AuthUser>,
    /// refresh token -> user
    refresh_tokens: HashMap<String, AuthUser>,
}

/// [`AuthProvider`] held in memory.
///
/// Signups sign in immediately. OTP codes are logged and readable through
/// [`InMemoryAuth::last_otp`]. OAuth "providers" approve at once: the
/// authorize URL is the caller's redirect with a `code` already attached.
#[derive(Clone, Default)]
pub struct InMemoryAuth {
    state: Arc<RwLock<AuthState>>,
}

fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(rand::distr::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn digest(password: &str) -> String {
    STANDARD_NO_PAD.encode(Sha256::digest(password.as_bytes()))
}

fn unavailable<E: std::fmt::Display>(e: E) -> AuthApiError {
    AuthApiError::Backend(BackendError::Api {
        status: 500,
        message: format!("auth state unavailable: {e}"),
    })
}

fn new_user(email: Option<String>, phone: Option<String>, full_name: Option<&str>) -> AuthUser {
    AuthUser {
        id: ProfileId::generate(),
        email,
        phone,
        user_metadata: serde_json::json!({ "full_name": full_name }),
        email_confirmed_at: Some(Utc::now()),
        created_at: Some(Utc::now()),
    }
}

impl InMemoryAuth {
    /// Most recent OTP code sent to `phone`.
    #[must_use]
    pub fn last_otp(&self, phone: &PhoneNumber) -> Option<String> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.otps.get(phone.as_str()).cloned())
    }

    fn issue(&self, user: AuthUser) -> Result<AuthSession, AuthApiError> {
        let session = AuthSession {
            access_token: random_token(TOKEN_LEN),
            refresh_token: random_token(TOKEN_LEN),
            expires_in: SESSION_SECS,
            user,
        };
        let mut state = self.state.write().map_err(unavailable)?;
        state
            .sessions
            .insert(session.access_token.clone(), session.user.clone());
        state
            .refresh_tokens
            .insert(session.refresh_token.clone(), session.user.clone());
        Ok(session)
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuth {
    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<SignUp, AuthApiError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthApiError::WeakPassword(format!(
                "password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let user = {
            let mut state = self.state.write().map_err(unavailable)?;
            if state.accounts.contains_key(email.as_str()) {
                return Err(AuthApiError::UserAlreadyExists);
            }
            let user = new_user(Some(email.to_string()), None, full_name);
            state
                .accounts
                .insert(email.to_string(), (user.clone(), digest(password)));
            user
        };
        Ok(SignUp::Session(self.issue(user)?))
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<AuthSession, AuthApiError> {
        let user = {
            let state = self.state.read().map_err(unavailable)?;
            match state.accounts.get(email.as_str()) {
                Some((user, stored)) if *stored == digest(password) => user.clone(),
                _ => return Err(AuthApiError::InvalidCredentials),
            }
        };
        self.issue(user)
    }

    async fn send_phone_otp(&self, phone: &PhoneNumber) -> Result<(), AuthApiError> {
        let code = format!("{:06}", rand::rng().random_range(0..1_000_000));
        info!(phone = %phone, code = %code, "OTP issued (in-memory auth)");
        self.state
            .write()
            .map_err(unavailable)?
            .otps
            .insert(phone.as_str().to_string(), code);
        Ok(())
    }

    async fn verify_phone_otp(
        &self,
        phone: &PhoneNumber,
        code: &str,
    ) -> Result<AuthSession, AuthApiError> {
        let user = {
            let mut state = self.state.write().map_err(unavailable)?;
            match state.otps.get(phone.as_str()) {
                Some(expected) if expected == code.trim() => {}
                _ => return Err(AuthApiError::InvalidOtp),
            }
            state.otps.remove(phone.as_str());
            state
                .phone_users
                .entry(phone.as_str().to_string())
                .or_insert_with(|| new_user(None, Some(phone.to_string()), None))
                .clone()
        };
        self.issue(user)
    }

    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        pkce: &Pkce,
    ) -> Result<Url, AuthApiError> {
        let mut url = Url::parse(redirect_to).map_err(|e| AuthApiError::Backend(e.into()))?;
        let email = format!("{}.user@numisma.test", provider.as_str());
        let code = random_token(TOKEN_LEN);
        {
            let mut state = self.state.write().map_err(unavailable)?;
            let user = state
                .accounts
                .get(&email)
                .map(|(user, _)| user.clone())
                .unwrap_or_else(|| new_user(Some(email.clone()), None, Some("OAuth Collector")));
            state
                .accounts
                .entry(email)
                .or_insert_with(|| (user.clone(), String::new()));
            state
                .oauth_codes
                .insert(code.clone(), (pkce.challenge.clone(), user));
        }
        url.query_pairs_mut().append_pair("code", &code);
        Ok(url)
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<AuthSession, AuthApiError> {
        let user = {
            let mut state = self.state.write().map_err(unavailable)?;
            let Some((challenge, user)) = state.oauth_codes.remove(code) else {
                return Err(AuthApiError::InvalidCredentials);
            };
            if Pkce::challenge_for(verifier) != challenge {
                return Err(AuthApiError::InvalidCredentials);
            }
            user
        };
        self.issue(user)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthApiError> {
        let user = self
            .state
            .write()
            .map_err(unavailable)?
            .refresh_tokens
            .remove(refresh_token)
            .ok_or(AuthApiError::InvalidSession)?;
        self.issue(user)
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthApiError> {
        self.state
            .read()
            .map_err(unavailable)?
            .sessions
            .get(access_token)
            .cloned()
            .ok_or(AuthApiError::InvalidSession)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthApiError> {
        self.state
            .write()
            .map_err(unavailable)?
            .sessions
            .remove(access_token);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_password_flow() {
        let auth = InMemoryAuth::default();
        let email = Email::parse("asha@numisma.test").unwrap();

        assert!(matches!(
            auth.sign_up(&email, "abc", None).await,
            Err(AuthApiError::WeakPassword(_))
        ));
        let SignUp::Session(session) = auth.sign_up(&email, "hunter22", Some("Asha")).await.unwrap()
        else {
            panic!("in-memory signup signs in immediately");
        };
        assert_eq!(session.user.full_name(), Some("Asha"));
        assert!(matches!(
            auth.sign_up(&email, "hunter22", None).await,
            Err(AuthApiError::UserAlreadyExists)
        ));

        assert!(matches!(
            auth.sign_in_with_password(&email, "wrong-pw").await,
            Err(AuthApiError::InvalidCredentials)
        ));
        let again = auth.sign_in_with_password(&email, "hunter22").await.unwrap();
        assert_eq!(again.user.id, session.user.id);

        auth.sign_out(&again.access_token).await.unwrap();
        assert!(auth.get_user(&again.access_token).await.is_err());
    }

    #[tokio::test]
    async fn test_otp_flow() {
        let auth = InMemoryAuth::default();
        let phone = PhoneNumber::parse("98765-43210").unwrap();
        auth.send_phone_otp(&phone).await.unwrap();

        assert!(matches!(
            auth.verify_phone_otp(&phone, "not-it").await,
            Err(AuthApiError::InvalidOtp)
        ));
        let code = auth.last_otp(&phone).unwrap();
        let session = auth.verify_phone_otp(&phone, &code).await.unwrap();
        assert_eq!(session.user.phone.as_deref(), Some("9876543210"));
        assert!(auth.verify_phone_otp(&phone, &code).await.is_err());
    }

    #[tokio::test]
    async fn test_oauth_requires_matching_verifier() {
        let auth = InMemoryAuth::default();
        let pkce = Pkce::generate();
        let url = auth
            .oauth_authorize_url(OAuthProvider::Google, "http://localhost:3000/auth/callback", &pkce)
            .unwrap();
        let code = url
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        assert!(auth.exchange_code(&code, "wrong").await.is_err());

        let url = auth
            .oauth_authorize_url(OAuthProvider::Google, "http://localhost:3000/auth/callback", &pkce)
            .unwrap();
        let code = url
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        let session = auth.exchange_code(&code, &pkce.verifier).await.unwrap();
        assert_eq!(session.user.email.as_deref(), Some("google.user@numisma.test"));
    }

    #[tokio::test]
    async fn test_refresh_rotates() {
        let auth = InMemoryAuth::default();
        let email = Email::parse("r@numisma.test").unwrap();
        let SignUp::Session(session) = auth.sign_up(&email, "secret1", None).await.unwrap() else {
            panic!("expected session");
        };
        let refreshed = auth.refresh(&session.refresh_token).await.unwrap();
        assert_eq!(refreshed.user.id, session.user.id);
        assert!(auth.refresh(&session.refresh_token).await.is_err());
    }
}
