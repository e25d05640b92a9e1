//! Hosted auth API: email/password, phone OTP and OAuth with PKCE.
//!
//! [`AuthProvider`] is the seam the storefront and admin depend on.
//! [`AuthClient`] binds it to the backend's `/auth/v1` endpoints; the
//! in-memory binding lives in [`crate::memory`].

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use numisma_core::{Email, PhoneNumber, ProfileId};
use rand::Rng;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::client::BackendClient;
use crate::error::BackendError;

/// Country calling code used when sending OTPs to ten-digit numbers.
pub const DEFAULT_COUNTRY_CODE: &str = "91";

// =============================================================================
// Types
// =============================================================================

/// A user as known to the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: ProfileId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Free-form metadata set at signup (`full_name`, `avatar_url`).
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    /// `full_name` from signup metadata or the OAuth identity.
    #[must_use]
    pub fn full_name(&self) -> Option<&str> {
        self.user_metadata
            .get("full_name")
            .or_else(|| self.user_metadata.get("name"))
            .and_then(serde_json::Value::as_str)
    }

    /// Avatar URL from the OAuth identity, if any.
    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.user_metadata
            .get("avatar_url")
            .and_then(serde_json::Value::as_str)
    }
}

/// Tokens issued after a successful sign-in.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until `access_token` expires.
    pub expires_in: u64,
    pub user: AuthUser,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("user", &self.user.id)
            .finish()
    }
}

/// Result of a signup.
#[derive(Debug, Clone)]
pub enum SignUp {
    /// Signed in immediately.
    Session(AuthSession),
    /// Account created; the user must confirm their email first.
    ConfirmationRequired(AuthUser),
}

/// Third-party identity providers offered on the login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
    Facebook,
}

impl OAuthProvider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
            Self::Facebook => "facebook",
        }
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            "facebook" => Ok(Self::Facebook),
            _ => Err(format!("unsupported OAuth provider: {s}")),
        }
    }
}

/// PKCE verifier/challenge pair (RFC 7636, S256).
#[derive(Clone, PartialEq, Eq)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl std::fmt::Debug for Pkce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pkce")
            .field("verifier", &"[REDACTED]")
            .field("challenge", &self.challenge)
            .finish()
    }
}

impl Pkce {
    const VERIFIER_LEN: usize = 64;

    /// Generate a random verifier and its S256 challenge.
    #[must_use]
    pub fn generate() -> Self {
        let verifier: String = rand::rng()
            .sample_iter(rand::distr::Alphanumeric)
            .take(Self::VERIFIER_LEN)
            .map(char::from)
            .collect();
        let challenge = Self::challenge_for(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    /// S256 challenge for a verifier.
    #[must_use]
    pub fn challenge_for(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Failures reported by the auth API.
#[derive(Debug, Error)]
pub enum AuthApiError {
    #[error("invalid login credentials")]
    InvalidCredentials,

    #[error("a user with this email already exists")]
    UserAlreadyExists,

    #[error("password too weak: {0}")]
    WeakPassword(String),

    #[error("verification code is invalid or has expired")]
    InvalidOtp,

    #[error("email address has not been confirmed")]
    EmailNotConfirmed,

    #[error("session expired or invalid")]
    InvalidSession,

    #[error(transparent)]
    Backend(BackendError),
}

impl From<BackendError> for AuthApiError {
    fn from(err: BackendError) -> Self {
        let message = match &err {
            BackendError::Api { message, .. }
            | BackendError::Unauthorized(message)
            | BackendError::NotFound(message) => message.to_lowercase(),
            _ => return Self::Backend(err),
        };

        if message.contains("invalid login credentials") || message.contains("invalid_grant") {
            Self::InvalidCredentials
        } else if message.contains("already registered") || message.contains("already exists") {
            Self::UserAlreadyExists
        } else if message.contains("password should") || message.contains("weak password") {
            Self::WeakPassword(message)
        } else if message.contains("token has expired") || message.contains("otp") {
            Self::InvalidOtp
        } else if message.contains("email not confirmed") {
            Self::EmailNotConfirmed
        } else if matches!(err, BackendError::Unauthorized(_)) || message.contains("jwt") {
            Self::InvalidSession
        } else {
            Self::Backend(err)
        }
    }
}

// =============================================================================
// AuthProvider
// =============================================================================

/// Authentication operations against the hosted auth service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account with email and password.
    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<SignUp, AuthApiError>;

    /// Password grant.
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<AuthSession, AuthApiError>;

    /// Send a one-time code by SMS.
    async fn send_phone_otp(&self, phone: &PhoneNumber) -> Result<(), AuthApiError>;

    /// Exchange an SMS code for a session.
    async fn verify_phone_otp(
        &self,
        phone: &PhoneNumber,
        code: &str,
    ) -> Result<AuthSession, AuthApiError>;

    /// URL to send the browser to for a third-party login.
    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        pkce: &Pkce,
    ) -> Result<Url, AuthApiError>;

    /// Exchange the authorization code returned to the callback.
    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<AuthSession, AuthApiError>;

    /// Issue fresh tokens from a refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthApiError>;

    /// Look up the user an access token belongs to.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthApiError>;

    /// Revoke the session behind an access token.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthApiError>;
}

// =============================================================================
// AuthClient
// =============================================================================

/// [`AuthProvider`] bound to the hosted `/auth/v1` API.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: BackendClient,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(AuthSession),
    User(AuthUser),
}

impl AuthClient {
    #[must_use]
    pub const fn new(client: BackendClient) -> Self {
        Self { client }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<T, AuthApiError> {
        let url = self.client.auth_url(path)?;
        let request = self
            .client
            .request(Method::POST, url)
            .query(query)
            .json(body);
        let response = self.client.send(request).await?;
        Ok(BackendClient::json(response).await?)
    }
}

#[async_trait]
impl AuthProvider for AuthClient {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<SignUp, AuthApiError> {
        let body = serde_json::json!({
            "email": email.as_str(),
            "password": password,
            "data": { "full_name": full_name },
        });
        let response: SignUpResponse = self.post("signup", &[], &body).await?;
        Ok(match response {
            SignUpResponse::Session(session) => SignUp::Session(session),
            SignUpResponse::User(user) => SignUp::ConfirmationRequired(user),
        })
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<AuthSession, AuthApiError> {
        let body = serde_json::json!({ "email": email.as_str(), "password": password });
        self.post("token", &[("grant_type", "password")], &body)
            .await
    }

    #[instrument(skip(self, phone))]
    async fn send_phone_otp(&self, phone: &PhoneNumber) -> Result<(), AuthApiError> {
        let body = serde_json::json!({ "phone": phone.to_e164(DEFAULT_COUNTRY_CODE) });
        let _: serde_json::Value = self.post("otp", &[], &body).await?;
        debug!("OTP requested");
        Ok(())
    }

    #[instrument(skip(self, phone, code))]
    async fn verify_phone_otp(
        &self,
        phone: &PhoneNumber,
        code: &str,
    ) -> Result<AuthSession, AuthApiError> {
        let body = serde_json::json!({
            "type": "sms",
            "phone": phone.to_e164(DEFAULT_COUNTRY_CODE),
            "token": code.trim(),
        });
        self.post("verify", &[], &body).await
    }

    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        pkce: &Pkce,
    ) -> Result<Url, AuthApiError> {
        let mut url = self.client.auth_url("authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", redirect_to)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "s256");
        Ok(url)
    }

    #[instrument(skip(self, code, verifier))]
    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<AuthSession, AuthApiError> {
        let body = serde_json::json!({ "auth_code": code, "code_verifier": verifier });
        self.post("token", &[("grant_type", "pkce")], &body).await
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthApiError> {
        let body = serde_json::json!({ "refresh_token": refresh_token });
        self.post("token", &[("grant_type", "refresh_token")], &body)
            .await
    }

    #[instrument(skip(self, access_token))]
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthApiError> {
        let url = self.client.auth_url("user")?;
        let request = self.client.request_as(Method::GET, url, access_token);
        let response = self.client.send(request).await?;
        Ok(BackendClient::json(response).await?)
    }

    #[instrument(skip(self, access_token))]
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthApiError> {
        let url = self.client.auth_url("logout")?;
        let request = self.client.request_as(Method::POST, url, access_token);
        self.client.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_challenge_rfc7636_vector() {
        // Appendix B of RFC 7636
        let challenge = Pkce::challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_pkce_generate() {
        let pkce = Pkce::generate();
        assert_eq!(pkce.verifier.len(), 64);
        assert_eq!(pkce.challenge, Pkce::challenge_for(&pkce.verifier));
        assert_ne!(pkce.verifier, Pkce::generate().verifier);
        assert!(!format!("{pkce:?}").contains(&pkce.verifier));
    }

    #[test]
    fn test_error_mapping() {
        let err = AuthApiError::from(BackendError::Api {
            status: 400,
            message: "Invalid login credentials".to_string(),
        });
        assert!(matches!(err, AuthApiError::InvalidCredentials));

        let err = AuthApiError::from(BackendError::Api {
            status: 422,
            message: "User already registered".to_string(),
        });
        assert!(matches!(err, AuthApiError::UserAlreadyExists));

        let err = AuthApiError::from(BackendError::Api {
            status: 403,
            message: "Token has expired or is invalid".to_string(),
        });
        assert!(matches!(err, AuthApiError::InvalidOtp));

        let err = AuthApiError::from(BackendError::RateLimited(3));
        assert!(matches!(err, AuthApiError::Backend(BackendError::RateLimited(3))));
    }

    #[test]
    fn test_signup_response_shapes() {
        let user = r#"{"id":"0b5f4f1e-8a3c-4e7e-9d2e-6f1f3c1a2b3c","email":"a@b.co","user_metadata":{"full_name":"Asha"}}"#;
        let parsed: SignUpResponse = serde_json::from_str(user).unwrap();
        match parsed {
            SignUpResponse::User(u) => assert_eq!(u.full_name(), Some("Asha")),
            SignUpResponse::Session(_) => panic!("expected confirmation-required shape"),
        }

        let session = format!(
            r#"{{"access_token":"at","refresh_token":"rt","expires_in":3600,"token_type":"bearer","user":{user}}}"#
        );
        let parsed: SignUpResponse = serde_json::from_str(&session).unwrap();
        assert!(matches!(parsed, SignUpResponse::Session(_)));
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("GitHub".parse::<OAuthProvider>().unwrap(), OAuthProvider::Github);
        assert!("myspace".parse::<OAuthProvider>().is_err());
    }
}
