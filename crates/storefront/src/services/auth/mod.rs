//! Authentication service.
//!
//! Wraps the hosted auth API (email/password, phone OTP, OAuth with PKCE)
//! and makes sure every signed-in user has a `profiles` row.

mod error;

pub use error::AuthError;

use numisma_backend::models::{NewProfile, Profile};
use numisma_backend::repository::ProfileRepository;
use numisma_backend::{
    AuthApiError, AuthProvider, AuthSession, OAuthProvider, Pkce, Repositories, RepositoryError,
    SignUp,
};
use numisma_core::{Email, PhoneNumber};
use rand::Rng;
use tracing::{info, instrument, warn};
use url::Url;

use crate::models::CurrentUser;

/// Length of the random OAuth `state` parameter.
const STATE_LEN: usize = 32;

/// Result of an email signup.
#[derive(Debug)]
pub enum SignUpOutcome {
    /// Signed in immediately.
    SignedIn(CurrentUser),
    /// The user must confirm their email before signing in.
    ConfirmationRequired { email: Email },
}

/// An OAuth sign-in waiting for the provider callback.
///
/// `verifier` and `state` belong in the session until the callback arrives.
#[derive(Debug)]
pub struct OAuthStart {
    pub authorize_url: Url,
    pub verifier: String,
    pub state: String,
}

/// Authentication service.
pub struct AuthService<'a> {
    auth: &'a dyn AuthProvider,
    profiles: &'a dyn ProfileRepository,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(repos: &'a Repositories) -> Self {
        Self {
            auth: repos.auth.as_ref(),
            profiles: repos.profiles.as_ref(),
        }
    }

    // =========================================================================
    // Email and password
    // =========================================================================

    /// Register with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed email,
    /// `AuthError::PasswordMismatch` when the confirmation differs, and the
    /// auth API's refusal otherwise (weak password, existing account).
    #[instrument(skip(self, password, confirm_password))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        confirm_password: &str,
        full_name: Option<&str>,
    ) -> Result<SignUpOutcome, AuthError> {
        let email = Email::parse(email)?;
        if password != confirm_password {
            return Err(AuthError::PasswordMismatch);
        }
        let full_name = full_name.map(str::trim).filter(|n| !n.is_empty());

        match self.auth.sign_up(&email, password, full_name).await? {
            SignUp::Session(session) => {
                let user = self.start_session(&session).await?;
                info!(user_id = %user.id, "User signed up");
                Ok(SignUpOutcome::SignedIn(user))
            }
            SignUp::ConfirmationRequired(_) => {
                info!(email = %email, "Signup awaiting email confirmation");
                Ok(SignUpOutcome::ConfirmationRequired { email })
            }
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Api(InvalidCredentials)` for a wrong email or
    /// password.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<CurrentUser, AuthError> {
        let email = Email::parse(email)?;
        let session = self.auth.sign_in_with_password(&email, password).await?;
        self.start_session(&session).await
    }

    // =========================================================================
    // Phone OTP
    // =========================================================================

    /// Send a one-time code by SMS. Returns the normalized number.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidPhone` unless the number has ten digits.
    #[instrument(skip(self))]
    pub async fn send_otp(&self, phone: &str) -> Result<PhoneNumber, AuthError> {
        let phone = PhoneNumber::parse(phone)?;
        self.auth.send_phone_otp(&phone).await?;
        info!("OTP sent");
        Ok(phone)
    }

    /// Sign in with the code sent by [`Self::send_otp`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCode` for a blank code and
    /// `AuthError::Api(InvalidOtp)` for a wrong or expired one.
    #[instrument(skip(self, code))]
    pub async fn verify_otp(&self, phone: &str, code: &str) -> Result<CurrentUser, AuthError> {
        let phone = PhoneNumber::parse(phone)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::MissingCode);
        }
        let session = self.auth.verify_phone_otp(&phone, code).await?;
        self.start_session(&session).await
    }

    // =========================================================================
    // OAuth
    // =========================================================================

    /// Build the provider redirect for a third-party sign-in.
    ///
    /// The `state` value travels in the callback URL and must come back
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns an auth API error if the authorize URL cannot be built.
    pub fn oauth_start(
        &self,
        provider: OAuthProvider,
        callback_url: &Url,
    ) -> Result<OAuthStart, AuthError> {
        let pkce = Pkce::generate();
        let state: String = rand::rng()
            .sample_iter(rand::distr::Alphanumeric)
            .take(STATE_LEN)
            .map(char::from)
            .collect();

        let mut redirect = callback_url.clone();
        redirect.query_pairs_mut().append_pair("state", &state);

        let authorize_url = self
            .auth
            .oauth_authorize_url(provider, redirect.as_str(), &pkce)?;

        Ok(OAuthStart {
            authorize_url,
            verifier: pkce.verifier,
            state,
        })
    }

    /// Finish a third-party sign-in from the callback parameters.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StateMismatch` when `state` differs from the
    /// stored value and `AuthError::MissingCode` without a code.
    #[instrument(skip_all)]
    pub async fn oauth_finish(
        &self,
        code: Option<&str>,
        state: Option<&str>,
        expected_state: &str,
        verifier: &str,
    ) -> Result<CurrentUser, AuthError> {
        if state != Some(expected_state) {
            warn!("OAuth callback state mismatch");
            return Err(AuthError::StateMismatch);
        }
        let code = code
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingCode)?;

        let session = self.auth.exchange_code(code, verifier).await?;
        self.start_session(&session).await
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Rotate the user's tokens.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Api(InvalidSession)` when the refresh token was
    /// revoked; the caller should sign the user out.
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn refresh(&self, user: &mut CurrentUser) -> Result<(), AuthError> {
        let session = self.auth.refresh(&user.refresh_token).await?;
        user.rotate(&session);
        Ok(())
    }

    /// Revoke the user's backend session.
    ///
    /// An already-invalid session counts as signed out.
    ///
    /// # Errors
    ///
    /// Returns the auth API error for any other failure.
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn sign_out(&self, user: &CurrentUser) -> Result<(), AuthError> {
        match self.auth.sign_out(&user.access_token).await {
            Ok(()) | Err(AuthApiError::InvalidSession) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch the user's profile, creating it on first sign-in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the profile cannot be read or
    /// created.
    pub async fn ensure_profile(&self, session: &AuthSession) -> Result<Profile, AuthError> {
        let user = &session.user;
        if let Some(profile) = self.profiles.get(user.id).await? {
            return Ok(profile);
        }

        let new = NewProfile {
            id: user.id,
            full_name: user.full_name().map(ToString::to_string),
            email: user.email.as_deref().and_then(|e| Email::parse(e).ok()),
            phone: user.phone.as_deref().and_then(|p| PhoneNumber::parse(p).ok()),
            avatar_url: user.avatar_url().map(ToString::to_string),
        };

        match self.profiles.create(&new).await {
            Ok(profile) => {
                info!(user_id = %profile.id, "Profile created");
                Ok(profile)
            }
            // Created by a concurrent sign-in.
            Err(RepositoryError::Conflict(_)) => self
                .profiles
                .get(user.id)
                .await?
                .ok_or(AuthError::Repository(RepositoryError::NotFound)),
            Err(e) => Err(e.into()),
        }
    }

    async fn start_session(&self, session: &AuthSession) -> Result<CurrentUser, AuthError> {
        let profile = self.ensure_profile(session).await?;
        Ok(CurrentUser::new(session, &profile))
    }
}

/// Where to send the user after sign-in.
///
/// Only same-site absolute paths are honoured; anything else falls back to
/// `/`.
#[must_use]
pub fn safe_redirect(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.contains("://") =>
        {
            path
        }
        _ => "/",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use numisma_backend::InMemoryBackend;
    use numisma_core::Role;

    use super::*;

    #[test]
    fn test_safe_redirect() {
        assert_eq!(safe_redirect(Some("/account/orders")), "/account/orders");
        assert_eq!(safe_redirect(Some("//evil.example")), "/");
        assert_eq!(safe_redirect(Some("https://evil.example")), "/");
        assert_eq!(safe_redirect(Some("/\\evil.example")), "/");
        assert_eq!(safe_redirect(Some("account")), "/");
        assert_eq!(safe_redirect(None), "/");
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile() {
        let backend = InMemoryBackend::new();
        let repos = backend.repositories();
        let service = AuthService::new(&repos);

        let outcome = service
            .sign_up("asha@example.com", "secret123", "secret123", Some(" Asha Rao "))
            .await
            .unwrap();
        let SignUpOutcome::SignedIn(user) = outcome else {
            panic!("expected immediate sign-in");
        };
        assert_eq!(user.role, Role::User);

        let profile = repos.profiles.get(user.id).await.unwrap().unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Asha Rao"));

        // Signing in again reuses the profile.
        let again = service
            .sign_in("asha@example.com", "secret123")
            .await
            .unwrap();
        assert_eq!(again.id, user.id);
    }

    #[tokio::test]
    async fn test_sign_up_rejects_mismatch_and_bad_email() {
        let repos = InMemoryBackend::new().repositories();
        let service = AuthService::new(&repos);

        assert!(matches!(
            service.sign_up("a@example.com", "secret123", "secret124", None).await,
            Err(AuthError::PasswordMismatch)
        ));
        assert!(matches!(
            service.sign_up("not-an-email", "secret123", "secret123", None).await,
            Err(AuthError::InvalidEmail(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let repos = InMemoryBackend::new().repositories();
        let service = AuthService::new(&repos);
        service
            .sign_up("a@example.com", "secret123", "secret123", None)
            .await
            .unwrap();

        assert!(matches!(
            service.sign_in("a@example.com", "wrong-pass").await,
            Err(AuthError::Api(AuthApiError::InvalidCredentials))
        ));
    }

    #[tokio::test]
    async fn test_phone_otp_flow() {
        let backend = InMemoryBackend::new();
        let repos = backend.repositories();
        let service = AuthService::new(&repos);

        let err = service.send_otp("+91 98765-43210").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidPhone(_)));

        let phone = service.send_otp("(987) 654-3210").await.unwrap();
        let code = backend.auth().last_otp(&phone).unwrap();

        assert!(matches!(
            service.verify_otp("9876543210", " ").await,
            Err(AuthError::MissingCode)
        ));
        let user = service.verify_otp("9876543210", &code).await.unwrap();
        assert_eq!(user.phone, Some(phone));
    }

    #[tokio::test]
    async fn test_oauth_round_trip() {
        let repos = InMemoryBackend::new().repositories();
        let service = AuthService::new(&repos);
        let callback = Url::parse("http://localhost:3000/api/auth/oauth/callback").unwrap();

        let start = service
            .oauth_start(OAuthProvider::Github, &callback)
            .unwrap();
        let params: std::collections::HashMap<_, _> =
            start.authorize_url.query_pairs().into_owned().collect();
        assert_eq!(params.get("state"), Some(&start.state));
        let code = params.get("code").unwrap();

        assert!(matches!(
            service
                .oauth_finish(Some(code), Some("forged"), &start.state, &start.verifier)
                .await,
            Err(AuthError::StateMismatch)
        ));

        let user = service
            .oauth_finish(Some(code), Some(&start.state), &start.state, &start.verifier)
            .await
            .unwrap();
        assert_eq!(user.full_name.as_deref(), Some("OAuth Collector"));
    }

    #[tokio::test]
    async fn test_refresh_rotates_tokens() {
        let repos = InMemoryBackend::new().repositories();
        let service = AuthService::new(&repos);
        let SignUpOutcome::SignedIn(mut user) = service
            .sign_up("r@example.com", "secret123", "secret123", None)
            .await
            .unwrap()
        else {
            panic!("expected immediate sign-in");
        };

        let old = user.access_token.clone();
        service.refresh(&mut user).await.unwrap();
        assert_ne!(user.access_token, old);

        service.sign_out(&user).await.unwrap();
    }
}
