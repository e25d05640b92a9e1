//! Authentication route handlers.
//!
//! Email/password, phone OTP and OAuth sign-in. Every successful sign-in
//! stores a [`CurrentUser`] in the session, cycles the session id and seeds
//! the cart and wishlist snapshots used for badge counts.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use numisma_backend::OAuthProvider;
use numisma_core::{Email, PhoneNumber, ProfileId, Role};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use tracing::{info, instrument, warn};
use url::Url;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{OptionalAuth, RequireAuth, clear_current_user, set_current_user};
use crate::models::{CartSnapshot, CurrentUser, WishlistSnapshot, session_keys};
use crate::services::auth::{AuthService, SignUpOutcome, safe_redirect};
use crate::services::cart::CartService;
use crate::services::wishlist::WishlistService;
use crate::state::AppState;

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OtpSendRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpVerifyRequest {
    pub phone: String,
    pub code: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub next: Option<String>,
    pub error_description: Option<String>,
}

/// The signed-in user as the client sees it. Tokens never leave the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser<'a> {
    pub id: ProfileId,
    pub email: Option<&'a Email>,
    pub phone: Option<&'a PhoneNumber>,
    pub full_name: Option<&'a str>,
    pub role: Role,
}

impl<'a> From<&'a CurrentUser> for SessionUser<'a> {
    fn from(user: &'a CurrentUser) -> Self {
        Self {
            id: user.id,
            email: user.email.as_ref(),
            phone: user.phone.as_ref(),
            full_name: user.full_name.as_deref(),
            role: user.role,
        }
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Store the user and seed their snapshots.
///
/// Snapshot failures are logged; the badge counts catch up on the next
/// cart or wishlist change.
async fn start_session(state: &AppState, session: &Session, user: &CurrentUser) -> Result<()> {
    session.cycle_id().await?;
    set_current_user(session, user).await?;

    match CartService::new(state.repos()).snapshot(user.id).await {
        Ok(snapshot) => session.insert(session_keys::CART_SNAPSHOT, snapshot).await?,
        Err(e) => warn!(error = %e, "Failed to seed cart snapshot"),
    }
    match WishlistService::new(state.repos()).snapshot(user.id).await {
        Ok(snapshot) => {
            session
                .insert(session_keys::WISHLIST_SNAPSHOT, snapshot)
                .await?;
        }
        Err(e) => warn!(error = %e, "Failed to seed wishlist snapshot"),
    }

    let user_id = user.id.to_string();
    add_breadcrumb("auth", "Signed in", Some(&[("user_id", user_id.as_str())]));
    Ok(())
}

fn signed_in(user: &CurrentUser, next: Option<&str>) -> Json<serde_json::Value> {
    Json(json!({
        "user": SessionUser::from(user),
        "redirect": safe_redirect(next),
    }))
}

// =============================================================================
// Email and Password
// =============================================================================

/// `POST /api/auth/signup`
///
/// `201` with the user when signed in straight away, `202` when the email
/// must be confirmed first.
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<SignUpRequest>,
) -> Result<Response> {
    let outcome = AuthService::new(state.repos())
        .sign_up(
            &body.email,
            &body.password,
            &body.confirm_password,
            body.full_name.as_deref(),
        )
        .await?;

    match outcome {
        SignUpOutcome::SignedIn(user) => {
            start_session(&state, &session, &user).await?;
            Ok((StatusCode::CREATED, signed_in(&user, None)).into_response())
        }
        SignUpOutcome::ConfirmationRequired { email } => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "confirmationRequired": true, "email": email })),
        )
            .into_response()),
    }
}

/// `POST /api/auth/login`
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>> {
    let user = AuthService::new(state.repos())
        .sign_in(&body.email, &body.password)
        .await?;
    start_session(&state, &session, &user).await?;
    info!(user_id = %user.id, "User logged in");
    Ok(signed_in(&user, body.next.as_deref()))
}

// =============================================================================
// Phone OTP
// =============================================================================

/// `POST /api/auth/otp/send`
pub async fn send_otp(
    State(state): State<AppState>,
    Json(body): Json<OtpSendRequest>,
) -> Result<Json<serde_json::Value>> {
    let phone = AuthService::new(state.repos()).send_otp(&body.phone).await?;
    Ok(Json(json!({ "sent": true, "phone": phone })))
}

/// `POST /api/auth/otp/verify`
pub async fn verify_otp(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<OtpVerifyRequest>,
) -> Result<Json<serde_json::Value>> {
    let user = AuthService::new(state.repos())
        .verify_otp(&body.phone, &body.code)
        .await?;
    start_session(&state, &session, &user).await?;
    info!(user_id = %user.id, "User logged in by OTP");
    Ok(signed_in(&user, body.next.as_deref()))
}

// =============================================================================
// OAuth
// =============================================================================

/// `GET /api/auth/oauth/{provider}`
///
/// Redirects to the provider. The PKCE verifier and `state` wait in the
/// session for the callback.
pub async fn oauth_start(
    State(state): State<AppState>,
    session: Session,
    Path(provider): Path<String>,
    Query(query): Query<NextQuery>,
) -> Result<Redirect> {
    let provider: OAuthProvider = provider.parse().map_err(AppError::NotFound)?;

    let mut callback = Url::parse(&state.config().absolute_url("/api/auth/callback"))
        .map_err(|e| AppError::Internal(format!("invalid base url: {e}")))?;
    if let Some(next) = query.next.as_deref() {
        callback
            .query_pairs_mut()
            .append_pair("next", safe_redirect(Some(next)));
    }

    let start = AuthService::new(state.repos()).oauth_start(provider, &callback)?;
    session
        .insert(session_keys::OAUTH_VERIFIER, &start.verifier)
        .await?;
    session.insert(session_keys::OAUTH_STATE, &start.state).await?;

    info!(provider = provider.as_str(), "OAuth sign-in started");
    Ok(Redirect::to(start.authorize_url.as_str()))
}

/// `GET /api/auth/callback`
///
/// Finishes the OAuth sign-in and redirects to the page the user started
/// from. Failures redirect to `/login` with an error message.
pub async fn oauth_callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect> {
    let verifier: Option<String> = session.remove(session_keys::OAUTH_VERIFIER).await?;
    let expected: Option<String> = session.remove(session_keys::OAUTH_STATE).await?;

    if let Some(description) = query.error_description.as_deref() {
        warn!(error = %description, "OAuth provider returned an error");
        return Ok(login_error(description));
    }
    let (Some(verifier), Some(expected)) = (verifier, expected) else {
        warn!("OAuth callback without a pending sign-in");
        return Ok(login_error("Sign-in expired, please try again"));
    };

    let result = AuthService::new(state.repos())
        .oauth_finish(
            query.code.as_deref(),
            query.state.as_deref(),
            &expected,
            &verifier,
        )
        .await;

    match result {
        Ok(user) => {
            start_session(&state, &session, &user).await?;
            info!(user_id = %user.id, "User logged in by OAuth");
            Ok(Redirect::to(safe_redirect(query.next.as_deref())))
        }
        Err(e) => {
            warn!(error = %e, "OAuth sign-in failed");
            Ok(login_error("Sign-in failed, please try again"))
        }
    }
}

fn login_error(message: &str) -> Redirect {
    Redirect::to(&format!("/login?error={}", urlencoding::encode(message)))
}

// =============================================================================
// Session
// =============================================================================

/// `POST /api/auth/logout`
///
/// The local session is cleared even when the backend refuses to revoke
/// the tokens.
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<StatusCode> {
    if let Some(user) = user {
        if let Err(e) = AuthService::new(state.repos()).sign_out(&user).await {
            warn!(user_id = %user.id, error = %e, "Failed to revoke backend session");
        }
        info!(user_id = %user.id, "User logged out");
    }
    clear_current_user(&session).await?;
    session.cycle_id().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me`
///
/// The signed-in user with cart and wishlist badge counts.
pub async fn me(
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Json<serde_json::Value>> {
    let cart: CartSnapshot = session
        .get(session_keys::CART_SNAPSHOT)
        .await?
        .unwrap_or_default();
    let wishlist: WishlistSnapshot = session
        .get(session_keys::WISHLIST_SNAPSHOT)
        .await?
        .unwrap_or_default();

    Ok(Json(json!({
        "user": SessionUser::from(&user),
        "cartCount": cart.count(),
        "wishlistCount": wishlist.count(),
    })))
}
