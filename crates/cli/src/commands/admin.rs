//! Admin role management.
//!
//! # Usage
//!
//! ```bash
//! # Give an existing account the admin role
//! numisma-cli admin grant -e curator@example.com
//!
//! # Take it away again
//! numisma-cli admin revoke -e curator@example.com
//! ```
//!
//! The account must already exist: sign up on the storefront first.

use numisma_backend::models::{Profile, ProfileUpdate};
use numisma_backend::{Repositories, RepositoryError};
use numisma_core::{Email, EmailError, Role};
use thiserror::Error;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("No account with email: {0}")]
    UnknownUser(Email),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Set the role of the profile with `email`.
///
/// Setting the role a profile already has is a no-op that still succeeds.
///
/// # Errors
///
/// Returns an error if the email is invalid, no profile has it, or the
/// update fails.
pub async fn set_role(repos: &Repositories, email: &str, role: Role) -> Result<Profile, AdminError> {
    let email = Email::parse(email)?;
    let profile = repos
        .profiles
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AdminError::UnknownUser(email.clone()))?;

    if profile.role == role {
        tracing::info!("{} already has role {}", email, role);
        return Ok(profile);
    }

    let update = ProfileUpdate {
        role: Some(role),
        ..ProfileUpdate::default()
    };
    let profile = repos.profiles.update(profile.id, &update).await?;
    tracing::info!(
        "Role updated: {} ({}) is now {}",
        profile.display_name(),
        email,
        profile.role
    );
    Ok(profile)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use numisma_backend::InMemoryBackend;
    use numisma_backend::models::NewProfile;
    use numisma_core::ProfileId;

    use super::*;

    async fn repos_with_user(email: &str) -> Repositories {
        let repos = InMemoryBackend::new().repositories();
        repos
            .profiles
            .create(&NewProfile {
                id: ProfileId::generate(),
                full_name: Some("Meera Iyer".to_string()),
                email: Some(Email::parse(email).unwrap()),
                phone: None,
                avatar_url: None,
            })
            .await
            .unwrap();
        repos
    }

    #[tokio::test]
    async fn test_grant_and_revoke() {
        let repos = repos_with_user("meera@example.com").await;

        let profile = set_role(&repos, "meera@example.com", Role::Admin).await.unwrap();
        assert_eq!(profile.role, Role::Admin);

        let profile = set_role(&repos, "meera@example.com", Role::User).await.unwrap();
        assert_eq!(profile.role, Role::User);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let repos = repos_with_user("meera@example.com").await;
        assert!(matches!(
            set_role(&repos, "nobody@example.com", Role::Admin).await,
            Err(AdminError::UnknownUser(_))
        ));
        assert!(matches!(
            set_role(&repos, "not an email", Role::Admin).await,
            Err(AdminError::InvalidEmail(_))
        ));
    }
}
