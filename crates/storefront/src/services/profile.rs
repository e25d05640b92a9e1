//! The signed-in user's own profile.

use numisma_backend::Repositories;
use numisma_backend::models::{Profile, ProfileUpdate};
use numisma_backend::repository::ProfileRepository;
use numisma_backend::storage::{ObjectStorage, object_path};
use numisma_core::{ImageFile, PhoneNumber, ProfileId, Theme};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::{AppError, FieldErrors, Result};

const NAME_MAX: usize = 120;

/// Editable profile fields. Absent fields are left unchanged; an empty
/// phone clears nothing and is rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileForm {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub theme: Option<Theme>,
}

impl ProfileForm {
    /// # Errors
    ///
    /// Returns field errors for a blank or overlong name and a phone that is
    /// not ten digits.
    pub fn validate(self) -> std::result::Result<ProfileUpdate, FieldErrors> {
        let mut errors = FieldErrors::new();
        let mut update = ProfileUpdate {
            theme: self.theme,
            ..ProfileUpdate::default()
        };

        if let Some(name) = self.full_name {
            let name = name.trim();
            if name.is_empty() {
                errors.add("full_name", "Name cannot be blank");
            } else if name.chars().count() > NAME_MAX {
                errors.add("full_name", format!("Name must be at most {NAME_MAX} characters"));
            } else {
                update.full_name = Some(name.to_string());
            }
        }
        if let Some(phone) = self.phone {
            match PhoneNumber::parse(&phone) {
                Ok(phone) => update.phone = Some(phone),
                Err(e) => errors.add("phone", e.to_string()),
            }
        }

        errors.into_result_fields()?;
        Ok(update)
    }
}

pub struct ProfileService<'a> {
    profiles: &'a dyn ProfileRepository,
    storage: &'a dyn ObjectStorage,
}

impl<'a> ProfileService<'a> {
    #[must_use]
    pub fn new(repos: &'a Repositories) -> Self {
        Self {
            profiles: repos.profiles.as_ref(),
            storage: repos.storage.as_ref(),
        }
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` when no profile row exists.
    pub async fn get(&self, user_id: ProfileId) -> Result<Profile> {
        self.profiles
            .get(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("profile".to_string()))
    }

    /// Apply a profile form. An empty form returns the profile unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for bad fields.
    #[instrument(skip(self, form))]
    pub async fn update(&self, user_id: ProfileId, form: ProfileForm) -> Result<Profile> {
        let update = form.validate()?;
        if update.is_empty() {
            return self.get(user_id).await;
        }
        let profile = self.profiles.update(user_id, &update).await?;
        info!("Profile updated");
        Ok(profile)
    }

    /// Upload a new avatar and point the profile at it.
    ///
    /// The object path is stable per user, so a new avatar overwrites the
    /// old one.
    ///
    /// # Errors
    ///
    /// Returns the storage or repository error.
    #[instrument(skip(self, image), fields(size = image.len()))]
    pub async fn set_avatar(&self, user_id: ProfileId, image: &ImageFile) -> Result<Profile> {
        let path = object_path("avatars", user_id, "avatar", image);
        let url = self.storage.upload(&path, image).await?;
        let update = ProfileUpdate {
            avatar_url: Some(url),
            ..ProfileUpdate::default()
        };
        Ok(self.profiles.update(user_id, &update).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use numisma_backend::InMemoryBackend;
    use numisma_backend::models::NewProfile;

    use super::*;

    async fn seed(repos: &Repositories) -> ProfileId {
        let id = ProfileId::generate();
        repos
            .profiles
            .create(&NewProfile {
                id,
                full_name: Some("Asha".to_string()),
                email: None,
                phone: None,
                avatar_url: None,
            })
            .await
            .unwrap();
        id
    }

    #[test]
    fn test_form_validation() {
        let errors = ProfileForm {
            full_name: Some("  ".to_string()),
            phone: Some("12345".to_string()),
            theme: None,
        }
        .validate()
        .unwrap_err();
        assert!(errors.contains("full_name"));
        assert!(errors.contains("phone"));

        let update = ProfileForm {
            phone: Some("(987) 654-3210".to_string()),
            theme: Some(Theme::Dark),
            ..ProfileForm::default()
        }
        .validate()
        .unwrap();
        assert_eq!(update.phone.unwrap().as_str(), "9876543210");
        assert_eq!(update.theme, Some(Theme::Dark));
    }

    #[tokio::test]
    async fn test_update_and_avatar() {
        let backend = InMemoryBackend::new();
        let repos = backend.repositories();
        let user = seed(&repos).await;
        let service = ProfileService::new(&repos);

        let profile = service
            .update(
                user,
                ProfileForm {
                    full_name: Some(" Asha Rao ".to_string()),
                    ..ProfileForm::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Asha Rao"));

        let image = ImageFile::new("me.png", "image/png", vec![0x89, 0x50]).unwrap();
        let profile = service.set_avatar(user, &image).await.unwrap();
        assert!(profile.avatar_url.unwrap().ends_with(&format!("avatars/{user}/avatar.png")));
        assert_eq!(backend.storage().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_profile() {
        let repos = InMemoryBackend::new().repositories();
        assert!(matches!(
            ProfileService::new(&repos).get(ProfileId::generate()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
