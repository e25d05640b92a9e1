//! User profiles (`profiles`).

use chrono::{DateTime, Utc};
use numisma_core::{Email, PhoneNumber, ProfileId, Role, Theme};
use serde::{Deserialize, Serialize};

/// A user's profile. The id equals the auth user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: ProfileId,
    pub full_name: Option<String>,
    pub email: Option<Email>,
    pub phone: Option<PhoneNumber>,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub theme: Theme,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Name to show in the UI: full name, else the email local part.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.full_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                self.email
                    .as_ref()
                    .and_then(|e| e.as_str().split('@').next().map(str::to_string))
            })
            .unwrap_or_else(|| "Collector".to_string())
    }
}

/// Stored shape of a profile.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRow {
    pub id: ProfileId,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = String;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let email = row
            .email
            .filter(|e| !e.is_empty())
            .map(|e| Email::parse(&e))
            .transpose()
            .map_err(|e| format!("invalid email in profile {}: {e}", row.id))?;
        let phone = row
            .phone
            .filter(|p| !p.is_empty())
            .map(|p| PhoneNumber::parse(&p))
            .transpose()
            .map_err(|e| format!("invalid phone in profile {}: {e}", row.id))?;

        Ok(Self {
            id: row.id,
            full_name: row.full_name,
            email,
            phone,
            avatar_url: row.avatar_url,
            role: row.role,
            theme: row.theme,
            is_verified: row.is_verified,
            verified_at: row.verified_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Profile created on signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: ProfileId,
    pub full_name: Option<String>,
    pub email: Option<Email>,
    pub phone: Option<PhoneNumber>,
    pub avatar_url: Option<String>,
}

/// Partial profile update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<PhoneNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
}

impl ProfileUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone.is_none()
            && self.avatar_url.is_none()
            && self.theme.is_none()
            && self.role.is_none()
            && self.is_verified.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row() -> ProfileRow {
        serde_json::from_value(serde_json::json!({
            "id": "0b5f4f1e-8a3c-4e7e-9d2e-6f1f3c1a2b3c",
            "email": "Asha@Example.com",
            "phone": "98765 43210",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_row_defaults_and_normalization() {
        let profile = Profile::try_from(row()).unwrap();
        assert_eq!(profile.role, Role::User);
        assert_eq!(profile.theme, Theme::System);
        assert_eq!(profile.email.unwrap().as_str(), "asha@example.com");
        assert_eq!(profile.phone.unwrap().as_str(), "9876543210");
    }

    #[test]
    fn test_bad_email_is_corruption() {
        let mut r = row();
        r.email = Some("not-an-email".to_string());
        assert!(Profile::try_from(r).is_err());
    }

    #[test]
    fn test_display_name_fallback() {
        let profile = Profile::try_from(row()).unwrap();
        assert_eq!(profile.display_name(), "asha");
    }

    #[test]
    fn test_update_skips_none() {
        let update = ProfileUpdate {
            theme: Some(Theme::Dark),
            ..ProfileUpdate::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "theme": "dark" }));
        assert!(ProfileUpdate::default().is_empty());
    }
}
