use serde::{Deserialize, Serialize};

use super::pet::Pet;

/// The signed-in user's profile, cached in persisted storage as `userInfo`.
///
/// Embeds the user's pets; that embedded list is regenerated from the pet
/// store after every pet mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(rename = "profileImageUrl", skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub pets: Vec<Pet>,
}

/// Editable profile fields sent with `PATCH /users/profile`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl ProfileUpdate {
    pub fn apply_to(&self, profile: &mut UserProfile) {
        let fields = [
            (&self.username, &mut profile.username),
            (&self.phone_number, &mut profile.phone_number),
            (&self.phone_country, &mut profile.phone_country),
            (&self.gender, &mut profile.gender),
            (&self.date_of_birth, &mut profile.date_of_birth),
            (&self.bio, &mut profile.bio),
        ];
        for (patch, target) in fields {
            if let Some(value) = patch {
                *target = Some(value.clone());
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Sign-up form. The client adds `created_at` and `is_active` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub gender: String,
    pub date_of_birth: String,
}

/// Response of `GET /users/check-email`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailCheck {
    #[serde(rename = "isDuplicate")]
    pub is_duplicate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_uses_server_field_names() {
        let raw = r#"{"user_id":7,"email":"a@b.com","profileImageUrl":"http://img/1.jpg"}"#;
        let profile: UserProfile = serde_json::from_str(raw).unwrap();
        assert_eq!(profile.user_id, Some(7));
        assert_eq!(profile.profile_image_url.as_deref(), Some("http://img/1.jpg"));
        assert!(profile.pets.is_empty());

        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("username").is_none());
        assert_eq!(json["pets"], serde_json::json!([]));
    }

    #[test]
    fn profile_update_only_touches_present_fields() {
        let mut profile = UserProfile {
            username: Some("old".to_string()),
            gender: Some("F".to_string()),
            ..Default::default()
        };
        let update = ProfileUpdate {
            username: Some("new".to_string()),
            ..Default::default()
        };
        update.apply_to(&mut profile);
        assert_eq!(profile.username.as_deref(), Some("new"));
        assert_eq!(profile.gender.as_deref(), Some("F"));
    }
}
