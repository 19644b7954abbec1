use serde::{Deserialize, Serialize};

use crate::model::UserId;

/// Account roles known to the service.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

/// A user profile as returned by the auth and profile endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Only admins may delete polls; the service enforces the same rule.
    pub fn can_delete_polls(&self) -> bool {
        self.is_admin()
    }

    /// Name to show in headers and voter lists.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.name)
    }
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Role,
    /// Sent as the `X-Admin-Token` header, never in the body.
    #[serde(skip)]
    pub admin_token: Option<String>,
}

/// Body of `PUT /me`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.name.is_none() && self.password.is_none()
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl User {
        pub fn example_voter() -> Self {
            Self {
                id: "u-voter".to_string(),
                email: "voter@example.com".to_string(),
                name: "Vera Voter".to_string(),
                role: Role::User,
                username: Some("vera".to_string()),
                avatar_url: None,
            }
        }

        pub fn example_admin() -> Self {
            Self {
                id: "u-admin".to_string(),
                email: "admin@example.com".to_string(),
                name: "Ada Admin".to_string(),
                role: Role::Admin,
                username: None,
                avatar_url: Some("/static/avatars/u-admin.png".to_string()),
            }
        }
    }
}
