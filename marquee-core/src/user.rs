//! User accounts
//!
//! This module contains the core user struct and related functionality.
//!
//! | Field               | Type               | Description                                          |
//! | ------------------- | ------------------ | ---------------------------------------------------- |
//! | `id`                | `UserId`           | The unique identifier for the user.                  |
//! | `email`             | `String`           | Lowercase email, unique among live (non-deleted) rows. |
//! | `password_hash`     | `Option<String>`   | Scrypt hash; `None` for OAuth-only accounts.         |
//! | `name`              | `Option<String>`   | Display name.                                        |
//! | `profile_image_url` | `Option<String>`   | Avatar URL.                                          |
//! | `timezone`          | `Option<String>`   | IANA timezone name.                                  |
//! | `role`              | `UserRole`         | `user`, `admin` or `editor`.                         |
//! | `email_verified`    | `bool`             | Whether the current email address was confirmed.     |
//! | `last_login_at`     | `Option<DateTime>` | Timestamp of the most recent successful login.       |
//! | `deleted_at`        | `Option<DateTime>` | Soft-delete timestamp; set rows never authenticate.  |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    error::ValidationError,
    id::{generate_prefixed_id, validate_prefixed_id},
};

/// A unique, stable identifier for a specific user.
/// This value should be treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: &str) -> Self {
        UserId(id.to_string())
    }

    pub fn new_random() -> Self {
        UserId(generate_prefixed_id("usr"))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "usr")
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authorization role attached to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
    Editor,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
            UserRole::Editor => "editor",
        }
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::User
    }
}

impl std::str::FromStr for UserRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            "editor" => Ok(UserRole::Editor),
            other => Err(ValidationError::InvalidField(format!(
                "Unknown role: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Representation of a user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,

    /// Lowercase email. Soft-deleted rows hold an anonymized placeholder.
    pub email: String,

    /// `None` for OAuth-only accounts and for soft-deleted rows.
    pub password_hash: Option<String>,

    pub name: Option<String>,

    pub profile_image_url: Option<String>,

    pub timezone: Option<String>,

    pub role: UserRole,

    pub email_verified: bool,

    pub last_login_at: Option<DateTime<Utc>>,

    /// Soft-delete timestamp. A set value permanently excludes the row from
    /// authentication.
    pub deleted_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether this account can authenticate with a password at all.
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Parameters for inserting a new user row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub id: UserId,
    pub email: String,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub profile_image_url: Option<String>,
    pub role: UserRole,
    pub email_verified: bool,
}

impl NewUser {
    pub fn builder() -> NewUserBuilder {
        NewUserBuilder::default()
    }
}

#[derive(Default)]
pub struct NewUserBuilder {
    id: Option<UserId>,
    email: Option<String>,
    password_hash: Option<String>,
    name: Option<String>,
    profile_image_url: Option<String>,
    role: Option<UserRole>,
    email_verified: bool,
}

impl NewUserBuilder {
    pub fn id(mut self, id: UserId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn email(mut self, email: String) -> Self {
        self.email = Some(email);
        self
    }

    pub fn password_hash(mut self, password_hash: String) -> Self {
        self.password_hash = Some(password_hash);
        self
    }

    pub fn name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    pub fn profile_image_url(mut self, profile_image_url: String) -> Self {
        self.profile_image_url = Some(profile_image_url);
        self
    }

    pub fn role(mut self, role: UserRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn email_verified(mut self, email_verified: bool) -> Self {
        self.email_verified = email_verified;
        self
    }

    pub fn build(self) -> Result<NewUser, Error> {
        Ok(NewUser {
            id: self.id.unwrap_or_default(),
            email: self.email.ok_or(ValidationError::MissingField(
                "Email is required".to_string(),
            ))?,
            password_hash: self.password_hash,
            name: self.name,
            profile_image_url: self.profile_image_url,
            role: self.role.unwrap_or_default(),
            email_verified: self.email_verified,
        })
    }
}

/// Partial profile update; only the provided fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub profile_image_url: Option<String>,
    pub timezone: Option<String>,
}
