//! Single-use, expiring tokens for password reset and email verification
//!
//! Both flows share one token shape, distinguished by [`TokenPurpose`].
//! A token moves through three states: issued (`used_at` empty, not
//! expired), consumed (`used_at` set) or expired. Terminal states are never
//! reused or resurrected; a fresh token always requires a new create call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{id::generate_prefixed_id, user::UserId};

/// What a one-time token is allowed to be used for.
///
/// Tokens can only be consumed for their creation purpose, giving security
/// isolation between the two flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    PasswordReset,
    EmailVerification,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::PasswordReset => "password_reset",
            TokenPurpose::EmailVerification => "email_verification",
        }
    }
}

impl std::str::FromStr for TokenPurpose {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password_reset" => Ok(TokenPurpose::PasswordReset),
            "email_verification" => Ok(TokenPurpose::EmailVerification),
            other => Err(crate::error::ValidationError::InvalidField(format!(
                "Unknown token purpose: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unique identifier for a one-time token row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct TokenId(String);

impl TokenId {
    pub fn new(id: &str) -> Self {
        TokenId(id.to_string())
    }

    pub fn new_random() -> Self {
        TokenId(generate_prefixed_id("tok"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneTimeToken {
    pub id: TokenId,
    pub user_id: UserId,
    /// 64-character lowercase hex token, unique.
    pub token: String,
    pub purpose: TokenPurpose,
    pub expires_at: DateTime<Utc>,
    /// `None` while the token is still live.
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OneTimeToken {
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    // The expiry instant itself counts as expired.
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Issued and neither consumed nor expired.
    pub fn is_valid(&self) -> bool {
        !self.is_used() && !self.is_expired()
    }
}

impl PartialEq for OneTimeToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.user_id == other.user_id
            && self.token == other.token
            && self.purpose == other.purpose
            && self.used_at.map(|t| t.timestamp()) == other.used_at.map(|t| t.timestamp())
            // Some databases store timestamps with second precision, so
            // compare as unix timestamps
            && self.expires_at.timestamp() == other.expires_at.timestamp()
            && self.created_at.timestamp() == other.created_at.timestamp()
    }
}
