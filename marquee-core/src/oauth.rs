//! OAuth account links and the provider capability interface
//!
//! An [`OAuthAccount`] links one external identity-provider account to one
//! local user. The `(provider, subject)` pair is unique: a provider identity
//! belongs to exactly one user at a time.
//!
//! Provider-specific flows (authorization URL construction, code exchange,
//! user-info fetch) are defined only as the [`OAuthProvider`] capability
//! trait; this core ships zero concrete providers. A Google or Apple adapter
//! implements the trait without touching the account or link stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    error::ValidationError,
    id::generate_prefixed_id,
    user::UserId,
};

/// Unique identifier for an OAuth account link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct OAuthLinkId(String);

impl OAuthLinkId {
    pub fn new(id: &str) -> Self {
        OAuthLinkId(id.to_string())
    }

    pub fn new_random() -> Self {
        OAuthLinkId(generate_prefixed_id("oal"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OAuthLinkId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl std::fmt::Display for OAuthLinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthAccount {
    pub id: OAuthLinkId,
    pub user_id: UserId,
    /// Provider name, e.g. `google` or `apple`.
    pub provider: String,
    /// Provider-side account identifier, unique per provider.
    pub subject: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for linking an external identity to a user.
#[derive(Debug, Clone)]
pub struct NewOAuthLink {
    pub user_id: UserId,
    pub provider: String,
    pub subject: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl NewOAuthLink {
    pub fn builder() -> NewOAuthLinkBuilder {
        NewOAuthLinkBuilder::default()
    }
}

#[derive(Default)]
pub struct NewOAuthLinkBuilder {
    user_id: Option<UserId>,
    provider: Option<String>,
    subject: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

impl NewOAuthLinkBuilder {
    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn provider(mut self, provider: String) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn subject(mut self, subject: String) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn access_token(mut self, access_token: Option<String>) -> Self {
        self.access_token = access_token;
        self
    }

    pub fn refresh_token(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    pub fn build(self) -> Result<NewOAuthLink, Error> {
        Ok(NewOAuthLink {
            user_id: self.user_id.ok_or(ValidationError::MissingField(
                "User ID is required".to_string(),
            ))?,
            provider: self.provider.ok_or(ValidationError::MissingField(
                "Provider is required".to_string(),
            ))?,
            subject: self.subject.ok_or(ValidationError::MissingField(
                "Subject is required".to_string(),
            ))?,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        })
    }
}

/// Tokens returned by a provider's code exchange.
#[derive(Debug, Clone)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Identity information fetched from a provider.
#[derive(Debug, Clone)]
pub struct ProviderUserInfo {
    /// Provider-side account identifier.
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub profile_image_url: Option<String>,
}

/// Capability interface for an external OAuth identity provider.
///
/// Concrete adapters (Google, Apple, ...) are external collaborators; the
/// core only depends on this contract.
#[async_trait]
pub trait OAuthProvider: Send + Sync + 'static {
    /// Provider name as stored on link rows (lowercase, e.g. `google`).
    fn name(&self) -> &str;

    /// Build the authorization URL the client is redirected to, carrying the
    /// given CSRF state.
    fn authorization_url(&self, state: &str) -> Result<String, Error>;

    /// Exchange an authorization code for provider tokens.
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, Error>;

    /// Fetch the provider-side identity for an access token.
    async fn user_info(&self, access_token: &str) -> Result<ProviderUserInfo, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_link_id_prefixed() {
        let id = OAuthLinkId::new_random();
        assert!(id.as_str().starts_with("oal_"));
        assert_ne!(id, OAuthLinkId::new_random());
    }

    #[test]
    fn test_new_oauth_link_builder() {
        let link = NewOAuthLink::builder()
            .user_id(UserId::new_random())
            .provider("google".to_string())
            .subject("sub-123".to_string())
            .access_token(Some("at".to_string()))
            .build()
            .unwrap();

        assert_eq!(link.provider, "google");
        assert_eq!(link.refresh_token, None);
    }

    #[test]
    fn test_new_oauth_link_builder_missing_fields() {
        let result = NewOAuthLink::builder()
            .provider("google".to_string())
            .build();
        assert!(result.is_err());
    }
}
