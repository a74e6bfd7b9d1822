//! OAuth link repository trait

use async_trait::async_trait;

use crate::{
    Error,
    oauth::{NewOAuthLink, OAuthAccount, OAuthLinkId},
    user::UserId,
};

/// Data access for OAuth account links.
///
/// The `(provider, subject)` pair is unique across all rows.
#[async_trait]
pub trait OAuthRepository: Send + Sync + 'static {
    /// Persist a new provider-identity link.
    ///
    /// Fails with [`crate::error::AuthError::AccountAlreadyLinked`] when the
    /// `(provider, subject)` pair is already linked.
    async fn create_link(&self, link: NewOAuthLink) -> Result<OAuthAccount, Error>;

    /// Find the link for a provider identity.
    async fn find_by_provider(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<OAuthAccount>, Error>;

    /// List every provider link a user has.
    async fn find_links_for_user(&self, user_id: &UserId) -> Result<Vec<OAuthAccount>, Error>;

    /// Replace the stored provider tokens on a link.
    async fn update_tokens(
        &self,
        link_id: &OAuthLinkId,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), Error>;

    /// Remove a link. Removing an absent link is a no-op.
    async fn delete_link(&self, link_id: &OAuthLinkId) -> Result<(), Error>;
}
