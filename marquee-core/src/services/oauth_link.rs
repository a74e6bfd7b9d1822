use std::sync::Arc;

use crate::{
    Error, User, UserId,
    crypto::{generate_token, verify_oauth_state},
    error::AuthError,
    oauth::{NewOAuthLink, OAuthAccount, OAuthLinkId},
    repositories::{OAuthRepository, UserRepository},
    validation::validate_provider,
};

/// Service for OAuth account-link operations
///
/// Provider-specific flows (code exchange, user-info fetch) live behind the
/// [`crate::oauth::OAuthProvider`] trait; this service only manages the link
/// rows and the CSRF state tokens.
pub struct OAuthLinkService<O: OAuthRepository, U: UserRepository> {
    oauth_repository: Arc<O>,
    user_repository: Arc<U>,
}

impl<O: OAuthRepository, U: UserRepository> OAuthLinkService<O, U> {
    /// Create a new OAuthLinkService with the given repositories
    pub fn new(oauth_repository: Arc<O>, user_repository: Arc<U>) -> Self {
        Self {
            oauth_repository,
            user_repository,
        }
    }

    /// Generate a CSRF state token for an authorization redirect.
    pub fn generate_state(&self) -> String {
        generate_token()
    }

    /// Verify a returned CSRF state value in constant time.
    pub fn verify_state(&self, candidate: &str, expected: &str) -> bool {
        verify_oauth_state(candidate, expected)
    }

    /// Link a provider identity to a user.
    ///
    /// Re-linking the same identity to the same user is idempotent and
    /// refreshes the stored provider tokens. Linking an identity that
    /// belongs to a different user fails with
    /// [`AuthError::AccountAlreadyLinked`].
    pub async fn link_account(&self, link: NewOAuthLink) -> Result<OAuthAccount, Error> {
        validate_provider(&link.provider)?;

        if let Some(existing) = self
            .oauth_repository
            .find_by_provider(&link.provider, &link.subject)
            .await?
        {
            if existing.user_id != link.user_id {
                return Err(AuthError::AccountAlreadyLinked.into());
            }
            self.oauth_repository
                .update_tokens(
                    &existing.id,
                    link.access_token.as_deref(),
                    link.refresh_token.as_deref(),
                )
                .await?;
            return Ok(OAuthAccount {
                access_token: link.access_token,
                refresh_token: link.refresh_token,
                ..existing
            });
        }

        let account = self.oauth_repository.create_link(link).await?;
        tracing::info!(
            user_id = %account.user_id,
            provider = %account.provider,
            "Linked OAuth account"
        );
        Ok(account)
    }

    /// Resolve a provider identity to its link and the owning user.
    ///
    /// Returns `Ok(None)` when the identity is not linked or the owner was
    /// soft-deleted.
    pub async fn find_account(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<(OAuthAccount, User)>, Error> {
        let Some(link) = self
            .oauth_repository
            .find_by_provider(provider, subject)
            .await?
        else {
            return Ok(None);
        };

        let user = self.user_repository.find_by_id(&link.user_id).await?;
        Ok(user.filter(|u| !u.is_deleted()).map(|u| (link, u)))
    }

    /// List a user's provider links.
    pub async fn links_for_user(&self, user_id: &UserId) -> Result<Vec<OAuthAccount>, Error> {
        self.oauth_repository.find_links_for_user(user_id).await
    }

    /// Replace the stored provider tokens on a link.
    pub async fn update_tokens(
        &self,
        link_id: &OAuthLinkId,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), Error> {
        self.oauth_repository
            .update_tokens(link_id, access_token, refresh_token)
            .await
    }

    /// Remove a provider link from a user.
    pub async fn unlink_account(&self, link_id: &OAuthLinkId) -> Result<(), Error> {
        self.oauth_repository.delete_link(link_id).await?;
        tracing::info!(link_id = %link_id, "Unlinked OAuth account");
        Ok(())
    }
}
