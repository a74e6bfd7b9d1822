//! One-time-token repository trait

use async_trait::async_trait;
use chrono::Duration;

use crate::{
    Error,
    token::{OneTimeToken, TokenId, TokenPurpose},
    user::UserId,
};

/// Data access for single-use password-reset and email-verification tokens.
#[async_trait]
pub trait TokenRepository: Send + Sync + 'static {
    /// Issue a fresh token for a user and purpose.
    ///
    /// Any earlier unused tokens for the same `(user, purpose)` pair are
    /// deleted first, so at most one live token exists per pair.
    async fn create(
        &self,
        user_id: &UserId,
        purpose: TokenPurpose,
        expires_in: Duration,
    ) -> Result<OneTimeToken, Error>;

    /// Find a token by its secret value, restricted to the given purpose.
    ///
    /// Only returns tokens that are unused and unexpired.
    async fn find_valid(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<OneTimeToken>, Error>;

    /// Consume a token by setting `used_at`. Consuming a token twice fails
    /// with [`crate::error::AuthError::InvalidCredentials`].
    async fn mark_used(&self, token_id: &TokenId) -> Result<(), Error>;

    /// Atomically consume an email-verification token and mark the owning
    /// user's email as verified, in one transaction.
    async fn consume_email_verification(
        &self,
        token_id: &TokenId,
        user_id: &UserId,
    ) -> Result<(), Error>;

    /// Delete all tokens whose expiry has passed.
    async fn cleanup_expired(&self) -> Result<(), Error>;
}
