//! User repository trait

use async_trait::async_trait;

use crate::{
    Error,
    user::{NewUser, ProfileUpdate, User, UserId},
};

/// Data access for user accounts.
///
/// Lookups by email only return live (non-deleted) accounts; lookups by id
/// return soft-deleted rows too so callers can distinguish "gone" from
/// "never existed". Emails are expected to be normalized before they reach
/// this trait.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Create a new user account.
    ///
    /// Fails with [`crate::error::AuthError::DuplicateEmail`] when another
    /// live account already owns the email.
    async fn create(&self, new_user: NewUser) -> Result<User, Error>;

    /// Find a user by id, including soft-deleted accounts.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error>;

    /// Find a live user by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error>;

    /// Apply a partial profile update, returning the updated user.
    ///
    /// Returns `Ok(None)` when the user does not exist or is soft-deleted.
    async fn update_profile(
        &self,
        id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, Error>;

    /// Replace the stored credential hash.
    async fn set_password_hash(&self, id: &UserId, password_hash: &str) -> Result<(), Error>;

    /// Record a successful authentication time.
    async fn set_last_login(&self, id: &UserId) -> Result<(), Error>;

    /// Mark the account's email address as verified.
    async fn mark_email_verified(&self, id: &UserId) -> Result<(), Error>;

    /// Soft-delete an account: set `deleted_at`, replace email and name with
    /// the given placeholders and clear the credential hash.
    ///
    /// Idempotent; anonymizing an already-deleted account is a no-op.
    async fn anonymize(
        &self,
        id: &UserId,
        placeholder_email: &str,
        placeholder_name: &str,
    ) -> Result<(), Error>;
}
