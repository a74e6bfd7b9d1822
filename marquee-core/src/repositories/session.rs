//! Session repository trait

use async_trait::async_trait;

use crate::{
    Error,
    session::{Session, SessionToken},
    user::UserId,
};

/// Data access for sessions.
///
/// Expiry is enforced by the service layer at read time; this trait only
/// stores and retrieves rows. `find_by_token` returns expired rows so the
/// caller can delete them lazily.
#[async_trait]
pub trait SessionRepository: Send + Sync + 'static {
    /// Persist a new session.
    async fn create(&self, session: Session) -> Result<Session, Error>;

    /// Find a session by its opaque token, expired or not.
    async fn find_by_token(&self, token: &SessionToken) -> Result<Option<Session>, Error>;

    /// Delete a single session. Deleting an absent token is a no-op.
    async fn delete(&self, token: &SessionToken) -> Result<(), Error>;

    /// Delete every session belonging to a user.
    async fn delete_by_user_id(&self, user_id: &UserId) -> Result<(), Error>;

    /// Delete all sessions whose expiry has passed.
    async fn cleanup_expired(&self) -> Result<(), Error>;
}
