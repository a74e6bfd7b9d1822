use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{
    Error, Session, User, UserId,
    repositories::{SessionRepository, UserRepository},
    session::SessionToken,
};

/// Service for session management operations
pub struct SessionService<S: SessionRepository, U: UserRepository> {
    session_repository: Arc<S>,
    user_repository: Arc<U>,
}

impl<S: SessionRepository, U: UserRepository> SessionService<S, U> {
    /// Create a new SessionService with the given repositories
    pub fn new(session_repository: Arc<S>, user_repository: Arc<U>) -> Self {
        Self {
            session_repository,
            user_repository,
        }
    }

    /// Create a new session for a user
    pub async fn create_session(
        &self,
        user_id: &UserId,
        user_agent: Option<String>,
        ip_address: Option<String>,
        expires_in: Duration,
    ) -> Result<Session, Error> {
        let now = Utc::now();
        let session = Session {
            token: SessionToken::new_random(),
            user_id: user_id.clone(),
            user_agent,
            ip_address,
            created_at: now,
            expires_at: now + expires_in,
        };

        let session = self.session_repository.create(session).await?;
        tracing::debug!(user_id = %session.user_id, "Created session");
        Ok(session)
    }

    /// Resolve a bearer token to its session and owning user.
    ///
    /// Returns `Ok(None)` for unknown tokens, expired sessions and sessions
    /// whose owner was soft-deleted. Expiry is lazy: an expired row is
    /// deleted here, at read time, so a second presentation of the same
    /// token misses outright.
    pub async fn authenticate_session(
        &self,
        token: &SessionToken,
    ) -> Result<Option<(Session, User)>, Error> {
        let Some(session) = self.session_repository.find_by_token(token).await? else {
            return Ok(None);
        };

        if session.is_expired() {
            self.session_repository.delete(token).await?;
            tracing::debug!(user_id = %session.user_id, "Deleted expired session at read");
            return Ok(None);
        }

        let user = self.user_repository.find_by_id(&session.user_id).await?;
        let Some(user) = user.filter(|u| !u.is_deleted()) else {
            // Sessions of deleted users are dead weight; drop them on contact.
            self.session_repository
                .delete_by_user_id(&session.user_id)
                .await?;
            return Ok(None);
        };

        Ok(Some((session, user)))
    }

    /// Delete a session
    pub async fn delete_session(&self, token: &SessionToken) -> Result<(), Error> {
        self.session_repository.delete(token).await
    }

    /// Delete all sessions for a user
    pub async fn delete_user_sessions(&self, user_id: &UserId) -> Result<(), Error> {
        self.session_repository.delete_by_user_id(user_id).await
    }

    /// Clean up expired sessions
    pub async fn cleanup_expired_sessions(&self) -> Result<(), Error> {
        self.session_repository.cleanup_expired().await
    }
}
