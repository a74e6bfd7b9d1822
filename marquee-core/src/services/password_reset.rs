use std::sync::Arc;

use chrono::Duration;

use crate::{
    Error, UserId,
    error::AuthError,
    password::hash_password,
    repositories::{SessionRepository, TokenRepository, UserRepository},
    token::{OneTimeToken, TokenPurpose},
    validation::{normalize_email, validate_password},
};

/// Service for the forgot-password flow
pub struct PasswordResetService<T: TokenRepository, U: UserRepository, S: SessionRepository> {
    token_repository: Arc<T>,
    user_repository: Arc<U>,
    session_repository: Arc<S>,
}

impl<T: TokenRepository, U: UserRepository, S: SessionRepository>
    PasswordResetService<T, U, S>
{
    /// Create a new PasswordResetService with the given repositories
    pub fn new(
        token_repository: Arc<T>,
        user_repository: Arc<U>,
        session_repository: Arc<S>,
    ) -> Self {
        Self {
            token_repository,
            user_repository,
            session_repository,
        }
    }

    /// Issue a password-reset token for the account owning `email`.
    ///
    /// Returns `Ok(None)` when no live account owns the email, so callers
    /// respond identically whether or not the address exists. Issuing a new
    /// token invalidates any earlier unused one for the same account.
    pub async fn request_reset(
        &self,
        email: &str,
        expires_in: Duration,
    ) -> Result<Option<OneTimeToken>, Error> {
        let email = normalize_email(email);
        let Some(user) = self.user_repository.find_by_email(&email).await? else {
            return Ok(None);
        };

        let token = self
            .token_repository
            .create(&user.id, TokenPurpose::PasswordReset, expires_in)
            .await?;
        tracing::info!(user_id = %user.id, "Issued password reset token");
        Ok(Some(token))
    }

    /// Look up a reset token without consuming it (e.g. to render the form).
    pub async fn find_valid_token(&self, token: &str) -> Result<Option<OneTimeToken>, Error> {
        self.token_repository
            .find_valid(token, TokenPurpose::PasswordReset)
            .await
    }

    /// Consume a reset token and set the new password.
    ///
    /// Fails with [`AuthError::InvalidCredentials`] for unknown, used or
    /// expired tokens. On success every session of the user is revoked,
    /// returning the owning user's id.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<UserId, Error> {
        validate_password(new_password)?;

        let token = self
            .token_repository
            .find_valid(token, TokenPurpose::PasswordReset)
            .await?
            .ok_or(Error::Auth(AuthError::InvalidCredentials))?;

        self.token_repository.mark_used(&token.id).await?;

        let hash = hash_password(new_password)?;
        self.user_repository
            .set_password_hash(&token.user_id, &hash)
            .await?;

        // A reset proves control of the email, not of existing devices.
        self.session_repository
            .delete_by_user_id(&token.user_id)
            .await?;

        tracing::info!(user_id = %token.user_id, "Reset password and revoked sessions");
        Ok(token.user_id)
    }

    /// Delete all expired reset and verification tokens.
    pub async fn cleanup_expired_tokens(&self) -> Result<(), Error> {
        self.token_repository.cleanup_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mocks::{
        MockSessionRepository, MockTokenRepository, MockUserRepository,
    };
    use crate::session::{Session, SessionToken};
    use crate::user::{NewUser, User};
    use chrono::Utc;

    async fn setup() -> (
        PasswordResetService<MockTokenRepository, MockUserRepository, MockSessionRepository>,
        Arc<MockTokenRepository>,
        Arc<MockUserRepository>,
        Arc<MockSessionRepository>,
        User,
    ) {
        let user_repo = Arc::new(MockUserRepository::default());
        let token_repo = Arc::new(MockTokenRepository::sharing_users(user_repo.users.clone()));
        let session_repo = Arc::new(MockSessionRepository::default());

        let user = crate::repositories::UserRepository::create(
            user_repo.as_ref(),
            NewUser::builder()
                .email("viewer@example.com".to_string())
                .password_hash(hash_password("password123").unwrap())
                .build()
                .unwrap(),
        )
        .await
        .unwrap();

        let service = PasswordResetService::new(
            token_repo.clone(),
            user_repo.clone(),
            session_repo.clone(),
        );
        (service, token_repo, user_repo, session_repo, user)
    }

    #[tokio::test]
    async fn test_request_reset_known_email() {
        let (service, _, _, _, user) = setup().await;

        let token = service
            .request_reset("viewer@example.com", Duration::hours(1))
            .await
            .unwrap()
            .expect("token should be issued");

        assert_eq!(token.user_id, user.id);
        assert_eq!(token.token.len(), 64);
        assert_eq!(token.purpose, TokenPurpose::PasswordReset);
        assert!(token.is_valid());
    }

    #[tokio::test]
    async fn test_request_reset_unknown_email() {
        let (service, token_repo, _, _, _) = setup().await;

        let result = service
            .request_reset("nobody@example.com", Duration::hours(1))
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(token_repo.tokens.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_new_request_invalidates_previous_token() {
        let (service, _, _, _, _) = setup().await;

        let first = service
            .request_reset("viewer@example.com", Duration::hours(1))
            .await
            .unwrap()
            .unwrap();
        let second = service
            .request_reset("viewer@example.com", Duration::hours(1))
            .await
            .unwrap()
            .unwrap();

        assert!(service.find_valid_token(&first.token).await.unwrap().is_none());
        assert!(
            service
                .find_valid_token(&second.token)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_reset_password_consumes_token_and_revokes_sessions() {
        let (service, _, user_repo, session_repo, user) = setup().await;

        crate::repositories::SessionRepository::create(
            session_repo.as_ref(),
            Session {
                token: SessionToken::new_random(),
                user_id: user.id.clone(),
                ip_address: None,
                user_agent: None,
                created_at: Utc::now(),
                expires_at: Utc::now() + Duration::days(30),
            },
        )
        .await
        .unwrap();

        let token = service
            .request_reset("viewer@example.com", Duration::hours(1))
            .await
            .unwrap()
            .unwrap();

        let old_hash = user.password_hash.clone().unwrap();
        let user_id = service
            .reset_password(&token.token, "newpassword456")
            .await
            .unwrap();
        assert_eq!(user_id, user.id);

        // Hash replaced, sessions gone
        let stored = user_repo.users.lock().await.get(&user.id).cloned().unwrap();
        assert_ne!(stored.password_hash.unwrap(), old_hash);
        assert!(session_repo.sessions.lock().await.is_empty());

        // Token is single-use
        let result = service.reset_password(&token.token, "anotherpass789").await;
        assert!(matches!(
            result.unwrap_err(),
            Error::Auth(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_reset_password_expired_token() {
        let (service, _, _, _, _) = setup().await;

        let token = service
            .request_reset("viewer@example.com", Duration::seconds(-1))
            .await
            .unwrap()
            .unwrap();

        let result = service.reset_password(&token.token, "newpassword456").await;
        assert!(matches!(
            result.unwrap_err(),
            Error::Auth(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_reset_password_rejects_weak_password() {
        let (service, _, _, _, _) = setup().await;

        let token = service
            .request_reset("viewer@example.com", Duration::hours(1))
            .await
            .unwrap()
            .unwrap();

        let result = service.reset_password(&token.token, "weak").await;
        assert!(result.is_err());

        // Weak password must not consume the token
        assert!(
            service
                .find_valid_token(&token.token)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_reset_password_unknown_token() {
        let (service, _, _, _, _) = setup().await;

        let result = service
            .reset_password(&crate::crypto::generate_token(), "newpassword456")
            .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::Auth(AuthError::InvalidCredentials)
        ));
    }
}
