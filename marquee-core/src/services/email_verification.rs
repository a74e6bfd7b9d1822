use std::sync::Arc;

use chrono::Duration;

use crate::{
    Error, UserId,
    error::AuthError,
    repositories::{TokenRepository, UserRepository},
    token::{OneTimeToken, TokenPurpose},
};

/// Service for confirming account email addresses
pub struct EmailVerificationService<T: TokenRepository, U: UserRepository> {
    token_repository: Arc<T>,
    user_repository: Arc<U>,
}

impl<T: TokenRepository, U: UserRepository> EmailVerificationService<T, U> {
    /// Create a new EmailVerificationService with the given repositories
    pub fn new(token_repository: Arc<T>, user_repository: Arc<U>) -> Self {
        Self {
            token_repository,
            user_repository,
        }
    }

    /// Issue a verification token for a user's current email address.
    ///
    /// Returns `Ok(None)` when the user does not exist, is soft-deleted or is
    /// already verified. Issuing a new token invalidates any earlier unused
    /// one.
    pub async fn request_verification(
        &self,
        user_id: &UserId,
        expires_in: Duration,
    ) -> Result<Option<OneTimeToken>, Error> {
        let user = self.user_repository.find_by_id(user_id).await?;
        let Some(user) = user.filter(|u| !u.is_deleted() && !u.email_verified) else {
            return Ok(None);
        };

        let token = self
            .token_repository
            .create(&user.id, TokenPurpose::EmailVerification, expires_in)
            .await?;
        tracing::info!(user_id = %user.id, "Issued email verification token");
        Ok(Some(token))
    }

    /// Consume a verification token and mark the owner's email verified.
    ///
    /// The consume and the flag update happen in one repository transaction,
    /// so a token is never burned without the flag being set. Fails with
    /// [`AuthError::InvalidCredentials`] for unknown, used or expired tokens.
    /// Returns the verified user's id.
    pub async fn verify_email(&self, token: &str) -> Result<UserId, Error> {
        let token = self
            .token_repository
            .find_valid(token, TokenPurpose::EmailVerification)
            .await?
            .ok_or(Error::Auth(AuthError::InvalidCredentials))?;

        self.token_repository
            .consume_email_verification(&token.id, &token.user_id)
            .await?;

        tracing::info!(user_id = %token.user_id, "Marked email verified");
        Ok(token.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mocks::{MockTokenRepository, MockUserRepository};
    use crate::user::{NewUser, User};

    async fn setup() -> (
        EmailVerificationService<MockTokenRepository, MockUserRepository>,
        Arc<MockUserRepository>,
        User,
    ) {
        let user_repo = Arc::new(MockUserRepository::default());
        let token_repo = Arc::new(MockTokenRepository::sharing_users(user_repo.users.clone()));

        let user = crate::repositories::UserRepository::create(
            user_repo.as_ref(),
            NewUser::builder()
                .email("viewer@example.com".to_string())
                .build()
                .unwrap(),
        )
        .await
        .unwrap();

        let service = EmailVerificationService::new(token_repo, user_repo.clone());
        (service, user_repo, user)
    }

    #[tokio::test]
    async fn test_request_and_verify() {
        let (service, user_repo, user) = setup().await;

        let token = service
            .request_verification(&user.id, Duration::hours(24))
            .await
            .unwrap()
            .expect("token should be issued");
        assert_eq!(token.purpose, TokenPurpose::EmailVerification);

        let verified_id = service.verify_email(&token.token).await.unwrap();
        assert_eq!(verified_id, user.id);

        let stored = user_repo.users.lock().await.get(&user.id).cloned().unwrap();
        assert!(stored.email_verified);
    }

    #[tokio::test]
    async fn test_verify_token_is_single_use() {
        let (service, _, user) = setup().await;

        let token = service
            .request_verification(&user.id, Duration::hours(24))
            .await
            .unwrap()
            .unwrap();

        service.verify_email(&token.token).await.unwrap();

        let result = service.verify_email(&token.token).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::Auth(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_already_verified_user_gets_no_token() {
        let (service, user_repo, user) = setup().await;

        crate::repositories::UserRepository::mark_email_verified(user_repo.as_ref(), &user.id)
            .await
            .unwrap();

        let result = service
            .request_verification(&user.id, Duration::hours(24))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let (service, user_repo, user) = setup().await;

        let token = service
            .request_verification(&user.id, Duration::seconds(-1))
            .await
            .unwrap()
            .unwrap();

        let result = service.verify_email(&token.token).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::Auth(AuthError::InvalidCredentials)
        ));

        // Flag untouched
        let stored = user_repo.users.lock().await.get(&user.id).cloned().unwrap();
        assert!(!stored.email_verified);
    }

    #[tokio::test]
    async fn test_reset_token_cannot_verify_email() {
        let (service, user_repo, user) = setup().await;

        // Issue a password-reset token for the same user directly
        let token_repo = MockTokenRepository::sharing_users(user_repo.users.clone());
        let reset = crate::repositories::TokenRepository::create(
            &token_repo,
            &user.id,
            TokenPurpose::PasswordReset,
            Duration::hours(1),
        )
        .await
        .unwrap();

        let result = service.verify_email(&reset.token).await;
        assert!(result.is_err());
    }
}
