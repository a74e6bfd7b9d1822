//! Adapters bridging a [`RepositoryProvider`] to the individual repository
//! traits, so services can be built from a single provider handle.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use crate::{
    Error,
    oauth::{NewOAuthLink, OAuthAccount, OAuthLinkId},
    repositories::{
        OAuthRepository, RepositoryProvider, SessionRepository, TokenRepository, UserRepository,
    },
    session::{Session, SessionToken},
    token::{OneTimeToken, TokenId, TokenPurpose},
    user::{NewUser, ProfileUpdate, User, UserId},
};

pub struct UserRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> UserRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> UserRepository for UserRepositoryAdapter<R> {
    async fn create(&self, new_user: NewUser) -> Result<User, Error> {
        self.provider.user().create(new_user).await
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        self.provider.user().find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.provider.user().find_by_email(email).await
    }

    async fn update_profile(
        &self,
        id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, Error> {
        self.provider.user().update_profile(id, update).await
    }

    async fn set_password_hash(&self, id: &UserId, password_hash: &str) -> Result<(), Error> {
        self.provider.user().set_password_hash(id, password_hash).await
    }

    async fn set_last_login(&self, id: &UserId) -> Result<(), Error> {
        self.provider.user().set_last_login(id).await
    }

    async fn mark_email_verified(&self, id: &UserId) -> Result<(), Error> {
        self.provider.user().mark_email_verified(id).await
    }

    async fn anonymize(
        &self,
        id: &UserId,
        placeholder_email: &str,
        placeholder_name: &str,
    ) -> Result<(), Error> {
        self.provider
            .user()
            .anonymize(id, placeholder_email, placeholder_name)
            .await
    }
}

pub struct SessionRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> SessionRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> SessionRepository for SessionRepositoryAdapter<R> {
    async fn create(&self, session: Session) -> Result<Session, Error> {
        self.provider.session().create(session).await
    }

    async fn find_by_token(&self, token: &SessionToken) -> Result<Option<Session>, Error> {
        self.provider.session().find_by_token(token).await
    }

    async fn delete(&self, token: &SessionToken) -> Result<(), Error> {
        self.provider.session().delete(token).await
    }

    async fn delete_by_user_id(&self, user_id: &UserId) -> Result<(), Error> {
        self.provider.session().delete_by_user_id(user_id).await
    }

    async fn cleanup_expired(&self) -> Result<(), Error> {
        self.provider.session().cleanup_expired().await
    }
}

pub struct OAuthRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> OAuthRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> OAuthRepository for OAuthRepositoryAdapter<R> {
    async fn create_link(&self, link: NewOAuthLink) -> Result<OAuthAccount, Error> {
        self.provider.oauth().create_link(link).await
    }

    async fn find_by_provider(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<OAuthAccount>, Error> {
        self.provider.oauth().find_by_provider(provider, subject).await
    }

    async fn find_links_for_user(&self, user_id: &UserId) -> Result<Vec<OAuthAccount>, Error> {
        self.provider.oauth().find_links_for_user(user_id).await
    }

    async fn update_tokens(
        &self,
        link_id: &OAuthLinkId,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), Error> {
        self.provider
            .oauth()
            .update_tokens(link_id, access_token, refresh_token)
            .await
    }

    async fn delete_link(&self, link_id: &OAuthLinkId) -> Result<(), Error> {
        self.provider.oauth().delete_link(link_id).await
    }
}

pub struct TokenRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> TokenRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> TokenRepository for TokenRepositoryAdapter<R> {
    async fn create(
        &self,
        user_id: &UserId,
        purpose: TokenPurpose,
        expires_in: Duration,
    ) -> Result<OneTimeToken, Error> {
        self.provider.token().create(user_id, purpose, expires_in).await
    }

    async fn find_valid(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<OneTimeToken>, Error> {
        self.provider.token().find_valid(token, purpose).await
    }

    async fn mark_used(&self, token_id: &TokenId) -> Result<(), Error> {
        self.provider.token().mark_used(token_id).await
    }

    async fn consume_email_verification(
        &self,
        token_id: &TokenId,
        user_id: &UserId,
    ) -> Result<(), Error> {
        self.provider
            .token()
            .consume_email_verification(token_id, user_id)
            .await
    }

    async fn cleanup_expired(&self) -> Result<(), Error> {
        self.provider.token().cleanup_expired().await
    }
}
