//! In-memory mock repositories shared by the service tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use crate::{
    Error,
    crypto::generate_token,
    error::AuthError,
    oauth::{NewOAuthLink, OAuthAccount, OAuthLinkId},
    repositories::{OAuthRepository, SessionRepository, TokenRepository, UserRepository},
    session::{Session, SessionToken},
    token::{OneTimeToken, TokenId, TokenPurpose},
    user::{NewUser, ProfileUpdate, User, UserId},
};

#[derive(Default)]
pub(crate) struct MockUserRepository {
    pub users: Arc<Mutex<HashMap<UserId, User>>>,
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn create(&self, new_user: NewUser) -> Result<User, Error> {
        let mut users = self.users.lock().await;
        if users
            .values()
            .any(|u| u.deleted_at.is_none() && u.email == new_user.email)
        {
            return Err(AuthError::DuplicateEmail.into());
        }

        let now = Utc::now();
        let user = User {
            id: new_user.id,
            email: new_user.email,
            password_hash: new_user.password_hash,
            name: new_user.name,
            profile_image_url: new_user.profile_image_url,
            timezone: None,
            role: new_user.role,
            email_verified: new_user.email_verified,
            last_login_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        Ok(self.users.lock().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|u| u.deleted_at.is_none() && u.email == email)
            .cloned())
    }

    async fn update_profile(
        &self,
        id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, Error> {
        let mut users = self.users.lock().await;
        let Some(user) = users.get_mut(id).filter(|u| u.deleted_at.is_none()) else {
            return Ok(None);
        };
        if let Some(name) = &update.name {
            user.name = Some(name.clone());
        }
        if let Some(url) = &update.profile_image_url {
            user.profile_image_url = Some(url.clone());
        }
        if let Some(tz) = &update.timezone {
            user.timezone = Some(tz.clone());
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_password_hash(&self, id: &UserId, password_hash: &str) -> Result<(), Error> {
        if let Some(user) = self.users.lock().await.get_mut(id) {
            user.password_hash = Some(password_hash.to_string());
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_last_login(&self, id: &UserId) -> Result<(), Error> {
        if let Some(user) = self.users.lock().await.get_mut(id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_email_verified(&self, id: &UserId) -> Result<(), Error> {
        if let Some(user) = self.users.lock().await.get_mut(id) {
            user.email_verified = true;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn anonymize(
        &self,
        id: &UserId,
        placeholder_email: &str,
        placeholder_name: &str,
    ) -> Result<(), Error> {
        if let Some(user) = self.users.lock().await.get_mut(id) {
            if user.deleted_at.is_some() {
                return Ok(());
            }
            user.email = placeholder_email.to_string();
            user.name = Some(placeholder_name.to_string());
            user.password_hash = None;
            user.deleted_at = Some(Utc::now());
            user.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MockSessionRepository {
    pub sessions: Arc<Mutex<HashMap<SessionToken, Session>>>,
}

#[async_trait]
impl SessionRepository for MockSessionRepository {
    async fn create(&self, session: Session) -> Result<Session, Error> {
        self.sessions
            .lock()
            .await
            .insert(session.token.clone(), session.clone());
        Ok(session)
    }

    async fn find_by_token(&self, token: &SessionToken) -> Result<Option<Session>, Error> {
        Ok(self.sessions.lock().await.get(token).cloned())
    }

    async fn delete(&self, token: &SessionToken) -> Result<(), Error> {
        self.sessions.lock().await.remove(token);
        Ok(())
    }

    async fn delete_by_user_id(&self, user_id: &UserId) -> Result<(), Error> {
        self.sessions
            .lock()
            .await
            .retain(|_, s| s.user_id != *user_id);
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<(), Error> {
        let now = Utc::now();
        self.sessions.lock().await.retain(|_, s| s.expires_at > now);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MockOAuthRepository {
    pub links: Arc<Mutex<HashMap<OAuthLinkId, OAuthAccount>>>,
}

#[async_trait]
impl OAuthRepository for MockOAuthRepository {
    async fn create_link(&self, link: NewOAuthLink) -> Result<OAuthAccount, Error> {
        let mut links = self.links.lock().await;
        if links
            .values()
            .any(|l| l.provider == link.provider && l.subject == link.subject)
        {
            return Err(AuthError::AccountAlreadyLinked.into());
        }

        let now = Utc::now();
        let account = OAuthAccount {
            id: OAuthLinkId::new_random(),
            user_id: link.user_id,
            provider: link.provider,
            subject: link.subject,
            access_token: link.access_token,
            refresh_token: link.refresh_token,
            created_at: now,
            updated_at: now,
        };
        links.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn find_by_provider(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<OAuthAccount>, Error> {
        Ok(self
            .links
            .lock()
            .await
            .values()
            .find(|l| l.provider == provider && l.subject == subject)
            .cloned())
    }

    async fn find_links_for_user(&self, user_id: &UserId) -> Result<Vec<OAuthAccount>, Error> {
        Ok(self
            .links
            .lock()
            .await
            .values()
            .filter(|l| l.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn update_tokens(
        &self,
        link_id: &OAuthLinkId,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), Error> {
        if let Some(link) = self.links.lock().await.get_mut(link_id) {
            link.access_token = access_token.map(str::to_string);
            link.refresh_token = refresh_token.map(str::to_string);
            link.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_link(&self, link_id: &OAuthLinkId) -> Result<(), Error> {
        self.links.lock().await.remove(link_id);
        Ok(())
    }
}

pub(crate) struct MockTokenRepository {
    pub tokens: Arc<Mutex<HashMap<TokenId, OneTimeToken>>>,
    /// Shared with a [`MockUserRepository`] so email verification can flip
    /// the user flag the way a real backend does in one transaction.
    pub users: Arc<Mutex<HashMap<UserId, User>>>,
}

impl MockTokenRepository {
    pub fn sharing_users(users: Arc<Mutex<HashMap<UserId, User>>>) -> Self {
        Self {
            tokens: Arc::default(),
            users,
        }
    }
}

impl Default for MockTokenRepository {
    fn default() -> Self {
        Self::sharing_users(Arc::default())
    }
}

#[async_trait]
impl TokenRepository for MockTokenRepository {
    async fn create(
        &self,
        user_id: &UserId,
        purpose: TokenPurpose,
        expires_in: Duration,
    ) -> Result<OneTimeToken, Error> {
        let mut tokens = self.tokens.lock().await;
        tokens.retain(|_, t| {
            !(t.user_id == *user_id && t.purpose == purpose && t.used_at.is_none())
        });

        let now = Utc::now();
        let token = OneTimeToken {
            id: TokenId::new_random(),
            user_id: user_id.clone(),
            token: generate_token(),
            purpose,
            expires_at: now + expires_in,
            used_at: None,
            created_at: now,
        };
        tokens.insert(token.id.clone(), token.clone());
        Ok(token)
    }

    async fn find_valid(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<OneTimeToken>, Error> {
        Ok(self
            .tokens
            .lock()
            .await
            .values()
            .find(|t| t.token == token && t.purpose == purpose && t.is_valid())
            .cloned())
    }

    async fn mark_used(&self, token_id: &TokenId) -> Result<(), Error> {
        let mut tokens = self.tokens.lock().await;
        let token = tokens
            .get_mut(token_id)
            .ok_or(Error::Auth(AuthError::InvalidCredentials))?;
        if token.used_at.is_some() {
            return Err(AuthError::InvalidCredentials.into());
        }
        token.used_at = Some(Utc::now());
        Ok(())
    }

    async fn consume_email_verification(
        &self,
        token_id: &TokenId,
        user_id: &UserId,
    ) -> Result<(), Error> {
        let mut tokens = self.tokens.lock().await;
        let token = tokens
            .get_mut(token_id)
            .ok_or(Error::Auth(AuthError::InvalidCredentials))?;
        if !token.is_valid()
            || token.purpose != TokenPurpose::EmailVerification
            || token.user_id != *user_id
        {
            return Err(AuthError::InvalidCredentials.into());
        }
        token.used_at = Some(Utc::now());

        if let Some(user) = self.users.lock().await.get_mut(user_id) {
            user.email_verified = true;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<(), Error> {
        let now = Utc::now();
        self.tokens.lock().await.retain(|_, t| t.expires_at > now);
        Ok(())
    }
}
