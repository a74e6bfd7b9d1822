//! Repository implementations for SQLite storage

pub mod oauth;
pub mod session;
pub mod token;
pub mod user;

pub use oauth::SqliteOAuthRepository;
pub use session::SqliteSessionRepository;
pub use token::SqliteTokenRepository;
pub use user::SqliteUserRepository;

use async_trait::async_trait;
use marquee_core::{
    Error,
    error::StorageError,
    repositories::{
        OAuthRepositoryProvider, RepositoryProvider, SessionRepositoryProvider,
        TokenRepositoryProvider, UserRepositoryProvider,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::migrations::{SqliteMigrationManager, all_migrations};

/// Repository provider implementation for SQLite
///
/// This struct implements all the individual repository provider traits
/// as well as the unified `RepositoryProvider` trait.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    user: Arc<SqliteUserRepository>,
    session: Arc<SqliteSessionRepository>,
    oauth: Arc<SqliteOAuthRepository>,
    token: Arc<SqliteTokenRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let user = Arc::new(SqliteUserRepository::new(pool.clone()));
        let session = Arc::new(SqliteSessionRepository::new(pool.clone()));
        let oauth = Arc::new(SqliteOAuthRepository::new(pool.clone()));
        let token = Arc::new(SqliteTokenRepository::new(pool.clone()));

        Self {
            pool,
            user,
            session,
            oauth,
            token,
        }
    }

    /// Open a pool for the given SQLite URL and wrap it in a provider.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;
        Ok(Self::new(pool))
    }
}

// Implement individual provider traits

impl UserRepositoryProvider for SqliteRepositoryProvider {
    type UserRepo = SqliteUserRepository;

    fn user(&self) -> &Self::UserRepo {
        &self.user
    }
}

impl SessionRepositoryProvider for SqliteRepositoryProvider {
    type SessionRepo = SqliteSessionRepository;

    fn session(&self) -> &Self::SessionRepo {
        &self.session
    }
}

impl OAuthRepositoryProvider for SqliteRepositoryProvider {
    type OAuthRepo = SqliteOAuthRepository;

    fn oauth(&self) -> &Self::OAuthRepo {
        &self.oauth
    }
}

impl TokenRepositoryProvider for SqliteRepositoryProvider {
    type TokenRepo = SqliteTokenRepository;

    fn token(&self) -> &Self::TokenRepo {
        &self.token
    }
}

// Implement the unified RepositoryProvider trait

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await?;
        manager.up(&all_migrations()).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;
        Ok(())
    }
}
