//! Repository traits for data access layer
//!
//! These traits are the only write path to the user, session, OAuth link and
//! one-time-token tables; no other part of the system touches those tables
//! directly. Services depend on the traits, storage backends implement them.
//!
//! Expected "no result" conditions are communicated via `Ok(None)`, never as
//! errors; distinguishable failures are reserved for constraint violations
//! and connectivity problems.

pub mod adapter;
pub mod oauth;
pub mod session;
pub mod token;
pub mod user;

pub use adapter::{
    OAuthRepositoryAdapter, SessionRepositoryAdapter, TokenRepositoryAdapter,
    UserRepositoryAdapter,
};
pub use oauth::OAuthRepository;
pub use session::SessionRepository;
pub use token::TokenRepository;
pub use user::UserRepository;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for user repository access.
pub trait UserRepositoryProvider: Send + Sync + 'static {
    type UserRepo: UserRepository;

    fn user(&self) -> &Self::UserRepo;
}

/// Provider trait for session repository access.
pub trait SessionRepositoryProvider: Send + Sync + 'static {
    type SessionRepo: SessionRepository;

    fn session(&self) -> &Self::SessionRepo;
}

/// Provider trait for OAuth link repository access.
pub trait OAuthRepositoryProvider: Send + Sync + 'static {
    type OAuthRepo: OAuthRepository;

    fn oauth(&self) -> &Self::OAuthRepo;
}

/// Provider trait for one-time-token repository access.
pub trait TokenRepositoryProvider: Send + Sync + 'static {
    type TokenRepo: TokenRepository;

    fn token(&self) -> &Self::TokenRepo;
}

/// Provider trait that storage implementations must implement to provide all
/// repositories, plus lifecycle methods for migrations and health checks.
///
/// To implement a custom storage backend:
/// 1. Implement each individual `*Repository` trait for your backend
/// 2. Implement each individual `*RepositoryProvider` trait
/// 3. Implement this trait with `migrate()` and `health_check()`
#[async_trait]
pub trait RepositoryProvider:
    UserRepositoryProvider
    + SessionRepositoryProvider
    + OAuthRepositoryProvider
    + TokenRepositoryProvider
{
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
