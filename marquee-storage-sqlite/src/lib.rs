//! SQLite storage backend for marquee
//!
//! Implements the `marquee-core` repository traits on top of `sqlx` and
//! SQLite. Timestamps are stored as unix seconds; booleans as integers.
//!
//! Connect with [`SqliteRepositoryProvider::connect`] and run
//! `migrate()` before first use:
//!
//! ```rust,no_run
//! use marquee_storage_sqlite::SqliteRepositoryProvider;
//! use marquee_core::repositories::RepositoryProvider;
//!
//! # async fn example() -> Result<(), marquee_core::Error> {
//! let provider = SqliteRepositoryProvider::connect("sqlite://marquee.db?mode=rwc").await?;
//! provider.migrate().await?;
//! # Ok(())
//! # }
//! ```

pub mod migrations;
pub mod repositories;

pub use repositories::{
    SqliteOAuthRepository, SqliteRepositoryProvider, SqliteSessionRepository,
    SqliteTokenRepository, SqliteUserRepository,
};
