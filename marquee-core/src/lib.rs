//! Core functionality for the marquee project
//!
//! This crate contains the account, session, OAuth link and one-time-token
//! domain types, the repository traits storage backends implement, and the
//! services that hold the authentication logic.
//!
//! It is designed to be used as a dependency by storage backends and by the
//! `marquee` facade crate, not directly by application code.
//!
//! See [`User`] for the core user struct, [`Session`] for sessions, and
//! [`repositories::RepositoryProvider`] for the storage contract.

pub mod crypto;
pub mod error;
pub mod id;
pub mod oauth;
pub mod password;
pub mod ratelimit;
pub mod repositories;
pub mod services;
pub mod session;
pub mod token;
pub mod user;
pub mod validation;

pub use error::Error;
pub use oauth::{OAuthAccount, OAuthLinkId, OAuthProvider};
pub use ratelimit::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use session::{Session, SessionToken};
pub use token::{OneTimeToken, TokenId, TokenPurpose};
pub use user::{User, UserId, UserRole};
