//! Service layer for business logic
//!
//! This module contains concrete service implementations that encapsulate
//! account, session, OAuth link and one-time-token logic on top of the
//! repository traits.

pub mod account;
pub mod email_verification;
pub mod oauth_link;
pub mod password_reset;
pub mod session;

pub use account::AccountService;
pub use email_verification::EmailVerificationService;
pub use oauth_link::OAuthLinkService;
pub use password_reset::PasswordResetService;
pub use session::SessionService;

#[cfg(test)]
pub(crate) mod mocks;
