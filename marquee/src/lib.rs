//! # Marquee
//!
//! Marquee is the account and session core for self-hosted streaming
//! applications. It owns registration, password and OAuth sign-in, session
//! tokens, account soft-deletion and the password-reset and
//! email-verification flows, while letting you store user data wherever you
//! choose through pluggable storage backends.
//!
//! What you get:
//! - Password authentication with scrypt credential hashing
//! - OAuth account links behind a provider-agnostic capability trait
//! - Opaque database-backed session tokens with lazy expiry
//! - Single-use password-reset and email-verification tokens
//! - Fixed-window rate limiting on login and forgot-password
//!
//! ## Storage Support
//!
//! Marquee currently ships a SQLite backend; any store can participate by
//! implementing [`marquee_core::repositories::RepositoryProvider`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use marquee::Marquee;
//! use marquee_storage_sqlite::SqliteRepositoryProvider;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
//!     let repositories = Arc::new(SqliteRepositoryProvider::new(pool));
//!
//!     let marquee = Marquee::new(repositories);
//!     marquee.migrate().await.unwrap();
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use marquee_core::{
    RateLimiter,
    repositories::{
        OAuthRepositoryAdapter, RepositoryProvider, SessionRepositoryAdapter,
        TokenRepositoryAdapter, UserRepositoryAdapter,
    },
    services::{
        AccountService, EmailVerificationService, OAuthLinkService, PasswordResetService,
        SessionService,
    },
    validation::normalize_email,
};

/// Re-export core types from marquee_core
///
/// These types are commonly used when working with the Marquee API.
pub use marquee_core::{
    OAuthAccount, OAuthLinkId, OAuthProvider, OneTimeToken, RateLimitConfig, Session,
    SessionToken, TokenId, TokenPurpose, User, UserId, UserRole,
    oauth::NewOAuthLink, user::ProfileUpdate,
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature is enabled.
#[cfg(feature = "sqlite")]
pub use marquee_storage_sqlite::SqliteRepositoryProvider;

/// Errors that can occur when using Marquee.
#[derive(Debug, thiserror::Error)]
pub enum MarqueeError {
    /// Error during authentication or validation
    #[error("Auth error: {0}")]
    AuthError(String),
    /// Too many attempts; retry after the given instant
    #[error("Rate limited until {retry_after}")]
    RateLimited { retry_after: DateTime<Utc> },
    /// Error when interacting with storage
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<marquee_core::Error> for MarqueeError {
    fn from(e: marquee_core::Error) -> Self {
        use marquee_core::error::AuthError;
        match e {
            marquee_core::Error::Auth(AuthError::RateLimited(retry_after)) => {
                MarqueeError::RateLimited { retry_after }
            }
            marquee_core::Error::Storage(_) => MarqueeError::StorageError(e.to_string()),
            _ => MarqueeError::AuthError(e.to_string()),
        }
    }
}

/// Configuration for token lifetimes and rate limits.
///
/// Every field has a sensible default; construct with [`Default`], tweak
/// with the builder-style setters, or read overrides from `MARQUEE_*`
/// environment variables via [`MarqueeConfig::from_env`].
#[derive(Debug, Clone)]
pub struct MarqueeConfig {
    /// The duration until a session expires
    pub session_expires_in: Duration,
    /// The duration until a password-reset token expires
    pub reset_token_expires_in: Duration,
    /// The duration until an email-verification token expires
    pub verification_token_expires_in: Duration,
    /// Limit for login attempts, keyed by normalized email
    pub login_rate_limit: RateLimitConfig,
    /// Limit for forgot-password requests, keyed by normalized email
    pub reset_rate_limit: RateLimitConfig,
}

impl Default for MarqueeConfig {
    fn default() -> Self {
        Self {
            session_expires_in: Duration::days(30),
            reset_token_expires_in: Duration::hours(1),
            verification_token_expires_in: Duration::hours(24),
            login_rate_limit: RateLimitConfig::new(5, 15),
            reset_rate_limit: RateLimitConfig::new(3, 60),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl MarqueeConfig {
    /// Build a config from `MARQUEE_*` environment variables, falling back
    /// to the defaults for anything unset or unparsable.
    ///
    /// Recognized variables:
    /// - `MARQUEE_SESSION_TTL_DAYS`
    /// - `MARQUEE_RESET_TOKEN_TTL_MINUTES`
    /// - `MARQUEE_VERIFICATION_TOKEN_TTL_HOURS`
    /// - `MARQUEE_LOGIN_MAX_ATTEMPTS`, `MARQUEE_LOGIN_WINDOW_MINUTES`
    /// - `MARQUEE_RESET_MAX_ATTEMPTS`, `MARQUEE_RESET_WINDOW_MINUTES`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            session_expires_in: env_parse("MARQUEE_SESSION_TTL_DAYS")
                .map(Duration::days)
                .unwrap_or(defaults.session_expires_in),
            reset_token_expires_in: env_parse("MARQUEE_RESET_TOKEN_TTL_MINUTES")
                .map(Duration::minutes)
                .unwrap_or(defaults.reset_token_expires_in),
            verification_token_expires_in: env_parse("MARQUEE_VERIFICATION_TOKEN_TTL_HOURS")
                .map(Duration::hours)
                .unwrap_or(defaults.verification_token_expires_in),
            login_rate_limit: RateLimitConfig::new(
                env_parse("MARQUEE_LOGIN_MAX_ATTEMPTS")
                    .unwrap_or(defaults.login_rate_limit.max_attempts),
                env_parse("MARQUEE_LOGIN_WINDOW_MINUTES")
                    .unwrap_or(defaults.login_rate_limit.window.num_minutes()),
            ),
            reset_rate_limit: RateLimitConfig::new(
                env_parse("MARQUEE_RESET_MAX_ATTEMPTS")
                    .unwrap_or(defaults.reset_rate_limit.max_attempts),
                env_parse("MARQUEE_RESET_WINDOW_MINUTES")
                    .unwrap_or(defaults.reset_rate_limit.window.num_minutes()),
            ),
        }
    }

    pub fn session_expires_in(mut self, duration: Duration) -> Self {
        self.session_expires_in = duration;
        self
    }

    pub fn login_rate_limit(mut self, limit: RateLimitConfig) -> Self {
        self.login_rate_limit = limit;
        self
    }

    pub fn reset_rate_limit(mut self, limit: RateLimitConfig) -> Self {
        self.reset_rate_limit = limit;
        self
    }
}

const LOGIN_LIMIT_KIND: &str = "login";
const RESET_LIMIT_KIND: &str = "forgot_password";

/// The main coordinator that wires services, storage and rate limiting.
///
/// `Marquee` is the single entry point applications talk to. It owns the
/// service layer and delegates persistence to the supplied
/// [`RepositoryProvider`].
///
/// # Example
///
/// ```rust,no_run
/// use marquee::{Marquee, UserId};
/// use marquee_storage_sqlite::SqliteRepositoryProvider;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = sqlx::SqlitePool::connect("sqlite::memory:").await?;
///     let repositories = Arc::new(SqliteRepositoryProvider::new(pool));
///
///     let marquee = Marquee::new(repositories);
///     marquee.migrate().await?;
///
///     let user = marquee
///         .register_user("viewer@example.com", "hunter2hunter2", None)
///         .await?;
///     println!("User: {:?}", user);
///
///     Ok(())
/// }
/// ```
pub struct Marquee<R: RepositoryProvider> {
    repositories: Arc<R>,
    accounts: Arc<AccountService<UserRepositoryAdapter<R>>>,
    sessions: Arc<SessionService<SessionRepositoryAdapter<R>, UserRepositoryAdapter<R>>>,
    oauth: Arc<OAuthLinkService<OAuthRepositoryAdapter<R>, UserRepositoryAdapter<R>>>,
    password_reset: Arc<
        PasswordResetService<
            TokenRepositoryAdapter<R>,
            UserRepositoryAdapter<R>,
            SessionRepositoryAdapter<R>,
        >,
    >,
    email_verification:
        Arc<EmailVerificationService<TokenRepositoryAdapter<R>, UserRepositoryAdapter<R>>>,
    rate_limiter: RateLimiter,
    config: MarqueeConfig,
}

impl<R: RepositoryProvider> Marquee<R> {
    /// Create a new Marquee instance with a repository provider and the
    /// default configuration.
    pub fn new(repositories: Arc<R>) -> Self {
        let user_repo = Arc::new(UserRepositoryAdapter::new(repositories.clone()));
        let session_repo = Arc::new(SessionRepositoryAdapter::new(repositories.clone()));
        let oauth_repo = Arc::new(OAuthRepositoryAdapter::new(repositories.clone()));
        let token_repo = Arc::new(TokenRepositoryAdapter::new(repositories.clone()));

        Self {
            repositories,
            accounts: Arc::new(AccountService::new(user_repo.clone())),
            sessions: Arc::new(SessionService::new(session_repo.clone(), user_repo.clone())),
            oauth: Arc::new(OAuthLinkService::new(oauth_repo, user_repo.clone())),
            password_reset: Arc::new(PasswordResetService::new(
                token_repo.clone(),
                user_repo.clone(),
                session_repo,
            )),
            email_verification: Arc::new(EmailVerificationService::new(token_repo, user_repo)),
            rate_limiter: RateLimiter::in_memory(),
            config: MarqueeConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: MarqueeConfig) -> Self {
        self.config = config;
        self
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), MarqueeError> {
        Ok(self.repositories.migrate().await?)
    }

    /// Health check for all repositories
    pub async fn health_check(&self) -> Result<(), MarqueeError> {
        Ok(self.repositories.health_check().await?)
    }

    /// Register a new account with an email and password.
    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<User, MarqueeError> {
        let user = self.accounts.create_user(email, password, name).await?;
        tracing::info!(user_id = %user.id, "Registered user");
        Ok(user)
    }

    /// Authenticate an email/password pair and open a session.
    ///
    /// Attempts are rate limited per normalized email; a successful login
    /// clears the counter. All credential failures surface as the same
    /// `AuthError`, never revealing whether the email exists.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> Result<(User, Session), MarqueeError> {
        let key = normalize_email(email);

        let decision = self
            .rate_limiter
            .check(LOGIN_LIMIT_KIND, &key, &self.config.login_rate_limit);
        if !decision.allowed {
            tracing::warn!(email = %key, "Login rate limited");
            return Err(MarqueeError::RateLimited {
                retry_after: decision.retry_after.unwrap_or_else(Utc::now),
            });
        }

        match self.accounts.authenticate(email, password).await? {
            Some(user) => {
                self.rate_limiter.reset(LOGIN_LIMIT_KIND, &key);
                let session = self
                    .sessions
                    .create_session(
                        &user.id,
                        user_agent,
                        ip_address,
                        self.config.session_expires_in,
                    )
                    .await?;
                tracing::info!(user_id = %user.id, "User logged in");
                Ok((user, session))
            }
            None => {
                self.rate_limiter
                    .record_attempt(LOGIN_LIMIT_KIND, &key, &self.config.login_rate_limit);
                Err(MarqueeError::AuthError("Invalid credentials".to_string()))
            }
        }
    }

    /// Resolve a session token to its session and owning user.
    ///
    /// Returns `Ok(None)` for unknown tokens, expired sessions (which are
    /// deleted on this read) and sessions of deleted accounts.
    pub async fn authenticate_session(
        &self,
        token: &SessionToken,
    ) -> Result<Option<(Session, User)>, MarqueeError> {
        Ok(self.sessions.authenticate_session(token).await?)
    }

    /// End a single session. Unknown tokens are a no-op.
    pub async fn logout(&self, token: &SessionToken) -> Result<(), MarqueeError> {
        Ok(self.sessions.delete_session(token).await?)
    }

    /// End every session the user has.
    pub async fn logout_all(&self, user_id: &UserId) -> Result<(), MarqueeError> {
        Ok(self.sessions.delete_user_sessions(user_id).await?)
    }

    /// Get a user by their ID
    pub async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, MarqueeError> {
        Ok(self.accounts.get_user(user_id).await?)
    }

    /// Apply a partial profile update.
    pub async fn update_profile(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, MarqueeError> {
        Ok(self.accounts.update_profile(user_id, update).await?)
    }

    /// Change a password, verifying the current one first.
    pub async fn change_password(
        &self,
        user_id: &UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), MarqueeError> {
        self.accounts
            .change_password(user_id, current_password, new_password)
            .await?;
        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Soft-delete an account and revoke all of its sessions.
    pub async fn delete_account(&self, user_id: &UserId) -> Result<(), MarqueeError> {
        self.accounts.delete_user(user_id).await?;
        self.sessions.delete_user_sessions(user_id).await?;
        tracing::info!(user_id = %user_id, "Account deleted");
        Ok(())
    }

    /// Create an account from a provider-asserted identity (no password).
    pub async fn create_oauth_user(
        &self,
        email: &str,
        name: Option<String>,
        profile_image_url: Option<String>,
    ) -> Result<User, MarqueeError> {
        let user = self
            .accounts
            .create_oauth_user(email, name, profile_image_url)
            .await?;
        tracing::info!(user_id = %user.id, "Registered OAuth user");
        Ok(user)
    }

    /// Link a provider identity to a user.
    pub async fn link_oauth_account(
        &self,
        link: NewOAuthLink,
    ) -> Result<OAuthAccount, MarqueeError> {
        Ok(self.oauth.link_account(link).await?)
    }

    /// Resolve a provider identity to its link and owning user.
    pub async fn find_oauth_account(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<(OAuthAccount, User)>, MarqueeError> {
        Ok(self.oauth.find_account(provider, subject).await?)
    }

    /// List a user's provider links.
    pub async fn oauth_links(&self, user_id: &UserId) -> Result<Vec<OAuthAccount>, MarqueeError> {
        Ok(self.oauth.links_for_user(user_id).await?)
    }

    /// Remove a provider link from a user.
    pub async fn unlink_oauth_account(&self, link_id: &OAuthLinkId) -> Result<(), MarqueeError> {
        Ok(self.oauth.unlink_account(link_id).await?)
    }

    /// Generate a CSRF state token for an OAuth authorization redirect.
    pub fn generate_oauth_state(&self) -> String {
        self.oauth.generate_state()
    }

    /// Verify a returned OAuth CSRF state value in constant time.
    pub fn verify_oauth_state(&self, candidate: &str, expected: &str) -> bool {
        self.oauth.verify_state(candidate, expected)
    }

    /// Start the forgot-password flow for an email address.
    ///
    /// Rate limited per normalized email. Returns `Ok(None)` when the email
    /// is unknown; the caller sends the token by mail on `Some` and responds
    /// identically either way.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<OneTimeToken>, MarqueeError> {
        let key = normalize_email(email);

        let decision =
            self.rate_limiter
                .check(RESET_LIMIT_KIND, &key, &self.config.reset_rate_limit);
        if !decision.allowed {
            tracing::warn!(email = %key, "Password reset rate limited");
            return Err(MarqueeError::RateLimited {
                retry_after: decision.retry_after.unwrap_or_else(Utc::now),
            });
        }
        self.rate_limiter
            .record_attempt(RESET_LIMIT_KIND, &key, &self.config.reset_rate_limit);

        Ok(self
            .password_reset
            .request_reset(email, self.config.reset_token_expires_in)
            .await?)
    }

    /// Consume a reset token, set the new password and revoke all sessions.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<UserId, MarqueeError> {
        let user_id = self.password_reset.reset_password(token, new_password).await?;
        tracing::info!(user_id = %user_id, "Password reset completed");
        Ok(user_id)
    }

    /// Issue an email-verification token for a user.
    pub async fn request_email_verification(
        &self,
        user_id: &UserId,
    ) -> Result<Option<OneTimeToken>, MarqueeError> {
        Ok(self
            .email_verification
            .request_verification(user_id, self.config.verification_token_expires_in)
            .await?)
    }

    /// Consume a verification token and mark the owner's email verified.
    pub async fn verify_email(&self, token: &str) -> Result<UserId, MarqueeError> {
        let user_id = self.email_verification.verify_email(token).await?;
        tracing::info!(user_id = %user_id, "Email verified");
        Ok(user_id)
    }

    /// Delete expired sessions and one-time tokens.
    ///
    /// Expiry is otherwise enforced lazily at read time; call this from a
    /// periodic job to keep the tables small.
    pub async fn cleanup_expired(&self) -> Result<(), MarqueeError> {
        self.sessions.cleanup_expired_sessions().await?;
        self.password_reset.cleanup_expired_tokens().await?;
        Ok(())
    }
}
