use std::sync::Arc;

use crate::{
    Error, User, UserId,
    crypto::generate_token,
    error::AuthError,
    password::{hash_password, verify_password},
    repositories::UserRepository,
    user::{NewUser, ProfileUpdate},
    validation::{normalize_email, validate_email, validate_password},
};

/// Display name left on soft-deleted rows.
const DELETED_NAME: &str = "Deleted User";

/// Service for account lifecycle operations
pub struct AccountService<U: UserRepository> {
    repository: Arc<U>,
}

impl<U: UserRepository> AccountService<U> {
    /// Create a new AccountService with the given repository
    pub fn new(repository: Arc<U>) -> Self {
        Self { repository }
    }

    /// Register a new account with an email and password.
    ///
    /// The email is normalized (trimmed, lowercased) before validation and
    /// storage. Fails with [`AuthError::DuplicateEmail`] when another live
    /// account already owns the email.
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<User, Error> {
        validate_password(password)?;

        let email = normalize_email(email);
        validate_email(&email)?;

        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(AuthError::DuplicateEmail.into());
        }

        let password_hash = hash_password(password)?;

        let mut builder = NewUser::builder().email(email).password_hash(password_hash);
        if let Some(name) = name {
            builder = builder.name(name);
        }

        let user = self.repository.create(builder.build()?).await?;
        tracing::info!(user_id = %user.id, "Created user account");
        Ok(user)
    }

    /// Create an account from a provider-asserted identity.
    ///
    /// The account has no credential hash and its email starts out verified,
    /// since the provider already confirmed it.
    pub async fn create_oauth_user(
        &self,
        email: &str,
        name: Option<String>,
        profile_image_url: Option<String>,
    ) -> Result<User, Error> {
        let email = normalize_email(email);
        validate_email(&email)?;

        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(AuthError::DuplicateEmail.into());
        }

        let mut builder = NewUser::builder().email(email).email_verified(true);
        if let Some(name) = name {
            builder = builder.name(name);
        }
        if let Some(url) = profile_image_url {
            builder = builder.profile_image_url(url);
        }

        let user = self.repository.create(builder.build()?).await?;
        tracing::info!(user_id = %user.id, "Created OAuth-backed user account");
        Ok(user)
    }

    /// Get a user by ID
    pub async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, Error> {
        self.repository.find_by_id(user_id).await
    }

    /// Get a live user by email
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.repository.find_by_email(&normalize_email(email)).await
    }

    /// Verify an email/password pair.
    ///
    /// Returns `Ok(None)` for every failure mode: unknown email, soft-deleted
    /// account, account without a password, wrong password. Callers cannot
    /// tell which one occurred, and the KDF runs on every path so timing does
    /// not reveal whether the email exists. On success the user's last-login
    /// timestamp is updated.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, Error> {
        let email = normalize_email(email);
        let user = self.repository.find_by_email(&email).await?;

        let Some(user) = user.filter(|u| !u.is_deleted()) else {
            // Burn the same KDF cost as a real verification.
            let _ = hash_password(password)?;
            return Ok(None);
        };

        let Some(hash) = user.password_hash.as_deref() else {
            let _ = hash_password(password)?;
            return Ok(None);
        };

        if !verify_password(password, hash)? {
            tracing::debug!(user_id = %user.id, "Password verification failed");
            return Ok(None);
        }

        self.repository.set_last_login(&user.id).await?;
        self.repository.find_by_id(&user.id).await
    }

    /// Apply a partial profile update.
    pub async fn update_profile(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, Error> {
        self.repository.update_profile(user_id, update).await
    }

    /// Change a user's password, verifying the current one first.
    pub async fn change_password(
        &self,
        user_id: &UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        validate_password(new_password)?;

        let user = self
            .repository
            .find_by_id(user_id)
            .await?
            .filter(|u| !u.is_deleted())
            .ok_or(Error::Auth(AuthError::InvalidCredentials))?;

        let current_hash = user
            .password_hash
            .as_deref()
            .ok_or(Error::Auth(AuthError::InvalidCredentials))?;

        if !verify_password(current_password, current_hash)? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let new_hash = hash_password(new_password)?;
        self.repository.set_password_hash(user_id, &new_hash).await
    }

    /// Set a user's password without checking the old one (reset flow).
    pub async fn set_password(&self, user_id: &UserId, password: &str) -> Result<(), Error> {
        validate_password(password)?;
        let hash = hash_password(password)?;
        self.repository.set_password_hash(user_id, &hash).await
    }

    /// Mark a user's email as verified
    pub async fn verify_email(&self, user_id: &UserId) -> Result<(), Error> {
        self.repository.mark_email_verified(user_id).await
    }

    /// Soft-delete an account.
    ///
    /// The row stays in place with `deleted_at` set; the email is replaced by
    /// a non-colliding placeholder, the name by a fixed marker and the
    /// credential hash is cleared. Deleting an already-deleted account is a
    /// no-op.
    pub async fn delete_user(&self, user_id: &UserId) -> Result<(), Error> {
        let placeholder_email = format!("deleted_{}@deleted.local", &generate_token()[..16]);
        self.repository
            .anonymize(user_id, &placeholder_email, DELETED_NAME)
            .await?;
        tracing::info!(user_id = %user_id, "Anonymized user account");
        Ok(())
    }
}
