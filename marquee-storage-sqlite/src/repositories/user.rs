use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::{
    Error, User, UserId,
    error::{AuthError, StorageError},
    repositories::UserRepository,
    user::{NewUser, ProfileUpdate},
};
use sqlx::SqlitePool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SqliteUser {
    id: String,
    email: String,
    password_hash: Option<String>,
    name: Option<String>,
    profile_image_url: Option<String>,
    timezone: Option<String>,
    role: String,
    email_verified: bool,
    last_login_at: Option<i64>,
    deleted_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl SqliteUser {
    fn into_user(self) -> Result<User, Error> {
        Ok(User {
            id: UserId::new(&self.id),
            email: self.email,
            password_hash: self.password_hash,
            name: self.name,
            profile_image_url: self.profile_image_url,
            timezone: self.timezone,
            // An unknown role string is corrupt data; never coerce it to a
            // default.
            role: self.role.parse()?,
            email_verified: self.email_verified,
            last_login_at: self
                .last_login_at
                .and_then(|t| DateTime::from_timestamp(t, 0)),
            deleted_at: self.deleted_at.and_then(|t| DateTime::from_timestamp(t, 0)),
            created_at: DateTime::from_timestamp(self.created_at, 0).expect("Invalid timestamp"),
            updated_at: DateTime::from_timestamp(self.updated_at, 0).expect("Invalid timestamp"),
        })
    }
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, Error> {
        let now = Utc::now().timestamp();

        let sqlite_user = sqlx::query_as::<_, SqliteUser>(
            r#"
            INSERT INTO users (id, email, password_hash, name, profile_image_url, role, email_verified, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            RETURNING *
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.profile_image_url)
        .bind(user.role.as_str())
        .bind(user.email_verified)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            // The live-email unique index fired; a race with the service's
            // pre-check lands here.
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Auth(AuthError::DuplicateEmail)
            }
            _ => {
                tracing::error!(error = %e, "Failed to create user");
                Error::Storage(StorageError::Database(e.to_string()))
            }
        })?;

        sqlite_user.into_user()
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        let sqlite_user = sqlx::query_as::<_, SqliteUser>("SELECT * FROM users WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        sqlite_user.map(|u| u.into_user()).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let sqlite_user = sqlx::query_as::<_, SqliteUser>(
            "SELECT * FROM users WHERE email = ?1 AND deleted_at IS NULL",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        sqlite_user.map(|u| u.into_user()).transpose()
    }

    async fn update_profile(
        &self,
        id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, Error> {
        let now = Utc::now().timestamp();

        let sqlite_user = sqlx::query_as::<_, SqliteUser>(
            r#"
            UPDATE users
            SET name = COALESCE(?2, name),
                profile_image_url = COALESCE(?3, profile_image_url),
                timezone = COALESCE(?4, timezone),
                updated_at = ?5
            WHERE id = ?1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id.as_str())
        .bind(&update.name)
        .bind(&update.profile_image_url)
        .bind(&update.timezone)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        sqlite_user.map(|u| u.into_user()).transpose()
    }

    async fn set_password_hash(&self, id: &UserId, password_hash: &str) -> Result<(), Error> {
        let now = Utc::now().timestamp();

        sqlx::query("UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(password_hash)
            .bind(now)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }

    async fn set_last_login(&self, id: &UserId) -> Result<(), Error> {
        let now = Utc::now().timestamp();

        sqlx::query("UPDATE users SET last_login_at = ?1 WHERE id = ?2")
            .bind(now)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }

    async fn mark_email_verified(&self, id: &UserId) -> Result<(), Error> {
        let now = Utc::now().timestamp();

        sqlx::query("UPDATE users SET email_verified = 1, updated_at = ?1 WHERE id = ?2")
            .bind(now)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }

    async fn anonymize(
        &self,
        id: &UserId,
        placeholder_email: &str,
        placeholder_name: &str,
    ) -> Result<(), Error> {
        let now = Utc::now().timestamp();

        // The deleted_at guard makes a second delete a no-op.
        sqlx::query(
            r#"
            UPDATE users
            SET email = ?2,
                name = ?3,
                password_hash = NULL,
                deleted_at = ?4,
                updated_at = ?4
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_str())
        .bind(placeholder_email)
        .bind(placeholder_name)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::{SqliteMigrationManager, all_migrations};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> (SqliteUserRepository, SqlitePool) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let manager = SqliteMigrationManager::new(pool.clone());
        manager.initialize().await.unwrap();
        manager.up(&all_migrations()).await.unwrap();
        (SqliteUserRepository::new(pool.clone()), pool)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser::builder()
            .email(email.to_string())
            .password_hash("aa.bb".to_string())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let (repo, _) = setup().await;

        let user = repo.create(new_user("viewer@example.com")).await.unwrap();
        assert_eq!(user.email, "viewer@example.com");
        assert!(user.has_password());

        let by_id = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, user.email);

        let by_email = repo.find_by_email("viewer@example.com").await.unwrap();
        assert!(by_email.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_by_index() {
        let (repo, _) = setup().await;

        repo.create(new_user("viewer@example.com")).await.unwrap();
        let result = repo.create(new_user("viewer@example.com")).await;

        assert!(matches!(
            result.unwrap_err(),
            Error::Auth(AuthError::DuplicateEmail)
        ));
    }

    #[tokio::test]
    async fn test_anonymize_frees_email() {
        let (repo, _) = setup().await;

        let user = repo.create(new_user("viewer@example.com")).await.unwrap();
        repo.anonymize(&user.id, "deleted_0000@deleted.local", "Deleted User")
            .await
            .unwrap();

        // Row still exists by id, invisible by email
        let by_id = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(by_id.is_deleted());
        assert!(!by_id.has_password());
        assert_eq!(by_id.name.as_deref(), Some("Deleted User"));
        assert!(
            repo.find_by_email("viewer@example.com")
                .await
                .unwrap()
                .is_none()
        );

        // Unique index no longer blocks the email
        repo.create(new_user("viewer@example.com")).await.unwrap();
    }

    #[tokio::test]
    async fn test_anonymize_is_idempotent() {
        let (repo, _) = setup().await;

        let user = repo.create(new_user("viewer@example.com")).await.unwrap();
        repo.anonymize(&user.id, "deleted_aaaa@deleted.local", "Deleted User")
            .await
            .unwrap();
        repo.anonymize(&user.id, "deleted_bbbb@deleted.local", "Deleted User")
            .await
            .unwrap();

        let stored = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.email, "deleted_aaaa@deleted.local");
    }

    #[tokio::test]
    async fn test_update_profile_partial() {
        let (repo, _) = setup().await;

        let user = repo.create(new_user("viewer@example.com")).await.unwrap();

        let updated = repo
            .update_profile(
                &user.id,
                &ProfileUpdate {
                    name: Some("Viewer".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name.as_deref(), Some("Viewer"));

        // Second update leaves earlier fields in place
        let updated = repo
            .update_profile(
                &user.id,
                &ProfileUpdate {
                    timezone: Some("Europe/Berlin".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name.as_deref(), Some("Viewer"));
        assert_eq!(updated.timezone.as_deref(), Some("Europe/Berlin"));
    }

    #[tokio::test]
    async fn test_update_profile_missing_user() {
        let (repo, _) = setup().await;

        let result = repo
            .update_profile(&UserId::new_random(), &ProfileUpdate::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unknown_role_fails_decode() {
        let (repo, pool) = setup().await;

        let user = repo.create(new_user("viewer@example.com")).await.unwrap();
        sqlx::query("UPDATE users SET role = 'owner' WHERE id = ?1")
            .bind(user.id.as_str())
            .execute(&pool)
            .await
            .unwrap();

        // A corrupt role column surfaces as an error, never as a default role
        let result = repo.find_by_id(&user.id).await;
        assert!(result.unwrap_err().is_validation_error());

        let result = repo.find_by_email("viewer@example.com").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mark_email_verified_and_last_login() {
        let (repo, _) = setup().await;

        let user = repo.create(new_user("viewer@example.com")).await.unwrap();
        assert!(!user.email_verified);
        assert!(user.last_login_at.is_none());

        repo.mark_email_verified(&user.id).await.unwrap();
        repo.set_last_login(&user.id).await.unwrap();

        let stored = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(stored.email_verified);
        assert!(stored.last_login_at.is_some());
    }
}
