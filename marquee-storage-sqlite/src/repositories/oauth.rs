use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::{
    Error, UserId,
    error::{AuthError, StorageError},
    oauth::{NewOAuthLink, OAuthAccount, OAuthLinkId},
    repositories::OAuthRepository,
};
use sqlx::SqlitePool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SqliteOAuthAccount {
    id: String,
    user_id: String,
    provider: String,
    subject: String,
    access_token: Option<String>,
    refresh_token: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<SqliteOAuthAccount> for OAuthAccount {
    fn from(account: SqliteOAuthAccount) -> Self {
        OAuthAccount {
            id: OAuthLinkId::new(&account.id),
            user_id: UserId::new(&account.user_id),
            provider: account.provider,
            subject: account.subject,
            access_token: account.access_token,
            refresh_token: account.refresh_token,
            created_at: DateTime::from_timestamp(account.created_at, 0)
                .expect("Invalid timestamp"),
            updated_at: DateTime::from_timestamp(account.updated_at, 0)
                .expect("Invalid timestamp"),
        }
    }
}

pub struct SqliteOAuthRepository {
    pool: SqlitePool,
}

impl SqliteOAuthRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OAuthRepository for SqliteOAuthRepository {
    async fn create_link(&self, link: NewOAuthLink) -> Result<OAuthAccount, Error> {
        let now = Utc::now().timestamp();

        let account = sqlx::query_as::<_, SqliteOAuthAccount>(
            r#"
            INSERT INTO oauth_accounts (id, user_id, provider, subject, access_token, refresh_token, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING *
            "#,
        )
        .bind(OAuthLinkId::new_random().as_str())
        .bind(link.user_id.as_str())
        .bind(&link.provider)
        .bind(&link.subject)
        .bind(&link.access_token)
        .bind(&link.refresh_token)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Auth(AuthError::AccountAlreadyLinked)
            }
            _ => {
                tracing::error!(error = %e, "Failed to create OAuth link");
                Error::Storage(StorageError::Database(e.to_string()))
            }
        })?;

        Ok(account.into())
    }

    async fn find_by_provider(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<OAuthAccount>, Error> {
        let account = sqlx::query_as::<_, SqliteOAuthAccount>(
            "SELECT * FROM oauth_accounts WHERE provider = ?1 AND subject = ?2",
        )
        .bind(provider)
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(account.map(|a| a.into()))
    }

    async fn find_links_for_user(&self, user_id: &UserId) -> Result<Vec<OAuthAccount>, Error> {
        let accounts = sqlx::query_as::<_, SqliteOAuthAccount>(
            "SELECT * FROM oauth_accounts WHERE user_id = ?1 ORDER BY created_at",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(accounts.into_iter().map(|a| a.into()).collect())
    }

    async fn update_tokens(
        &self,
        link_id: &OAuthLinkId,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), Error> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            UPDATE oauth_accounts
            SET access_token = ?2, refresh_token = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(link_id.as_str())
        .bind(access_token)
        .bind(refresh_token)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }

    async fn delete_link(&self, link_id: &OAuthLinkId) -> Result<(), Error> {
        sqlx::query("DELETE FROM oauth_accounts WHERE id = ?1")
            .bind(link_id.as_str())
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
    use crate::repositories::SqliteUserRepository;
    use marquee_core::{repositories::UserRepository, user::NewUser};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> (SqliteOAuthRepository, SqliteUserRepository, UserId) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let manager = SqliteMigrationManager::new(pool.clone());
        manager.initialize().await.unwrap();
        manager.up(&all_migrations()).await.unwrap();

        let users = SqliteUserRepository::new(pool.clone());
        let user = users
            .create(
                NewUser::builder()
                    .email("viewer@example.com".to_string())
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();

        (SqliteOAuthRepository::new(pool), users, user.id)
    }

    fn link(user_id: &UserId, subject: &str) -> NewOAuthLink {
        NewOAuthLink::builder()
            .user_id(user_id.clone())
            .provider("google".to_string())
            .subject(subject.to_string())
            .access_token(Some("at-1".to_string()))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find_link() {
        let (repo, _, user_id) = setup().await;

        let created = repo.create_link(link(&user_id, "sub-123")).await.unwrap();
        assert!(created.id.as_str().starts_with("oal_"));

        let found = repo
            .find_by_provider("google", "sub-123")
            .await
            .unwrap()
            .expect("link should exist");
        assert_eq!(found.user_id, user_id);
        assert_eq!(found.access_token.as_deref(), Some("at-1"));
    }

    #[tokio::test]
    async fn test_duplicate_subject_rejected() {
        let (repo, users, user_id) = setup().await;

        repo.create_link(link(&user_id, "sub-123")).await.unwrap();

        let other = users
            .create(
                NewUser::builder()
                    .email("other@example.com".to_string())
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();

        let result = repo.create_link(link(&other.id, "sub-123")).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::Auth(AuthError::AccountAlreadyLinked)
        ));
    }

    #[tokio::test]
    async fn test_same_subject_different_provider_ok() {
        let (repo, _, user_id) = setup().await;

        repo.create_link(link(&user_id, "sub-123")).await.unwrap();

        let mut apple = link(&user_id, "sub-123");
        apple.provider = "apple".to_string();
        repo.create_link(apple).await.unwrap();

        assert_eq!(repo.find_links_for_user(&user_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_tokens() {
        let (repo, _, user_id) = setup().await;

        let created = repo.create_link(link(&user_id, "sub-123")).await.unwrap();
        repo.update_tokens(&created.id, Some("at-2"), Some("rt-1"))
            .await
            .unwrap();

        let found = repo
            .find_by_provider("google", "sub-123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.access_token.as_deref(), Some("at-2"));
        assert_eq!(found.refresh_token.as_deref(), Some("rt-1"));
    }

    #[tokio::test]
    async fn test_delete_link() {
        let (repo, _, user_id) = setup().await;

        let created = repo.create_link(link(&user_id, "sub-123")).await.unwrap();
        repo.delete_link(&created.id).await.unwrap();

        assert!(
            repo.find_by_provider("google", "sub-123")
                .await
                .unwrap()
                .is_none()
        );

        // Identity can be claimed again after unlink
        repo.create_link(link(&user_id, "sub-123")).await.unwrap();
    }
}
