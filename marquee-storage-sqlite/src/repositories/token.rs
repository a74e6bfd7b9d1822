use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use marquee_core::{
    Error, UserId,
    crypto::generate_token,
    error::{AuthError, StorageError},
    repositories::TokenRepository,
    token::{OneTimeToken, TokenId, TokenPurpose},
};
use sqlx::SqlitePool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SqliteOneTimeToken {
    id: String,
    user_id: String,
    token: String,
    purpose: String,
    expires_at: i64,
    used_at: Option<i64>,
    created_at: i64,
}

impl SqliteOneTimeToken {
    fn into_token(self) -> Result<OneTimeToken, Error> {
        Ok(OneTimeToken {
            id: TokenId::new(&self.id),
            user_id: UserId::new(&self.user_id),
            token: self.token,
            purpose: self.purpose.parse()?,
            expires_at: DateTime::from_timestamp(self.expires_at, 0)
                .expect("Invalid timestamp"),
            used_at: self.used_at.and_then(|t| DateTime::from_timestamp(t, 0)),
            created_at: DateTime::from_timestamp(self.created_at, 0)
                .expect("Invalid timestamp"),
        })
    }
}

pub struct SqliteTokenRepository {
    pool: SqlitePool,
}

impl SqliteTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for SqliteTokenRepository {
    async fn create(
        &self,
        user_id: &UserId,
        purpose: TokenPurpose,
        expires_in: Duration,
    ) -> Result<OneTimeToken, Error> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        // One live token per (user, purpose): a new request supersedes any
        // outstanding one.
        sqlx::query(
            "DELETE FROM one_time_tokens WHERE user_id = ?1 AND purpose = ?2 AND used_at IS NULL",
        )
        .bind(user_id.as_str())
        .bind(purpose.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        let row = sqlx::query_as::<_, SqliteOneTimeToken>(
            r#"
            INSERT INTO one_time_tokens (id, user_id, token, purpose, expires_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING *
            "#,
        )
        .bind(TokenId::new_random().as_str())
        .bind(user_id.as_str())
        .bind(generate_token())
        .bind(purpose.as_str())
        .bind((now + expires_in).timestamp())
        .bind(now.timestamp())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create one-time token");
            Error::Storage(StorageError::Database(e.to_string()))
        })?;

        tx.commit()
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        row.into_token()
    }

    async fn find_valid(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<OneTimeToken>, Error> {
        let row = sqlx::query_as::<_, SqliteOneTimeToken>(
            r#"
            SELECT * FROM one_time_tokens
            WHERE token = ?1 AND purpose = ?2 AND used_at IS NULL AND expires_at > ?3
            "#,
        )
        .bind(token)
        .bind(purpose.as_str())
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        row.map(|r| r.into_token()).transpose()
    }

    async fn mark_used(&self, token_id: &TokenId) -> Result<(), Error> {
        let result = sqlx::query(
            "UPDATE one_time_tokens SET used_at = ?1 WHERE id = ?2 AND used_at IS NULL",
        )
        .bind(Utc::now().timestamp())
        .bind(token_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::InvalidCredentials.into());
        }

        Ok(())
    }

    async fn consume_email_verification(
        &self,
        token_id: &TokenId,
        user_id: &UserId,
    ) -> Result<(), Error> {
        let now = Utc::now().timestamp();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        let consumed = sqlx::query(
            r#"
            UPDATE one_time_tokens
            SET used_at = ?1
            WHERE id = ?2 AND user_id = ?3 AND purpose = ?4
              AND used_at IS NULL AND expires_at > ?1
            "#,
        )
        .bind(now)
        .bind(token_id.as_str())
        .bind(user_id.as_str())
        .bind(TokenPurpose::EmailVerification.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        if consumed.rows_affected() == 0 {
            return Err(AuthError::InvalidCredentials.into());
        }

        sqlx::query("UPDATE users SET email_verified = 1, updated_at = ?1 WHERE id = ?2")
            .bind(now)
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        tx.commit()
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM one_time_tokens WHERE expires_at <= ?1")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        if result.rows_affected() > 0 {
            tracing::debug!(count = result.rows_affected(), "Removed expired tokens");
        }

        Ok(())
    }
}
