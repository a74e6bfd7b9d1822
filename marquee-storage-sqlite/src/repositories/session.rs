use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::{
    Error, Session, UserId,
    error::StorageError,
    repositories::SessionRepository,
    session::SessionToken,
};
use sqlx::SqlitePool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SqliteSession {
    token: String,
    user_id: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: i64,
    expires_at: i64,
}

impl From<SqliteSession> for Session {
    fn from(session: SqliteSession) -> Self {
        Session {
            token: SessionToken::new(&session.token),
            user_id: UserId::new(&session.user_id),
            ip_address: session.ip_address,
            user_agent: session.user_agent,
            created_at: DateTime::from_timestamp(session.created_at, 0)
                .expect("Invalid timestamp"),
            expires_at: DateTime::from_timestamp(session.expires_at, 0)
                .expect("Invalid timestamp"),
        }
    }
}

pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn create(&self, session: Session) -> Result<Session, Error> {
        let created = sqlx::query_as::<_, SqliteSession>(
            r#"
            INSERT INTO sessions (token, user_id, ip_address, user_agent, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING *
            "#,
        )
        .bind(session.token.as_str())
        .bind(session.user_id.as_str())
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.created_at.timestamp())
        .bind(session.expires_at.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create session");
            Error::Storage(StorageError::Database(e.to_string()))
        })?;

        Ok(created.into())
    }

    async fn find_by_token(&self, token: &SessionToken) -> Result<Option<Session>, Error> {
        let session =
            sqlx::query_as::<_, SqliteSession>("SELECT * FROM sessions WHERE token = ?1")
                .bind(token.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(session.map(|s| s.into()))
    }

    async fn delete(&self, token: &SessionToken) -> Result<(), Error> {
        sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }

    async fn delete_by_user_id(&self, user_id: &UserId) -> Result<(), Error> {
        sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        if result.rows_affected() > 0 {
            tracing::debug!(count = result.rows_affected(), "Removed expired sessions");
        }

        Ok(())
    }
}
