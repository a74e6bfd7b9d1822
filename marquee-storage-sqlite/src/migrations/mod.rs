//! Versioned, transactional schema migrations
//!
//! Each migration runs inside its own transaction together with the insert
//! into the `_marquee_migrations` bookkeeping table, so a failed migration
//! leaves the schema untouched.

use async_trait::async_trait;
use chrono::Utc;
use marquee_core::{Error, error::StorageError};
use sqlx::{SqliteConnection, SqlitePool};

const MIGRATION_TABLE: &str = "_marquee_migrations";

fn migration_err(e: sqlx::Error) -> Error {
    Error::Storage(StorageError::Migration(e.to_string()))
}

/// A single versioned schema change.
#[async_trait]
pub trait SqliteMigration: Send + Sync {
    fn version(&self) -> i64;
    fn name(&self) -> &str;
    async fn up<'a>(&'a self, conn: &'a mut SqliteConnection) -> Result<(), Error>;
    async fn down<'a>(&'a self, conn: &'a mut SqliteConnection) -> Result<(), Error>;
}

pub struct SqliteMigrationManager {
    pool: SqlitePool,
}

impl SqliteMigrationManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the bookkeeping table if it does not exist.
    pub async fn initialize(&self) -> Result<(), Error> {
        sqlx::query(
            format!(
                r#"
            CREATE TABLE IF NOT EXISTS {MIGRATION_TABLE} (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at INTEGER NOT NULL DEFAULT (unixepoch())
            );"#
            )
            .as_str(),
        )
        .execute(&self.pool)
        .await
        .map_err(migration_err)?;

        Ok(())
    }

    /// Apply every not-yet-applied migration, in order.
    pub async fn up(&self, migrations: &[Box<dyn SqliteMigration>]) -> Result<(), Error> {
        for migration in migrations {
            if self.is_applied(migration.version()).await? {
                continue;
            }

            let mut tx = self.pool.begin().await.map_err(migration_err)?;

            tracing::info!(
                name = migration.name(),
                version = migration.version(),
                "Applying migration"
            );

            migration.up(&mut *tx).await?;

            sqlx::query(
                format!("INSERT INTO {MIGRATION_TABLE} (version, name, applied_at) VALUES (?, ?, ?)")
                    .as_str(),
            )
            .bind(migration.version())
            .bind(migration.name())
            .bind(Utc::now().timestamp())
            .execute(&mut *tx)
            .await
            .map_err(migration_err)?;

            tx.commit().await.map_err(migration_err)?;
        }
        Ok(())
    }

    async fn is_applied(&self, version: i64) -> Result<bool, Error> {
        let applied: bool = sqlx::query_scalar(
            format!("SELECT EXISTS(SELECT 1 FROM {MIGRATION_TABLE} WHERE version = ?)").as_str(),
        )
        .bind(version)
        .fetch_one(&self.pool)
        .await
        .map_err(migration_err)?;
        Ok(applied)
    }
}

/// The full migration set, in application order.
pub fn all_migrations() -> Vec<Box<dyn SqliteMigration>> {
    vec![
        Box::new(CreateUsersTable),
        Box::new(CreateSessionsTable),
        Box::new(CreateOAuthAccountsTable),
        Box::new(CreateOneTimeTokensTable),
        Box::new(CreateIndexes),
    ]
}

pub struct CreateUsersTable;

#[async_trait]
impl SqliteMigration for CreateUsersTable {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &str {
        "CreateUsersTable"
    }

    async fn up<'a>(&'a self, conn: &'a mut SqliteConnection) -> Result<(), Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                password_hash TEXT,
                name TEXT,
                profile_image_url TEXT,
                timezone TEXT,
                role TEXT NOT NULL DEFAULT 'user',
                email_verified INTEGER NOT NULL DEFAULT 0,
                last_login_at INTEGER,
                deleted_at INTEGER,
                created_at INTEGER NOT NULL DEFAULT (unixepoch()),
                updated_at INTEGER NOT NULL DEFAULT (unixepoch())
            );"#,
        )
        .execute(&mut *conn)
        .await
        .map_err(migration_err)?;

        // Email uniqueness only applies to live rows; soft-deleted rows keep
        // anonymized placeholders and must never block re-registration.
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email_live
            ON users(email) WHERE deleted_at IS NULL;"#,
        )
        .execute(&mut *conn)
        .await
        .map_err(migration_err)?;

        Ok(())
    }

    async fn down<'a>(&'a self, conn: &'a mut SqliteConnection) -> Result<(), Error> {
        sqlx::query("DROP TABLE IF EXISTS users")
            .execute(conn)
            .await
            .map_err(migration_err)?;
        Ok(())
    }
}

pub struct CreateSessionsTable;

#[async_trait]
impl SqliteMigration for CreateSessionsTable {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &str {
        "CreateSessionsTable"
    }

    async fn up<'a>(&'a self, conn: &'a mut SqliteConnection) -> Result<(), Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                ip_address TEXT,
                user_agent TEXT,
                created_at INTEGER NOT NULL DEFAULT (unixepoch()),
                expires_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );"#,
        )
        .execute(conn)
        .await
        .map_err(migration_err)?;
        Ok(())
    }

    async fn down<'a>(&'a self, conn: &'a mut SqliteConnection) -> Result<(), Error> {
        sqlx::query("DROP TABLE IF EXISTS sessions")
            .execute(conn)
            .await
            .map_err(migration_err)?;
        Ok(())
    }
}

pub struct CreateOAuthAccountsTable;

#[async_trait]
impl SqliteMigration for CreateOAuthAccountsTable {
    fn version(&self) -> i64 {
        3
    }

    fn name(&self) -> &str {
        "CreateOAuthAccountsTable"
    }

    async fn up<'a>(&'a self, conn: &'a mut SqliteConnection) -> Result<(), Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS oauth_accounts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                subject TEXT NOT NULL,
                access_token TEXT,
                refresh_token TEXT,
                created_at INTEGER NOT NULL DEFAULT (unixepoch()),
                updated_at INTEGER NOT NULL DEFAULT (unixepoch()),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                UNIQUE(provider, subject)
            );"#,
        )
        .execute(conn)
        .await
        .map_err(migration_err)?;
        Ok(())
    }

    async fn down<'a>(&'a self, conn: &'a mut SqliteConnection) -> Result<(), Error> {
        sqlx::query("DROP TABLE IF EXISTS oauth_accounts")
            .execute(conn)
            .await
            .map_err(migration_err)?;
        Ok(())
    }
}

pub struct CreateOneTimeTokensTable;

#[async_trait]
impl SqliteMigration for CreateOneTimeTokensTable {
    fn version(&self) -> i64 {
        4
    }

    fn name(&self) -> &str {
        "CreateOneTimeTokensTable"
    }

    async fn up<'a>(&'a self, conn: &'a mut SqliteConnection) -> Result<(), Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS one_time_tokens (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                token TEXT NOT NULL UNIQUE,
                purpose TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                used_at INTEGER,
                created_at INTEGER NOT NULL DEFAULT (unixepoch()),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );"#,
        )
        .execute(conn)
        .await
        .map_err(migration_err)?;
        Ok(())
    }

    async fn down<'a>(&'a self, conn: &'a mut SqliteConnection) -> Result<(), Error> {
        sqlx::query("DROP TABLE IF EXISTS one_time_tokens")
            .execute(conn)
            .await
            .map_err(migration_err)?;
        Ok(())
    }
}

pub struct CreateIndexes;

#[async_trait]
impl SqliteMigration for CreateIndexes {
    fn version(&self) -> i64 {
        5
    }

    fn name(&self) -> &str {
        "CreateIndexes"
    }

    async fn up<'a>(&'a self, conn: &'a mut SqliteConnection) -> Result<(), Error> {
        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at)",
            "CREATE INDEX IF NOT EXISTS idx_tokens_user_purpose ON one_time_tokens(user_id, purpose)",
        ] {
            sqlx::query(statement)
                .execute(&mut *conn)
                .await
                .map_err(migration_err)?;
        }
        Ok(())
    }

    async fn down<'a>(&'a self, conn: &'a mut SqliteConnection) -> Result<(), Error> {
        for statement in [
            "DROP INDEX IF EXISTS idx_sessions_user_id",
            "DROP INDEX IF EXISTS idx_sessions_expires_at",
            "DROP INDEX IF EXISTS idx_tokens_user_purpose",
        ] {
            sqlx::query(statement)
                .execute(&mut *conn)
                .await
                .map_err(migration_err)?;
        }
        Ok(())
    }
}
