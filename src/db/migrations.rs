//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use super::Database;

impl Database {
    /// Create a new database connection
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        // Connect to database with foreign key enforcement and WAL mode
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };

        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?
                .flatten();

        let current_version = current_version.unwrap_or(0);

        if current_version < 1 {
            Self::migrate_v1(&mut conn).await?;
        }
        if current_version < 2 {
            Self::migrate_v2(&mut conn).await?;
        }

        Ok(())
    }

    /// Apply one schema version inside BEGIN/COMMIT, rolling back on failure
    async fn apply_migration(conn: &mut SqliteConnection, version: i32) -> Result<()> {
        tracing::info!("Applying database migration v{}", version);

        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to begin transaction: {}",
                    e
                )))
            })?;

        let result = async {
            match version {
                1 => Self::create_subscriptions_schema(conn).await?,
                2 => Self::create_links_schema(conn).await?,
                other => {
                    return Err(Error::Database(DatabaseError::MigrationFailed(format!(
                        "Unknown migration version {}",
                        other
                    ))));
                }
            }
            Self::record_migration(conn, version).await?;
            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::MigrationFailed(format!(
                            "Failed to commit migration v{}: {}",
                            version, e
                        )))
                    })?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::info!("Database migration v{} complete", version);
        Ok(())
    }

    /// Migration v1: subscriptions
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        Self::apply_migration(conn, 1).await
    }

    /// Migration v2: links with download tracking and claim column
    async fn migrate_v2(conn: &mut SqliteConnection) -> Result<()> {
        Self::apply_migration(conn, 2).await
    }

    async fn create_subscriptions_schema(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE subscriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                feed_url TEXT NOT NULL,
                parent_folder_id INTEGER NOT NULL DEFAULT 0,
                parent_folder_name TEXT NOT NULL,
                cloud_folder_id INTEGER,
                cloud_folder_name TEXT NOT NULL,
                refresh_interval INTEGER NOT NULL CHECK (refresh_interval >= 1),
                refresh_unit TEXT NOT NULL CHECK (refresh_unit IN ('minutes', 'hours')),
                is_active INTEGER NOT NULL DEFAULT 1,
                last_refresh INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create subscriptions table: {}",
                e
            )))
        })?;

        sqlx::query("CREATE INDEX idx_subscriptions_owner ON subscriptions(owner_id)")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to create subscriptions index: {}",
                    e
                )))
            })?;

        Ok(())
    }

    async fn create_links_schema(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subscription_id INTEGER NOT NULL
                    REFERENCES subscriptions(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                magnet_uri TEXT NOT NULL,
                link TEXT,
                author TEXT,
                category TEXT,
                description TEXT,
                size TEXT,
                published_at INTEGER,
                created_at INTEGER NOT NULL,
                download_status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (download_status IN ('pending', 'downloading', 'completed', 'failed')),
                download_task_id INTEGER,
                download_file_id INTEGER,
                download_fail_reason TEXT,
                download_created_at INTEGER,
                download_completed_at INTEGER,
                download_claimed_at INTEGER,
                UNIQUE (subscription_id, magnet_uri)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create links table: {}",
                e
            )))
        })?;

        for (name, ddl) in [
            (
                "idx_links_status",
                "CREATE INDEX idx_links_status ON links(download_status)",
            ),
            (
                "idx_links_subscription",
                "CREATE INDEX idx_links_subscription ON links(subscription_id, created_at)",
            ),
        ] {
            sqlx::query(ddl).execute(&mut *conn).await.map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to create index {}: {}",
                    name, e
                )))
            })?;
        }

        Ok(())
    }

    async fn record_migration(conn: &mut SqliteConnection, version: i32) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
