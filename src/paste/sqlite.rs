//! Relational paste storage on SQLite.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::backend::PasteBackend;
use super::model::Paste;
use crate::error::{GuardError, Result};

const PASTE_COLUMNS: &str =
    "id, title, body, syntax, create_time, delete_time, one_use, author, author_email, author_url";

/// Paste storage in a SQLite database accessed through a sqlx pool.
#[derive(Debug, Clone)]
pub struct SqlitePasteBackend {
    pool: SqlitePool,
}

impl SqlitePasteBackend {
    /// Connect to `database_url` and create the paste table if missing.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let backend = Self { pool };
        backend.init().await?;
        info!(url = %database_url, "Connected to paste database");
        Ok(backend)
    }

    /// A private in-memory database. Every connection to `:memory:` opens a
    /// separate database, so the pool is limited to one connection.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Create the paste table and its expiry index.
    async fn init(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pastes (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL,
                syntax TEXT NOT NULL DEFAULT '',
                create_time INTEGER NOT NULL,
                delete_time INTEGER NOT NULL DEFAULT 0,
                one_use BOOLEAN NOT NULL DEFAULT FALSE,
                author TEXT NOT NULL DEFAULT '',
                author_email TEXT NOT NULL DEFAULT '',
                author_url TEXT NOT NULL DEFAULT ''
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pastes_delete_time ON pastes(delete_time)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl PasteBackend for SqlitePasteBackend {
    async fn insert(&self, paste: &Paste) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO pastes ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            PASTE_COLUMNS
        ))
        .bind(&paste.id)
        .bind(&paste.title)
        .bind(&paste.body)
        .bind(&paste.syntax)
        .bind(paste.create_time)
        .bind(paste.delete_time)
        .bind(paste.one_use)
        .bind(&paste.author)
        .bind(&paste.author_email)
        .bind(&paste.author_url)
        .execute(&self.pool)
        .await
        .map_err(|e| match GuardError::from(e) {
            GuardError::DuplicateId(_) => GuardError::DuplicateId(paste.id.clone()),
            other => other,
        })?;

        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Paste>> {
        let paste = sqlx::query_as::<_, Paste>(&format!(
            "SELECT {} FROM pastes WHERE id = ?",
            PASTE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(paste)
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pastes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn take(&self, id: &str) -> Result<Option<Paste>> {
        let paste = sqlx::query_as::<_, Paste>(&format!(
            "DELETE FROM pastes WHERE id = ? RETURNING {}",
            PASTE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(paste)
    }

    async fn remove_expired(&self, now: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM pastes WHERE delete_time > 0 AND delete_time < ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pastes")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }
}
