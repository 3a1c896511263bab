//! SQLite-backed [`Connection`].
//!
//! Stores every document as a JSON body keyed by `(collection, id)`. A chunk
//! is written inside a single transaction, so it lands completely or not at
//! all.
//!
//! Parameters: `path` (file path or `:memory:`).

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use super::Connection;
use crate::error::BackendError;
use crate::models::{BackendConfig, Row};

pub struct SqliteConnection {
    pool: SqlitePool,
}

impl SqliteConnection {
    pub async fn open(config: &BackendConfig) -> Result<Self, BackendError> {
        let path = config.param("path").ok_or_else(|| {
            BackendError::InvalidParams(format!("backend '{}' needs a 'path'", config.id))
        })?;

        let in_memory = path == ":memory:";
        if !in_memory {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| BackendError::Other(anyhow::Error::new(e)))?;
                }
            }
        }

        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?.create_if_missing(true);

        // Every connection to `:memory:` is a separate database, so the
        // single connection must never be recycled.
        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if in_memory {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        let conn = Self { pool };
        conn.migrate().await?;
        Ok(conn)
    }

    async fn migrate(&self) -> Result<(), BackendError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                written_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count(&self, collection: &str) -> Result<i64, BackendError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// All documents of `collection`, in write order.
    pub async fn documents(&self, collection: &str) -> Result<Vec<Row>, BackendError> {
        let bodies: Vec<String> = sqlx::query_scalar(
            "SELECT body FROM documents WHERE collection = ? ORDER BY rowid",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        bodies
            .iter()
            .map(|b| {
                serde_json::from_str::<Row>(b).map_err(|e| BackendError::Other(anyhow::Error::new(e)))
            })
            .collect()
    }

    async fn journal_mode(&self) -> Result<String, BackendError> {
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await?;
        Ok(mode.to_lowercase())
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn enable_persistence(&self) -> Result<(), BackendError> {
        match self.journal_mode().await?.as_str() {
            "wal" => return Err(BackendError::PersistenceAlreadyEnabled),
            "memory" => return Err(BackendError::PersistenceUnsupported),
            _ => {}
        }
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode = WAL")
            .fetch_one(&self.pool)
            .await?;
        if !mode.eq_ignore_ascii_case("wal") {
            return Err(BackendError::PersistenceUnsupported);
        }
        Ok(())
    }

    async fn write_batch(&self, collection: &str, docs: &[Row]) -> Result<(), BackendError> {
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for doc in docs {
            let id = match doc.get("id") {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => uuid::Uuid::new_v4().to_string(),
            };
            let body = serde_json::to_string(doc)
                .map_err(|e| BackendError::Write(format!("unserializable document: {}", e)))?;

            sqlx::query(
                "INSERT INTO documents (collection, id, body, written_at) VALUES (?, ?, ?, ?)",
            )
            .bind(collection)
            .bind(&id)
            .bind(&body)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn probe(&self, collection: &str) -> Result<(), BackendError> {
        self.count(collection).await.map(|_| ())
    }
}
