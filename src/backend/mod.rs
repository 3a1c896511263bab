//! Database backend abstraction.
//!
//! A [`Driver`] turns a [`BackendConfig`] into a live [`Connection`]. The
//! connection manager owns one connection per configuration and the ingest
//! pipeline writes chunks through it.
//!
//! | Driver name | Module | Storage |
//! |-------------|--------|---------|
//! | `memory` | [`memory`] | process memory |
//! | `sqlite` | [`sqlite`] | local SQLite file, JSON bodies |
//! | `http` | [`http`] | REST document endpoint |

pub mod http;
pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BackendError;
use crate::models::{BackendConfig, Row};

/// A live connection to one document database.
///
/// Implementations must be `Send + Sync`; the manager shares a single
/// connection between the pipeline and the status monitor.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Try to turn on local durability/caching.
    ///
    /// [`BackendError::PersistenceAlreadyEnabled`] and
    /// [`BackendError::PersistenceUnsupported`] are the expected soft failures.
    async fn enable_persistence(&self) -> Result<(), BackendError>;

    /// Write every document in `docs` to `collection` as one atomic unit.
    async fn write_batch(&self, collection: &str, docs: &[Row]) -> Result<(), BackendError>;

    /// Lightweight read used only to check that the backend answers.
    async fn probe(&self, collection: &str) -> Result<(), BackendError>;
}

/// Builds connections from backend configurations.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn open(&self, config: &BackendConfig) -> Result<Arc<dyn Connection>, BackendError>;
}

/// Dispatches on the `driver` connection parameter.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinDriver;

#[async_trait]
impl Driver for BuiltinDriver {
    async fn open(&self, config: &BackendConfig) -> Result<Arc<dyn Connection>, BackendError> {
        match config.param("driver").unwrap_or("memory") {
            "memory" => Ok(Arc::new(memory::MemoryConnection::new())),
            "sqlite" => Ok(Arc::new(sqlite::SqliteConnection::open(config).await?)),
            "http" => Ok(Arc::new(http::HttpConnection::open(config)?)),
            other => Err(BackendError::InvalidParams(format!(
                "unknown driver '{}'. Must be memory, sqlite, or http.",
                other
            ))),
        }
    }
}
