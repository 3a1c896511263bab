//! In-memory [`Connection`] for tests and dry runs.
//!
//! Documents are kept per collection behind `std::sync::RwLock`. Nothing
//! survives the process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::Connection;
use crate::error::BackendError;
use crate::models::Row;

pub struct MemoryConnection {
    collections: RwLock<HashMap<String, Vec<Row>>>,
    persistence: AtomicBool,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            persistence: AtomicBool::new(false),
        }
    }

    /// Snapshot of every document written to `collection`, in write order.
    pub fn documents(&self, collection: &str) -> Vec<Row> {
        self.collections
            .read()
            .map(|c| c.get(collection).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn persistence_enabled(&self) -> bool {
        self.persistence.load(Ordering::SeqCst)
    }
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn enable_persistence(&self) -> Result<(), BackendError> {
        if self.persistence.swap(true, Ordering::SeqCst) {
            return Err(BackendError::PersistenceAlreadyEnabled);
        }
        Ok(())
    }

    async fn write_batch(&self, collection: &str, docs: &[Row]) -> Result<(), BackendError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| BackendError::Write("memory store poisoned".to_string()))?;
        collections
            .entry(collection.to_string())
            .or_default()
            .extend(docs.iter().cloned());
        Ok(())
    }

    async fn probe(&self, _collection: &str) -> Result<(), BackendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(word: &str) -> Row {
        json!({ "word": word }).as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn writes_append_per_collection() {
        let conn = MemoryConnection::new();
        conn.write_batch("a", &[row("one"), row("two")]).await.unwrap();
        conn.write_batch("b", &[row("three")]).await.unwrap();
        conn.write_batch("a", &[row("four")]).await.unwrap();

        let a = conn.documents("a");
        assert_eq!(a.len(), 3);
        assert_eq!(a[2]["word"], "four");
        assert_eq!(conn.documents("b").len(), 1);
        assert!(conn.documents("c").is_empty());
    }

    #[tokio::test]
    async fn persistence_enables_once() {
        let conn = MemoryConnection::new();
        conn.enable_persistence().await.unwrap();
        assert!(conn.persistence_enabled());
        assert!(matches!(
            conn.enable_persistence().await,
            Err(BackendError::PersistenceAlreadyEnabled)
        ));
    }
}
