//! Backend configurations and their connections.
//!
//! [`ConfigStore`] is the ordered, never-empty list of [`BackendConfig`]s.
//! [`ConnectionManager`] wraps it with one lazily opened connection per
//! configuration id, tracks which configuration is active, and answers
//! connectivity checks.
//!
//! Connection lifecycle per id: `Uninitialized → Initializing → Ready`.
//! Concurrent requests for the same uninitialized id share one
//! initialization through a [`tokio::sync::OnceCell`].

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::OnceCell;

use crate::backend::{Connection, Driver};
use crate::error::{BackendError, ManagerError};
use crate::models::{BackendConfig, ConnectivityStatus};

/// Collection read by connectivity probes unless overridden.
pub const DEFAULT_PROBE_COLLECTION: &str = "uploadedData";

// ═══════════════════════════════════════════════════════════════════════
// ConfigStore
// ═══════════════════════════════════════════════════════════════════════

/// Ordered list of backend configurations. Always holds at least one entry.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    configs: Vec<BackendConfig>,
}

impl ConfigStore {
    pub fn new(configs: Vec<BackendConfig>) -> Result<Self, ManagerError> {
        if configs.is_empty() {
            return Err(ManagerError::EmptyConfigList);
        }
        let mut store = Self {
            configs: Vec::with_capacity(configs.len()),
        };
        for config in configs {
            store.add(config)?;
        }
        Ok(store)
    }

    pub fn list(&self) -> Vec<BackendConfig> {
        self.configs.clone()
    }

    pub fn get(&self, id: &str) -> Option<&BackendConfig> {
        self.configs.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn first(&self) -> &BackendConfig {
        &self.configs[0]
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Append `config`. Ids are unique.
    pub fn add(&mut self, config: BackendConfig) -> Result<Vec<BackendConfig>, ManagerError> {
        if self.contains(&config.id) {
            return Err(ManagerError::DuplicateId(config.id));
        }
        self.configs.push(config);
        Ok(self.list())
    }

    /// Remove `id`. The last remaining configuration cannot be removed.
    pub fn remove(&mut self, id: &str) -> Result<Vec<BackendConfig>, ManagerError> {
        let idx = self
            .configs
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ManagerError::UnknownConfig(id.to_string()))?;
        if self.configs.len() == 1 {
            return Err(ManagerError::LastConfig);
        }
        self.configs.remove(idx);
        Ok(self.list())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ConnectionHandle
// ═══════════════════════════════════════════════════════════════════════

/// A ready connection for one backend configuration.
///
/// Cloning is cheap; every clone for the same id shares one connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    config_id: String,
    conn: Arc<dyn Connection>,
}

impl ConnectionHandle {
    pub fn config_id(&self) -> &str {
        &self.config_id
    }

    /// True when both handles wrap the very same connection.
    pub fn same_connection(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.conn, &other.conn)
    }
}

impl Deref for ConnectionHandle {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref()
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("config_id", &self.config_id)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ConnectionManager
// ═══════════════════════════════════════════════════════════════════════

type HandleCell = Arc<OnceCell<ConnectionHandle>>;

/// Owns the configuration list, the connection cache and the active selection.
///
/// Construct one per process (or per test) and share it by reference or `Arc`.
pub struct ConnectionManager {
    driver: Arc<dyn Driver>,
    store: RwLock<ConfigStore>,
    active: RwLock<Option<String>>,
    handles: Mutex<HashMap<String, HandleCell>>,
    probe_collection: String,
    committing: AtomicBool,
}

impl ConnectionManager {
    /// Build a manager and open a connection for the first configuration,
    /// which becomes the active one.
    pub async fn new(
        configs: Vec<BackendConfig>,
        driver: Arc<dyn Driver>,
    ) -> Result<Self, ManagerError> {
        let store = ConfigStore::new(configs)?;
        let first = store.first().id.clone();
        let manager = Self {
            driver,
            store: RwLock::new(store),
            active: RwLock::new(None),
            handles: Mutex::new(HashMap::new()),
            probe_collection: DEFAULT_PROBE_COLLECTION.to_string(),
            committing: AtomicBool::new(false),
        };
        manager.handle_for(&first).await?;
        manager.set_active(&first);
        Ok(manager)
    }

    pub fn with_probe_collection(mut self, collection: impl Into<String>) -> Self {
        self.probe_collection = collection.into();
        self
    }

    pub fn list_configs(&self) -> Vec<BackendConfig> {
        self.store().list()
    }

    pub fn active_id(&self) -> Option<String> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current_config(&self) -> Result<BackendConfig, ManagerError> {
        let id = self.active_id().ok_or(ManagerError::NotInitialized)?;
        self.store()
            .get(&id)
            .cloned()
            .ok_or(ManagerError::UnknownConfig(id))
    }

    pub fn add_config(&self, config: BackendConfig) -> Result<Vec<BackendConfig>, ManagerError> {
        let id = config.id.clone();
        let list = self.store_mut().add(config)?;
        tracing::info!(backend = %id, "added backend configuration");
        Ok(list)
    }

    /// Remove a configuration. When it was active, the new first
    /// configuration becomes active and its connection is opened right away.
    ///
    /// The replacement is opened before anything changes, so a failure
    /// leaves the list and the active selection as they were.
    pub async fn remove_config(&self, id: &str) -> Result<Vec<BackendConfig>, ManagerError> {
        let first = {
            let mut remaining = self.store().clone();
            remaining.remove(id)?;
            remaining.first().id.clone()
        };

        let was_active = self.active_id().as_deref() == Some(id);
        if was_active {
            self.handle_for(&first).await?;
        }

        let list = self.store_mut().remove(id)?;
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        tracing::info!(backend = %id, "removed backend configuration");

        if was_active {
            self.set_active(&first);
            tracing::info!(backend = %first, "active backend moved to first remaining");
        }
        Ok(list)
    }

    /// Make `id` the active configuration, opening its connection if needed.
    pub async fn switch_active(&self, id: &str) -> Result<ConnectionHandle, ManagerError> {
        if self.active_id().as_deref() == Some(id) {
            return self.current_handle();
        }
        let known = self.store().contains(id);
        if !known {
            return Err(ManagerError::UnknownConfig(id.to_string()));
        }
        let handle = self.handle_for(id).await?;
        self.set_active(id);
        tracing::info!(backend = %id, "switched active backend");
        Ok(handle)
    }

    pub fn current_handle(&self) -> Result<ConnectionHandle, ManagerError> {
        let id = self.active_id().ok_or(ManagerError::NotInitialized)?;
        let cell = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(ManagerError::NotInitialized)?;
        cell.get().cloned().ok_or(ManagerError::NotInitialized)
    }

    /// Probe a backend. Never fails; problems come back as a status value.
    ///
    /// With `Some(id)` the active configuration is switched first.
    pub async fn check_connectivity(&self, id: Option<&str>) -> ConnectivityStatus {
        let handle = match id {
            Some(id) => self.switch_active(id).await,
            None => self.current_handle(),
        };

        let outcome = match handle {
            Ok(handle) => handle.probe(&self.probe_collection).await,
            Err(ManagerError::Backend { source, .. }) => Err(source),
            Err(other) => Err(BackendError::Other(other.into())),
        };

        match outcome {
            Ok(()) => match self.current_config() {
                Ok(config) => ConnectivityStatus::connected(&config.display_name),
                Err(e) => {
                    tracing::warn!(error = %e, "connectivity probe succeeded without an active backend");
                    ConnectivityStatus::unreachable()
                }
            },
            Err(BackendError::Offline(detail)) => {
                tracing::info!(%detail, "backend reports offline mode");
                ConnectivityStatus::offline()
            }
            Err(e) => {
                tracing::warn!(error = %e, "backend connectivity check failed");
                ConnectivityStatus::unreachable()
            }
        }
    }

    /// Mark an upload as running. `None` when one already is.
    pub fn begin_commit(&self) -> Option<CommitGuard<'_>> {
        self.committing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| CommitGuard { manager: self })
    }

    pub fn commit_in_progress(&self) -> bool {
        self.committing.load(Ordering::SeqCst)
    }

    /// Get-or-create the connection for `id`.
    async fn handle_for(&self, id: &str) -> Result<ConnectionHandle, ManagerError> {
        let config = self
            .store()
            .get(id)
            .cloned()
            .ok_or_else(|| ManagerError::UnknownConfig(id.to_string()))?;

        let cell = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_try_init(|| self.open(&config)).await.cloned()
    }

    async fn open(&self, config: &BackendConfig) -> Result<ConnectionHandle, ManagerError> {
        tracing::debug!(backend = %config.id, "opening backend connection");
        let conn = self
            .driver
            .open(config)
            .await
            .map_err(|source| ManagerError::Backend {
                id: config.id.clone(),
                source,
            })?;

        match conn.enable_persistence().await {
            Ok(()) => tracing::info!(backend = %config.id, "local persistence enabled"),
            Err(BackendError::PersistenceAlreadyEnabled) => {
                tracing::info!(backend = %config.id, "persistence already enabled elsewhere")
            }
            Err(BackendError::PersistenceUnsupported) => {
                tracing::info!(backend = %config.id, "persistence not supported by backend")
            }
            Err(e) => {
                tracing::warn!(backend = %config.id, error = %e, "backend initialization encountered an issue")
            }
        }

        tracing::info!(backend = %config.id, name = %config.display_name, "backend connection ready");
        Ok(ConnectionHandle {
            config_id: config.id.clone(),
            conn,
        })
    }

    fn set_active(&self, id: &str) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(id.to_string());
    }

    fn store(&self) -> std::sync::RwLockReadGuard<'_, ConfigStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_mut(&self) -> std::sync::RwLockWriteGuard<'_, ConfigStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-progress flag on drop.
pub struct CommitGuard<'a> {
    manager: &'a ConnectionManager,
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        self.manager.committing.store(false, Ordering::SeqCst);
    }
}
