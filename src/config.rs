use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::manager::DEFAULT_PROBE_COLLECTION;
use crate::models::{BackendConfig, CollectionSettings};

/// Writes per chunk accepted by every supported backend.
pub const MAX_CHUNK_SIZE: usize = 500;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub backends: Vec<BackendConfig>,
    pub collection: CollectionSettings,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_rows: default_max_rows(),
        }
    }
}

fn default_chunk_size() -> usize {
    MAX_CHUNK_SIZE
}
fn default_max_rows() -> usize {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatusConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_probe_collection")]
    pub probe_collection: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            probe_collection: default_probe_collection(),
        }
    }
}

fn default_interval_secs() -> u64 {
    30
}
fn default_probe_collection() -> String {
    DEFAULT_PROBE_COLLECTION.to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        // Validate backends
        if self.backends.is_empty() {
            anyhow::bail!("at least one [[backends]] entry is required");
        }
        let mut seen = HashSet::new();
        for backend in &self.backends {
            if backend.id.trim().is_empty() {
                anyhow::bail!("backends.id must not be empty");
            }
            if !seen.insert(backend.id.as_str()) {
                anyhow::bail!("duplicate backend id: '{}'", backend.id);
            }
        }

        self.collection.validate()?;

        // Validate upload
        if !(1..=MAX_CHUNK_SIZE).contains(&self.upload.chunk_size) {
            anyhow::bail!("upload.chunk_size must be in [1, {}]", MAX_CHUNK_SIZE);
        }
        if self.upload.max_rows == 0 {
            anyhow::bail!("upload.max_rows must be >= 1");
        }

        // Validate status
        if self.status.interval_secs == 0 {
            anyhow::bail!("status.interval_secs must be >= 1");
        }

        Ok(())
    }
}
