//! Core data types shared by the manager, pipeline and review editor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// One parsed record. Keys keep their insertion order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A named target database and the parameters needed to reach it.
///
/// `params` is opaque to the manager; only the driver reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl BackendConfig {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Ordered list of field names every uploaded row must carry.
///
/// Order decides where the fields land in an enriched row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct RequiredFields(Vec<String>);

impl RequiredFields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|f| f == name)
    }

    pub fn add(&mut self, name: &str) -> Result<(), FieldError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FieldError::Empty);
        }
        if self.contains(name) {
            return Err(FieldError::Duplicate(name.to_string()));
        }
        self.0.push(name.to_string());
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<(), FieldError> {
        let idx = self.position(name)?;
        self.0.remove(idx);
        Ok(())
    }

    /// Swap a field with its neighbour. No-op at either end.
    pub fn move_field(&mut self, name: &str, direction: Direction) -> Result<(), FieldError> {
        let idx = self.position(name)?;
        match direction {
            Direction::Up if idx > 0 => self.0.swap(idx, idx - 1),
            Direction::Down if idx + 1 < self.0.len() => self.0.swap(idx, idx + 1),
            _ => {}
        }
        Ok(())
    }

    /// Drag-and-drop reorder: take `dragged` out and insert it where `target` sits.
    pub fn reorder(&mut self, dragged: &str, target: &str) -> Result<(), FieldError> {
        if dragged == target {
            return Ok(());
        }
        let from = self.position(dragged)?;
        let to = self.position(target)?;
        let field = self.0.remove(from);
        self.0.insert(to, field);
        Ok(())
    }

    fn position(&self, name: &str) -> Result<usize, FieldError> {
        self.0
            .iter()
            .position(|f| f == name)
            .ok_or_else(|| FieldError::Unknown(name.to_string()))
    }
}

impl TryFrom<Vec<String>> for RequiredFields {
    type Error = FieldError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        let mut fields = RequiredFields::new();
        for name in &names {
            fields.add(name)?;
        }
        Ok(fields)
    }
}

impl From<RequiredFields> for Vec<String> {
    fn from(fields: RequiredFields) -> Self {
        fields.0
    }
}

/// Target collection and the fields each row must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSettings {
    pub name: String,
    pub required_fields: RequiredFields,
}

impl CollectionSettings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("collection.name must not be empty");
        }
        if self.required_fields.is_empty() {
            anyhow::bail!("collection.required_fields must list at least one field");
        }
        Ok(())
    }
}

/// Outcome class of a connectivity probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityKind {
    Connected,
    /// Backend reported offline mode. Expected state, not an error.
    Offline,
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityStatus {
    pub connected: bool,
    pub kind: ConnectivityKind,
    pub detail: String,
}

impl ConnectivityStatus {
    pub fn connected(display_name: &str) -> Self {
        Self {
            connected: true,
            kind: ConnectivityKind::Connected,
            detail: format!("Connected to {}", display_name),
        }
    }

    pub fn offline() -> Self {
        Self {
            connected: false,
            kind: ConnectivityKind::Offline,
            detail: "Operating in offline mode. Changes will sync when connection is restored."
                .to_string(),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            connected: false,
            kind: ConnectivityKind::Unreachable,
            detail: "Unable to connect to the database. Please check your network connection."
                .to_string(),
        }
    }
}
