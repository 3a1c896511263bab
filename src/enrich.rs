//! Row enrichment before upload.
//!
//! Every committed row gets a fresh id and a timestamp, then the required
//! fields in configured order, then whatever else the row carried.
//! Id and time sources are injected so tests stay deterministic.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{RequiredFields, Row};

pub const ID_FIELD: &str = "id";
pub const TIMESTAMP_FIELD: &str = "timestamp";

pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Build the enriched form of `row`.
///
/// Fields already placed are not repeated, so an input column named `id` or
/// `timestamp` does not override the generated values.
pub fn enrich_row(row: &Row, required: &RequiredFields, id: String, timestamp: &str) -> Row {
    let mut out = Row::new();
    out.insert(ID_FIELD.to_string(), Value::String(id));
    out.insert(
        TIMESTAMP_FIELD.to_string(),
        Value::String(timestamp.to_string()),
    );

    for field in required.iter() {
        if let Some(value) = row.get(field) {
            out.insert(field.to_string(), value.clone());
        }
    }
    for (key, value) in row {
        if !out.contains_key(key) {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

pub fn enrich_rows(
    rows: &[Row],
    required: &RequiredFields,
    ids: &dyn IdGenerator,
    clock: &dyn Clock,
) -> Vec<Row> {
    rows.iter()
        .map(|row| {
            let ts = clock.now().to_rfc3339_opts(SecondsFormat::Millis, true);
            enrich_row(row, required, ids.next_id(), &ts)
        })
        .collect()
}
