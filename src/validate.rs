//! Minimal structural checks on a staged batch.

use crate::error::ValidationError;
use crate::models::{RequiredFields, Row};

/// Largest batch accepted for one upload.
pub const MAX_BATCH_ROWS: usize = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct RowValidator {
    max_rows: usize,
}

impl Default for RowValidator {
    fn default() -> Self {
        Self {
            max_rows: MAX_BATCH_ROWS,
        }
    }
}

impl RowValidator {
    pub fn with_max_rows(max_rows: usize) -> Self {
        Self { max_rows }
    }

    /// First failing rule wins: empty batch, oversized batch, then the first
    /// required field (in configured order) missing from the first row.
    ///
    /// Only row 0 is inspected for required fields.
    pub fn validate(&self, rows: &[Row], required: &RequiredFields) -> Option<ValidationError> {
        let first = match rows.first() {
            Some(first) => first,
            None => return Some(ValidationError::EmptyBatch),
        };
        if rows.len() > self.max_rows {
            return Some(ValidationError::BatchTooLarge {
                rows: rows.len(),
                max: self.max_rows,
            });
        }
        required
            .iter()
            .find(|field| !first.contains_key(*field))
            .map(|field| ValidationError::MissingField(field.to_string()))
    }
}
