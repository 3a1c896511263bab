//! CSV parsing into ordered rows.
//!
//! The first record is the header row and blank lines are skipped. Any
//! malformed record fails the whole parse; there is no partial result.

use std::io::Read;

use csv::ReaderBuilder;
use serde_json::Value;

use crate::error::IngestError;
use crate::models::Row;

/// Raw input accepted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    /// Text pasted by the user.
    Text(String),
    /// Contents of an uploaded file.
    File { name: String, bytes: Vec<u8> },
}

impl RawInput {
    pub fn text(text: impl Into<String>) -> Self {
        RawInput::Text(text.into())
    }

    pub fn from_reader(name: impl Into<String>, mut reader: impl Read) -> Result<Self, IngestError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(RawInput::File {
            name: name.into(),
            bytes,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            RawInput::Text(text) => text.as_bytes(),
            RawInput::File { bytes, .. } => bytes,
        }
    }

    /// True for input with nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.bytes().iter().all(u8::is_ascii_whitespace)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    pub header: bool,
    pub skip_blank_lines: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            header: true,
            skip_blank_lines: true,
        }
    }
}

/// Parse CSV bytes into rows keyed by header name.
pub fn parse_rows(input: &[u8], options: ParseOptions) -> Result<Vec<Row>, IngestError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(options.header)
        .flexible(false)
        .from_reader(input);

    let headers: Vec<String> = if options.header {
        reader
            .headers()
            .map_err(to_parse_error)?
            .iter()
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(to_parse_error)?;
        // The reader already drops empty lines; this catches a lone `""`.
        if options.skip_blank_lines && record.len() == 1 && record[0].is_empty() {
            continue;
        }
        let mut row = Row::new();
        for (idx, value) in record.iter().enumerate() {
            let key = headers
                .get(idx)
                .cloned()
                .unwrap_or_else(|| idx.to_string());
            row.insert(key, Value::String(value.to_string()));
        }
        rows.push(row);
    }
    Ok(rows)
}

fn to_parse_error(err: csv::Error) -> IngestError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    let message = match err.kind() {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("expected {} fields, found {}", expected_len, len),
        csv::ErrorKind::Utf8 { .. } => "invalid UTF-8".to_string(),
        _ => err.to_string(),
    };
    IngestError::parse(line, message)
}
