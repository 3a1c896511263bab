//! Upload progress reporting.
//!
//! The pipeline reports one event per written chunk so callers can drive a
//! progress bar. The CLI prints progress on **stderr** so stdout stays
//! parseable for scripts.

use std::io::Write;

/// A single progress event for an upload.
#[derive(Clone, Debug, PartialEq)]
pub enum UploadProgressEvent {
    /// Re-validating the staged batch before any write.
    Validating { rows: u64 },
    /// Chunk `chunk` of `chunks` acknowledged by the backend.
    Chunk {
        chunk: u64,
        chunks: u64,
        rows_written: u64,
        total: u64,
        percent: f64,
    },
    /// Every chunk written.
    Done { total: u64 },
}

/// Cumulative percentage after `written` of `total` rows, capped at 100.
pub fn percent_complete(written: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (written as f64 / total as f64).min(1.0) * 100.0
}

/// Receives upload progress. Implementations must not block for long.
pub trait UploadProgressReporter: Send + Sync {
    fn report(&self, event: UploadProgressEvent);
}

/// Human-friendly progress on stderr: "upload vocabulary  1,000 / 1,200 rows  83%".
pub struct StderrProgress {
    pub collection: String,
}

impl UploadProgressReporter for StderrProgress {
    fn report(&self, event: UploadProgressEvent) {
        let line = match &event {
            UploadProgressEvent::Validating { rows } => {
                format!(
                    "upload {}  validating {} rows\n",
                    self.collection,
                    format_number(*rows)
                )
            }
            UploadProgressEvent::Chunk {
                rows_written,
                total,
                percent,
                ..
            } => format!(
                "upload {}  {} / {} rows  {}%\n",
                self.collection,
                format_number(*rows_written),
                format_number(*total),
                percent.round()
            ),
            UploadProgressEvent::Done { total } => {
                format!(
                    "upload {}  done  {} rows\n",
                    self.collection,
                    format_number(*total)
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress {
    pub collection: String,
}

impl UploadProgressReporter for JsonProgress {
    fn report(&self, event: UploadProgressEvent) {
        let obj = match &event {
            UploadProgressEvent::Validating { rows } => serde_json::json!({
                "event": "progress",
                "collection": self.collection,
                "phase": "validating",
                "rows": rows
            }),
            UploadProgressEvent::Chunk {
                chunk,
                chunks,
                rows_written,
                total,
                percent,
            } => serde_json::json!({
                "event": "progress",
                "collection": self.collection,
                "phase": "writing",
                "chunk": chunk,
                "chunks": chunks,
                "n": rows_written,
                "total": total,
                "percent": percent
            }),
            UploadProgressEvent::Done { total } => serde_json::json!({
                "event": "progress",
                "collection": self.collection,
                "phase": "done",
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl UploadProgressReporter for NoProgress {
    fn report(&self, _event: UploadProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self, collection: &str) -> Box<dyn UploadProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress {
                collection: collection.to_string(),
            }),
            ProgressMode::Json => Box::new(JsonProgress {
                collection: collection.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn percent_is_capped() {
        assert!((percent_complete(500, 1200) - 41.666).abs() < 0.01);
        assert!((percent_complete(1000, 1200) - 83.333).abs() < 0.01);
        assert_eq!(percent_complete(1500, 1200), 100.0);
        assert_eq!(percent_complete(0, 0), 100.0);
    }
}
