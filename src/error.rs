//! Error types for the upload core.
//!
//! Each stage of the pipeline has its own enum so callers can tell a bad
//! batch from a bad backend without string matching. The CLI wraps all of
//! them in `anyhow`.

use thiserror::Error;

/// Structural problems with a staged batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("CSV data is empty")]
    EmptyBatch,

    #[error("CSV data too large: {rows} rows (max {max})")]
    BatchTooLarge { rows: usize, max: usize },

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Failures while turning raw input into a staged batch.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Error parsing CSV data at line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn parse(line: u64, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Errors raised by a database driver or connection.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Local persistence is already active in another context.
    #[error("local persistence already enabled elsewhere")]
    PersistenceAlreadyEnabled,

    /// The backend cannot persist locally.
    #[error("local persistence not supported by this backend")]
    PersistenceUnsupported,

    /// The backend confirmed it is offline; writes may be queued.
    #[error("backend is offline: {0}")]
    Offline(String),

    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("invalid connection parameters: {0}")]
    InvalidParams(String),

    #[error("write rejected: {0}")]
    Write(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the configuration store and connection manager.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("backend configuration list must not be empty")]
    EmptyConfigList,

    #[error("backend configuration already exists: {0}")]
    DuplicateId(String),

    #[error("backend configuration not found: {0}")]
    UnknownConfig(String),

    #[error("Cannot delete the last database configuration")]
    LastConfig,

    #[error("No database configuration initialized")]
    NotInitialized,

    #[error("failed to open backend '{id}': {source}")]
    Backend {
        id: String,
        #[source]
        source: BackendError,
    },
}

/// Errors raised during the commit stage.
#[derive(Error, Debug)]
pub enum CommitError {
    #[error("nothing staged to upload")]
    NothingStaged,

    #[error("an upload is already in progress")]
    CommitInProgress,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    /// Chunk `chunk` (1-based) of `chunks` failed. Earlier chunks stay written.
    #[error("chunk {chunk} of {chunks} failed after {rows_committed} rows were written: {source}")]
    ChunkFailed {
        chunk: usize,
        chunks: usize,
        rows_committed: usize,
        #[source]
        source: BackendError,
    },
}

impl CommitError {
    /// True when some chunks were persisted before the failure.
    pub fn is_partial(&self) -> bool {
        matches!(self, CommitError::ChunkFailed { rows_committed, .. } if *rows_committed > 0)
    }
}

/// Errors editing the required-field list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("field name must not be empty")]
    Empty,

    #[error("field already required: {0}")]
    Duplicate(String),

    #[error("field not in list: {0}")]
    Unknown(String),
}

/// Errors from the review editor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("row {index} out of range (batch has {len} rows)")]
    RowOutOfRange { index: usize, len: usize },
}

/// Errors reading a pasted connection snippet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasteError {
    #[error("configuration snippet is empty")]
    Empty,

    #[error("Project ID not found in configuration")]
    MissingProjectId,
}
