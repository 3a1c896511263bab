//! Ingestion pipeline orchestration.
//!
//! Raw input → parsed rows → validated batch → review edits → enriched rows
//! → chunked writes against the active backend. Stages run strictly in that
//! order. Loading new input replaces whatever was staged; nothing is merged.
//!
//! A commit writes chunks one after another and stops at the first failure.
//! Chunks written before the failure stay written.

use std::path::Path;

use crate::config::{Config, MAX_CHUNK_SIZE};
use crate::enrich::{enrich_rows, Clock, IdGenerator, SystemClock, UuidGenerator};
use crate::error::{CommitError, IngestError, ValidationError};
use crate::manager::ConnectionManager;
use crate::models::CollectionSettings;
use crate::parse::{parse_rows, ParseOptions, RawInput};
use crate::progress::{percent_complete, UploadProgressEvent, UploadProgressReporter};
use crate::review::ReviewEditor;
use crate::validate::RowValidator;

/// Result of loading new input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// A validated batch of `rows` rows is ready for review.
    Staged { rows: usize },
    /// Blank input; any previously staged batch was dropped.
    Cleared,
}

/// Summary of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    pub backend: String,
    pub collection: String,
    pub rows: usize,
    pub chunks: usize,
}

pub struct IngestPipeline {
    settings: CollectionSettings,
    validator: RowValidator,
    chunk_size: usize,
    ids: Box<dyn IdGenerator>,
    clock: Box<dyn Clock>,
    raw: Option<RawInput>,
    staged: Option<ReviewEditor>,
}

impl IngestPipeline {
    pub fn new(settings: CollectionSettings) -> Self {
        Self {
            settings,
            validator: RowValidator::default(),
            chunk_size: MAX_CHUNK_SIZE,
            ids: Box::new(UuidGenerator),
            clock: Box::new(SystemClock),
            raw: None,
            staged: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.collection.clone())
            .with_chunk_size(config.upload.chunk_size)
            .with_validator(RowValidator::with_max_rows(config.upload.max_rows))
    }

    /// Rows per write, clamped to `1..=500`.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    pub fn with_validator(mut self, validator: RowValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn settings(&self) -> &CollectionSettings {
        &self.settings
    }

    pub fn raw_input(&self) -> Option<&RawInput> {
        self.raw.as_ref()
    }

    pub fn staged(&self) -> Option<&ReviewEditor> {
        self.staged.as_ref()
    }

    /// Mutable access to the staged batch for review edits.
    pub fn editor(&mut self) -> Option<&mut ReviewEditor> {
        self.staged.as_mut()
    }

    pub fn clear(&mut self) {
        self.raw = None;
        self.staged = None;
    }

    /// Parse and validate `input`, replacing any staged batch.
    ///
    /// Blank pasted text clears the stage without an error. A parse or
    /// validation failure leaves nothing staged.
    pub fn load(&mut self, input: RawInput) -> Result<StageOutcome, IngestError> {
        self.staged = None;

        if matches!(input, RawInput::Text(_)) && input.is_blank() {
            self.raw = None;
            tracing::debug!("blank input, staged batch cleared");
            return Ok(StageOutcome::Cleared);
        }

        let rows = parse_rows(input.bytes(), ParseOptions::default());
        self.raw = Some(input);
        let rows = rows?;

        if let Some(err) = self.validator.validate(&rows, &self.settings.required_fields) {
            tracing::info!(error = %err, rows = rows.len(), "batch rejected");
            return Err(err.into());
        }

        let count = rows.len();
        self.staged = Some(ReviewEditor::new(rows));
        tracing::info!(rows = count, collection = %self.settings.name, "batch staged for review");
        Ok(StageOutcome::Staged { rows: count })
    }

    pub fn load_text(&mut self, text: &str) -> Result<StageOutcome, IngestError> {
        self.load(RawInput::text(text))
    }

    pub fn load_file(&mut self, path: &Path) -> Result<StageOutcome, IngestError> {
        let file = std::fs::File::open(path)?;
        self.load(RawInput::from_reader(path.display().to_string(), file)?)
    }

    /// Replace the collection settings and re-check any staged batch.
    ///
    /// A staged batch that no longer passes is discarded and the error returned.
    pub fn update_settings(&mut self, settings: CollectionSettings) -> Option<ValidationError> {
        self.settings = settings;
        let staged = self.staged.as_ref()?;
        let err = self
            .validator
            .validate(staged.rows(), &self.settings.required_fields)?;
        tracing::info!(error = %err, "staged batch no longer valid, discarded");
        self.staged = None;
        Some(err)
    }

    /// Write the staged batch to the active backend.
    ///
    /// Chunks are written sequentially; progress is reported after each one.
    /// On success the stage is cleared. On failure the batch stays staged.
    pub async fn commit(
        &mut self,
        manager: &ConnectionManager,
        progress: &dyn UploadProgressReporter,
    ) -> Result<CommitReport, CommitError> {
        let _guard = manager
            .begin_commit()
            .ok_or(CommitError::CommitInProgress)?;

        let enriched = {
            let rows = self
                .staged
                .as_ref()
                .map(ReviewEditor::rows)
                .ok_or(CommitError::NothingStaged)?;

            progress.report(UploadProgressEvent::Validating {
                rows: rows.len() as u64,
            });
            if let Some(err) = self
                .validator
                .validate(rows, &self.settings.required_fields)
            {
                return Err(err.into());
            }
            enrich_rows(
                rows,
                &self.settings.required_fields,
                self.ids.as_ref(),
                self.clock.as_ref(),
            )
        };

        let handle = manager.current_handle()?;
        let collection = self.settings.name.clone();
        let total = enriched.len();
        let chunks = total.div_ceil(self.chunk_size);
        let mut written = 0usize;

        for (idx, chunk) in enriched.chunks(self.chunk_size).enumerate() {
            tracing::debug!(
                backend = %handle.config_id(),
                chunk = idx + 1,
                chunks,
                rows = chunk.len(),
                "writing chunk"
            );
            if let Err(source) = handle.write_batch(&collection, chunk).await {
                tracing::error!(
                    backend = %handle.config_id(),
                    chunk = idx + 1,
                    chunks,
                    rows_committed = written,
                    error = %source,
                    "chunk write failed, aborting upload"
                );
                return Err(CommitError::ChunkFailed {
                    chunk: idx + 1,
                    chunks,
                    rows_committed: written,
                    source,
                });
            }
            written += chunk.len();
            progress.report(UploadProgressEvent::Chunk {
                chunk: (idx + 1) as u64,
                chunks: chunks as u64,
                rows_written: written as u64,
                total: total as u64,
                percent: percent_complete(((idx + 1) * self.chunk_size) as u64, total as u64),
            });
        }

        progress.report(UploadProgressEvent::Done {
            total: total as u64,
        });
        tracing::info!(backend = %handle.config_id(), %collection, rows = total, chunks, "upload complete");
        self.clear();

        Ok(CommitReport {
            backend: handle.config_id().to_string(),
            collection,
            rows: total,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryConnection;
    use crate::backend::{Connection, Driver};
    use crate::error::BackendError;
    use crate::models::{BackendConfig, RequiredFields};
    use crate::progress::NoProgress;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    fn settings(fields: &[&str]) -> CollectionSettings {
        CollectionSettings {
            name: "vocabulary".into(),
            required_fields: RequiredFields::try_from(
                fields.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            )
            .unwrap(),
        }
    }

    struct SharedMemory(Arc<MemoryConnection>);

    #[async_trait]
    impl Driver for SharedMemory {
        async fn open(&self, _config: &BackendConfig) -> Result<Arc<dyn Connection>, BackendError> {
            Ok(self.0.clone())
        }
    }

    async fn memory_manager() -> (ConnectionManager, Arc<MemoryConnection>) {
        let conn = Arc::new(MemoryConnection::new());
        let manager = ConnectionManager::new(
            vec![BackendConfig::new("mem", "Memory")],
            Arc::new(SharedMemory(conn.clone())),
        )
        .await
        .unwrap();
        (manager, conn)
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<UploadProgressEvent>>);

    impl UploadProgressReporter for Recorder {
        fn report(&self, event: UploadProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn blank_text_clears_stage() {
        let mut p = IngestPipeline::new(settings(&["word"]));
        p.load_text("word\nneko\n").unwrap();
        assert!(p.staged().is_some());
        assert_eq!(p.load_text("   \n ").unwrap(), StageOutcome::Cleared);
        assert!(p.staged().is_none());
        assert!(p.raw_input().is_none());
    }

    #[test]
    fn invalid_batch_is_not_staged() {
        let mut p = IngestPipeline::new(settings(&["word", "english"]));
        let err = p.load_text("word\nneko\n").unwrap_err();
        assert!(matches!(
            err,
            IngestError::Validation(ValidationError::MissingField(ref f)) if f == "english"
        ));
        assert!(p.staged().is_none());
    }

    #[test]
    fn new_input_replaces_staged_batch() {
        let mut p = IngestPipeline::new(settings(&["word"]));
        p.load_text("word\na\nb\nc\n").unwrap();
        assert_eq!(
            p.load_text("word\nz\n").unwrap(),
            StageOutcome::Staged { rows: 1 }
        );
        assert_eq!(p.staged().unwrap().rows()[0]["word"], "z");
    }

    #[test]
    fn header_only_file_is_empty_batch() {
        let mut p = IngestPipeline::new(settings(&["word"]));
        let input = RawInput::from_reader("empty.csv", "word\n".as_bytes()).unwrap();
        let err = p.load(input).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Validation(ValidationError::EmptyBatch)
        ));
    }

    #[test]
    fn load_file_stages_rows_and_keeps_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("words.csv");
        std::fs::write(&path, "word,english\nneko,cat\ninu,dog\n").unwrap();

        let mut p = IngestPipeline::new(settings(&["word"]));
        assert_eq!(
            p.load_file(&path).unwrap(),
            StageOutcome::Staged { rows: 2 }
        );
        assert!(matches!(
            p.raw_input(),
            Some(RawInput::File { name, .. }) if name.ends_with("words.csv")
        ));

        let missing = dir.path().join("nope.csv");
        assert!(matches!(p.load_file(&missing), Err(IngestError::Io(_))));
    }

    #[test]
    fn settings_change_revalidates_staged_batch() {
        let mut p = IngestPipeline::new(settings(&["word"]));
        p.load_text("word\nneko\n").unwrap();
        assert_eq!(p.update_settings(settings(&["word"])), None);
        assert!(p.staged().is_some());

        let err = p.update_settings(settings(&["word", "kanji"]));
        assert_eq!(err, Some(ValidationError::MissingField("kanji".into())));
        assert!(p.staged().is_none());
    }

    #[tokio::test]
    async fn commit_writes_enriched_rows_and_clears() {
        let (manager, conn) = memory_manager().await;
        let mut p = IngestPipeline::new(settings(&["english", "word"]));
        p.load_text("word,english,note\nneko,cat,x\ninu,dog,y\n").unwrap();
        p.editor().unwrap().delete(1).unwrap();

        let report = p.commit(&manager, &NoProgress).await.unwrap();
        assert_eq!(report.rows, 1);
        assert_eq!(report.chunks, 1);
        assert_eq!(report.backend, "mem");
        assert!(p.staged().is_none());

        let docs = conn.documents("vocabulary");
        assert_eq!(docs.len(), 1);
        let keys: Vec<&String> = docs[0].keys().collect();
        assert_eq!(keys, vec!["id", "timestamp", "english", "word", "note"]);
    }

    #[tokio::test]
    async fn commit_reports_progress_per_chunk() {
        let (manager, conn) = memory_manager().await;
        let mut p = IngestPipeline::new(settings(&["n"]));
        let mut text = String::from("n\n");
        for i in 0..1200 {
            text.push_str(&format!("{}\n", i));
        }
        p.load_text(&text).unwrap();

        let recorder = Recorder::default();
        let report = p.commit(&manager, &recorder).await.unwrap();
        assert_eq!(report.chunks, 3);
        assert_eq!(conn.documents("vocabulary").len(), 1200);

        let percents: Vec<f64> = recorder
            .0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                UploadProgressEvent::Chunk { percent, .. } => Some((percent * 100.0).round() / 100.0),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![41.67, 83.33, 100.0]);
    }

    #[tokio::test]
    async fn commit_without_stage_fails() {
        let (manager, _) = memory_manager().await;
        let mut p = IngestPipeline::new(settings(&["word"]));
        assert!(matches!(
            p.commit(&manager, &NoProgress).await,
            Err(CommitError::NothingStaged)
        ));
        assert!(!manager.commit_in_progress());
    }

    #[tokio::test]
    async fn commit_revalidates_after_edits() {
        let (manager, conn) = memory_manager().await;
        let mut p = IngestPipeline::new(settings(&["word"]));
        p.load_text("word\nneko\n").unwrap();
        p.editor().unwrap().delete(0).unwrap();
        assert!(matches!(
            p.commit(&manager, &NoProgress).await,
            Err(CommitError::Validation(ValidationError::EmptyBatch))
        ));
        assert!(conn.documents("vocabulary").is_empty());
    }
}
