//! # CSV Uploader CLI (`csvup`)
//!
//! Parses CSV input, validates it against the configured collection
//! settings, and uploads it in chunks to the active backend.
//!
//! ## Usage
//!
//! ```bash
//! csvup --config ./config/csvup.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `csvup backends` | List configured backends |
//! | `csvup check` | Probe the active (or a given) backend |
//! | `csvup validate <file>` | Parse and validate without uploading |
//! | `csvup upload <file>` | Review and upload a CSV file |
//! | `csvup watch` | Re-check connectivity on the configured interval |
//! | `csvup paste-config` | Turn a pasted connection snippet into TOML |

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use csv_uploader::backend::BuiltinDriver;
use csv_uploader::config::{self, Config};
use csv_uploader::error::CommitError;
use csv_uploader::manager::ConnectionManager;
use csv_uploader::models::{BackendConfig, ConnectivityKind, Row};
use csv_uploader::monitor::StatusMonitor;
use csv_uploader::parse::RawInput;
use csv_uploader::paste::parse_pasted_config;
use csv_uploader::pipeline::{IngestPipeline, StageOutcome};
use csv_uploader::progress::ProgressMode;
use csv_uploader::review::ReviewEditor;

const DEFAULT_LOG_FILTER: &str = "csv_uploader=info";

/// CSV Uploader CLI: review tabular data and upload it to a document database.
#[derive(Parser)]
#[command(
    name = "csvup",
    about = "CSV Uploader: review tabular data and upload it to a document database",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/csvup.toml")]
    config: PathBuf,

    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured backends and mark the active one.
    Backends,

    /// Check connectivity of the active backend, or of `--backend`.
    Check {
        #[arg(long)]
        backend: Option<String>,
    },

    /// Parse and validate CSV input without uploading.
    Validate {
        /// CSV file, or `-` to read from stdin.
        input: String,
    },

    /// Parse, validate, review and upload CSV input.
    Upload {
        /// CSV file, or `-` to read from stdin.
        input: String,

        /// Backend id to upload to. Defaults to the first configured backend.
        #[arg(long)]
        backend: Option<String>,

        /// Override the target collection name.
        #[arg(long)]
        collection: Option<String>,

        /// Drop a row (1-based) before uploading. Repeatable.
        #[arg(long = "delete", value_name = "ROW")]
        delete: Vec<usize>,

        /// Show what would be uploaded without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to human on a TTY, otherwise off.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Periodically check connectivity and print every result.
    Watch {
        /// Stop after this many results.
        #[arg(long)]
        count: Option<usize>,
    },

    /// Read a pasted connection snippet on stdin and print a `[[backends]]` block.
    PasteConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Commands that don't require config
    if let Commands::PasteConfig = cli.command {
        return paste_config();
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Backends => {
            let manager = open_manager(&cfg).await?;
            list_backends(&manager);
        }
        Commands::Check { backend } => {
            let manager = open_manager(&cfg).await?;
            let status = manager.check_connectivity(backend.as_deref()).await;
            let name = manager
                .current_config()
                .map(|c| c.display_name)
                .unwrap_or_default();
            println!("backend: {}", name);
            println!("connected: {}", status.connected);
            println!("{}", status.detail);
            if status.kind == ConnectivityKind::Unreachable {
                anyhow::bail!("backend unreachable");
            }
        }
        Commands::Validate { input } => {
            let mut pipeline = IngestPipeline::from_config(&cfg);
            match load_input(&mut pipeline, &input)? {
                StageOutcome::Cleared => println!("input is empty"),
                StageOutcome::Staged { rows } => {
                    let columns = pipeline
                        .staged()
                        .map(ReviewEditor::columns)
                        .unwrap_or_default();
                    println!("rows: {}", rows);
                    println!("columns: {}", columns.join(", "));
                    println!("ok");
                }
            }
        }
        Commands::Upload {
            input,
            backend,
            collection,
            delete,
            dry_run,
            progress,
        } => {
            let manager = open_manager(&cfg).await?;
            if let Some(id) = backend.as_deref() {
                manager.switch_active(id).await?;
            }

            let mut pipeline = IngestPipeline::from_config(&cfg);
            if let Some(name) = collection {
                let mut settings = pipeline.settings().clone();
                settings.name = name;
                settings.validate()?;
                pipeline.update_settings(settings);
            }

            if load_input(&mut pipeline, &input)? == StageOutcome::Cleared {
                anyhow::bail!("input is empty");
            }
            apply_deletions(&mut pipeline, delete)?;

            let editor = pipeline.staged().context("no rows staged")?;
            print_page(editor);

            let backend = manager.current_config()?;
            let collection = pipeline.settings().name.clone();
            if dry_run {
                let chunks = editor.len().div_ceil(cfg.upload.chunk_size);
                println!("upload {} (dry-run)", collection);
                println!("  backend: {}", backend.display_name);
                println!("  rows: {}", editor.len());
                println!("  chunks: {}", chunks);
                return Ok(());
            }

            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let reporter = mode.reporter(&collection);
            match pipeline.commit(&manager, reporter.as_ref()).await {
                Ok(report) => {
                    println!("upload {}", report.collection);
                    println!("  backend: {}", backend.display_name);
                    println!("  rows written: {}", report.rows);
                    println!("  chunks: {}", report.chunks);
                    println!("ok");
                }
                Err(e @ CommitError::ChunkFailed { .. }) if e.is_partial() => {
                    return Err(e).context("upload partially committed; earlier chunks were kept");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Watch { count } => {
            let manager = Arc::new(open_manager(&cfg).await?);
            watch(manager, &cfg, count).await?;
        }
        Commands::PasteConfig => unreachable!("handled before config load"),
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("csv_uploader=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn open_manager(cfg: &Config) -> Result<ConnectionManager> {
    let manager = ConnectionManager::new(cfg.backends.clone(), Arc::new(BuiltinDriver))
        .await
        .context("Failed to open the first configured backend")?;
    Ok(manager.with_probe_collection(cfg.status.probe_collection.clone()))
}

/// Stage `input`: a file path, or `-` for text on stdin.
fn load_input(pipeline: &mut IngestPipeline, input: &str) -> Result<StageOutcome> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(pipeline.load(RawInput::Text(text))?);
    }
    pipeline
        .load_file(Path::new(input))
        .with_context(|| format!("Failed to load input file: {}", input))
}

/// Delete 1-based rows, highest first so earlier indices stay put.
fn apply_deletions(pipeline: &mut IngestPipeline, mut rows: Vec<usize>) -> Result<()> {
    rows.sort_unstable_by(|a, b| b.cmp(a));
    rows.dedup();
    let editor = pipeline.editor().context("no rows staged")?;
    for row in rows {
        if row == 0 {
            anyhow::bail!("--delete rows are 1-based");
        }
        editor.delete(row - 1)?;
    }
    Ok(())
}

fn list_backends(manager: &ConnectionManager) {
    let active = manager.active_id();
    println!("{:<20} {:<24} {:<8} ACTIVE", "ID", "NAME", "DRIVER");
    for backend in manager.list_configs() {
        println!(
            "{:<20} {:<24} {:<8} {}",
            backend.id,
            backend.display_name,
            backend.param("driver").unwrap_or("memory"),
            active.as_deref() == Some(backend.id.as_str())
        );
    }
}

fn print_page(editor: &ReviewEditor) {
    let columns = editor.columns();
    let range = editor.page_range();
    println!(
        "Showing {} to {} of {} entries",
        range.start + 1,
        range.end,
        editor.len()
    );
    println!("{}", columns.join("\t"));
    for row in editor.page_rows() {
        println!("{}", format_row(row, &columns));
    }
}

fn format_row(row: &Row, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| match row.get(c) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        })
        .collect::<Vec<_>>()
        .join("\t")
}

async fn watch(manager: Arc<ConnectionManager>, cfg: &Config, count: Option<usize>) -> Result<()> {
    let (mut rx, handle) = StatusMonitor::from_config(manager, &cfg.status).spawn();
    let mut seen = 0usize;
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = rx.borrow_and_update().clone();
                if let Some(status) = latest {
                    println!(
                        "{}  connected={}  {}",
                        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                        status.connected,
                        status.detail
                    );
                    seen += 1;
                }
                if count.is_some_and(|n| seen >= n) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    handle.abort();
    // Give the aborted task a moment to unwind.
    let _ = tokio::time::timeout(Duration::from_millis(100), handle).await;
    Ok(())
}

#[derive(Serialize)]
struct BackendsBlock {
    backends: Vec<BackendConfig>,
}

fn paste_config() -> Result<()> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read stdin")?;
    let backend = parse_pasted_config(&text)?;
    let block = toml::to_string(&BackendsBlock {
        backends: vec![backend],
    })
    .context("Failed to render backend as TOML")?;
    print!("{}", block);
    Ok(())
}
