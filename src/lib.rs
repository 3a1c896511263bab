//! # CSV Uploader
//!
//! Stage tabular data, review it, and upload it in chunks to one of several
//! configured document-database backends.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐
//! │ CSV text  │──▶│  Parse   │──▶│ Validate │──▶│ Review edits │
//! │ or file   │   └──────────┘   └──────────┘   └──────┬───────┘
//! └───────────┘                                        ▼
//!                ┌───────────────────┐         ┌──────────────┐
//!                │ ConnectionManager │◀────────│ Enrich+Chunk │
//!                │ memory/sqlite/http│         │   commit     │
//!                └───────────────────┘         └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! csvup backends                      # list configured backends
//! csvup check --backend local         # probe one backend
//! csvup validate words.csv            # parse + validate only
//! csvup upload words.csv --progress human
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error types per stage |
//! | [`backend`] | Driver/connection traits and built-in drivers |
//! | [`manager`] | Backend configuration list and connection cache |
//! | [`monitor`] | Periodic connectivity checks |
//! | [`parse`] | CSV parsing |
//! | [`validate`] | Batch validation |
//! | [`enrich`] | Id/timestamp stamping and field ordering |
//! | [`review`] | Paginated review editor |
//! | [`pipeline`] | Load → review → commit orchestration |
//! | [`progress`] | Upload progress reporting |
//! | [`paste`] | Pasted connection snippets |

pub mod backend;
pub mod config;
pub mod enrich;
pub mod error;
pub mod manager;
pub mod models;
pub mod monitor;
pub mod parse;
pub mod paste;
pub mod pipeline;
pub mod progress;
pub mod review;
pub mod validate;
