//! Chat Atlas - Turn chat exports into a timeline of topic maps
//!
//! This library ingests ChatGPT and Claude conversation exports and produces one
//! 2D visualization snapshot per calendar month. It supports:
//!
//! - Detecting the export schema and rebuilding each conversation's message tree
//! - Labelling branches with stable dotted ids ("0", "0.1", "0.1.0") at edit forks
//! - Re-embedding, projecting and clustering the cumulative corpus month by month
//! - Persisting immutable per-month snapshots and a "latest" mirror
//! - Running uploads through a single background worker with progress tracking
//!
//! # Example
//!
//! ```no_run
//! use chat_atlas::{Settings, TaskOrchestrator};
//! use std::time::Duration;
//!
//! let orchestrator = TaskOrchestrator::with_ollama(Settings::from_env())?;
//! let id = orchestrator.start_task("conversations.json")?;
//! let report = orchestrator.wait(id, Duration::from_secs(3600));
//! println!("{:?}", report);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod branches;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod parsers;
pub mod pipeline;
pub mod providers;
pub mod storage;
pub mod tasks;
pub mod telemetry;
pub mod utils;

// Re-export commonly used types
pub use branches::{detect_edit_branches, label_branches, linearize};
pub use config::Settings;
pub use models::{ExportFormat, FlatMessage, Snapshot};
pub use parsers::load_export;
pub use storage::SnapshotStore;
pub use tasks::TaskOrchestrator;
