use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};

use crate::branches::{detect_edit_branches, linearize};
use crate::config::{DEFAULT_TIMEOUT_SECS, SeedChoice, Settings};
use crate::models::{ExportFormat, TaskStatus, branch_title};
use crate::parsers::load_export;
use crate::providers::catalog::{DEFAULT_LIBRARY_URL, LibraryFetcher};
use crate::providers::{ModelCatalog, ModelKind};
use crate::storage::SnapshotStore;
use crate::tasks::TaskOrchestrator;
use crate::utils::{display_line, format_path_with_tilde};

const PROGRESS_POLL: Duration = Duration::from_millis(500);
const TEXT_WIDTH: usize = 100;

#[derive(Parser)]
#[command(name = "chat-atlas")]
#[command(version = "0.1.0")]
#[command(about = "Map chat exports into monthly topic snapshots", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process an export into monthly snapshots
    Process {
        /// ChatGPT or Claude export (JSON array of conversations)
        file: PathBuf,

        /// Base directory for processed datasets
        #[arg(long, env = "CHAT_ATLAS_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Seed for the 2D projection, or `random` for a fresh layout each run
        #[arg(long, env = "CHAT_ATLAS_SEED")]
        seed: Option<SeedChoice>,

        /// Skip reflection generation for struggle messages
        #[arg(long)]
        no_reflections: bool,

        /// Base URL of the Ollama-compatible backend
        #[arg(long, env = "OLLAMA_HOST")]
        ollama_host: Option<String>,
    },

    /// List stored snapshots for a dataset
    Snapshots {
        /// Dataset to list (chatgpt or claude)
        #[arg(long)]
        format: ExportFormat,

        #[arg(long, env = "CHAT_ATLAS_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },

    /// Show the clusters of one monthly snapshot
    Show {
        /// Month key, YYYY-MM
        month: String,

        #[arg(long)]
        format: ExportFormat,

        #[arg(long, env = "CHAT_ATLAS_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },

    /// Detect forks caused by edited messages
    Edits {
        file: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show message counts per conversation branch
    Branches { file: PathBuf },

    /// List models offered by the model library
    Models {
        #[arg(long, default_value = DEFAULT_LIBRARY_URL)]
        library_url: String,

        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout_secs: u64,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Process { file, data_dir, seed, no_reflections, ollama_host }) => {
            let mut settings = settings_with(data_dir);
            if let Some(seed) = seed {
                settings.pipeline.projection.seed = seed.as_seed();
            }
            if no_reflections {
                settings.pipeline.reflections = false;
            }
            if let Some(host) = ollama_host {
                settings.provider.host = host;
            }
            process(&file, settings)?;
        }
        Some(Commands::Snapshots { format, data_dir }) => {
            show_snapshots(&settings_with(data_dir).data_dir, format)?;
        }
        Some(Commands::Show { month, format, data_dir }) => {
            show_snapshot(&settings_with(data_dir).data_dir, format, &month)?;
        }
        Some(Commands::Edits { file, json }) => {
            show_edits(&file, json)?;
        }
        Some(Commands::Branches { file }) => {
            show_branches(&file)?;
        }
        Some(Commands::Models { library_url, timeout_secs }) => {
            show_models(&library_url, timeout_secs)?;
        }
        None => {
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn settings_with(data_dir: Option<PathBuf>) -> Settings {
    let mut settings = Settings::from_env();
    if let Some(dir) = data_dir {
        settings.data_dir = dir;
    }
    settings
}

fn process(file: &Path, settings: Settings) -> Result<()> {
    let orchestrator = TaskOrchestrator::with_ollama(settings)?;
    let id = orchestrator.start_task(file)?;
    println!("Task {} queued for {}", id, format_path_with_tilde(file));

    let mut last_progress = -1.0;
    let report = loop {
        let report = orchestrator
            .wait(id, PROGRESS_POLL)
            .ok_or_else(|| anyhow!("Task {} disappeared", id))?;
        if report.progress != last_progress {
            println!("Progress: {:.0}%", report.progress);
            last_progress = report.progress;
        }
        if report.status.is_terminal() {
            break report;
        }
    };

    match report.status {
        TaskStatus::Completed => {
            let task = orchestrator.task(id);
            let dataset = task.as_ref().and_then(|t| t.data_dir.as_deref());
            let format = task.as_ref().and_then(|t| t.chat_type);
            println!("Task completed");
            if let (Some(dataset), Some(format)) = (dataset, format) {
                println!("Dataset: {} ({})", format_path_with_tilde(dataset), format);
                let snapshots = orchestrator.list_snapshots(format)?;
                println!("Snapshots written: {}", snapshots.len());
            }
            Ok(())
        }
        _ => bail!(report.error.unwrap_or_else(|| "Task failed".to_string())),
    }
}

fn show_snapshots(data_dir: &Path, format: ExportFormat) -> Result<()> {
    let store = SnapshotStore::for_format(data_dir, format);
    let snapshots = store.list_snapshots()?;

    if snapshots.is_empty() {
        println!("No snapshots found in {}", format_path_with_tilde(store.root()));
        return Ok(());
    }

    println!("Snapshots ({})", format);
    println!("================");
    for summary in &snapshots {
        println!("{}  {} conversations", summary.month_year, summary.total_conversations);
    }
    Ok(())
}

fn show_snapshot(data_dir: &Path, format: ExportFormat, month: &str) -> Result<()> {
    let store = SnapshotStore::for_format(data_dir, format);
    let snapshot = store.load_snapshot(month).with_context(|| format!("No snapshot for {}", month))?;

    println!("Snapshot {} ({})", snapshot.month_year, format);
    println!("Total conversations: {}", snapshot.total_conversations);
    println!("Clusters: {}", snapshot.topics.len());

    for (cluster, meta) in &snapshot.topics {
        println!();
        println!(
            "[{}] {} (size {}, coherence {:.2})",
            cluster,
            display_line(&meta.topic, TEXT_WIDTH),
            meta.size,
            meta.coherence
        );
        if !meta.reflection.is_empty() {
            println!("    Reflection: {}", display_line(&meta.reflection, TEXT_WIDTH));
        }
        for (title, _) in snapshot.titles.iter().zip(&snapshot.clusters).filter(|(_, c)| *c == cluster) {
            println!("    - {}", display_line(title, TEXT_WIDTH));
        }
    }
    Ok(())
}

fn show_edits(file: &Path, json: bool) -> Result<()> {
    let export = load_export(file).with_context(|| format!("Failed to load {}", file.display()))?;
    let linearized = linearize(&export)?;
    let edits = detect_edit_branches(&linearized.messages);

    if json {
        println!("{}", serde_json::to_string_pretty(&edits)?);
        return Ok(());
    }

    println!("Edit branches: {}", edits.len());
    for edit in &edits {
        println!(
            "{}: {} -> {} after {:.0}s ({} messages)",
            display_line(&edit.chat_name, 60),
            edit.original_message_id,
            edit.edit_message_id,
            edit.time_gap_secs,
            edit.branch_message_ids.len()
        );
    }
    Ok(())
}

fn show_branches(file: &Path) -> Result<()> {
    let export = load_export(file).with_context(|| format!("Failed to load {}", file.display()))?;
    let linearized = linearize(&export)?;

    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for message in &linearized.messages {
        *counts.entry((message.chat_name.as_str(), message.branch_id.as_str())).or_default() += 1;
    }

    println!("Export: {} ({})", format_path_with_tilde(file), export.format());
    println!("Conversations: {}", linearized.conversations);
    if !linearized.skipped.is_empty() {
        println!("Skipped: {}", linearized.skipped.len());
    }
    println!("Branches: {}", counts.len());
    for ((chat, branch), count) in counts {
        println!("  {}: {} messages", display_line(&branch_title(chat, branch), TEXT_WIDTH), count);
    }
    Ok(())
}

fn show_models(library_url: &str, timeout_secs: u64) -> Result<()> {
    let fetcher = LibraryFetcher::new(library_url, timeout_secs)?;
    let catalog = ModelCatalog::new();
    let handle = catalog
        .spawn_refresh(move || fetcher.fetch_library())
        .context("Model catalog refresh could not start")?;
    handle.join().map_err(|_| anyhow!("Model catalog refresh panicked"))?;

    let models = catalog.snapshot();
    if models.is_empty() {
        bail!("No models could be fetched from {}", library_url);
    }

    for kind in [ModelKind::Text, ModelKind::Embedding, ModelKind::Vision] {
        let of_kind: Vec<_> = models.iter().filter(|m| m.kind == kind).collect();
        if of_kind.is_empty() {
            continue;
        }
        println!("{:?} models ({})", kind, of_kind.len());
        for model in of_kind {
            println!("  {} [{}]", model.name, model.tags.join(", "));
        }
    }
    Ok(())
}
