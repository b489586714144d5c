//! Snapshot Store: per-dataset JSON files on disk.
//!
//! Layout under a dataset directory:
//!
//! ```text
//! <dataset>/
//!   states/state_YYYY-MM.json      immutable per-month snapshot
//!   states/messages_YYYY-MM.json   cumulative messages seen at that month
//!   embeddings_2d.json             latest points
//!   clusters.json                  latest cluster ids
//!   topics.json                    latest cluster metadata
//!   chat_titles.json               latest titles
//! ```
//!
//! Every write goes to a temp file in the same directory and is renamed into
//! place, so readers never see a partial file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::PersistenceError;
use crate::models::{ExportFormat, FlatMessage, LatestState, Snapshot, SnapshotSummary};

const STATES_DIR: &str = "states";
const STATE_PREFIX: &str = "state_";
const MESSAGES_PREFIX: &str = "messages_";
const POINTS_FILE: &str = "embeddings_2d.json";
const CLUSTERS_FILE: &str = "clusters.json";
const TOPICS_FILE: &str = "topics.json";
const TITLES_FILE: &str = "chat_titles.json";
const LATEST_FILES: [&str; 4] = [POINTS_FILE, CLUSTERS_FILE, TOPICS_FILE, TITLES_FILE];

/// Check that `month` is a real `YYYY-MM` key
pub fn is_month_key(month: &str) -> bool {
    month.len() == 7 && NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d").is_ok()
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store for the dataset directory of `format` under `base`
    pub fn for_format(base: &Path, format: ExportFormat) -> Self {
        Self::new(format.dataset_dir(base))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn states_dir(&self) -> PathBuf {
        self.root.join(STATES_DIR)
    }

    fn month_file(&self, prefix: &str, month: &str) -> Result<PathBuf, PersistenceError> {
        if !is_month_key(month) {
            return Err(PersistenceError::InvalidMonth(month.to_string()));
        }
        Ok(self.states_dir().join(format!("{}{}.json", prefix, month)))
    }

    pub fn snapshot_path(&self, month: &str) -> Result<PathBuf, PersistenceError> {
        self.month_file(STATE_PREFIX, month)
    }

    pub fn messages_path(&self, month: &str) -> Result<PathBuf, PersistenceError> {
        self.month_file(MESSAGES_PREFIX, month)
    }

    /// Write the snapshot for its month. Snapshots are append-only: an existing
    /// file for the month is never overwritten.
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<PathBuf, PersistenceError> {
        let path = self.snapshot_path(&snapshot.month_year)?;
        if path.exists() {
            return Err(PersistenceError::AlreadyExists(snapshot.month_year.clone()));
        }
        write_json_atomic(&path, snapshot)?;
        debug!("Saved snapshot {}", path.display());
        Ok(path)
    }

    /// Write the cumulative message dump for a month
    pub fn save_messages(&self, month: &str, messages: &[FlatMessage]) -> Result<PathBuf, PersistenceError> {
        let path = self.messages_path(month)?;
        write_json_atomic(&path, messages)?;
        Ok(path)
    }

    /// Overwrite the latest mirror files with the contents of `snapshot`
    pub fn save_latest(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        write_json_atomic(&self.root.join(POINTS_FILE), &snapshot.points)?;
        write_json_atomic(&self.root.join(CLUSTERS_FILE), &snapshot.clusters)?;
        write_json_atomic(&self.root.join(TOPICS_FILE), &snapshot.topics)?;
        write_json_atomic(&self.root.join(TITLES_FILE), &snapshot.titles)?;
        Ok(())
    }

    pub fn load_snapshot(&self, month: &str) -> Result<Snapshot, PersistenceError> {
        let path = self.snapshot_path(month)?;
        read_json(&path)?.ok_or_else(|| PersistenceError::NotFound(month.to_string()))
    }

    pub fn load_messages(&self, month: &str) -> Result<Vec<FlatMessage>, PersistenceError> {
        let path = self.messages_path(month)?;
        read_json(&path)?.ok_or_else(|| PersistenceError::NotFound(month.to_string()))
    }

    /// Stored snapshots sorted by month. A missing states directory is an empty
    /// timeline; unreadable snapshot files are skipped with a warning.
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotSummary>, PersistenceError> {
        let mut summaries = Vec::new();
        for month in self.stored_months(STATE_PREFIX)? {
            let Ok(path) = self.snapshot_path(&month) else { continue };
            match read_json::<SnapshotSummary>(&path) {
                Ok(Some(summary)) => summaries.push(summary),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable snapshot {}: {}", path.display(), e),
            }
        }
        summaries.sort_by(|a, b| a.month_year.cmp(&b.month_year));
        Ok(summaries)
    }

    /// Current latest mirror. Missing files read as empty.
    pub fn load_latest(&self) -> Result<LatestState, PersistenceError> {
        Ok(LatestState {
            points: read_json(&self.root.join(POINTS_FILE))?.unwrap_or_default(),
            clusters: read_json(&self.root.join(CLUSTERS_FILE))?.unwrap_or_default(),
            topics: read_json(&self.root.join(TOPICS_FILE))?.unwrap_or_default(),
            titles: read_json(&self.root.join(TITLES_FILE))?.unwrap_or_default(),
        })
    }

    /// Remove every per-month snapshot, message dump and latest mirror file, so
    /// a new upload starts a fresh timeline. Returns the number of files removed.
    pub fn reset_timeline(&self) -> Result<usize, PersistenceError> {
        let mut paths = Vec::new();
        for prefix in [STATE_PREFIX, MESSAGES_PREFIX] {
            for month in self.stored_months(prefix)? {
                paths.push(self.month_file(prefix, &month)?);
            }
        }
        paths.extend(LATEST_FILES.iter().map(|name| self.root.join(name)));

        let mut removed = 0;
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(PersistenceError::Write { path, source }),
            }
        }
        if removed > 0 {
            debug!("Removed {} timeline files from {}", removed, self.root.display());
        }
        Ok(removed)
    }

    /// Month keys of files named `{prefix}YYYY-MM.json` in the states directory
    fn stored_months(&self, prefix: &str) -> Result<Vec<String>, PersistenceError> {
        let dir = self.states_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(PersistenceError::Read { path: dir, source }),
        };

        let mut months: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let month = name.strip_prefix(prefix)?.strip_suffix(".json")?;
                is_month_key(month).then(|| month.to_string())
            })
            .collect();
        months.sort();
        Ok(months)
    }
}

/// Serialize to `<path>.tmp` in the same directory, then rename over `path`
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let write_err = |source: std::io::Error| PersistenceError::Write { path: path.to_path_buf(), source };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let json = serde_json::to_vec(value)
        .map_err(|source| PersistenceError::Serde { path: path.to_path_buf(), source })?;

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    fs::write(&temp, json).map_err(write_err)?;
    fs::rename(&temp, path).map_err(|source| {
        let _ = fs::remove_file(&temp);
        write_err(source)
    })
}

/// Read and decode `path`; `Ok(None)` if the file does not exist
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(PersistenceError::Read { path: path.to_path_buf(), source }),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| PersistenceError::Serde { path: path.to_path_buf(), source })
}
