//! Task Orchestrator: one background worker processing uploads in FIFO order.
//!
//! Producers call [`TaskOrchestrator::start_task`], which records a queued task
//! and returns immediately. A single worker thread drains the queue and runs
//! each task to completion before taking the next, so tasks never overlap.
//!
//! The task table is shared behind an `RwLock`; only the worker mutates a task
//! after it has been queued. Pollers read snapshots of it through
//! [`TaskOrchestrator::task_status`].

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::branches::linearize;
use crate::config::Settings;
use crate::error::PersistenceError;
use crate::models::{
    ExportFormat, ProcessingTask, Snapshot, SnapshotSummary, TaskId, TaskStatus, TaskStatusReport,
};
use crate::parsers::{detect, parse_export, read_payload};
use crate::pipeline::{MonthBuckets, MonthOutcome, MonthlyPipeline};
use crate::providers::{Embedder, OllamaClient, TopicGenerator};
use crate::storage::SnapshotStore;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

type TaskTable = Arc<RwLock<HashMap<TaskId, ProcessingTask>>>;

struct Job {
    id: TaskId,
    path: PathBuf,
}

fn read_table(tasks: &TaskTable) -> RwLockReadGuard<'_, HashMap<TaskId, ProcessingTask>> {
    tasks.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_table(tasks: &TaskTable) -> RwLockWriteGuard<'_, HashMap<TaskId, ProcessingTask>> {
    tasks.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct TaskOrchestrator {
    tasks: TaskTable,
    queue: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    data_dir: PathBuf,
}

impl TaskOrchestrator {
    /// Start the worker thread with the given capabilities
    pub fn new(
        settings: Settings,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn TopicGenerator>,
    ) -> Result<Self> {
        let tasks: TaskTable = Arc::new(RwLock::new(HashMap::new()));
        let (queue, jobs) = mpsc::channel();
        let data_dir = settings.data_dir.clone();

        let worker = Worker { tasks: Arc::clone(&tasks), embedder, generator, settings };
        let handle = thread::Builder::new()
            .name("chat-atlas-worker".to_string())
            .spawn(move || worker.run(jobs))
            .context("Failed to spawn task worker")?;

        Ok(Self { tasks, queue: Some(queue), worker: Some(handle), data_dir })
    }

    /// Start the worker backed by the Ollama HTTP client from `settings.provider`
    pub fn with_ollama(settings: Settings) -> Result<Self> {
        let client =
            Arc::new(OllamaClient::new(&settings.provider).context("Failed to create Ollama client")?);
        let embedder: Arc<dyn Embedder> = client.clone();
        let generator: Arc<dyn TopicGenerator> = client;
        Self::new(settings, embedder, generator)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Queue an export file for processing and return its id immediately
    pub fn start_task(&self, path: impl Into<PathBuf>) -> Result<TaskId> {
        let id = Uuid::new_v4();
        let path = path.into();
        write_table(&self.tasks).insert(id, ProcessingTask::queued(id, path.clone()));

        let sent = self.queue.as_ref().map(|queue| queue.send(Job { id, path: path.clone() }));
        if !matches!(sent, Some(Ok(()))) {
            let message = "Task worker is not running".to_string();
            if let Some(task) = write_table(&self.tasks).get_mut(&id) {
                task.status = TaskStatus::Failed;
                task.error = Some(message.clone());
            }
            return Err(anyhow!(message));
        }

        info!("Queued task {} for {}", id, path.display());
        Ok(id)
    }

    pub fn task_status(&self, id: TaskId) -> Option<TaskStatusReport> {
        read_table(&self.tasks).get(&id).map(ProcessingTask::report)
    }

    /// Full task record, including detected format and dataset directory
    pub fn task(&self, id: TaskId) -> Option<ProcessingTask> {
        read_table(&self.tasks).get(&id).cloned()
    }

    /// Block until the task reaches a terminal state or `timeout` elapses.
    /// Returns the last observed status; `None` for unknown ids.
    pub fn wait(&self, id: TaskId, timeout: Duration) -> Option<TaskStatusReport> {
        let deadline = Instant::now() + timeout;
        loop {
            let report = self.task_status(id)?;
            if report.status.is_terminal() || Instant::now() >= deadline {
                return Some(report);
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    pub fn get_snapshot(&self, format: ExportFormat, month: &str) -> Result<Snapshot, PersistenceError> {
        SnapshotStore::for_format(&self.data_dir, format).load_snapshot(month)
    }

    pub fn list_snapshots(&self, format: ExportFormat) -> Result<Vec<SnapshotSummary>, PersistenceError> {
        SnapshotStore::for_format(&self.data_dir, format).list_snapshots()
    }
}

impl Drop for TaskOrchestrator {
    /// Close the queue and wait for the worker to finish queued work
    fn drop(&mut self) {
        drop(self.queue.take());
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            warn!("Task worker exited with a panic");
        }
    }
}

struct Worker {
    tasks: TaskTable,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn TopicGenerator>,
    settings: Settings,
}

impl Worker {
    fn run(self, jobs: Receiver<Job>) {
        for job in jobs {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(&job)))
                .unwrap_or_else(|_| Err(anyhow!("task processing panicked")));

            match outcome {
                Ok(()) => {
                    self.update(job.id, |task| {
                        task.status = TaskStatus::Completed;
                        task.progress = 100.0;
                        task.completed = true;
                    });
                    info!("Task {} completed", job.id);
                }
                Err(e) => {
                    error!("Task {} failed: {:#}", job.id, e);
                    self.update(job.id, |task| {
                        task.status = TaskStatus::Failed;
                        task.error = Some(format!("{:#}", e));
                    });
                }
            }
        }
    }

    fn update(&self, id: TaskId, f: impl FnOnce(&mut ProcessingTask)) {
        if let Some(task) = write_table(&self.tasks).get_mut(&id) {
            f(task);
        }
    }

    fn process(&self, job: &Job) -> Result<()> {
        self.update(job.id, |task| task.status = TaskStatus::Processing);
        info!("Processing task {} ({})", job.id, job.path.display());

        let payload = read_payload(&job.path)
            .with_context(|| format!("Failed to read export {}", job.path.display()))?;
        let (format, dataset_dir) = detect(&payload, &self.settings.data_dir)?;
        self.update(job.id, |task| {
            task.chat_type = Some(format);
            task.data_dir = Some(dataset_dir.clone());
        });
        info!("Task {}: detected {} export", job.id, format);

        let export = parse_export(payload).context("Failed to parse export")?;
        let linearized = linearize(&export)?;
        info!(
            "Task {}: {} messages from {} conversations ({} skipped)",
            job.id,
            linearized.messages.len(),
            linearized.conversations,
            linearized.skipped.len()
        );

        let buckets = MonthBuckets::new(linearized.messages);
        let store = SnapshotStore::new(dataset_dir);

        let total = buckets.len();
        if total == 0 {
            warn!("Task {}: export contains no timestamped messages", job.id);
            return Ok(());
        }

        let pipeline = MonthlyPipeline::new(
            self.embedder.as_ref(),
            self.generator.as_ref(),
            &self.settings.pipeline,
        );
        // The previous timeline survives until this run has something to replace it with
        let mut timeline_reset = false;
        for (done, window) in buckets.windows().enumerate() {
            match pipeline.process_month(&window) {
                MonthOutcome::Snapshot(snapshot) => {
                    if !timeline_reset {
                        let removed =
                            store.reset_timeline().context("Failed to reset snapshot timeline")?;
                        debug!("Task {}: replaced previous timeline ({} files)", job.id, removed);
                        timeline_reset = true;
                    }
                    store.save_snapshot(&snapshot)?;
                    store.save_messages(window.month, window.messages)?;
                    store.save_latest(&snapshot)?;
                }
                MonthOutcome::Skipped { .. } | MonthOutcome::Failed { .. } => {}
            }

            let progress = (done + 1) as f64 / total as f64 * 100.0;
            self.update(job.id, |task| task.progress = progress);
        }

        if !timeline_reset {
            warn!("Task {}: no month produced a snapshot, previous timeline kept", job.id);
        }
        Ok(())
    }
}
