use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::export::ExportFormat;

pub type TaskId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingTask {
    pub id: TaskId,
    pub file_path: PathBuf,
    pub status: TaskStatus,
    pub progress: f64,
    pub chat_type: Option<ExportFormat>,
    pub data_dir: Option<PathBuf>,
    pub error: Option<String>,
    pub completed: bool,
}

impl ProcessingTask {
    pub fn queued(id: TaskId, file_path: PathBuf) -> Self {
        Self {
            id,
            file_path,
            status: TaskStatus::Queued,
            progress: 0.0,
            chat_type: None,
            data_dir: None,
            error: None,
            completed: false,
        }
    }

    pub fn report(&self) -> TaskStatusReport {
        TaskStatusReport {
            status: self.status,
            progress: self.progress,
            error: self.error.clone(),
            completed: self.completed,
        }
    }
}

/// Status view handed to pollers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusReport {
    pub status: TaskStatus,
    pub progress: f64,
    pub error: Option<String>,
    pub completed: bool,
}
