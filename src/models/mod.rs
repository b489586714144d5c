//! Data models for conversation exports and visualization snapshots.
//!
//! - [`ChatGptConversation`] / [`ClaudeConversation`] - raw export units, one per schema
//! - [`MessageNode`] - normalized tree node produced by the tree builder
//! - [`FlatMessage`] - a message placed on its branch, persisted downstream
//! - [`Snapshot`] - immutable per-month visualization state
//! - [`ProcessingTask`] - background task bookkeeping
//!
//! Export models are deliberately lenient (every field defaults) so a single odd
//! message never rejects a whole export; timestamps go through the lenient
//! deserializer in `parsers::deserializers`.

pub mod export;
pub mod message;
pub mod snapshot;
pub mod task;

pub use export::{
    ChatGptAuthor, ChatGptConversation, ChatGptMessage, ChatGptNode, ClaudeContent,
    ClaudeConversation, ClaudeMessage, ExportFormat, ParsedExport,
};
pub use message::{FlatMessage, MessageNode, Sender, branch_title};
pub use snapshot::{ClusterMetadata, LatestState, Snapshot, SnapshotSummary};
pub use task::{ProcessingTask, TaskId, TaskStatus, TaskStatusReport};
