use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Human,
    Assistant,
}

/// Normalized message in a conversation tree. Children are derived from
/// parent pointers by the tree builder, never stored on the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// One message placed on its branch, the unit persisted downstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatMessage {
    pub chat_name: String,
    pub chat_id: String,
    pub message_id: String,
    pub parent_message_id: Option<String>,
    pub branch_id: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl FlatMessage {
    /// Calendar month key (`YYYY-MM`, UTC) used for bucketing
    pub fn month_key(&self) -> String {
        self.timestamp.format("%Y-%m").to_string()
    }

    /// `(year, month)` in UTC; orders months chronologically for any year
    pub fn year_month(&self) -> (i32, u32) {
        (self.timestamp.year(), self.timestamp.month())
    }

    /// Title of the branch this message belongs to
    pub fn branch_title(&self) -> String {
        branch_title(&self.chat_name, &self.branch_id)
    }
}

pub fn branch_title(chat_name: &str, branch_id: &str) -> String {
    format!("{} (Branch {})", chat_name, branch_id)
}
