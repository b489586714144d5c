use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parsers::deserializers::{
    deserialize_lenient_string, deserialize_lenient_timestamp, deserialize_null_default,
    deserialize_ordered_map,
};

/// The two export schemas the ingester understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Conversations carrying an id-keyed `mapping` of message nodes
    ChatGpt,
    /// Conversations carrying a `chat_messages` list with parent pointers
    Claude,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::ChatGpt => "chatgpt",
            ExportFormat::Claude => "claude",
        }
    }

    /// Dataset directory for this format under the base data directory
    pub fn dataset_dir(&self, base: &Path) -> PathBuf {
        base.join(self.as_str())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chatgpt" => Ok(ExportFormat::ChatGpt),
            "claude" => Ok(ExportFormat::Claude),
            other => Err(format!("unknown format '{}' (expected chatgpt or claude)", other)),
        }
    }
}

/// A fully parsed export payload, one variant per schema
#[derive(Debug, Clone)]
pub enum ParsedExport {
    ChatGpt(Vec<ChatGptConversation>),
    Claude(Vec<ClaudeConversation>),
}

impl ParsedExport {
    pub fn format(&self) -> ExportFormat {
        match self {
            ParsedExport::ChatGpt(_) => ExportFormat::ChatGpt,
            ParsedExport::Claude(_) => ExportFormat::Claude,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ParsedExport::ChatGpt(conversations) => conversations.len(),
            ParsedExport::Claude(conversations) => conversations.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatGptConversation {
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub title: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_ordered_map")]
    pub mapping: Vec<(String, ChatGptNode)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatGptNode {
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub message: Option<ChatGptMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatGptMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author: Option<ChatGptAuthor>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_lenient_timestamp")]
    pub create_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatGptAuthor {
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeConversation {
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub name: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub chat_messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeMessage {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub content: Vec<ClaudeContent>,
    #[serde(default, deserialize_with = "deserialize_lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeContent {
    #[serde(rename = "type", default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}
