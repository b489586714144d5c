//! Shared test utilities for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chat_atlas::error::ProviderError;
use chat_atlas::providers::{Embedder, TopicGenerator};
use serde_json::{Value, json};
use tempfile::TempDir;

/// Builder for one Claude-style conversation (`chat_messages` with parent pointers)
pub struct ClaudeConversationBuilder {
    name: String,
    uuid: String,
    messages: Vec<Value>,
}

impl ClaudeConversationBuilder {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), uuid: format!("{}-uuid", name), messages: Vec::new() }
    }

    /// Add a message; `created_at` is an RFC 3339 timestamp
    pub fn message(
        mut self,
        uuid: &str,
        parent: Option<&str>,
        sender: &str,
        text: &str,
        created_at: &str,
    ) -> Self {
        self.messages.push(json!({
            "uuid": uuid,
            "parent": parent,
            "sender": sender,
            "text": text,
            "content": [],
            "created_at": created_at,
        }));
        self
    }

    /// Add a linear human/assistant exchange rooted at `prefix-0`
    pub fn exchange(mut self, prefix: &str, created_at: &str, turns: usize) -> Self {
        let mut parent: Option<String> = None;
        for i in 0..turns {
            let id = format!("{}-{}", prefix, i);
            let sender = if i % 2 == 0 { "human" } else { "assistant" };
            self = self.message(&id, parent.as_deref(), sender, &format!("turn {} of {}", i, prefix), created_at);
            parent = Some(id);
        }
        self
    }

    pub fn to_json(&self) -> Value {
        json!({ "name": self.name, "uuid": self.uuid, "chat_messages": self.messages })
    }
}

/// Builder for one ChatGPT-style conversation (`mapping` of nodes)
pub struct ChatGptConversationBuilder {
    title: String,
    mapping: serde_json::Map<String, Value>,
}

impl ChatGptConversationBuilder {
    pub fn new(title: &str) -> Self {
        Self { title: title.to_string(), mapping: serde_json::Map::new() }
    }

    /// Add a node; `create_time` is epoch seconds
    pub fn node(mut self, id: &str, parent: Option<&str>, role: &str, text: &str, create_time: f64) -> Self {
        self.mapping.insert(
            id.to_string(),
            json!({
                "id": id,
                "parent": parent,
                "children": [],
                "message": {
                    "id": id,
                    "author": { "role": role },
                    "content": { "content_type": "text", "parts": [text] },
                    "create_time": create_time,
                },
            }),
        );
        self
    }

    pub fn to_json(&self) -> Value {
        json!({ "title": self.title, "id": format!("{}-id", self.title), "mapping": self.mapping })
    }
}

/// Write a JSON array of conversations into `dir/name`
pub fn write_export(dir: &Path, name: &str, conversations: &[Value]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_vec(&Value::Array(conversations.to_vec())).unwrap())
        .expect("Failed to write export");
    path
}

/// Temp workspace holding uploaded exports and the processed data directory
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self { temp_dir: TempDir::new().expect("Failed to create temp dir") }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.temp_dir.path().join("processed_data")
    }

    pub fn export(&self, name: &str, conversations: &[Value]) -> PathBuf {
        write_export(self.temp_dir.path(), name, conversations)
    }
}

/// Keywords that map titles onto fixed embedding axes
const TOPIC_AXES: &[&str] = &["rust", "python", "cooking", "travel"];

/// Deterministic embedder: each title becomes a one-hot vector over the topic
/// keyword it contains (lowercased), plus a final axis for titles matching none.
/// Titles sharing a keyword therefore have identical embeddings.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| {
                let lowered = text.to_lowercase();
                let mut vector = vec![0.0; TOPIC_AXES.len() + 1];
                match TOPIC_AXES.iter().position(|k| lowered.contains(k)) {
                    Some(axis) => vector[axis] = 1.0,
                    None => vector[TOPIC_AXES.len()] = 1.0,
                }
                vector
            })
            .collect())
    }
}

/// Embedder that always fails, as if the backend were down
pub struct UnavailableEmbedder;

impl Embedder for UnavailableEmbedder {
    fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Err(ProviderError::Unavailable("connection refused".to_string()))
    }
}

/// Topic generator naming each cluster after the first keyword found in its titles
#[derive(Default)]
pub struct KeywordTopics {
    pub reflections: Mutex<Vec<Vec<String>>>,
}

impl TopicGenerator for KeywordTopics {
    fn generate_topic(&self, titles: &[String]) -> Result<String, ProviderError> {
        let joined = titles.join(" ").to_lowercase();
        Ok(TOPIC_AXES.iter().find(|k| joined.contains(*k)).map(|k| format!("{} topics", k)).unwrap_or_default())
    }

    fn generate_reflection(&self, texts: &[String]) -> Result<String, ProviderError> {
        self.reflections.lock().unwrap().push(texts.to_vec());
        Ok(format!("{} struggle(s) noted", texts.len()))
    }
}

/// A three-month Claude export: two chats in January, a third in February
/// (with an edit fork in the Rust chat), a fourth in April.
pub fn timeline_export() -> Vec<Value> {
    vec![
        ClaudeConversationBuilder::new("Rust lifetimes")
            .message("r0", None, "human", "I'm stuck on lifetimes", "2024-01-05T10:00:00Z")
            .message("r1", Some("r0"), "assistant", "Let's look at it", "2024-01-05T10:00:30Z")
            .message("r2", Some("r1"), "human", "first attempt", "2024-01-05T10:01:00Z")
            .message("r3", Some("r1"), "human", "edited attempt", "2024-02-01T09:00:00Z")
            .to_json(),
        ClaudeConversationBuilder::new("Python packaging")
            .exchange("p", "2024-01-10T08:00:00Z", 2)
            .to_json(),
        ClaudeConversationBuilder::new("Cooking pasta").exchange("c", "2024-02-14T19:00:00Z", 2).to_json(),
        ClaudeConversationBuilder::new("Rust traits").exchange("t", "2024-04-02T12:00:00Z", 2).to_json(),
    ]
}
