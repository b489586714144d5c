//! Embedding and label-generation capabilities.
//!
//! The pipeline only sees the [`Embedder`] and [`TopicGenerator`] traits. The
//! shipped [`OllamaClient`] talks to an Ollama-compatible HTTP endpoint; tests
//! substitute deterministic in-process implementations.
//!
//! Degradation policy lives with the callers: an embedding failure skips the
//! month, a topic failure becomes the "Error" label, a reflection failure
//! becomes an empty string.

pub mod catalog;
pub mod ollama;

use crate::error::ProviderError;

pub use catalog::{ModelCatalog, ModelInfo, ModelKind};
pub use ollama::OllamaClient;

/// Produces one embedding vector per input text, in input order
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

/// Produces short natural-language labels for groups of texts
pub trait TopicGenerator: Send + Sync {
    /// A 2-4 word topic label for a cluster of branch titles.
    /// An empty string means the backend had nothing to say.
    fn generate_topic(&self, titles: &[String]) -> Result<String, ProviderError>;

    /// A short reflection on messages where the user described difficulties
    fn generate_reflection(&self, texts: &[String]) -> Result<String, ProviderError>;
}

/// Prompt asking for a concise topic label for `titles`
pub fn topic_prompt(titles: &[String]) -> String {
    let titles_text = titles.iter().map(|t| format!("- {}", t)).collect::<Vec<_>>().join("\n");
    format!(
        "You are a technical topic analyzer. Review these related titles and provide a single \
         concise topic label (2-4 words) that best describes their common theme.\n\n\
         Titles:\n{}\n\n\
         Provide ONLY the topic label, nothing else. Examples:\n\
         \"Network Security Tools\"\n\"UI Animation Design\"\n\"Data Visualization\"\n\"API Integration\"\n",
        titles_text
    )
}

/// Prompt asking for a reflection over messages describing difficulties
pub fn reflection_prompt(texts: &[String]) -> String {
    let body = texts.iter().map(|t| format!("- {}", t)).collect::<Vec<_>>().join("\n");
    format!(
        "You are a helpful assistant. Review the following user messages where they express \
         difficulties:\n\n{}\n\n\
         Summarize the key challenges they faced and provide a reflection or guidance that \
         addresses these challenges.\n\nProvide ONLY the reflection.",
        body
    )
}

/// Normalize a generated label: trim whitespace and surrounding quotes
pub fn clean_label(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().to_string()
}
