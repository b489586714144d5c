//! Model catalog: the list of models offered by the model library, cached as an
//! immutable snapshot.
//!
//! Readers call [`ModelCatalog::snapshot`] and get an `Arc` to the current list
//! without locking. A refresh builds a complete new list on a background thread
//! and publishes it with a single atomic swap; at most one refresh runs at a time.

use std::sync::{Arc, LazyLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arc_swap::ArcSwap;
use regex::Regex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ProviderError;

pub const DEFAULT_LIBRARY_URL: &str = "https://ollama.com/library";

/// Tag fragments that mark variants not worth listing
const EXCLUDED_TAG_FRAGMENTS: &[&str] = &["text", "base", "fp"];

static LIBRARY_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="/library/([^"/]+)""#).expect("valid library link pattern"));

/// `model:tag` tokens; group 1 is the model name
static MODEL_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([^"\s<>/=:]+):[^"\s<>/]*"#).expect("valid model tag pattern"));

static LEGACY_QUANT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"q[45]_[01]").expect("valid quantization pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Text,
    Embedding,
    Vision,
}

impl ModelKind {
    pub fn classify(name: &str) -> Self {
        if name.contains("vision") {
            ModelKind::Vision
        } else if name.contains("minilm") {
            ModelKind::Embedding
        } else {
            ModelKind::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub tags: Vec<String>,
    pub kind: ModelKind,
}

#[derive(Default)]
pub struct ModelCatalog {
    models: ArcSwap<Vec<ModelInfo>>,
    refreshing: AtomicBool,
}

impl ModelCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Current immutable list of models
    pub fn snapshot(&self) -> Arc<Vec<ModelInfo>> {
        self.models.load_full()
    }

    /// Publish a new list atomically
    pub fn publish(&self, models: Vec<ModelInfo>) {
        self.models.store(Arc::new(models));
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Run `fetch` on a background thread and publish its result.
    ///
    /// Returns `None` without spawning if a refresh is already in flight. A
    /// failed fetch leaves the previous snapshot in place.
    pub fn spawn_refresh<F>(self: &Arc<Self>, fetch: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce() -> Result<Vec<ModelInfo>, ProviderError> + Send + 'static,
    {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let catalog = Arc::clone(self);
        let spawned = thread::Builder::new().name("model-catalog-refresh".to_string()).spawn(
            move || {
                match fetch() {
                    Ok(models) => {
                        info!("Model catalog refreshed with {} models", models.len());
                        catalog.publish(models);
                    }
                    Err(e) => warn!("Model catalog refresh failed: {}", e),
                }
                catalog.refreshing.store(false, Ordering::Release);
            },
        );

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to spawn model catalog refresh: {}", e);
                self.refreshing.store(false, Ordering::Release);
                None
            }
        }
    }
}

/// Scrapes the public model library pages
pub struct LibraryFetcher {
    http: Client,
    library_url: String,
}

impl LibraryFetcher {
    pub fn new(library_url: &str, timeout_secs: u64) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("chat-atlas/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, library_url: library_url.trim_end_matches('/').to_string() })
    }

    fn get(&self, url: &str) -> Result<String, ProviderError> {
        let response = self.http.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { status: status.as_u16(), body: String::new() });
        }
        Ok(response.text()?)
    }

    /// Fetch the library index, then each model's tag page. Models whose tag
    /// page fails are skipped.
    pub fn fetch_library(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let index = self.get(&self.library_url)?;
        let names = parse_model_names(&index);
        if names.is_empty() {
            return Err(ProviderError::InvalidResponse("no models found in library".to_string()));
        }

        let mut models = Vec::with_capacity(names.len());
        for name in names {
            match self.get(&format!("{}/{}/tags", self.library_url, name)) {
                Ok(page) => {
                    let tags = parse_tags(&name, &page);
                    let kind = ModelKind::classify(&name);
                    models.push(ModelInfo { name, tags, kind });
                }
                Err(e) => warn!("Failed to fetch tags for {}: {}", name, e),
            }
        }
        Ok(models)
    }
}

/// Model names linked from the library index, deduplicated in page order
pub fn parse_model_names(html: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for captures in LIBRARY_LINK.captures_iter(html) {
        let name = &captures[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Tags for `name` on its tag page, without text/base/fp variants and
/// q4_0/q4_1/q5_0/q5_1 quantizations
pub fn parse_tags(name: &str, html: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for captures in MODEL_TAG.captures_iter(html) {
        if &captures[1] != name {
            continue;
        }
        let tag = &captures[0];
        if EXCLUDED_TAG_FRAGMENTS.iter().any(|frag| tag.contains(frag)) {
            continue;
        }
        if LEGACY_QUANT.is_match(tag) {
            continue;
        }
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_names_dedups_and_skips_subpaths() {
        let html = r#"<a href="/library/llama3">llama3</a>
            <a href="/library/all-minilm">minilm</a>
            <a href="/library/llama3">again</a>
            <a href="/library/llama3/tags">tags</a>"#;
        assert_eq!(parse_model_names(html), vec!["llama3", "all-minilm"]);
    }

    #[test]
    fn test_parse_tags_filters_variants() {
        let html = r#"<span>llama3:latest</span> <span>llama3:8b</span>
            <span>llama3:8b-text</span> <span>llama3:8b-instruct-fp16</span>
            <span>llama3:8b-instruct-q4_0</span> <span>llama3:8b-instruct-q4_K_M</span>
            <span>llama3:latest</span> <span>other:1b</span>"#;
        assert_eq!(
            parse_tags("llama3", html),
            vec!["llama3:latest", "llama3:8b", "llama3:8b-instruct-q4_K_M"]
        );
    }

    #[test]
    fn test_parse_tags_ignores_prefixed_names_and_urls() {
        let html = r#"<a href="https://ollama.com/library/llama3:70b">big</a>
            <span>codellama3:7b</span> <span>llama3:70b</span> <span>llama3:8b</span>"#;
        assert_eq!(parse_tags("llama3", html), vec!["llama3:70b", "llama3:8b"]);
    }

    #[test]
    fn test_parsers_are_reusable_across_calls() {
        let html = r#"<a href="/library/qwen2">q</a>"#;
        for _ in 0..3 {
            assert_eq!(parse_model_names(html), vec!["qwen2"]);
            assert_eq!(parse_tags("qwen2", "<b>qwen2:0.5b</b>"), vec!["qwen2:0.5b"]);
        }
    }

    #[test]
    fn test_classify_kinds() {
        assert_eq!(ModelKind::classify("llama3.2-vision"), ModelKind::Vision);
        assert_eq!(ModelKind::classify("all-minilm"), ModelKind::Embedding);
        assert_eq!(ModelKind::classify("qwen2.5-coder"), ModelKind::Text);
    }

    #[test]
    fn test_refresh_publishes_snapshot() {
        let catalog = ModelCatalog::new();
        assert!(catalog.snapshot().is_empty());

        let before = catalog.snapshot();
        let handle = catalog
            .spawn_refresh(|| {
                Ok(vec![ModelInfo {
                    name: "all-minilm".to_string(),
                    tags: vec!["all-minilm:latest".to_string()],
                    kind: ModelKind::Embedding,
                }])
            })
            .expect("refresh should spawn");
        handle.join().unwrap();

        assert_eq!(catalog.snapshot().len(), 1);
        assert!(!catalog.is_refreshing());
        // Earlier readers keep their own immutable view
        assert!(before.is_empty());
    }

    #[test]
    fn test_failed_refresh_keeps_previous_snapshot() {
        let catalog = ModelCatalog::new();
        catalog.publish(vec![ModelInfo {
            name: "llama3".to_string(),
            tags: Vec::new(),
            kind: ModelKind::Text,
        }]);

        let handle = catalog
            .spawn_refresh(|| Err(ProviderError::Unavailable("offline".to_string())))
            .unwrap();
        handle.join().unwrap();

        assert_eq!(catalog.snapshot()[0].name, "llama3");
    }

    #[test]
    fn test_only_one_refresh_in_flight() {
        let catalog = ModelCatalog::new();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let first = catalog
            .spawn_refresh(move || {
                release_rx.recv().ok();
                Ok(Vec::new())
            })
            .unwrap();
        assert!(catalog.is_refreshing());
        assert!(catalog.spawn_refresh(|| Ok(Vec::new())).is_none());

        release_tx.send(()).unwrap();
        first.join().unwrap();
        assert!(catalog.spawn_refresh(|| Ok(Vec::new())).is_some());
    }
}
