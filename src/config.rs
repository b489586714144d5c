//! Runtime settings.
//!
//! Defaults come from environment variables; the CLI overrides individual
//! fields from its flags after calling [`Settings::from_env`].

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::pipeline::{ClusteringParams, ProjectionParams};
use crate::utils::{default_data_dir, env_non_empty, env_parse};

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
pub const DEFAULT_GENERATION_MODEL: &str = "qwen2.5-coder:7b";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Projection seed as given by `--seed` or `CHAT_ATLAS_SEED`: a number, or
/// `random`/`none` for an entropy-seeded layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedChoice {
    Fixed(u64),
    Random,
}

impl SeedChoice {
    pub fn as_seed(self) -> Option<u64> {
        match self {
            SeedChoice::Fixed(seed) => Some(seed),
            SeedChoice::Random => None,
        }
    }
}

impl FromStr for SeedChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("random") || trimmed.eq_ignore_ascii_case("none") {
            return Ok(SeedChoice::Random);
        }
        trimmed
            .parse::<u64>()
            .map(SeedChoice::Fixed)
            .map_err(|_| format!("invalid seed '{}' (expected a number, random or none)", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub host: String,
    pub embedding_model: String,
    pub generation_model: String,
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_OLLAMA_HOST.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ProviderSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_non_empty("OLLAMA_HOST").unwrap_or(defaults.host),
            embedding_model: env_non_empty("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            generation_model: env_non_empty("GENERATION_MODEL").unwrap_or(defaults.generation_model),
            timeout_secs: env_parse("PROVIDER_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub projection: ProjectionParams,
    pub clustering: ClusteringParams,
    /// Generate per-cluster reflections from struggle messages
    pub reflections: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            projection: ProjectionParams::default(),
            clustering: ClusteringParams::default(),
            reflections: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Base directory; each export format gets its own dataset directory below it
    pub data_dir: PathBuf,
    pub provider: ProviderSettings,
    pub pipeline: PipelineSettings,
}

impl Settings {
    pub fn from_env() -> Self {
        let mut pipeline = PipelineSettings::default();
        if let Some(choice) = env_parse::<SeedChoice>("CHAT_ATLAS_SEED") {
            pipeline.projection.seed = choice.as_seed();
        }

        Self {
            data_dir: env_non_empty("CHAT_ATLAS_DATA_DIR").map(PathBuf::from).unwrap_or_else(default_data_dir),
            provider: ProviderSettings::from_env(),
            pipeline,
        }
    }

    /// Settings rooted at `data_dir` with every other value at its default
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            provider: ProviderSettings::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}
