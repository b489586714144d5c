use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Embedder, TopicGenerator, clean_label, reflection_prompt, topic_prompt};
use crate::config::ProviderSettings;
use crate::error::ProviderError;

const EMBED_PATH: &str = "api/embed";
const GENERATE_PATH: &str = "api/generate";
const TOPIC_TEMPERATURE: f32 = 0.2;
const REFLECTION_TEMPERATURE: f32 = 0.5;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Blocking client for an Ollama-compatible HTTP API.
///
/// Every request carries the configured timeout, so a stalled backend costs at
/// most one timeout per call before the month is skipped.
pub struct OllamaClient {
    http: Client,
    host: String,
    embedding_model: String,
    generation_model: String,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            host: settings.host.trim_end_matches('/').to_string(),
            embedding_model: settings.embedding_model.clone(),
            generation_model: settings.generation_model.clone(),
            timeout_secs: settings.timeout_secs,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.host, path);
        debug!("POST {}", url);

        let response = self.http.post(&url).json(body).send().map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ProviderError::Status { status: status.as_u16(), body });
        }

        response.json::<R>().map_err(|e| self.classify(e))
    }

    fn classify(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() { ProviderError::Timeout(self.timeout_secs) } else { err.into() }
    }

    fn generate(&self, prompt: String, temperature: f32) -> Result<String, ProviderError> {
        let request = GenerateRequest {
            model: &self.generation_model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature },
        };
        let response: GenerateResponse = self.post(GENERATE_PATH, &request)?;
        Ok(clean_label(&response.response))
    }
}

impl Embedder for OllamaClient {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest { model: &self.embedding_model, input: texts };
        let response: EmbedResponse = self.post(EMBED_PATH, &request)?;

        if response.embeddings.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} embeddings, received {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }
}

impl TopicGenerator for OllamaClient {
    fn generate_topic(&self, titles: &[String]) -> Result<String, ProviderError> {
        self.generate(topic_prompt(titles), TOPIC_TEMPERATURE)
    }

    fn generate_reflection(&self, texts: &[String]) -> Result<String, ProviderError> {
        if texts.is_empty() {
            return Ok(String::new());
        }
        self.generate(reflection_prompt(texts), REFLECTION_TEMPERATURE)
    }
}
