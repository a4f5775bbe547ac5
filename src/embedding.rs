//! Embedding backends.
//!
//! Implements [`ragline_core::embedding::Embedder`] for:
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed` endpoint.
//! - **[`OpenAIEmbedder`]**: the OpenAI embeddings API.
//! - **[`DisabledEmbedder`]**: returns errors; used when embeddings are not configured.
//! - [`HashingEmbedder`]: deterministic feature hashing, no network.
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the backend named in the configuration:
//!
//! ```rust,no_run
//! # use ragline::config::EmbeddingConfig;
//! # use ragline::embedding::create_embedder;
//! # use ragline_core::embedding::Embedder;
//! let config = EmbeddingConfig::default(); // provider = "ollama"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "nomic-embed-text");
//! ```
//!
//! Backends make exactly one request per batch. Failures are reported as
//! [`Error::EmbeddingBackend`] and are not retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ragline_core::embedding::{Embedder, HashingEmbedder};
use ragline_core::{Error, Result};

use crate::config::EmbeddingConfig;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Dimensionality used by the hashing embedder when `embedding.dims` is unset.
const DEFAULT_HASHING_DIMS: usize = 256;

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::embedding(format!("failed to build HTTP client: {}", e)))
}

// ============ Disabled ============

/// A no-op embedding backend that always returns errors.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::embedding("embedding provider is disabled"))
    }
}

// ============ OpenAI ============

/// Calls `POST /v1/embeddings`. Requires `OPENAI_API_KEY` in the environment.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| Error::embedding("embedding.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::embedding("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            model,
            dims: config.dims.unwrap_or(0),
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let response = self
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::embedding(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::embedding(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("invalid OpenAI response: {}", e)))?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index` field.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::embedding("invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .ok_or_else(|| Error::embedding("invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, json_to_vector(embedding)?));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Calls `POST {url}/api/embed` with the configured model.
///
/// Requires Ollama to be running with the model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| Error::embedding("embedding.model required for Ollama provider"))?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: config.base_url().trim_end_matches('/').to_string(),
            model,
            dims: config.dims.unwrap_or(0),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Error::embedding(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::embedding(format!(
                "Ollama API error {}: {}",
                status, body_text
            )));
        }
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("invalid Ollama response: {}", e)))?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::embedding("invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(json_to_vector)
        .collect()
}

fn json_to_vector(value: &serde_json::Value) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| Error::embedding("invalid response: embedding is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| Error::embedding("invalid response: non-numeric embedding value"))
        })
        .collect()
}

/// Create the [`Embedder`] named by `embedding.provider`.
///
/// | Config Value | Backend |
/// |-------------|----------|
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"hashing"` | [`HashingEmbedder`] |
/// | `"disabled"` | [`DisabledEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "hashing" => Ok(Arc::new(HashingEmbedder::new(
            config.dims.unwrap_or(DEFAULT_HASHING_DIMS),
        ))),
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        other => Err(Error::validation(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ollama_response() {
        let json = serde_json::json!({
            "model": "nomic-embed-text",
            "embeddings": [[0.1, 0.2], [0.3, 0.4]]
        });
        let vectors = parse_ollama_response(&json).unwrap();
        assert_eq!(vectors.len(), 2);
        assert!((vectors[1][0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_parse_ollama_missing_embeddings() {
        let json = serde_json::json!({"error": "model not found"});
        assert!(matches!(
            parse_ollama_response(&json),
            Err(Error::EmbeddingBackend(_))
        ));
    }

    #[test]
    fn test_parse_openai_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                {"index": 1, "embedding": [2.0]},
                {"index": 0, "embedding": [1.0]}
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_non_numeric_value_rejected() {
        let json = serde_json::json!({"embeddings": [[0.1, "x"]]});
        assert!(parse_ollama_response(&json).is_err());
    }

    #[tokio::test]
    async fn test_disabled_always_errors() {
        let err = DisabledEmbedder
            .embed_documents(&["hi".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmbeddingBackend(_)));
    }

    #[tokio::test]
    async fn test_create_hashing_embedder() {
        let config = EmbeddingConfig {
            provider: "hashing".to_string(),
            dims: Some(32),
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.model_name(), "hashing");
        assert_eq!(embedder.dims(), 32);
        let vectors = embedder
            .embed_documents(&["alpha beta".to_string(), "gamma".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 32);
    }
}
