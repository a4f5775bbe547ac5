//! Language model backends.
//!
//! [`LanguageModel`] is the seam the RAG, chat, summarizer and extractor
//! services generate through. Two call shapes are supported:
//!
//! - [`LanguageModel::invoke`]: one request, the full completion back.
//! - [`LanguageModel::stream`]: a [`FragmentStream`] of text pieces as the
//!   model produces them. A single producer task owns the HTTP response and
//!   pushes into a bounded channel; dropping the receiver makes its next
//!   send fail, which stops the task and closes the connection.
//!
//! Backend failures surface as [`Error::LlmBackend`] and are not retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use ragline_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::LlmConfig;

/// Receiving end of a streamed generation. `Err` items end the stream.
pub type FragmentStream = mpsc::Receiver<Result<String>>;

/// Channel capacity between the producer task and the consumer.
pub const STREAM_BUFFER: usize = 32;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Backend name for logging (e.g. `"ollama"`).
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn invoke(&self, prompt: &str) -> Result<String>;

    /// Start a streamed generation. Errors that happen before the first
    /// fragment (connection refused, HTTP status) are returned directly.
    async fn stream(&self, prompt: &str) -> Result<FragmentStream>;
}

/// Drain a [`FragmentStream`] into one string, stopping at the first error.
pub async fn collect_stream(mut stream: FragmentStream) -> Result<String> {
    let mut out = String::new();
    while let Some(fragment) = stream.recv().await {
        out.push_str(&fragment?);
    }
    Ok(out)
}

/// A stream that yields `text` once and closes.
pub fn single_fragment(text: impl Into<String>) -> FragmentStream {
    let (tx, rx) = mpsc::channel(1);
    // Capacity 1 and a fresh receiver: this send cannot fail.
    let _ = tx.try_send(Ok(text.into()));
    rx
}

// ============ Ollama ============

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// One NDJSON line of `/api/generate`, or the whole body when not streaming.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Calls `POST {url}/api/generate` on an Ollama server.
pub struct OllamaLlm {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: Option<f32>,
}

impl OllamaLlm {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::llm(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream,
            options: self.temperature.map(|temperature| GenerateOptions { temperature }),
        };
        tracing::debug!(model = %self.model, stream, prompt_chars = prompt.len(), "generate request");

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                Error::llm(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::llm(format!("generation failed: HTTP {} - {}", status, body)));
        }
        Ok(response)
    }
}

#[async_trait]
impl LanguageModel for OllamaLlm {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, prompt: &str) -> Result<String> {
        let response = self.send(prompt, false).await?;
        let chunk: GenerateChunk = response
            .json()
            .await
            .map_err(|e| Error::llm(format!("failed to parse generate response: {}", e)))?;
        if let Some(err) = chunk.error {
            return Err(Error::llm(err));
        }
        Ok(chunk.response)
    }

    async fn stream(&self, prompt: &str) -> Result<FragmentStream> {
        let response = self.send(prompt, true).await?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut lines = LineBuffer::default();
            while let Some(next) = body.next().await {
                let bytes = match next {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(Err(Error::llm(format!("stream interrupted: {}", e)))).await;
                        return;
                    }
                };
                for line in lines.push(&bytes) {
                    if !forward_line(&tx, &line).await {
                        return;
                    }
                }
            }
            if let Some(line) = lines.finish() {
                forward_line(&tx, &line).await;
            }
        });

        Ok(rx)
    }
}

/// Send one NDJSON line downstream. Returns `false` when the stream is over:
/// the model reported `done`, an error was forwarded, or the consumer left.
async fn forward_line(tx: &mpsc::Sender<Result<String>>, line: &[u8]) -> bool {
    match parse_line(line) {
        Ok(None) => true,
        Ok(Some(chunk)) => {
            if !chunk.response.is_empty() && tx.send(Ok(chunk.response)).await.is_err() {
                tracing::debug!("stream consumer dropped, stopping generation");
                return false;
            }
            !chunk.done
        }
        Err(err) => {
            let _ = tx.send(Err(err)).await;
            false
        }
    }
}

fn parse_line(line: &[u8]) -> Result<Option<GenerateChunk>> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }
    let chunk: GenerateChunk = serde_json::from_slice(line)
        .map_err(|e| Error::llm(format!("malformed stream line: {}", e)))?;
    match chunk.error {
        Some(err) => Err(Error::llm(err)),
        None => Ok(Some(chunk)),
    }
}

/// Reassembles newline-delimited records split across network chunks.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            lines.push(line);
        }
        lines
    }

    /// Whatever is left after the body ends without a trailing newline.
    fn finish(self) -> Option<Vec<u8>> {
        (!self.pending.is_empty()).then_some(self.pending)
    }
}

/// Create the [`LanguageModel`] named by `llm.provider`.
pub fn create_llm(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaLlm::new(config)?)),
        other => Err(Error::validation(format!("unknown llm provider: {}", other))),
    }
}
