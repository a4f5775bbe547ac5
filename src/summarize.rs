//! Document summarization.
//!
//! Short texts (under [`DIRECT_SUMMARY_WORDS`] words) are summarized with a
//! single prompt. Longer texts go through map-reduce: each chunk is
//! summarized on its own, then the joined partial summaries are summarized
//! again with the requested style.

use std::path::Path;
use std::sync::Arc;

use ragline_core::chunk::{chunk_text, ChunkerConfig};
use ragline_core::prompt::{partial_summary_prompt, summary_prompt, SummaryStyle};
use ragline_core::{Error, Result};

use crate::llm::LanguageModel;
use crate::loader::extract_text_blocking;

pub const DIRECT_SUMMARY_WORDS: usize = 1000;
const MAP_CHUNK_SIZE: usize = 2000;
const MAP_CHUNK_OVERLAP: usize = 200;

pub struct Summarizer {
    llm: Arc<dyn LanguageModel>,
    max_file_size_mb: u64,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LanguageModel>, max_file_size_mb: u64) -> Self {
        Self {
            llm,
            max_file_size_mb,
        }
    }

    pub async fn summarize_file(&self, path: &Path, style: SummaryStyle) -> Result<String> {
        let text = extract_text_blocking(path.to_path_buf(), self.max_file_size_mb).await?;
        if text.trim().is_empty() {
            return Err(Error::EmptyDocument(path.display().to_string()));
        }
        self.summarize_text(&text, style).await
    }

    pub async fn summarize_text(&self, text: &str, style: SummaryStyle) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::EmptyDocument("<text>".to_string()));
        }
        let words = text.split_whitespace().count();
        if words < DIRECT_SUMMARY_WORDS {
            return self.llm.invoke(&summary_prompt(text, style)).await;
        }

        let chunker = ChunkerConfig::new(MAP_CHUNK_SIZE, MAP_CHUNK_OVERLAP)?;
        let chunks = chunk_text(text, &chunker);
        tracing::info!(words, chunks = chunks.len(), %style, "map-reduce summarization");

        let mut partials = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            partials.push(self.llm.invoke(&partial_summary_prompt(chunk)).await?);
        }
        self.llm
            .invoke(&summary_prompt(&partials.join("\n\n"), style))
            .await
    }
}
