//! Entity, keyword and key-point extraction.
//!
//! Three independent prompts over the start of the text. Replies are
//! parsed leniently; a reply that cannot be parsed contributes nothing.

use std::path::Path;
use std::sync::Arc;

use ragline_core::extraction::{
    parse_entities, parse_key_points, parse_keywords, ExtractionResult,
};
use ragline_core::prompt::{entities_prompt, key_points_prompt, keywords_prompt};
use ragline_core::{Error, Result};

use crate::llm::LanguageModel;
use crate::loader::extract_text_blocking;

pub struct Extractor {
    llm: Arc<dyn LanguageModel>,
    max_file_size_mb: u64,
}

impl Extractor {
    pub fn new(llm: Arc<dyn LanguageModel>, max_file_size_mb: u64) -> Self {
        Self {
            llm,
            max_file_size_mb,
        }
    }

    pub async fn extract_from_file(&self, path: &Path) -> Result<ExtractionResult> {
        let text = extract_text_blocking(path.to_path_buf(), self.max_file_size_mb).await?;
        if text.trim().is_empty() {
            return Err(Error::EmptyDocument(path.display().to_string()));
        }
        self.extract_from_text(&text, &path.display().to_string())
            .await
    }

    pub async fn extract_from_text(&self, text: &str, source_file: &str) -> Result<ExtractionResult> {
        let entities = parse_entities(&self.llm.invoke(&entities_prompt(text)).await?);
        let keywords = parse_keywords(&self.llm.invoke(&keywords_prompt(text)).await?);
        let key_points = parse_key_points(&self.llm.invoke(&key_points_prompt(text)).await?);

        tracing::debug!(
            source = source_file,
            entities = entities.len(),
            keywords = keywords.len(),
            key_points = key_points.len(),
            "extracted information"
        );
        Ok(ExtractionResult {
            source_file: source_file.to_string(),
            entities,
            keywords,
            key_points,
            ..ExtractionResult::default()
        })
    }
}
