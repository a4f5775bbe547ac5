//! Retrieval-augmented question answering.
//!
//! [`RagEngine`] is stateless across queries:
//!
//! ```text
//! question ──▶ retrieve ──┬── no hits ──▶ NO_RELEVANT_INFORMATION
//!                         └── hits ──▶ context ──▶ prompt ──▶ generate
//! ```
//!
//! The language model is never contacted when retrieval comes back empty.

use std::sync::Arc;

use ragline_core::index::VectorIndex;
use ragline_core::models::QueryHit;
use ragline_core::prompt::{rag_prompt, source_files, NO_RELEVANT_INFORMATION};
use ragline_core::Result;
use serde::Serialize;

use crate::llm::{single_fragment, FragmentStream, LanguageModel};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    /// Distinct source filenames, best match first.
    pub sources: Vec<String>,
}

pub struct RagEngine {
    index: Arc<VectorIndex>,
    llm: Arc<dyn LanguageModel>,
    default_top_k: usize,
}

impl RagEngine {
    pub fn new(index: Arc<VectorIndex>, llm: Arc<dyn LanguageModel>, default_top_k: usize) -> Self {
        Self {
            index,
            llm,
            default_top_k,
        }
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    async fn retrieve(&self, question: &str, top_k: Option<usize>) -> Result<Vec<QueryHit>> {
        let top_k = top_k.unwrap_or(self.default_top_k);
        let hits = self.index.query(question, top_k).await?;
        tracing::debug!(top_k, hits = hits.len(), "retrieved context");
        Ok(hits)
    }

    /// Answer in one blocking generation call.
    pub async fn answer(&self, question: &str, top_k: Option<usize>) -> Result<RagAnswer> {
        let hits = self.retrieve(question, top_k).await?;
        if hits.is_empty() {
            return Ok(RagAnswer {
                answer: NO_RELEVANT_INFORMATION.to_string(),
                sources: Vec::new(),
            });
        }
        let answer = self.llm.invoke(&rag_prompt(question, &hits)).await?;
        Ok(RagAnswer {
            answer,
            sources: source_files(&hits),
        })
    }

    /// Answer as a stream of text fragments.
    ///
    /// With no hits the stream carries exactly one fragment, the canned
    /// no-information message.
    pub async fn answer_stream(
        &self,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<FragmentStream> {
        let hits = self.retrieve(question, top_k).await?;
        if hits.is_empty() {
            return Ok(single_fragment(NO_RELEVANT_INFORMATION));
        }
        self.llm.stream(&rag_prompt(question, &hits)).await
    }

    /// The ranked chunks a question would be answered from.
    pub async fn relevant_chunks(
        &self,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<QueryHit>> {
        self.retrieve(question, top_k).await
    }

    /// Distinct source filenames a question would be answered from.
    pub async fn sources(&self, question: &str, top_k: Option<usize>) -> Result<Vec<String>> {
        Ok(source_files(&self.retrieve(question, top_k).await?))
    }
}
