//! Prompt templates and context assembly.
//!
//! Everything that turns pipeline data into model input lives here so the
//! wording is in one place and can be tested without a model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;
use crate::error::Error;
use crate::models::QueryHit;

/// Answer returned when retrieval finds nothing.
pub const NO_RELEVANT_INFORMATION: &str =
    "I couldn't find any relevant information in the documents to answer your question.";

/// Characters of input the extraction prompts look at.
pub const EXTRACTION_INPUT_CHARS: usize = 2000;

/// Render ranked hits as numbered, attributed context blocks.
///
/// ```text
/// [Source 1: report.pdf, chunk 4]
/// <chunk text>
///
/// [Source 2: notes.md, chunk 0]
/// <chunk text>
/// ```
pub fn format_context(hits: &[QueryHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[Source {}: {}, chunk {}]\n{}",
                i + 1,
                hit.metadata.source_file,
                hit.metadata.chunk_index,
                hit.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Distinct source filenames in first-seen rank order.
pub fn source_files(hits: &[QueryHit]) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    for hit in hits {
        if !files.contains(&hit.metadata.source_file) {
            files.push(hit.metadata.source_file.clone());
        }
    }
    files
}

/// Grounded question-answering prompt over retrieved hits.
pub fn rag_prompt(question: &str, hits: &[QueryHit]) -> String {
    format!(
        "You are a helpful AI assistant. Answer the question based on the provided context from the documents.

Context from documents ({sources}):
{context}

Question: {question}

Instructions:
- Answer based only on the information provided in the context above
- If the context doesn't contain enough information to answer the question, say so clearly
- Be concise but thorough
- Cite which source(s) you're using in your answer when relevant

Answer:",
        sources = source_files(hits).join(", "),
        context = format_context(hits),
        question = question,
    )
}

/// Transcript prompt: `"User: …"` / `"Assistant: …"` blocks separated by blank lines.
pub fn chat_prompt(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStyle {
    #[default]
    Concise,
    Detailed,
    Bullet,
}

impl SummaryStyle {
    fn instruction(&self) -> &'static str {
        match self {
            SummaryStyle::Concise => "Provide a concise summary in 2-3 paragraphs.",
            SummaryStyle::Detailed => "Provide a detailed summary covering all major points.",
            SummaryStyle::Bullet => "Provide a summary as a bullet-point list of key points.",
        }
    }
}

impl FromStr for SummaryStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "concise" => Ok(SummaryStyle::Concise),
            "detailed" => Ok(SummaryStyle::Detailed),
            "bullet" | "bullets" => Ok(SummaryStyle::Bullet),
            other => Err(Error::validation(format!(
                "unknown summary style '{}': expected concise, detailed or bullet",
                other
            ))),
        }
    }
}

impl fmt::Display for SummaryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SummaryStyle::Concise => "concise",
            SummaryStyle::Detailed => "detailed",
            SummaryStyle::Bullet => "bullet",
        };
        f.write_str(name)
    }
}

pub fn summary_prompt(text: &str, style: SummaryStyle) -> String {
    format!(
        "Summarize the following text. {}\n\nText:\n{}\n\nSummary:",
        style.instruction(),
        text
    )
}

/// Map step of map-reduce summarization.
pub fn partial_summary_prompt(text: &str) -> String {
    format!(
        "Summarize the following text concisely:\n\n{}\n\nSummary:",
        text
    )
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

pub fn entities_prompt(text: &str) -> String {
    format!(
        r#"Extract named entities from the following text.
Identify: people, organizations, locations, dates, and other important entities.

Format your response as a JSON array of objects with "text" and "type" fields.
Example: [{{"text": "John Doe", "type": "person"}}, {{"text": "Microsoft", "type": "organization"}}]

Text:
{}

Entities (JSON):"#,
        truncate_chars(text, EXTRACTION_INPUT_CHARS)
    )
}

pub fn keywords_prompt(text: &str) -> String {
    format!(
        r#"Extract the 10 most important keywords or key phrases from the following text.

Format your response as a JSON array of objects with a "text" field.
Example: [{{"text": "machine learning"}}, {{"text": "artificial intelligence"}}]

Text:
{}

Keywords (JSON):"#,
        truncate_chars(text, EXTRACTION_INPUT_CHARS)
    )
}

pub fn key_points_prompt(text: &str) -> String {
    format!(
        "Extract 5-7 key points from the following text.
Format as a simple list, one point per line, without numbering or bullets.

Text:
{}

Key points:",
        truncate_chars(text, EXTRACTION_INPUT_CHARS)
    )
}
