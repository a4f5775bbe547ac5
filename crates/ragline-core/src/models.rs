//! Core data types for the ingestion and retrieval pipeline.
//!
//! ```text
//! File ──▶ Document{content, metadata} ──▶ Document{chunks} ──▶ IndexedRecord*
//!                                                                   │
//!                                     question ──▶ QueryHit* ◀──────┘
//! ```
//!
//! A [`Document`] owns its [`DocumentChunk`]s. The vector index only ever
//! sees flattened [`IndexedRecord`]s; per-document views such as
//! [`IndexInfo`] are rebuilt by grouping record metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported source formats, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Txt,
    Md,
    Docx,
}

/// Extensions accepted by the loaders, lowercase and with the leading dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".pdf", ".txt", ".md", ".docx"];

impl FileType {
    /// Maps an extension (with or without the leading dot, any case) to a file type.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(FileType::Pdf),
            "txt" => Some(FileType::Txt),
            "md" => Some(FileType::Md),
            "docx" => Some(FileType::Docx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Pdf => ".pdf",
            FileType::Txt => ".txt",
            FileType::Md => ".md",
            FileType::Docx => ".docx",
        }
    }
}

/// Descriptive metadata captured by a loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub filename: String,
    pub file_path: String,
    pub file_type: FileType,
    /// Size on disk in bytes.
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
    pub created_at: DateTime<Utc>,
}

/// Per-chunk bookkeeping.
///
/// `start` and `end` are byte offsets into the parent document's content,
/// so `content[start..end] == text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub total_chunks: usize,
    pub start: usize,
    pub end: usize,
}

/// One retrievable unit of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Deterministic function of `(doc_id, chunk_index)`.
    pub chunk_id: String,
    pub text: String,
    pub chunk_index: usize,
    pub source_file: String,
    pub metadata: ChunkMetadata,
}

/// A loaded document, optionally split into chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Deterministic hash of the source path.
    pub doc_id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub chunks: Vec<DocumentChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl Document {
    /// A freshly loaded document with no chunks yet.
    pub fn new(doc_id: String, content: String, metadata: DocumentMetadata) -> Self {
        Self {
            doc_id,
            content,
            metadata,
            chunks: Vec::new(),
            processed_at: None,
        }
    }
}

/// Metadata stored alongside every vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub source_file: String,
    pub chunk_index: usize,
    pub doc_id: String,
}

/// The flattened unit persisted in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    /// Equal to the chunk's `chunk_id`.
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: RecordMetadata,
}

impl IndexedRecord {
    pub fn from_chunk(doc_id: &str, chunk: &DocumentChunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.chunk_id.clone(),
            vector,
            text: chunk.text.clone(),
            metadata: RecordMetadata {
                source_file: chunk.source_file.clone(),
                chunk_index: chunk.chunk_index,
                doc_id: doc_id.to_string(),
            },
        }
    }
}

/// A ranked similarity-query result. Lower `distance` is more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    pub id: String,
    pub text: String,
    pub metadata: RecordMetadata,
    pub distance: f32,
}

/// Aggregate statistics computed by scanning the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub total_chunks: usize,
    /// Number of distinct `source_file` values.
    pub unique_documents: usize,
    /// Distinct source filenames, sorted.
    pub document_files: Vec<String>,
}
