//! Document assembly: identity hashing and chunk attachment.
//!
//! Identifiers are deterministic so re-ingesting an unchanged file
//! overwrites its previous records instead of duplicating them:
//!
//! | Id | Derived from |
//! |----|--------------|
//! | `doc_id` | SHA-256 of the canonical source path |
//! | `chunk_id` | SHA-256 of `"{doc_id}_{chunk_index}"` |
//!
//! Both are truncated to 32 lowercase hex characters.

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::chunk::{chunk_spans, ChunkerConfig};
use crate::error::{Error, Result};
use crate::models::{ChunkMetadata, Document, DocumentChunk};

const ID_HEX_LEN: usize = 32;

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(ID_HEX_LEN);
    hex
}

/// Stable document id for a source path.
pub fn doc_id_for_path(path: &str) -> String {
    short_hash(path)
}

/// Stable chunk id; a pure function of `(doc_id, chunk_index)`.
pub fn chunk_id(doc_id: &str, chunk_index: usize) -> String {
    short_hash(&format!("{}_{}", doc_id, chunk_index))
}

/// Chunk a loaded document and attach the resulting [`DocumentChunk`]s.
///
/// Any chunks already on the document are replaced. Fails with
/// [`Error::EmptyDocument`] when the content is empty or whitespace-only.
pub fn assemble(mut document: Document, config: &ChunkerConfig) -> Result<Document> {
    if document.content.trim().is_empty() {
        return Err(Error::EmptyDocument(document.metadata.filename.clone()));
    }

    let spans = chunk_spans(&document.content, config);
    let total_chunks = spans.len();
    let source_file = document.metadata.filename.clone();

    document.chunks = spans
        .into_iter()
        .enumerate()
        .map(|(chunk_index, span)| DocumentChunk {
            chunk_id: chunk_id(&document.doc_id, chunk_index),
            text: document.content[span.clone()].to_string(),
            chunk_index,
            source_file: source_file.clone(),
            metadata: ChunkMetadata {
                total_chunks,
                start: span.start,
                end: span.end,
            },
        })
        .collect();
    document.processed_at = Some(Utc::now());

    tracing::debug!(
        doc_id = %document.doc_id,
        file = %source_file,
        chunks = total_chunks,
        "assembled document"
    );
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentMetadata, FileType};

    fn document(content: &str) -> Document {
        let path = "/data/notes/report.txt";
        Document::new(
            doc_id_for_path(path),
            content.to_string(),
            DocumentMetadata {
                filename: "report.txt".into(),
                file_path: path.into(),
                file_type: FileType::Txt,
                file_size: content.len() as u64,
                page_count: None,
                word_count: Some(content.split_whitespace().count()),
                created_at: Utc::now(),
            },
        )
    }

    #[test]
    fn test_ids_are_deterministic() {
        assert_eq!(doc_id_for_path("/a/b.txt"), doc_id_for_path("/a/b.txt"));
        assert_ne!(doc_id_for_path("/a/b.txt"), doc_id_for_path("/a/c.txt"));
        assert_eq!(chunk_id("doc", 3), chunk_id("doc", 3));
        assert_ne!(chunk_id("doc", 3), chunk_id("doc", 4));
        assert_eq!(chunk_id("doc", 0).len(), 32);
    }

    #[test]
    fn test_assemble_sets_chunk_fields() {
        let config = ChunkerConfig::new(20, 5).unwrap();
        let doc = assemble(
            document("First paragraph here.\n\nSecond paragraph here.\n\nThird one."),
            &config,
        )
        .unwrap();

        let n = doc.chunks.len();
        assert!(n > 1);
        assert!(doc.processed_at.is_some());
        for (i, chunk) in doc.chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.chunk_id, chunk_id(&doc.doc_id, i));
            assert_eq!(chunk.source_file, "report.txt");
            assert_eq!(chunk.metadata.total_chunks, n);
            assert_eq!(
                &doc.content[chunk.metadata.start..chunk.metadata.end],
                chunk.text
            );
        }
    }

    #[test]
    fn test_assemble_is_stable_across_runs() {
        let config = ChunkerConfig::new(30, 10).unwrap();
        let text = "Alpha beta gamma.\n\nDelta epsilon zeta.\n\nEta theta iota kappa.";
        let a = assemble(document(text), &config).unwrap();
        let b = assemble(document(text), &config).unwrap();
        let ids_a: Vec<_> = a.chunks.iter().map(|c| &c.chunk_id).collect();
        let ids_b: Vec<_> = b.chunks.iter().map(|c| &c.chunk_id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_whitespace_only_document_rejected() {
        let config = ChunkerConfig::new(100, 10).unwrap();
        let err = assemble(document("  \n\t \n"), &config).unwrap_err();
        assert!(matches!(err, Error::EmptyDocument(ref f) if f == "report.txt"));
        let err = assemble(document(""), &config).unwrap_err();
        assert!(matches!(err, Error::EmptyDocument(_)));
    }
}
