//! Ingestion driver.
//!
//! Moves files through the pipeline one document at a time:
//! validate → load (blocking pool) → assemble → embed + upsert. A failure
//! at any stage aborts that document only; nothing is written for it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ragline_core::chunk::ChunkerConfig;
use ragline_core::document::assemble;
use ragline_core::index::VectorIndex;
use ragline_core::models::FileType;
use ragline_core::{Error, Result};
use serde::Serialize;
use walkdir::WalkDir;

use crate::loader::{validate_document, Loader};

/// Directory names never descended into when walking.
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub doc_id: String,
    pub filename: String,
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    pub ingested: Vec<IngestOutcome>,
    pub failed: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn total_chunks(&self) -> usize {
        self.ingested.iter().map(|o| o.chunks).sum()
    }
}

pub struct Ingestor {
    index: Arc<VectorIndex>,
    chunker: ChunkerConfig,
    max_file_size_mb: u64,
}

impl Ingestor {
    pub fn new(index: Arc<VectorIndex>, chunker: ChunkerConfig, max_file_size_mb: u64) -> Self {
        Self {
            index,
            chunker,
            max_file_size_mb,
        }
    }

    /// Ingest a single file.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestOutcome> {
        let source = validate_document(path, self.max_file_size_mb)?;
        let loader = Loader::for_file_type(source.file_type);

        let document = tokio::task::spawn_blocking(move || loader.load(&source))
            .await
            .map_err(|e| Error::extraction(path.display().to_string(), e.to_string()))??;

        let document = assemble(document, &self.chunker)?;
        let chunks = self.index.insert(&document).await?;

        tracing::info!(
            file = %document.metadata.filename,
            doc_id = %document.doc_id,
            chunks,
            "ingested document"
        );
        Ok(IngestOutcome {
            doc_id: document.doc_id,
            filename: document.metadata.filename,
            chunks,
        })
    }

    /// Ingest files and directories. Directories are walked recursively for
    /// supported files, in sorted order.
    pub async fn ingest_paths(&self, paths: &[PathBuf]) -> IngestReport {
        let mut report = IngestReport::default();
        for file in expand_paths(paths) {
            match self.ingest_file(&file).await {
                Ok(outcome) => report.ingested.push(outcome),
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %e, "failed to ingest");
                    report.failed.push(IngestFailure {
                        path: file.display().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }
}

/// Expand directories into their supported files. Plain file arguments are
/// kept as given so validation can report on them.
pub fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !SKIPPED_DIRS.contains(&entry.file_name().to_string_lossy().as_ref())
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| FileType::from_extension(&e.to_string_lossy()))
                    .is_some()
            })
            .collect();
        found.sort();
        files.extend(found);
    }
    files
}
