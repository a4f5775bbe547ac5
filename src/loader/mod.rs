//! Document loaders: validation, format dispatch and text extraction.
//!
//! [`validate_document`] checks existence, extension and size before any
//! content is read. The extension picks the format-specific extractor from
//! a fixed table; anything else is [`Error::UnsupportedFormat`]:
//!
//! | Extension | Loader | Primary | Fallback |
//! |-----------|--------|---------|----------|
//! | `.txt`, `.md` | [`Loader::Text`] | utf-8, ascii, latin-1, windows-1252 | n/a |
//! | `.pdf` | [`Loader::Pdf`] | `pdf-extract` per page | `lopdf` per page |
//! | `.docx` | [`Loader::Docx`] | structured `word/document.xml` walk | raw `<w:t>` scan |
//!
//! When both strategies of a binary format fail, the returned
//! [`Error::ExtractionFailed`] carries both underlying messages.

mod docx;
mod pdf;
mod text;

use std::path::{Path, PathBuf};

use chrono::Utc;
use ragline_core::document::doc_id_for_path;
use ragline_core::models::{Document, DocumentMetadata, FileType, SUPPORTED_EXTENSIONS};
use ragline_core::{Error, Result};

/// Plain text pulled out of a file, plus the page count when the format has pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub text: String,
    pub page_count: Option<usize>,
}

impl Extracted {
    fn plain(text: String) -> Self {
        Self {
            text,
            page_count: None,
        }
    }
}

/// A file that passed [`validate_document`].
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Canonical absolute path.
    pub path: PathBuf,
    pub file_type: FileType,
    pub size: u64,
}

impl SourceFile {
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Check that `path` is an existing regular file with a supported
/// extension and at most `max_file_size_mb` megabytes.
pub fn validate_document(path: &Path, max_file_size_mb: u64) -> Result<SourceFile> {
    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            Error::validation(format!("file not found: {}", path.display()))
        }
        _ => Error::validation(format!("cannot access {}: {}", path.display(), e)),
    })?;
    if !metadata.is_file() {
        return Err(Error::validation(format!(
            "path is not a file: {}",
            path.display()
        )));
    }

    let file_type = file_type_of(path)?;

    let limit = max_file_size_mb.saturating_mul(1024 * 1024);
    if metadata.len() > limit {
        return Err(Error::validation(format!(
            "file too large: {:.2}MB, maximum size: {}MB",
            metadata.len() as f64 / (1024.0 * 1024.0),
            max_file_size_mb
        )));
    }

    let path = std::fs::canonicalize(path)?;
    Ok(SourceFile {
        path,
        file_type,
        size: metadata.len(),
    })
}

/// Map `path`'s extension (case-insensitive) to a supported [`FileType`].
pub fn file_type_of(path: &Path) -> Result<FileType> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    FileType::from_extension(&ext).ok_or_else(|| {
        Error::UnsupportedFormat(format!(
            "'.{}' (supported: {})",
            ext,
            SUPPORTED_EXTENSIONS.join(", ")
        ))
    })
}

/// Format-specific text extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    Text,
    Pdf,
    Docx,
}

impl Loader {
    pub fn for_file_type(file_type: FileType) -> Self {
        match file_type {
            FileType::Txt | FileType::Md => Loader::Text,
            FileType::Pdf => Loader::Pdf,
            FileType::Docx => Loader::Docx,
        }
    }

    /// Extract text from already-read file bytes. `label` names the file in errors.
    pub fn extract_bytes(&self, bytes: &[u8], label: &str) -> Result<Extracted> {
        match self {
            Loader::Text => text::decode(bytes, label).map(Extracted::plain),
            Loader::Pdf => pdf::extract(bytes, label),
            Loader::Docx => docx::extract(bytes, label),
        }
    }

    pub fn extract_text(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path)?;
        Ok(self
            .extract_bytes(&bytes, &path.display().to_string())?
            .text)
    }

    /// Read and extract a validated file into a [`Document`] with no chunks.
    pub fn load(&self, source: &SourceFile) -> Result<Document> {
        let bytes = std::fs::read(&source.path)?;
        let path_str = source.path.to_string_lossy().into_owned();
        let extracted = self.extract_bytes(&bytes, &path_str)?;
        let word_count = extracted.text.split_whitespace().count();

        tracing::debug!(
            file = %path_str,
            loader = ?self,
            chars = extracted.text.len(),
            "extracted text"
        );

        Ok(Document::new(
            doc_id_for_path(&path_str),
            extracted.text,
            DocumentMetadata {
                filename: source.filename(),
                file_path: path_str,
                file_type: source.file_type,
                file_size: source.size,
                page_count: extracted.page_count,
                word_count: Some(word_count),
                created_at: Utc::now(),
            },
        ))
    }
}

/// Validate and load `path` into a [`Document`].
pub fn load_document(path: &Path, max_file_size_mb: u64) -> Result<Document> {
    let source = validate_document(path, max_file_size_mb)?;
    Loader::for_file_type(source.file_type).load(&source)
}

/// Validate `path` and return its plain text.
pub fn extract_text(path: &Path, max_file_size_mb: u64) -> Result<String> {
    let source = validate_document(path, max_file_size_mb)?;
    Loader::for_file_type(source.file_type).extract_text(&source.path)
}

/// [`extract_text`] on the blocking pool, for async callers.
pub async fn extract_text_blocking(path: PathBuf, max_file_size_mb: u64) -> Result<String> {
    let label = path.display().to_string();
    tokio::task::spawn_blocking(move || extract_text(&path, max_file_size_mb))
        .await
        .map_err(|e| Error::extraction(label, e.to_string()))?
}

/// Run `primary`, falling back to `fallback` when it fails or finds no text.
///
/// A blank primary result is kept if the fallback cannot do better, so the
/// caller sees an empty document rather than an extraction error.
fn with_fallback<P, F>(
    label: &str,
    (primary_name, primary): (&str, P),
    (fallback_name, fallback): (&str, F),
) -> Result<Extracted>
where
    P: FnOnce() -> std::result::Result<Extracted, String>,
    F: FnOnce() -> std::result::Result<Extracted, String>,
{
    match primary() {
        Ok(extracted) if !extracted.text.trim().is_empty() => Ok(extracted),
        Ok(blank) => match fallback() {
            Ok(extracted) if !extracted.text.trim().is_empty() => {
                tracing::debug!(file = label, "{} found no text, used {}", primary_name, fallback_name);
                Ok(extracted)
            }
            _ => Ok(blank),
        },
        Err(primary_err) => {
            tracing::warn!(
                file = label,
                "{} failed ({}), trying {}",
                primary_name,
                primary_err,
                fallback_name
            );
            fallback().map_err(|fallback_err| {
                Error::extraction(
                    label,
                    format!(
                        "{}: {}; {}: {}",
                        primary_name, primary_err, fallback_name, fallback_err
                    ),
                )
            })
        }
    }
}
