//! PDF text extraction.
//!
//! `pdf-extract` handles font encodings well but can panic on malformed
//! input, so it runs under `catch_unwind`. `lopdf` is the fallback: coarser
//! output, but it tolerates more broken files.

use super::{with_fallback, Extracted};
use ragline_core::Result;

pub(super) fn extract(bytes: &[u8], label: &str) -> Result<Extracted> {
    with_fallback(
        label,
        ("pdf-extract", || extract_with_pdf_extract(bytes)),
        ("lopdf", || extract_with_lopdf(bytes)),
    )
}

fn extract_with_pdf_extract(bytes: &[u8]) -> std::result::Result<Extracted, String> {
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| "parser panicked".to_string())?
        .map_err(|e| e.to_string())?;
    Ok(join_pages(&pages))
}

fn extract_with_lopdf(bytes: &[u8]) -> std::result::Result<Extracted, String> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| e.to_string())?;
    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys() {
        // A single unreadable page should not sink the whole document.
        match doc.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                tracing::debug!(page = page_number, error = %e, "lopdf could not read page");
                pages.push(String::new());
            }
        }
    }
    Ok(join_pages(&pages))
}

/// Trim each page, drop blank ones, and separate the rest with a blank line.
fn join_pages(pages: &[String]) -> Extracted {
    let text = pages
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    Extracted {
        text,
        page_count: Some(pages.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_pages_skips_blank() {
        let pages = vec![
            "  first page \n".to_string(),
            "   ".to_string(),
            "third".to_string(),
        ];
        let out = join_pages(&pages);
        assert_eq!(out.text, "first page\n\nthird");
        assert_eq!(out.page_count, Some(3));
    }

    #[test]
    fn test_garbage_fails_both_strategies() {
        let err = extract(b"%PDF-1.4 truncated", "broken.pdf").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("pdf-extract"));
        assert!(msg.contains("lopdf"));
    }
}
