//! Recursive, boundary-aware text chunker.
//!
//! Splits document text into overlapping spans of at most `max_size`
//! characters (Unicode scalar values). Every chunk is a contiguous slice
//! of the input, so the original text can always be rebuilt from the spans.
//!
//! # Algorithm
//!
//! 1. If the remaining text fits in `max_size` characters, it becomes the
//!    final chunk.
//! 2. Otherwise look at the next `max_size` characters and pick the last
//!    boundary inside that window, trying in priority order:
//!    paragraph break (`\n\n`), line break (`\n`), sentence terminator
//!    followed by whitespace, any whitespace. The split lands just after
//!    the separator.
//! 3. If no boundary qualifies, hard-cut at `max_size`.
//! 4. The next chunk starts `overlap` characters before the previous end,
//!    moved forward to the next word start when one exists inside the
//!    overlap window.
//!
//! A boundary only qualifies if it lies beyond `start + overlap`, which
//! guarantees the next chunk starts strictly after the current one.
//!
//! # Example
//!
//! ```rust
//! use ragline_core::chunk::{chunk_text, ChunkerConfig};
//!
//! let config = ChunkerConfig::new(15, 0).unwrap();
//! let chunks = chunk_text("aaaa aaaa\n\nbbbb bbbb", &config);
//! assert_eq!(chunks, vec!["aaaa aaaa\n\n", "bbbb bbbb"]);
//! ```

use std::ops::Range;

use crate::error::{Error, Result};

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    max_size: usize,
    overlap: usize,
}

impl ChunkerConfig {
    /// Requires `max_size > 0` and `overlap < max_size`.
    pub fn new(max_size: usize, overlap: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(Error::validation("chunk size must be > 0"));
        }
        if overlap >= max_size {
            return Err(Error::validation(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, max_size
            )));
        }
        Ok(Self { max_size, overlap })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

#[derive(Debug, Clone, Copy)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARIES: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

/// Split `text` into chunk strings. Empty input yields no chunks.
pub fn chunk_text(text: &str, config: &ChunkerConfig) -> Vec<String> {
    chunk_spans(text, config)
        .into_iter()
        .map(|span| text[span].to_string())
        .collect()
}

/// Split `text` into byte ranges, in source order.
///
/// Consecutive ranges overlap (`next.start <= prev.end`) and together
/// cover the whole input.
pub fn chunk_spans(text: &str, config: &ChunkerConfig) -> Vec<Range<usize>> {
    if text.is_empty() {
        return Vec::new();
    }

    // offsets[i] is the byte offset of char i; the last entry is text.len().
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = offsets.len() - 1;

    let mut spans = Vec::new();
    let mut start = 0usize;

    loop {
        let limit = start + config.max_size;
        if limit >= total_chars {
            spans.push(offsets[start]..text.len());
            break;
        }

        let floor = offsets[start + config.overlap + 1];
        let window_start = offsets[start];
        let window = &text[window_start..offsets[limit]];

        let end_byte = BOUNDARIES
            .iter()
            .find_map(|b| {
                last_boundary(window, *b)
                    .map(|p| window_start + p)
                    .filter(|&e| e >= floor)
            })
            .unwrap_or(offsets[limit]);

        let end = offsets.binary_search(&end_byte).unwrap_or_else(|i| i);
        spans.push(window_start..offsets[end]);
        start = next_start(text, &offsets, end, config.overlap);
    }

    spans
}

/// Byte offset just after the last `boundary` separator in `window`.
fn last_boundary(window: &str, boundary: Boundary) -> Option<usize> {
    match boundary {
        Boundary::Paragraph => window.rfind("\n\n").map(|p| p + 2),
        Boundary::Line => window.rfind('\n').map(|p| p + 1),
        Boundary::Sentence => {
            let mut following: Option<(usize, char)> = None;
            for (i, c) in window.char_indices().rev() {
                if matches!(c, '.' | '!' | '?') {
                    if let Some((j, next)) = following {
                        if next.is_whitespace() {
                            return Some(j + next.len_utf8());
                        }
                    }
                }
                following = Some((i, c));
            }
            None
        }
        Boundary::Word => window
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8()),
    }
}

/// Char index where the chunk after `end` begins.
fn next_start(text: &str, offsets: &[usize], end: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return end;
    }
    let candidate = end - overlap;
    let at_word_start = text[..offsets[candidate]]
        .chars()
        .next_back()
        .map_or(true, char::is_whitespace);
    if at_word_start {
        return candidate;
    }
    text[offsets[candidate]..offsets[end]]
        .chars()
        .position(char::is_whitespace)
        .map(|k| candidate + k + 1)
        .filter(|&snapped| snapped < end)
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_size: usize, overlap: usize) -> ChunkerConfig {
        ChunkerConfig::new(max_size, overlap).unwrap()
    }

    /// Rebuilds the input by dropping each span's overlap with its predecessor.
    fn reconstruct(text: &str, spans: &[Range<usize>]) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for span in spans {
            assert!(span.start <= covered, "gap before span {:?}", span);
            out.push_str(&text[covered.max(span.start)..span.end]);
            covered = span.end;
        }
        out
    }

    fn sample_text() -> String {
        (0..40)
            .map(|i| {
                format!(
                    "Paragraph {} talks about topic {}. It has a second sentence!\nAnd a line.",
                    i,
                    i * 7
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", &config(100, 10)).is_empty());
        assert!(chunk_spans("", &config(100, 10)).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", &config(800, 150));
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(ChunkerConfig::new(0, 0), Err(Error::Validation(_))));
        assert!(matches!(ChunkerConfig::new(10, 10), Err(Error::Validation(_))));
        assert!(ChunkerConfig::new(10, 9).is_ok());
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let chunks = chunk_text("aaaa aaaa\n\nbbbb bbbb", &config(15, 0));
        assert_eq!(chunks, vec!["aaaa aaaa\n\n", "bbbb bbbb"]);
    }

    #[test]
    fn test_falls_back_to_sentence_boundary() {
        let text = "One two three. Four five six. Seven";
        let chunks = chunk_text(text, &config(20, 0));
        assert_eq!(chunks, vec!["One two three. ", "Four five six. Seven"]);
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let chunks = chunk_text("abcdefghij", &config(4, 0));
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_overlap_starts_at_word() {
        let text = "alpha beta gamma delta epsilon";
        let spans = chunk_spans(text, &config(12, 6));
        assert_eq!(&text[spans[0].clone()], "alpha beta ");
        assert_eq!(&text[spans[1].clone()], "beta gamma ");
        assert_eq!(reconstruct(text, &spans), text);
    }

    #[test]
    fn test_no_chunk_exceeds_max_size() {
        let text = sample_text();
        for (max, overlap) in [(50, 10), (80, 0), (200, 60), (33, 32)] {
            for chunk in chunk_text(&text, &config(max, overlap)) {
                assert!(
                    chunk.chars().count() <= max,
                    "chunk of {} chars exceeds {}",
                    chunk.chars().count(),
                    max
                );
            }
        }
    }

    #[test]
    fn test_reconstructs_input() {
        let text = sample_text();
        for (max, overlap) in [(50, 10), (80, 0), (200, 60), (7, 3)] {
            let spans = chunk_spans(&text, &config(max, overlap));
            assert_eq!(reconstruct(&text, &spans), text);
        }
    }

    #[test]
    fn test_overlap_is_shared_text_within_bound() {
        let text = sample_text();
        let overlap = 25;
        let spans = chunk_spans(&text, &config(120, overlap));
        for pair in spans.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            assert!(next.start > prev.start);
            assert!(next.start <= prev.end);
            let shared = &text[next.start..prev.end];
            assert!(shared.chars().count() <= overlap);
            assert!(text[prev.clone()].ends_with(shared));
            assert!(text[next.clone()].starts_with(shared));
        }
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hello wörld ✓    │\n└──────────────────┘".repeat(5);
        let spans = chunk_spans(&text, &config(9, 4));
        assert_eq!(reconstruct(&text, &spans), text);
        for span in &spans {
            assert!(text[span.clone()].chars().count() <= 9);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = sample_text();
        let c1 = chunk_text(&text, &config(90, 20));
        let c2 = chunk_text(&text, &config(90, 20));
        assert_eq!(c1, c2);
    }
}
