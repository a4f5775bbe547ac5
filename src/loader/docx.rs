//! DOCX text extraction from `word/document.xml`.
//!
//! The structured pass walks the body in document order. Paragraphs become
//! blocks; each top-level table becomes one block with a line per row and
//! non-empty cells joined by `" | "`. Blocks are separated by a blank line.
//!
//! If the XML is malformed, a lenient scan collects every `<w:t>` run.

use std::io::Read;

use quick_xml::events::Event;

use super::{with_fallback, Extracted};
use ragline_core::Result;

/// Upper bound on the decompressed size of `word/document.xml`.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

pub(super) fn extract(bytes: &[u8], label: &str) -> Result<Extracted> {
    with_fallback(
        label,
        ("document.xml", || {
            read_document_xml(bytes).and_then(|xml| structured_text(&xml))
        }),
        ("w:t scan", || {
            read_document_xml(bytes).and_then(|xml| scan_text_runs(&xml))
        }),
    )
}

fn read_document_xml(bytes: &[u8]) -> std::result::Result<Vec<u8>, String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| format!("word/document.xml: {}", e))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| e.to_string())?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(format!(
            "word/document.xml exceeds size limit ({} bytes)",
            MAX_XML_ENTRY_BYTES
        ));
    }
    Ok(out)
}

#[derive(Default)]
struct Walker {
    blocks: Vec<String>,
    paragraph: String,
    in_text: bool,
    table_depth: usize,
    rows: Vec<String>,
    cells: Vec<String>,
    cell: String,
}

impl Walker {
    fn start(&mut self, name: &[u8]) {
        match name {
            b"p" => self.paragraph.clear(),
            b"t" => self.in_text = true,
            b"tbl" => {
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.rows.clear();
                }
            }
            b"tr" if self.table_depth == 1 => self.cells.clear(),
            b"tc" if self.table_depth == 1 => self.cell.clear(),
            _ => {}
        }
    }

    fn empty(&mut self, name: &[u8]) {
        match name {
            b"tab" => self.paragraph.push('\t'),
            b"br" | b"cr" => self.paragraph.push('\n'),
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"t" => self.in_text = false,
            b"p" => {
                let text = std::mem::take(&mut self.paragraph);
                let text = text.trim();
                if text.is_empty() {
                    return;
                }
                if self.table_depth == 0 {
                    self.blocks.push(text.to_string());
                } else {
                    if !self.cell.is_empty() {
                        self.cell.push('\n');
                    }
                    self.cell.push_str(text);
                }
            }
            b"tc" if self.table_depth == 1 => {
                let cell = std::mem::take(&mut self.cell);
                if !cell.trim().is_empty() {
                    self.cells.push(cell.trim().to_string());
                }
            }
            b"tr" if self.table_depth == 1 => {
                if !self.cells.is_empty() {
                    self.rows.push(self.cells.join(" | "));
                }
                self.cells.clear();
            }
            b"tbl" => {
                self.table_depth = self.table_depth.saturating_sub(1);
                if self.table_depth == 0 && !self.rows.is_empty() {
                    self.blocks.push(self.rows.join("\n"));
                    self.rows.clear();
                }
            }
            _ => {}
        }
    }
}

fn structured_text(xml: &[u8]) -> std::result::Result<Extracted, String> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut walker = Walker::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => walker.start(e.local_name().as_ref()),
            Ok(Event::Empty(e)) => walker.empty(e.local_name().as_ref()),
            Ok(Event::End(e)) => walker.end(e.local_name().as_ref()),
            Ok(Event::Text(te)) if walker.in_text => {
                let text = te.unescape().map_err(|e| e.to_string())?;
                walker.paragraph.push_str(&text);
            }
            Ok(Event::CData(cd)) if walker.in_text => {
                walker
                    .paragraph
                    .push_str(&String::from_utf8_lossy(cd.as_ref()));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML error at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(Extracted {
        text: walker.blocks.join("\n\n"),
        page_count: None,
    })
}

/// Collect `<w:t>` run contents without parsing the document tree.
fn scan_text_runs(xml: &[u8]) -> std::result::Result<Extracted, String> {
    let xml = String::from_utf8_lossy(xml);
    let mut runs = Vec::new();
    let mut rest = xml.as_ref();
    while let Some(pos) = rest.find("<w:t") {
        rest = &rest[pos + 4..];
        // Skip <w:tab/>, <w:tbl> and friends.
        let Some(open_end) = rest.find('>') else {
            break;
        };
        let attrs = &rest[..open_end];
        if !(attrs.is_empty() || attrs.starts_with(' ')) || attrs.ends_with('/') {
            continue;
        }
        rest = &rest[open_end + 1..];
        let Some(close) = rest.find("</w:t>") else {
            break;
        };
        let raw = &rest[..close];
        let text = quick_xml::escape::unescape(raw)
            .map(|t| t.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        if !text.trim().is_empty() {
            runs.push(text);
        }
        rest = &rest[close + 6..];
    }
    if runs.is_empty() {
        return Err("no <w:t> runs found".to_string());
    }
    Ok(Extracted {
        text: runs.join(" "),
        page_count: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    fn body(inner: &str) -> Vec<u8> {
        format!(r#"<?xml version="1.0"?><w:document {}><w:body>{}</w:body></w:document>"#, NS, inner)
            .into_bytes()
    }

    #[test]
    fn test_paragraphs_and_table_in_order() {
        let xml = body(concat!(
            "<w:p><w:r><w:t>Intro</w:t></w:r><w:r><w:t xml:space=\"preserve\"> text</w:t></w:r></w:p>",
            "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>A</w:t></w:r></w:p></w:tc>",
            "<w:tc><w:p/></w:tc><w:tc><w:p><w:r><w:t>B</w:t></w:r></w:p></w:tc></w:tr>",
            "<w:tr><w:tc><w:p><w:r><w:t>C</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
            "<w:p><w:r><w:t>Tom &amp; Jerry</w:t><w:tab/><w:t>end</w:t></w:r></w:p>",
        ));
        let out = structured_text(&xml).unwrap();
        assert_eq!(out.text, "Intro text\n\nA | B\nC\n\nTom & Jerry\tend");
    }

    #[test]
    fn test_line_breaks_and_empty_paragraphs() {
        let xml = body("<w:p/><w:p><w:r><w:t>one</w:t><w:br/><w:t>two</w:t></w:r></w:p><w:p></w:p>");
        let out = structured_text(&xml).unwrap();
        assert_eq!(out.text, "one\ntwo");
    }

    #[test]
    fn test_scan_skips_tab_and_table_tags() {
        let xml = br#"<w:tbl><w:p><w:t>alpha</w:t><w:tab/><w:t xml:space="preserve">b &lt; c</w:t></w:p>"#;
        let out = scan_text_runs(xml).unwrap();
        assert_eq!(out.text, "alpha b < c");
    }

    #[test]
    fn test_scan_without_runs_errors() {
        assert!(scan_text_runs(b"<w:document/>").is_err());
    }
}
