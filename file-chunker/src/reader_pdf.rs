//! PDF, HWP and HWPX extraction (spec §4.1).
//!
//! PDF text comes from `lopdf`'s built-in per-page extraction; any run of
//! adjacent lines that look like aligned columns is additionally rendered
//! as a Markdown table beneath the plain text, since table structure is
//! otherwise lost in a flat text dump. HWP/HWPX have no pure-Rust parser in
//! this workspace, so both always take the plain-text decode fallback.

use std::path::Path;

use chunk_model::PageRecord;

use crate::error::ExtractError;
use crate::reader_txt::decode_bytes;

#[cfg(feature = "pure-pdf")]
pub fn extract_pdf(path: &Path, source: &str) -> Result<Vec<PageRecord>, ExtractError> {
    let doc = lopdf::Document::load(path).map_err(|e| ExtractError::Parse { format: "pdf", message: e.to_string() })?;

    let mut page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    page_numbers.sort_unstable();

    let mut pages = Vec::with_capacity(page_numbers.len());
    for page_no in page_numbers {
        let text = doc
            .extract_text(&[page_no])
            .unwrap_or_default();
        let content = render_tables_as_markdown(&text);
        pages.push(PageRecord::new(source, page_no, content));
    }

    if pages.is_empty() {
        pages.push(PageRecord::new(source, 1, String::new()));
    }
    Ok(pages)
}

#[cfg(not(feature = "pure-pdf"))]
pub fn extract_pdf(_path: &Path, _source: &str) -> Result<Vec<PageRecord>, ExtractError> {
    Err(ExtractError::UnsupportedType("pdf (pure-pdf feature disabled)".to_string()))
}

/// HWP and HWPX have no maintained pure-Rust parser available, so these
/// formats fall back to a raw byte decode: legible for HWPX (which is a
/// zipped XML container with readable fragments) and degraded but non-fatal
/// for binary HWP.
pub fn extract_hwp_fallback(path: &Path, source: &str) -> Result<Vec<PageRecord>, ExtractError> {
    tracing::warn!(path = %path.display(), "HWP/HWPX extraction using plain-text fallback, structure will be lost");
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io { path: path.display().to_string(), source: e })?;
    let text = decode_bytes(&bytes);
    Ok(vec![PageRecord::new(source, 1, text)])
}

/// Detects runs of 3+ consecutive lines that split into the same number of
/// whitespace-separated columns (2+) and renders them as a Markdown table
/// appended after the original text.
fn render_tables_as_markdown(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut tables = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let cols = lines[i].split_whitespace().count();
        if cols < 2 {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < lines.len() && lines[j].split_whitespace().count() == cols {
            j += 1;
        }
        if j - i >= 3 {
            tables.push(lines_to_markdown_table(&lines[i..j]));
            i = j;
        } else {
            i += 1;
        }
    }

    if tables.is_empty() {
        text.to_string()
    } else {
        format!("{text}\n\n{}", tables.join("\n\n"))
    }
}

fn lines_to_markdown_table(lines: &[&str]) -> String {
    let rows: Vec<Vec<&str>> = lines.iter().map(|l| l.split_whitespace().collect()).collect();
    let cols = rows[0].len();
    let mut out = String::new();
    out.push_str(&format!("| {} |\n", rows[0].join(" | ")));
    out.push_str(&format!("|{}|\n", "---|".repeat(cols)));
    for row in &rows[1..] {
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_columns_become_a_markdown_table() {
        let text = "intro line\nname qty price\nfoo 1 2.50\nbar 2 3.00\nbaz 3 1.25";
        let rendered = render_tables_as_markdown(text);
        assert!(rendered.contains("| name | qty | price |"));
        assert!(rendered.contains("foo | 1 | 2.50"));
    }

    #[test]
    fn plain_prose_is_left_unchanged() {
        let text = "this is just a normal paragraph\nwith ordinary sentences\nand no tabular data here";
        assert_eq!(render_tables_as_markdown(text), text);
    }
}
