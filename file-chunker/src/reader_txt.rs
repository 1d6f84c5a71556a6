//! Plain text, Markdown and HTML extraction (spec §4.1). Reads the raw
//! bytes as UTF-8 first, falling back to CP949 (common for legacy Korean
//! documents) when UTF-8 decoding fails.

use std::path::Path;

use chunk_model::PageRecord;

use crate::error::ExtractError;

pub fn read_decoded(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io { path: path.display().to_string(), source: e })?;
    Ok(decode_bytes(&bytes))
}

pub fn decode_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, had_errors) = encoding_rs::EUC_KR.decode(bytes);
            if had_errors {
                tracing::warn!("CP949/EUC-KR fallback decoding still reported errors");
            }
            decoded.into_owned()
        }
    }
}

pub fn extract_plain_text(path: &Path, source: &str) -> Result<Vec<PageRecord>, ExtractError> {
    let text = read_decoded(path)?;
    Ok(vec![PageRecord::new(source, 1, text)])
}

pub fn extract_markdown(path: &Path, source: &str) -> Result<Vec<PageRecord>, ExtractError> {
    use pulldown_cmark::{Event, Parser};
    let raw = read_decoded(path)?;
    let mut text = String::new();
    for event in Parser::new(&raw) {
        match event {
            Event::Text(t) | Event::Code(t) => {
                text.push_str(&t);
                text.push(' ');
            }
            Event::SoftBreak | Event::HardBreak | Event::End(_) => text.push('\n'),
            _ => {}
        }
    }
    Ok(vec![PageRecord::new(source, 1, text)])
}

pub fn extract_html(path: &Path, source: &str) -> Result<Vec<PageRecord>, ExtractError> {
    use scraper::{Html, Selector};
    let raw = read_decoded(path)?;
    let document = Html::parse_document(&raw);
    let body_selector = Selector::parse("body").map_err(|e| ExtractError::Parse { format: "html", message: e.to_string() })?;
    let text = match document.select(&body_selector).next() {
        Some(body) => body.text().collect::<Vec<_>>().join(" "),
        None => document.root_element().text().collect::<Vec<_>>().join(" "),
    };
    Ok(vec![PageRecord::new(source, 1, normalize_whitespace(&text))])
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_valid_utf8_directly() {
        assert_eq!(decode_bytes("hello".as_bytes()), "hello");
    }
}
