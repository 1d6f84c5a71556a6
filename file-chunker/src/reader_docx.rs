//! Word (.docx) extraction (spec §4.1): a paragraph walk over
//! `word/document.xml`, folded into synthetic pages at the 1000-character
//! boundary since OOXML does not record page breaks directly.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chunk_model::PageRecord;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use zip::ZipArchive;

use crate::error::ExtractError;

const SYNTHETIC_PAGE_CHARS: usize = 1000;

pub fn extract(path: &Path, source: &str) -> Result<Vec<PageRecord>, ExtractError> {
    let file = File::open(path).map_err(|e| ExtractError::Io { path: path.display().to_string(), source: e })?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Parse { format: "docx", message: e.to_string() })?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Parse { format: "docx", message: e.to_string() })?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Io { path: path.display().to_string(), source: e })?;

    let paragraphs = paragraphs_from_xml(&xml)?;
    Ok(fold_into_synthetic_pages(source, &paragraphs))
}

fn paragraphs_from_xml(xml: &str) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"t" => in_text = false,
            Ok(Event::Text(t)) if in_text => {
                current.push_str(&t.unescape().map_err(|e| ExtractError::Parse { format: "docx", message: e.to_string() })?);
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"p" => {
                paragraphs.push(std::mem::take(&mut current));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Parse { format: "docx", message: e.to_string() }),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs.into_iter().filter(|p| !p.trim().is_empty()).collect())
}

fn fold_into_synthetic_pages(source: &str, paragraphs: &[String]) -> Vec<PageRecord> {
    let mut pages = Vec::new();
    let mut current = String::new();
    let mut page_no = 1u32;

    for paragraph in paragraphs {
        if !current.is_empty() && current.len() + paragraph.len() > SYNTHETIC_PAGE_CHARS {
            pages.push(PageRecord::new(source, page_no, std::mem::take(&mut current)));
            page_no += 1;
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        pages.push(PageRecord::new(source, page_no, current));
    }
    if pages.is_empty() {
        pages.push(PageRecord::new(source, 1, String::new()));
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_document_is_a_single_page() {
        let paragraphs = vec!["hello".to_string(), "world".to_string()];
        let pages = fold_into_synthetic_pages("a.docx", &paragraphs);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].content, "hello\nworld");
    }

    #[test]
    fn long_document_splits_at_character_boundary() {
        let paragraphs: Vec<String> = (0..5).map(|_| "x".repeat(400)).collect();
        let pages = fold_into_synthetic_pages("a.docx", &paragraphs);
        assert!(pages.len() >= 2);
    }
}
