//! PowerPoint (.pptx) extraction (spec §4.1): one page record per slide,
//! text runs concatenated in document order from `ppt/slides/slideN.xml`.

use std::io::Read;
use std::path::Path;

use chunk_model::PageRecord;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use zip::ZipArchive;

use crate::error::ExtractError;

pub fn extract(path: &Path, source: &str) -> Result<Vec<PageRecord>, ExtractError> {
    let file = std::fs::File::open(path).map_err(|e| ExtractError::Io { path: path.display().to_string(), source: e })?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Parse { format: "pptx", message: e.to_string() })?;

    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(|n| n.to_string())
        .collect();
    slide_names.sort_by_key(|n| slide_number(n));

    let mut pages = Vec::with_capacity(slide_names.len());
    for (idx, name) in slide_names.iter().enumerate() {
        let mut xml = String::new();
        archive
            .by_name(name)
            .map_err(|e| ExtractError::Parse { format: "pptx", message: e.to_string() })?
            .read_to_string(&mut xml)
            .map_err(|e| ExtractError::Io { path: path.display().to_string(), source: e })?;

        let text = text_runs_from_xml(&xml)?;
        pages.push(PageRecord::new(source, (idx + 1) as u32, text));
    }

    if pages.is_empty() {
        pages.push(PageRecord::new(source, 1, String::new()));
    }
    Ok(pages)
}

fn slide_number(name: &str) -> u32 {
    name.trim_start_matches("ppt/slides/slide")
        .trim_end_matches(".xml")
        .parse()
        .unwrap_or(u32::MAX)
}

fn text_runs_from_xml(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"t" => in_text = false,
            Ok(Event::Text(t)) if in_text => {
                current.push_str(&t.unescape().map_err(|e| ExtractError::Parse { format: "pptx", message: e.to_string() })?);
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"p" => {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Parse { format: "pptx", message: e.to_string() }),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        lines.push(current);
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slide_numbers_sort_numerically_not_lexically() {
        let mut names = vec!["ppt/slides/slide10.xml".to_string(), "ppt/slides/slide2.xml".to_string()];
        names.sort_by_key(|n| slide_number(n));
        assert_eq!(names[0], "ppt/slides/slide2.xml");
    }

    #[test]
    fn extracts_paragraph_text_runs_in_order() {
        let xml = r#"<p:sld xmlns:a="a"><a:p><a:r><a:t>Hello</a:t></a:r></a:p><a:p><a:r><a:t>World</a:t></a:r></a:p></p:sld>"#;
        let text = text_runs_from_xml(xml).unwrap();
        assert_eq!(text, "Hello\nWorld");
    }
}
