//! Text extraction and chunking (components C1/C4 of the data model):
//! dispatch a file to the reader matching its extension, then split every
//! extracted page into bounded, overlapping chunks ready for embedding.

pub mod error;
pub mod reader_docx;
pub mod reader_excel;
pub mod reader_pdf;
pub mod reader_pptx;
pub mod reader_txt;
pub mod segmenter;

use std::path::Path;

use chunk_model::{ChunkMetadata, PageRecord};

pub use error::ExtractError;

pub const DEFAULT_CHUNK_SIZE: usize = 2048;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// A chunk produced from a source file, prior to embedding or collection
/// assignment (both happen downstream, once an embedder and a target
/// collection are known).
#[derive(Debug, Clone)]
pub struct RawChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Extracts `path` into an ordered sequence of page records, dispatching on
/// its extension (spec §4.1). `source` is the basename recorded on each
/// page and, later, on every chunk derived from it.
pub fn extract_pages(path: &Path, source: &str) -> Result<Vec<PageRecord>, ExtractError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let pages = match ext.as_str() {
        "txt" => reader_txt::extract_plain_text(path, source)?,
        "md" | "markdown" => reader_txt::extract_markdown(path, source)?,
        "html" | "htm" => reader_txt::extract_html(path, source)?,
        "docx" => reader_docx::extract(path, source)?,
        "pptx" => reader_pptx::extract(path, source)?,
        "xlsx" | "xls" | "ods" => reader_excel::extract(path, source)?,
        "pdf" => reader_pdf::extract_pdf(path, source)?,
        "hwp" | "hwpx" => reader_pdf::extract_hwp_fallback(path, source)?,
        other => return Err(ExtractError::UnsupportedType(other.to_string())),
    };

    if pages.iter().all(|p| p.content.trim().is_empty()) {
        tracing::warn!(%source, "extraction produced no text");
    }
    Ok(pages)
}

/// Extracts and chunks `path` in one pass, using the data model's default
/// `CHUNK_SIZE`/`CHUNK_OVERLAP`. Each chunk carries its originating
/// `source`/`page` and a fresh `processed_at` timestamp (spec §4.4).
pub fn chunk_file(path: &Path, source: &str) -> Result<Vec<RawChunk>, ExtractError> {
    chunk_file_with(path, source, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
}

pub fn chunk_file_with(
    path: &Path,
    source: &str,
    target_size: usize,
    overlap: usize,
) -> Result<Vec<RawChunk>, ExtractError> {
    let pages = extract_pages(path, source)?;
    Ok(chunk_pages(&pages, target_size, overlap))
}

/// Splits already-extracted pages into chunks, without touching the
/// filesystem. Exposed separately so callers that already hold page
/// records (e.g. a re-chunk with different parameters) skip re-extraction.
pub fn chunk_pages(pages: &[PageRecord], target_size: usize, overlap: usize) -> Vec<RawChunk> {
    let mut chunks = Vec::new();
    for page in pages {
        for piece in segmenter::split_into_chunks(&page.content, target_size, overlap) {
            let metadata = ChunkMetadata::new(page.source.clone(), page.page, piece.chars().count());
            chunks.push(RawChunk { content: piece, metadata });
        }
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_extension_is_rejected() {
        let result = extract_pages(Path::new("file.exe"), "file.exe");
        assert!(matches!(result, Err(ExtractError::UnsupportedType(_))));
    }

    #[test]
    fn chunk_pages_stamps_source_and_page_onto_every_chunk() {
        let pages = vec![PageRecord::new("a.txt", 1, "word ".repeat(500))];
        let chunks = chunk_pages(&pages, 200, 20);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.metadata.source == "a.txt" && c.metadata.page == 1));
    }
}
