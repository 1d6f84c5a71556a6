//! Extractor output: one record per logical page before chunking.

use serde::{Deserialize, Serialize};

/// A page (or synthetic page, for non-paginated formats) produced by the
/// text extractor. `source` is the original filename basename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub source: String,
    pub page: u32,
    pub content: String,
}

impl PageRecord {
    pub fn new(source: impl Into<String>, page: u32, content: impl Into<String>) -> Self {
        Self { source: source.into(), page, content: content.into() }
    }
}
