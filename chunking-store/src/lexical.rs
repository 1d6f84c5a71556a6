//! Tantivy-backed lexical (BM25-class) index, one per process, scoped by
//! `collection_id` at query time via a boolean filter term.
//!
//! Grounded on the teacher's `tantivy_index.rs`: same schema shape (a TEXT
//! content field plus STRING/STORED id fields), same sigmoid score
//! normalization, same in-RAM index with a reload-on-commit reader.

use chunk_model::{ChunkId, ChunkRecord, CollectionId};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Schema, Field, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter};

use crate::error::StoreError;

pub struct LexicalIndex {
    index: Index,
    reader: IndexReader,
    f_text: Field,
    f_chunk_id: Field,
    f_collection_id: Field,
}

pub struct LexicalMatch {
    pub chunk_id: ChunkId,
    pub score: f32,
}

impl LexicalIndex {
    pub fn new_ram() -> Result<Self, StoreError> {
        let mut schema_builder = Schema::builder();
        let f_text = schema_builder.add_text_field("text", TEXT);
        let f_chunk_id = schema_builder.add_text_field("chunk_id", STRING | STORED);
        let f_collection_id = schema_builder.add_text_field("collection_id", STRING);
        let schema = schema_builder.build();
        let index = Index::create_in_ram(schema);
        let reader = index.reader().map_err(|e| StoreError::Lexical(e.to_string()))?;
        Ok(Self { index, reader, f_text, f_chunk_id, f_collection_id })
    }

    pub fn upsert(&self, records: &[ChunkRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut writer: IndexWriter = self.index.writer(50_000_000).map_err(|e| StoreError::Lexical(e.to_string()))?;
        for rec in records {
            let document = doc!(
                self.f_chunk_id => rec.id.to_string(),
                self.f_collection_id => rec.collection_id.0.to_string(),
                self.f_text => rec.content.clone(),
            );
            writer.add_document(document).map_err(|e| StoreError::Lexical(e.to_string()))?;
        }
        writer.commit().map_err(|e| StoreError::Lexical(e.to_string()))?;
        self.reader.reload().map_err(|e| StoreError::Lexical(e.to_string()))?;
        Ok(())
    }

    /// Searches `query` restricted to `collection_ids`, returning up to
    /// `limit` matches with scores normalized to (0, 1) via a sigmoid.
    pub fn search(&self, query: &str, collection_ids: &[CollectionId], limit: usize) -> Result<Vec<LexicalMatch>, StoreError> {
        if query.trim().is_empty() || limit == 0 || collection_ids.is_empty() {
            return Ok(Vec::new());
        }
        let scope = collection_ids
            .iter()
            .map(|c| format!("collection_id:\"{}\"", c.0))
            .collect::<Vec<_>>()
            .join(" OR ");
        let full_query = format!("({}) AND ({})", escape_free_text(query), scope);

        let parser = QueryParser::for_index(&self.index, vec![self.f_text, self.f_collection_id]);
        let parsed = match parser.parse_query(&full_query) {
            Ok(q) => q,
            Err(_) => return Ok(Vec::new()),
        };
        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&parsed, &TopDocs::with_limit(limit.saturating_mul(4).max(limit)))
            .map_err(|e| StoreError::Lexical(e.to_string()))?;

        let mut out = Vec::with_capacity(top_docs.len());
        for (raw_score, addr) in top_docs {
            if let Ok(d) = searcher.doc::<tantivy::schema::document::TantivyDocument>(addr) {
                if let Some(tantivy::schema::OwnedValue::Str(cid)) = d.get_first(self.f_chunk_id) {
                    if let Ok(uuid) = uuid::Uuid::parse_str(cid) {
                        let score = 1.0f32 / (1.0f32 + (-raw_score).exp());
                        out.push(LexicalMatch { chunk_id: ChunkId(uuid), score });
                    }
                }
            }
        }
        out.truncate(limit);
        Ok(out)
    }
}

fn escape_free_text(q: &str) -> String {
    format!("\"{}\"", q.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chunk_model::ChunkMetadata;

    fn rec(collection_id: CollectionId, content: &str) -> ChunkRecord {
        ChunkRecord {
            id: ChunkId::new(),
            collection_id,
            content: content.into(),
            metadata: ChunkMetadata::new("a.pdf", 1, content.len()),
            dense_vector: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn search_is_scoped_to_collection() {
        let index = LexicalIndex::new_ram().unwrap();
        let c1 = CollectionId(1);
        let c2 = CollectionId(2);
        let r1 = rec(c1, "pumpkin spice latte recipe");
        let r2 = rec(c2, "pumpkin spice latte recipe");
        let id1 = r1.id;
        index.upsert(&[r1, r2]).unwrap();

        let hits = index.search("pumpkin latte", &[c1], 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, id1);
    }

    #[test]
    fn empty_query_returns_no_matches() {
        let index = LexicalIndex::new_ram().unwrap();
        assert!(index.search("", &[CollectionId(1)], 10).unwrap().is_empty());
    }
}
