//! Hybrid retrieval orchestration (component C5, spec §4.5): resolves
//! collection names, tokenizes and embeds the query, calls the store's
//! fused search, and applies the optional per-source filter.

use std::collections::HashSet;

use chunking_store::{ChunkRepo, LexicalIndex};
use embedding_provider::Embedder;
use serde::Serialize;
use tracing::warn;

use crate::error::ServiceError;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct SourceFilter {
    pub collection: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievedPassage {
    pub content: String,
    pub source: String,
    pub page: u32,
    pub collection: String,
    pub score: f32,
}

pub struct Retriever<'a> {
    repo: &'a ChunkRepo,
    lexical: &'a LexicalIndex,
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    pub fn new(repo: &'a ChunkRepo, lexical: &'a LexicalIndex, embedder: &'a dyn Embedder) -> Self {
        Self { repo, lexical, embedder }
    }

    /// Runs hybrid search across `collection_names`, dropping any name that
    /// does not resolve (spec §4.5 step 1: "drop unknown names (warn)").
    /// `collection_names` is expected to already be ACL-filtered by the
    /// caller (spec §4.10 step 3 delegates ACL enforcement to C8 before
    /// calling C5).
    pub fn search(
        &self,
        collection_names: &[String],
        query: &str,
        source_filter: &[SourceFilter],
        threshold: f32,
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, ServiceError> {
        let mut collection_ids = Vec::new();
        let mut id_to_name = std::collections::HashMap::new();
        for name in collection_names {
            match self.repo.collection_id_by_name(name)? {
                Some(id) => {
                    collection_ids.push(id);
                    id_to_name.insert(id, name.clone());
                }
                None => warn!(collection = %name, "search referenced an unknown collection, dropping"),
            }
        }
        if collection_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_one(query)?;
        let hits = chunking_store::hybrid_search(
            self.repo,
            self.lexical,
            &collection_ids,
            query,
            Some(&query_vector),
            threshold,
            top_k,
        )?;

        let allowed: Option<HashSet<(&str, &str)>> = if source_filter.is_empty() {
            None
        } else {
            Some(source_filter.iter().map(|f| (f.collection.as_str(), f.source.as_str())).collect())
        };

        let mut passages = Vec::new();
        for hit in hits {
            let collection_name = id_to_name.get(&hit.chunk.collection_id).cloned().unwrap_or_default();
            if let Some(allowed) = &allowed {
                if !allowed.contains(&(collection_name.as_str(), hit.chunk.metadata.source.as_str())) {
                    continue;
                }
            }
            passages.push(RetrievedPassage {
                content: hit.chunk.content,
                source: hit.chunk.metadata.source,
                page: hit.chunk.metadata.page,
                collection: collection_name,
                score: hit.combined_score,
            });
        }
        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk_model::{ChunkId, ChunkMetadata, ChunkRecord};
    use embedding_provider::embedder::DeterministicEmbedder;

    #[test]
    fn unknown_collection_names_are_dropped_not_fatal() {
        let repo = ChunkRepo::new(chunking_store::init_pool(":memory:", 4).unwrap());
        let lexical = LexicalIndex::new_ram().unwrap();
        let embedder = DeterministicEmbedder::new(8, "t", 4096).unwrap();
        let retriever = Retriever::new(&repo, &lexical, &embedder);

        let results = retriever.search(&["does-not-exist".to_string()], "anything", &[], 0.5, 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn source_filter_excludes_non_matching_chunks() {
        let repo = ChunkRepo::new(chunking_store::init_pool(":memory:", 4).unwrap());
        let lexical = LexicalIndex::new_ram().unwrap();
        let embedder = DeterministicEmbedder::new(8, "t", 4096).unwrap();
        let cid = repo.create_collection("proj-a", "alice").unwrap();

        let vector = embedder.embed_one("brief contents about quarterly results").unwrap();
        let chunk = ChunkRecord {
            id: ChunkId::new(),
            collection_id: cid,
            content: "brief contents about quarterly results".into(),
            metadata: ChunkMetadata::new("brief.pdf", 1, 40),
            dense_vector: vector,
            created_at: chrono::Utc::now(),
        };
        repo.insert_chunks(&[chunk.clone()]).unwrap();
        lexical.upsert(&[chunk]).unwrap();

        let retriever = Retriever::new(&repo, &lexical, &embedder);
        let filter = vec![SourceFilter { collection: "proj-a".to_string(), source: "other.pdf".to_string() }];
        let results = retriever
            .search(&["proj-a".to_string()], "brief contents about quarterly results", &filter, 0.0, 5)
            .unwrap();
        assert!(results.is_empty());
    }
}
