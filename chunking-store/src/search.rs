//! Hybrid retrieval (spec §4.5): fuses lexical and dense-vector scores,
//! applies the similarity threshold, and returns a ranked, capped result set.

use std::collections::HashMap;

use chunk_model::{ChunkId, ChunkRecord, CollectionId};

use crate::error::StoreError;
use crate::lexical::LexicalIndex;
use crate::repo::ChunkRepo;
use crate::vector::cosine_similarity;

const LEXICAL_WEIGHT: f32 = 0.3;
const VECTOR_WEIGHT: f32 = 0.7;
const LEXICAL_CANDIDATE_FLOOR: f32 = 0.1;

pub struct SearchHit {
    pub chunk: ChunkRecord,
    pub combined_score: f32,
    pub lexical_score: f32,
    pub vector_score: f32,
}

/// `query_vector` is `None` when the caller has no embedder configured for
/// this request; lexical-only search still applies.
pub fn hybrid_search(
    repo: &ChunkRepo,
    lexical_index: &LexicalIndex,
    collection_ids: &[CollectionId],
    query_text: &str,
    query_vector: Option<&[f32]>,
    threshold: f32,
    top_k: usize,
) -> Result<Vec<SearchHit>, StoreError> {
    if collection_ids.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let lexical_hits = lexical_index.search(query_text, collection_ids, top_k.saturating_mul(8).max(top_k))?;
    let mut lexical_scores: HashMap<ChunkId, f32> = HashMap::new();
    for hit in lexical_hits {
        lexical_scores.insert(hit.chunk_id, hit.score);
    }

    let candidates = repo.chunks_in_collections(collection_ids)?;

    let mut scored = Vec::new();
    for chunk in candidates {
        let lexical_score = lexical_scores.get(&chunk.id).copied().unwrap_or(0.0);
        let vector_score = match query_vector {
            Some(qv) if !chunk.dense_vector.is_empty() => cosine_similarity(qv, &chunk.dense_vector),
            _ => 0.0,
        };

        let has_vector = query_vector.is_some() && !chunk.dense_vector.is_empty();
        let is_candidate = lexical_score > LEXICAL_CANDIDATE_FLOOR || (has_vector && vector_score >= threshold);
        if !is_candidate {
            continue;
        }

        let combined_score = match (lexical_score > 0.0, has_vector) {
            (true, true) => LEXICAL_WEIGHT * lexical_score + VECTOR_WEIGHT * vector_score,
            (true, false) => lexical_score,
            (false, true) => vector_score,
            (false, false) => 0.0,
        };

        if combined_score < threshold {
            continue;
        }

        scored.push(SearchHit { chunk, combined_score, lexical_score, vector_score });
    }

    scored.sort_by(|a, b| {
        b.vector_score
            .partial_cmp(&a.vector_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.lexical_score.partial_cmp(&a.lexical_score).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.chunk.created_at.cmp(&b.chunk.created_at))
    });
    scored.truncate(top_k);
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chunk_model::ChunkMetadata;

    fn setup() -> (ChunkRepo, LexicalIndex, CollectionId) {
        let repo = ChunkRepo::new(crate::pool::init_pool(":memory:", 4).unwrap());
        let lexical = LexicalIndex::new_ram().unwrap();
        let cid = repo.create_collection("docs", "alice").unwrap();
        (repo, lexical, cid)
    }

    fn chunk(cid: CollectionId, content: &str, vector: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            id: ChunkId::new(),
            collection_id: cid,
            content: content.into(),
            metadata: ChunkMetadata::new("a.pdf", 1, content.len()),
            dense_vector: vector,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn below_threshold_results_are_excluded() {
        let (repo, lexical, cid) = setup();
        let c = chunk(cid, "totally unrelated filler text", vec![0.0, 1.0]);
        repo.insert_chunks(&[c.clone()]).unwrap();
        lexical.upsert(&[c]).unwrap();

        let hits = hybrid_search(&repo, &lexical, &[cid], "pumpkin spice", Some(&[1.0, 0.0]), 0.5, 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn lexical_and_vector_hit_is_combined_with_fixed_weights() {
        let (repo, lexical, cid) = setup();
        let c = chunk(cid, "pumpkin spice latte", vec![1.0, 0.0]);
        repo.insert_chunks(&[c.clone()]).unwrap();
        lexical.upsert(&[c]).unwrap();

        let hits = hybrid_search(&repo, &lexical, &[cid], "pumpkin spice latte", Some(&[1.0, 0.0]), 0.1, 5).unwrap();
        assert_eq!(hits.len(), 1);
        let expected = 0.3 * hits[0].lexical_score + 0.7 * hits[0].vector_score;
        assert!((hits[0].combined_score - expected).abs() < 1e-6);
    }
}
