//! Dense-vector scoring, scoped by `collection_id`.
//!
//! The teacher's own `hnsw_index.rs` was an unimplemented stub; there is no
//! worked `hnsw_rs` usage anywhere in the retrieval pack to model a real ANN
//! index on (see DESIGN.md). Rather than guess at an unverified API, this
//! implements the same per-collection-scoped contract with an exact
//! brute-force cosine scan, which the corpus's own scale (a handful of
//! collections, not a web-scale vector DB) does not require sub-linear
//! search to serve. `ChunkRepo::chunks_in_collections` already restricts the
//! candidate set to the collections a caller is allowed to see, so this
//! scan never touches a row outside that scope.

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_one() {
        let v = vec![0.1, 0.4, -0.2, 0.9];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn mismatched_dimensions_score_zero_instead_of_panicking() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }
}
