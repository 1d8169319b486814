//! Deterministic text similarity scoring.
//!
//! Embeddings are hashed bag-of-token vectors: each token hashes to a slot
//! and a sign, the vector is L2-normalized, and similarity is cosine. This
//! gives threshold-stable scores without an embedding service; callers that
//! have real embeddings implement the repository trait over them instead.

/// Dimension of stored embedding vectors.
pub(crate) const EMBEDDING_DIM: usize = 256;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a_hash(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Lowercased alphanumeric tokens of `text`.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Embed `text` into a normalized fixed-dimension vector.
pub(crate) fn embed_text(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimensions.max(1)];

    for token in tokenize(text) {
        let hash = fnv1a_hash(token.as_bytes());
        let slot = (hash % vector.len() as u64) as usize;
        let sign = if hash & 1 == 0 { 1.0 } else { -1.0 };
        vector[slot] += sign;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }

    vector
}

/// Cosine similarity of two vectors; 0.0 on dimension mismatch or zero norm.
pub(crate) fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_left = 0.0f32;
    let mut norm_right = 0.0f32;
    for (l, r) in left.iter().zip(right.iter()) {
        dot += l * r;
        norm_left += l * l;
        norm_right += r * r;
    }

    if norm_left == 0.0 || norm_right == 0.0 {
        return 0.0;
    }

    dot / (norm_left.sqrt() * norm_right.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_and_lowercases() {
        assert_eq!(tokenize("Hello, World-42!"), vec!["hello", "world", "42"]);
        assert!(tokenize("...").is_empty());
    }

    #[test]
    fn identical_text_scores_one() {
        let a = embed_text("crash on save in editor", EMBEDDING_DIM);
        let b = embed_text("crash on save in editor", EMBEDDING_DIM);
        let score = cosine_similarity(&a, &b);
        assert!((score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn unrelated_text_scores_low() {
        let a = embed_text("database connection pooling strategy", EMBEDDING_DIM);
        let b = embed_text("favourite pasta recipes from rome", EMBEDDING_DIM);
        let score = cosine_similarity(&a, &b);
        assert!(score < 0.5, "score was {}", score);
    }

    #[test]
    fn overlapping_text_scores_between() {
        let a = embed_text("null pointer exception on save", EMBEDDING_DIM);
        let b = embed_text("null pointer exception on load", EMBEDDING_DIM);
        let score = cosine_similarity(&a, &b);
        assert!(score > 0.5 && score < 1.0, "score was {}", score);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let zero = embed_text("", EMBEDDING_DIM);
        assert!(zero.iter().all(|v| *v == 0.0));
        let other = embed_text("anything", EMBEDDING_DIM);
        assert_eq!(cosine_similarity(&zero, &other), 0.0);
    }

    #[test]
    fn mismatched_dimensions_score_zero() {
        let a = embed_text("text", 64);
        let b = embed_text("text", 128);
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
