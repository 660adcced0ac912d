//! Deterministic feature-hashing embeddings.
//!
//! Each lowercased alphanumeric token is hashed with SHA-256; the first four
//! digest bytes pick a bucket and the fifth picks the sign. The summed vector
//! is L2-normalised, so texts sharing vocabulary have high cosine similarity.
//! Needs no model download, which makes it the provider for offline runs and
//! tests.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;
use crate::error::EmbedError;

pub struct HashingProvider {
    dims: usize,
}

impl HashingProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let bucket =
                u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
                    % self.dims;
            let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn same_text_same_vector() {
        let p = HashingProvider::new(128);
        assert_eq!(p.embed_text("Photosynthesis"), p.embed_text("photosynthesis"));
    }

    #[test]
    fn vectors_are_unit_length() {
        let p = HashingProvider::new(64);
        let v = p.embed_text("the quick brown fox");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let p = HashingProvider::new(16);
        assert!(p.embed_text("  ...  ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn shared_vocabulary_ranks_closer() {
        let p = HashingProvider::new(256);
        let query = p.embed_text("chlorophyll absorbs light");
        let related = p.embed_text("Chlorophyll absorbs red and blue light in plants.");
        let unrelated = p.embed_text("The treaty was signed in seventeen eighty three.");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }
}
