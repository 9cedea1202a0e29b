//! Feature-hashing embedder
//!
//! Hashes terms into fixed-dimension buckets weighted by term frequency. Not as semantically
//! rich as a neural model, but deterministic and always available, which makes it the default
//! for local installs and tests.

use async_trait::async_trait;
use ragnest_core::error::{RagError, Result};
use std::collections::HashMap;

use crate::ports::Embedder;

const MODEL_NAME: &str = "hash-tf";

/// Deterministic bag-of-words embedder
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::ConfigInvalid {
                key: "embedding_dim".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(Self { dimensions })
    }

    /// FNV-1a over the term bytes
    fn bucket(&self, term: &str) -> (usize, f32) {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        // High bit picks the sign so unrelated terms cancel rather than pile up
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        ((h as usize) % self.dimensions, sign)
    }

    fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase())
    }

    /// Embed one text; empty input maps to the zero vector
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut tf: HashMap<String, f32> = HashMap::new();
        for term in Self::tokenize(text) {
            *tf.entry(term).or_default() += 1.0;
        }

        let mut vec = vec![0.0f32; self.dimensions];
        for (term, count) in &tf {
            let (bucket, sign) = self.bucket(term);
            vec[bucket] += sign * (1.0 + count.ln());
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }
}
