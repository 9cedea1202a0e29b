//! Exhaustive L2 index over fixed-dimension vectors

use ragnest_core::error::{RagError, Result};
use serde::{Deserialize, Serialize};

/// Row-major vector table searched by brute force
///
/// Vector ids are row positions; rows are only ever appended or rebuilt wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatL2Index {
    dimensions: usize,
    vectors: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        if self.dimensions == 0 {
            0
        } else {
            self.vectors.len() / self.dimensions
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Bytes held by vector data
    pub fn size_bytes(&self) -> usize {
        self.vectors.len() * std::mem::size_of::<f32>()
    }

    /// Check shape after deserialization
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(RagError::Serialization("index has zero dimensions".to_string()));
        }
        if self.vectors.len() % self.dimensions != 0 {
            return Err(RagError::Serialization(format!(
                "index holds {} values, not a multiple of {} dimensions",
                self.vectors.len(),
                self.dimensions
            )));
        }
        Ok(())
    }

    /// Append vectors; all-or-nothing on dimension mismatch
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(RagError::validation(
                "embedding",
                format!("expected {} dimensions, got {}", self.dimensions, bad.len()),
            ));
        }
        for v in vectors {
            self.vectors.extend_from_slice(v);
        }
        Ok(())
    }

    /// Drop rows from `len` onwards
    pub fn truncate(&mut self, len: usize) {
        self.vectors.truncate(len * self.dimensions);
    }

    /// Keep only rows for which `keep(row)` is true, preserving order
    pub fn retain_rows(&mut self, mut keep: impl FnMut(usize) -> bool) {
        let dims = self.dimensions;
        let mut kept = Vec::with_capacity(self.vectors.len());
        for (row, values) in self.vectors.chunks_exact(dims).enumerate() {
            if keep(row) {
                kept.extend_from_slice(values);
            }
        }
        self.vectors = kept;
    }

    /// The `k` nearest rows as `(row, distance)`, closest first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimensions {
            return Err(RagError::validation(
                "query",
                format!("expected {} dimensions, got {}", self.dimensions, query.len()),
            ));
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimensions)
            .enumerate()
            .map(|(row, v)| (row, l2_distance(query, v)))
            .collect();

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

/// Map an L2 distance onto (0, 1]
pub fn similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}
