//! Bounded per-track history of appearance embeddings

use std::collections::VecDeque;

/// Cosine distance between two embeddings (1 - cosine similarity).
///
/// A zero-length vector has no direction and is treated as orthogonal.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// FIFO gallery of recent embeddings for one track
#[derive(Debug, Clone)]
pub struct AppearanceGallery {
    capacity: usize,
    samples: VecDeque<Vec<f32>>,
}

impl AppearanceGallery {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an embedding, evicting the oldest once over capacity
    pub fn push(&mut self, embedding: Vec<f32>) {
        self.samples.push_back(embedding);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Smallest cosine distance from `query` to any stored embedding,
    /// or `f32::INFINITY` for an empty gallery
    pub fn nearest_distance(&self, query: &[f32]) -> f32 {
        self.samples
            .iter()
            .map(|sample| cosine_distance(sample, query))
            .fold(f32::INFINITY, f32::min)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stored embeddings, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.samples.iter().map(Vec::as_slice)
    }
}
