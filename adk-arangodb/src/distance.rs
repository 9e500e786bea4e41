//! Distance strategies for vector search.
//!
//! Every computation widens to `f64` before accumulating so near-duplicate
//! vectors do not lose their difference to cancellation.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// How vectors are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceStrategy {
    /// Cosine similarity; higher scores are closer.
    #[default]
    Cosine,
    /// Euclidean (L2) distance; lower scores are closer.
    EuclideanDistance,
    /// Inner product; higher scores are closer.
    DotProduct,
}

impl DistanceStrategy {
    /// The score reported by searches under this strategy.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            DistanceStrategy::Cosine => cosine_similarity(a, b),
            DistanceStrategy::EuclideanDistance => euclidean_distance(a, b),
            DistanceStrategy::DotProduct => dot_product(a, b),
        }
    }

    /// A similarity where larger always means closer: cosine similarity,
    /// negated Euclidean distance, or the dot product.
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            DistanceStrategy::EuclideanDistance => -euclidean_distance(a, b),
            other => other.score(a, b),
        }
    }

    /// Whether a lower [`score`](Self::score) means a closer match.
    pub fn lower_is_closer(&self) -> bool {
        matches!(self, DistanceStrategy::EuclideanDistance)
    }

    /// Order two scores so that the closer one comes first.
    pub fn compare_scores(&self, a: f64, b: f64) -> Ordering {
        if self.lower_is_closer() { a.total_cmp(&b) } else { b.total_cmp(&a) }
    }
}

/// Cosine similarity. Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Euclidean (L2) distance.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Inner product.
pub fn dot_product(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}
