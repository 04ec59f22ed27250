use crate::models::RerankWeights;

// Keeps normalization finite when an all-zero vector comes through.
pub const NORM_EPSILON: f32 = 1e-12;

pub fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    vector
        .iter()
        .map(|value| value / (norm + NORM_EPSILON))
        .collect()
}

pub fn dot(left: &[f32], right: &[f32]) -> f32 {
    left.iter().zip(right.iter()).map(|(a, b)| a * b).sum()
}

pub fn overlap_ratio(matched: usize, total: usize) -> f32 {
    matched as f32 / total.max(1) as f32
}

pub fn hybrid_score(weights: &RerankWeights, similarity: f32, overlap: f32) -> f32 {
    weights.alpha * similarity + weights.beta * overlap
}
