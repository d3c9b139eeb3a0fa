//! Similarity oracle for page embeddings
//!
//! Cosine similarity is the only likeness measure the engine uses. The
//! functions here are pure and safe to call from any worker thread.
//!
//! # Numerics
//!
//! - Dot products and norms accumulate in `f64`
//! - Results are clamped into `[-1, 1]`
//! - Bitwise-identical inputs score exactly `1.0`
//! - A zero-norm input scores `0.0`
//!
//! # Examples
//!
//! ```rust
//! use folio_store::similarity::{cosine_similarity, is_similar};
//!
//! let a = [1.0, 0.0];
//! let b = [0.0, 1.0];
//! assert_eq!(cosine_similarity(&a, &a).unwrap(), 1.0);
//! assert!(cosine_similarity(&a, &b).unwrap().abs() < 1e-6);
//! assert!(is_similar(&a, &a, 1.0).unwrap());
//! ```

use folio_domain::EmbeddingVector;
use thiserror::Error;

/// Tolerance applied by [`is_similar`] so that a threshold of `1.0` still
/// accepts vectors that are equal up to rounding
pub const SIMILARITY_EPSILON: f32 = 1e-6;

/// Errors that can occur while comparing embeddings
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityError {
    /// The two vectors have different lengths
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the left operand
        expected: usize,
        /// Dimension of the right operand
        actual: usize,
    },
}

/// Calculate cosine similarity between two embedding slices
///
/// # Returns
///
/// Cosine similarity in range [-1, 1], where:
/// - 1.0 = identical direction
/// - 0.0 = orthogonal (or either vector is zero)
/// - -1.0 = opposite direction
///
/// # Errors
///
/// [`SimilarityError::DimensionMismatch`] if the slices differ in length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    if a == b && a.iter().any(|&x| x != 0.0) {
        return Ok(1.0);
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let cosine = dot / (norm_a.sqrt() * norm_b.sqrt());
    Ok(cosine.clamp(-1.0, 1.0) as f32)
}

/// Whether two slices are similar at the given threshold
///
/// True iff `cosine_similarity(a, b) >= threshold - SIMILARITY_EPSILON`.
pub fn is_similar(a: &[f32], b: &[f32], threshold: f32) -> Result<bool, SimilarityError> {
    Ok(meets_threshold(cosine_similarity(a, b)?, threshold))
}

/// Compare a precomputed similarity score against a threshold
pub fn meets_threshold(similarity: f32, threshold: f32) -> bool {
    similarity >= threshold - SIMILARITY_EPSILON
}

/// Cosine similarity between two embedding vectors
pub fn similarity(v1: &EmbeddingVector, v2: &EmbeddingVector) -> Result<f32, SimilarityError> {
    cosine_similarity(v1.as_slice(), v2.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let vec = vec![0.3, 0.1, 0.7];
        assert_eq!(cosine_similarity(&vec, &vec).unwrap(), 1.0);
    }

    #[test]
    fn test_cosine_similarity_scaled() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![2.0, 4.0, 6.0];
        let similarity = cosine_similarity(&a, &b).unwrap();
        assert!((similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let vec1 = vec![1.0, 0.0, 0.0];
        let vec2 = vec![0.0, 1.0, 0.0];
        let similarity = cosine_similarity(&vec1, &vec2).unwrap();
        assert!(similarity.abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let vec1 = vec![1.0, 0.0, 0.0];
        let vec2 = vec![-1.0, 0.0, 0.0];
        let similarity = cosine_similarity(&vec1, &vec2).unwrap();
        assert!((similarity + 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let zero = vec![0.0, 0.0];
        let other = vec![1.0, 0.0];
        assert_eq!(cosine_similarity(&zero, &other).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]);
        assert_eq!(
            result,
            Err(SimilarityError::DimensionMismatch { expected: 2, actual: 3 })
        );
        assert!(is_similar(&[1.0], &[1.0, 0.0], 0.5).is_err());
    }

    #[test]
    fn test_is_similar_threshold_inclusive() {
        let a = vec![1.0, 0.0];
        let b = vec![0.97, (1.0f32 - 0.97 * 0.97).sqrt()];
        let score = cosine_similarity(&a, &b).unwrap();
        assert!((score - 0.97).abs() < 1e-5);
        assert!(is_similar(&a, &b, 0.95).unwrap());
        assert!(is_similar(&a, &b, score).unwrap());
        assert!(!is_similar(&a, &b, 0.99).unwrap());
    }

    #[test]
    fn test_exact_threshold_accepts_identical() {
        let a = vec![0.1, 0.2, 0.3, 0.4];
        assert!(is_similar(&a, &a.clone(), 1.0).unwrap());
    }

    #[test]
    fn test_similarity_on_vectors() {
        let v1 = EmbeddingVector::new(vec![1.0, 0.0]);
        let v2 = EmbeddingVector::new(vec![1.0, 1.0]);
        let score = similarity(&v1, &v2).unwrap();
        assert!((score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }
}
