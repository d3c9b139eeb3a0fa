//! Embedding vector module
//!
//! Embeddings are produced by an external image model (512 dimensions for the
//! default model) and consumed read-only by the engine.

/// A fixed-dimension page embedding
///
/// The vector is assumed to be L2-normalizable. Callers should check
/// [`EmbeddingVector::is_valid`] before comparing; the engine skips archives
/// that contain invalid pages.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    /// Wrap raw components
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Number of components
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    /// Borrow the components
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Consume the vector, returning its components
    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    /// Euclidean norm, accumulated in f64
    pub fn norm(&self) -> f64 {
        self.0
            .iter()
            .map(|&x| f64::from(x) * f64::from(x))
            .sum::<f64>()
            .sqrt()
    }

    /// Whether the vector can take part in a cosine comparison
    ///
    /// A valid vector is non-empty, has only finite components and a
    /// non-zero norm.
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_domain::EmbeddingVector;
    ///
    /// assert!(EmbeddingVector::new(vec![0.6, 0.8]).is_valid());
    /// assert!(!EmbeddingVector::new(vec![0.0, 0.0]).is_valid());
    /// assert!(!EmbeddingVector::new(vec![f32::NAN, 1.0]).is_valid());
    /// ```
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|x| x.is_finite()) && self.norm() > 0.0
    }

    /// Return a unit-length copy (zero vectors are returned unchanged)
    pub fn normalized(&self) -> Self {
        let norm = self.norm();
        if norm == 0.0 {
            return self.clone();
        }
        Self(self.0.iter().map(|&x| (f64::from(x) / norm) as f32).collect())
    }
}

impl From<Vec<f32>> for EmbeddingVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl AsRef<[f32]> for EmbeddingVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_and_slice() {
        let v = EmbeddingVector::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(v.dimension(), 3);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_norm() {
        let v = EmbeddingVector::new(vec![3.0, 4.0]);
        assert!((v.norm() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_has_unit_length() {
        let v = EmbeddingVector::new(vec![3.0, 4.0]).normalized();
        assert!((v.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_normalizes_to_itself() {
        let v = EmbeddingVector::new(vec![0.0, 0.0]);
        assert_eq!(v.normalized(), v);
    }

    #[test]
    fn test_validity() {
        assert!(!EmbeddingVector::new(Vec::new()).is_valid());
        assert!(!EmbeddingVector::new(vec![f32::INFINITY]).is_valid());
        assert!(EmbeddingVector::new(vec![0.0, 1e-3]).is_valid());
    }
}
