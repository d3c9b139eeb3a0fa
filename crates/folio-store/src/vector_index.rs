//! HNSW Vector Index for Candidate Lookup
//!
//! This module provides a wrapper around the HNSW algorithm for approximate
//! nearest-neighbour search over page embeddings. The dedup engine can use it
//! to restrict pairwise comparisons to archives that own a page close to the
//! first page of the candidate.
//!
//! # Architecture
//!
//! - In-memory index, rebuilt per job from the loaded corpus
//! - Every page is indexed; results are collapsed per archive
//! - Lookups are approximate: a missed neighbour means a skipped comparison
//!
//! # HNSW Parameters
//!
//! - **M**: Number of bi-directional links per node (default: 16)
//!   Higher M = better accuracy but more memory
//! - **efConstruction**: Size of dynamic candidate list during construction (default: 200)
//!   Higher efConstruction = better index quality but slower build
//! - **efSearch**: Size of dynamic candidate list during search (default: 64)
//!   Higher efSearch = better recall but slower queries

use folio_domain::traits::CandidateIndex;
use folio_domain::{ArchiveId, EmbeddingVector};
use hnsw_rs::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Default HNSW parameters optimized for 512-dimensional page embeddings
const DEFAULT_M: usize = 16;
const DEFAULT_EF_CONSTRUCTION: usize = 200;
const DEFAULT_EF_SEARCH: usize = 64;
const DEFAULT_MAX_ELEMENTS: usize = 1_000_000;

/// Pages fetched per requested archive before collapsing to archives
const PAGE_FANOUT: usize = 4;

/// Errors that can occur during vector index operations
#[derive(Error, Debug)]
pub enum VectorIndexError {
    /// Invalid embedding dimension
    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension provided
        actual: usize,
    },

    /// Internal HNSW or locking error
    #[error("HNSW error: {0}")]
    Internal(String),
}

/// A wrapper around HNSW for page similarity search
///
/// This index stores (archive_id, page embedding) pairs and answers "which
/// archives have a page close to this one".
///
/// # Examples
///
/// ```no_run
/// use folio_store::vector_index::VectorIndex;
/// use folio_domain::traits::CandidateIndex;
/// use folio_domain::{ArchiveId, EmbeddingVector};
///
/// let index = VectorIndex::new(512);
/// let page = EmbeddingVector::new(vec![0.1; 512]);
/// index.insert_page(&ArchiveId::new("a"), &page).unwrap();
///
/// let results = index.nearest_archives(&page, 5).unwrap();
/// ```
pub struct VectorIndex {
    /// Expected embedding dimension
    dimension: usize,

    /// Search quality parameter
    ef_search: usize,

    /// HNSW index (wrapped in Arc<Mutex> for thread-safe access)
    hnsw: Arc<Mutex<Hnsw<'static, f32, DistCosine>>>,

    /// Owner of each internal HNSW id; the position is the id
    owners: Arc<Mutex<Vec<ArchiveId>>>,
}

fn new_hnsw() -> Hnsw<'static, f32, DistCosine> {
    // Calculate number of layers based on expected data size
    let nb_layer = 16.min((DEFAULT_MAX_ELEMENTS as f32).ln().trunc() as usize);

    Hnsw::<'static, f32, DistCosine>::new(
        DEFAULT_M,
        DEFAULT_MAX_ELEMENTS,
        nb_layer,
        DEFAULT_EF_CONSTRUCTION,
        DistCosine {},
    )
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, VectorIndexError> {
    mutex
        .lock()
        .map_err(|_| VectorIndexError::Internal(format!("{} lock poisoned", what)))
}

impl VectorIndex {
    /// Create a new vector index with the specified dimension
    ///
    /// # Parameters
    ///
    /// - `dimension`: Embedding vector dimension (e.g., 512)
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ef_search: DEFAULT_EF_SEARCH,
            hnsw: Arc::new(Mutex::new(new_hnsw())),
            owners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Override the search quality parameter
    pub fn with_ef_search(mut self, ef_search: usize) -> Self {
        self.ef_search = ef_search.max(1);
        self
    }

    /// Expected embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, len: usize) -> Result<(), VectorIndexError> {
        if len != self.dimension {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.dimension,
                actual: len,
            });
        }
        Ok(())
    }

    /// Add one page embedding to the index
    pub fn add(&self, archive_id: &ArchiveId, embedding: &[f32]) -> Result<(), VectorIndexError> {
        self.check_dimension(embedding.len())?;

        let mut owners = lock(&self.owners, "owner map")?;
        let internal_id = owners.len();
        owners.push(archive_id.clone());
        drop(owners);

        // Insert into HNSW (owned Vec for the 'static index lifetime)
        let embedding_vec = embedding.to_vec();
        let hnsw = lock(&self.hnsw, "hnsw")?;
        hnsw.insert((&embedding_vec, internal_id));

        Ok(())
    }

    /// Search for the `k` nearest pages to the given embedding
    ///
    /// Returns `(owner, similarity)` pairs sorted by similarity (descending).
    /// The same archive may appear several times, once per matching page.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(ArchiveId, f32)>, VectorIndexError> {
        self.check_dimension(query.len())?;

        let hnsw = lock(&self.hnsw, "hnsw")?;
        let owners = lock(&self.owners, "owner map")?;

        let results = hnsw.search(query, k, self.ef_search.max(k));

        // HNSW returns cosine distance, we want similarity (1 - distance)
        let mut mapped: Vec<(ArchiveId, f32)> = results
            .into_iter()
            .filter_map(|neighbour| {
                owners
                    .get(neighbour.d_id)
                    .map(|owner| (owner.clone(), 1.0 - neighbour.distance))
            })
            .collect();
        mapped.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(mapped)
    }

    /// Get the number of pages in the index
    pub fn len(&self) -> usize {
        self.owners.lock().map(|owners| owners.len()).unwrap_or(0)
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CandidateIndex for VectorIndex {
    type Error = VectorIndexError;

    fn insert_page(&self, id: &ArchiveId, page: &EmbeddingVector) -> Result<(), Self::Error> {
        self.add(id, page.as_slice())
    }

    fn nearest_archives(
        &self,
        query: &EmbeddingVector,
        k: usize,
    ) -> Result<Vec<(ArchiveId, f32)>, Self::Error> {
        let pages = self.search(query.as_slice(), k.saturating_mul(PAGE_FANOUT).max(k))?;

        let mut best: HashMap<ArchiveId, f32> = HashMap::new();
        for (owner, score) in pages {
            let entry = best.entry(owner).or_insert(f32::MIN);
            if score > *entry {
                *entry = score;
            }
        }

        let mut archives: Vec<(ArchiveId, f32)> = best.into_iter().collect();
        archives.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        archives.truncate(k);
        Ok(archives)
    }

    fn clear(&self) {
        if let Ok(mut hnsw) = self.hnsw.lock() {
            *hnsw = new_hnsw();
        }
        if let Ok(mut owners) = self.owners.lock() {
            owners.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(values: &[f32]) -> EmbeddingVector {
        EmbeddingVector::new(values.to_vec()).normalized()
    }

    #[test]
    fn test_vector_index_creation() {
        let index = VectorIndex::new(512);
        assert_eq!(index.dimension(), 512);
        assert!(index.is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = VectorIndex::new(8);
        let result = index.add(&ArchiveId::new("a"), &[0.1; 4]);
        assert!(matches!(result, Err(VectorIndexError::DimensionMismatch { expected: 8, actual: 4 })));
    }

    #[test]
    fn test_nearest_archives_collapses_pages() {
        let index = VectorIndex::new(3);
        let a = ArchiveId::new("a");
        let b = ArchiveId::new("b");

        index.insert_page(&a, &unit(&[1.0, 0.0, 0.0])).unwrap();
        index.insert_page(&a, &unit(&[0.9, 0.1, 0.0])).unwrap();
        index.insert_page(&b, &unit(&[0.0, 1.0, 0.0])).unwrap();
        assert_eq!(index.len(), 3);

        let results = index.nearest_archives(&unit(&[1.0, 0.0, 0.0]), 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, a);
        assert!(results[0].1 > 0.99);
        assert_eq!(results[1].0, b);
        assert!(results[1].1 < 0.1);
    }

    #[test]
    fn test_clear() {
        let index = VectorIndex::new(2);
        index.insert_page(&ArchiveId::new("a"), &unit(&[1.0, 0.0])).unwrap();
        assert_eq!(index.len(), 1);

        index.clear();
        assert!(index.is_empty());
    }
}
