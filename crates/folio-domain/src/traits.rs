//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the dedup engine and the
//! systems that own embeddings and metadata. Implementations live in
//! `folio-store` (or in the caller's own infrastructure).

use crate::{ArchiveId, ArchiveMetadata, EmbeddingVector};

/// Source of per-page embedding sequences
///
/// Implemented by the infrastructure layer (folio-store). A failed lookup for
/// one archive degrades that archive to "skipped"; it never fails a job.
pub trait EmbeddingSource {
    /// Error type for lookups
    type Error;

    /// Fetch the ordered page embeddings of an archive
    fn get_embedding_sequence(&self, id: &ArchiveId) -> Result<Vec<EmbeddingVector>, Self::Error>;
}

/// Source of archive metadata
///
/// Implemented by the infrastructure layer (folio-store)
pub trait MetadataSource {
    /// Error type for lookups
    type Error;

    /// Fetch the metadata bag of an archive
    fn get_metadata(&self, id: &ArchiveId) -> Result<ArchiveMetadata, Self::Error>;
}

impl<T: EmbeddingSource + ?Sized> EmbeddingSource for &T {
    type Error = T::Error;

    fn get_embedding_sequence(&self, id: &ArchiveId) -> Result<Vec<EmbeddingVector>, Self::Error> {
        (**self).get_embedding_sequence(id)
    }
}

impl<T: MetadataSource + ?Sized> MetadataSource for &T {
    type Error = T::Error;

    fn get_metadata(&self, id: &ArchiveId) -> Result<ArchiveMetadata, Self::Error> {
        (**self).get_metadata(id)
    }
}

/// Approximate nearest-neighbour index over page embeddings
///
/// Used only for optional candidate pre-filtering. Implemented by
/// `folio_store::vector_index::VectorIndex`.
pub trait CandidateIndex {
    /// Error type for index operations
    type Error;

    /// Index one page of an archive
    fn insert_page(&self, id: &ArchiveId, page: &EmbeddingVector) -> Result<(), Self::Error>;

    /// Find up to `k` archives owning a page close to `query`
    ///
    /// Returns `(archive, similarity)` pairs sorted by similarity, descending.
    /// An archive may appear at most once.
    fn nearest_archives(
        &self,
        query: &EmbeddingVector,
        k: usize,
    ) -> Result<Vec<(ArchiveId, f32)>, Self::Error>;

    /// Drop every indexed page
    fn clear(&self);
}
