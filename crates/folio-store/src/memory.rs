//! In-memory embedding and metadata source

use crate::StoreError;
use folio_domain::traits::{EmbeddingSource, MetadataSource};
use folio_domain::{Archive, ArchiveId, ArchiveMetadata, EmbeddingVector};
use std::collections::BTreeMap;

/// In-memory store keyed by archive id
///
/// Pages and metadata are tracked separately so that an archive can be known
/// (it has metadata) while its embeddings are still missing, which is exactly
/// the situation the engine reports as `EmbeddingUnavailable`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pages: BTreeMap<ArchiveId, Vec<EmbeddingVector>>,
    metadata: BTreeMap<ArchiveId, ArchiveMetadata>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a complete archive, replacing any previous entry
    pub fn insert(&mut self, archive: Archive) {
        self.pages.insert(archive.id.clone(), archive.pages);
        self.metadata.insert(archive.id, archive.metadata);
    }

    /// Insert or replace only the page embeddings of an archive
    pub fn insert_pages(&mut self, id: ArchiveId, pages: Vec<EmbeddingVector>) {
        self.pages.insert(id, pages);
    }

    /// Insert or replace only the metadata of an archive
    pub fn insert_metadata(&mut self, id: ArchiveId, metadata: ArchiveMetadata) {
        self.metadata.insert(id, metadata);
    }

    /// Every archive id known to the store, ascending
    pub fn archive_ids(&self) -> Vec<ArchiveId> {
        let mut ids: Vec<ArchiveId> = self
            .metadata
            .keys()
            .chain(self.pages.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Number of known archives
    pub fn len(&self) -> usize {
        self.archive_ids().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.metadata.is_empty()
    }
}

impl FromIterator<Archive> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = Archive>>(iter: I) -> Self {
        let mut store = MemoryStore::new();
        for archive in iter {
            store.insert(archive);
        }
        store
    }
}

impl EmbeddingSource for MemoryStore {
    type Error = StoreError;

    fn get_embedding_sequence(&self, id: &ArchiveId) -> Result<Vec<EmbeddingVector>, Self::Error> {
        self.pages
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("no page embeddings for archive {}", id)))
    }
}

impl MetadataSource for MemoryStore {
    type Error = StoreError;

    fn get_metadata(&self, id: &ArchiveId) -> Result<ArchiveMetadata, Self::Error> {
        self.metadata
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("archive {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(id: &str, pages: usize) -> Archive {
        Archive::new(
            ArchiveId::new(id),
            (0..pages).map(|i| EmbeddingVector::new(vec![i as f32, 1.0])).collect(),
            ArchiveMetadata {
                file_size: 100,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_insert_and_fetch() {
        let mut store = MemoryStore::new();
        store.insert(archive("a", 3));

        let pages = store.get_embedding_sequence(&ArchiveId::new("a")).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(store.get_metadata(&ArchiveId::new("a")).unwrap().file_size, 100);
    }

    #[test]
    fn test_missing_pages_are_not_found() {
        let mut store = MemoryStore::new();
        store.insert_metadata(ArchiveId::new("meta-only"), ArchiveMetadata::default());

        let result = store.get_embedding_sequence(&ArchiveId::new("meta-only"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert!(store.get_metadata(&ArchiveId::new("meta-only")).is_ok());
    }

    #[test]
    fn test_archive_ids_are_sorted_and_unique() {
        let mut store: MemoryStore = vec![archive("c", 1), archive("a", 1)].into_iter().collect();
        store.insert_pages(ArchiveId::new("b"), Vec::new());

        assert_eq!(
            store.archive_ids(),
            vec![ArchiveId::new("a"), ArchiveId::new("b"), ArchiveId::new("c")]
        );
        assert_eq!(store.len(), 3);
        assert!(!store.is_empty());
    }
}
