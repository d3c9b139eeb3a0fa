//! JSON corpus files
//!
//! A corpus file is a snapshot of archives with their page embeddings and
//! metadata, the exchange format between the page database export and the
//! dedup engine.
//!
//! ```json
//! {
//!   "archives": [
//!     {
//!       "id": "a1",
//!       "pages": [[0.1, 0.9], [0.8, 0.2]],
//!       "metadata": { "file_size": 1024, "tags": ["language:english"] }
//!     },
//!     { "id": "a2", "metadata": { "file_size": 2048 } }
//!   ]
//! }
//! ```
//!
//! An archive without `pages` is known but has no embeddings yet.

use crate::{MemoryStore, SqliteStore, StoreError};
use folio_domain::{Archive, ArchiveId, ArchiveMetadata, EmbeddingVector};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level corpus document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusFile {
    /// Archives in the corpus
    #[serde(default)]
    pub archives: Vec<CorpusArchive>,
}

/// One archive entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusArchive {
    /// Archive identifier
    pub id: String,

    /// Page embeddings in page order, absent when not computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<Vec<f32>>>,

    /// Metadata bag
    #[serde(default)]
    pub metadata: CorpusMetadata,
}

/// Serialized metadata bag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusMetadata {
    /// Archive size in bytes
    #[serde(default)]
    pub file_size: u64,

    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Upload time, unix seconds
    #[serde(default)]
    pub upload_time: u64,

    /// Favorite count
    #[serde(default)]
    pub favorites: u64,

    /// Pages read
    #[serde(default)]
    pub reading_progress: u32,

    /// Pinned in a static category
    #[serde(default)]
    pub in_static_category: bool,

    /// Upstream gallery id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<u64>,
}

impl From<CorpusMetadata> for ArchiveMetadata {
    fn from(meta: CorpusMetadata) -> Self {
        ArchiveMetadata {
            file_size: meta.file_size,
            tags: meta.tags,
            upload_time: meta.upload_time,
            favorites: meta.favorites,
            reading_progress: meta.reading_progress,
            in_static_category: meta.in_static_category,
            source_id: meta.source_id,
        }
    }
}

impl From<&ArchiveMetadata> for CorpusMetadata {
    fn from(meta: &ArchiveMetadata) -> Self {
        CorpusMetadata {
            file_size: meta.file_size,
            tags: meta.tags.clone(),
            upload_time: meta.upload_time,
            favorites: meta.favorites,
            reading_progress: meta.reading_progress,
            in_static_category: meta.in_static_category,
            source_id: meta.source_id,
        }
    }
}

impl From<&Archive> for CorpusArchive {
    fn from(archive: &Archive) -> Self {
        CorpusArchive {
            id: archive.id.to_string(),
            pages: Some(archive.pages.iter().map(|p| p.as_slice().to_vec()).collect()),
            metadata: CorpusMetadata::from(&archive.metadata),
        }
    }
}

impl CorpusFile {
    /// Parse a corpus from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a corpus file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Write the corpus as pretty JSON
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Build a corpus from complete archives
    pub fn from_archives<'a>(archives: impl IntoIterator<Item = &'a Archive>) -> Self {
        CorpusFile {
            archives: archives.into_iter().map(CorpusArchive::from).collect(),
        }
    }

    /// Archive ids in file order
    pub fn archive_ids(&self) -> Vec<ArchiveId> {
        self.archives.iter().map(|a| ArchiveId::new(a.id.clone())).collect()
    }

    /// Load the corpus into an in-memory store
    ///
    /// Archives without pages get metadata only, so their embedding lookups
    /// fail as unavailable.
    pub fn into_memory_store(self) -> MemoryStore {
        let mut store = MemoryStore::new();
        for entry in self.archives {
            let id = ArchiveId::new(entry.id);
            if let Some(pages) = entry.pages {
                store.insert_pages(id.clone(), pages.into_iter().map(EmbeddingVector::new).collect());
            }
            store.insert_metadata(id, entry.metadata.into());
        }
        store
    }

    /// Copy the corpus into a SQLite store, returning the archive count
    pub fn import_into(self, store: &mut SqliteStore) -> Result<usize, StoreError> {
        let mut count = 0;
        for entry in self.archives {
            let pages = entry
                .pages
                .unwrap_or_default()
                .into_iter()
                .map(EmbeddingVector::new)
                .collect();
            let archive = Archive::new(ArchiveId::new(entry.id), pages, entry.metadata.into());
            store.insert_archive(&archive)?;
            count += 1;
        }
        Ok(count)
    }
}
