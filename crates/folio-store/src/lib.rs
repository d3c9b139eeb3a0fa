//! Folio Storage Layer
//!
//! Implements the embedding and metadata source traits for the dedup engine.
//!
//! # Architecture
//!
//! - [`MemoryStore`]: in-memory sources, used by tests and JSON corpora
//! - [`SqliteStore`]: SQLite read adapter over a local snapshot of the page database
//! - [`vector_index::VectorIndex`]: HNSW index for approximate candidate lookup
//! - [`similarity`]: the cosine similarity oracle
//!
//! # Examples
//!
//! ```no_run
//! use folio_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready to serve embeddings and metadata
//! ```

#![warn(missing_docs)]

pub mod corpus;
pub mod memory;
pub mod similarity;
pub mod vector_index;

pub use corpus::{CorpusArchive, CorpusFile, CorpusMetadata};
pub use memory::MemoryStore;

use folio_domain::traits::{EmbeddingSource, MetadataSource};
use folio_domain::{Archive, ArchiveId, ArchiveMetadata, EmbeddingVector};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Archive or embeddings not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Corpus file could not be parsed
    #[error("Corpus parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// SQLite-based embedding and metadata source
///
/// The schema mirrors the external page database: one row per archive, one
/// row per tag, one row per page embedding.
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Each thread should have its own SqliteStore instance.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        self.conn.execute_batch(schema)?;
        Ok(())
    }

    /// Encode an embedding as little-endian f32 bytes
    fn embedding_to_bytes(embedding: &EmbeddingVector) -> Vec<u8> {
        embedding
            .as_slice()
            .iter()
            .flat_map(|x| x.to_le_bytes())
            .collect()
    }

    /// Decode little-endian f32 bytes into an embedding
    fn bytes_to_embedding(bytes: &[u8]) -> Result<EmbeddingVector, StoreError> {
        if bytes.len() % 4 != 0 {
            return Err(StoreError::InvalidData(format!(
                "Embedding blob length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        let values = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(EmbeddingVector::new(values))
    }

    /// Insert or replace an archive with its tags and pages
    pub fn insert_archive(&mut self, archive: &Archive) -> Result<(), StoreError> {
        let id = archive.id.as_str();
        let meta = &archive.metadata;
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO archive (archive_id, file_size, upload_time, favorites, reading_progress, in_static_category, source_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(archive_id) DO UPDATE SET
             file_size = excluded.file_size, upload_time = excluded.upload_time,
             favorites = excluded.favorites, reading_progress = excluded.reading_progress,
             in_static_category = excluded.in_static_category, source_id = excluded.source_id",
            params![
                id,
                meta.file_size as i64,
                meta.upload_time as i64,
                meta.favorites as i64,
                i64::from(meta.reading_progress),
                meta.in_static_category,
                meta.source_id.map(|s| s as i64),
            ],
        )?;

        tx.execute("DELETE FROM archive_tag WHERE archive_id = ?1", params![id])?;
        for (position, tag) in meta.tags.iter().enumerate() {
            tx.execute(
                "INSERT INTO archive_tag (archive_id, position, tag) VALUES (?1, ?2, ?3)",
                params![id, position as i64, tag],
            )?;
        }

        tx.execute("DELETE FROM page WHERE archive_id = ?1", params![id])?;
        for (index, page) in archive.pages.iter().enumerate() {
            tx.execute(
                "INSERT INTO page (archive_id, page_no, embedding) VALUES (?1, ?2, ?3)",
                params![id, (index + 1) as i64, Self::embedding_to_bytes(page)],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Insert an archive row without pages (embeddings not yet computed)
    pub fn insert_metadata_only(&mut self, id: &ArchiveId, metadata: &ArchiveMetadata) -> Result<(), StoreError> {
        self.insert_archive(&Archive::new(id.clone(), Vec::new(), metadata.clone()))
    }

    /// All archive ids, ascending
    pub fn archive_ids(&self) -> Result<Vec<ArchiveId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT archive_id FROM archive ORDER BY archive_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(ArchiveId::from).collect())
    }

    /// Number of stored pages for an archive
    pub fn page_count(&self, id: &ArchiveId) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM page WHERE archive_id = ?1",
            params![id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Delete an archive with its tags and pages
    pub fn delete_archive(&mut self, id: &ArchiveId) -> Result<bool, StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM archive WHERE archive_id = ?1", params![id.as_str()])?;
        Ok(deleted > 0)
    }

    fn archive_exists(&self, id: &ArchiveId) -> Result<bool, StoreError> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM archive WHERE archive_id = ?1",
                params![id.as_str()],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(exists)
    }
}

impl EmbeddingSource for SqliteStore {
    type Error = StoreError;

    fn get_embedding_sequence(&self, id: &ArchiveId) -> Result<Vec<EmbeddingVector>, Self::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT embedding FROM page WHERE archive_id = ?1 ORDER BY page_no")?;
        let blobs = stmt
            .query_map(params![id.as_str()], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        if blobs.is_empty() {
            let reason = if self.archive_exists(id)? {
                format!("no page embeddings for archive {}", id)
            } else {
                format!("archive {}", id)
            };
            return Err(StoreError::NotFound(reason));
        }

        blobs.iter().map(|b| Self::bytes_to_embedding(b)).collect()
    }
}

impl MetadataSource for SqliteStore {
    type Error = StoreError;

    fn get_metadata(&self, id: &ArchiveId) -> Result<ArchiveMetadata, Self::Error> {
        let row = self
            .conn
            .query_row(
                "SELECT file_size, upload_time, favorites, reading_progress, in_static_category, source_id
                 FROM archive WHERE archive_id = ?1",
                params![id.as_str()],
                |row| {
                    let source_id: Option<i64> = row.get(5)?;
                    Ok(ArchiveMetadata {
                        file_size: row.get::<_, i64>(0)? as u64,
                        tags: Vec::new(),
                        upload_time: row.get::<_, i64>(1)? as u64,
                        favorites: row.get::<_, i64>(2)? as u64,
                        reading_progress: row.get::<_, i64>(3)? as u32,
                        in_static_category: row.get(4)?,
                        source_id: source_id.map(|s| s as u64),
                    })
                },
            )
            .optional()?;

        let mut metadata = row.ok_or_else(|| StoreError::NotFound(format!("archive {}", id)))?;

        let mut stmt = self
            .conn
            .prepare("SELECT tag FROM archive_tag WHERE archive_id = ?1 ORDER BY position")?;
        metadata.tags = stmt
            .query_map(params![id.as_str()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_blob_roundtrip() {
        let embedding = EmbeddingVector::new(vec![0.25, -1.5, 3.0]);
        let bytes = SqliteStore::embedding_to_bytes(&embedding);
        assert_eq!(bytes.len(), 12);
        assert_eq!(SqliteStore::bytes_to_embedding(&bytes).unwrap(), embedding);
    }

    #[test]
    fn test_truncated_blob_is_rejected() {
        let result = SqliteStore::bytes_to_embedding(&[0, 0, 128]);
        assert!(matches!(result, Err(StoreError::InvalidData(_))));
    }
}
