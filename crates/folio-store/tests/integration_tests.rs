//! Integration tests for folio-store
//!
//! These tests verify the SQLite read adapter and corpus import end to end.

use folio_domain::traits::{EmbeddingSource, MetadataSource};
use folio_domain::{Archive, ArchiveId, ArchiveMetadata, EmbeddingVector};
use folio_store::{CorpusFile, SqliteStore, StoreError};

fn sample_archive(id: &str, pages: &[[f32; 3]]) -> Archive {
    Archive::new(
        ArchiveId::new(id),
        pages.iter().map(|p| EmbeddingVector::new(p.to_vec())).collect(),
        ArchiveMetadata {
            file_size: 4096,
            tags: vec!["language:english".to_string(), "other:uncensored".to_string()],
            upload_time: 1_700_000_000,
            favorites: 12,
            reading_progress: 3,
            in_static_category: true,
            source_id: Some(123456),
        },
    )
}

#[test]
fn test_store_initialization() {
    let store = SqliteStore::new(":memory:");
    assert!(store.is_ok(), "Store should initialize successfully");
}

#[test]
fn test_insert_and_read_back() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let archive = sample_archive("a1", &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    store.insert_archive(&archive).unwrap();

    let pages = store.get_embedding_sequence(&archive.id).unwrap();
    assert_eq!(pages, archive.pages, "Pages should come back in page order");

    let metadata = store.get_metadata(&archive.id).unwrap();
    assert_eq!(metadata, archive.metadata);
    assert_eq!(store.page_count(&archive.id).unwrap(), 3);
}

#[test]
fn test_reinsert_replaces_pages_and_tags() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let mut archive = sample_archive("a1", &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    store.insert_archive(&archive).unwrap();

    archive.pages.truncate(1);
    archive.metadata.tags = vec!["language:japanese".to_string()];
    store.insert_archive(&archive).unwrap();

    assert_eq!(store.page_count(&archive.id).unwrap(), 1);
    assert_eq!(store.get_metadata(&archive.id).unwrap().tags, vec!["language:japanese"]);
}

#[test]
fn test_missing_archive_is_not_found() {
    let store = SqliteStore::new(":memory:").unwrap();
    let id = ArchiveId::new("ghost");

    assert!(matches!(store.get_embedding_sequence(&id), Err(StoreError::NotFound(_))));
    assert!(matches!(store.get_metadata(&id), Err(StoreError::NotFound(_))));
}

#[test]
fn test_metadata_only_archive_has_no_embeddings() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let id = ArchiveId::new("pending");
    store.insert_metadata_only(&id, &ArchiveMetadata::default()).unwrap();

    assert!(store.get_metadata(&id).is_ok());
    let err = store.get_embedding_sequence(&id).unwrap_err();
    assert!(err.to_string().contains("no page embeddings"));
}

#[test]
fn test_archive_ids_and_delete() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    store.insert_archive(&sample_archive("b", &[[1.0, 0.0, 0.0]])).unwrap();
    store.insert_archive(&sample_archive("a", &[[1.0, 0.0, 0.0]])).unwrap();

    assert_eq!(store.archive_ids().unwrap(), vec![ArchiveId::new("a"), ArchiveId::new("b")]);

    assert!(store.delete_archive(&ArchiveId::new("a")).unwrap());
    assert!(!store.delete_archive(&ArchiveId::new("a")).unwrap());
    assert_eq!(store.archive_ids().unwrap(), vec![ArchiveId::new("b")]);
    assert_eq!(store.page_count(&ArchiveId::new("a")).unwrap(), 0);
}

#[test]
fn test_corpus_file_import_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let corpus_path = dir.path().join("corpus.json");
    let db_path = dir.path().join("corpus.db");

    let archives = vec![
        sample_archive("x1", &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]),
        sample_archive("x2", &[[0.0, 0.0, 1.0]]),
    ];
    CorpusFile::from_archives(&archives).write_to(&corpus_path).unwrap();

    let corpus = CorpusFile::from_path(&corpus_path).unwrap();
    let mut store = SqliteStore::new(&db_path).unwrap();
    assert_eq!(corpus.import_into(&mut store).unwrap(), 2);
    drop(store);

    let reopened = SqliteStore::new(&db_path).unwrap();
    for archive in &archives {
        assert_eq!(reopened.get_embedding_sequence(&archive.id).unwrap(), archive.pages);
        assert_eq!(reopened.get_metadata(&archive.id).unwrap(), archive.metadata);
    }
}
