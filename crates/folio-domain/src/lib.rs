//! Folio Domain Layer
//!
//! This crate contains the core domain model for Folio's archive deduplication
//! engine. It has no external dependencies and defines the value objects and
//! trait interfaces that the storage, dedup and CLI layers build upon.
//!
//! ## Key Concepts
//!
//! - **Archive**: an identifier, an ordered sequence of page embeddings, and a metadata bag
//! - **Embedding Vector**: a fixed-dimension page fingerprint produced by an external model
//! - **Relation**: a directed `LESSER` or `EQUAL` fact between two archives
//! - **Metadata**: the facts used to decide which duplicate to keep
//!
//! ## Architecture
//!
//! - No external crate dependencies
//! - Pure types and small helpers only
//! - Embedding and metadata access go through the traits in [`traits`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod embedding;
pub mod metadata;
pub mod relation;
pub mod traits;

// Re-exports for convenience
pub use archive::{Archive, ArchiveId};
pub use embedding::EmbeddingVector;
pub use metadata::{ArchiveMetadata, Language};
pub use relation::{Relation, RelationKind};
