//! Error types for dedup jobs

use folio_domain::ArchiveId;
use thiserror::Error;

/// Errors that fail a whole dedup job
///
/// Per-archive problems (missing embeddings, empty sequences) never show up
/// here; they are reported as skipped archives instead.
#[derive(Error, Debug)]
pub enum DedupError {
    /// Threshold outside (0, 1]
    #[error("Invalid threshold {0}: must be in (0, 1]")]
    InvalidThreshold(f64),

    /// Two archives carry embeddings of different dimensions
    #[error("Embedding dimension mismatch: {left} has {expected}, {right} has {actual}")]
    DimensionMismatch {
        /// Archive whose dimension was taken as reference
        left: ArchiveId,
        /// Archive with the offending dimension
        right: ArchiveId,
        /// Reference dimension
        expected: usize,
        /// Offending dimension
        actual: usize,
    },

    /// Unknown or malformed scoring criterion
    #[error("Invalid scoring criterion: {0}")]
    InvalidCriterion(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker error (tokio runtime issues)
    #[error("Worker error: {0}")]
    Worker(String),

    /// Candidate index failure in approximate prefilter mode
    #[error("Candidate index error: {0}")]
    Index(String),
}
