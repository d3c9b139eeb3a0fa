//! Archive module - the unit being deduplicated

use crate::{ArchiveMetadata, EmbeddingVector};
use std::fmt;

/// Opaque archive identifier
///
/// Identifiers come from the external library (typically a 40 character
/// content hash). Ordering is plain string ordering, which is what every
/// deterministic tie-break in the engine relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ArchiveId(String);

impl ArchiveId {
    /// Create an identifier from anything string-like
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_domain::ArchiveId;
    ///
    /// let id = ArchiveId::new("a1b2c3");
    /// assert_eq!(id.as_str(), "a1b2c3");
    /// ```
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the identifier, returning the inner string
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArchiveId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ArchiveId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ArchiveId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An archive as seen by a dedup job
///
/// Pages are in reading order. An archive is immutable for the lifetime of a
/// job; the job coordinator owns it for that run.
#[derive(Debug, Clone, PartialEq)]
pub struct Archive {
    /// Unique identifier
    pub id: ArchiveId,

    /// One embedding per page, in page order
    pub pages: Vec<EmbeddingVector>,

    /// Metadata used by the scorer
    pub metadata: ArchiveMetadata,
}

impl Archive {
    /// Create a new archive
    pub fn new(id: ArchiveId, pages: Vec<EmbeddingVector>, metadata: ArchiveMetadata) -> Self {
        Self { id, pages, metadata }
    }

    /// Number of pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Dimension of the first page, if any
    pub fn dimension(&self) -> Option<usize> {
        self.pages.first().map(EmbeddingVector::dimension)
    }

    /// First page embedding
    pub fn first_page(&self) -> Option<&EmbeddingVector> {
        self.pages.first()
    }
}
