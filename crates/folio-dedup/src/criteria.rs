//! Scoring criteria used to rank the members of an equivalence class
//!
//! A criterion names one metadata key and a sort order. Criteria are written
//! as `key` or `key:asc|desc`, which is also how they serialize, so a config
//! file can list them as plain strings:
//!
//! ```toml
//! criteria = ["static_category", "favorites:desc", "upload_time:asc"]
//! ```

use crate::DedupError;
use folio_domain::ArchiveMetadata;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Metadata keys the scorer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    /// Archive size in bytes
    FileSize,
    /// Number of tags
    TagCount,
    /// Upload timestamp
    UploadTime,
    /// Upstream favorite count
    Favorites,
    /// Pages already read
    ReadingProgress,
    /// Pinned in a static category
    StaticCategory,
    /// Carries the decensored tag
    Decensored,
    /// No rough translation tag
    CleanTranslation,
    /// No poor grammar tag
    CleanGrammar,
    /// Upstream gallery id, higher is newer
    SourceRecency,
}

impl MetadataKey {
    /// Every key, in declaration order
    pub const ALL: [MetadataKey; 10] = [
        MetadataKey::FileSize,
        MetadataKey::TagCount,
        MetadataKey::UploadTime,
        MetadataKey::Favorites,
        MetadataKey::ReadingProgress,
        MetadataKey::StaticCategory,
        MetadataKey::Decensored,
        MetadataKey::CleanTranslation,
        MetadataKey::CleanGrammar,
        MetadataKey::SourceRecency,
    ];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataKey::FileSize => "file_size",
            MetadataKey::TagCount => "tag_count",
            MetadataKey::UploadTime => "upload_time",
            MetadataKey::Favorites => "favorites",
            MetadataKey::ReadingProgress => "reading_progress",
            MetadataKey::StaticCategory => "static_category",
            MetadataKey::Decensored => "decensored",
            MetadataKey::CleanTranslation => "clean_translation",
            MetadataKey::CleanGrammar => "clean_grammar",
            MetadataKey::SourceRecency => "source_recency",
        }
    }

    /// Order used when a criterion string names only the key
    ///
    /// Upload time defaults to ascending (the earliest upload wins); every
    /// other key prefers the larger value.
    pub fn default_order(&self) -> SortOrder {
        match self {
            MetadataKey::UploadTime => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    /// Comparable value of this key; `None` sorts below every value
    pub fn value(&self, metadata: &ArchiveMetadata) -> Option<u64> {
        match self {
            MetadataKey::FileSize => Some(metadata.file_size),
            MetadataKey::TagCount => Some(metadata.tag_count() as u64),
            MetadataKey::UploadTime => Some(metadata.upload_time),
            MetadataKey::Favorites => Some(metadata.favorites),
            MetadataKey::ReadingProgress => Some(u64::from(metadata.reading_progress)),
            MetadataKey::StaticCategory => Some(u64::from(metadata.in_static_category)),
            MetadataKey::Decensored => Some(u64::from(metadata.is_decensored())),
            MetadataKey::CleanTranslation => Some(u64::from(metadata.has_clean_translation())),
            MetadataKey::CleanGrammar => Some(u64::from(metadata.has_clean_grammar())),
            MetadataKey::SourceRecency => metadata.source_id,
        }
    }
}

impl FromStr for MetadataKey {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        MetadataKey::ALL
            .into_iter()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| DedupError::InvalidCriterion(format!("unknown metadata key '{}'", s.trim())))
    }
}

/// Sort direction of a criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Smaller values rank first
    Asc,
    /// Larger values rank first
    Desc,
}

impl SortOrder {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(DedupError::InvalidCriterion(format!(
                "unknown sort order '{}' (expected asc or desc)",
                other
            ))),
        }
    }
}

/// One ranking criterion: a metadata key and its sort order
///
/// # Examples
///
/// ```
/// use folio_dedup::{MetadataKey, ScoringCriterion, SortOrder};
///
/// let c: ScoringCriterion = "favorites".parse().unwrap();
/// assert_eq!(c, ScoringCriterion::new(MetadataKey::Favorites, SortOrder::Desc));
///
/// let c: ScoringCriterion = "upload_time:desc".parse().unwrap();
/// assert_eq!(c.order, SortOrder::Desc);
/// assert_eq!(c.to_string(), "upload_time:desc");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScoringCriterion {
    /// Metadata key
    pub key: MetadataKey,
    /// Sort order
    pub order: SortOrder,
}

impl ScoringCriterion {
    /// Create a criterion
    pub fn new(key: MetadataKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// Compare two metadata bags; `Less` means `a` ranks before `b`
    pub fn compare(&self, a: &ArchiveMetadata, b: &ArchiveMetadata) -> Ordering {
        let left = self.key.value(a);
        let right = self.key.value(b);
        match self.order {
            SortOrder::Asc => left.cmp(&right),
            SortOrder::Desc => right.cmp(&left),
        }
    }
}

impl FromStr for ScoringCriterion {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((key, order)) => Ok(Self::new(key.parse()?, order.parse()?)),
            None => {
                let key: MetadataKey = s.parse()?;
                Ok(Self::new(key, key.default_order()))
            }
        }
    }
}

impl TryFrom<String> for ScoringCriterion {
    type Error = DedupError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScoringCriterion> for String {
    fn from(value: ScoringCriterion) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ScoringCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key.as_str(), self.order.as_str())
    }
}

/// Default criteria, in priority order
///
/// Mirrors how a curator picks the copy to keep: pinned archives first, then
/// popularity, then release quality, then recency and size.
pub fn default_criteria() -> Vec<ScoringCriterion> {
    [
        MetadataKey::StaticCategory,
        MetadataKey::Favorites,
        MetadataKey::Decensored,
        MetadataKey::TagCount,
        MetadataKey::CleanTranslation,
        MetadataKey::CleanGrammar,
        MetadataKey::SourceRecency,
        MetadataKey::ReadingProgress,
        MetadataKey::FileSize,
    ]
    .into_iter()
    .map(|key| ScoringCriterion::new(key, SortOrder::Desc))
    .collect()
}

/// Parse a list of criterion strings
pub fn parse_criteria<I, S>(items: I) -> Result<Vec<ScoringCriterion>, DedupError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items.into_iter().map(|s| s.as_ref().parse()).collect()
}
