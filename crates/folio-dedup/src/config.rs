//! Configuration for dedup jobs
//!
//! Defines the similarity threshold, ranking criteria, parallelism and the
//! candidate prefilter.

use crate::criteria::{default_criteria, ScoringCriterion};
use crate::DedupError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How candidate pairs are pruned before the full subsequence check
///
/// Serialized with a `mode` tag:
///
/// ```toml
/// [prefilter]
/// mode = "approximate"
/// neighbours = 64
/// ef_search = 128
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PrefilterMode {
    /// Compare every pair
    Off,

    /// Prune pairs that provably cannot match
    ///
    /// A shorter archive can only be contained in a longer one if its first
    /// page matches some page in the leading window of the longer archive and
    /// its last page matches some page in the trailing window. Never drops a
    /// true relation.
    #[default]
    Exact,

    /// Only compare pairs whose first pages are nearest neighbours in an
    /// HNSW index
    ///
    /// Faster on large corpora, but a neighbour the index misses is a
    /// relation the job never finds.
    Approximate {
        /// Archives fetched per first-page lookup
        #[serde(default = "default_neighbours")]
        neighbours: usize,

        /// HNSW search quality
        #[serde(default = "default_ef_search")]
        ef_search: usize,
    },
}

fn default_neighbours() -> usize {
    64
}

fn default_ef_search() -> usize {
    128
}

impl PrefilterMode {
    /// Approximate mode with default parameters
    pub fn approximate() -> Self {
        PrefilterMode::Approximate {
            neighbours: default_neighbours(),
            ef_search: default_ef_search(),
        }
    }

    /// Short name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            PrefilterMode::Off => "off",
            PrefilterMode::Exact => "exact",
            PrefilterMode::Approximate { .. } => "approximate",
        }
    }
}

/// Configuration for a dedup job
///
/// # Examples
///
/// ```
/// use folio_dedup::DedupConfig;
///
/// // Default configuration (balanced)
/// let config = DedupConfig::default();
/// assert_eq!(config.threshold, 0.95);
///
/// // Only near-identical pages count as matches
/// let config = DedupConfig::strict();
/// assert_eq!(config.threshold, 0.98);
///
/// // Tolerate re-encodes and light edits
/// let config = DedupConfig::lenient();
/// assert_eq!(config.threshold, 0.90);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Minimum cosine similarity for two pages to match, in (0, 1]
    /// Default: 0.95
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Ranking criteria in priority order
    /// Default: static_category, favorites, decensored, tag_count,
    /// clean_translation, clean_grammar, source_recency, reading_progress,
    /// file_size (all descending)
    #[serde(default = "default_criteria")]
    pub criteria: Vec<ScoringCriterion>,

    /// Maximum number of comparison batches in flight
    /// Default: available parallelism
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Archive pairs per batch
    /// Default: 64
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Job deadline in seconds; no deadline when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Only compare archives of the same language
    /// Default: false
    #[serde(default)]
    pub separate_languages: bool,

    /// Drop order edges implied by longer paths
    /// Default: false
    #[serde(default)]
    pub transitive_reduction: bool,

    /// Candidate pair prefilter
    /// Default: exact
    #[serde(default)]
    pub prefilter: PrefilterMode,
}

fn default_threshold() -> f64 {
    0.95
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_batch_size() -> usize {
    64
}

impl Default for DedupConfig {
    /// Create default configuration
    ///
    /// - Threshold: 0.95
    /// - Workers: available parallelism
    /// - Batch size: 64 pairs
    /// - Exact prefilter, no deadline, all languages compared together
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            criteria: default_criteria(),
            workers: default_workers(),
            batch_size: default_batch_size(),
            timeout_secs: None,
            separate_languages: false,
            transitive_reduction: false,
            prefilter: PrefilterMode::Exact,
        }
    }
}

impl DedupConfig {
    /// Strict configuration
    ///
    /// Suitable when only byte-level re-packs should count as duplicates.
    ///
    /// - Threshold: 0.98
    /// - Transitive reduction on, so groups list only direct containment
    pub fn strict() -> Self {
        Self {
            threshold: 0.98,
            transitive_reduction: true,
            ..Self::default()
        }
    }

    /// Lenient configuration
    ///
    /// Suitable for libraries with re-encoded or lightly edited scans.
    ///
    /// - Threshold: 0.90
    /// - Languages kept apart, so translations never collapse together
    pub fn lenient() -> Self {
        Self {
            threshold: 0.90,
            separate_languages: true,
            ..Self::default()
        }
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Result<Self, DedupError> {
        match name {
            "default" => Ok(Self::default()),
            "strict" => Ok(Self::strict()),
            "lenient" => Ok(Self::lenient()),
            other => Err(DedupError::Config(format!(
                "unknown preset '{}' (expected default, strict or lenient)",
                other
            ))),
        }
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, DedupError> {
        let config: Self = toml::from_str(content).map_err(|e| DedupError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DedupError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DedupError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Check every field for a usable value
    pub fn validate(&self) -> Result<(), DedupError> {
        validate_threshold(self.threshold)?;

        if self.workers == 0 {
            return Err(DedupError::Config("workers must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(DedupError::Config("batch_size must be at least 1".to_string()));
        }
        if let PrefilterMode::Approximate { neighbours, ef_search } = self.prefilter {
            if neighbours == 0 || ef_search == 0 {
                return Err(DedupError::Config(
                    "approximate prefilter needs neighbours and ef_search of at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Get the job deadline as Duration
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Reject thresholds outside (0, 1]
pub fn validate_threshold(threshold: f64) -> Result<(), DedupError> {
    if threshold.is_finite() && threshold > 0.0 && threshold <= 1.0 {
        Ok(())
    } else {
        Err(DedupError::InvalidThreshold(threshold))
    }
}
