//! Folio Dedup
//!
//! Finds duplicate archives in a library by comparing their per-page
//! embedding sequences.
//!
//! # Overview
//!
//! The engine is responsible for:
//! - **Matching**: deciding whether one archive's pages appear, in order, in
//!   another's
//! - **Equivalence**: collapsing archives with identical page runs into classes
//! - **Ordering**: building the partial order "contained in" between classes
//! - **Ranking**: choosing, inside every class, the copy worth keeping
//! - **Reporting**: one group per maximal class, with skipped archives listed
//!
//! # Relations
//!
//! | Relation | Condition | Report |
//! |----------|-----------|--------|
//! | **Equal** | same page count, page-by-page similar | same class; one kept, the rest `equal` duplicates |
//! | **Lesser** | proper order-preserving subsequence | `lesser` member of every group above it |
//! | **Unrelated** | neither contains the other | separate groups |
//!
//! An archive with no relation forms a single-member group and is reported
//! as unique.
//!
//! # Usage
//!
//! ```no_run
//! use folio_dedup::{DedupConfig, DedupCoordinator};
//! use folio_store::SqliteStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::new("folio.db")?;
//!     let ids = store.archive_ids()?;
//!
//!     let mut coordinator = DedupCoordinator::new(&store, &store, DedupConfig::default());
//!     let report = coordinator.run(ids).await?;
//!
//!     for group in report.duplicate_groups() {
//!         println!("keep {}", group.maximal_id);
//!         for member in group.removable() {
//!             println!("  remove {} ({})", member.archive_id, member.relation.as_str());
//!         }
//!     }
//!     println!("\n{}", coordinator.metrics().summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration Presets
//!
//! ```
//! use folio_dedup::DedupConfig;
//!
//! // Default: threshold 0.95, exact prefilter
//! let config = DedupConfig::default();
//!
//! // Strict: threshold 0.98 with transitive reduction
//! let config = DedupConfig::strict();
//!
//! // Lenient: threshold 0.90, languages kept apart
//! let config = DedupConfig::lenient();
//! ```
//!
//! # Configuration
//!
//! A job can be configured via TOML:
//!
//! ```toml
//! threshold = 0.95
//! criteria = ["static_category", "favorites", "decensored", "file_size:desc"]
//! workers = 8
//! batch_size = 64
//! timeout_secs = 600
//! separate_languages = false
//! transitive_reduction = false
//!
//! [prefilter]
//! mode = "exact"
//! ```
//!
//! # Cancellation and Deadlines
//!
//! Both are checked between comparison batches. A job that stops early still
//! returns a report, marked [`Completion::TimedOut`] or
//! [`Completion::Cancelled`], covering every pair examined so far.

#![warn(missing_docs)]

mod config;
mod coordinator;
mod criteria;
mod error;
mod metrics;
pub mod matcher;
pub mod order;
pub mod pool;
pub mod report;
pub mod resolver;
pub mod scorer;

pub use config::{validate_threshold, DedupConfig, PrefilterMode};
pub use coordinator::DedupCoordinator;
pub use criteria::{default_criteria, parse_criteria, MetadataKey, ScoringCriterion, SortOrder};
pub use error::DedupError;
pub use metrics::DedupMetrics;
pub use pool::{CancelHandle, ProgressFn};
pub use report::{
    ArchiveStatus, Completion, DedupReport, DuplicateGroup, GroupMember, ReportStats, SkipReason,
    SkippedArchive,
};
pub use scorer::DecidingCriterion;
