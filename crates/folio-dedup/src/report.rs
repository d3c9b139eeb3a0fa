//! Dedup report
//!
//! The result of one job: one group per maximal class, the archives that
//! could not be processed, how the job ended, and counters. A report carries
//! no timings, so two runs over the same input serialize identically.

use crate::scorer::DecidingCriterion;
use folio_domain::{ArchiveId, Relation, RelationKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How the job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// Every candidate pair was examined
    Complete,
    /// The deadline passed; the report covers the pairs examined so far
    TimedOut,
    /// The job was cancelled; the report covers the pairs examined so far
    Cancelled,
}

impl Completion {
    /// Whether some pairs were never examined
    pub fn is_partial(&self) -> bool {
        !matches!(self, Completion::Complete)
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Completion::Complete => "complete",
            Completion::TimedOut => "timed_out",
            Completion::Cancelled => "cancelled",
        }
    }
}

/// Why an archive was left out of the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The embedding source failed for this archive
    EmbeddingUnavailable,
    /// The archive has no pages
    EmptySequence,
    /// A page embedding is empty, non-finite or all zero
    InvalidEmbedding,
    /// The metadata source failed for this archive
    MetadataUnavailable,
}

impl SkipReason {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::EmbeddingUnavailable => "embedding_unavailable",
            SkipReason::EmptySequence => "empty_sequence",
            SkipReason::InvalidEmbedding => "invalid_embedding",
            SkipReason::MetadataUnavailable => "metadata_unavailable",
        }
    }
}

/// An archive left out of the job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedArchive {
    /// Archive id
    pub archive_id: ArchiveId,
    /// Reason category
    pub reason: SkipReason,
    /// Human-readable detail from the failing source
    pub detail: String,
}

/// One archive inside a duplicate group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    /// Archive id
    pub archive_id: ArchiveId,

    /// `equal` for members of the maximal class, `lesser` for the rest
    pub relation: RelationKind,

    /// Strength of the member's tie to the group, in [0, 1]
    pub confidence: f32,

    /// Whether this archive is the one to keep
    pub keep_recommended: bool,

    /// 1-based rank inside the member's equivalence class
    pub rank: usize,

    /// Best-ranked member of this archive's class
    pub class_canonical: ArchiveId,

    /// Number of pages
    pub page_count: usize,

    /// Archive size in bytes
    pub file_size: u64,
}

/// A maximal class and everything contained in it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// The recommended archive of the maximal class
    pub maximal_id: ArchiveId,

    /// What made `maximal_id` win inside its class, if it had rivals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deciding_criterion: Option<DecidingCriterion>,

    /// Maximal class members by rank, then lesser classes by canonical id
    pub members: Vec<GroupMember>,
}

impl DuplicateGroup {
    /// Whether the group holds more than its kept archive
    pub fn has_duplicates(&self) -> bool {
        self.members.len() > 1
    }

    /// The member recommended for keeping
    pub fn kept(&self) -> Option<&GroupMember> {
        self.members.iter().find(|m| m.keep_recommended)
    }

    /// Members not recommended for keeping
    pub fn removable(&self) -> impl Iterator<Item = &GroupMember> {
        self.members.iter().filter(|m| !m.keep_recommended)
    }

    /// Look up a member
    pub fn member(&self, id: &ArchiveId) -> Option<&GroupMember> {
        self.members.iter().find(|m| &m.archive_id == id)
    }
}

/// Counters for one job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStats {
    /// Distinct archive ids requested
    pub archives_requested: usize,
    /// Archives loaded and compared
    pub archives_loaded: usize,
    /// Candidate pairs after language separation
    pub pairs_total: usize,
    /// Pairs rejected by the prefilter
    pub pairs_pruned: usize,
    /// Pairs given the full subsequence check
    pub pairs_compared: usize,
    /// Pairs never examined because the job stopped early
    pub pairs_unexamined: usize,
    /// EQUAL relations found
    pub equal_relations: usize,
    /// LESSER relations found
    pub lesser_relations: usize,
    /// LESSER relations dropped because both ends shared a class
    pub dropped_self_loops: usize,
    /// Class cycles merged into one class
    pub merged_cycles: usize,
    /// Equivalence classes
    pub classes: usize,
    /// Maximal classes, one per group
    pub maximal_classes: usize,
}

/// How a single archive fared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveStatus {
    /// In a group of its own
    Unique,
    /// Recommended for keeping in a group with duplicates
    Keep,
    /// Equal to the kept archive, ranked lower
    EqualDuplicate,
    /// Contained in a longer archive
    LesserDuplicate,
    /// Left out of the job
    Skipped,
    /// Not part of this job
    Unknown,
}

/// The output of one dedup job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupReport {
    /// One group per maximal class, sorted by `maximal_id`
    pub groups: Vec<DuplicateGroup>,
    /// Archives left out, sorted by id
    pub skipped: Vec<SkippedArchive>,
    /// Every relation found between loaded archives, sorted by
    /// `(lesser, greater)`, before classes and cycles are resolved
    #[serde(default)]
    pub relations: Vec<Relation>,
    /// How the job ended
    pub completion: Completion,
    /// Counters
    pub stats: ReportStats,
}

impl DedupReport {
    /// Whether some pairs were never examined
    pub fn is_partial(&self) -> bool {
        self.completion.is_partial()
    }

    /// Groups that hold at least one duplicate
    pub fn duplicate_groups(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.iter().filter(|g| g.has_duplicates())
    }

    /// Archives in single-member groups, ascending
    pub fn unique_ids(&self) -> Vec<&ArchiveId> {
        self.groups
            .iter()
            .filter(|g| !g.has_duplicates())
            .map(|g| &g.maximal_id)
            .collect()
    }

    /// Every group that lists `id`
    ///
    /// A lesser archive contained in several maximal archives appears in
    /// each of their groups.
    pub fn groups_of<'a>(&'a self, id: &'a ArchiveId) -> impl Iterator<Item = &'a DuplicateGroup> + 'a {
        self.groups.iter().filter(move |g| g.member(id).is_some())
    }

    /// Relations that mention `id`
    pub fn relations_of<'a>(&'a self, id: &'a ArchiveId) -> impl Iterator<Item = &'a Relation> + 'a {
        self.relations.iter().filter(move |r| r.involves(id))
    }

    /// Classify one archive
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_dedup::{ArchiveStatus, Completion, DedupReport, ReportStats};
    /// use folio_domain::ArchiveId;
    ///
    /// let report = DedupReport {
    ///     groups: Vec::new(),
    ///     skipped: Vec::new(),
    ///     relations: Vec::new(),
    ///     completion: Completion::Complete,
    ///     stats: ReportStats::default(),
    /// };
    /// assert_eq!(report.classify(&ArchiveId::new("x")), ArchiveStatus::Unknown);
    /// ```
    pub fn classify(&self, id: &ArchiveId) -> ArchiveStatus {
        if self.skipped.iter().any(|s| &s.archive_id == id) {
            return ArchiveStatus::Skipped;
        }

        let Some((group, member)) = self
            .groups
            .iter()
            .find_map(|g| g.member(id).map(|m| (g, m)))
        else {
            return ArchiveStatus::Unknown;
        };

        if !group.has_duplicates() {
            ArchiveStatus::Unique
        } else if member.keep_recommended {
            ArchiveStatus::Keep
        } else {
            match member.relation {
                RelationKind::Equal => ArchiveStatus::EqualDuplicate,
                RelationKind::Lesser => ArchiveStatus::LesserDuplicate,
            }
        }
    }

    /// Archives not recommended for keeping, ascending and deduplicated
    pub fn removable(&self) -> Vec<&ArchiveId> {
        let ids: BTreeSet<&ArchiveId> = self
            .groups
            .iter()
            .flat_map(|g| g.removable())
            .map(|m| &m.archive_id)
            .collect();
        ids.into_iter().collect()
    }

    /// Bytes freed by deleting every removable archive once
    pub fn reclaimable_bytes(&self) -> u64 {
        let mut seen = BTreeSet::new();
        self.groups
            .iter()
            .flat_map(|g| g.removable())
            .filter(|m| seen.insert(&m.archive_id))
            .map(|m| m.file_size)
            .sum()
    }

    /// Serialize as pretty JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, relation: RelationKind, keep: bool, size: u64) -> GroupMember {
        GroupMember {
            archive_id: ArchiveId::new(id),
            relation,
            confidence: 1.0,
            keep_recommended: keep,
            rank: 1,
            class_canonical: ArchiveId::new(id),
            page_count: 3,
            file_size: size,
        }
    }

    fn sample() -> DedupReport {
        DedupReport {
            groups: vec![
                DuplicateGroup {
                    maximal_id: ArchiveId::new("big1"),
                    deciding_criterion: None,
                    members: vec![
                        member("big1", RelationKind::Equal, true, 100),
                        member("small", RelationKind::Lesser, false, 40),
                    ],
                },
                DuplicateGroup {
                    maximal_id: ArchiveId::new("big2"),
                    deciding_criterion: Some(DecidingCriterion::ArchiveId),
                    members: vec![
                        member("big2", RelationKind::Equal, true, 100),
                        member("big3", RelationKind::Equal, false, 100),
                        member("small", RelationKind::Lesser, false, 40),
                    ],
                },
                DuplicateGroup {
                    maximal_id: ArchiveId::new("solo"),
                    deciding_criterion: None,
                    members: vec![member("solo", RelationKind::Equal, true, 10)],
                },
            ],
            skipped: vec![SkippedArchive {
                archive_id: ArchiveId::new("broken"),
                reason: SkipReason::EmptySequence,
                detail: "no pages".to_string(),
            }],
            relations: vec![
                Relation::equal(ArchiveId::new("big2"), ArchiveId::new("big3"), 1.0),
                Relation::lesser(ArchiveId::new("small"), ArchiveId::new("big1"), 0.98),
                Relation::lesser(ArchiveId::new("small"), ArchiveId::new("big2"), 0.97),
            ],
            completion: Completion::Complete,
            stats: ReportStats::default(),
        }
    }

    #[test]
    fn test_classify() {
        let report = sample();
        assert_eq!(report.classify(&ArchiveId::new("big1")), ArchiveStatus::Keep);
        assert_eq!(report.classify(&ArchiveId::new("big3")), ArchiveStatus::EqualDuplicate);
        assert_eq!(report.classify(&ArchiveId::new("small")), ArchiveStatus::LesserDuplicate);
        assert_eq!(report.classify(&ArchiveId::new("solo")), ArchiveStatus::Unique);
        assert_eq!(report.classify(&ArchiveId::new("broken")), ArchiveStatus::Skipped);
        assert_eq!(report.classify(&ArchiveId::new("nope")), ArchiveStatus::Unknown);
    }

    #[test]
    fn test_removable_counts_shared_members_once() {
        let report = sample();
        let removable: Vec<&str> = report.removable().into_iter().map(|id| id.as_str()).collect();
        assert_eq!(removable, vec!["big3", "small"]);
        assert_eq!(report.reclaimable_bytes(), 140);
        assert_eq!(report.groups_of(&ArchiveId::new("small")).count(), 2);
    }

    #[test]
    fn test_duplicate_and_unique_views() {
        let report = sample();
        assert_eq!(report.duplicate_groups().count(), 2);
        assert_eq!(report.unique_ids(), vec![&ArchiveId::new("solo")]);
        assert_eq!(report.groups[1].kept().map(|m| m.archive_id.as_str()), Some("big2"));
    }

    #[test]
    fn test_json_shape() {
        let report = sample();
        let json: serde_json::Value = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();

        assert_eq!(json["completion"], "complete");
        assert_eq!(json["groups"][0]["maximal_id"], "big1");
        assert_eq!(json["groups"][0]["members"][1]["relation"], "lesser");
        assert_eq!(json["groups"][1]["deciding_criterion"], "archive_id");
        assert!(json["groups"][0].get("deciding_criterion").is_none());
        assert_eq!(json["skipped"][0]["reason"], "empty_sequence");
        assert_eq!(json["relations"][0]["kind"], "equal");
        assert_eq!(json["relations"][1]["lesser"], "small");
        assert_eq!(json["relations"][1]["greater"], "big1");

        let back: DedupReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_relations_of() {
        let report = sample();
        let small = ArchiveId::new("small");
        let greater: Vec<&str> = report.relations_of(&small).map(|r| r.greater.as_str()).collect();
        assert_eq!(greater, vec!["big1", "big2"]);
        assert_eq!(report.relations_of(&ArchiveId::new("solo")).count(), 0);
    }

    #[test]
    fn test_relations_default_when_absent() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json.as_object_mut().unwrap().remove("relations");
        let back: DedupReport = serde_json::from_value(json).unwrap();
        assert!(back.relations.is_empty());
        assert_eq!(back.groups, sample().groups);
    }

    #[test]
    fn test_partial_completion() {
        assert!(!Completion::Complete.is_partial());
        assert!(Completion::TimedOut.is_partial());
        assert!(Completion::Cancelled.is_partial());
    }
}
