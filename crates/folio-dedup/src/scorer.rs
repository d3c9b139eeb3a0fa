//! Metadata scorer
//!
//! Ranks the members of an equivalence class so exactly one is recommended
//! for keeping. Criteria are applied lexicographically; archive id ascending
//! breaks any remaining tie, so the ranking is total and deterministic.

use crate::criteria::ScoringCriterion;
use folio_domain::{ArchiveId, ArchiveMetadata};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One archive as seen by the scorer
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Archive id, the final tie-break
    pub id: &'a ArchiveId,
    /// Metadata bag
    pub metadata: &'a ArchiveMetadata,
}

/// What separated the best member of a class from the runner-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DecidingCriterion {
    /// A configured criterion
    Criterion(ScoringCriterion),
    /// Every criterion tied; the smaller archive id won
    ArchiveId,
}

impl fmt::Display for DecidingCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecidingCriterion::Criterion(c) => write!(f, "{}", c),
            DecidingCriterion::ArchiveId => f.write_str("archive_id"),
        }
    }
}

impl From<DecidingCriterion> for String {
    fn from(value: DecidingCriterion) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for DecidingCriterion {
    type Error = crate::DedupError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "archive_id" {
            Ok(DecidingCriterion::ArchiveId)
        } else {
            value.parse().map(DecidingCriterion::Criterion)
        }
    }
}

/// Result of ranking one class
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    /// Positions into the input slice, best first
    pub order: Vec<usize>,
    /// Why the first beat the second; `None` for a single member
    pub deciding: Option<DecidingCriterion>,
}

impl Ranking {
    /// Position of the recommended member
    pub fn best(&self) -> Option<usize> {
        self.order.first().copied()
    }
}

/// Lexicographic metadata ranking
///
/// # Examples
///
/// ```
/// use folio_dedup::scorer::{Candidate, MetadataScorer};
/// use folio_dedup::parse_criteria;
/// use folio_domain::{ArchiveId, ArchiveMetadata};
///
/// let scorer = MetadataScorer::new(parse_criteria(["favorites"]).unwrap());
/// let (a, b) = (ArchiveId::new("a"), ArchiveId::new("b"));
/// let low = ArchiveMetadata { favorites: 1, ..Default::default() };
/// let high = ArchiveMetadata { favorites: 9, ..Default::default() };
///
/// let ranking = scorer.rank(&[
///     Candidate { id: &a, metadata: &low },
///     Candidate { id: &b, metadata: &high },
/// ]);
/// assert_eq!(ranking.order, vec![1, 0]);
/// assert_eq!(ranking.deciding.unwrap().to_string(), "favorites:desc");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataScorer {
    criteria: Vec<ScoringCriterion>,
}

impl MetadataScorer {
    /// Create a scorer; an empty list ranks by archive id alone
    pub fn new(criteria: Vec<ScoringCriterion>) -> Self {
        Self { criteria }
    }

    /// Configured criteria
    pub fn criteria(&self) -> &[ScoringCriterion] {
        &self.criteria
    }

    /// Total order; `Less` means `a` should be kept over `b`
    pub fn compare(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
        self.criteria
            .iter()
            .map(|c| c.compare(a.metadata, b.metadata))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| a.id.cmp(b.id))
    }

    /// The criterion that orders `a` before `b`
    pub fn deciding(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> DecidingCriterion {
        self.criteria
            .iter()
            .find(|c| c.compare(a.metadata, b.metadata).is_ne())
            .map(|c| DecidingCriterion::Criterion(*c))
            .unwrap_or(DecidingCriterion::ArchiveId)
    }

    /// Rank candidates, best first
    pub fn rank(&self, candidates: &[Candidate<'_>]) -> Ranking {
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&x, &y| self.compare(&candidates[x], &candidates[y]));

        let deciding = match order.as_slice() {
            [first, second, ..] => Some(self.deciding(&candidates[*first], &candidates[*second])),
            _ => None,
        };
        Ranking { order, deciding }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{default_criteria, parse_criteria};

    fn ids(n: usize) -> Vec<ArchiveId> {
        (0..n).map(|i| ArchiveId::new(format!("id{}", i))).collect()
    }

    fn candidates<'a>(ids: &'a [ArchiveId], metas: &'a [ArchiveMetadata]) -> Vec<Candidate<'a>> {
        ids.iter()
            .zip(metas)
            .map(|(id, metadata)| Candidate { id, metadata })
            .collect()
    }

    #[test]
    fn test_lexicographic_priority() {
        let scorer = MetadataScorer::new(parse_criteria(["static_category", "file_size"]).unwrap());
        let ids = ids(3);
        let metas = vec![
            ArchiveMetadata { file_size: 900, ..Default::default() },
            ArchiveMetadata { file_size: 100, in_static_category: true, ..Default::default() },
            ArchiveMetadata { file_size: 500, ..Default::default() },
        ];
        let ranking = scorer.rank(&candidates(&ids, &metas));
        assert_eq!(ranking.order, vec![1, 0, 2]);
        assert_eq!(ranking.deciding.unwrap().to_string(), "static_category:desc");
    }

    #[test]
    fn test_tie_breaks_on_archive_id() {
        let scorer = MetadataScorer::new(default_criteria());
        let ids = vec![ArchiveId::new("b"), ArchiveId::new("a")];
        let metas = vec![ArchiveMetadata::default(), ArchiveMetadata::default()];
        let ranking = scorer.rank(&candidates(&ids, &metas));
        assert_eq!(ranking.order, vec![1, 0]);
        assert_eq!(ranking.deciding, Some(DecidingCriterion::ArchiveId));
    }

    #[test]
    fn test_single_member_has_no_deciding_criterion() {
        let scorer = MetadataScorer::new(default_criteria());
        let ids = ids(1);
        let metas = vec![ArchiveMetadata::default()];
        let ranking = scorer.rank(&candidates(&ids, &metas));
        assert_eq!(ranking.best(), Some(0));
        assert!(ranking.deciding.is_none());
    }

    #[test]
    fn test_ascending_upload_time() {
        let scorer = MetadataScorer::new(parse_criteria(["upload_time"]).unwrap());
        let ids = ids(2);
        let metas = vec![
            ArchiveMetadata { upload_time: 2_000, ..Default::default() },
            ArchiveMetadata { upload_time: 1_000, ..Default::default() },
        ];
        assert_eq!(scorer.rank(&candidates(&ids, &metas)).best(), Some(1));
    }

    #[test]
    fn test_deciding_criterion_serde() {
        let json = serde_json::to_string(&DecidingCriterion::ArchiveId).unwrap();
        assert_eq!(json, r#""archive_id""#);

        let back: DecidingCriterion = serde_json::from_str(r#""favorites:desc""#).unwrap();
        assert_eq!(back.to_string(), "favorites:desc");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::criteria::default_criteria;
    use proptest::prelude::*;

    fn metadata() -> impl Strategy<Value = ArchiveMetadata> {
        (0u64..4, 0u64..4, any::<bool>(), 0u32..3).prop_map(|(file_size, favorites, pinned, progress)| {
            ArchiveMetadata {
                file_size,
                favorites,
                in_static_category: pinned,
                reading_progress: progress,
                ..Default::default()
            }
        })
    }

    proptest! {
        #[test]
        fn ranking_ignores_input_order(metas in proptest::collection::vec(metadata(), 1..8)) {
            let scorer = MetadataScorer::new(default_criteria());
            let ids: Vec<ArchiveId> = (0..metas.len()).map(|i| ArchiveId::new(format!("{:02}", i))).collect();

            let forward: Vec<Candidate> = ids.iter().zip(&metas).map(|(id, metadata)| Candidate { id, metadata }).collect();
            let mut backward = forward.clone();
            backward.reverse();

            let best_forward = forward[scorer.rank(&forward).order[0]].id;
            let best_backward = backward[scorer.rank(&backward).order[0]].id;
            prop_assert_eq!(best_forward, best_backward);
        }

        #[test]
        fn best_is_never_beaten(metas in proptest::collection::vec(metadata(), 1..8)) {
            let scorer = MetadataScorer::new(default_criteria());
            let ids: Vec<ArchiveId> = (0..metas.len()).map(|i| ArchiveId::new(format!("{:02}", i))).collect();
            let candidates: Vec<Candidate> = ids.iter().zip(&metas).map(|(id, metadata)| Candidate { id, metadata }).collect();

            let best = &candidates[scorer.rank(&candidates).order[0]];
            for other in &candidates {
                prop_assert_ne!(scorer.compare(other, best), Ordering::Less);
            }
        }
    }
}
