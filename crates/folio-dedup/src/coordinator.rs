//! Dedup job coordinator
//!
//! Runs one job end to end: load archives, fan out pairwise comparisons,
//! resolve classes and the partial order, rank every class and assemble the
//! report.

use crate::config::{validate_threshold, DedupConfig, PrefilterMode};
use crate::criteria::ScoringCriterion;
use crate::matcher::SequenceMatcher;
use crate::order::{IndexedRelation, OrderBuilder, PartialOrderGraph};
use crate::pool::{CancelHandle, ComparisonPool, JobControl, PairTask, PoolRun, ProgressFn};
use crate::report::{
    DedupReport, DuplicateGroup, GroupMember, ReportStats, SkipReason, SkippedArchive,
};
use crate::scorer::{Candidate, DecidingCriterion, MetadataScorer};
use crate::{DedupError, DedupMetrics};
use folio_domain::traits::{CandidateIndex, EmbeddingSource, MetadataSource};
use folio_domain::{Archive, ArchiveId, Language, Relation, RelationKind};
use folio_store::similarity::meets_threshold;
use folio_store::vector_index::VectorIndex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::sync::Arc;
use tokio::time::Instant;

/// Dedup job coordinator
///
/// Responsible for:
/// - Loading embeddings and metadata, skipping archives that cannot be used
/// - Scheduling pairwise comparisons on the worker pool
/// - Building equivalence classes and the partial order between them
/// - Ranking every class and assembling one group per maximal class
/// - Collecting metrics across jobs
///
/// # Examples
///
/// ```
/// use folio_dedup::{DedupConfig, DedupCoordinator};
/// use folio_domain::{Archive, ArchiveId, ArchiveMetadata, EmbeddingVector};
/// use folio_store::MemoryStore;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let page = |v: [f32; 2]| EmbeddingVector::new(v.to_vec());
/// let store: MemoryStore = [
///     Archive::new(ArchiveId::new("short"), vec![page([1.0, 0.0])], ArchiveMetadata::default()),
///     Archive::new(ArchiveId::new("long"), vec![page([1.0, 0.0]), page([0.0, 1.0])], ArchiveMetadata::default()),
/// ]
/// .into_iter()
/// .collect();
///
/// let mut coordinator = DedupCoordinator::new(&store, &store, DedupConfig::default());
/// let report = coordinator.run(store.archive_ids()).await?;
/// assert_eq!(report.groups.len(), 1);
/// assert_eq!(report.groups[0].maximal_id.as_str(), "long");
/// # Ok(())
/// # }
/// ```
pub struct DedupCoordinator<E, M> {
    embeddings: E,
    metadata: M,
    config: DedupConfig,
    metrics: DedupMetrics,
    cancel: CancelHandle,
    progress: Option<ProgressFn>,
}

impl<E, M> DedupCoordinator<E, M>
where
    E: EmbeddingSource,
    E::Error: Display,
    M: MetadataSource,
    M::Error: Display,
{
    /// Create a coordinator over an embedding source and a metadata source
    pub fn new(embeddings: E, metadata: M, config: DedupConfig) -> Self {
        Self {
            embeddings,
            metadata,
            config,
            metrics: DedupMetrics::new(),
            cancel: CancelHandle::new(),
            progress: None,
        }
    }

    /// Call `progress` with `(pairs finished, pairs total)` after each batch
    ///
    /// Without a callback, progress is logged at debug level.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Share an existing cancel handle with this coordinator
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that cancels the running job
    ///
    /// A cancelled handle stays set until [`CancelHandle::reset`] is called.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// The configuration
    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Get a reference to the current metrics
    pub fn metrics(&self) -> &DedupMetrics {
        &self.metrics
    }

    /// Reset metrics counters
    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    /// Run a job with the configured threshold and criteria
    pub async fn run<I>(&mut self, archive_ids: I) -> Result<DedupReport, DedupError>
    where
        I: IntoIterator<Item = ArchiveId>,
    {
        self.config.validate()?;
        let threshold = self.config.threshold;
        let criteria = self.config.criteria.clone();
        self.run_dedup(archive_ids, threshold, &criteria).await
    }

    /// Run a job
    ///
    /// Duplicate ids are ignored. Archives whose embeddings or metadata
    /// cannot be used are listed in `skipped`. If the job is cancelled or
    /// hits its deadline, the report covers the pairs examined so far and
    /// its completion says why.
    ///
    /// # Errors
    ///
    /// - [`DedupError::InvalidThreshold`] before any work starts
    /// - [`DedupError::DimensionMismatch`] if the loaded archives disagree on
    ///   embedding dimension
    /// - [`DedupError::Index`] or [`DedupError::Worker`] on infrastructure
    ///   failures
    pub async fn run_dedup<I>(
        &mut self,
        archive_ids: I,
        threshold: f64,
        criteria: &[ScoringCriterion],
    ) -> Result<DedupReport, DedupError>
    where
        I: IntoIterator<Item = ArchiveId>,
    {
        validate_threshold(threshold)?;

        let started = std::time::Instant::now();
        let deadline = self.config.timeout().map(|t| Instant::now() + t);
        let control = JobControl::new(self.cancel.clone(), deadline);

        let ids: BTreeSet<ArchiveId> = archive_ids.into_iter().collect();
        tracing::info!(
            archives = ids.len(),
            threshold,
            prefilter = self.config.prefilter.as_str(),
            "Starting dedup job"
        );

        let (archives, skipped) = self.load_archives(&ids);
        check_dimensions(&archives)?;
        let archives: Arc<[Archive]> = archives.into();

        let matcher = SequenceMatcher::new(threshold);
        let pairs = CandidatePairs::new(&archives, self.config.separate_languages);
        let pairs_total = pairs.total();

        let progress: ProgressFn = match self.progress.clone() {
            Some(progress) => progress,
            None => Arc::new(|done: usize, total: usize| {
                tracing::debug!(done, total, "Comparison progress")
            }),
        };
        let pool = ComparisonPool::new(matcher, self.config.workers, self.config.batch_size)
            .with_exact_prefilter(self.config.prefilter == PrefilterMode::Exact)
            .with_progress(progress);

        let (run, index_pruned): (PoolRun, usize) = match self.config.prefilter {
            PrefilterMode::Approximate { neighbours, ef_search } => {
                let dimension = archives.first().and_then(Archive::dimension).unwrap_or(0);
                let index = VectorIndex::new(dimension).with_ef_search(ef_search);
                let near = approximate_pairs(
                    &index,
                    &archives,
                    threshold,
                    neighbours,
                    self.config.separate_languages,
                )?;
                let kept = near.len();
                tracing::debug!(kept, pruned = pairs_total - kept, "Approximate prefilter applied");
                let run = pool.run(Arc::clone(&archives), near, kept, &control).await?;
                (run, pairs_total - kept)
            }
            PrefilterMode::Exact | PrefilterMode::Off => {
                let run = pool.run(Arc::clone(&archives), pairs, pairs_total, &control).await?;
                (run, 0)
            }
        };

        let mut stats = ReportStats {
            archives_requested: ids.len(),
            archives_loaded: archives.len(),
            pairs_total,
            pairs_pruned: index_pruned + run.pruned,
            pairs_compared: run.compared,
            pairs_unexamined: run.unexamined,
            ..Default::default()
        };

        let completion = run.completion;
        let mut relations = run.relations;
        relations.sort_by(|a, b| {
            (a.lesser, a.greater, a.kind)
                .cmp(&(b.lesser, b.greater, b.kind))
                .then_with(|| a.confidence.total_cmp(&b.confidence))
        });
        stats.equal_relations = relations.iter().filter(|r| r.kind == RelationKind::Equal).count();
        stats.lesser_relations = relations.len() - stats.equal_relations;

        let graph = OrderBuilder::new()
            .with_transitive_reduction(self.config.transitive_reduction)
            .build(archives.len(), &relations);
        log_repairs(&archives, &graph);

        let repairs = graph.repairs();
        stats.dropped_self_loops = repairs.dropped_self_loops.len();
        stats.merged_cycles = repairs.merged_cycles.len();
        stats.classes = graph.class_count();

        let scorer = MetadataScorer::new(criteria.to_vec());
        let groups = assemble_groups(&archives, &graph, &relations, &scorer);
        stats.maximal_classes = groups.len();

        let report = DedupReport {
            groups,
            skipped,
            relations: relations.iter().map(|r| relation_by_id(&archives, r)).collect(),
            completion,
            stats,
        };

        let elapsed = started.elapsed();
        self.metrics.record_job(&report, elapsed);
        tracing::info!(
            groups = report.stats.maximal_classes,
            duplicates = report.removable().len(),
            skipped = report.skipped.len(),
            completion = report.completion.as_str(),
            "Dedup job finished in {:?}",
            elapsed
        );

        Ok(report)
    }

    /// Load every requested archive in id order
    fn load_archives(&self, ids: &BTreeSet<ArchiveId>) -> (Vec<Archive>, Vec<SkippedArchive>) {
        let mut archives = Vec::with_capacity(ids.len());
        let mut skipped = Vec::new();

        for id in ids {
            match self.load_archive(id) {
                Ok(archive) => archives.push(archive),
                Err(skip) => {
                    tracing::warn!(
                        "Skipping archive {}: {} ({})",
                        id,
                        skip.reason.as_str(),
                        skip.detail
                    );
                    skipped.push(skip);
                }
            }
        }

        (archives, skipped)
    }

    fn load_archive(&self, id: &ArchiveId) -> Result<Archive, SkippedArchive> {
        let skip = |reason: SkipReason, detail: String| SkippedArchive {
            archive_id: id.clone(),
            reason,
            detail,
        };

        let pages = self
            .embeddings
            .get_embedding_sequence(id)
            .map_err(|e| skip(SkipReason::EmbeddingUnavailable, e.to_string()))?;
        if pages.is_empty() {
            return Err(skip(SkipReason::EmptySequence, "archive has no pages".to_string()));
        }
        if let Some(bad) = pages.iter().position(|p| !p.is_valid()) {
            return Err(skip(
                SkipReason::InvalidEmbedding,
                format!("page {} is empty, non-finite or all zero", bad + 1),
            ));
        }

        let metadata = self
            .metadata
            .get_metadata(id)
            .map_err(|e| skip(SkipReason::MetadataUnavailable, e.to_string()))?;

        Ok(Archive::new(id.clone(), pages, metadata))
    }
}

/// Fail the job if any page disagrees with the first archive's dimension
fn check_dimensions(archives: &[Archive]) -> Result<(), DedupError> {
    let Some(reference) = archives.first() else {
        return Ok(());
    };
    let Some(expected) = reference.dimension() else {
        return Ok(());
    };

    for archive in archives {
        if let Some(page) = archive.pages.iter().find(|p| p.dimension() != expected) {
            return Err(DedupError::DimensionMismatch {
                left: reference.id.clone(),
                right: archive.id.clone(),
                expected,
                actual: page.dimension(),
            });
        }
    }
    Ok(())
}

/// Every unordered pair, shorter archive first, optionally within languages
///
/// Pairs are produced on demand, so a job never holds the full pair list.
#[derive(Debug, Clone)]
struct CandidatePairs<'a> {
    archives: &'a [Archive],
    languages: Vec<Language>,
    separate_languages: bool,
    i: usize,
    j: usize,
}

impl<'a> CandidatePairs<'a> {
    fn new(archives: &'a [Archive], separate_languages: bool) -> Self {
        Self {
            archives,
            languages: archives.iter().map(|a| a.metadata.language()).collect(),
            separate_languages,
            i: 0,
            j: 0,
        }
    }

    /// How many pairs the iterator yields in total
    fn total(&self) -> usize {
        let pairs = |n: usize| n * n.saturating_sub(1) / 2;
        if !self.separate_languages {
            return pairs(self.archives.len());
        }
        let mut per_language: BTreeMap<Language, usize> = BTreeMap::new();
        for &language in &self.languages {
            *per_language.entry(language).or_default() += 1;
        }
        per_language.into_values().map(pairs).sum()
    }
}

impl Iterator for CandidatePairs<'_> {
    type Item = PairTask;

    fn next(&mut self) -> Option<PairTask> {
        let n = self.archives.len();
        loop {
            self.j += 1;
            if self.j >= n {
                self.i += 1;
                self.j = self.i + 1;
                if self.j >= n {
                    self.i = n;
                    self.j = n;
                    return None;
                }
            }
            let (i, j) = (self.i, self.j);
            if self.separate_languages && self.languages[i] != self.languages[j] {
                continue;
            }
            return Some(oriented(self.archives, i, j));
        }
    }
}

/// The pair with the archive holding fewer pages first
fn oriented(archives: &[Archive], a: usize, b: usize) -> PairTask {
    if archives[b].page_count() < archives[a].page_count() {
        PairTask { short: b, long: a }
    } else {
        PairTask { short: a, long: b }
    }
}

/// Pairs where one archive's first page has a close page in the other,
/// according to `index`
///
/// Each archive's first page is looked up with `neighbours` results, and the
/// lookup is widened while its weakest result still meets the threshold. A
/// hit from either side keeps the pair.
fn approximate_pairs<I>(
    index: &I,
    archives: &[Archive],
    threshold: f64,
    neighbours: usize,
    separate_languages: bool,
) -> Result<Vec<PairTask>, DedupError>
where
    I: CandidateIndex,
    I::Error: Display,
{
    let index_error = |e: I::Error| DedupError::Index(e.to_string());
    let threshold = threshold as f32;

    index.clear();
    for archive in archives {
        for page in &archive.pages {
            index.insert_page(&archive.id, page).map_err(index_error)?;
        }
    }

    let position: BTreeMap<&ArchiveId, usize> =
        archives.iter().enumerate().map(|(i, a)| (&a.id, i)).collect();
    let mut near: BTreeSet<(usize, usize)> = BTreeSet::new();
    for (i, archive) in archives.iter().enumerate() {
        let Some(first) = archive.first_page() else {
            continue;
        };

        let mut k = neighbours.max(1).min(archives.len());
        let hits = loop {
            let hits = index.nearest_archives(first, k).map_err(index_error)?;
            let saturated = hits.len() >= k
                && hits.last().is_some_and(|&(_, similarity)| meets_threshold(similarity, threshold));
            if !saturated || k >= archives.len() {
                break hits;
            }
            k = (k * 2).min(archives.len());
        };

        for (owner, similarity) in hits {
            if !meets_threshold(similarity, threshold) {
                continue;
            }
            match position.get(&owner) {
                Some(&j) if j != i => {
                    near.insert((i.min(j), i.max(j)));
                }
                _ => {}
            }
        }
    }
    index.clear();

    let languages: Vec<Language> = archives.iter().map(|a| a.metadata.language()).collect();
    Ok(near
        .into_iter()
        .filter(|&(a, b)| !separate_languages || languages[a] == languages[b])
        .map(|(a, b)| oriented(archives, a, b))
        .collect())
}

fn relation_by_id(archives: &[Archive], relation: &IndexedRelation) -> Relation {
    let lesser = archives[relation.lesser].id.clone();
    let greater = archives[relation.greater].id.clone();
    match relation.kind {
        RelationKind::Equal => Relation::equal(lesser, greater, relation.confidence),
        RelationKind::Lesser => Relation::lesser(lesser, greater, relation.confidence),
    }
}

fn log_repairs(archives: &[Archive], graph: &PartialOrderGraph) {
    let repairs = graph.repairs();
    for &(lesser, greater) in &repairs.dropped_self_loops {
        tracing::warn!(
            "Dropping LESSER relation {} < {}: both archives are in one equivalence class",
            archives[lesser].id,
            archives[greater].id
        );
    }
    for cycle in &repairs.merged_cycles {
        let ids: Vec<&str> = cycle.iter().map(|&a| archives[a].id.as_str()).collect();
        tracing::warn!(
            "Merging archives with contradictory LESSER relations into one class: {}",
            ids.join(", ")
        );
    }
}

/// Members of one class, best first, and what separated the top two
struct ClassRanking {
    ordered: Vec<usize>,
    deciding: Option<DecidingCriterion>,
}

fn rank_classes(archives: &[Archive], graph: &PartialOrderGraph, scorer: &MetadataScorer) -> Vec<ClassRanking> {
    (0..graph.class_count())
        .map(|class| {
            let members = graph.members(class);
            let candidates: Vec<Candidate<'_>> = members
                .iter()
                .map(|&a| Candidate {
                    id: &archives[a].id,
                    metadata: &archives[a].metadata,
                })
                .collect();
            let ranking = scorer.rank(&candidates);
            ClassRanking {
                ordered: ranking.order.iter().map(|&p| members[p]).collect(),
                deciding: ranking.deciding,
            }
        })
        .collect()
}

fn group_member(
    archive: &Archive,
    relation: RelationKind,
    confidence: f32,
    keep_recommended: bool,
    rank: usize,
    class_canonical: &Archive,
) -> GroupMember {
    GroupMember {
        archive_id: archive.id.clone(),
        relation,
        confidence,
        keep_recommended,
        rank,
        class_canonical: class_canonical.id.clone(),
        page_count: archive.page_count(),
        file_size: archive.metadata.file_size,
    }
}

/// One group per maximal class, sorted by kept archive id
fn assemble_groups(
    archives: &[Archive],
    graph: &PartialOrderGraph,
    relations: &[IndexedRelation],
    scorer: &MetadataScorer,
) -> Vec<DuplicateGroup> {
    let rankings = rank_classes(archives, graph, scorer);

    let mut strongest_equal: Vec<Option<f32>> = vec![None; archives.len()];
    for rel in relations.iter().filter(|r| r.kind == RelationKind::Equal) {
        for end in [rel.lesser, rel.greater] {
            let slot = &mut strongest_equal[end];
            *slot = Some(slot.map_or(rel.confidence, |c| c.max(rel.confidence)));
        }
    }

    let mut groups = Vec::new();
    for top in graph.maximal_classes() {
        let ranking = &rankings[top];
        let Some(&canonical) = ranking.ordered.first() else {
            continue;
        };

        let mut members = Vec::new();
        for (pos, &a) in ranking.ordered.iter().enumerate() {
            let confidence = if pos == 0 { 1.0 } else { strongest_equal[a].unwrap_or(0.0) };
            members.push(group_member(
                &archives[a],
                RelationKind::Equal,
                confidence,
                pos == 0,
                pos + 1,
                &archives[canonical],
            ));
        }

        let widths = graph.bottleneck_confidences(top);
        let mut lesser_classes: Vec<(usize, usize)> = graph
            .ancestors_lesser_than(top)
            .into_iter()
            .filter_map(|class| rankings[class].ordered.first().map(|&c| (class, c)))
            .collect();
        lesser_classes.sort_by(|x, y| archives[x.1].id.cmp(&archives[y.1].id));

        for (class, class_canonical) in lesser_classes {
            let confidence = widths.get(&class).copied().unwrap_or(0.0);
            for (pos, &a) in rankings[class].ordered.iter().enumerate() {
                members.push(group_member(
                    &archives[a],
                    RelationKind::Lesser,
                    confidence,
                    false,
                    pos + 1,
                    &archives[class_canonical],
                ));
            }
        }

        groups.push(DuplicateGroup {
            maximal_id: archives[canonical].id.clone(),
            deciding_criterion: ranking.deciding,
            members,
        });
    }

    groups.sort_by(|a, b| a.maximal_id.cmp(&b.maximal_id));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::parse_criteria;
    use crate::report::{ArchiveStatus, Completion};
    use folio_domain::{ArchiveMetadata, EmbeddingVector};
    use folio_store::MemoryStore;

    fn axis(k: usize) -> EmbeddingVector {
        let mut v = vec![0.0; 8];
        v[k] = 1.0;
        EmbeddingVector::new(v)
    }

    fn archive(id: &str, axes: &[usize], metadata: ArchiveMetadata) -> Archive {
        Archive::new(ArchiveId::new(id), axes.iter().map(|&k| axis(k)).collect(), metadata)
    }

    fn test_config() -> DedupConfig {
        DedupConfig {
            workers: 2,
            batch_size: 2,
            ..DedupConfig::default()
        }
    }

    #[tokio::test]
    async fn test_equal_class_keeps_best_scored() {
        let store: MemoryStore = [
            archive("a", &[0, 1, 2], ArchiveMetadata { favorites: 1, ..Default::default() }),
            archive("b", &[0, 1, 2], ArchiveMetadata { favorites: 9, ..Default::default() }),
            archive("c", &[0, 2], ArchiveMetadata::default()),
        ]
        .into_iter()
        .collect();

        let mut coordinator = DedupCoordinator::new(&store, &store, test_config());
        let report = coordinator.run(store.archive_ids()).await.unwrap();

        assert_eq!(report.groups.len(), 1);
        let group = &report.groups[0];
        assert_eq!(group.maximal_id.as_str(), "b");
        assert_eq!(group.deciding_criterion.map(|d| d.to_string()).as_deref(), Some("favorites:desc"));

        let ids: Vec<&str> = group.members.iter().map(|m| m.archive_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(report.classify(&ArchiveId::new("a")), ArchiveStatus::EqualDuplicate);
        assert_eq!(report.classify(&ArchiveId::new("c")), ArchiveStatus::LesserDuplicate);
        assert_eq!(group.members[1].rank, 2);
        assert_eq!(group.members[1].class_canonical.as_str(), "b");
        assert_eq!(report.stats.equal_relations, 1);
        assert_eq!(report.stats.lesser_relations, 2);
    }

    #[tokio::test]
    async fn test_custom_criteria_override_config() {
        let store: MemoryStore = [
            archive("a", &[0, 1], ArchiveMetadata { file_size: 10, favorites: 9, ..Default::default() }),
            archive("b", &[0, 1], ArchiveMetadata { file_size: 20, favorites: 1, ..Default::default() }),
        ]
        .into_iter()
        .collect();

        let mut coordinator = DedupCoordinator::new(&store, &store, test_config());
        let criteria = parse_criteria(["file_size"]).unwrap();
        let report = coordinator
            .run_dedup(store.archive_ids(), 0.95, &criteria)
            .await
            .unwrap();
        assert_eq!(report.groups[0].maximal_id.as_str(), "b");
    }

    #[tokio::test]
    async fn test_invalid_embedding_is_skipped() {
        let mut store: MemoryStore = [archive("ok", &[0], ArchiveMetadata::default())].into_iter().collect();
        store.insert(Archive::new(
            ArchiveId::new("nan"),
            vec![EmbeddingVector::new(vec![f32::NAN; 8])],
            ArchiveMetadata::default(),
        ));
        store.insert(Archive::new(ArchiveId::new("empty"), Vec::new(), ArchiveMetadata::default()));

        let mut coordinator = DedupCoordinator::new(&store, &store, test_config());
        let report = coordinator.run(store.archive_ids()).await.unwrap();

        let reasons: Vec<(&str, SkipReason)> = report
            .skipped
            .iter()
            .map(|s| (s.archive_id.as_str(), s.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![("empty", SkipReason::EmptySequence), ("nan", SkipReason::InvalidEmbedding)]
        );
        assert_eq!(report.groups.len(), 1);
        assert_eq!(coordinator.metrics().total_skipped(), 2);
    }

    #[tokio::test]
    async fn test_missing_metadata_is_skipped() {
        let mut store = MemoryStore::new();
        store.insert_pages(ArchiveId::new("orphan"), vec![axis(0)]);

        let mut coordinator = DedupCoordinator::new(&store, &store, test_config());
        let report = coordinator.run([ArchiveId::new("orphan")]).await.unwrap();
        assert_eq!(report.skipped[0].reason, SkipReason::MetadataUnavailable);
        assert!(report.groups.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_job_is_partial() {
        let store: MemoryStore = [
            archive("a", &[0], ArchiveMetadata::default()),
            archive("b", &[0, 1], ArchiveMetadata::default()),
        ]
        .into_iter()
        .collect();

        let mut coordinator = DedupCoordinator::new(&store, &store, test_config());
        coordinator.cancel_handle().cancel();
        let report = coordinator.run(store.archive_ids()).await.unwrap();

        assert_eq!(report.completion, Completion::Cancelled);
        assert_eq!(report.stats.pairs_unexamined, 1);
        assert_eq!(report.groups.len(), 2);
    }

    fn candidates(archives: &[Archive], separate_languages: bool) -> Vec<PairTask> {
        CandidatePairs::new(archives, separate_languages).collect()
    }

    #[test]
    fn test_candidate_pairs_put_shorter_first() {
        let archives = vec![
            archive("a", &[0, 1, 2], ArchiveMetadata::default()),
            archive("b", &[0], ArchiveMetadata::default()),
        ];
        assert_eq!(candidates(&archives, false), vec![PairTask { short: 1, long: 0 }]);
    }

    #[test]
    fn test_candidate_pairs_cover_every_pair_once() {
        let archives: Vec<Archive> = (0..5)
            .map(|i| archive(&format!("a{}", i), &[i], ArchiveMetadata::default()))
            .collect();
        let pairs = CandidatePairs::new(&archives, false);
        assert_eq!(pairs.total(), 10);

        let seen: BTreeSet<(usize, usize)> = pairs.map(|p| (p.short, p.long)).collect();
        let expected: BTreeSet<(usize, usize)> =
            (0..5).flat_map(|i| (i + 1..5).map(move |j| (i, j))).collect();
        assert_eq!(seen, expected);

        assert_eq!(CandidatePairs::new(&archives[..1], false).count(), 0);
        assert_eq!(CandidatePairs::new(&[], false).total(), 0);
    }

    #[test]
    fn test_candidate_pairs_respect_languages() {
        let english = ArchiveMetadata { tags: vec!["language:english".into()], ..Default::default() };
        let japanese = ArchiveMetadata { tags: vec!["language:japanese".into()], ..Default::default() };
        let archives = vec![
            archive("a", &[0], english.clone()),
            archive("b", &[0], japanese),
            archive("c", &[0], english),
        ];
        assert_eq!(candidates(&archives, false).len(), 3);
        assert_eq!(candidates(&archives, true), vec![PairTask { short: 0, long: 2 }]);
        assert_eq!(CandidatePairs::new(&archives, true).total(), 1);
    }

    #[test]
    fn test_approximate_pairs_see_past_identical_crowd() {
        let archives: Vec<Archive> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| archive(id, &[0], ArchiveMetadata::default()))
            .collect();
        let index = VectorIndex::new(8);

        let near = approximate_pairs(&index, &archives, 0.95, 1, false).unwrap();
        let seen: BTreeSet<(usize, usize)> = near.iter().map(|p| (p.short, p.long)).collect();
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_approximate_pairs_look_up_shorter_side() {
        // "long" starts with a page that is nowhere in "short", so only the
        // lookup from "short" finds the pair
        let archives = vec![
            archive("long", &[3, 0, 1], ArchiveMetadata::default()),
            archive("short", &[0, 1], ArchiveMetadata::default()),
        ];
        let index = VectorIndex::new(8);

        let near = approximate_pairs(&index, &archives, 0.95, 2, false).unwrap();
        assert_eq!(near, vec![PairTask { short: 1, long: 0 }]);
    }

    #[tokio::test]
    async fn test_report_lists_relations_by_id() {
        let store: MemoryStore = [
            archive("a", &[0], ArchiveMetadata::default()),
            archive("b", &[0, 1], ArchiveMetadata::default()),
            archive("c", &[0, 1], ArchiveMetadata::default()),
        ]
        .into_iter()
        .collect();

        let mut coordinator = DedupCoordinator::new(&store, &store, test_config());
        let report = coordinator.run(store.archive_ids()).await.unwrap();

        let relations: Vec<(&str, &str, RelationKind)> = report
            .relations
            .iter()
            .map(|r| (r.lesser.as_str(), r.greater.as_str(), r.kind))
            .collect();
        assert_eq!(
            relations,
            vec![
                ("a", "b", RelationKind::Lesser),
                ("a", "c", RelationKind::Lesser),
                ("b", "c", RelationKind::Equal),
            ]
        );
        assert!(report.relations.iter().all(|r| r.confidence > 0.99));
    }

    #[tokio::test]
    async fn test_progress_callback_sees_every_pair() {
        let store: MemoryStore = (0..4)
            .map(|i| archive(&format!("a{}", i), &[i], ArchiveMetadata::default()))
            .collect();
        let last = Arc::new(std::sync::Mutex::new((0, 0)));
        let seen = Arc::clone(&last);

        let mut coordinator = DedupCoordinator::new(&store, &store, test_config())
            .with_progress(Arc::new(move |done: usize, total: usize| {
                *seen.lock().unwrap() = (done, total)
            }));
        let report = coordinator.run(store.archive_ids()).await.unwrap();

        assert_eq!(*last.lock().unwrap(), (6, 6));
        assert_eq!(report.stats.pairs_compared + report.stats.pairs_pruned, 6);
    }

    #[test]
    fn test_check_dimensions() {
        let archives = vec![
            archive("a", &[0], ArchiveMetadata::default()),
            Archive::new(ArchiveId::new("b"), vec![EmbeddingVector::new(vec![1.0; 4])], ArchiveMetadata::default()),
        ];
        assert!(matches!(
            check_dimensions(&archives),
            Err(DedupError::DimensionMismatch { expected: 8, actual: 4, .. })
        ));
        assert!(check_dimensions(&[]).is_ok());
    }
}
