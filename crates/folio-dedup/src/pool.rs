//! Comparison worker pool
//!
//! Candidate pairs are cut into fixed-size batches and run as blocking tasks
//! on a [`JoinSet`], with at most `workers` batches in flight. Cancellation
//! and the job deadline are checked before each batch is scheduled; once
//! either fires, no new batch starts and the in-flight ones are drained, so
//! every examined pair still reaches the report.

use crate::matcher::{may_contain, Containment, SequenceMatcher};
use crate::order::IndexedRelation;
use crate::report::Completion;
use crate::DedupError;
use folio_domain::Archive;
use folio_store::similarity::SimilarityError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Cooperative cancellation flag shared with a running job
///
/// # Examples
///
/// ```
/// use folio_dedup::CancelHandle;
///
/// let handle = CancelHandle::new();
/// let remote = handle.clone();
/// remote.cancel();
/// assert!(handle.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Create an unset handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the job to stop after its in-flight batches
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so the handle can be reused for another job
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Stop conditions for one job
#[derive(Debug, Clone)]
pub struct JobControl {
    cancel: CancelHandle,
    deadline: Option<Instant>,
}

impl JobControl {
    /// Control with a cancel flag and optional deadline
    pub fn new(cancel: CancelHandle, deadline: Option<Instant>) -> Self {
        Self { cancel, deadline }
    }

    /// Control that never stops a job
    pub fn unbounded() -> Self {
        Self::new(CancelHandle::new(), None)
    }

    /// Why the job should stop now, if it should
    pub fn interruption(&self) -> Option<Completion> {
        if self.cancel.is_cancelled() {
            return Some(Completion::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Completion::TimedOut),
            _ => None,
        }
    }
}

/// Candidate pair: the shorter archive first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PairTask {
    /// Index of the archive with fewer (or as many) pages
    pub short: usize,
    /// Index of the other archive
    pub long: usize,
}

/// What one batch found
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Relations found; unrelated pairs leave no trace
    pub relations: Vec<IndexedRelation>,
    /// Pairs given the full check
    pub compared: usize,
    /// Pairs rejected by the window prefilter
    pub pruned: usize,
}

impl BatchOutcome {
    fn absorb(&mut self, other: BatchOutcome) {
        self.relations.extend(other.relations);
        self.compared += other.compared;
        self.pruned += other.pruned;
    }
}

/// Everything a pool run produced
#[derive(Debug, Clone, PartialEq)]
pub struct PoolRun {
    /// Relations from every finished batch, in no particular order
    pub relations: Vec<IndexedRelation>,
    /// Pairs given the full check
    pub compared: usize,
    /// Pairs rejected by the window prefilter
    pub pruned: usize,
    /// How the run ended
    pub completion: Completion,
    /// Pairs never scheduled
    pub unexamined: usize,
}

/// Callback told `(pairs finished, pairs total)` after each batch
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Bounded pool of comparison workers
#[derive(Clone)]
pub struct ComparisonPool {
    matcher: SequenceMatcher,
    workers: usize,
    batch_size: usize,
    exact_prefilter: bool,
    progress: Option<ProgressFn>,
}

impl fmt::Debug for ComparisonPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparisonPool")
            .field("matcher", &self.matcher)
            .field("workers", &self.workers)
            .field("batch_size", &self.batch_size)
            .field("exact_prefilter", &self.exact_prefilter)
            .finish_non_exhaustive()
    }
}

impl ComparisonPool {
    /// Create a pool; zero workers or batch size are raised to one
    pub fn new(matcher: SequenceMatcher, workers: usize, batch_size: usize) -> Self {
        Self {
            matcher,
            workers: workers.max(1),
            batch_size: batch_size.max(1),
            exact_prefilter: false,
            progress: None,
        }
    }

    /// Run the window prefilter inside each batch before the full check
    pub fn with_exact_prefilter(mut self, enabled: bool) -> Self {
        self.exact_prefilter = enabled;
        self
    }

    /// Report progress after every finished batch
    ///
    /// The callback runs on the scheduling task, before the next batch is
    /// scheduled, so a cancellation it requests takes effect immediately.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Compare every pair `pairs` yields, honouring `control`
    ///
    /// `total` is the number of pairs the iterator will yield. Batches are
    /// cut from the iterator only when a worker slot is free, so at most
    /// `workers * batch_size` pairs are held at once.
    ///
    /// # Errors
    ///
    /// Fails on a dimension mismatch between two archives, or if a worker
    /// task panics.
    pub async fn run<I>(
        &self,
        archives: Arc<[Archive]>,
        pairs: I,
        total: usize,
        control: &JobControl,
    ) -> Result<PoolRun, DedupError>
    where
        I: IntoIterator<Item = PairTask>,
    {
        let mut pairs = pairs.into_iter().fuse();
        let mut set: JoinSet<Result<BatchOutcome, DedupError>> = JoinSet::new();
        let mut found = BatchOutcome::default();
        let mut completion = Completion::Complete;
        let mut scheduled = 0usize;
        let mut finished = 0usize;

        tracing::debug!(
            pairs = total,
            workers = self.workers,
            batch_size = self.batch_size,
            "Starting comparison pool"
        );

        loop {
            while completion == Completion::Complete && set.len() < self.workers {
                if let Some(reason) = control.interruption() {
                    tracing::info!(
                        "Stopping after {} of {} pairs: {}",
                        scheduled,
                        total,
                        reason.as_str()
                    );
                    completion = reason;
                    break;
                }
                let batch: Vec<PairTask> = pairs.by_ref().take(self.batch_size).collect();
                if batch.is_empty() {
                    break;
                }
                scheduled += batch.len();

                let archives = Arc::clone(&archives);
                let matcher = self.matcher;
                let exact_prefilter = self.exact_prefilter;
                set.spawn_blocking(move || compare_batch(&archives, &batch, &matcher, exact_prefilter));
            }

            match set.join_next().await {
                Some(joined) => {
                    let batch = joined.map_err(|e| DedupError::Worker(e.to_string()))??;
                    finished += batch.compared + batch.pruned;
                    found.absorb(batch);
                    if let Some(progress) = &self.progress {
                        progress(finished, total);
                    }
                }
                None => break,
            }
        }

        Ok(PoolRun {
            relations: found.relations,
            compared: found.compared,
            pruned: found.pruned,
            completion,
            unexamined: total.saturating_sub(scheduled),
        })
    }
}

/// Run one batch on the calling thread
pub fn compare_batch(
    archives: &[Archive],
    batch: &[PairTask],
    matcher: &SequenceMatcher,
    exact_prefilter: bool,
) -> Result<BatchOutcome, DedupError> {
    let mut outcome = BatchOutcome::default();
    for &PairTask { short, long } in batch {
        let (left, right) = (&archives[short], &archives[long]);
        let mismatch = |e: SimilarityError| match e {
            SimilarityError::DimensionMismatch { expected, actual } => DedupError::DimensionMismatch {
                left: left.id.clone(),
                right: right.id.clone(),
                expected,
                actual,
            },
        };

        if exact_prefilter && !may_contain(matcher, &left.pages, &right.pages).map_err(mismatch)? {
            outcome.pruned += 1;
            continue;
        }

        outcome.compared += 1;
        let relation = match matcher.compare(&left.pages, &right.pages).map_err(mismatch)? {
            Containment::Equal { confidence } => IndexedRelation::equal(short, long, confidence),
            Containment::LeftLesser { confidence } => IndexedRelation::lesser(short, long, confidence),
            Containment::RightLesser { confidence } => IndexedRelation::lesser(long, short, confidence),
            Containment::Unrelated => continue,
        };
        outcome.relations.push(relation);
    }
    Ok(outcome)
}
