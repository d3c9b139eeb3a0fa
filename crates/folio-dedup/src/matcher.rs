//! Subsequence matcher
//!
//! Decides whether one page sequence is contained, in order, in another, and
//! classifies a pair of archives as equal, one lesser than the other, or
//! unrelated.
//!
//! # Algorithm
//!
//! With `S` the similarity predicate under the job threshold, `A ⊑ B` holds
//! when there is a strictly increasing map `f` from pages of `A` to pages of
//! `B` with `S(A[i], B[f(i)])` for every `i`. The decision runs a dynamic
//! program over prefixes:
//!
//! ```text
//! M[0][j] = true
//! M[i][j] = (M[i-1][j-1] && S(A[i-1], B[j-1])) || M[i][j-1]
//! ```
//!
//! and keeps only two rows, so memory is linear in `|B|`. Unlike a greedy
//! scan, the program never commits to an early match that a later page of
//! `A` needed.
//!
//! The pairwise similarity matrix is computed once per pair and shared by
//! both directions of the check.

use folio_domain::EmbeddingVector;
use folio_store::similarity::{cosine_similarity, meets_threshold, SimilarityError};

/// Pairwise page similarities between two archives
///
/// Row `i` holds the similarity of page `i` of the left archive to every page
/// of the right archive.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f32>,
}

impl SimilarityMatrix {
    /// Compute every pairwise similarity
    pub fn compute(left: &[EmbeddingVector], right: &[EmbeddingVector]) -> Result<Self, SimilarityError> {
        let mut values = Vec::with_capacity(left.len() * right.len());
        for a in left {
            for b in right {
                values.push(cosine_similarity(a.as_slice(), b.as_slice())?);
            }
        }
        Ok(Self {
            rows: left.len(),
            cols: right.len(),
            values,
        })
    }

    /// Number of left pages
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of right pages
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Similarity of left page `i` and right page `j`
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.values[i * self.cols + j]
    }

    fn transposed(&self) -> MatrixView<'_> {
        MatrixView { matrix: self, transposed: true }
    }

    fn view(&self) -> MatrixView<'_> {
        MatrixView { matrix: self, transposed: false }
    }
}

/// Read-only view of a matrix, optionally with rows and columns swapped
#[derive(Clone, Copy)]
struct MatrixView<'a> {
    matrix: &'a SimilarityMatrix,
    transposed: bool,
}

impl MatrixView<'_> {
    fn rows(&self) -> usize {
        if self.transposed {
            self.matrix.cols
        } else {
            self.matrix.rows
        }
    }

    fn cols(&self) -> usize {
        if self.transposed {
            self.matrix.rows
        } else {
            self.matrix.cols
        }
    }

    fn get(&self, i: usize, j: usize) -> f32 {
        if self.transposed {
            self.matrix.get(j, i)
        } else {
            self.matrix.get(i, j)
        }
    }
}

/// An order-preserving page mapping from a shorter archive into a longer one
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    /// `targets[i]` is the page of the containing archive matched to page `i`
    pub targets: Vec<usize>,

    /// Mean similarity of the matched page pairs
    pub confidence: f32,
}

/// Outcome of comparing two archives
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Containment {
    /// Same length and page-by-page similar
    Equal {
        /// Mean similarity along the mapping
        confidence: f32,
    },

    /// The left archive is a proper subsequence of the right one
    LeftLesser {
        /// Mean similarity along the mapping
        confidence: f32,
    },

    /// The right archive is a proper subsequence of the left one
    RightLesser {
        /// Mean similarity along the mapping
        confidence: f32,
    },

    /// Neither archive contains the other
    Unrelated,
}

/// Subsequence matcher bound to one similarity threshold
///
/// # Examples
///
/// ```
/// use folio_dedup::matcher::{Containment, SequenceMatcher};
/// use folio_domain::EmbeddingVector;
///
/// let page = |v: [f32; 2]| EmbeddingVector::new(v.to_vec());
/// let short = vec![page([1.0, 0.0])];
/// let long = vec![page([0.0, 1.0]), page([1.0, 0.0])];
///
/// let matcher = SequenceMatcher::new(0.95);
/// assert!(matcher.is_subsequence(&short, &long).unwrap());
/// assert!(matches!(
///     matcher.compare(&short, &long).unwrap(),
///     Containment::LeftLesser { .. }
/// ));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceMatcher {
    threshold: f32,
}

impl SequenceMatcher {
    /// Create a matcher for the given threshold in (0, 1]
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold as f32,
        }
    }

    /// The page similarity threshold
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Whether `a ⊑ b`
    ///
    /// An empty `a` is contained in everything.
    pub fn is_subsequence(&self, a: &[EmbeddingVector], b: &[EmbeddingVector]) -> Result<bool, SimilarityError> {
        if a.is_empty() {
            return Ok(true);
        }
        if a.len() > b.len() {
            return Ok(false);
        }
        let matrix = SimilarityMatrix::compute(a, b)?;
        Ok(self.contains(matrix.view()))
    }

    /// The leftmost mapping of `a` into `b`, if `a ⊑ b`
    pub fn find_mapping(&self, a: &[EmbeddingVector], b: &[EmbeddingVector]) -> Result<Option<Mapping>, SimilarityError> {
        if a.len() > b.len() {
            return Ok(None);
        }
        let matrix = SimilarityMatrix::compute(a, b)?;
        Ok(self.mapping(matrix.view()))
    }

    /// Classify a pair of archives
    ///
    /// Equal length and `a ⊑ b` gives [`Containment::Equal`]; a shorter side
    /// contained in the longer one gives the matching lesser variant.
    pub fn compare(&self, a: &[EmbeddingVector], b: &[EmbeddingVector]) -> Result<Containment, SimilarityError> {
        if a.is_empty() || b.is_empty() {
            return Ok(Containment::Unrelated);
        }
        let matrix = SimilarityMatrix::compute(a, b)?;
        Ok(self.classify(&matrix))
    }

    /// Classify a pair from a precomputed matrix (rows are `a`, columns `b`)
    pub fn classify(&self, matrix: &SimilarityMatrix) -> Containment {
        let (n, m) = (matrix.rows(), matrix.cols());
        if n == 0 || m == 0 {
            return Containment::Unrelated;
        }

        if n <= m {
            match self.mapping(matrix.view()) {
                Some(mapping) if n == m => Containment::Equal {
                    confidence: mapping.confidence,
                },
                Some(mapping) => Containment::LeftLesser {
                    confidence: mapping.confidence,
                },
                None => Containment::Unrelated,
            }
        } else {
            match self.mapping(matrix.transposed()) {
                Some(mapping) => Containment::RightLesser {
                    confidence: mapping.confidence,
                },
                None => Containment::Unrelated,
            }
        }
    }

    fn matches(&self, similarity: f32) -> bool {
        meets_threshold(similarity, self.threshold)
    }

    /// Rolling-row evaluation of the containment recurrence
    fn contains(&self, view: MatrixView<'_>) -> bool {
        let (n, m) = (view.rows(), view.cols());
        if n > m {
            return false;
        }

        let mut prev = vec![true; m + 1];
        let mut curr = vec![false; m + 1];
        for i in 1..=n {
            curr[0] = false;
            for j in 1..=m {
                curr[j] = (prev[j - 1] && self.matches(view.get(i - 1, j - 1))) || curr[j - 1];
            }
            if !curr[m] {
                return false;
            }
            std::mem::swap(&mut prev, &mut curr);
        }
        prev[m]
    }

    /// First valid mapping in index order
    ///
    /// Matching each page to the earliest admissible page of the containing
    /// archive yields the lexicographically smallest mapping, and succeeds
    /// exactly when the recurrence does.
    fn mapping(&self, view: MatrixView<'_>) -> Option<Mapping> {
        if !self.contains(view) {
            return None;
        }

        let (n, m) = (view.rows(), view.cols());
        let mut targets = Vec::with_capacity(n);
        let mut total = 0.0f64;
        let mut next = 0;
        for i in 0..n {
            let j = (next..m).find(|&j| self.matches(view.get(i, j)))?;
            total += f64::from(view.get(i, j));
            targets.push(j);
            next = j + 1;
        }

        let confidence = if n == 0 { 1.0 } else { (total / n as f64) as f32 };
        Some(Mapping {
            targets,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }
}

/// Cheap necessary condition for `short ⊑ long`
///
/// The first page of `short` must match a page of `long` that leaves room
/// for the rest, and the last page must match a page late enough to follow
/// the others. Pairs that fail cannot be related; pairs that pass still need
/// the full check.
pub fn may_contain(
    matcher: &SequenceMatcher,
    short: &[EmbeddingVector],
    long: &[EmbeddingVector],
) -> Result<bool, SimilarityError> {
    let (n, m) = (short.len(), long.len());
    if n == 0 || n > m {
        return Ok(n == 0);
    }

    let any_match = |page: &EmbeddingVector, window: &[EmbeddingVector]| -> Result<bool, SimilarityError> {
        for candidate in window {
            if matcher.matches(cosine_similarity(page.as_slice(), candidate.as_slice())?) {
                return Ok(true);
            }
        }
        Ok(false)
    };

    let first_ok = any_match(&short[0], &long[..=m - n])?;
    if !first_ok {
        return Ok(false);
    }
    any_match(&short[n - 1], &long[n - 1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Distinct unit pages: page `k` points along axis `k`
    fn pages(axes: &[usize]) -> Vec<EmbeddingVector> {
        axes.iter()
            .map(|&k| {
                let mut v = vec![0.0; 8];
                v[k] = 1.0;
                EmbeddingVector::new(v)
            })
            .collect()
    }

    #[test]
    fn test_empty_is_contained_everywhere() {
        let matcher = SequenceMatcher::new(0.95);
        assert!(matcher.is_subsequence(&[], &pages(&[0, 1])).unwrap());
        assert!(matcher.is_subsequence(&[], &[]).unwrap());
    }

    #[test]
    fn test_longer_is_never_contained_in_shorter() {
        let matcher = SequenceMatcher::new(0.95);
        assert!(!matcher.is_subsequence(&pages(&[0, 1]), &pages(&[0])).unwrap());
    }

    #[test]
    fn test_order_matters() {
        let matcher = SequenceMatcher::new(0.95);
        assert!(matcher.is_subsequence(&pages(&[1, 3]), &pages(&[0, 1, 2, 3])).unwrap());
        assert!(!matcher.is_subsequence(&pages(&[3, 1]), &pages(&[0, 1, 2, 3])).unwrap());
    }

    #[test]
    fn test_leftmost_mapping() {
        let matcher = SequenceMatcher::new(0.95);
        let mapping = matcher
            .find_mapping(&pages(&[1, 2]), &pages(&[1, 1, 2, 2]))
            .unwrap()
            .unwrap();
        assert_eq!(mapping.targets, vec![0, 2]);
        assert!((mapping.confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_pages_need_distinct_targets() {
        let matcher = SequenceMatcher::new(0.95);
        assert!(!matcher.is_subsequence(&pages(&[1, 1]), &pages(&[0, 1, 2])).unwrap());
        assert!(matcher.is_subsequence(&pages(&[1, 1]), &pages(&[1, 0, 1])).unwrap());
    }

    #[test]
    fn test_compare_classifies_both_directions() {
        let matcher = SequenceMatcher::new(0.95);
        let short = pages(&[0, 2]);
        let long = pages(&[0, 1, 2]);

        assert!(matches!(matcher.compare(&short, &long).unwrap(), Containment::LeftLesser { .. }));
        assert!(matches!(matcher.compare(&long, &short).unwrap(), Containment::RightLesser { .. }));
        assert!(matches!(matcher.compare(&long, &long).unwrap(), Containment::Equal { .. }));
        assert_eq!(matcher.compare(&short, &pages(&[3, 4, 5])).unwrap(), Containment::Unrelated);
    }

    #[test]
    fn test_equal_length_permutation_is_unrelated() {
        let matcher = SequenceMatcher::new(0.95);
        assert_eq!(
            matcher.compare(&pages(&[0, 1]), &pages(&[1, 0])).unwrap(),
            Containment::Unrelated
        );
    }

    #[test]
    fn test_confidence_is_mean_of_matched_pages() {
        let matcher = SequenceMatcher::new(0.9);
        let a = vec![
            EmbeddingVector::new(vec![1.0, 0.0]),
            EmbeddingVector::new(vec![0.0, 1.0]),
        ];
        // second page tilted slightly: cos ~= 0.98
        let b = vec![
            EmbeddingVector::new(vec![1.0, 0.0]),
            EmbeddingVector::new(vec![0.2, 1.0]),
        ];
        match matcher.compare(&a, &b).unwrap() {
            Containment::Equal { confidence } => {
                let expected = (1.0 + 1.0 / (1.04f64).sqrt()) / 2.0;
                assert!((f64::from(confidence) - expected).abs() < 1e-5);
            }
            other => panic!("expected equal, got {:?}", other),
        }
    }

    #[test]
    fn test_threshold_one_accepts_identical_pages() {
        let matcher = SequenceMatcher::new(1.0);
        let a = vec![EmbeddingVector::new(vec![0.3, 0.4, 0.5])];
        assert!(matches!(matcher.compare(&a, &a.clone()).unwrap(), Containment::Equal { .. }));
    }

    #[test]
    fn test_dimension_mismatch_is_reported() {
        let matcher = SequenceMatcher::new(0.95);
        let a = vec![EmbeddingVector::new(vec![1.0, 0.0])];
        let b = vec![EmbeddingVector::new(vec![1.0, 0.0, 0.0])];
        assert!(matches!(
            matcher.compare(&a, &b),
            Err(SimilarityError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_may_contain_windows() {
        let matcher = SequenceMatcher::new(0.95);
        let long = pages(&[0, 1, 2, 3]);

        assert!(may_contain(&matcher, &pages(&[1, 3]), &long).unwrap());
        // first page only appears after the leading window
        assert!(!may_contain(&matcher, &pages(&[3, 3]), &long).unwrap());
        // last page only appears before the trailing window
        assert!(!may_contain(&matcher, &pages(&[0, 0]), &long).unwrap());
        assert!(!may_contain(&matcher, &long, &pages(&[0])).unwrap());
    }
}
