//! Partial order over equivalence classes
//!
//! LESSER relations become edges `lesser class -> greater class` between the
//! classes produced by the resolver. The builder guarantees an acyclic
//! result for any input:
//!
//! - EQUAL relations are unioned first
//! - a LESSER edge whose ends fall into one class is dropped and recorded
//! - any strongly connected set of classes (a contradiction such as
//!   `A < B < C < A`) is merged into one class and recorded
//!
//! Parallel edges between two classes collapse to one carrying the highest
//! confidence. A class with no outgoing edge is maximal.

use crate::resolver::{Partition, UnionFind};
use folio_domain::RelationKind;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

/// A relation between two archives, by dense archive index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedRelation {
    /// Contained archive (the smaller index for EQUAL)
    pub lesser: usize,
    /// Containing archive
    pub greater: usize,
    /// Relation kind
    pub kind: RelationKind,
    /// Mean page similarity
    pub confidence: f32,
}

impl IndexedRelation {
    /// LESSER relation
    pub fn lesser(lesser: usize, greater: usize, confidence: f32) -> Self {
        Self { lesser, greater, kind: RelationKind::Lesser, confidence }
    }

    /// EQUAL relation, ordering the indices
    pub fn equal(a: usize, b: usize, confidence: f32) -> Self {
        Self {
            lesser: a.min(b),
            greater: a.max(b),
            kind: RelationKind::Equal,
            confidence,
        }
    }
}

/// Edge to a neighbouring class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Neighbouring class
    pub class: usize,
    /// Highest confidence among the relations behind this edge
    pub confidence: f32,
}

/// Inconsistencies the builder repaired
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Repairs {
    /// LESSER relations between archives of one class, as `(lesser, greater)`
    pub dropped_self_loops: Vec<(usize, usize)>,

    /// Archive sets merged because their classes formed a cycle
    pub merged_cycles: Vec<Vec<usize>>,

    /// Relations folded into an existing edge between the same classes
    pub parallel_edges: usize,
}

impl Repairs {
    /// Whether the input was already consistent
    pub fn is_clean(&self) -> bool {
        self.dropped_self_loops.is_empty() && self.merged_cycles.is_empty()
    }
}

/// Acyclic graph of equivalence classes
#[derive(Debug, Clone)]
pub struct PartialOrderGraph {
    partition: Partition,
    successors: Vec<Vec<Edge>>,
    predecessors: Vec<Vec<Edge>>,
    topological: Option<Vec<usize>>,
    position: Vec<usize>,
    repairs: Repairs,
}

/// Builds a [`PartialOrderGraph`] from archive relations
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderBuilder {
    transitive_reduction: bool,
}

impl OrderBuilder {
    /// Create a builder that keeps every edge
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop edges implied by longer paths
    pub fn with_transitive_reduction(mut self, enabled: bool) -> Self {
        self.transitive_reduction = enabled;
        self
    }

    /// Build the class graph over archives `0..archive_count`
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_dedup::order::{IndexedRelation, OrderBuilder};
    ///
    /// // 0 == 1, both lesser than 2
    /// let graph = OrderBuilder::new().build(3, &[
    ///     IndexedRelation::equal(0, 1, 0.99),
    ///     IndexedRelation::lesser(0, 2, 0.97),
    ///     IndexedRelation::lesser(1, 2, 0.98),
    /// ]);
    /// assert_eq!(graph.class_count(), 2);
    /// assert_eq!(graph.maximal_classes(), vec![1]);
    /// assert_eq!(graph.successors(0)[0].confidence, 0.98);
    /// ```
    pub fn build(&self, archive_count: usize, relations: &[IndexedRelation]) -> PartialOrderGraph {
        let mut uf = UnionFind::new(archive_count);
        for rel in relations.iter().filter(|r| r.kind == RelationKind::Equal) {
            if rel.lesser != rel.greater {
                uf.union(rel.lesser, rel.greater);
            }
        }

        let lesser: Vec<&IndexedRelation> = relations
            .iter()
            .filter(|r| r.kind == RelationKind::Lesser && r.lesser != r.greater)
            .collect();

        let mut repairs = Repairs::default();

        // Collapsing every component yields the condensation, which is
        // acyclic; the second pass only confirms it.
        let partition = loop {
            let partition = Partition::from_union_find(&mut uf);
            let adjacency = class_adjacency(&partition, &lesser);

            let cycles: Vec<Vec<usize>> = strongly_connected_components(&adjacency)
                .into_iter()
                .filter(|component| component.len() > 1)
                .collect();
            if cycles.is_empty() {
                break partition;
            }

            for classes in cycles {
                let mut archives: Vec<usize> = classes
                    .iter()
                    .flat_map(|&c| partition.members(c).iter().copied())
                    .collect();
                archives.sort_unstable();
                for pair in archives.windows(2) {
                    uf.union(pair[0], pair[1]);
                }
                repairs.merged_cycles.push(archives);
            }
        };
        repairs.merged_cycles.sort();

        let mut edges: BTreeMap<(usize, usize), f32> = BTreeMap::new();
        for rel in &lesser {
            let (from, to) = (partition.class_of(rel.lesser), partition.class_of(rel.greater));
            if from == to {
                repairs.dropped_self_loops.push((rel.lesser, rel.greater));
                continue;
            }
            match edges.get_mut(&(from, to)) {
                Some(confidence) => {
                    repairs.parallel_edges += 1;
                    if rel.confidence > *confidence {
                        *confidence = rel.confidence;
                    }
                }
                None => {
                    edges.insert((from, to), rel.confidence);
                }
            }
        }
        repairs.dropped_self_loops.sort_unstable();

        let class_count = partition.class_count();
        let mut successors: Vec<Vec<Edge>> = vec![Vec::new(); class_count];
        for (&(from, to), &confidence) in &edges {
            successors[from].push(Edge { class: to, confidence });
        }

        if self.transitive_reduction {
            successors = transitive_reduction(successors);
        }

        let mut predecessors: Vec<Vec<Edge>> = vec![Vec::new(); class_count];
        for (from, outgoing) in successors.iter().enumerate() {
            for edge in outgoing {
                predecessors[edge.class].push(Edge { class: from, confidence: edge.confidence });
            }
        }

        let topological = kahn_order(&successors, &predecessors);
        let mut position: Vec<usize> = (0..class_count).collect();
        if let Some(order) = &topological {
            for (at, &class) in order.iter().enumerate() {
                position[class] = at;
            }
        }

        PartialOrderGraph {
            partition,
            successors,
            predecessors,
            topological,
            position,
            repairs,
        }
    }
}

impl PartialOrderGraph {
    /// The equivalence classes
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Number of classes
    pub fn class_count(&self) -> usize {
        self.partition.class_count()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.successors.iter().map(Vec::len).sum()
    }

    /// Class of an archive
    pub fn class_of(&self, archive: usize) -> usize {
        self.partition.class_of(archive)
    }

    /// Archive members of a class, ascending
    pub fn members(&self, class: usize) -> &[usize] {
        self.partition.members(class)
    }

    /// Classes strictly greater than `class` by one edge, ascending
    pub fn successors(&self, class: usize) -> &[Edge] {
        &self.successors[class]
    }

    /// Classes strictly lesser than `class` by one edge, ascending
    pub fn predecessors(&self, class: usize) -> &[Edge] {
        &self.predecessors[class]
    }

    /// Whether nothing is greater than `class`
    pub fn is_maximal(&self, class: usize) -> bool {
        self.successors[class].is_empty()
    }

    /// Maximal classes, ascending
    pub fn maximal_classes(&self) -> Vec<usize> {
        (0..self.class_count()).filter(|&c| self.is_maximal(c)).collect()
    }

    /// Inconsistencies repaired while building
    pub fn repairs(&self) -> &Repairs {
        &self.repairs
    }

    /// Every class strictly below `class`, ascending
    pub fn ancestors_lesser_than(&self, class: usize) -> Vec<usize> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<usize> = self.predecessors[class].iter().map(|e| e.class).collect();
        while let Some(c) = stack.pop() {
            if seen.insert(c) {
                stack.extend(self.predecessors[c].iter().map(|e| e.class));
            }
        }
        seen.into_iter().collect()
    }

    /// Classes ordered so every edge points forward (Kahn, smallest first)
    ///
    /// Returns `None` if the graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<usize>> {
        self.topological.clone()
    }

    /// Whether the graph has no cycle
    pub fn is_acyclic(&self) -> bool {
        self.topological.is_some()
    }

    /// Widest-path confidence from every class below `top` up to `top`
    ///
    /// The confidence of a path is its weakest edge; each class gets the best
    /// path it has. `top` itself is not included. Only the classes below
    /// `top` are visited.
    pub fn bottleneck_confidences(&self, top: usize) -> BTreeMap<usize, f32> {
        let mut best: BTreeMap<usize, f32> = BTreeMap::new();
        if self.topological.is_none() {
            return best;
        }

        // Nearest the top first, so every successor is settled first
        let mut below = self.ancestors_lesser_than(top);
        below.sort_unstable_by_key(|&c| Reverse(self.position[c]));
        for c in below {
            let mut width = f32::MIN;
            for edge in &self.successors[c] {
                let through = if edge.class == top {
                    edge.confidence
                } else {
                    match best.get(&edge.class) {
                        Some(&w) => w.min(edge.confidence),
                        None => continue,
                    }
                };
                width = width.max(through);
            }
            if width > f32::MIN {
                best.insert(c, width);
            }
        }
        best
    }
}

/// Kahn's algorithm, smallest ready class first
fn kahn_order(successors: &[Vec<Edge>], predecessors: &[Vec<Edge>]) -> Option<Vec<usize>> {
    let k = successors.len();
    let mut in_degree: Vec<usize> = predecessors.iter().map(Vec::len).collect();
    let mut ready: BTreeSet<usize> = (0..k).filter(|&c| in_degree[c] == 0).collect();
    let mut order = Vec::with_capacity(k);

    while let Some(c) = ready.pop_first() {
        order.push(c);
        for edge in &successors[c] {
            in_degree[edge.class] -= 1;
            if in_degree[edge.class] == 0 {
                ready.insert(edge.class);
            }
        }
    }

    (order.len() == k).then_some(order)
}

fn class_adjacency(partition: &Partition, lesser: &[&IndexedRelation]) -> Vec<Vec<usize>> {
    let mut adjacency: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); partition.class_count()];
    for rel in lesser {
        let (from, to) = (partition.class_of(rel.lesser), partition.class_of(rel.greater));
        if from != to {
            adjacency[from].insert(to);
        }
    }
    adjacency.into_iter().map(|s| s.into_iter().collect()).collect()
}

/// Kosaraju with explicit stacks; components are returned sorted
fn strongly_connected_components(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adjacency.len();

    let mut visited = vec![false; n];
    let mut finish_order = Vec::with_capacity(n);
    for start in 0..n {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        while let Some(top) = stack.last_mut() {
            let node = top.0;
            if top.1 < adjacency[node].len() {
                let next = adjacency[node][top.1];
                top.1 += 1;
                if !visited[next] {
                    visited[next] = true;
                    stack.push((next, 0));
                }
            } else {
                finish_order.push(node);
                stack.pop();
            }
        }
    }

    let mut reversed: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (from, targets) in adjacency.iter().enumerate() {
        for &to in targets {
            reversed[to].push(from);
        }
    }

    let mut assigned = vec![false; n];
    let mut components = Vec::new();
    for &start in finish_order.iter().rev() {
        if assigned[start] {
            continue;
        }
        assigned[start] = true;
        let mut component = vec![start];
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for &prev in &reversed[node] {
                if !assigned[prev] {
                    assigned[prev] = true;
                    component.push(prev);
                    stack.push(prev);
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }
    components.sort();
    components
}

/// Remove every edge `u -> v` for which another path `u -> w ->* v` exists
///
/// Expects an acyclic graph.
fn transitive_reduction(successors: Vec<Vec<Edge>>) -> Vec<Vec<Edge>> {
    let reachable_from = |start: usize| -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for edge in &successors[node] {
                if seen.insert(edge.class) {
                    stack.push(edge.class);
                }
            }
        }
        seen
    };

    let mut reduced = Vec::with_capacity(successors.len());
    for outgoing in &successors {
        let mut implied = BTreeSet::new();
        for edge in outgoing {
            implied.extend(reachable_from(edge.class));
        }
        reduced.push(
            outgoing
                .iter()
                .filter(|edge| !implied.contains(&edge.class))
                .copied()
                .collect(),
        );
    }
    reduced
}
