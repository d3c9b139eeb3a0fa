//! Equivalence resolver
//!
//! Collapses archives joined by EQUAL relations into equivalence classes.
//! Archives are dense indices `0..n` (the position of the archive in the
//! job's id-sorted archive list), so class numbering is deterministic.

/// Disjoint-set forest with path compression and union by size
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    /// Create `n` singleton sets
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Whether there are no elements
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Representative of the set containing `x`
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        // compress
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Merge the sets of `a` and `b`; returns false when already merged
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }

        let (big, small) = if self.size[ra] >= self.size[rb] { (ra, rb) } else { (rb, ra) };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        true
    }

    /// Whether `a` and `b` are in the same set
    pub fn connected(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Size of the set containing `x`
    pub fn set_size(&mut self, x: usize) -> usize {
        let root = self.find(x);
        self.size[root]
    }
}

/// A partition of archive indices into equivalence classes
///
/// Classes are numbered in order of their smallest member, and member lists
/// are ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    class_of: Vec<usize>,
    members: Vec<Vec<usize>>,
}

impl Partition {
    /// Snapshot the current sets of a union-find
    pub fn from_union_find(uf: &mut UnionFind) -> Self {
        let n = uf.len();
        let mut class_of = vec![0; n];
        let mut class_of_root: Vec<Option<usize>> = vec![None; n];
        let mut members: Vec<Vec<usize>> = Vec::new();

        for x in 0..n {
            let root = uf.find(x);
            let class = match class_of_root[root] {
                Some(class) => class,
                None => {
                    members.push(Vec::new());
                    let class = members.len() - 1;
                    class_of_root[root] = Some(class);
                    class
                }
            };
            class_of[x] = class;
            members[class].push(x);
        }

        Self { class_of, members }
    }

    /// Every archive in its own class
    pub fn singletons(n: usize) -> Self {
        Self {
            class_of: (0..n).collect(),
            members: (0..n).map(|x| vec![x]).collect(),
        }
    }

    /// Number of archives
    pub fn archive_count(&self) -> usize {
        self.class_of.len()
    }

    /// Number of classes
    pub fn class_count(&self) -> usize {
        self.members.len()
    }

    /// Class of an archive
    pub fn class_of(&self, archive: usize) -> usize {
        self.class_of[archive]
    }

    /// Members of a class, ascending
    pub fn members(&self, class: usize) -> &[usize] {
        &self.members[class]
    }

    /// Iterate `(class, members)`
    pub fn classes(&self) -> impl Iterator<Item = (usize, &[usize])> {
        self.members.iter().enumerate().map(|(c, m)| (c, m.as_slice()))
    }
}

/// Build the partition induced by a set of EQUAL pairs
///
/// Reflexive pairs are ignored.
///
/// # Examples
///
/// ```
/// use folio_dedup::resolver::resolve_equivalences;
///
/// let partition = resolve_equivalences(4, [(0, 2), (2, 3)]);
/// assert_eq!(partition.class_count(), 2);
/// assert_eq!(partition.members(0), &[0, 2, 3]);
/// assert_eq!(partition.members(1), &[1]);
/// ```
pub fn resolve_equivalences<I>(n: usize, equal_pairs: I) -> Partition
where
    I: IntoIterator<Item = (usize, usize)>,
{
    let mut uf = UnionFind::new(n);
    for (a, b) in equal_pairs {
        if a != b {
            uf.union(a, b);
        }
    }
    Partition::from_union_find(&mut uf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_find_basics() {
        let mut uf = UnionFind::new(5);
        assert!(uf.union(0, 1));
        assert!(uf.union(3, 4));
        assert!(!uf.union(1, 0));
        assert!(uf.connected(0, 1));
        assert!(!uf.connected(1, 3));
        assert_eq!(uf.set_size(4), 2);

        assert!(uf.union(1, 4));
        assert_eq!(uf.set_size(0), 4);
        assert_eq!(uf.set_size(2), 1);
    }

    #[test]
    fn test_partition_numbering_follows_smallest_member() {
        let partition = resolve_equivalences(5, [(4, 3), (1, 4)]);
        // {0}, {1,3,4}, {2}
        assert_eq!(partition.class_count(), 3);
        assert_eq!(partition.members(0), &[0]);
        assert_eq!(partition.members(1), &[1, 3, 4]);
        assert_eq!(partition.members(2), &[2]);
        assert_eq!(partition.class_of(3), 1);
    }

    #[test]
    fn test_reflexive_pairs_are_ignored() {
        let partition = resolve_equivalences(2, [(0, 0), (1, 1)]);
        assert_eq!(partition, Partition::singletons(2));
    }

    #[test]
    fn test_empty_partition() {
        let partition = resolve_equivalences(0, std::iter::empty());
        assert_eq!(partition.class_count(), 0);
        assert_eq!(partition.archive_count(), 0);
    }
}
