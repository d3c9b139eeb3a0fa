//! Relation module - directed duplicate facts between archives

use crate::ArchiveId;

/// Kind of relation between two archives
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RelationKind {
    /// The lesser archive is a proper subsequence of the greater one
    Lesser,

    /// Both archives contain each other and have the same page count
    Equal,
}

impl RelationKind {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Lesser => "lesser",
            RelationKind::Equal => "equal",
        }
    }
}

/// A directed duplicate fact
///
/// For [`RelationKind::Equal`] the direction carries no meaning; by convention
/// `lesser` holds the smaller id so that equal relations compare stably.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relation {
    /// The contained archive
    pub lesser: ArchiveId,

    /// The containing archive
    pub greater: ArchiveId,

    /// Kind of relation
    pub kind: RelationKind,

    /// Mean similarity of the matched pages [0.0, 1.0]
    pub confidence: f32,
}

impl Relation {
    /// Create a `LESSER` relation
    ///
    /// Confidence is clamped into [0, 1].
    pub fn lesser(lesser: ArchiveId, greater: ArchiveId, confidence: f32) -> Self {
        Self {
            lesser,
            greater,
            kind: RelationKind::Lesser,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Create an `EQUAL` relation, ordering the ids canonically
    pub fn equal(a: ArchiveId, b: ArchiveId, confidence: f32) -> Self {
        let (lesser, greater) = if a <= b { (a, b) } else { (b, a) };
        Self {
            lesser,
            greater,
            kind: RelationKind::Equal,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Whether both ends name the same archive
    pub fn is_reflexive(&self) -> bool {
        self.lesser == self.greater
    }

    /// Whether the relation mentions the given archive
    pub fn involves(&self, id: &ArchiveId) -> bool {
        &self.lesser == id || &self.greater == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_orders_ids() {
        let rel = Relation::equal(ArchiveId::new("b"), ArchiveId::new("a"), 0.9);
        assert_eq!(rel.lesser, ArchiveId::new("a"));
        assert_eq!(rel.greater, ArchiveId::new("b"));
        assert_eq!(rel.kind, RelationKind::Equal);
    }

    #[test]
    fn test_lesser_keeps_direction() {
        let rel = Relation::lesser(ArchiveId::new("z"), ArchiveId::new("a"), 0.99);
        assert_eq!(rel.lesser, ArchiveId::new("z"));
        assert_eq!(rel.greater, ArchiveId::new("a"));
        assert!(rel.involves(&ArchiveId::new("a")));
        assert!(!rel.is_reflexive());
    }

    #[test]
    fn test_confidence_is_clamped() {
        let rel = Relation::lesser(ArchiveId::new("a"), ArchiveId::new("b"), 1.0000001);
        assert_eq!(rel.confidence, 1.0);
    }
}
