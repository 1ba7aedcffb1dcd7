//! Key ranges: half-open byte intervals assigned to a shard.

use serde::{Deserialize, Serialize};

use std::cmp::Ordering;
use std::fmt::Display;

/// A half-open interval `[lower, upper)` of sharding key
/// values, assigned to a single data shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    pub id: String,
    pub lower: Vec<u8>,
    pub upper: Vec<u8>,
    pub shard: String,
}

impl KeyRange {
    pub fn new(
        id: impl ToString,
        lower: impl Into<Vec<u8>>,
        upper: impl Into<Vec<u8>>,
        shard: impl ToString,
    ) -> Self {
        Self {
            id: id.to_string(),
            lower: lower.into(),
            upper: upper.into(),
            shard: shard.to_string(),
        }
    }

    /// Key is inside the range. Lower bound is inclusive,
    /// upper bound is exclusive. An empty lower bound sorts
    /// as -inf, an empty upper bound as +inf.
    pub fn contains(&self, key: &[u8]) -> bool {
        let above_lower =
            self.lower.is_empty() || cmp_bounds(&self.lower, key) != Ordering::Greater;
        let below_upper = self.upper.is_empty() || cmp_bounds(key, &self.upper) == Ordering::Less;

        above_lower && below_upper
    }

    /// Ranges overlap. Only meaningful between unlocked ranges;
    /// the catalog enforces disjointness for those.
    pub fn overlaps(&self, other: &KeyRange) -> bool {
        let self_below = !self.upper.is_empty()
            && !other.lower.is_empty()
            && cmp_bounds(&self.upper, &other.lower) != Ordering::Greater;
        let other_below = !other.upper.is_empty()
            && !self.lower.is_empty()
            && cmp_bounds(&other.upper, &self.lower) != Ordering::Greater;

        !(self_below || other_below)
    }
}

impl Display for KeyRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}, {}) -> {}",
            self.id,
            String::from_utf8_lossy(&self.lower),
            String::from_utf8_lossy(&self.upper),
            self.shard
        )
    }
}

/// Compare two sharding key values: shorter keys sort first,
/// equal-length keys compare bytewise. Decimal keys without
/// leading zeros therefore compare numerically.
pub fn cmp_bounds(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Advisory lock state of a key range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    Unlocked,
    Locked,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_contains() {
        let kr = KeyRange::new("kr1", "00", "50", "shard1");

        assert!(kr.contains(b"00")); // lower bound is inclusive
        assert!(kr.contains(b"10"));
        assert!(kr.contains(b"49"));
        assert!(!kr.contains(b"50")); // upper bound is exclusive
        assert!(!kr.contains(b"99"));
    }

    #[test]
    fn test_unbounded() {
        let all = KeyRange::new("kr", "", "", "shard1");
        assert!(all.contains(b""));
        assert!(all.contains(b"anything"));

        let from = KeyRange::new("kr", "50", "", "shard1");
        assert!(from.contains(b"50"));
        assert!(from.contains(b"200")); // longer key sorts above "50"
        assert!(!from.contains(b"10"));

        let to = KeyRange::new("kr", "", "50", "shard1");
        assert!(to.contains(b"10"));
        assert!(to.contains(b"4"));
        assert!(!to.contains(b"50"));
    }

    #[test]
    fn test_length_first_order() {
        assert_eq!(cmp_bounds(b"9", b"10"), Ordering::Less);
        assert_eq!(cmp_bounds(b"200", b"50"), Ordering::Greater);
        assert_eq!(cmp_bounds(b"10", b"50"), Ordering::Less);
        assert_eq!(cmp_bounds(b"50", b"50"), Ordering::Equal);
    }

    #[test]
    fn test_overlaps() {
        let k1 = KeyRange::new("k1", "00", "50", "shard1");
        let k2 = KeyRange::new("k2", "50", "", "shard2");
        assert!(!k1.overlaps(&k2));
        assert!(!k2.overlaps(&k1));

        let k3 = KeyRange::new("k3", "40", "60", "shard1");
        assert!(k1.overlaps(&k3));
        assert!(k3.overlaps(&k2));

        let all = KeyRange::new("all", "", "", "shard1");
        assert!(all.overlaps(&k1));
    }
}
