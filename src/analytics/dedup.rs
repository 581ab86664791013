//! Near-duplicate detection over page fingerprints.
//!
//! The page processor only sees the [`DuplicateIndex`] trait, so the lookup
//! strategy can change without touching the pipeline:
//! - [`ExactMatchIndex`]: a page is a duplicate only if its fingerprint equals
//!   an earlier one.
//! - [`HammingIndex`]: a page is a duplicate if an earlier fingerprint lies
//!   within `max_distance` bits. Lookups are bucketed by band so only
//!   fingerprints sharing at least one band are compared.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::simhash::Fingerprint;

pub trait DuplicateIndex: Send + Sync {
    /// Returns the stored fingerprint that `fingerprint` duplicates, if any.
    fn find_duplicate(&self, fingerprint: &Fingerprint) -> Option<Fingerprint>;

    fn insert(&mut self, fingerprint: Fingerprint);

    /// Stored fingerprints in insertion order.
    fn fingerprints(&self) -> &[Fingerprint];

    fn is_duplicate(&self, fingerprint: &Fingerprint) -> bool {
        self.find_duplicate(fingerprint).is_some()
    }

    fn len(&self) -> usize {
        self.fingerprints().len()
    }

    fn is_empty(&self) -> bool {
        self.fingerprints().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    #[default]
    Exact,
    Hamming { max_distance: u32 },
}

impl DedupStrategy {
    pub fn build(self) -> Box<dyn DuplicateIndex> {
        match self {
            DedupStrategy::Exact => Box::new(ExactMatchIndex::default()),
            DedupStrategy::Hamming { max_distance } => Box::new(HammingIndex::new(max_distance)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExactMatchIndex {
    order: Vec<Fingerprint>,
    seen: HashSet<Fingerprint>,
}

impl DuplicateIndex for ExactMatchIndex {
    fn find_duplicate(&self, fingerprint: &Fingerprint) -> Option<Fingerprint> {
        self.seen.get(fingerprint).copied()
    }

    fn insert(&mut self, fingerprint: Fingerprint) {
        if self.seen.insert(fingerprint) {
            self.order.push(fingerprint);
        }
    }

    fn fingerprints(&self) -> &[Fingerprint] {
        &self.order
    }
}

#[derive(Debug, Clone)]
pub struct HammingIndex {
    max_distance: u32,
    bands: u32,
    order: Vec<Fingerprint>,
    // (band index, band value) -> positions in `order`
    buckets: HashMap<(u32, u64), Vec<usize>>,
}

impl HammingIndex {
    /// Two fingerprints within `max_distance` bits agree on at least one of
    /// `max_distance + 1` bands, so those bands are the bucket keys.
    pub fn new(max_distance: u32) -> Self {
        Self {
            max_distance,
            bands: max_distance.saturating_add(1),
            order: Vec::new(),
            buckets: HashMap::new(),
        }
    }

    pub fn max_distance(&self) -> u32 {
        self.max_distance
    }
}

impl DuplicateIndex for HammingIndex {
    fn find_duplicate(&self, fingerprint: &Fingerprint) -> Option<Fingerprint> {
        (0..self.bands)
            .filter_map(|band| {
                self.buckets
                    .get(&(band, fingerprint.band(band, self.bands)))
            })
            .flatten()
            .map(|&position| self.order[position])
            .find(|candidate| candidate.hamming_distance(fingerprint) <= self.max_distance)
    }

    fn insert(&mut self, fingerprint: Fingerprint) {
        let position = self.order.len();
        self.order.push(fingerprint);
        for band in 0..self.bands {
            self.buckets
                .entry((band, fingerprint.band(band, self.bands)))
                .or_default()
                .push(position);
        }
    }

    fn fingerprints(&self) -> &[Fingerprint] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(bits: u64) -> Fingerprint {
        Fingerprint::from_bits(bits, 16)
    }

    #[test]
    fn exact_index_matches_only_equal_fingerprints() {
        let mut index = ExactMatchIndex::default();
        index.insert(fp(0b1010_1010_1010_1010));
        assert!(index.is_duplicate(&fp(0b1010_1010_1010_1010)));
        assert!(!index.is_duplicate(&fp(0b1010_1010_1010_1011)));
    }

    #[test]
    fn exact_index_keeps_insertion_order_without_repeats() {
        let mut index = ExactMatchIndex::default();
        for bits in [3, 1, 2, 1] {
            index.insert(fp(bits));
        }
        assert_eq!(index.fingerprints(), &[fp(3), fp(1), fp(2)]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn hamming_index_finds_close_fingerprints() {
        let mut index = HammingIndex::new(2);
        let original = fp(0b1111_0000_1111_0000);
        index.insert(original);

        assert_eq!(index.find_duplicate(&original), Some(original));
        assert_eq!(index.find_duplicate(&fp(0b1111_0000_1111_0011)), Some(original));
        assert_eq!(index.find_duplicate(&fp(0b1111_0000_1111_0111)), None);
    }

    #[test]
    fn hamming_index_agrees_with_linear_scan() {
        let stored: Vec<Fingerprint> = (0..64u64)
            .map(|i| fp(i.wrapping_mul(0x9e37_79b9_7f4a_7c15) >> 48))
            .collect();
        let mut index = HammingIndex::new(3);
        for f in &stored {
            index.insert(*f);
        }

        for probe in (0..512u64).map(|i| fp(i.wrapping_mul(0xc2b2_ae3d_27d4_eb4f) >> 48)) {
            let linear = stored.iter().any(|s| s.hamming_distance(&probe) <= 3);
            assert_eq!(index.is_duplicate(&probe), linear, "probe {probe}");
        }
    }

    #[test]
    fn strategy_builds_matching_index() {
        let mut exact = DedupStrategy::Exact.build();
        exact.insert(fp(1));
        assert!(!exact.is_duplicate(&fp(3)));

        let mut near = DedupStrategy::Hamming { max_distance: 1 }.build();
        near.insert(fp(1));
        assert!(near.is_duplicate(&fp(3)));
        assert!(!near.is_empty());
    }

    #[test]
    fn strategy_deserializes_from_config_values() {
        let exact: DedupStrategy = serde_json::from_str(r#""exact""#).unwrap();
        assert_eq!(exact, DedupStrategy::Exact);
        let near: DedupStrategy =
            serde_json::from_str(r#"{"hamming": {"max_distance": 3}}"#).unwrap();
        assert_eq!(near, DedupStrategy::Hamming { max_distance: 3 });
    }
}
