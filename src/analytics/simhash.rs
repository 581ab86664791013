//! Weighted SimHash over a page's token frequencies.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Fixed seed so fingerprints are identical across runs and machines.
pub const FINGERPRINT_SEED: u64 = 0x5eed_c0de_2024_0001;

pub const DEFAULT_FINGERPRINT_BITS: u8 = 16;
pub const MAX_FINGERPRINT_BITS: u8 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    bits: u64,
    width: u8,
}

impl Fingerprint {
    /// Builds a fingerprint from raw bits, masking anything above `width`.
    pub fn from_bits(bits: u64, width: u8) -> Self {
        let width = width.clamp(1, MAX_FINGERPRINT_BITS);
        Self {
            bits: bits & mask(width),
            width,
        }
    }

    /// For every bit position, each distinct token votes +count when its
    /// hash has the bit set and -count otherwise. Only strictly positive
    /// totals produce a 1.
    pub fn compute(frequencies: &HashMap<String, u32>, width: u8) -> Self {
        let width = width.clamp(1, MAX_FINGERPRINT_BITS);
        let mut votes = [0i64; MAX_FINGERPRINT_BITS as usize];

        for (token, &count) in frequencies {
            let hash = token_hash(token);
            let weight = i64::from(count);
            for (bit, vote) in votes.iter_mut().take(width as usize).enumerate() {
                if (hash >> bit) & 1 == 1 {
                    *vote += weight;
                } else {
                    *vote -= weight;
                }
            }
        }

        let bits = votes
            .iter()
            .take(width as usize)
            .enumerate()
            .filter(|(_, vote)| **vote > 0)
            .fold(0u64, |acc, (bit, _)| acc | (1u64 << bit));

        Self { bits, width }
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn hamming_distance(&self, other: &Fingerprint) -> u32 {
        (self.bits ^ other.bits).count_ones()
    }

    /// The `index`-th slice of `bands` equal-width slices, used as a bucket key.
    pub(crate) fn band(&self, index: u32, bands: u32) -> u64 {
        let band_width = u32::from(self.width).div_ceil(bands).max(1);
        let shift = index * band_width;
        if shift >= u32::from(self.width) {
            return 0;
        }
        let len = band_width.min(u32::from(self.width) - shift);
        (self.bits >> shift) & mask(len as u8)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$b}", self.bits, width = self.width as usize)
    }
}

fn token_hash(token: &str) -> u64 {
    xxh3_64_with_seed(token.as_bytes(), FINGERPRINT_SEED)
}

fn mask(width: u8) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Tokenizer;

    fn freqs(text: &str) -> HashMap<String, u32> {
        Tokenizer::default().frequencies(text)
    }

    #[test]
    fn identical_distributions_give_identical_fingerprints() {
        let a = freqs("graph search index graph crawler");
        let b = freqs("crawler index graph search graph");
        assert_eq!(Fingerprint::compute(&a, 16), Fingerprint::compute(&b, 16));
    }

    #[test]
    fn recomputing_is_stable() {
        let page = freqs("informatics department research faculty students courses");
        let first = Fingerprint::compute(&page, 16);
        let second = Fingerprint::compute(&page, 16);
        assert_eq!(first, second);
        assert_eq!(first.hamming_distance(&second), 0);
    }

    #[test]
    fn single_token_copies_its_hash_bits() {
        let page = freqs("crawler");
        let fp = Fingerprint::compute(&page, 64);
        assert_eq!(fp.bits(), token_hash("crawler"));
    }

    #[test]
    fn tied_votes_round_to_zero() {
        let mut page = HashMap::new();
        page.insert("alpha".to_string(), 1);
        page.insert("beta".to_string(), 1);

        // Where the two hashes disagree the vote is 0 and the bit stays clear.
        let fp = Fingerprint::compute(&page, 64);
        assert_eq!(fp.bits(), token_hash("alpha") & token_hash("beta"));
    }

    #[test]
    fn empty_page_is_all_zero() {
        let fp = Fingerprint::compute(&HashMap::new(), 16);
        assert_eq!(fp.bits(), 0);
        assert_eq!(fp.to_string(), "0000000000000000");
    }

    #[test]
    fn width_is_respected() {
        let page = freqs("distributed systems networking databases security");
        let fp = Fingerprint::compute(&page, 16);
        assert_eq!(fp.width(), 16);
        assert!(fp.bits() < 1u64 << 16);
        assert_eq!(Fingerprint::compute(&page, 0).width(), 1);
    }

    #[test]
    fn frequency_weights_dominate() {
        let mut heavy = HashMap::new();
        heavy.insert("alpha".to_string(), 100);
        heavy.insert("beta".to_string(), 1);
        let fp = Fingerprint::compute(&heavy, 64);
        assert_eq!(fp.bits(), token_hash("alpha"));
    }

    #[test]
    fn bands_cover_all_bits() {
        let fp = Fingerprint::from_bits(0b1011_0110_1100_0011, 16);
        let bands = 3;
        let width = 16u32.div_ceil(bands);
        let rebuilt = (0..bands).fold(0u64, |acc, i| acc | (fp.band(i, bands) << (i * width)));
        assert_eq!(rebuilt, fp.bits());
    }
}
