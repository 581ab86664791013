//! Crawl-wide aggregates owned by one session.
//!
//! `CrawlState` is the single source of truth for the visited set, the
//! fingerprint store, word frequencies, subdomain counters and the longest
//! page. Every field only grows. Callers that share it across tasks wrap it
//! in one lock and take snapshots under that same lock.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analytics::{DedupStrategy, DuplicateIndex, Fingerprint};
use crate::urls::NormalizedUrl;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongestPage {
    pub url: String,
    #[serde(rename = "count")]
    pub token_count: usize,
}

/// Point-in-time copy of the aggregates, handed to persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub visited: Vec<String>,
    pub word_freq: BTreeMap<String, u64>,
    pub longest_page: Option<LongestPage>,
    pub subdomains: BTreeMap<String, u64>,
}

#[derive(Debug, Clone)]
struct SubdomainCount {
    scheme: String,
    pages: u64,
}

pub struct CrawlState {
    visited: HashSet<NormalizedUrl>,
    fingerprints: Box<dyn DuplicateIndex>,
    word_frequencies: HashMap<String, u64>,
    // keyed by host; the scheme is the first one observed for that host
    subdomains: HashMap<String, SubdomainCount>,
    longest_page: Option<LongestPage>,
}

impl CrawlState {
    pub fn new(fingerprints: Box<dyn DuplicateIndex>) -> Self {
        Self {
            visited: HashSet::new(),
            fingerprints,
            word_frequencies: HashMap::new(),
            subdomains: HashMap::new(),
            longest_page: None,
        }
    }

    pub fn with_strategy(strategy: DedupStrategy) -> Self {
        Self::new(strategy.build())
    }

    /// Adds `url` to the visited set. Returns `false` if it was already
    /// there; check and insert happen in one call.
    pub fn admit(&mut self, url: &NormalizedUrl) -> bool {
        if self.visited.contains(url) {
            return false;
        }
        self.visited.insert(url.clone())
    }

    pub fn is_visited(&self, url: &NormalizedUrl) -> bool {
        self.visited.contains(url)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Counts one page for `host`, keeping whichever scheme was recorded
    /// first for it. Returns the new count.
    pub fn record_subdomain(&mut self, scheme: &str, host: &str) -> u64 {
        let entry = self
            .subdomains
            .entry(host.to_lowercase())
            .or_insert_with(|| SubdomainCount {
                scheme: scheme.to_string(),
                pages: 0,
            });
        entry.pages += 1;
        entry.pages
    }

    pub fn find_duplicate(&self, fingerprint: &Fingerprint) -> Option<Fingerprint> {
        self.fingerprints.find_duplicate(fingerprint)
    }

    pub fn register_fingerprint(&mut self, fingerprint: Fingerprint) {
        self.fingerprints.insert(fingerprint);
    }

    pub fn fingerprints(&self) -> &[Fingerprint] {
        self.fingerprints.fingerprints()
    }

    pub fn merge_word_counts(&mut self, counts: &HashMap<String, u32>) {
        for (token, &count) in counts {
            *self.word_frequencies.entry(token.clone()).or_insert(0) += u64::from(count);
        }
    }

    /// Replaces the longest page only when `token_count` is strictly
    /// greater, so the first page wins ties.
    pub fn offer_longest(&mut self, url: &NormalizedUrl, token_count: usize) -> bool {
        let longer = self
            .longest_page
            .as_ref()
            .is_none_or(|current| token_count > current.token_count);
        if longer {
            self.longest_page = Some(LongestPage {
                url: url.to_string(),
                token_count,
            });
        }
        longer
    }

    pub fn word_frequency(&self, token: &str) -> u64 {
        self.word_frequencies.get(token).copied().unwrap_or(0)
    }

    pub fn word_frequencies(&self) -> &HashMap<String, u64> {
        &self.word_frequencies
    }

    pub fn longest_page(&self) -> Option<&LongestPage> {
        self.longest_page.as_ref()
    }

    /// `scheme://host` -> page count.
    pub fn subdomain_counts(&self) -> BTreeMap<String, u64> {
        self.subdomains
            .iter()
            .map(|(host, count)| (format!("{}://{}", count.scheme, host), count.pages))
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut visited: Vec<String> = self.visited.iter().map(|u| u.to_string()).collect();
        visited.sort_unstable();

        Snapshot {
            visited,
            word_freq: self
                .word_frequencies
                .iter()
                .map(|(token, count)| (token.clone(), *count))
                .collect(),
            longest_page: self.longest_page.clone(),
            subdomains: self.subdomain_counts(),
        }
    }

    /// Rebuilds a state from a snapshot plus the stored fingerprints.
    /// Visited entries that no longer parse are dropped with a warning.
    pub fn restore(
        snapshot: Snapshot,
        fingerprints: impl IntoIterator<Item = Fingerprint>,
        strategy: DedupStrategy,
    ) -> Self {
        let mut state = Self::with_strategy(strategy);

        for raw in &snapshot.visited {
            match NormalizedUrl::parse(raw) {
                Ok(url) => {
                    state.visited.insert(url);
                }
                Err(e) => warn!("Dropping visited entry from checkpoint: {}", e),
            }
        }

        for fingerprint in fingerprints {
            state.fingerprints.insert(fingerprint);
        }

        state.word_frequencies = snapshot.word_freq.into_iter().collect();
        state.longest_page = snapshot.longest_page;

        for (origin, pages) in snapshot.subdomains {
            match origin.split_once("://") {
                Some((scheme, host)) => {
                    state.subdomains.insert(
                        host.to_string(),
                        SubdomainCount {
                            scheme: scheme.to_string(),
                            pages,
                        },
                    );
                }
                None => warn!("Dropping malformed subdomain entry {:?} from checkpoint", origin),
            }
        }

        state
    }
}

impl Default for CrawlState {
    fn default() -> Self {
        Self::with_strategy(DedupStrategy::Exact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> NormalizedUrl {
        NormalizedUrl::parse(raw).unwrap()
    }

    #[test]
    fn admission_is_once_per_url() {
        let mut state = CrawlState::default();
        assert!(state.admit(&url("https://www.ics.uci.edu/a")));
        assert!(!state.admit(&url("https://www.ics.uci.edu/a?x=1#y")));
        assert!(state.admit(&url("https://www.ics.uci.edu/b")));
        assert_eq!(state.visited_count(), 2);
    }

    #[test]
    fn first_scheme_wins_for_subdomains() {
        let mut state = CrawlState::default();
        state.record_subdomain("http", "vision.ics.uci.edu");
        state.record_subdomain("https", "vision.ics.uci.edu");
        state.record_subdomain("https", "www.ics.uci.edu");

        let counts = state.subdomain_counts();
        assert_eq!(counts.get("http://vision.ics.uci.edu"), Some(&2));
        assert_eq!(counts.get("https://vision.ics.uci.edu"), None);
        assert_eq!(counts.get("https://www.ics.uci.edu"), Some(&1));
    }

    #[test]
    fn longest_page_needs_strictly_more_tokens() {
        let mut state = CrawlState::default();
        assert!(state.offer_longest(&url("https://a.ics.uci.edu/"), 500));
        assert!(!state.offer_longest(&url("https://b.ics.uci.edu/"), 500));
        assert_eq!(state.longest_page().unwrap().url, "https://a.ics.uci.edu/");

        assert!(state.offer_longest(&url("https://c.ics.uci.edu/"), 501));
        assert_eq!(state.longest_page().unwrap().token_count, 501);
    }

    #[test]
    fn word_counts_accumulate() {
        let mut state = CrawlState::default();
        let page: HashMap<String, u32> = [("crawler".to_string(), 2), ("graph".to_string(), 1)]
            .into_iter()
            .collect();
        state.merge_word_counts(&page);
        state.merge_word_counts(&page);
        assert_eq!(state.word_frequency("crawler"), 4);
        assert_eq!(state.word_frequency("graph"), 2);
        assert_eq!(state.word_frequency("missing"), 0);
    }

    #[test]
    fn snapshot_serializes_with_checkpoint_field_names() {
        let mut state = CrawlState::default();
        state.admit(&url("https://www.ics.uci.edu/b"));
        state.admit(&url("https://www.ics.uci.edu/a"));
        state.offer_longest(&url("https://www.ics.uci.edu/a"), 12);
        state.record_subdomain("https", "www.ics.uci.edu");

        let snapshot = state.snapshot();
        assert_eq!(
            snapshot.visited,
            vec!["https://www.ics.uci.edu/a", "https://www.ics.uci.edu/b"]
        );

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("wordFreq").is_some());
        assert_eq!(json["longestPage"]["count"], 12);
        assert_eq!(json["subdomains"]["https://www.ics.uci.edu"], 1);
    }

    #[test]
    fn restore_round_trips_aggregates() {
        let mut state = CrawlState::default();
        state.admit(&url("https://www.ics.uci.edu/a"));
        state.record_subdomain("http", "www.ics.uci.edu");
        state.register_fingerprint(Fingerprint::from_bits(42, 16));
        state.merge_word_counts(&[("lab".to_string(), 3)].into_iter().collect());
        state.offer_longest(&url("https://www.ics.uci.edu/a"), 3);

        let restored = CrawlState::restore(
            state.snapshot(),
            state.fingerprints().to_vec(),
            DedupStrategy::Exact,
        );
        assert_eq!(restored.snapshot(), state.snapshot());
        assert!(restored.is_visited(&url("https://www.ics.uci.edu/a")));
        assert!(
            restored
                .find_duplicate(&Fingerprint::from_bits(42, 16))
                .is_some()
        );
    }
}
