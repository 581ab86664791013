//! Crawl analytics: page fingerprints, the near-duplicate index and the
//! end-of-crawl report.

pub mod dedup;
pub mod report;
pub mod simhash;

pub use dedup::{DedupStrategy, DuplicateIndex, ExactMatchIndex, HammingIndex};
pub use report::CrawlReport;
pub use simhash::Fingerprint;
