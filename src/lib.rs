//! A polite, scoped web crawler that gathers text statistics while it
//! walks a set of allowed domains: unique pages, word frequencies, the
//! longest page and per-subdomain page counts. Near-duplicate pages are
//! skipped using SimHash fingerprints.

pub mod analytics;
pub mod config;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod processor;
pub mod state;
pub mod urls;

pub use analytics::{CrawlReport, DedupStrategy, Fingerprint};
pub use config::CrawlConfig;
pub use crawler::{CrawlSummary, Crawler, StopHandle};
pub use processor::{FetchResult, PageOutcome, PageProcessor};
pub use state::{CrawlState, Snapshot};
pub use urls::{NormalizedUrl, ScopeFilter};
