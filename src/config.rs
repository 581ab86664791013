//! Crawl configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analytics::DedupStrategy;
use crate::analytics::simhash::{DEFAULT_FINGERPRINT_BITS, MAX_FINGERPRINT_BITS};
use crate::error::ConfigError;
use crate::urls::ScopeFilter;
use crate::urls::scope::{DEFAULT_ALLOWED_DOMAINS, DEFAULT_DENIED_EXTENSIONS};

pub const DEFAULT_USER_AGENT: &str = "scoped-crawler/0.1";

/// Pages with more distinct tokens than this are treated as generated
/// content and skipped.
pub const DEFAULT_MAX_DISTINCT_TOKENS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Starting URLs
    pub seeds: Vec<String>,
    /// Host suffixes that are in scope
    pub allowed_domains: Vec<String>,
    /// Path extensions that are never fetched
    pub denied_extensions: Vec<String>,
    /// Parent domain whose subdomains get page counts
    pub stats_domain: String,
    /// Fingerprint width in bits (1..=64)
    pub fingerprint_bits: u8,
    /// Distinct-token cutoff above which a page is skipped
    pub max_distinct_tokens: usize,
    /// Near-duplicate lookup strategy
    pub dedup: DedupStrategy,
    /// Minimum gap between two fetches to the same host (milliseconds)
    pub politeness_delay_ms: u64,
    /// Maximum concurrent fetches
    pub concurrency: usize,
    /// Stop after dispatching this many pages
    pub page_limit: Option<usize>,
    /// Where checkpoints are written
    pub checkpoint_path: PathBuf,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub log_level: LogLevel,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seeds: vec![
                "https://www.ics.uci.edu".to_string(),
                "https://www.cs.uci.edu".to_string(),
                "https://www.informatics.uci.edu".to_string(),
                "https://www.stat.uci.edu".to_string(),
            ],
            allowed_domains: DEFAULT_ALLOWED_DOMAINS.iter().map(|d| d.to_string()).collect(),
            denied_extensions: DEFAULT_DENIED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            stats_domain: "ics.uci.edu".to_string(),
            fingerprint_bits: DEFAULT_FINGERPRINT_BITS,
            max_distinct_tokens: DEFAULT_MAX_DISTINCT_TOKENS,
            dedup: DedupStrategy::Exact,
            politeness_delay_ms: 500,
            concurrency: 8,
            page_limit: None,
            checkpoint_path: PathBuf::from("crawl_checkpoint.json"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 10,
            log_level: LogLevel::Info,
        }
    }
}

impl CrawlConfig {
    /// Reads a JSON config file and validates it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_FINGERPRINT_BITS).contains(&self.fingerprint_bits) {
            return Err(ConfigError::Invalid(format!(
                "fingerprint_bits must be between 1 and {MAX_FINGERPRINT_BITS}, got {}",
                self.fingerprint_bits
            )));
        }
        if let DedupStrategy::Hamming { max_distance } = self.dedup {
            if max_distance >= u32::from(self.fingerprint_bits) {
                return Err(ConfigError::Invalid(format!(
                    "hamming max_distance {max_distance} must be below fingerprint_bits {}",
                    self.fingerprint_bits
                )));
            }
        }
        if self.allowed_domains.iter().all(|d| d.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "allowed_domains must name at least one domain".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".to_string()));
        }
        if self.stats_domain.trim().is_empty() {
            return Err(ConfigError::Invalid("stats_domain must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn scope_filter(&self) -> Result<ScopeFilter, ConfigError> {
        Ok(ScopeFilter::new(&self.allowed_domains, &self.denied_extensions)?)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
