use thiserror::Error;

/// A URL (candidate href or page URL) that could not be turned into a
/// `NormalizedUrl`. Always recovered per link.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("malformed URL {url:?}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Per-page problems. None of these stop a crawl session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("status {status} for {url}: {detail}")]
    FetchStatus {
        url: String,
        status: u16,
        detail: String,
    },
    #[error("no body for {0}")]
    MissingBody(String),
    #[error("no textual content in {0}")]
    NoText(String),
    #[error("unusable page URL: {0}")]
    MalformedUrl(#[from] UrlError),
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid scope pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Hard failures of a crawl session.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}
