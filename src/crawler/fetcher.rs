use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::config::CrawlConfig;
use crate::error::FetchError;
use crate::processor::FetchResult;

/// Status reported when no HTTP response was received at all.
pub const TRANSPORT_ERROR_STATUS: u16 = 600;

/// Source of pages for a crawl session. Implementations never fail: any
/// problem is reported through the status and error fields.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = FetchResult> + Send;
}

/// The network-facing fetcher, built on a shared reqwest client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    pub fn from_config(config: &CrawlConfig) -> Result<Self, FetchError> {
        Self::new(&config.user_agent, config.request_timeout())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = FetchResult> + Send {
        let request = self.client.get(url);
        let requested_url = url.to_string();

        async move {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    debug!("Fetch failed for {}: {}", requested_url, e);
                    return FetchResult::failed(requested_url, TRANSPORT_ERROR_STATUS, e.to_string());
                }
            };

            let status = response.status();
            let final_url = response.url().to_string();
            let error = (!status.is_success())
                .then(|| status.canonical_reason().unwrap_or("unknown status").to_string());

            match response.bytes().await {
                Ok(body) => FetchResult {
                    requested_url,
                    final_url,
                    status: status.as_u16(),
                    error,
                    body: Some(body.to_vec()),
                },
                Err(e) => FetchResult {
                    requested_url,
                    final_url,
                    status: status.as_u16(),
                    error: Some(e.to_string()),
                    body: None,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_default_config() {
        assert!(HttpFetcher::from_config(&CrawlConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn unreachable_hosts_become_transport_errors() {
        let fetcher = HttpFetcher::new("test-agent", Duration::from_millis(500)).unwrap();
        let result = fetcher.fetch("http://127.0.0.1:9/unreachable").await;
        assert_eq!(result.status, TRANSPORT_ERROR_STATUS);
        assert!(result.error.is_some());
        assert!(result.body.is_none());
        assert_eq!(result.requested_url, "http://127.0.0.1:9/unreachable");
    }
}
