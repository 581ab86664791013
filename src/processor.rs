//! Per-page pipeline.
//!
//! Processing is split in two so the expensive part never runs under the
//! state lock:
//! - [`PageProcessor::analyze`] parses the body, extracts and normalizes
//!   links, tokenizes the text and computes the fingerprint. It touches no
//!   shared state.
//! - [`PageProcessor::apply`] folds an analysis into [`CrawlState`]: visited
//!   set, subdomain counters, near-duplicate gate, word counts and longest
//!   page.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::analytics::Fingerprint;
use crate::analytics::simhash::DEFAULT_FINGERPRINT_BITS;
use crate::config::{CrawlConfig, DEFAULT_MAX_DISTINCT_TOKENS};
use crate::error::{ConfigError, PageError};
use crate::extract::{self, Tokenizer};
use crate::state::CrawlState;
use crate::urls::{self, NormalizedUrl, ScopeFilter};

/// What the fetcher hands over for one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    pub requested_url: String,
    /// URL after redirects; empty if the fetcher did not report one.
    pub final_url: String,
    pub status: u16,
    pub error: Option<String>,
    pub body: Option<Vec<u8>>,
}

impl FetchResult {
    /// Successful response with an HTML body and no redirect.
    pub fn ok(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            requested_url: url,
            status: 200,
            error: None,
            body: Some(body.into()),
        }
    }

    pub fn failed(url: impl Into<String>, status: u16, error: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            requested_url: url,
            status,
            error: Some(error.into()),
            body: None,
        }
    }

    /// The URL the content actually came from.
    pub fn page_url(&self) -> &str {
        if self.final_url.is_empty() {
            &self.requested_url
        } else {
            &self.final_url
        }
    }

    /// Any status in `200..=399` carries usable content.
    pub fn is_acceptable(&self) -> bool {
        (200..=399).contains(&self.status)
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// Tokenized content of one page, ready to be merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub frequencies: HashMap<String, u32>,
    pub token_count: usize,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzedContent {
    /// Status, body or text problems; see `PageAnalysis::error`.
    Unavailable,
    Oversized { distinct_tokens: usize },
    Tokens(PageContent),
}

/// Result of the lock-free half of processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAnalysis {
    /// The URL that was asked for; differs from `url` after a redirect.
    pub requested_url: Option<NormalizedUrl>,
    pub url: Option<NormalizedUrl>,
    pub status: u16,
    /// Every extracted link, normalized, in document order. Not scope-filtered.
    pub links: Vec<NormalizedUrl>,
    pub missing_hrefs: usize,
    pub malformed_links: usize,
    pub content: AnalyzedContent,
    pub error: Option<PageError>,
}

impl PageAnalysis {
    fn rejected(
        status: u16,
        requested_url: Option<NormalizedUrl>,
        url: Option<NormalizedUrl>,
        error: PageError,
    ) -> Self {
        Self {
            requested_url,
            url,
            status,
            links: Vec::new(),
            missing_hrefs: 0,
            malformed_links: 0,
            content: AnalyzedContent::Unavailable,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentOutcome {
    Skipped,
    /// Redirected onto a page this crawl has already processed.
    AlreadyVisited,
    Oversized { distinct_tokens: usize },
    NearDuplicate { fingerprint: Fingerprint, matched: Fingerprint },
    Recorded { fingerprint: Fingerprint, token_count: usize, longest: bool },
}

/// What one page contributed once applied to the crawl state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOutcome {
    pub url: Option<NormalizedUrl>,
    pub links: Vec<NormalizedUrl>,
    pub newly_visited: bool,
    pub content: ContentOutcome,
    pub missing_hrefs: usize,
    pub malformed_links: usize,
    pub error: Option<PageError>,
}

#[derive(Debug, Clone)]
pub struct PageProcessor {
    scope: ScopeFilter,
    tokenizer: Tokenizer,
    stats_domain: String,
    fingerprint_bits: u8,
    max_distinct_tokens: usize,
}

impl PageProcessor {
    pub fn new(scope: ScopeFilter, tokenizer: Tokenizer, stats_domain: impl Into<String>) -> Self {
        Self {
            scope,
            tokenizer,
            stats_domain: stats_domain.into().trim_start_matches('.').to_lowercase(),
            fingerprint_bits: DEFAULT_FINGERPRINT_BITS,
            max_distinct_tokens: DEFAULT_MAX_DISTINCT_TOKENS,
        }
    }

    pub fn from_config(config: &CrawlConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config.scope_filter()?, Tokenizer::default(), &config.stats_domain)
            .with_fingerprint_bits(config.fingerprint_bits)
            .with_max_distinct_tokens(config.max_distinct_tokens))
    }

    pub fn with_fingerprint_bits(mut self, bits: u8) -> Self {
        self.fingerprint_bits = bits;
        self
    }

    pub fn with_max_distinct_tokens(mut self, max: usize) -> Self {
        self.max_distinct_tokens = max;
        self
    }

    pub fn scope(&self) -> &ScopeFilter {
        &self.scope
    }

    /// Whether `host` is the statistics domain or one of its subdomains.
    pub fn in_stats_domain(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        host == self.stats_domain
            || host
                .strip_suffix(&self.stats_domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }

    /// Processes a page and returns only the links that pass the scope filter.
    pub fn scrape(&self, page: &FetchResult, state: &mut CrawlState) -> Vec<NormalizedUrl> {
        let outcome = self.process(page, state);
        self.filter_in_scope(outcome.links)
    }

    pub fn filter_in_scope(&self, links: Vec<NormalizedUrl>) -> Vec<NormalizedUrl> {
        links
            .into_iter()
            .filter(|link| {
                let decision = self.scope.decide(link);
                if !decision.is_in_scope() {
                    debug!("Out of scope ({:?}): {}", decision, link);
                }
                decision.is_in_scope()
            })
            .collect()
    }

    pub fn process(&self, page: &FetchResult, state: &mut CrawlState) -> PageOutcome {
        let analysis = self.analyze(page);
        self.apply(analysis, state)
    }

    pub fn analyze(&self, page: &FetchResult) -> PageAnalysis {
        let requested_url = NormalizedUrl::parse(&page.requested_url).ok();
        if !page.is_acceptable() {
            let error = PageError::FetchStatus {
                url: page.requested_url.clone(),
                status: page.status,
                detail: page.error.clone().unwrap_or_default(),
            };
            warn!("{}", error);
            return PageAnalysis::rejected(page.status, requested_url, None, error);
        }

        let page_url = match NormalizedUrl::parse(page.page_url()) {
            Ok(url) => url,
            Err(e) => {
                let error = PageError::from(e);
                warn!("{}", error);
                return PageAnalysis::rejected(page.status, requested_url, None, error);
            }
        };

        let document = match extract::parse_body(page.page_url(), page.body.as_deref()) {
            Ok(document) => document,
            Err(error) => {
                warn!("{}", error);
                return PageAnalysis::rejected(page.status, requested_url, Some(page_url), error);
            }
        };

        let mut error = None;
        let text = extract::page_text(&document);
        let mut frequencies = HashMap::new();
        let mut token_count = 0;
        for token in self.tokenizer.tokens(&text) {
            *frequencies.entry(token).or_insert(0u32) += 1;
            token_count += 1;
        }

        let content = if token_count == 0 {
            let e = PageError::NoText(page.page_url().to_string());
            warn!("{}", e);
            error = Some(e);
            AnalyzedContent::Unavailable
        } else if frequencies.len() > self.max_distinct_tokens {
            info!(
                "Skipping {} with {} distinct tokens",
                page.page_url(),
                frequencies.len()
            );
            AnalyzedContent::Oversized {
                distinct_tokens: frequencies.len(),
            }
        } else {
            let fingerprint = Fingerprint::compute(&frequencies, self.fingerprint_bits);
            AnalyzedContent::Tokens(PageContent {
                frequencies,
                token_count,
                fingerprint,
            })
        };

        let extraction = extract::extract_links(&document);
        if extraction.missing_href > 0 {
            debug!(
                "{} anchors without href on {}",
                extraction.missing_href,
                page.page_url()
            );
        }

        let mut links = Vec::with_capacity(extraction.hrefs.len());
        let mut malformed_links = 0;
        for href in &extraction.hrefs {
            match urls::normalize_against_host(href, page_url.as_url()) {
                Ok(link) => links.push(link),
                Err(e) => {
                    malformed_links += 1;
                    debug!("Dropping link on {}: {}", page.page_url(), e);
                }
            }
        }

        PageAnalysis {
            requested_url,
            url: Some(page_url),
            status: page.status,
            links,
            missing_hrefs: extraction.missing_href,
            malformed_links,
            content,
            error,
        }
    }

    pub fn apply(&self, analysis: PageAnalysis, state: &mut CrawlState) -> PageOutcome {
        let PageAnalysis {
            requested_url,
            url,
            status,
            links,
            missing_hrefs,
            malformed_links,
            content,
            error,
        } = analysis;

        // A redirect can land on a page that was already crawled under its
        // own URL. It must not be counted a second time.
        if let Some(target) = url.as_ref().filter(|u| requested_url.as_ref() != Some(*u)) {
            if state.is_visited(target) {
                info!("Redirect to already visited {}", target);
                return PageOutcome {
                    url,
                    links: Vec::new(),
                    newly_visited: false,
                    content: ContentOutcome::AlreadyVisited,
                    missing_hrefs,
                    malformed_links,
                    error,
                };
            }
        }

        let mut newly_visited = false;
        if let Some(url) = &url {
            if (200..=299).contains(&status) {
                newly_visited = state.admit(url);
            }
            if (200..=399).contains(&status) {
                if let Some(host) = url.host().filter(|h| self.in_stats_domain(h)) {
                    state.record_subdomain(url.scheme(), host);
                }
            }
        }

        let content = match (content, &url) {
            (AnalyzedContent::Tokens(page), Some(page_url)) => {
                if let Some(matched) = state.find_duplicate(&page.fingerprint) {
                    info!(
                        "Near-duplicate {} (fingerprint {} matches {})",
                        page_url, page.fingerprint, matched
                    );
                    ContentOutcome::NearDuplicate {
                        fingerprint: page.fingerprint,
                        matched,
                    }
                } else {
                    state.register_fingerprint(page.fingerprint);
                    state.merge_word_counts(&page.frequencies);
                    let longest = state.offer_longest(page_url, page.token_count);
                    ContentOutcome::Recorded {
                        fingerprint: page.fingerprint,
                        token_count: page.token_count,
                        longest,
                    }
                }
            }
            (AnalyzedContent::Oversized { distinct_tokens }, _) => {
                ContentOutcome::Oversized { distinct_tokens }
            }
            _ => ContentOutcome::Skipped,
        };

        if let Some(url) = &url {
            info!(
                "Processed {} [{}]: {} links, {:?}",
                url,
                status,
                links.len(),
                content
            );
        }

        PageOutcome {
            url,
            links,
            newly_visited,
            content,
            missing_hrefs,
            malformed_links,
            error,
        }
    }
}

impl Default for PageProcessor {
    fn default() -> Self {
        Self::new(ScopeFilter::default(), Tokenizer::default(), "ics.uci.edu")
    }
}
