use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info, warn};

pub mod checkpoint;
pub mod fetcher;
pub mod politeness;

use checkpoint::{Checkpoint, CheckpointSink};
use fetcher::Fetcher;
use politeness::PolitenessSchedule;

use crate::config::CrawlConfig;
use crate::error::{ConfigError, CrawlError};
use crate::processor::{ContentOutcome, PageAnalysis, PageProcessor};
use crate::state::CrawlState;
use crate::urls::NormalizedUrl;

/// Asks a running crawl to stop. Pages already in flight are finished and
/// a final checkpoint is written.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// URLs handed to a worker.
    pub dispatched: usize,
    /// Pages whose content was merged into the statistics.
    pub recorded: usize,
    pub near_duplicates: usize,
    pub oversized: usize,
    /// Pages with a status, body or worker problem.
    pub failed: usize,
    /// Links pushed onto the frontier.
    pub enqueued: usize,
    pub stopped: bool,
}

/// One crawl session: a frontier, a pool of fetch workers and the shared
/// crawl state they feed.
pub struct Crawler<F: Fetcher> {
    fetcher: Arc<F>,
    processor: Arc<PageProcessor>,
    state: Arc<Mutex<CrawlState>>,
    frontier: VecDeque<NormalizedUrl>,
    queued: HashSet<NormalizedUrl>,
    // dispatched, not yet applied
    in_flight: HashMap<task::Id, NormalizedUrl>,
    politeness: PolitenessSchedule,
    concurrency: usize,
    page_limit: Option<usize>,
    checkpoint: Option<Arc<dyn CheckpointSink>>,
    stop: StopHandle,
}

impl<F: Fetcher> Crawler<F> {
    pub fn new(fetcher: F, processor: PageProcessor, state: CrawlState) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            processor: Arc::new(processor),
            state: Arc::new(Mutex::new(state)),
            frontier: VecDeque::new(),
            queued: HashSet::new(),
            in_flight: HashMap::new(),
            politeness: PolitenessSchedule::new(Duration::ZERO),
            concurrency: 1,
            page_limit: None,
            checkpoint: None,
            stop: StopHandle::default(),
        }
    }

    pub fn from_config(config: &CrawlConfig, fetcher: F) -> Result<Self, ConfigError> {
        let processor = PageProcessor::from_config(config)?;
        let state = CrawlState::with_strategy(config.dedup);
        Ok(Self::new(fetcher, processor, state)
            .with_concurrency(config.concurrency)
            .with_page_limit(config.page_limit)
            .with_politeness_delay(config.politeness_delay())
            .with_seeds(&config.seeds))
    }

    /// Rebuilds a session from a checkpoint. The saved frontier is queued
    /// ahead of the configured seeds; visited seeds are not fetched again.
    pub fn resume(
        config: &CrawlConfig,
        fetcher: F,
        checkpoint: Checkpoint,
    ) -> Result<Self, ConfigError> {
        let processor = PageProcessor::from_config(config)?;
        let Checkpoint {
            snapshot,
            fingerprints,
            frontier,
        } = checkpoint;
        let state = CrawlState::restore(snapshot, fingerprints, config.dedup);
        info!(
            "Resuming crawl: {} visited, {} pending",
            state.visited_count(),
            frontier.len()
        );

        Ok(Self::new(fetcher, processor, state)
            .with_concurrency(config.concurrency)
            .with_page_limit(config.page_limit)
            .with_politeness_delay(config.politeness_delay())
            .with_seeds(&frontier)
            .with_seeds(&config.seeds))
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_page_limit(mut self, limit: Option<usize>) -> Self {
        self.page_limit = limit;
        self
    }

    pub fn with_politeness_delay(mut self, delay: Duration) -> Self {
        self.politeness = PolitenessSchedule::new(delay);
        self
    }

    pub fn with_checkpoint(mut self, sink: Arc<dyn CheckpointSink>) -> Self {
        self.checkpoint = Some(sink);
        self
    }

    /// Queues start URLs. Unparsable or out-of-scope seeds are skipped.
    pub fn with_seeds<I>(mut self, seeds: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for seed in seeds {
            match NormalizedUrl::parse(seed.as_ref()) {
                Ok(url) if self.processor.scope().admits(&url) => {
                    self.enqueue(url);
                }
                Ok(url) => warn!("Seed out of scope: {}", url),
                Err(e) => warn!("Skipping seed: {}", e),
            }
        }
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Shared crawl state. Lock it to read a consistent snapshot while the
    /// crawl is running.
    pub fn state(&self) -> Arc<Mutex<CrawlState>> {
        Arc::clone(&self.state)
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    fn enqueue(&mut self, url: NormalizedUrl) -> bool {
        if self.queued.insert(url.clone()) {
            self.frontier.push_back(url);
            true
        } else {
            false
        }
    }

    fn limit_reached(&self, dispatched: usize) -> bool {
        self.page_limit.is_some_and(|limit| dispatched >= limit)
    }

    pub async fn crawl(&mut self) -> Result<CrawlSummary, CrawlError> {
        let mut summary = CrawlSummary::default();
        let mut join_set = JoinSet::new();

        info!(
            "Starting crawl with concurrency: {}, politeness delay: {:?}",
            self.concurrency,
            self.politeness.delay()
        );

        loop {
            while join_set.len() < self.concurrency
                && !self.stop.is_stopped()
                && !self.limit_reached(summary.dispatched)
            {
                let url = match self.frontier.pop_front() {
                    Some(u) => u,
                    None => break,
                };

                // Membership test and insert under one lock.
                if !self.state.lock().await.admit(&url) {
                    continue;
                }

                let host = url.host().unwrap_or_default().to_string();
                let now = tokio::time::Instant::now().into_std();
                let wait = self.politeness.wait_time(&host, now);
                if !wait.is_zero() {
                    debug!("Holding {} for {:?}", url, wait);
                }
                let start_at = self.politeness.reserve(&host, now);
                summary.dispatched += 1;
                info!("Crawling: {}", url);

                let fetcher = Arc::clone(&self.fetcher);
                let processor = Arc::clone(&self.processor);
                let pending = url.clone();
                let handle = join_set.spawn(async move {
                    tokio::time::sleep_until(start_at.into()).await;
                    let page = fetcher.fetch(url.as_str()).await;
                    let analysis =
                        tokio::task::spawn_blocking(move || processor.analyze(&page)).await;
                    (url, analysis)
                });
                self.in_flight.insert(handle.id(), pending);
            }

            if join_set.is_empty() {
                break;
            }

            match join_set.join_next_with_id().await {
                Some(Ok((id, (_, Ok(analysis))))) => {
                    self.in_flight.remove(&id);
                    self.record(analysis, &mut summary).await?;
                }
                Some(Ok((id, (url, Err(e))))) => {
                    self.in_flight.remove(&id);
                    summary.failed += 1;
                    warn!("Analysis of {} failed: {}", url, e);
                }
                Some(Err(e)) => {
                    summary.failed += 1;
                    match self.in_flight.remove(&e.id()) {
                        Some(url) => warn!("Worker for {} failed: {}", url, e),
                        None => warn!("Worker failed: {}", e),
                    }
                }
                None => break,
            }
        }

        summary.stopped = self.stop.is_stopped();
        if summary.stopped {
            info!("Crawl stopped, {} URLs left in the frontier", self.frontier.len());
        }
        self.save_checkpoint().await?;

        info!(
            "Crawl finished: {} dispatched, {} recorded, {} near-duplicates, {} failed",
            summary.dispatched, summary.recorded, summary.near_duplicates, summary.failed
        );
        Ok(summary)
    }

    /// Applies one analysis, queues its in-scope links and checkpoints.
    async fn record(
        &mut self,
        analysis: PageAnalysis,
        summary: &mut CrawlSummary,
    ) -> Result<(), CrawlError> {
        let shared = Arc::clone(&self.state);
        let checkpoint = {
            let mut state = shared.lock().await;
            let outcome = self.processor.apply(analysis, &mut state);

            if outcome.error.is_some() {
                summary.failed += 1;
            }
            match outcome.content {
                ContentOutcome::Recorded { .. } => summary.recorded += 1,
                ContentOutcome::NearDuplicate { .. } => summary.near_duplicates += 1,
                ContentOutcome::Oversized { .. } => summary.oversized += 1,
                ContentOutcome::Skipped | ContentOutcome::AlreadyVisited => {}
            }

            for link in self.processor.filter_in_scope(outcome.links) {
                if !state.is_visited(&link) && self.enqueue(link) {
                    summary.enqueued += 1;
                }
            }

            self.checkpoint
                .is_some()
                .then(|| self.build_checkpoint(&state))
        };

        if let Some(checkpoint) = checkpoint {
            self.write_checkpoint(checkpoint).await?;
        }
        Ok(())
    }

    /// Pages still being fetched are written as not yet visited and put at
    /// the head of the frontier, so a resumed session fetches them again.
    fn build_checkpoint(&self, state: &CrawlState) -> Checkpoint {
        let mut pending: Vec<String> = self.in_flight.values().map(|u| u.to_string()).collect();
        pending.sort_unstable();

        let mut snapshot = state.snapshot();
        snapshot.visited.retain(|u| pending.binary_search(u).is_err());

        let mut frontier = pending;
        frontier.extend(self.frontier.iter().map(|u| u.to_string()));

        Checkpoint {
            snapshot,
            fingerprints: state.fingerprints().to_vec(),
            frontier,
        }
    }

    async fn save_checkpoint(&self) -> Result<(), CrawlError> {
        if self.checkpoint.is_none() {
            return Ok(());
        }
        let checkpoint = {
            let state = self.state.lock().await;
            self.build_checkpoint(&state)
        };
        self.write_checkpoint(checkpoint).await
    }

    async fn write_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), CrawlError> {
        let Some(sink) = self.checkpoint.clone() else {
            return Ok(());
        };
        let written = tokio::task::spawn_blocking(move || sink.save(&checkpoint)).await;
        match written {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("Checkpoint failed: {}", e);
                Err(e.into())
            }
            Err(e) => {
                error!("Checkpoint task failed: {}", e);
                Err(CrawlError::Worker(e))
            }
        }
    }
}
