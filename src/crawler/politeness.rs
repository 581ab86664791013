//! Per-host fetch spacing.
//!
//! The dispatcher reserves a start time for each fetch instead of a worker
//! sleeping after the fact. Reservations for one host are spaced at least
//! `delay` apart; different hosts never wait on each other.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PolitenessSchedule {
    delay: Duration,
    next_eligible: HashMap<String, Instant>,
}

impl PolitenessSchedule {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_eligible: HashMap::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// How long a fetch to `host` would have to wait if issued at `now`.
    pub fn wait_time(&self, host: &str, now: Instant) -> Duration {
        self.next_eligible
            .get(host)
            .map(|eligible| eligible.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Reserves the earliest slot for `host` at or after `now` and returns
    /// when the fetch may start.
    pub fn reserve(&mut self, host: &str, now: Instant) -> Instant {
        let start = self
            .next_eligible
            .get(host)
            .map_or(now, |&eligible| eligible.max(now));
        self.next_eligible.insert(host.to_string(), start + self.delay);
        start
    }
}
