//! Per-domain admission state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::Instant;

/// State for a single hostname.
#[derive(Debug)]
pub struct DomainState {
    /// Concurrency tokens; one per allowed in-flight request.
    pub permits: Arc<Semaphore>,
    /// Earliest instant the next request may start.
    pub next_start: Option<Instant>,
    /// Total requests admitted.
    pub total_requests: u64,
}

impl DomainState {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            next_start: None,
            total_requests: 0,
        }
    }

    /// Reserve the next start slot and return when it begins. Consecutive
    /// reservations are spaced by at least `delay`.
    pub fn reserve_start(&mut self, delay: Duration) -> Instant {
        let now = Instant::now();
        let start = match self.next_start {
            Some(next) if next > now => next,
            _ => now,
        };
        self.next_start = Some(start + delay);
        self.total_requests += 1;
        start
    }

    /// Requests currently holding a token.
    pub fn in_flight(&self, max_concurrent: usize) -> usize {
        max_concurrent
            .max(1)
            .saturating_sub(self.permits.available_permits())
    }
}
