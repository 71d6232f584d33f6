//! Fetch-rate governor shared by every restaurant crawl in a batch.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Enforces a minimum spacing between consecutive requests, no matter how
/// many crawls run in parallel.
///
/// Callers reserve the next free slot under a short lock and then sleep
/// outside it, so waiting tasks never hold the lock across an await.
#[derive(Debug)]
pub struct RateGovernor {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateGovernor {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until this caller's reserved slot arrives.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let slot = {
            let mut next_slot = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next_slot {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next_slot = Some(slot + self.min_interval);
            slot
        };

        let wait = slot.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "Rate governor delaying request");
        }
        tokio::time::sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let governor = RateGovernor::new(Duration::from_secs(1));
        let start = Instant::now();
        governor.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_requests_are_spaced() {
        let governor = RateGovernor::new(Duration::from_millis(500));
        let start = Instant::now();
        for _ in 0..3 {
            governor.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_callers_share_the_budget() {
        let governor = Arc::new(RateGovernor::new(Duration::from_millis(200)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let governor = Arc::clone(&governor);
            handles.push(tokio::spawn(async move {
                governor.acquire().await;
                Instant::now()
            }));
        }

        let mut stamps = Vec::new();
        for handle in handles {
            stamps.push(handle.await.unwrap());
        }
        stamps.sort();

        // Five requests need four full intervals between them.
        assert!(stamps[4].duration_since(start) >= Duration::from_millis(800));
        for pair in stamps.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(200));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlimited_never_waits() {
        let governor = RateGovernor::unlimited();
        let start = Instant::now();
        for _ in 0..100 {
            governor.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
