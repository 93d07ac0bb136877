//! Request throttling for one crawl job

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::trace;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared request budget of the workers of one crawl job.
///
/// Permits are spread evenly (no bursts). A throttle built with zero
/// requests per second never waits.
#[derive(Clone, Default)]
pub struct RequestThrottle {
    limiter: Option<Arc<DirectLimiter>>,
}

impl RequestThrottle {
    pub fn new(requests_per_second: u32) -> Self {
        let limiter = NonZeroU32::new(requests_per_second)
            .map(|rps| Quota::per_second(rps).allow_burst(nonzero!(1u32)))
            .map(|quota| Arc::new(RateLimiter::direct(quota)));
        Self { limiter }
    }

    /// A throttle that lets every request through
    pub fn unlimited() -> Self {
        Self { limiter: None }
    }

    pub fn is_limited(&self) -> bool {
        self.limiter.is_some()
    }

    /// Wait until the next request is allowed
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
            trace!("Throttle permit granted");
        }
    }
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle")
            .field("limited", &self.is_limited())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let throttle = RequestThrottle::new(0);
        assert!(!throttle.is_limited());

        let start = Instant::now();
        for _ in 0..100 {
            throttle.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_limited_spaces_requests() {
        let throttle = RequestThrottle::new(10);
        assert!(throttle.is_limited());

        let start = Instant::now();
        for _ in 0..3 {
            throttle.wait().await;
        }
        // first permit is immediate, the next two need ~100ms each
        assert!(start.elapsed() >= Duration::from_millis(180));
    }

    #[tokio::test]
    async fn test_clones_share_budget() {
        let throttle = RequestThrottle::new(10);
        let other = throttle.clone();

        let start = Instant::now();
        throttle.wait().await;
        other.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
