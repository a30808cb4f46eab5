use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::trace;

use crate::error::ExplorerError;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket with capacity one, refilled once per `interval`.
///
/// Owned by a single adapter instance; concurrent calls on that adapter
/// share it and queue on `acquire`.
pub struct RequestLimiter {
    inner: DirectRateLimiter,
    interval: Duration,
}

impl RequestLimiter {
    pub fn new(interval: Duration) -> Result<Self, ExplorerError> {
        let quota = Quota::with_period(interval).ok_or_else(|| {
            ExplorerError::InvalidConfig("rate limit interval must be non-zero".to_owned())
        })?;
        Ok(Self {
            inner: RateLimiter::direct(quota),
            interval,
        })
    }

    /// Wait until a token is available and take it.
    pub async fn acquire(&self) {
        if self.inner.check().is_err() {
            trace!(interval_ms = self.interval.as_millis() as u64, "waiting for rate limit token");
            self.inner.until_ready().await;
        }
    }
}

impl std::fmt::Debug for RequestLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLimiter")
            .field("interval", &self.interval)
            .finish()
    }
}
