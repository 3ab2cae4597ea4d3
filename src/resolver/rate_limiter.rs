//! Minimum spacing between resolution attempts.
//!
//! Protects the upstream DNS service from a consumer that refreshes
//! aggressively, e.g. a load balancer retrying every failed connection.

use crate::infra::Clock;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;

/// Minimum time between the starts of two consecutive attempts.
pub const MIN_RESOLUTION_INTERVAL: Duration = Duration::from_secs(15);

/// Tracks the start of the last attempt against a minimum interval.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    min_interval: Duration,
    last_start: Option<Instant>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_interval(clock, MIN_RESOLUTION_INTERVAL)
    }

    pub fn with_interval(clock: Arc<dyn Clock>, min_interval: Duration) -> Self {
        Self {
            clock,
            min_interval,
            last_start: None,
        }
    }

    /// How long the next attempt has to wait. Zero before the first attempt.
    pub fn time_until_next_allowed(&self) -> Duration {
        match self.last_start {
            Some(last) => self
                .min_interval
                .saturating_sub(self.clock.now().saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Marks the moment an attempt actually begins.
    pub fn record_start(&mut self) -> Instant {
        let now = self.clock.now();
        self.last_start = Some(now);
        now
    }

    pub fn last_start(&self) -> Option<Instant> {
        self.last_start
    }
}
