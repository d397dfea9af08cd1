//! Linear backoff for outbound deliveries.

use chrono::Duration;

/// Statuses worth retrying: timeouts, rate limits and upstream hiccups.
pub const TRANSIENT_STATUSES: &[u16] = &[408, 425, 429, 500, 502, 503, 504];

pub fn is_transient_status(status: u16) -> bool {
    TRANSIENT_STATUSES.contains(&status)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: i32,
    pub base_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

impl RetryPolicy {
    pub fn new(max_attempts: i32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before the next try after `attempts` failures: `base * attempts`.
    pub fn delay_after(&self, attempts: i32) -> Duration {
        self.base_delay * attempts.max(1)
    }

    /// `attempts` counts the failure that just happened.
    pub fn decide(&self, attempts: i32, transient: bool) -> RetryDecision {
        if !transient || attempts >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter(self.delay_after(attempts))
        }
    }
}
