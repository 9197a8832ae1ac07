//! Poll policies with injectable waiting
//!
//! The transcode status loop polls on a fixed interval with a bounded
//! attempt budget. The wait itself goes through the [`Sleeper`] trait
//! so the loop logic can be exercised in tests without real delays.

use std::time::Duration;

/// Fixed-interval poll policy with a bounded attempt budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between consecutive polls
    pub interval: Duration,
    /// Maximum number of polls before giving up
    pub max_attempts: u32,
}

impl PollPolicy {
    /// Creates a policy from a whole-second interval and an attempt budget
    #[must_use]
    pub fn new(interval_secs: u64, max_attempts: u32) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            max_attempts,
        }
    }

    /// Policy for transcode status polling: 2 s between polls, 30 polls
    #[must_use]
    pub fn transcode() -> Self {
        Self::new(2, 30)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::transcode()
    }
}

/// Abstraction over waiting between polls
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspends the caller for the given duration
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleeper that returns immediately
///
/// Lets poll-loop tests run every attempt without waiting while keeping
/// the attempt accounting identical to production.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSleeper;

#[async_trait::async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, _duration: Duration) {}
}
