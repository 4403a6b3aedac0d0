//! Local bookkeeping for one poll loop

use std::time::Duration;
use tokio::time::Instant;

/// Interval and optional overall deadline for a poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// `None` waits until the condition resolves or the loop is cancelled
    pub timeout: Option<Duration>,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }
}

/// State of a running poll loop. Never persisted; dropped when the loop returns.
#[derive(Debug, Clone)]
pub struct PollState {
    pub started_at: Instant,
    pub deadline: Option<Instant>,
    pub interval: Duration,
    /// Checks issued so far
    pub attempts: u32,
}

impl PollState {
    pub fn start(config: &PollConfig) -> Self {
        let started_at = Instant::now();
        Self {
            started_at,
            // a deadline past the representable range never arrives
            deadline: config.timeout.and_then(|t| started_at.checked_add(t)),
            interval: config.interval,
            attempts: 0,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Whether waiting one more interval stays within the deadline
    pub fn can_wait_again(&self) -> bool {
        match self.deadline {
            Some(deadline) => match Instant::now().checked_add(self.interval) {
                Some(next) => next <= deadline,
                None => false,
            },
            None => true,
        }
    }
}
