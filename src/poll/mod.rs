//! Fixed-interval wait-until-condition loop
//!
//! One shape serves both the projection running-status wait and report generation: issue a
//! check, stop if it resolved, otherwise sleep for the interval and check again. The loop never
//! backs off. A check that would only happen after the deadline is not issued, so a condition
//! that never resolves is checked exactly `floor(timeout / interval) + 1` times.

mod state;

pub use state::{PollConfig, PollState};

use log::debug;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result of a single check
#[derive(Debug, Clone, PartialEq)]
pub enum Check<T> {
    Ready(T),
    Pending,
}

#[derive(Debug, Error, PartialEq)]
pub enum PollError<E> {
    /// The check itself reported a terminal failure
    #[error("{0}")]
    Check(E),

    #[error("timed out after {elapsed:?} ({attempts} checks)")]
    TimedOut { elapsed: Duration, attempts: u32 },

    #[error("cancelled after {attempts} checks")]
    Cancelled { attempts: u32 },
}

/// Run `check` until it returns [`Check::Ready`], fails, the deadline passes, or `cancel` fires
///
/// `check` receives the 1-based attempt number.
pub async fn poll_until<T, E, F, Fut>(
    config: &PollConfig,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<T, PollError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Check<T>, E>>,
{
    let mut state = PollState::start(config);

    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled { attempts: state.attempts });
        }

        state.attempts += 1;
        match check(state.attempts).await {
            Ok(Check::Ready(value)) => return Ok(value),
            Ok(Check::Pending) => {}
            Err(e) => return Err(PollError::Check(e)),
        }

        if !state.can_wait_again() {
            return Err(PollError::TimedOut {
                elapsed: state.elapsed(),
                attempts: state.attempts,
            });
        }

        debug!("Check {} pending, next in {:?}", state.attempts, state.interval);
        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(PollError::Cancelled { attempts: state.attempts });
            }
            _ = tokio::time::sleep(state.interval) => {}
        }
    }
}
