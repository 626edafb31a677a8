/*!
 * Derived Utilities
 * sleep and timedwait, thin compositions over the timer
 */

use super::timer::Timer;
use crate::core::errors::{EventError, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Default predicate poll interval for [`timedwait`], in seconds
pub const DEFAULT_POLL_INTERVAL: f64 = 0.1;

/// Poll intervals below one millisecond are rejected
const MIN_POLL_INTERVAL: f64 = 0.001;

/// Outcome of a [`timedwait`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimedWaitStatus {
    /// The predicate turned true within the timeout
    Ok,
    /// The timeout elapsed first
    TimedOut,
}

/// Block the calling thread for `secs` seconds
///
/// Fails with an invalid-argument error for negative durations.
pub fn sleep(secs: f64) -> Result<()> {
    let timer = Timer::new(secs)?;
    timer.wait()?;
    Ok(())
}

/// Poll `predicate` every [`DEFAULT_POLL_INTERVAL`] seconds until it turns
/// true or `timeout_secs` elapses
pub fn timedwait<F>(predicate: F, timeout_secs: f64) -> Result<TimedWaitStatus>
where
    F: FnMut() -> bool,
{
    timedwait_with(predicate, timeout_secs, DEFAULT_POLL_INTERVAL)
}

/// Poll `predicate` every `poll_interval_secs` until it turns true or
/// `timeout_secs` elapses
///
/// Returns immediately, creating no timer, if the predicate already holds.
/// The poll interval must be at least one millisecond.
pub fn timedwait_with<F>(
    mut predicate: F,
    timeout_secs: f64,
    poll_interval_secs: f64,
) -> Result<TimedWaitStatus>
where
    F: FnMut() -> bool,
{
    if timeout_secs < 0.0 || timeout_secs.is_nan() {
        return Err(EventError::InvalidArgument(format!(
            "timedwait timeout must be non-negative, got {timeout_secs}"
        )));
    }
    if poll_interval_secs < MIN_POLL_INTERVAL || poll_interval_secs.is_nan() {
        return Err(EventError::InvalidArgument(format!(
            "poll interval must be at least {MIN_POLL_INTERVAL} s, got {poll_interval_secs}"
        )));
    }
    if predicate() {
        return Ok(TimedWaitStatus::Ok);
    }

    let start = Instant::now();
    let timer = Timer::with_interval(poll_interval_secs, poll_interval_secs)?;
    let status = loop {
        let tick = timer.wait();
        if predicate() {
            break TimedWaitStatus::Ok;
        }
        if start.elapsed().as_secs_f64() > timeout_secs || tick.is_err() {
            break TimedWaitStatus::TimedOut;
        }
    };
    timer.close();
    Ok(status)
}
