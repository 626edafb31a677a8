/*!
 * Timer Primitive
 * One-shot and repeating timers driven by the reactor clock
 */

use super::state::NotifyState;
use crate::core::errors::{EventError, Result};
use crate::reactor::Reactor;
use log::error;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A time-driven notification
///
/// Fires once after `timeout` seconds, then every `interval` seconds if an
/// interval was given. A one-shot timer closes itself after firing; its
/// final signal remains consumable by one waiter.
///
/// Requested durations are quantized to whole milliseconds internally
/// (rounding up), but the [`timeout`](Timer::timeout) and
/// [`interval`](Timer::interval) accessors return the values the caller
/// asked for.
///
/// # Example
///
/// ```
/// use asyncevent::Timer;
///
/// let timer = Timer::new(0.05).unwrap();
/// timer.wait().unwrap();
/// assert!(!timer.is_open());
/// ```
#[derive(Clone)]
pub struct Timer {
    state: Arc<NotifyState>,
    timeout: f64,
    interval: f64,
}

impl Timer {
    /// Register a one-shot timer firing after `timeout_secs`
    pub fn new(timeout_secs: f64) -> Result<Self> {
        Self::with_interval(timeout_secs, 0.0)
    }

    /// Register a timer firing after `timeout_secs`, then every
    /// `interval_secs`; an interval of zero means one-shot
    pub fn with_interval(timeout_secs: f64, interval_secs: f64) -> Result<Self> {
        Self::new_in(&Reactor::global(), timeout_secs, interval_secs)
    }

    /// Register a timer on a specific reactor
    pub fn new_in(reactor: &Arc<Reactor>, timeout_secs: f64, interval_secs: f64) -> Result<Self> {
        if timeout_secs < 0.0 || timeout_secs.is_nan() {
            return Err(EventError::InvalidArgument(format!(
                "timer timeout must be non-negative, got {timeout_secs}"
            )));
        }
        if interval_secs < 0.0 || interval_secs.is_nan() {
            return Err(EventError::InvalidArgument(format!(
                "timer interval must be non-negative, got {interval_secs}"
            )));
        }
        let initial = quantize_ms(timeout_secs);
        let interval = if interval_secs > 0.0 {
            Some(quantize_ms(interval_secs))
        } else {
            None
        };
        let state = NotifyState::new(reactor.clone());
        reactor.register_timer(&state, initial, interval)?;
        Ok(Self {
            state,
            timeout: timeout_secs,
            interval: interval_secs,
        })
    }

    /// Construct a timer plus a loop thread invoking `callback` after every
    /// fire
    ///
    /// An `Err` from the callback is reported to the log and stops the
    /// loop; it is never propagated to this constructor's caller. The loop
    /// thread holds its own clone, so it keeps running even if the caller
    /// drops every other handle; it exits once the timer closes.
    pub fn with_callback<F>(timeout_secs: f64, interval_secs: f64, mut callback: F) -> Result<Self>
    where
        F: FnMut(&Timer) -> Result<()> + Send + 'static,
    {
        let timer = Self::with_interval(timeout_secs, interval_secs)?;
        let worker = timer.clone();
        let spawned = thread::Builder::new()
            .name("asyncevent-timer".into())
            .spawn(move || {
                while worker.state.try_consume() {
                    if let Err(err) = callback(&worker) {
                        error!("timer callback failed: {err}");
                        break;
                    }
                    if !worker.is_open() {
                        break;
                    }
                }
            });
        if let Err(err) = spawned {
            timer.close();
            return Err(EventError::InitFailed(format!(
                "failed to spawn callback thread: {err}"
            )));
        }
        Ok(timer)
    }

    /// The requested timeout in seconds
    pub fn timeout(&self) -> f64 {
        self.timeout
    }

    /// The requested repeat interval in seconds; zero means one-shot
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Block until the timer fires
    ///
    /// Fails with [`EventError::Closed`] if the timer is closed without
    /// delivering a fire to this caller.
    pub fn wait(&self) -> Result<()> {
        self.state.wait()
    }

    /// Whether the timer can still fire
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Close the timer, waking all parked waiters with an error
    ///
    /// Idempotent. Returns only after the reactor has released the native
    /// handle.
    pub fn close(&self) {
        self.state.close()
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_open() { "open" } else { "closed" };
        if self.interval > 0.0 {
            write!(
                f,
                "Timer({status}, timeout {} s, interval {} s)",
                self.timeout, self.interval
            )
        } else {
            write!(f, "Timer({status}, timeout {} s)", self.timeout)
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("open", &self.is_open())
            .field("timeout", &self.timeout)
            .field("interval", &self.interval)
            .finish()
    }
}

/// Quantize seconds to whole milliseconds, rounding up
///
/// Rounding up keeps a wait from ever completing before the requested
/// duration; zero stays zero. Saturates on absurdly large requests.
fn quantize_ms(secs: f64) -> Duration {
    Duration::from_millis((secs * 1000.0).ceil() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_rounds_up() {
        assert_eq!(quantize_ms(0.2), Duration::from_millis(200));
        assert_eq!(quantize_ms(0.0005), Duration::from_millis(1));
        assert_eq!(quantize_ms(1.5), Duration::from_millis(1500));
        assert_eq!(quantize_ms(0.0), Duration::ZERO);
    }

    #[test]
    fn test_nan_timeout_rejected() {
        assert!(matches!(
            Timer::new(f64::NAN),
            Err(EventError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_display_formats() {
        let timer = Timer::with_interval(1.5, 0.25).unwrap();
        assert_eq!(timer.to_string(), "Timer(open, timeout 1.5 s, interval 0.25 s)");
        timer.close();
        assert_eq!(timer.to_string(), "Timer(closed, timeout 1.5 s, interval 0.25 s)");

        let one_shot = Timer::new(3.0).unwrap();
        assert_eq!(one_shot.to_string(), "Timer(open, timeout 3 s)");
        one_shot.close();
    }
}
