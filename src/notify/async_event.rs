/*!
 * Async Condition Primitive
 * A manually-triggered notification, fireable from any thread
 */

use super::state::NotifyState;
use crate::core::errors::{EventError, Result};
use crate::reactor::Reactor;
use std::fmt;
use std::sync::Arc;
use std::thread;

/// Level-triggered one-shot wakeup object
///
/// `trigger` may be called from any thread, including threads with no
/// relation to the reactor; a parked [`wait`](AsyncEvent::wait) observes
/// the trigger with full memory-ordering visibility of everything that
/// happened before it on the triggering thread.
///
/// Clones share the same underlying object. The object is finalized
/// (native handle released, without blocking) when the last clone is
/// dropped, unless it was already closed.
///
/// # Example
///
/// ```
/// use asyncevent::AsyncEvent;
/// use std::thread;
///
/// let event = AsyncEvent::new().unwrap();
/// let remote = event.clone();
/// thread::spawn(move || remote.trigger());
/// event.wait().unwrap();
/// event.close();
/// ```
#[derive(Clone)]
pub struct AsyncEvent {
    state: Arc<NotifyState>,
}

impl AsyncEvent {
    /// Register a new event on the global reactor
    pub fn new() -> Result<Self> {
        Self::new_in(&Reactor::global())
    }

    /// Register a new event on a specific reactor
    ///
    /// Fails with an initialization error if the reactor is shut down;
    /// nothing remains registered when the error surfaces.
    pub fn new_in(reactor: &Arc<Reactor>) -> Result<Self> {
        let state = NotifyState::new(reactor.clone());
        reactor.register_async(&state)?;
        Ok(Self { state })
    }

    /// Construct an event plus a loop thread invoking `callback` after
    /// every successful wait
    ///
    /// The loop thread holds its own clone, so it keeps running even if the
    /// caller drops every other handle; it exits when the event is closed.
    pub fn with_callback<F>(mut callback: F) -> Result<Self>
    where
        F: FnMut(&AsyncEvent) + Send + 'static,
    {
        let event = Self::new()?;
        let worker = event.clone();
        let spawned = thread::Builder::new()
            .name("asyncevent-cb".into())
            .spawn(move || {
                while worker.state.try_consume() {
                    callback(&worker);
                    if !worker.is_open() {
                        break;
                    }
                }
            });
        if let Err(err) = spawned {
            event.close();
            return Err(EventError::InitFailed(format!(
                "failed to spawn callback thread: {err}"
            )));
        }
        Ok(event)
    }

    /// Request a wakeup soon
    ///
    /// Never blocks; triggers delivered before a waiter arrives are latched
    /// (level-triggered), and triggers after `close` are no-ops.
    pub fn trigger(&self) {
        self.state.reactor().trigger_async(self.state.handle());
    }

    /// Block until triggered
    ///
    /// Fails with [`EventError::Closed`] if the event is closed without
    /// ever delivering a trigger to this caller.
    pub fn wait(&self) -> Result<()> {
        self.state.wait()
    }

    /// Whether the event can still deliver triggers
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Close the event, waking all parked waiters with an error
    ///
    /// Idempotent. Returns only after the reactor has released the native
    /// handle; no callback can fire for this event afterwards.
    pub fn close(&self) {
        self.state.close()
    }
}

impl fmt::Display for AsyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_open() { "open" } else { "closed" };
        write!(f, "AsyncEvent({status})")
    }
}

impl fmt::Debug for AsyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncEvent")
            .field("open", &self.is_open())
            .field("handle", &self.state.handle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_states() {
        let event = AsyncEvent::new().unwrap();
        assert_eq!(event.to_string(), "AsyncEvent(open)");
        event.close();
        assert_eq!(event.to_string(), "AsyncEvent(closed)");
    }

    #[test]
    fn test_clones_share_state() {
        let event = AsyncEvent::new().unwrap();
        let other = event.clone();
        event.close();
        assert!(!other.is_open());
    }
}
