/*!
 * Event Loop Reactor
 * Single-threaded dispatcher for timer deadlines and cross-thread triggers
 *
 * One dedicated thread owns event dispatch for any number of registered
 * handles. All mutation of the registration structures happens under a
 * single mutex (the I/O lock); callbacks are always invoked after that
 * lock has been released, so a slow waiter can never stall registration
 * and the per-object condition locks never nest inside the I/O lock on
 * the dispatch thread.
 */

use crate::core::errors::{EventError, Result};
use crate::core::registry::{HandleId, HandleTable};
use crate::notify::state::NotifyState;
use ahash::RandomState;
use log::debug;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

static GLOBAL_REACTOR: OnceLock<Arc<Reactor>> = OnceLock::new();

/// Registered event source kinds
enum Source {
    /// Cross-thread trigger; `pending` is latched by `trigger_async` and
    /// cleared when the dispatch thread collects it
    Async { pending: bool },
    /// Timer deadline; `None` once a one-shot has fired and is disarmed.
    /// `interval == None` means one-shot
    Timer {
        deadline: Option<Instant>,
        interval: Option<Duration>,
    },
}

struct Entry {
    source: Source,
    /// Set by `request_close`; the dispatch thread removes the entry and
    /// delivers exactly one close acknowledgment
    closing: bool,
}

/// Registration state guarded by the I/O lock
pub(crate) struct LoopState {
    entries: HashMap<u64, Entry, RandomState>,
    next_id: u64,
    shutdown: bool,
}

/// Work collected under the I/O lock, dispatched outside it
enum Event {
    Triggered(HandleId),
    TimerFired {
        id: HandleId,
        repeats_remaining: bool,
    },
    CloseAck(HandleId),
}

/// The event loop: registration surface plus one dispatch thread
///
/// `Reactor::global()` returns the lazily-started process-wide instance,
/// which runs for the life of the process. Private instances from
/// [`Reactor::new`] are useful for tests and embedding; call
/// [`Reactor::shutdown`] when done with one, after closing every primitive
/// registered on it, or its dispatch thread is leaked.
pub struct Reactor {
    /// The I/O lock
    state: Mutex<LoopState>,
    /// Wakes the dispatch thread on registration, trigger, and close request
    wakeup: Condvar,
    registry: HandleTable,
}

impl Reactor {
    /// Start a private reactor with its own dispatch thread
    pub fn new() -> Result<Arc<Self>> {
        let reactor = Arc::new(Self {
            state: Mutex::new(LoopState {
                entries: HashMap::with_hasher(RandomState::new()),
                next_id: 1,
                shutdown: false,
            }),
            wakeup: Condvar::new(),
            registry: HandleTable::new(),
        });

        let worker = reactor.clone();
        thread::Builder::new()
            .name("asyncevent-reactor".into())
            .spawn(move || worker.run())
            .map_err(|err| {
                EventError::InitFailed(format!("failed to spawn dispatch thread: {err}"))
            })?;

        Ok(reactor)
    }

    /// The process-wide reactor, started on first use
    pub fn global() -> Arc<Self> {
        GLOBAL_REACTOR
            .get_or_init(|| Reactor::new().expect("failed to start the event loop thread"))
            .clone()
    }

    /// Stop the dispatch thread
    ///
    /// Every entry still registered is torn down with a close
    /// acknowledgment, so waiters blocked on a registered object observe
    /// it closed rather than hanging. Subsequent registrations fail with
    /// an initialization error.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if !state.shutdown {
            state.shutdown = true;
            self.wakeup.notify_all();
        }
    }

    /// Number of live registrations (for diagnostics and tests)
    pub fn handle_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Register a manually-triggered event source
    ///
    /// Binds the allocated id to `state` and associates it with the
    /// registry before the I/O lock is released, so no event can fire for
    /// a handle whose object cannot yet be resolved.
    pub(crate) fn register_async(&self, state: &Arc<NotifyState>) -> Result<HandleId> {
        let mut loop_state = self.state.lock();
        if loop_state.shutdown {
            return Err(EventError::InitFailed("event loop is shut down".into()));
        }
        let id = Self::allocate(&mut loop_state);
        state.bind(id);
        self.registry.associate(id, state);
        loop_state.entries.insert(
            id.raw(),
            Entry {
                source: Source::Async { pending: false },
                closing: false,
            },
        );
        debug!("registered async handle {id}");
        Ok(id)
    }

    /// Register a timer firing once after `initial`, then every `interval`
    /// if one is given
    pub(crate) fn register_timer(
        &self,
        state: &Arc<NotifyState>,
        initial: Duration,
        interval: Option<Duration>,
    ) -> Result<HandleId> {
        let mut loop_state = self.state.lock();
        if loop_state.shutdown {
            return Err(EventError::InitFailed("event loop is shut down".into()));
        }
        let id = Self::allocate(&mut loop_state);
        state.bind(id);
        self.registry.associate(id, state);
        loop_state.entries.insert(
            id.raw(),
            Entry {
                source: Source::Timer {
                    deadline: Some(Instant::now() + initial),
                    interval,
                },
                closing: false,
            },
        );
        debug!("registered timer handle {id} (initial {initial:?}, interval {interval:?})");
        self.wakeup.notify_all();
        Ok(id)
    }

    /// Latch a trigger for an async handle
    ///
    /// Thread-safe and callable from threads with no relation to the
    /// reactor; a no-op once the handle is closing or gone.
    pub(crate) fn trigger_async(&self, id: HandleId) {
        if id.is_null() {
            return;
        }
        let mut loop_state = self.state.lock();
        if let Some(entry) = loop_state.entries.get_mut(&id.raw()) {
            if !entry.closing {
                if let Source::Async { pending } = &mut entry.source {
                    *pending = true;
                    self.wakeup.notify_all();
                }
            }
        }
    }

    /// Ask the dispatch thread to tear the handle down
    ///
    /// Asynchronous: the acknowledgment arrives later as `on_close_ack` on
    /// the owning object. Idempotent, and a no-op for ids already gone.
    pub(crate) fn request_close(&self, id: HandleId) {
        if id.is_null() {
            return;
        }
        let mut loop_state = self.state.lock();
        if let Some(entry) = loop_state.entries.get_mut(&id.raw()) {
            if !entry.closing {
                entry.closing = true;
                self.wakeup.notify_all();
            }
        }
    }

    /// Synchronously release a handle during finalization
    ///
    /// The caller has no waiters to acknowledge, so the entry and its
    /// registry association are removed inline. Tolerates an entry already
    /// removed by an in-flight close.
    pub(crate) fn release_sync(&self, id: HandleId) {
        self.registry.disassociate(id);
        let mut loop_state = self.state.lock();
        loop_state.entries.remove(&id.raw());
    }

    /// Remove the registry association for a handle (close-ack path)
    pub(crate) fn disassociate(&self, id: HandleId) {
        self.registry.disassociate(id);
    }

    /// Acquire the I/O lock
    ///
    /// Waiters hold this across their final signaled re-check so a
    /// registration-state change cannot slip between the check and the
    /// acquisition of the object's condition lock.
    pub(crate) fn lock_io(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock()
    }

    fn allocate(loop_state: &mut LoopState) -> HandleId {
        let id = HandleId(loop_state.next_id);
        loop_state.next_id += 1;
        id
    }

    /// Dispatch thread body
    fn run(self: Arc<Self>) {
        debug!("reactor dispatch thread started");
        let mut due: Vec<Event> = Vec::new();
        loop {
            {
                let mut state = self.state.lock();
                loop {
                    if state.shutdown {
                        Self::drain(&mut state, &mut due);
                        drop(state);
                        for event in due.drain(..) {
                            self.dispatch(event);
                        }
                        debug!("reactor dispatch thread stopped");
                        return;
                    }
                    Self::collect_due(&mut state, &mut due);
                    if !due.is_empty() {
                        break;
                    }
                    match Self::next_deadline(&state) {
                        Some(deadline) => {
                            let _ = self.wakeup.wait_until(&mut state, deadline);
                        }
                        None => self.wakeup.wait(&mut state),
                    }
                }
            }
            for event in due.drain(..) {
                self.dispatch(event);
            }
        }
    }

    /// Collect every due piece of work; runs under the I/O lock
    fn collect_due(state: &mut LoopState, due: &mut Vec<Event>) {
        let now = Instant::now();
        state.entries.retain(|&raw, entry| {
            let id = HandleId(raw);
            if entry.closing {
                due.push(Event::CloseAck(id));
                return false;
            }
            match &mut entry.source {
                Source::Async { pending } => {
                    if *pending {
                        *pending = false;
                        due.push(Event::Triggered(id));
                    }
                }
                Source::Timer { deadline, interval } => {
                    if let Some(when) = *deadline {
                        if when <= now {
                            match *interval {
                                Some(step) => {
                                    let mut next = when;
                                    while next <= now {
                                        next += step;
                                    }
                                    *deadline = Some(next);
                                    due.push(Event::TimerFired {
                                        id,
                                        repeats_remaining: true,
                                    });
                                }
                                None => {
                                    // one-shot: disarm; the object requests
                                    // teardown from its fire callback
                                    *deadline = None;
                                    due.push(Event::TimerFired {
                                        id,
                                        repeats_remaining: false,
                                    });
                                }
                            }
                        }
                    }
                }
            }
            true
        });
    }

    /// Tear down every remaining entry at shutdown
    fn drain(state: &mut LoopState, due: &mut Vec<Event>) {
        for (&raw, _) in state.entries.iter() {
            due.push(Event::CloseAck(HandleId(raw)));
        }
        state.entries.clear();
    }

    /// Earliest armed timer deadline, if any; runs under the I/O lock
    fn next_deadline(state: &LoopState) -> Option<Instant> {
        state
            .entries
            .values()
            .filter_map(|entry| match entry.source {
                Source::Timer {
                    deadline: Some(when),
                    ..
                } => Some(when),
                _ => None,
            })
            .min()
    }

    /// Invoke the object callback for one event; never holds the I/O lock
    fn dispatch(&self, event: Event) {
        match event {
            Event::Triggered(id) => {
                if let Some(state) = self.registry.resolve(id) {
                    state.on_trigger();
                }
            }
            Event::TimerFired {
                id,
                repeats_remaining,
            } => {
                if let Some(state) = self.registry.resolve(id) {
                    state.on_timer_fire(repeats_remaining);
                }
            }
            Event::CloseAck(id) => match self.registry.resolve(id) {
                Some(state) => state.on_close_ack(id),
                // finalized between the close request and the acknowledgment
                None => debug!("close acknowledgment for finalized handle {id}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_rejects_registration() {
        let reactor = Reactor::new().unwrap();
        reactor.shutdown();

        let state = NotifyState::new(reactor.clone());
        let result = reactor.register_async(&state);
        assert!(matches!(result, Err(EventError::InitFailed(_))));
    }

    #[test]
    fn test_trigger_unknown_handle_is_noop() {
        let reactor = Reactor::new().unwrap();
        reactor.trigger_async(HandleId(42));
        reactor.trigger_async(HandleId::NULL);
        reactor.request_close(HandleId(42));
        assert_eq!(reactor.handle_count(), 0);
        reactor.shutdown();
    }

    #[test]
    fn test_handle_ids_are_not_reused() {
        let reactor = Reactor::new().unwrap();
        let first = NotifyState::new(reactor.clone());
        let second = NotifyState::new(reactor.clone());
        let a = reactor.register_async(&first).unwrap();
        let b = reactor.register_async(&second).unwrap();
        assert_ne!(a, b);
        first.close();
        second.close();
        assert_eq!(reactor.handle_count(), 0);
        reactor.shutdown();
    }
}
