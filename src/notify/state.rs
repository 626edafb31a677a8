/*!
 * Notification Core
 * The shared state machine and wait/signal/close protocol
 *
 * Both primitives share one object: an atomic handle id, an open flag, a
 * level-triggered auto-reset signaled flag, and a private mutex/condvar
 * pair. Waiters park on the condvar; the reactor's dispatch thread flips
 * the flags under the condition lock and notifies.
 *
 * # Lock ordering
 *
 * A waiter acquires the I/O lock, then the condition lock, then releases
 * the I/O lock before parking. Nothing ever acquires the I/O lock while
 * holding a condition lock, so the two can never deadlock, and no
 * operation ever holds two different objects' condition locks at once.
 *
 * # Pinning
 *
 * Every blocked waiter and every callback-loop thread holds a strong
 * `Arc` reference, so finalization (the `Drop` impl) cannot run while a
 * wait is outstanding; the registry holds only weak references and never
 * keeps an object alive by itself.
 */

use crate::core::registry::HandleId;
use crate::reactor::Reactor;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{fence, AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub(crate) struct NotifyState {
    /// Current handle id; 0 once the native side has fully released it
    native: AtomicU64,
    /// True from construction until shutdown begins
    open: AtomicBool,
    /// "An event occurred and has not yet been consumed by a waiter"
    signaled: AtomicBool,
    /// Private per-object condition pair; guards flag transitions that must
    /// be observed together with a wakeup and serializes close races
    lock: Mutex<()>,
    cond: Condvar,
    reactor: Arc<Reactor>,
}

impl NotifyState {
    pub(crate) fn new(reactor: Arc<Reactor>) -> Arc<Self> {
        Arc::new(Self {
            native: AtomicU64::new(HandleId::NULL.raw()),
            open: AtomicBool::new(true),
            signaled: AtomicBool::new(false),
            lock: Mutex::new(()),
            cond: Condvar::new(),
            reactor,
        })
    }

    /// Record the handle id; called by the reactor under the I/O lock
    /// before any event can be dispatched for it
    pub(crate) fn bind(&self, id: HandleId) {
        self.native.store(id.raw(), Ordering::Release);
    }

    #[inline]
    pub(crate) fn handle(&self) -> HandleId {
        HandleId(self.native.load(Ordering::Relaxed))
    }

    #[inline]
    pub(crate) fn reactor(&self) -> &Arc<Reactor> {
        &self.reactor
    }

    #[inline]
    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Consume one signal, blocking until one arrives or the object closes
    ///
    /// Returns the observed signaled value; `false` means the object is
    /// dead and this caller never got the event. The clear on the way out
    /// is intentionally racy: when several waiters are parked on one
    /// signal, an unspecified subset (at least one) each observe success.
    pub(crate) fn try_consume(&self) -> bool {
        let mut set = self.signaled.load(Ordering::Relaxed);
        if set {
            // Pairs with the release store in `on_trigger`; the trigger may
            // originate on a thread with no other synchronization edge.
            fence(Ordering::Acquire);
        } else if !self.is_open() {
            set = self.signaled.load(Ordering::Relaxed);
            if !set {
                self.close();
                return false;
            }
            fence(Ordering::Acquire);
        } else {
            let io = self.reactor.lock_io();
            set = self.signaled.load(Ordering::Relaxed);
            if !set && !self.handle().is_null() {
                let mut guard = self.lock.lock();
                drop(io);
                loop {
                    set = self.signaled.load(Ordering::Relaxed);
                    if set || self.handle().is_null() {
                        break;
                    }
                    self.cond.wait(&mut guard);
                }
            } else {
                drop(io);
            }
        }
        self.signaled.store(false, Ordering::Relaxed);
        set
    }

    /// Consume one signal or fail with the end-of-stream error
    pub(crate) fn wait(&self) -> crate::Result<()> {
        if self.try_consume() {
            Ok(())
        } else {
            Err(crate::EventError::Closed)
        }
    }

    /// Tear the object down; idempotent, never errors
    ///
    /// Synchronous with respect to native release: blocks until the close
    /// acknowledgment has run, so no further callback can fire for this
    /// object after `close` returns.
    pub(crate) fn close(&self) {
        let id = self.handle();
        if id.is_null() && !self.is_open() {
            return;
        }
        if self.open.swap(false, Ordering::Release) {
            self.reactor.request_close(id);
        }
        let mut guard = self.lock.lock();
        while !self.handle().is_null() {
            self.cond.wait(&mut guard);
        }
    }

    /// Signal callback for the manually-triggered primitive; dispatch
    /// thread only
    pub(crate) fn on_trigger(&self) {
        let _guard = self.lock.lock();
        self.signaled.store(true, Ordering::Release);
        self.cond.notify_all();
    }

    /// Timer-fired callback; dispatch thread only
    ///
    /// The relaxed store suffices here: this callback runs under the same
    /// condition lock waiters use, unlike the cross-thread trigger case.
    pub(crate) fn on_timer_fire(&self, repeats_remaining: bool) {
        let request_shutdown;
        {
            let _guard = self.lock.lock();
            self.signaled.store(true, Ordering::Relaxed);
            request_shutdown = !repeats_remaining && self.open.swap(false, Ordering::Release);
            self.cond.notify_all();
        }
        // outside the condition lock: `request_close` takes the I/O lock
        if request_shutdown {
            self.reactor.request_close(self.handle());
        }
    }

    /// Close acknowledgment; dispatch thread only, exactly once per object
    pub(crate) fn on_close_ack(&self, id: HandleId) {
        let _guard = self.lock.lock();
        debug_assert_eq!(self.handle(), id, "duplicate close acknowledgment");
        self.open.store(false, Ordering::Release);
        // already synchronized by the condition lock
        self.native.store(HandleId::NULL.raw(), Ordering::Relaxed);
        self.reactor.disassociate(id);
        self.cond.notify_all();
    }
}

/// Finalization: runs once the last strong owner is gone
///
/// No waiter can exist at this point, so unlike an explicit close there is
/// no acknowledgment to wait for; the handle is released inline.
impl Drop for NotifyState {
    fn drop(&mut self) {
        let id = self.handle();
        if id.is_null() {
            return;
        }
        self.reactor.release_sync(id);
        self.open.store(false, Ordering::Release);
        self.native.store(HandleId::NULL.raw(), Ordering::Relaxed);
    }
}
