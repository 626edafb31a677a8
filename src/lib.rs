/*!
 * asyncevent
 * Event-driven notification and timer primitives on a shared event loop
 *
 * Two primitives are provided: [`AsyncEvent`], a manually-triggered
 * notification object that may be fired from any thread, and [`Timer`],
 * a one-shot or repeating timer. Both park waiters on a private condition
 * variable while the actual waiting for events happens on one dedicated
 * [`Reactor`] dispatch thread. [`sleep`] and [`timedwait`] are thin
 * compositions over the timer.
 */

pub mod core;
pub mod notify;
pub mod reactor;

// Re-exports
pub use crate::core::errors::{EventError, Result};
pub use crate::core::registry::HandleId;
pub use notify::{
    sleep, timedwait, timedwait_with, AsyncEvent, TimedWaitStatus, Timer, DEFAULT_POLL_INTERVAL,
};
pub use reactor::Reactor;
