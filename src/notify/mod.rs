/*!
 * Notification Primitives
 *
 * The shared wait/signal state machine and the two primitives built on it:
 * [`AsyncEvent`] (manually triggered, from any thread) and [`Timer`]
 * (one-shot or repeating), plus the derived [`sleep`] and [`timedwait`]
 * utilities.
 */

mod async_event;
pub(crate) mod state;
mod timer;
mod util;

pub use async_event::AsyncEvent;
pub use timer::Timer;
pub use util::{sleep, timedwait, timedwait_with, TimedWaitStatus, DEFAULT_POLL_INTERVAL};
