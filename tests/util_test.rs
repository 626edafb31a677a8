/*!
 * Derived Utility Integration Tests
 *
 * sleep and timedwait timing and argument validation
 */

use asyncevent::{sleep, timedwait, timedwait_with, EventError, TimedWaitStatus};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_sleep_blocks_for_duration() {
    let start = Instant::now();
    sleep(0.2).unwrap();
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[test]
fn test_sleep_zero_returns_promptly() {
    let start = Instant::now();
    sleep(0.0).unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_sleep_negative_rejected() {
    assert!(matches!(sleep(-1.0), Err(EventError::InvalidArgument(_))));
}

#[test]
fn test_timedwait_false_predicate_times_out() {
    let start = Instant::now();
    let status = timedwait_with(|| false, 0.2, 0.05).unwrap();
    assert_eq!(status, TimedWaitStatus::TimedOut);
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[test]
fn test_timedwait_true_predicate_returns_immediately() {
    let start = Instant::now();
    let status = timedwait(|| true, 10.0).unwrap();
    assert_eq!(status, TimedWaitStatus::Ok);
    // no timer is created, so nothing should have blocked
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[test]
fn test_timedwait_predicate_turns_true() {
    let flag = Arc::new(AtomicBool::new(false));
    let setter = flag.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        setter.store(true, Ordering::Release);
    });

    let start = Instant::now();
    let status = timedwait_with(move || flag.load(Ordering::Acquire), 5.0, 0.02).unwrap();
    assert_eq!(status, TimedWaitStatus::Ok);
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_timedwait_sub_millisecond_poll_rejected() {
    let status = timedwait_with(|| false, 1.0, 0.0001);
    assert!(matches!(status, Err(EventError::InvalidArgument(_))));
}

#[test]
fn test_timedwait_negative_timeout_rejected() {
    let status = timedwait(|| false, -1.0);
    assert!(matches!(status, Err(EventError::InvalidArgument(_))));
}

#[test]
fn test_status_serialization() {
    let json = serde_json::to_string(&TimedWaitStatus::TimedOut).unwrap();
    assert_eq!(json, "\"timed_out\"");
    let back: TimedWaitStatus = serde_json::from_str(&json).unwrap();
    assert_eq!(back, TimedWaitStatus::TimedOut);
}
