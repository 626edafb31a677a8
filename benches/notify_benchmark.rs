/*!
 * Notification Benchmarks
 *
 * Trigger/wait round-trip latency and primitive lifecycle cost
 */

use asyncevent::{AsyncEvent, Timer};
use criterion::{criterion_group, criterion_main, Criterion};

fn bench_trigger_wait_round_trip(c: &mut Criterion) {
    let event = AsyncEvent::new().unwrap();
    c.bench_function("async_event_trigger_wait", |b| {
        b.iter(|| {
            event.trigger();
            event.wait().unwrap();
        })
    });
    event.close();
}

fn bench_timer_lifecycle(c: &mut Criterion) {
    c.bench_function("timer_create_close", |b| {
        b.iter(|| {
            let timer = Timer::new(60.0).unwrap();
            timer.close();
        })
    });
}

fn bench_zero_timer_wait(c: &mut Criterion) {
    c.bench_function("timer_zero_wait", |b| {
        b.iter(|| {
            let timer = Timer::new(0.0).unwrap();
            timer.wait().unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_trigger_wait_round_trip,
    bench_timer_lifecycle,
    bench_zero_timer_wait
);
criterion_main!(benches);
