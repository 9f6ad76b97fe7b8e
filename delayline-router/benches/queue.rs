use std::time::{Duration, Instant};

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, Criterion};

use delayline_router::{Message, RouteQueue};

fn bench_enqueue_drain(c: &mut Criterion) {
    let payload = Bytes::from_static(&[0u8; 128]);

    c.bench_function("enqueue_drain_1024", |b| {
        let queue = RouteQueue::new(Duration::ZERO);

        b.iter(|| {
            for _ in 0..1024 {
                queue.enqueue(Message::new(payload.clone()));
            }

            let now = Instant::now();
            while queue.pop_ready(now).is_some() {}
        });
    });

    c.bench_function("snapshot_under_backlog", |b| {
        let queue = RouteQueue::new(Duration::from_secs(60));
        for _ in 0..10_000 {
            queue.enqueue(Message::new(payload.clone()));
        }

        b.iter(|| queue.snapshot());
    });
}

criterion_group!(benches, bench_enqueue_drain);
criterion_main!(benches);
