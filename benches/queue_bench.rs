use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dispatchq::dispatch_queue::DispatchQueue;
use dispatchq::priority::Priority;
use dispatchq::request::Request;

fn bench_dispatch_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_queue");

    group.bench_function("enqueue_remove", |b| {
        let queue = DispatchQueue::new(1024);
        let mut id = 0u64;
        b.iter(|| {
            id += 1;
            let priority = Priority::ALL[(id % 3) as usize];
            queue
                .try_enqueue(black_box(Request::new(id, 0, priority)))
                .unwrap();
            queue.lock().remove_head().unwrap();
        });
    });

    group.bench_function("burst_then_drain", |b| {
        let queue = DispatchQueue::new(256);
        let mut id = 0u64;
        b.iter(|| {
            for _ in 0..64 {
                id += 1;
                let priority = Priority::ALL[(id % 3) as usize];
                let _ = queue.try_enqueue(Request::new(id, (id % 4) as u32, priority));
            }
            while queue.lock().remove_head().is_some() {}
        });
    });

    group.finish();
}

criterion_group!(benches, bench_dispatch_queue);
criterion_main!(benches);
