use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use segment_manager::{NullProtocolParser, SegmentManager, SegmentManagerConfig};

fn manager() -> SegmentManager {
    SegmentManager::new(SegmentManagerConfig::default(), Arc::new(NullProtocolParser))
}

/// Benchmark the send hot path: `send()` + `dequeue_for_send()`.
fn bench_send(c: &mut Criterion) {
    let payload = vec![0xABu8; 512];

    let mut group = c.benchmark_group("send");
    group.throughput(Throughput::Elements(1));

    group.bench_function("send_single_segment", |b| {
        let mgr = manager();
        b.iter(|| {
            mgr.send(black_box(&payload), false).unwrap();
            mgr.dequeue_for_send();
        });
    });

    group.finish();
}

/// Benchmark the receive hot path: `enqueue_received()` + `recv()`.
fn bench_recv(c: &mut Criterion) {
    let mgr = manager();
    let payload = vec![0xABu8; 512];

    let mut group = c.benchmark_group("recv");
    group.throughput(Throughput::Elements(1));

    group.bench_function("recv_single_segment", |b| {
        b.iter(|| {
            mgr.send(black_box(&payload), false).unwrap();
            let seg = mgr.dequeue_for_send().unwrap();
            mgr.enqueue_received(seg);
            black_box(mgr.recv(false));
        });
    });

    group.finish();
}

/// Benchmark the free pool's pop/push cycle in isolation.
fn bench_free_pool_cycle(c: &mut Criterion) {
    let mgr = manager();
    // Warm the pool so pop() hits the reuse path, not the allocation path.
    for _ in 0..64 {
        mgr.send(b"warm", false).unwrap();
        let seg = mgr.dequeue_for_send().unwrap();
        mgr.enqueue_received(seg);
        mgr.recv(false);
    }

    let mut group = c.benchmark_group("free_pool");
    group.throughput(Throughput::Elements(1));

    group.bench_function("send_recv_steady_state", |b| {
        let payload = vec![0xCDu8; 512];
        b.iter(|| {
            mgr.send(black_box(&payload), false).unwrap();
            let seg = mgr.dequeue_for_send().unwrap();
            mgr.enqueue_received(seg);
            black_box(mgr.recv(false));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_send, bench_recv, bench_free_pool_cycle);
criterion_main!(benches);
