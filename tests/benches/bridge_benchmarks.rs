//! # Recruit Bridge Benchmarks
//!
//! | Path | Expectation |
//! |------|-------------|
//! | Registry register + resolve | sub-microsecond, flat under contention |
//! | Dispatcher, one frame | dominated by JSON decode |
//! | End-to-end call over the in-memory broker | well under 1ms |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use recruit_bridge::{
    BridgeConfig, CorrelationId, InboundDispatcher, PendingCallRegistry, ReplyFrame, WireMessage,
};
use recruit_tests::fixtures::{data, Harness, Script};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Registry
// ============================================================================

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");
    let registry = PendingCallRegistry::new();
    let payload = data(json!({"name": "Alice"}));

    group.bench_function("register_resolve", |b| {
        b.iter(|| {
            let id = CorrelationId::new();
            let mut rx = registry.register(id, "find_employee_by_id").unwrap();
            registry.resolve(&id, ReplyFrame::new(id, "find_employee_by_id", payload.clone()));
            black_box(rx.try_recv().is_ok())
        })
    });

    group.bench_function("register_remove", |b| {
        b.iter(|| {
            let id = CorrelationId::new();
            let _rx = registry.register(id, "find_employee_by_id").unwrap();
            black_box(registry.remove(&id))
        })
    });

    // Lookups against a registry that already holds many waiting calls
    for pending in [100usize, 10_000] {
        let crowded = PendingCallRegistry::new();
        let _receivers: Vec<_> = (0..pending)
            .map(|_| crowded.register(CorrelationId::new(), "find_job_by_id").unwrap())
            .collect();

        group.bench_with_input(
            BenchmarkId::new("resolve_among_pending", pending),
            &crowded,
            |b, crowded| {
                b.iter(|| {
                    let id = CorrelationId::new();
                    let _rx = crowded.register(id, "find_job_by_id").unwrap();
                    let frame = ReplyFrame::new(id, "find_job_by_id", payload.clone());
                    black_box(crowded.resolve(&id, frame))
                })
            },
        );
    }

    group.finish();
}

// ============================================================================
// Dispatcher
// ============================================================================

fn bench_dispatcher(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatcher");
    let registry = Arc::new(PendingCallRegistry::new());
    let dispatcher = InboundDispatcher::new(Arc::clone(&registry));

    let unmatched = WireMessage {
        id: CorrelationId::new().to_string(),
        message_type: "find_employee_by_id".into(),
        message_data: data(json!({"employee": {"id": "e-1", "name": "Alice"}})),
        reply_to: None,
    }
    .encode()
    .unwrap();

    group.throughput(Throughput::Bytes(unmatched.len() as u64));
    group.bench_function("unmatched_frame", |b| {
        b.iter(|| black_box(dispatcher.dispatch(&unmatched)))
    });

    group.bench_function("delivered_frame", |b| {
        b.iter_batched(
            || {
                let id = CorrelationId::new();
                let rx = registry.register(id, "find_employee_by_id").unwrap();
                let payload = data(json!({"name": "Alice"}));
                let body = ReplyFrame::new(id, "find_employee_by_id", payload)
                    .to_wire()
                    .encode()
                    .unwrap();
                (rx, body)
            },
            |(rx, body)| {
                black_box(dispatcher.dispatch(&body));
                rx
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.bench_function("malformed_frame", |b| {
        b.iter(|| black_box(dispatcher.dispatch(b"{\"id\":")))
    });

    group.finish();
}

// ============================================================================
// End to end
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let harness = runtime.block_on(async {
        let harness = Harness::start(BridgeConfig::default());
        let queue = harness.config.queues.employee.clone();
        let _seen = harness.sibling(&queue, |_| Script::reply(json!({"name": "Alice"})));
        harness
    });
    let queue = harness.config.queues.employee.clone();
    let (bridge, queue) = (harness.bridge(), queue.as_str());

    let mut group = c.benchmark_group("round_trip");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("single_call", |b| {
        b.to_async(&runtime).iter(move || async move {
            bridge
                .call(queue, "find_employee_by_id", data(json!({"employee_id": "e-1"})))
                .await
                .unwrap()
        })
    });

    for concurrency in [10usize, 100] {
        group.throughput(Throughput::Elements(concurrency as u64));
        group.bench_with_input(
            BenchmarkId::new("concurrent_calls", concurrency),
            &concurrency,
            |b, &concurrency| {
                b.to_async(&runtime).iter(move || async move {
                    let calls = (0..concurrency).map(|_| {
                        bridge.call(
                            queue,
                            "find_employee_by_id",
                            data(json!({"employee_id": "e-1"})),
                        )
                    });
                    futures::future::join_all(calls).await
                })
            },
        );
    }

    group.finish();
    runtime.block_on(harness.stop());
}

criterion_group!(benches, bench_registry, bench_dispatcher, bench_round_trip);
criterion_main!(benches);
