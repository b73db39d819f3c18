use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lantern_core::core_discovery::{Classifier, DirectEndpoint, HubMessage, RotatingPool};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn endpoint(i: usize) -> DirectEndpoint {
    let id = format!("10.0.{}.{}:8080", i / 256, i % 256);
    DirectEndpoint::new(id.clone(), format!("10.0.{}.{}", i / 256, i % 256), 8080)
}

fn filled_pool(size: usize) -> RotatingPool<DirectEndpoint> {
    let pool = RotatingPool::new("bench");
    for i in 0..size {
        pool.try_admit(endpoint(i));
    }
    pool
}

fn bench_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_admission");

    for size in [16, 256, 4096].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("fresh", size), size, |b, &size| {
            b.iter(|| black_box(filled_pool(size)));
        });

        // Re-admitting members is the common path for repeated hub lists
        let pool = filled_pool(*size);
        group.bench_with_input(BenchmarkId::new("duplicate", size), size, |b, &size| {
            b.iter(|| {
                for i in 0..size {
                    black_box(pool.try_admit(endpoint(i)));
                }
            });
        });
    }

    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_selection");

    for size in [16, 256, 4096].iter() {
        let pool = filled_pool(*size);

        group.bench_with_input(BenchmarkId::new("next", size), size, |b, _| {
            b.iter(|| black_box(pool.next()));
        });

        group.bench_with_input(BenchmarkId::new("checkout", size), size, |b, _| {
            b.iter(|| {
                let lease = pool.checkout();
                black_box(lease.as_ref().map(|l| l.port()))
            });
        });
    }

    group.finish();
}

fn bench_contended_next(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_contention");
    let rt = Runtime::new().unwrap();

    for tasks in [2, 8, 32].iter() {
        let pool = Arc::new(filled_pool(256));
        group.bench_with_input(BenchmarkId::new("next_tasks", tasks), tasks, |b, &tasks| {
            b.iter(|| {
                rt.block_on(async {
                    let mut handles = Vec::with_capacity(tasks);
                    for _ in 0..tasks {
                        let pool = pool.clone();
                        handles.push(tokio::spawn(async move {
                            for _ in 0..64 {
                                black_box(pool.next());
                            }
                        }));
                    }
                    for handle in handles {
                        handle.await.unwrap();
                    }
                })
            });
        });
    }

    group.finish();
}

fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");
    let classifier = Classifier::new("bob@example.com/-lan-2", vec!["appspot".to_string()], 443);

    let inputs = [
        ("self", "bob@example.com/-lan-2"),
        ("trusted", "bob@example.com/-lan-7"),
        ("server_managed", "fallback@lantern-proxy.appspot.com"),
        ("anonymous", "alice@example.org/-lan-1"),
        ("direct", "203.0.113.7:8080"),
    ];
    for (name, raw) in inputs.iter() {
        group.bench_function(*name, |b| {
            b.iter(|| black_box(classifier.classify(black_box(raw))))
        });
    }

    let servers: Vec<String> = (0..64).map(|i| format!("\"10.1.0.{}:443\"", i)).collect();
    let body = format!("{{\"servers\":[{}],\"update_time\":60000}}", servers.join(","));
    group.bench_function("hub_message_64_servers", |b| {
        b.iter(|| black_box(HubMessage::parse(black_box(&body))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_admission,
    bench_selection,
    bench_contended_next,
    bench_classification
);
criterion_main!(benches);
