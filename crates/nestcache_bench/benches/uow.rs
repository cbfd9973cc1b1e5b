//! Unit of work lifecycle benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nestcache_bench::{bench_by_id, bench_facets, nest_chain, payload, populate, quiet_session};
use nestcache_core::Facet;
use rand::Rng;

/// Benchmark begin/commit overhead (empty unit).
fn bench_begin_commit(c: &mut Criterion) {
    c.bench_function("begin_commit_empty", |b| {
        let session = quiet_session();

        b.iter(|| {
            let uow = session.begin().unwrap();
            uow.commit().unwrap();
        });
    });
}

/// Benchmark begin/abort overhead (empty unit).
fn bench_begin_abort(c: &mut Criterion) {
    c.bench_function("begin_abort_empty", |b| {
        let session = quiet_session();

        b.iter(|| {
            let uow = session.begin().unwrap();
            uow.abort().unwrap();
        });
    });
}

/// Benchmark update cost by alias fan-out.
fn bench_update_aliases(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_aliases");

    for aliases in [1usize, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(*aliases as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(aliases),
            aliases,
            |b, &aliases| {
                let session = quiet_session();
                let uow = session.begin().unwrap();
                let facets: Vec<Facet> = std::iter::once(Facet::fixed("table", "bench"))
                    .chain((0..aliases).map(|a| Facet::new(format!("key{a}"), "v")))
                    .collect();
                let value = payload(64);

                b.iter(|| {
                    uow.update(black_box(value.clone()), &facets).unwrap();
                });

                uow.commit().unwrap();
            },
        );
    }
    group.finish();
}

/// Benchmark lookups resolving at increasing ancestor depth.
fn bench_lookup_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_depth");

    for depth in [1usize, 4, 16, 64].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            let session = quiet_session();
            let root = session.begin().unwrap();
            populate(&root, 100);
            let (_chain, leaf) = nest_chain(&root, depth);
            let mut rng = rand::thread_rng();

            b.iter(|| {
                let i = rng.gen_range(0..100);
                let found = leaf.lookup(black_box(&bench_by_id(i))).unwrap();
                black_box(found);
            });
        });
    }
    group.finish();
}

/// Benchmark evictions sweeping the alias closure of a live entry.
fn bench_evict_closure(c: &mut Criterion) {
    c.bench_function("evict_closure", |b| {
        let session = quiet_session();
        let uow = session.begin().unwrap();

        b.iter_batched(
            || {
                uow.update(payload(64), &bench_facets(0)).unwrap();
            },
            |()| {
                let closure = uow.evict(black_box(&bench_by_id(0))).unwrap();
                black_box(closure);
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

/// Benchmark opening and committing a whole nested chain.
fn bench_nest_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("nest_chain");

    for depth in [4usize, 16, 64].iter() {
        group.throughput(Throughput::Elements(*depth as u64));
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            let session = quiet_session();

            b.iter(|| {
                let root = session.begin().unwrap();
                let (chain, leaf) = nest_chain(&root, depth);
                leaf.commit().unwrap();
                for uow in chain.into_iter().rev() {
                    uow.commit().unwrap();
                }
                root.commit().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark probes of the committed session cache.
fn bench_session_lookup(c: &mut Criterion) {
    c.bench_function("session_lookup", |b| {
        let session = quiet_session();
        let root = session.begin().unwrap();
        populate(&root, 1000);
        root.commit().unwrap();
        let mut rng = rand::thread_rng();

        b.iter(|| {
            let i = rng.gen_range(0..1000);
            let found = session.lookup(black_box(&bench_by_id(i))).unwrap();
            black_box(found);
        });
    });
}

criterion_group!(
    benches,
    bench_begin_commit,
    bench_begin_abort,
    bench_update_aliases,
    bench_lookup_depth,
    bench_evict_closure,
    bench_nest_chain,
    bench_session_lookup,
);

criterion_main!(benches);
