//! Benchmarks for query execution and noise sampling
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dp_engine::{
    Dataset, EngineConfig, LocalMeanQuery, Mechanism, NoiseSampler, Query, QueryEngine, Record,
    SeededSource,
};

fn dataset(rows: usize) -> Dataset {
    Dataset::new(
        (0..rows)
            .map(|i| Record::new(format!("row-{}", i), vec![(i % 7) as f64 / 7.0, i as f64]))
            .collect(),
    )
    .unwrap()
}

fn bench_laplace_sampling(c: &mut Criterion) {
    let mut sampler = NoiseSampler::new(SeededSource::from_u64(1));
    let mech = Mechanism::laplace(1.0, 0.3);

    c.bench_function("laplace_sample", |b| {
        b.iter(|| sampler.sample(black_box(&mech)).unwrap())
    });
}

fn bench_central_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("central_sum");

    for rows in [100usize, 10_000, 100_000] {
        let ds = dataset(rows);
        let query = Query::sum(0, 1e-6).unwrap();
        group.bench_with_input(BenchmarkId::new("rows", rows), &ds, |b, ds| {
            // Budget large enough that the ledger never rejects during a run
            let engine =
                QueryEngine::with_source(&EngineConfig::new(1e9), SeededSource::from_u64(2)).unwrap();
            b.iter(|| engine.run(black_box(&query), ds).unwrap())
        });
    }

    group.finish();
}

fn bench_local_mean(c: &mut Criterion) {
    let ds = dataset(10_000);
    let engine = QueryEngine::with_source(&EngineConfig::new(1.0), SeededSource::from_u64(3)).unwrap();
    let query = LocalMeanQuery::unit(0, 0.5).unwrap();

    c.bench_function("local_mean_10k", |b| {
        b.iter(|| engine.local_randomized_mean(black_box(&query), &ds).unwrap())
    });
}

criterion_group!(benches, bench_laplace_sampling, bench_central_query, bench_local_mean);
criterion_main!(benches);
