use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use parbench::{Ckms, Config, ConcurrentSampler, ParallelBench, Targets};

fn record_next(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_next");
    for &batch in &[1usize, 64, 256, 1_024] {
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            let targets = Targets::new(vec![(0.5, 0.001), (0.99, 0.0001)]).unwrap();
            let sampler: ConcurrentSampler<Ckms<Duration>> = ConcurrentSampler::new(targets).batch_size(batch);
            let mut worker = sampler.begin(|| true).unwrap();
            b.iter(|| black_box(worker.next()));
            worker.finish();
        });
    }
    group.finish();
}

fn parallel_run(c: &mut Criterion) {
    let mut bench = ParallelBench::new("noop", Config::default().parallelism(num_cpus::get()));
    bench.report_percentile(0.5).report_percentile(0.99);
    c.bench_function("parallel_run_100000", |b| {
        b.iter(|| bench.run(100_000, || ()).unwrap());
    });
}

criterion_group!(benches, record_next, parallel_run);
criterion_main!(benches);
