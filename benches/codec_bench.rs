//! Throughput benchmarks for the reference counter and the container codec.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use tethercount::container::{ContainerReader, write_lines};
use tethercount::counter::count_words;

fn make_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("the quick brown fox {i} jumps over the lazy dog number {i}"))
        .collect()
}

fn bench_count_words(c: &mut Criterion) {
    let mut group = c.benchmark_group("count_words");
    for size in [100usize, 1_000, 10_000] {
        let lines = make_lines(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &lines, |b, lines| {
            b.iter(|| black_box(count_words(black_box(lines))));
        });
    }
    group.finish();
}

fn bench_container_round_trip(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let lines = make_lines(1_000);

    c.bench_function("container_write_1k", |b| {
        let path = dir.path().join("write.tcf");
        b.iter(|| write_lines(black_box(&path), black_box(&lines)).expect("write"));
    });

    let read_path = dir.path().join("read.tcf");
    write_lines(&read_path, &lines).expect("write fixture");
    c.bench_function("container_read_1k", |b| {
        b.iter(|| {
            let reader = ContainerReader::open(black_box(&read_path)).expect("open");
            black_box(reader.count())
        });
    });
}

criterion_group!(benches, bench_count_words, bench_container_round_trip);
criterion_main!(benches);
