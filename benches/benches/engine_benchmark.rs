//! Aggregation engine and pipeline benchmarks.
//!
//! Run with: `cargo bench --package candlestream-bench`

use candlestream_bench::TradeMix;
use candlestream_lib::{
    BarAggregator, DeliveryHub, IngestConfig, Ingestor, Interval, OverflowPolicy, completion,
    decode_frame,
};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tokio_util::sync::CancellationToken;

fn engine_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");

    for instruments in [1, 16, 256] {
        let trades = TradeMix {
            instruments,
            ..Default::default()
        }
        .generate();
        group.throughput(Throughput::Elements(trades.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("process", instruments),
            &trades,
            |b, trades| {
                b.iter(|| {
                    let mut engine = BarAggregator::new(Interval::Minute1);
                    let mut completed = 0usize;
                    for trade in trades {
                        if let Ok(ingested) = engine.process(trade) {
                            completed += usize::from(ingested.completed.is_some());
                        }
                    }
                    completed += engine.drain().len();
                    black_box(completed)
                });
            },
        );
    }

    group.finish();
}

fn decode_benchmark(c: &mut Criterion) {
    let capture = TradeMix::default().to_ndjson();
    let lines: Vec<&str> = capture.lines().collect();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(lines.len() as u64));
    group.bench_function("aggtrade_frame", |b| {
        b.iter(|| {
            let decoded = lines
                .iter()
                .filter(|line| matches!(decode_frame(line), Ok(Some(_))))
                .count();
            black_box(decoded)
        });
    });
    group.finish();
}

fn pipeline_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let trades = TradeMix::default().generate();

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(20);
    group.throughput(Throughput::Elements(trades.len() as u64));

    for subscribers in [1usize, 8] {
        group.bench_with_input(
            BenchmarkId::new("ingest_fanout", subscribers),
            &trades,
            |b, trades| {
                b.to_async(&rt).iter(|| async move {
                    let (sender, receiver) = completion::channel(1024, OverflowPolicy::Block);
                    let hub = DeliveryHub::with_defaults();
                    let readers: Vec<_> = (0..subscribers)
                        .map(|_| {
                            let mut subscription = hub.subscribe();
                            tokio::spawn(async move {
                                let mut n = 0u64;
                                while subscription.recv().await.is_some() {
                                    n += 1;
                                }
                                n
                            })
                        })
                        .collect();
                    let hub_task = {
                        let hub = hub.clone();
                        tokio::spawn(async move { hub.run(receiver).await })
                    };

                    let ingestor = Ingestor::new(
                        BarAggregator::new(Interval::Second1),
                        sender,
                        IngestConfig::default(),
                    );
                    let stream = futures::stream::iter(trades.iter().cloned());
                    let report = ingestor
                        .run(stream, CancellationToken::new())
                        .await
                        .unwrap();

                    hub_task.await.unwrap();
                    for reader in readers {
                        black_box(reader.await.unwrap());
                    }
                    black_box(report)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    engine_benchmark,
    decode_benchmark,
    pipeline_benchmark
);
criterion_main!(benches);
