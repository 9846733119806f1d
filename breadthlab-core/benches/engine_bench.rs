//! Criterion benchmarks for BreadthLab hot paths.
//!
//! Benchmarks:
//! 1. SMA precompute over a long close series
//! 2. Breadth fold (MA and alignment) across universe sizes
//! 3. Cache put/get round trip

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;

use breadthlab_core::breadth::calendar::business_days;
use breadthlab_core::breadth::{breadth_from_series, BreadthCache, CacheKey};
use breadthlab_core::clock::SystemClock;
use breadthlab_core::domain::{BreadthMode, PricePoint, PriceSeries};
use breadthlab_core::indicators::{Indicator, Sma};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_series(symbol: &str, n: usize, phase: f64) -> PriceSeries {
    let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    let days = business_days(start, start + chrono::Duration::days(n as i64 * 2));
    let points = days
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(i, date)| {
            let close = 100.0 + (i as f64 * 0.05 + phase).sin() * 10.0 + i as f64 * 0.02;
            PricePoint::new(date, close)
        })
        .collect();
    PriceSeries::new(symbol, points)
}

fn make_universe(symbols: usize, n: usize) -> Vec<PriceSeries> {
    (0..symbols)
        .map(|k| make_series(&format!("S{k}"), n, k as f64 * 0.37))
        .collect()
}

// ── 1. SMA ───────────────────────────────────────────────────────────

fn bench_sma(c: &mut Criterion) {
    let closes = make_series("X", 5000, 0.0).closes();
    let mut group = c.benchmark_group("sma");
    for period in [21, 63, 127] {
        let sma = Sma::new(period);
        group.bench_with_input(BenchmarkId::from_parameter(period), &closes, |b, closes| {
            b.iter(|| sma.compute(black_box(closes)))
        });
    }
    group.finish();
}

// ── 2. Breadth fold ──────────────────────────────────────────────────

fn bench_breadth(c: &mut Criterion) {
    let mut group = c.benchmark_group("breadth_from_series");
    group.sample_size(20);
    for symbols in [50, 200, 500] {
        let universe = make_universe(symbols, 1000);
        let last = universe[0].last().map(|p| p.date).unwrap();
        let grid = business_days(last - chrono::Duration::days(365), last);

        group.bench_with_input(BenchmarkId::new("ma21", symbols), &universe, |b, u| {
            b.iter(|| breadth_from_series(black_box(u), BreadthMode::moving_average(21), &grid))
        });
        group.bench_with_input(BenchmarkId::new("alignment", symbols), &universe, |b, u| {
            b.iter(|| breadth_from_series(black_box(u), BreadthMode::BullishAlignment, &grid))
        });
    }
    group.finish();
}

// ── 3. Cache ─────────────────────────────────────────────────────────

fn bench_cache(c: &mut Criterion) {
    let universe = make_universe(200, 1000);
    let last = universe[0].last().map(|p| p.date).unwrap();
    let grid = business_days(last - chrono::Duration::days(365 * 3), last);
    let series = breadth_from_series(&universe, BreadthMode::BullishAlignment, &grid);

    let dir = tempfile::tempdir().unwrap();
    let cache = BreadthCache::new(dir.path(), Arc::new(SystemClock));
    let key = CacheKey::new(BreadthMode::BullishAlignment, 200, 365 * 3);

    c.bench_function("cache_put", |b| {
        b.iter(|| cache.put(&key, black_box(&series)).unwrap())
    });
    c.bench_function("cache_get", |b| {
        b.iter(|| cache.get(&key, Duration::from_secs(3600)).unwrap())
    });
}

criterion_group!(benches, bench_sma, bench_breadth, bench_cache);
criterion_main!(benches);
