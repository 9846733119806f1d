//! Durability and invalidation of the breadth cache across instances.

use breadthlab_core::breadth::{BreadthCache, BreadthEngine, CacheKey, CacheMiss};
use breadthlab_core::clock::{Clock, FixedClock};
use breadthlab_core::config::AppConfig;
use breadthlab_core::data::{FetchOptions, InMemoryProvider};
use breadthlab_core::domain::{BreadthMode, BreadthPoint, BreadthSeries, PricePoint};
use chrono::{NaiveDate, TimeZone, Utc};
use std::fs;
use std::sync::Arc;
use std::time::Duration;

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, day).unwrap()
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 4, 5, 22, 0, 0).unwrap(),
    ))
}

fn series(values: &[(u32, usize, usize)]) -> BreadthSeries {
    BreadthSeries::new(
        values
            .iter()
            .filter_map(|&(day, q, e)| BreadthPoint::new(d(4, day), q, e, Vec::new()))
            .collect(),
    )
}

#[test]
fn entry_survives_a_new_cache_instance() {
    let dir = tempfile::tempdir().unwrap();
    let key = CacheKey::new(BreadthMode::moving_average(63), 250, 180);
    let original = series(&[(1, 100, 240), (2, 130, 241), (3, 129, 241)]);

    {
        let writer = BreadthCache::new(dir.path(), clock());
        writer.put(&key, &original).unwrap();
    }

    let reader = BreadthCache::new(dir.path(), clock());
    assert_eq!(reader.get(&key, Duration::from_secs(3600)), Some(original));
}

#[test]
fn staleness_uses_configured_max_age() {
    let config = AppConfig::from_toml("[cache]\nmax_age_hours = 6\n").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let cache = BreadthCache::new(dir.path(), clock.clone());
    let key = CacheKey::new(BreadthMode::BullishAlignment, 50, 90);
    cache.put(&key, &series(&[(1, 1, 2)])).unwrap();

    clock.advance(chrono::Duration::hours(6));
    assert!(cache.get(&key, config.max_age()).is_some());

    clock.advance(chrono::Duration::milliseconds(1));
    assert!(cache.get(&key, config.max_age()).is_none());
    match cache.lookup(&key, config.max_age()) {
        Err(CacheMiss::Stale { age }) => assert!(age > chrono::Duration::hours(6)),
        other => panic!("expected stale miss, got {other:?}"),
    }
}

#[test]
fn keys_differing_in_any_field_are_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let cache = BreadthCache::new(dir.path(), clock());
    let base = CacheKey::new(BreadthMode::moving_average(21), 100, 365);
    cache.put(&base, &series(&[(1, 10, 20)])).unwrap();

    let day = Duration::from_secs(24 * 3600);
    for other in [
        CacheKey::new(BreadthMode::moving_average(63), 100, 365),
        CacheKey::new(BreadthMode::BullishAlignment, 100, 365),
        CacheKey::new(BreadthMode::moving_average(21), 99, 365),
        CacheKey::new(BreadthMode::moving_average(21), 100, 364),
    ] {
        assert_eq!(cache.lookup(&other, day).unwrap_err(), CacheMiss::Absent, "{other}");
    }
    assert!(cache.get(&base, day).is_some());
}

#[test]
fn missing_sidecar_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let cache = BreadthCache::new(dir.path(), clock());
    let key = CacheKey::new(BreadthMode::moving_average(21), 5, 30);
    cache.put(&key, &series(&[(1, 1, 5)])).unwrap();
    fs::remove_file(cache.metadata_path(&key)).unwrap();
    assert_eq!(
        cache.lookup(&key, Duration::from_secs(60)).unwrap_err(),
        CacheMiss::Absent
    );
}

#[test]
fn corrupt_entry_is_recomputed_and_repaired() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let cache = BreadthCache::new(dir.path(), clock.clone());

    let mut provider = InMemoryProvider::new();
    let closes: Vec<PricePoint> = breadthlab_core::breadth::calendar::business_days(d(1, 2), d(4, 5))
        .into_iter()
        .enumerate()
        .map(|(i, date)| PricePoint::new(date, 20.0 + i as f64))
        .collect();
    provider.insert("AAA", closes);

    let engine = BreadthEngine::new(&provider, clock.clone())
        .with_cache(&cache, Duration::from_secs(24 * 3600))
        .with_fetch_options(FetchOptions::immediate());
    let universe = vec!["AAA".to_string()];
    let key = CacheKey::new(BreadthMode::moving_average(21), 1, 14);

    let first = engine
        .compute_breadth(&universe, BreadthMode::moving_average(21), 14)
        .unwrap();
    assert!(!first.is_empty());

    fs::write(cache.data_path(&key), b"\xff\xfe garbage").unwrap();
    assert!(matches!(
        cache.lookup(&key, Duration::from_secs(3600)),
        Err(CacheMiss::Corrupt(_))
    ));

    let second = engine
        .compute_breadth(&universe, BreadthMode::moving_average(21), 14)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(provider.calls("AAA"), 2);
    assert!(cache.get(&key, Duration::from_secs(3600)).is_some());

    let meta = &cache.entries()[0];
    assert_eq!(meta.computed_at, clock.now());
    assert_eq!(meta.point_count, first.len());
}
