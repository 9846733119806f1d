//! Durable breadth cache.
//!
//! Layout, one pair of files per request shape:
//! `{dir}/market_breadth_{mode}_n{sample_size}_d{lookback_days}.csv`
//! `{dir}/market_breadth_{mode}_n{sample_size}_d{lookback_days}_metadata.json`
//!
//! - Both files are written to a unique temp file and renamed into place.
//! - The CSV is written first and the metadata last; the metadata carries a
//!   blake3 hash of the CSV bytes, so a torn pair never validates.
//! - Any absent, stale, unreadable or mismatched entry is a miss.

use crate::clock::Clock;
use crate::data::DataError;
use crate::domain::{BreadthMode, BreadthPoint, BreadthSeries};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const FILE_PREFIX: &str = "market_breadth_";
const METADATA_SUFFIX: &str = "_metadata.json";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identifies a reproducible breadth request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub mode: BreadthMode,
    pub sample_size: usize,
    pub lookback_days: u32,
}

impl CacheKey {
    pub fn new(mode: BreadthMode, sample_size: usize, lookback_days: u32) -> Self {
        Self {
            mode,
            sample_size,
            lookback_days,
        }
    }

    /// e.g. `market_breadth_ma21_n100_d365`
    pub fn file_stem(&self) -> String {
        format!(
            "{FILE_PREFIX}{}_n{}_d{}",
            self.mode.tag(),
            self.sample_size,
            self.lookback_days
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / n={} / {}d",
            self.mode, self.sample_size, self.lookback_days
        )
    }
}

/// Metadata sidecar for one cached series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub computed_at: DateTime<Utc>,
    pub mode: BreadthMode,
    pub sample_size: usize,
    pub lookback_days: u32,
    pub point_count: usize,
    pub data_hash: String,
}

impl CacheMetadata {
    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.mode, self.sample_size, self.lookback_days)
    }
}

/// Why a lookup did not produce a series. Callers that only need the
/// series use [`BreadthCache::get`], which folds all of these into `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheMiss {
    Absent,
    Stale { age: chrono::Duration },
    Corrupt(String),
    KeyMismatch,
}

impl fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "no entry"),
            Self::Stale { age } => write!(f, "stale ({}h old)", age.num_hours()),
            Self::Corrupt(reason) => write!(f, "corrupt: {reason}"),
            Self::KeyMismatch => write!(f, "metadata does not match key"),
        }
    }
}

/// One CSV row.
#[derive(Debug, Serialize, Deserialize)]
struct CacheRow {
    date: NaiveDate,
    breadth: f64,
    numerator_count: usize,
    denominator_count: usize,
    qualifying_symbols: String,
}

impl From<&BreadthPoint> for CacheRow {
    fn from(p: &BreadthPoint) -> Self {
        Self {
            date: p.date,
            breadth: p.breadth,
            numerator_count: p.qualifying_count,
            denominator_count: p.eligible_count,
            qualifying_symbols: p.qualifying_symbols.join(","),
        }
    }
}

impl CacheRow {
    fn into_point(self) -> Result<BreadthPoint, String> {
        if self.numerator_count > self.denominator_count || self.denominator_count == 0 {
            return Err(format!("bad counts on {}", self.date));
        }
        if !(0.0..=100.0).contains(&self.breadth) {
            return Err(format!("breadth out of range on {}", self.date));
        }
        let qualifying_symbols = if self.qualifying_symbols.is_empty() {
            Vec::new()
        } else {
            self.qualifying_symbols.split(',').map(str::to_string).collect()
        };
        Ok(BreadthPoint {
            date: self.date,
            breadth: self.breadth,
            qualifying_count: self.numerator_count,
            eligible_count: self.denominator_count,
            qualifying_symbols,
        })
    }
}

/// Flat-file breadth cache rooted at a directory.
pub struct BreadthCache {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl BreadthCache {
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            clock,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn data_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.csv", key.file_stem()))
    }

    pub fn metadata_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}{METADATA_SUFFIX}", key.file_stem()))
    }

    /// Fresh cached series for `key`, or `None`.
    pub fn get(&self, key: &CacheKey, max_age: Duration) -> Option<BreadthSeries> {
        match self.lookup(key, max_age) {
            Ok((series, _)) => Some(series),
            Err(miss) => {
                debug!(key = %key, reason = %miss, "breadth cache miss");
                None
            }
        }
    }

    /// Like [`get`](Self::get), but reports why an entry was rejected.
    pub fn lookup(
        &self,
        key: &CacheKey,
        max_age: Duration,
    ) -> Result<(BreadthSeries, CacheMetadata), CacheMiss> {
        let meta_path = self.metadata_path(key);
        let data_path = self.data_path(key);
        if !meta_path.exists() || !data_path.exists() {
            return Err(CacheMiss::Absent);
        }

        let meta = read_metadata(&meta_path).map_err(CacheMiss::Corrupt)?;
        if meta.key() != *key {
            return Err(CacheMiss::KeyMismatch);
        }

        let age = self.clock.now() - meta.computed_at;
        let limit = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        if age > limit {
            return Err(CacheMiss::Stale { age });
        }

        let bytes = fs::read(&data_path).map_err(|e| CacheMiss::Corrupt(format!("read: {e}")))?;
        if blake3::hash(&bytes).to_hex().as_str() != meta.data_hash {
            return Err(CacheMiss::Corrupt("data hash mismatch".into()));
        }

        let points = decode_rows(&bytes).map_err(CacheMiss::Corrupt)?;
        if points.len() != meta.point_count {
            return Err(CacheMiss::Corrupt(format!(
                "expected {} rows, found {}",
                meta.point_count,
                points.len()
            )));
        }

        Ok((BreadthSeries::new(points), meta))
    }

    /// Store `series` under `key`, replacing any previous entry.
    pub fn put(&self, key: &CacheKey, series: &BreadthSeries) -> Result<CacheMetadata, DataError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let bytes = encode_rows(series)?;
        let meta = CacheMetadata {
            computed_at: self.clock.now(),
            mode: key.mode,
            sample_size: key.sample_size,
            lookback_days: key.lookback_days,
            point_count: series.len(),
            data_hash: blake3::hash(&bytes).to_hex().to_string(),
        };
        let meta_json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;

        write_atomic(&self.data_path(key), &bytes)?;
        write_atomic(&self.metadata_path(key), &meta_json)?;

        info!(key = %key, points = series.len(), "cached breadth series");
        Ok(meta)
    }

    /// Metadata of every readable entry, ordered by file name.
    pub fn entries(&self) -> Vec<CacheMetadata> {
        let mut paths: Vec<PathBuf> = match fs::read_dir(&self.dir) {
            Ok(rd) => rd
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| is_cache_file(p) && file_name(p).ends_with(METADATA_SUFFIX))
                .collect(),
            Err(_) => return Vec::new(),
        };
        paths.sort();
        paths
            .iter()
            .filter_map(|p| match read_metadata(p) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    debug!(path = %p.display(), error = %e, "skipping unreadable cache metadata");
                    None
                }
            })
            .collect()
    }

    /// Whether the entry for `key` would be served under `max_age`.
    pub fn is_fresh(&self, key: &CacheKey, max_age: Duration) -> bool {
        self.lookup(key, max_age).is_ok()
    }

    /// Delete every cache file (including stray temp files). Returns the
    /// number of files removed.
    pub fn clear(&self) -> Result<usize, DataError> {
        let rd = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(DataError::CacheError(format!("read dir: {e}"))),
        };
        let mut removed = 0;
        for entry in rd {
            let path = entry
                .map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?
                .path();
            if is_cache_file(&path) {
                fs::remove_file(&path)
                    .map_err(|e| DataError::CacheError(format!("remove {}: {e}", path.display())))?;
                removed += 1;
            }
        }
        info!(dir = %self.dir.display(), removed, "cleared breadth cache");
        Ok(removed)
    }
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

fn is_cache_file(path: &Path) -> bool {
    path.is_file() && file_name(path).starts_with(FILE_PREFIX)
}

fn read_metadata(path: &Path) -> Result<CacheMetadata, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("read metadata: {e}"))?;
    serde_json::from_str(&content).map_err(|e| format!("parse metadata: {e}"))
}

fn encode_rows(series: &BreadthSeries) -> Result<Vec<u8>, DataError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for point in series.iter() {
        writer
            .serialize(CacheRow::from(point))
            .map_err(|e| DataError::CacheError(format!("csv encode: {e}")))?;
    }
    writer
        .into_inner()
        .map_err(|e| DataError::CacheError(format!("csv flush: {e}")))
}

fn decode_rows(bytes: &[u8]) -> Result<Vec<BreadthPoint>, String> {
    let mut reader = csv::Reader::from_reader(bytes);
    reader
        .deserialize::<CacheRow>()
        .map(|row| row.map_err(|e| format!("csv decode: {e}"))?.into_point())
        .collect()
}

/// Write to a process-unique temp file beside `path`, then rename over it.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DataError> {
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_file_name(format!(
        "{}.{}.{n}.tmp",
        file_name(path),
        std::process::id()
    ));
    fs::write(&tmp, bytes).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        DataError::CacheError(format!("write {}: {e}", tmp.display()))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        DataError::CacheError(format!("atomic rename failed: {e}"))
    })
}
