//! Market breadth: the date grid, the engine, its durable cache and the
//! benchmark index overlay.

pub mod cache;
pub mod calendar;
pub mod engine;
pub mod index;

pub use cache::{BreadthCache, CacheKey, CacheMetadata, CacheMiss};
pub use engine::{breadth_from_series, BreadthEngine, BreadthError, DEFAULT_MAX_AGE};
pub use index::IndexNormalizer;
