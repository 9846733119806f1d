//! BreadthLab Core: market breadth over an equity universe.
//!
//! - Domain types (price series, breadth points and series, rebased index)
//! - Price data providers with timezone canonicalization and batch fetch
//! - Simple moving averages over close series
//! - The breadth engine, its business-day grid and its durable cache
//! - Benchmark index rebasing and a rule-based market report

pub mod analysis;
pub mod breadth;
pub mod clock;
pub mod config;
pub mod data;
pub mod domain;
pub mod indicators;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared with the fetch pool are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::PriceSeries>();
        require_sync::<domain::PriceSeries>();
        require_send::<domain::BreadthSeries>();
        require_sync::<domain::BreadthSeries>();
        require_send::<domain::IndexSeries>();
        require_sync::<domain::IndexSeries>();
        require_send::<domain::BreadthMode>();
        require_sync::<domain::BreadthMode>();

        // Data layer
        require_send::<data::DataError>();
        require_sync::<data::DataError>();
        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::InMemoryProvider>();
        require_sync::<data::InMemoryProvider>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();

        // Breadth
        require_send::<breadth::BreadthCache>();
        require_sync::<breadth::BreadthCache>();
        require_send::<breadth::BreadthError>();
        require_sync::<breadth::BreadthError>();
        require_send::<breadth::CacheKey>();
        require_sync::<breadth::CacheKey>();

        // Analysis and config
        require_send::<analysis::MarketReport>();
        require_sync::<analysis::MarketReport>();
        require_send::<config::AppConfig>();
        require_sync::<config::AppConfig>();
    }
}
