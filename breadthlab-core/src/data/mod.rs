//! Price data: providers, boundary normalization, batch fetching, universes.

pub mod canonicalize;
pub mod circuit_breaker;
pub mod fetch;
pub mod memory;
pub mod provider;
pub mod universe;
pub mod yahoo;

pub use canonicalize::{canonicalize, exchange_date};
pub use circuit_breaker::CircuitBreaker;
pub use fetch::{fetch_universe, FetchOptions, UniverseFetch};
pub use memory::InMemoryProvider;
pub use provider::{
    DataError, DataProvider, DataSource, FetchProgress, FetchResult, LogProgress, NoProgress,
    RawBar,
};
pub use universe::{Sp500Constituents, Universe, UniverseProvider};
pub use yahoo::YahooProvider;
