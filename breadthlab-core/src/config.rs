//! Application configuration loaded from TOML.
//!
//! Every section and field has a default, so a partial (or missing) file
//! still yields a usable config.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Index used for comparison when none is configured or named.
pub const DEFAULT_INDEX_SYMBOL: &str = "^GSPC";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Comparison indices keyed by short name (e.g. "sp500").
    pub indices: BTreeMap<String, IndexDefinition>,
    pub cache: CacheSettings,
    pub fetch: FetchSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub display_name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub dir: PathBuf,
    pub max_age_hours: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache"),
            max_age_hours: 24,
        }
    }
}

/// Batch download tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub batch_size: usize,
    pub max_workers: usize,
    pub batch_delay_ms: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            batch_size: 20,
            max_workers: 10,
            batch_delay_ms: 1000,
            max_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl AppConfig {
    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("parse config TOML: {e}"))
    }

    /// Load a config file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("read config file: {e}"))?;
        Self::from_toml(&content)
    }

    /// Load `path`, falling back to defaults (with a warning) if the file is
    /// missing or malformed.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                Self::default()
            }
        }
    }

    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indices.get(name)
    }

    /// Symbol for the named index, or [`DEFAULT_INDEX_SYMBOL`] when the name
    /// is absent or unknown.
    pub fn index_symbol(&self, name: Option<&str>) -> String {
        match name {
            Some(n) => match self.index(n) {
                Some(def) => def.symbol.clone(),
                None => {
                    warn!(index = n, "unknown index name, using {DEFAULT_INDEX_SYMBOL}");
                    DEFAULT_INDEX_SYMBOL.to_string()
                }
            },
            None => DEFAULT_INDEX_SYMBOL.to_string(),
        }
    }

    /// Maximum cache entry age.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.cache.max_age_hours.saturating_mul(3600))
    }
}
