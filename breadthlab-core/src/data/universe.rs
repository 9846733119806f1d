//! Symbol universes.
//!
//! A universe is an ordered list of tickers. `Universe` is a sector-organized
//! TOML config; `Sp500Constituents` scrapes the current S&P 500 member table.
//! Either can feed the breadth engine through [`UniverseProvider`].

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Anything that can list the members of a stock universe.
pub trait UniverseProvider {
    /// Ordered constituents. Empty on failure.
    fn list_constituents(&self) -> Vec<String>;
}

/// The complete universe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Universe {
    pub sectors: BTreeMap<String, Vec<String>>,
}

impl Universe {
    /// Load a universe from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("read universe file: {e}"))?;
        Self::from_toml(&content)
    }

    /// Parse a universe from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("parse universe TOML: {e}"))
    }

    /// All tickers, sector by sector (sectors in name order).
    pub fn all_tickers(&self) -> Vec<&str> {
        self.sectors
            .values()
            .flat_map(|tickers| tickers.iter().map(|t| t.as_str()))
            .collect()
    }

    pub fn sector_tickers(&self, sector: &str) -> Option<&[String]> {
        self.sectors.get(sector).map(|v| v.as_slice())
    }

    pub fn ticker_count(&self) -> usize {
        self.sectors.values().map(|v| v.len()).sum()
    }

    /// A small built-in US large-cap universe.
    pub fn default_us() -> Self {
        let sector = |tickers: &[&str]| tickers.iter().map(|t| t.to_string()).collect();
        let mut sectors = BTreeMap::new();
        sectors.insert(
            "Technology".into(),
            sector(&["AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "AVGO", "CRM", "ADBE", "ORCL"]),
        );
        sectors.insert(
            "Healthcare".into(),
            sector(&["JNJ", "UNH", "PFE", "ABBV", "MRK", "LLY", "TMO", "ABT"]),
        );
        sectors.insert(
            "Finance".into(),
            sector(&["JPM", "BAC", "WFC", "GS", "MS", "BLK", "SCHW", "C", "AXP", "V"]),
        );
        sectors.insert(
            "Energy".into(),
            sector(&["XOM", "CVX", "COP", "SLB", "EOG", "MPC", "PSX", "VLO"]),
        );
        sectors.insert(
            "Consumer".into(),
            sector(&["WMT", "PG", "KO", "PEP", "COST", "HD", "MCD", "NKE", "SBUX", "TGT"]),
        );
        Self { sectors }
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("serialize universe: {e}"))
    }
}

impl UniverseProvider for Universe {
    fn list_constituents(&self) -> Vec<String> {
        self.all_tickers().into_iter().map(String::from).collect()
    }
}

pub const SP500_CONSTITUENTS_URL: &str =
    "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";

/// Current S&P 500 members, scraped from the Wikipedia constituents table.
pub struct Sp500Constituents {
    url: String,
}

impl Sp500Constituents {
    pub fn new() -> Self {
        Self {
            url: SP500_CONSTITUENTS_URL.to_string(),
        }
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn download(&self) -> Result<String, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| format!("build HTTP client: {e}"))?;
        let resp = client
            .get(&self.url)
            .send()
            .map_err(|e| format!("request {}: {e}", self.url))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {} from {}", resp.status(), self.url));
        }
        resp.text().map_err(|e| format!("read body: {e}"))
    }
}

impl Default for Sp500Constituents {
    fn default() -> Self {
        Self::new()
    }
}

impl UniverseProvider for Sp500Constituents {
    fn list_constituents(&self) -> Vec<String> {
        match self.download() {
            Ok(html) => {
                let symbols = parse_constituents_table(&html);
                if symbols.is_empty() {
                    warn!(url = %self.url, "constituents table not found or empty");
                } else {
                    info!(count = symbols.len(), "loaded S&P 500 constituents");
                }
                symbols
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch S&P 500 constituents");
                Vec::new()
            }
        }
    }
}

/// Extract the `Symbol` column of the first table in the page, rewriting
/// class-share dots to Yahoo's dash form (`BRK.B` -> `BRK-B`).
pub fn parse_constituents_table(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let (Ok(table_sel), Ok(row_sel), Ok(header_sel), Ok(cell_sel)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("th"),
        Selector::parse("td"),
    ) else {
        return Vec::new();
    };

    let Some(table) = document.select(&table_sel).next() else {
        return Vec::new();
    };

    let mut rows = table.select(&row_sel);
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let column = header
        .select(&header_sel)
        .position(|th| th.text().collect::<String>().trim().eq_ignore_ascii_case("symbol"))
        .unwrap_or(0);

    rows.filter_map(|row| {
        let cell = row.select(&cell_sel).nth(column)?;
        let symbol = cell.text().collect::<String>().trim().replace('.', "-");
        (!symbol.is_empty()).then_some(symbol)
    })
    .collect()
}
