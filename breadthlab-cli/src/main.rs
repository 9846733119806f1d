//! BreadthLab CLI: breadth, index, universe and cache commands.
//!
//! Commands:
//! - `breadth`: compute (or load cached) market breadth plus the index overlay and report
//! - `index`: print the rebased benchmark index
//! - `universe`: list the symbol universe
//! - `cache status` / `cache clear`: inspect or empty the breadth cache

use anyhow::{bail, Context, Result};
use breadthlab_core::analysis::{MarketReport, SignalKind};
use breadthlab_core::breadth::{BreadthCache, BreadthEngine, IndexNormalizer};
use breadthlab_core::clock::{Clock, SystemClock};
use breadthlab_core::config::{AppConfig, DEFAULT_CONFIG_PATH};
use breadthlab_core::data::{
    CircuitBreaker, FetchOptions, LogProgress, Sp500Constituents, Universe, UniverseProvider,
    YahooProvider,
};
use breadthlab_core::domain::{BreadthMode, BreadthSeries, IndexSeries};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "breadthlab",
    about = "BreadthLab CLI: market breadth against a benchmark index"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute market breadth, the rebased index and a market report.
    Breadth {
        /// MA period (e.g. 21, 63, 127) or `bullish` for full alignment.
        #[arg(long, default_value = "21")]
        mode: BreadthMode,

        /// Number of constituents to sample (first N of the universe).
        #[arg(long, default_value_t = 100)]
        sample_size: usize,

        /// Calendar days of history to report.
        #[arg(long, default_value_t = 365)]
        lookback_days: u32,

        /// Configured index name (e.g. sp500). Defaults to ^GSPC.
        #[arg(long)]
        index: Option<String>,

        /// Universe TOML file. Defaults to the current S&P 500 constituents.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Also compute bullish alignment and include it in the report.
        #[arg(long, default_value_t = false)]
        with_alignment: bool,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the benchmark index rebased to its first close.
    Index {
        #[arg(long, default_value_t = 365)]
        lookback_days: u32,

        /// Configured index name (e.g. sp500). Defaults to ^GSPC.
        #[arg(long)]
        index: Option<String>,
    },
    /// List the symbol universe.
    Universe {
        /// Universe TOML file. Defaults to the current S&P 500 constituents.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Only show the first N symbols.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Breadth cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached breadth series and whether they are still fresh.
    Status,
    /// Delete every cached breadth series.
    Clear,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(&cli.config);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Commands::Breadth {
            mode,
            sample_size,
            lookback_days,
            index,
            universe,
            with_alignment,
            json,
        } => run_breadth(
            &config,
            clock,
            BreadthArgs {
                mode,
                sample_size,
                lookback_days,
                index,
                universe,
                with_alignment,
                json,
            },
        ),
        Commands::Index {
            lookback_days,
            index,
        } => run_index(&config, clock, lookback_days, index.as_deref()),
        Commands::Universe { universe, limit } => run_universe(universe.as_deref(), limit),
        Commands::Cache { action } => {
            let cache = BreadthCache::new(&config.cache.dir, clock);
            match action {
                CacheAction::Status => run_cache_status(&cache, &config),
                CacheAction::Clear => run_cache_clear(&cache),
            }
        }
    }
}

struct BreadthArgs {
    mode: BreadthMode,
    sample_size: usize,
    lookback_days: u32,
    index: Option<String>,
    universe: Option<PathBuf>,
    with_alignment: bool,
    json: bool,
}

fn yahoo() -> Result<YahooProvider> {
    YahooProvider::new(Arc::new(CircuitBreaker::default_provider()))
        .context("failed to build Yahoo Finance client")
}

/// Universe from a TOML file, else scraped S&P 500 members, else the
/// built-in list.
fn load_universe(path: Option<&Path>) -> Result<Vec<String>> {
    if let Some(path) = path {
        let universe = Universe::from_file(path)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("loading universe {}", path.display()))?;
        return Ok(universe.list_constituents());
    }
    let scraped = Sp500Constituents::new().list_constituents();
    if !scraped.is_empty() {
        return Ok(scraped);
    }
    warn!("S&P 500 constituents unavailable; using built-in universe");
    Ok(Universe::default_us().list_constituents())
}

fn run_breadth(config: &AppConfig, clock: Arc<dyn Clock>, args: BreadthArgs) -> Result<()> {
    if args.sample_size == 0 {
        bail!("--sample-size must be at least 1");
    }

    let mut symbols = load_universe(args.universe.as_deref())?;
    symbols.truncate(args.sample_size);
    info!(symbols = symbols.len(), "universe loaded");

    let provider = yahoo()?;
    let cache = BreadthCache::new(&config.cache.dir, clock.clone());
    let fetch = FetchOptions::from(&config.fetch);
    let engine = BreadthEngine::new(&provider, clock.clone())
        .with_cache(&cache, config.max_age())
        .with_fetch_options(fetch.clone());

    let breadth = engine
        .compute_breadth_with_progress(&symbols, args.mode, args.lookback_days, &LogProgress)
        .context("breadth computation failed")?;

    let alignment_pct = if args.mode == BreadthMode::BullishAlignment {
        breadth.latest().map(|p| p.breadth)
    } else if args.with_alignment {
        engine
            .compute_breadth_with_progress(
                &symbols,
                BreadthMode::BullishAlignment,
                args.lookback_days,
                &LogProgress,
            )
            .context("alignment computation failed")?
            .latest()
            .map(|p| p.breadth)
    } else {
        None
    };

    let index_symbol = config.index_symbol(args.index.as_deref());
    let index = IndexNormalizer::new(&provider, clock, index_symbol)
        .with_fetch_options(fetch)
        .get_rebased_index(args.lookback_days);
    let index = match (breadth.first_date(), breadth.last_date()) {
        (Some(start), Some(end)) => index.clipped(start, end),
        _ => index,
    };

    let report = MarketReport::analyze(&breadth, &index, alignment_pct);

    if args.json {
        let out = serde_json::json!({
            "mode": args.mode,
            "sample_size": symbols.len(),
            "lookback_days": args.lookback_days,
            "breadth": breadth,
            "index": index,
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_breadth_table(&breadth, &index);
    match &report {
        Some(report) => print_report(report, &index),
        None => println!("No breadth data in the requested window."),
    }
    Ok(())
}

fn run_index(
    config: &AppConfig,
    clock: Arc<dyn Clock>,
    lookback_days: u32,
    index: Option<&str>,
) -> Result<()> {
    let provider = yahoo()?;
    let symbol = config.index_symbol(index);
    let series = IndexNormalizer::new(&provider, clock, symbol)
        .with_fetch_options(FetchOptions::from(&config.fetch))
        .get_rebased_index(lookback_days);

    if series.is_empty() {
        println!("No data for {}.", series.symbol);
        return Ok(());
    }

    println!("{:<12} {:>12} {:>10}", "Date", "Close", "Change %");
    println!("{}", "-".repeat(36));
    for p in series.points() {
        println!("{:<12} {:>12.2} {:>10.2}", p.date, p.close, p.change_pct);
    }
    if let (Some(close), Some(change)) = (series.latest_close(), series.total_change_pct()) {
        println!();
        println!("{}: {close:.2} ({change:+.2}% over window)", series.symbol);
    }
    Ok(())
}

fn run_universe(path: Option<&Path>, limit: Option<usize>) -> Result<()> {
    let mut symbols = load_universe(path)?;
    let total = symbols.len();
    if let Some(limit) = limit {
        symbols.truncate(limit);
    }
    for symbol in &symbols {
        println!("{symbol}");
    }
    eprintln!("{} of {total} symbols", symbols.len());
    Ok(())
}

fn run_cache_status(cache: &BreadthCache, config: &AppConfig) -> Result<()> {
    let entries = cache.entries();
    if entries.is_empty() {
        println!("Cache is empty: {}", cache.dir().display());
        return Ok(());
    }

    let max_age = config.max_age();
    println!("Cache: {}", cache.dir().display());
    println!("Max age: {}h", config.cache.max_age_hours);
    println!();
    println!(
        "{:<12} {:>8} {:>9} {:>7} {:<26} {:<6}",
        "Mode", "Sample", "Lookback", "Points", "Computed", "Fresh"
    );
    println!("{}", "-".repeat(74));
    for meta in &entries {
        let fresh = cache.is_fresh(&meta.key(), max_age);
        println!(
            "{:<12} {:>8} {:>8}d {:>7} {:<26} {:<6}",
            meta.mode.tag(),
            meta.sample_size,
            meta.lookback_days,
            meta.point_count,
            meta.computed_at.format("%Y-%m-%d %H:%M:%S UTC"),
            if fresh { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn run_cache_clear(cache: &BreadthCache) -> Result<()> {
    let removed = cache.clear().context("failed to clear cache")?;
    println!("Removed {removed} file(s) from {}.", cache.dir().display());
    Ok(())
}

fn print_breadth_table(breadth: &BreadthSeries, index: &IndexSeries) {
    let index_by_date: HashMap<NaiveDate, f64> = index
        .points()
        .iter()
        .map(|p| (p.date, p.change_pct))
        .collect();

    println!();
    println!(
        "{:<12} {:>9} {:>7} {:>9}",
        "Date", "Breadth %", "Count", "Index %"
    );
    println!("{}", "-".repeat(40));
    for p in breadth.iter() {
        let idx = index_by_date
            .get(&p.date)
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<12} {:>9.2} {:>7} {:>9}",
            p.date,
            p.breadth,
            format!("{}/{}", p.qualifying_count, p.eligible_count),
            idx
        );
    }
}

fn print_report(report: &MarketReport, index: &IndexSeries) {
    println!();
    println!("=== Market Report ===");
    println!(
        "Breadth:        {:.2}% ({:?}, {:?})",
        report.latest_breadth, report.status.status, report.status.alert_level
    );
    println!("                {}", report.status.description);
    println!(
        "Trend:          {:?} / {:?} ({:+.2} pts/day)",
        report.trend.direction, report.trend.strength, report.trend.mean_change
    );
    println!("                {}", report.trend.description);
    println!(
        "Divergence:     {:?} (breadth {:+.2}%, index {:+.2}%)",
        report.divergence.kind, report.divergence.breadth_change, report.divergence.index_change
    );
    println!("                {}", report.divergence.description);
    println!(
        "Risk:           {:?} (volatility {:.2})",
        report.risk.level, report.risk.volatility
    );
    if let Some(alignment) = &report.bullish_alignment {
        println!(
            "Alignment:      {:.2}% ({:?})",
            alignment.percentage, alignment.status
        );
        println!("                {}", alignment.description);
    }
    if let (Some(close), Some(change)) = (index.latest_close(), index.total_change_pct()) {
        println!("Index:          {} {close:.2} ({change:+.2}%)", index.symbol);
    }
    for signal in &report.signals {
        let label = match signal.kind {
            SignalKind::Buy => "BUY",
            SignalKind::Sell => "SELL",
        };
        println!("SIGNAL {label}: {}", signal.description);
    }
    println!();
}
