//! Bar loading for the runner.
//!
//! Given a symbol, loads its daily bars and tags where they came from:
//! 1. If `<data_dir>/<SYMBOL>.csv` exists → read it
//! 2. If not and synthetic bars are enabled → generate a seeded random walk
//! 3. Otherwise → fail with a clear error
//!
//! CSV rows are taken in file order and indexed from zero. Rows are never
//! sorted or de-duplicated here: an out-of-order file surfaces as a detector
//! fault for that symbol.

use std::path::{Path, PathBuf};

use breakscan_core::domain::Bar;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no data file for '{symbol}' at {} (use --synthetic for synthetic data)", path.display())]
    NoData { symbol: String, path: PathBuf },

    #[error("no data directory configured for '{symbol}' and synthetic data is disabled")]
    NoSource { symbol: String },

    #[error("{symbol}: failed to read {}: {source}", path.display())]
    Csv {
        symbol: String,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{symbol}: row {row}: invalid date '{value}'")]
    InvalidDate {
        symbol: String,
        row: usize,
        value: String,
    },

    #[error("{symbol}: row {row}: negative or non-finite volume {value}")]
    InvalidVolume { symbol: String, row: usize, value: f64 },
}

/// Where a symbol's bars came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Csv,
    Synthetic,
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Directory holding `<SYMBOL>.csv` files.
    pub data_dir: Option<PathBuf>,
    /// Generate this many synthetic bars when no CSV file exists.
    pub synthetic_bars: Option<usize>,
    /// First date of a synthetic series.
    pub synthetic_start: NaiveDate,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            data_dir: None,
            synthetic_bars: None,
            synthetic_start: NaiveDate::from_ymd_opt(2015, 1, 2).unwrap_or_default(),
        }
    }
}

/// Bars for one symbol plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedBars {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub source: DataSource,
    /// BLAKE3 over dates and OHLCV values.
    pub dataset_hash: String,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Path of a symbol's CSV file inside `data_dir`.
pub fn csv_path(data_dir: &Path, symbol: &str) -> PathBuf {
    data_dir.join(format!("{symbol}.csv"))
}

/// Load bars for one symbol, falling back to synthetic bars when enabled.
pub fn load_bars(symbol: &str, opts: &LoadOptions) -> Result<LoadedBars, LoadError> {
    if let Some(dir) = &opts.data_dir {
        let path = csv_path(dir, symbol);
        if path.exists() {
            let bars = read_csv_bars(symbol, &path)?;
            return Ok(LoadedBars {
                symbol: symbol.to_string(),
                dataset_hash: dataset_hash(&bars),
                bars,
                source: DataSource::Csv,
            });
        }
        if opts.synthetic_bars.is_none() {
            return Err(LoadError::NoData {
                symbol: symbol.to_string(),
                path,
            });
        }
    }

    match opts.synthetic_bars {
        Some(count) => {
            tracing::warn!("[{}] generating {} synthetic bars; results are tagged synthetic", symbol, count);
            let bars = generate_synthetic_bars(symbol, opts.synthetic_start, count);
            Ok(LoadedBars {
                symbol: symbol.to_string(),
                dataset_hash: dataset_hash(&bars),
                bars,
                source: DataSource::Synthetic,
            })
        }
        None => Err(LoadError::NoSource {
            symbol: symbol.to_string(),
        }),
    }
}

/// Read a `date,open,high,low,close,volume` file. Dates are `YYYY-MM-DD`,
/// optionally followed by a time of day which is ignored.
pub fn read_csv_bars(symbol: &str, path: &Path) -> Result<Vec<Bar>, LoadError> {
    let csv_err = |source| LoadError::Csv {
        symbol: symbol.to_string(),
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut bars = Vec::new();
    for (row, record) in reader.deserialize::<CsvRow>().enumerate() {
        let record = record.map_err(csv_err)?;
        let day = record.date.get(..10).unwrap_or(&record.date);
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| LoadError::InvalidDate {
            symbol: symbol.to_string(),
            row: row + 1,
            value: record.date.clone(),
        })?;
        if !record.volume.is_finite() || record.volume < 0.0 {
            return Err(LoadError::InvalidVolume {
                symbol: symbol.to_string(),
                row: row + 1,
                value: record.volume,
            });
        }
        bars.push(Bar::new(
            bars.len(),
            date,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume.round() as u64,
        ));
    }
    tracing::debug!("[{}] loaded {} bars from {}", symbol, bars.len(), path.display());
    Ok(bars)
}

/// Deterministic BLAKE3 hash over a bar series.
pub fn dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.date.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Generate `count` weekday bars of a random walk from 100.0.
///
/// Seeded from the symbol name, so the same symbol always gets the same bars.
pub fn generate_synthetic_bars(symbol: &str, start: NaiveDate, count: usize) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::with_capacity(count);
    let mut price = 100.0_f64;
    let mut current = start;

    while bars.len() < count {
        let weekday = current.weekday();
        if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price * (1.0 + rng.gen_range(-0.005..0.005));
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.015));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.015));
        let volume = rng.gen_range(500_000..5_000_000u64);

        bars.push(Bar::new(bars.len(), current, open, high, low, close, volume));

        price = close;
        current += chrono::Duration::days(1);
    }

    bars
}
