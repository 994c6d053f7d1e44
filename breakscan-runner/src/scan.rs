//! Multi-symbol scan orchestration.
//!
//! Each symbol gets its own `Screener`; symbols run in parallel on rayon and
//! share nothing. A fault in one symbol (bad file, out-of-order bars, stale
//! snapshot) is captured as a `Failed` outcome and never stops the batch.
//!
//! With a snapshot directory, a symbol resumes from `<SYMBOL>.snapshot.json`
//! and only bars dated after the snapshot's last bar are fed. The snapshot is
//! rewritten after every successful scan.

use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use breakscan_core::config::ScreenerConfig;
use breakscan_core::detector::DetectorStatus;
use breakscan_core::domain::{Bar, Breakout};
use breakscan_core::{DetectorSnapshot, ScreenError, Screener, SnapshotError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data_loader::{load_bars, DataSource, LoadError, LoadOptions};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Screen(#[from] ScreenError),

    #[error("{symbol}: snapshot {}: {source}", path.display())]
    Snapshot {
        symbol: String,
        path: PathBuf,
        #[source]
        source: SnapshotError,
    },

    #[error("{symbol}: snapshot file {}: {source}", path.display())]
    SnapshotIo {
        symbol: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build scan thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Options shared by every symbol of a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub load: LoadOptions,
    pub snapshot_dir: Option<PathBuf>,
    pub threads: Option<usize>,
}

/// Result of scanning one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolScan {
    pub symbol: String,
    pub source: DataSource,
    pub dataset_hash: String,
    /// Bars in the detector after the scan.
    pub total_bars: usize,
    /// Bars fed during this scan.
    pub new_bars: usize,
    /// Bars already held by the snapshot this scan resumed from.
    pub resumed_from: Option<usize>,
    pub breakouts: Vec<Breakout>,
    pub status: DetectorStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SymbolOutcome {
    Scanned(SymbolScan),
    Failed { symbol: String, error: String },
}

impl SymbolOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            SymbolOutcome::Scanned(scan) => &scan.symbol,
            SymbolOutcome::Failed { symbol, .. } => symbol,
        }
    }
}

/// Outcomes in universe order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub outcomes: Vec<SymbolOutcome>,
}

impl ScanReport {
    pub fn scanned(&self) -> impl Iterator<Item = &SymbolScan> {
        self.outcomes.iter().filter_map(|o| match o {
            SymbolOutcome::Scanned(scan) => Some(scan),
            SymbolOutcome::Failed { .. } => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            SymbolOutcome::Failed { symbol, error } => Some((symbol.as_str(), error.as_str())),
            SymbolOutcome::Scanned(_) => None,
        })
    }

    /// Every breakout of every scanned symbol.
    pub fn breakouts(&self) -> impl Iterator<Item = &Breakout> {
        self.scanned().flat_map(|scan| scan.breakouts.iter())
    }
}

pub fn snapshot_path(dir: &Path, symbol: &str) -> PathBuf {
    dir.join(format!("{symbol}.snapshot.json"))
}

/// Scan every symbol in parallel. Only a thread-pool failure aborts the scan.
pub fn scan_universe(
    symbols: &[String],
    config: &ScreenerConfig,
    opts: &ScanOptions,
) -> Result<ScanReport, ScanError> {
    let run = || {
        symbols
            .par_iter()
            .map(|symbol| match scan_symbol(symbol, config, opts) {
                Ok(scan) => SymbolOutcome::Scanned(scan),
                Err(e) => {
                    warn!("[{}] scan failed: {}", symbol, e);
                    SymbolOutcome::Failed {
                        symbol: symbol.clone(),
                        error: e.to_string(),
                    }
                }
            })
            .collect::<Vec<_>>()
    };

    let outcomes = match opts.threads {
        Some(n) if n > 0 => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()?
            .install(run),
        _ => run(),
    };

    let report = ScanReport { outcomes };
    info!(
        "Scanned {} symbol(s): {} ok, {} failed, {} breakout(s)",
        symbols.len(),
        report.scanned().count(),
        report.failures().count(),
        report.breakouts().count()
    );
    Ok(report)
}

/// Load, resume if a snapshot exists, scan the new bars, persist.
pub fn scan_symbol(
    symbol: &str,
    config: &ScreenerConfig,
    opts: &ScanOptions,
) -> Result<SymbolScan, ScanError> {
    let loaded = load_bars(symbol, &opts.load)?;
    let path = opts.snapshot_dir.as_deref().map(|dir| snapshot_path(dir, symbol));

    let (mut screener, resumed_from) = match path.as_deref().filter(|p| p.exists()) {
        Some(p) => {
            let snapshot = read_snapshot(symbol, p)?;
            let held = snapshot.bars.len();
            (Screener::from_snapshot(snapshot, config.clone())?, Some(held))
        }
        None => (Screener::new(symbol, config.clone()).map_err(ScreenError::from)?, None),
    };

    let fresh = fresh_bars(loaded.bars, &screener);
    let new_bars = fresh.len();
    let breakouts = screener.scan(fresh).map_err(ScreenError::from)?;
    debug!(
        "[{}] fed {} new bar(s), {} breakout(s)",
        symbol,
        new_bars,
        breakouts.len()
    );

    if let Some(p) = &path {
        write_snapshot(symbol, p, &screener.snapshot())?;
    }

    let status = screener.detector().status();
    Ok(SymbolScan {
        symbol: symbol.to_string(),
        source: loaded.source,
        dataset_hash: loaded.dataset_hash,
        total_bars: status.total_bars,
        new_bars,
        resumed_from,
        breakouts,
        status,
    })
}

/// Bars dated after the screener's last bar, re-indexed to follow it.
fn fresh_bars(bars: Vec<Bar>, screener: &Screener) -> Vec<Bar> {
    let start = screener.detector().next_index();
    let last = screener.detector().last_date();
    bars.into_iter()
        .filter(|b| last.map_or(true, |d| b.date > d))
        .enumerate()
        .map(|(k, mut bar)| {
            bar.index = start + k;
            bar
        })
        .collect()
}

pub fn read_snapshot(symbol: &str, path: &Path) -> Result<DetectorSnapshot, ScanError> {
    let file = fs::File::open(path).map_err(|source| ScanError::SnapshotIo {
        symbol: symbol.to_string(),
        path: path.to_path_buf(),
        source,
    })?;
    DetectorSnapshot::read_from(BufReader::new(file)).map_err(|source| ScanError::Snapshot {
        symbol: symbol.to_string(),
        path: path.to_path_buf(),
        source,
    })
}

/// Write through a temporary file so a crash never leaves a torn snapshot.
pub fn write_snapshot(symbol: &str, path: &Path, snapshot: &DetectorSnapshot) -> Result<(), ScanError> {
    let io_err = |source| ScanError::SnapshotIo {
        symbol: symbol.to_string(),
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    let file = fs::File::create(&tmp).map_err(io_err)?;
    snapshot
        .write_to(BufWriter::new(file))
        .map_err(|source| ScanError::Snapshot {
            symbol: symbol.to_string(),
            path: tmp.clone(),
            source,
        })?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
