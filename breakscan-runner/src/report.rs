//! Reporting and export: JSON scan summary and JSONL breakout tape.
//!
//! The summary has one entry per symbol, failures included. The JSONL tape
//! holds one scored breakout per line, ready for streaming into other tools.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use breakscan_core::domain::{Breakout, BreakoutFeatures, CandleType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data_loader::DataSource;
use crate::scan::{ScanReport, SymbolOutcome};

/// Per-symbol line of the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSummary {
    pub symbol: String,
    pub source: Option<DataSource>,
    pub total_bars: usize,
    pub new_bars: usize,
    pub resumed: bool,
    pub breakouts: usize,
    pub active_peaks: usize,
    pub best_score: Option<f64>,
    pub last_breakout: Option<NaiveDate>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub symbols: usize,
    pub scanned: usize,
    pub failed: usize,
    pub synthetic: bool,
    /// Breakouts at or above `min_score`.
    pub breakouts: usize,
    pub min_score: Option<f64>,
    pub per_symbol: Vec<SymbolSummary>,
}

/// One exported breakout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutRow {
    pub symbol: String,
    pub index: usize,
    pub date: NaiveDate,
    pub price: f64,
    pub candle_type: CandleType,
    pub peaks_broken: usize,
    pub peak_prices: Vec<f64>,
    pub superseded: usize,
    pub quality_score: Option<f64>,
    /// Human-readable score derivation, e.g. `50 × 1.30 = 65.0`.
    pub formula: Option<String>,
    pub features: Option<BreakoutFeatures>,
}

impl From<&Breakout> for BreakoutRow {
    fn from(bo: &Breakout) -> Self {
        Self {
            symbol: bo.symbol.clone(),
            index: bo.index,
            date: bo.date,
            price: bo.price,
            candle_type: bo.candle_type,
            peaks_broken: bo.num_peaks_broken(),
            peak_prices: bo.broken_peaks.iter().map(|p| p.price).collect(),
            superseded: bo.superseded_peaks.len(),
            quality_score: bo.quality_score,
            formula: bo.score.as_ref().map(|s| s.formula()),
            features: bo.features.clone(),
        }
    }
}

fn passes(bo: &Breakout, min_score: Option<f64>) -> bool {
    match min_score {
        Some(min) => bo.quality_score.is_some_and(|s| s >= min),
        None => true,
    }
}

pub fn summarize(report: &ScanReport, min_score: Option<f64>) -> ScanSummary {
    let per_symbol: Vec<SymbolSummary> = report
        .outcomes
        .iter()
        .map(|outcome| match outcome {
            SymbolOutcome::Scanned(scan) => {
                let kept: Vec<&Breakout> = scan.breakouts.iter().filter(|b| passes(b, min_score)).collect();
                SymbolSummary {
                    symbol: scan.symbol.clone(),
                    source: Some(scan.source),
                    total_bars: scan.total_bars,
                    new_bars: scan.new_bars,
                    resumed: scan.resumed_from.is_some(),
                    breakouts: kept.len(),
                    active_peaks: scan.status.active_peaks,
                    best_score: kept.iter().filter_map(|b| b.quality_score).reduce(f64::max),
                    last_breakout: kept.last().map(|b| b.date),
                    error: None,
                }
            }
            SymbolOutcome::Failed { symbol, error } => SymbolSummary {
                symbol: symbol.clone(),
                source: None,
                total_bars: 0,
                new_bars: 0,
                resumed: false,
                breakouts: 0,
                active_peaks: 0,
                best_score: None,
                last_breakout: None,
                error: Some(error.clone()),
            },
        })
        .collect();

    ScanSummary {
        symbols: per_symbol.len(),
        scanned: per_symbol.iter().filter(|s| s.error.is_none()).count(),
        failed: per_symbol.iter().filter(|s| s.error.is_some()).count(),
        synthetic: per_symbol.iter().any(|s| s.source == Some(DataSource::Synthetic)),
        breakouts: per_symbol.iter().map(|s| s.breakouts).sum(),
        min_score,
        per_symbol,
    }
}

/// Rows for every breakout at or above `min_score`, highest score first.
pub fn ranked_rows(report: &ScanReport, min_score: Option<f64>) -> Vec<BreakoutRow> {
    let mut rows: Vec<BreakoutRow> = report
        .breakouts()
        .filter(|b| passes(b, min_score))
        .map(BreakoutRow::from)
        .collect();
    rows.sort_by(|a, b| {
        let sa = a.quality_score.unwrap_or(f64::NEG_INFINITY);
        let sb = b.quality_score.unwrap_or(f64::NEG_INFINITY);
        sb.total_cmp(&sa)
            .then_with(|| a.symbol.cmp(&b.symbol))
            .then_with(|| a.index.cmp(&b.index))
    });
    rows
}

pub fn export_summary_json(summary: &ScanSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize scan summary to JSON")
}

/// Write the summary as pretty JSON, creating parent directories.
pub fn write_summary(path: &Path, summary: &ScanSummary) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = export_summary_json(summary)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// Write rows as JSONL, one breakout per line. Returns the number written.
pub fn write_breakouts_jsonl(path: &Path, rows: &[BreakoutRow]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for row in rows {
        let line = serde_json::to_string(row).context("failed to serialize breakout row")?;
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(rows.len())
}

/// Read a JSONL tape back. Blank lines are skipped; malformed lines are errors.
pub fn read_breakouts_jsonl(path: &Path) -> Result<Vec<BreakoutRow>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line)
            .with_context(|| format!("{}: line {} is not a breakout row", path.display(), n + 1))?;
        rows.push(row);
    }
    Ok(rows)
}
