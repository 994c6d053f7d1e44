//! Breakscan Runner: scan orchestration on top of `breakscan-core`.
//!
//! This crate provides the host-side pieces the core leaves out:
//! - Bar loading from per-symbol CSV files, with a seeded synthetic fallback
//! - Parallel multi-symbol scans with per-symbol fault isolation
//! - Snapshot persistence for warm restarts
//! - JSON summary and JSONL breakout export
//! - TOML scan configuration (universe, persistence, screener parameters)

pub mod config;
pub mod data_loader;
pub mod report;
pub mod scan;

pub use config::{ScanConfig, ScanConfigError, ScanSettings, UniverseConfig};
pub use data_loader::{load_bars, DataSource, LoadError, LoadOptions, LoadedBars};
pub use report::{ranked_rows, summarize, BreakoutRow, ScanSummary, SymbolSummary};
pub use scan::{scan_symbol, scan_universe, ScanError, ScanOptions, ScanReport, SymbolOutcome, SymbolScan};
