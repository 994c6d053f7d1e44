//! Breakscan Core: incremental peak/breakout detection and quality scoring.
//!
//! This crate contains the screening engine for one instrument at a time:
//! - Domain types (bars, peaks, breakouts)
//! - Incremental detector owning the Peak Registry
//! - Feature enrichment (volume surge, gap, continuity, stability, momentum, ATR)
//! - Peak quality (weighted linear) and breakout quality (base × bonus) scoring
//! - Resistance clustering
//! - Versioned detector snapshots
//!
//! Everything here is synchronous and free of I/O beyond snapshot
//! (de)serialization through caller-supplied readers and writers.

pub mod config;
pub mod detector;
pub mod domain;
pub mod features;
pub mod indicators;
pub mod pipeline;
pub mod scoring;
pub mod snapshot;

pub use config::{ConfigError, ScreenerConfig};
pub use detector::{BreakoutDetector, DetectorError};
pub use pipeline::{scan_history, ScreenError, Screener};
pub use snapshot::{DetectorSnapshot, SnapshotError, SNAPSHOT_SCHEMA_VERSION};
