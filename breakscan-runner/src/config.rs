//! Scan configuration: universe, persistence and screener parameters in one TOML file.
//!
//! ```toml
//! [universe]
//! symbols = ["AAPL", "MSFT"]
//! data_dir = "data"
//!
//! [scan]
//! snapshot_dir = "snapshots"
//! min_score = 60.0
//!
//! [screener.detector]
//! exceed_threshold = 0.005
//! ```

use std::path::{Path, PathBuf};

use breakscan_core::config::ScreenerConfig;
use breakscan_core::ConfigError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data_loader::LoadOptions;

#[derive(Debug, Error)]
pub enum ScanConfigError {
    #[error("failed to read scan config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse scan config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid screener config: {0}")]
    Screener(#[from] ConfigError),

    #[error("universe is empty: list symbols or enable synthetic data")]
    EmptyUniverse,

    #[error("threads must be at least 1")]
    ZeroThreads,
}

/// Which instruments to scan and where their bars live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub symbols: Vec<String>,
    pub data_dir: Option<PathBuf>,
    /// Bars per symbol when no CSV file exists; `None` disables synthetic data.
    pub synthetic_bars: Option<usize>,
    pub synthetic_start: Option<NaiveDate>,
}

impl UniverseConfig {
    pub fn load_options(&self) -> LoadOptions {
        let mut opts = LoadOptions {
            data_dir: self.data_dir.clone(),
            synthetic_bars: self.synthetic_bars,
            ..Default::default()
        };
        if let Some(start) = self.synthetic_start {
            opts.synthetic_start = start;
        }
        opts
    }
}

/// Persistence and output settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Directory of `<SYMBOL>.snapshot.json` files; enables warm restarts.
    pub snapshot_dir: Option<PathBuf>,
    /// Breakouts scoring below this are left out of exports.
    pub min_score: Option<f64>,
    /// Size of the scan thread pool; `None` uses rayon's global pool.
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub universe: UniverseConfig,
    pub scan: ScanSettings,
    pub screener: ScreenerConfig,
}

impl ScanConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ScanConfigError> {
        let config: Self = toml::from_str(content)?;
        config.screener.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ScanConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Checks that need the final, flag-merged configuration.
    pub fn validate(&self) -> Result<(), ScanConfigError> {
        self.screener.validate()?;
        if self.universe.symbols.is_empty() {
            return Err(ScanConfigError::EmptyUniverse);
        }
        if self.scan.threads == Some(0) {
            return Err(ScanConfigError::ZeroThreads);
        }
        Ok(())
    }
}
