//! Versioned detector snapshot for warm restarts.
//!
//! A snapshot is a flat record of everything the detector needs to continue
//! exactly where it stopped: bar history, registry contents, id counter,
//! pending candidates and breakout history. The left-side confirmation stack
//! is derived from the bars and rebuilt on restore.
//!
//! Decoding checks `schema_version` on the untyped JSON before touching any
//! other field, so a snapshot from another schema fails loudly instead of
//! being partially read.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{Read, Write};
use thiserror::Error;

use crate::config::{ConfigError, DetectorConfig, PeakScoringConfig};
use crate::detector::PeakCandidate;
use crate::domain::{Bar, BreakoutRecord, ConfigFingerprint, Peak};

/// Bumped whenever the snapshot layout changes.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot schema version {found} is not supported (expected {expected})")]
    IncompatibleVersion { found: u64, expected: u32 },

    #[error("snapshot has no schema_version field")]
    MissingVersion,

    #[error("snapshot was taken with config {found}, current config is {expected}")]
    ConfigMismatch { expected: String, found: String },

    #[error("snapshot is inconsistent: {0}")]
    Inconsistent(String),

    #[error("snapshot config is invalid: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot I/O: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorSnapshot {
    pub schema_version: u32,
    pub symbol: String,
    pub config_fingerprint: ConfigFingerprint,
    pub config: DetectorConfig,
    pub peak_scoring: PeakScoringConfig,
    pub bars: Vec<Bar>,
    /// Active peaks in creation order.
    pub peaks: Vec<Peak>,
    pub next_peak_id: u64,
    pub pending: Vec<PeakCandidate>,
    pub history: Vec<BreakoutRecord>,
    pub halted: bool,
}

impl DetectorSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self, SnapshotError> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        Self::from_value(value)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), SnapshotError> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: R) -> Result<Self, SnapshotError> {
        let value: serde_json::Value = serde_json::from_reader(reader)?;
        Self::from_value(value)
    }

    fn from_value(value: serde_json::Value) -> Result<Self, SnapshotError> {
        let version = value
            .get("schema_version")
            .ok_or(SnapshotError::MissingVersion)?
            .as_u64()
            .ok_or(SnapshotError::MissingVersion)?;
        if version != u64::from(SNAPSHOT_SCHEMA_VERSION) {
            return Err(SnapshotError::IncompatibleVersion {
                found: version,
                expected: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Structural checks that serde cannot express.
    pub fn check_consistency(&self) -> Result<(), SnapshotError> {
        let inconsistent = |msg: String| Err(SnapshotError::Inconsistent(msg));

        for (pos, bar) in self.bars.iter().enumerate() {
            if bar.index != pos {
                return inconsistent(format!("bar at position {pos} has index {}", bar.index));
            }
        }
        if let Some(w) = self.bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return inconsistent(format!("bar dates not increasing at index {}", w[1].index));
        }

        let n = self.bars.len();
        let mut ids = HashSet::new();
        for peak in &self.peaks {
            if peak.id.0 >= self.next_peak_id {
                return inconsistent(format!(
                    "peak {} not below id counter {}",
                    peak.id, self.next_peak_id
                ));
            }
            if !ids.insert(peak.id) {
                return inconsistent(format!("duplicate peak {}", peak.id));
            }
            if peak.index >= n || !peak.status.is_active() {
                return inconsistent(format!("peak {} is not a live peak of this history", peak.id));
            }
        }
        if self.pending.iter().any(|c| c.index >= n) {
            return inconsistent("pending candidate beyond bar history".into());
        }
        if self.history.iter().any(|r| r.index >= n) {
            return inconsistent("breakout record beyond bar history".into());
        }
        Ok(())
    }
}
