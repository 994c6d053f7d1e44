//! Quality scoring for peaks and breakouts.
//!
//! Both models are pure functions over value objects: scoring never touches
//! detector state.

pub mod breakout;
pub mod cluster;
pub mod peak;

pub use breakout::{BonusDetail, BonusKind, BreakoutScorer, ScoreBreakdown};
pub use cluster::{group_into_clusters, largest_cluster};
pub use peak::{linear_score, log_score, PeakScoreBreakdown, PeakScoreComponent, PeakScorer};
