//! Domain types for breakout screening

pub mod bar;
pub mod breakout;
pub mod ids;
pub mod peak;

pub use bar::Bar;
pub use breakout::{Breakout, BreakoutFeatures, BreakoutRecord, CandleType};
pub use ids::{ConfigFingerprint, PeakId, PeakIdGen};
pub use peak::{Peak, PeakStatus};

/// Symbol type alias
pub type Symbol = String;
