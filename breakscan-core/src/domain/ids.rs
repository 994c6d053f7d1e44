use serde::{Deserialize, Serialize};
use std::fmt;

/// Peak identifier. Allocated from a per-detector counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeakId(pub u64);

impl fmt::Display for PeakId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Monotonic peak id allocator.
///
/// The counter survives snapshot/restore, so ids stay unique over the whole
/// life of an instrument's stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakIdGen {
    next: u64,
}

impl PeakIdGen {
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    pub fn next_id(&mut self) -> PeakId {
        let id = PeakId(self.next);
        self.next += 1;
        id
    }

    /// The id the next call to `next_id` will hand out.
    pub fn peek(&self) -> u64 {
        self.next
    }
}

/// Deterministic configuration fingerprint (BLAKE3 of canonical JSON).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigFingerprint(pub String);

impl ConfigFingerprint {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }
}

impl fmt::Display for ConfigFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut gen = PeakIdGen::default();
        assert_eq!(gen.next_id(), PeakId(0));
        assert_eq!(gen.next_id(), PeakId(1));
        assert_eq!(gen.peek(), 2);
    }

    #[test]
    fn resumed_generator_continues() {
        let mut gen = PeakIdGen::starting_at(7);
        assert_eq!(gen.next_id(), PeakId(7));
    }

    #[test]
    fn fingerprint_deterministic() {
        let a = ConfigFingerprint::from_bytes(b"{\"total_window\":10}");
        let b = ConfigFingerprint::from_bytes(b"{\"total_window\":10}");
        let c = ConfigFingerprint::from_bytes(b"{\"total_window\":11}");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
