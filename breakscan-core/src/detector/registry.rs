//! Peak Registry: the live set of active peaks for one instrument.
//!
//! Arena keyed by `PeakId`. Iteration order is id order, which is creation
//! order. Only the detector mutates it.

use std::collections::BTreeMap;

use crate::domain::{Peak, PeakId, PeakIdGen};

#[derive(Debug, Clone, Default)]
pub struct PeakRegistry {
    peaks: BTreeMap<PeakId, Peak>,
    ids: PeakIdGen,
}

impl PeakRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_id(&mut self) -> PeakId {
        self.ids.next_id()
    }

    pub fn next_id(&self) -> u64 {
        self.ids.peek()
    }

    pub fn insert(&mut self, peak: Peak) {
        self.peaks.insert(peak.id, peak);
    }

    pub fn remove(&mut self, id: PeakId) -> Option<Peak> {
        self.peaks.remove(&id)
    }

    pub fn get(&self, id: PeakId) -> Option<&Peak> {
        self.peaks.get(&id)
    }

    pub fn get_mut(&mut self, id: PeakId) -> Option<&mut Peak> {
        self.peaks.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peak> {
        self.peaks.values()
    }

    pub fn ids(&self) -> Vec<PeakId> {
        self.peaks.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// Ids of peaks at or below `price` whose gap to it exceeds `threshold`.
    pub fn displaced_by(&self, price: f64, threshold: f64) -> Vec<PeakId> {
        self.peaks
            .values()
            .filter(|p| p.price <= price && p.margin(price) > threshold)
            .map(|p| p.id)
            .collect()
    }

    pub(crate) fn from_parts(peaks: Vec<Peak>, next_id: u64) -> Self {
        Self {
            peaks: peaks.into_iter().map(|p| (p.id, p)).collect(),
            ids: PeakIdGen::starting_at(next_id),
        }
    }
}
