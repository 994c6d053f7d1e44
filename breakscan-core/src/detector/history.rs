//! Bounded breakout history, kept only for momentum counting.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::domain::BreakoutRecord;

/// Ring of recent breakouts, pruned to the momentum window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakoutHistory {
    window: usize,
    records: VecDeque<BreakoutRecord>,
}

impl BreakoutHistory {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            records: VecDeque::new(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Append a record and drop entries older than the window.
    pub fn record(&mut self, record: BreakoutRecord) {
        let newest = record.index;
        self.records.push_back(record);
        while let Some(front) = self.records.front() {
            if newest - front.index > self.window {
                self.records.pop_front();
            } else {
                break;
            }
        }
    }

    /// Breakouts with `0 <= current - index <= window`, never less than 1.
    pub fn recent_count(&self, current: usize) -> usize {
        self.records
            .iter()
            .filter(|r| r.index <= current && current - r.index <= self.window)
            .count()
            .max(1)
    }

    pub fn records(&self) -> impl Iterator<Item = &BreakoutRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn from_records(window: usize, records: Vec<BreakoutRecord>) -> Self {
        Self {
            window,
            records: records.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(index: usize) -> BreakoutRecord {
        BreakoutRecord {
            index,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(index as i64),
            price: 100.0,
            num_peaks: 1,
        }
    }

    #[test]
    fn counts_within_window_inclusive() {
        let mut h = BreakoutHistory::new(20);
        h.record(rec(10));
        h.record(rec(25));
        h.record(rec(30));
        assert_eq!(h.recent_count(30), 3);
        assert_eq!(h.recent_count(31), 2);
    }

    #[test]
    fn prunes_old_entries() {
        let mut h = BreakoutHistory::new(5);
        h.record(rec(0));
        h.record(rec(5));
        assert_eq!(h.len(), 2);
        h.record(rec(11));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn count_is_at_least_one() {
        let h = BreakoutHistory::new(20);
        assert_eq!(h.recent_count(100), 1);
    }
}
