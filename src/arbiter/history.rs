//! Decision provenance: records and the bounded ring buffer holding them

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::arbiter::strategy::StrategicOrder;
use crate::core::types::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Local,
    Remote,
}

/// Logged outcome of one arbiter decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    pub tick: Tick,
    pub order: StrategicOrder,
    pub reason: String,
    /// In `[0, 1]`
    pub confidence: f64,
    pub source: DecisionSource,
    /// The advisor was consulted but failed; `order` is the local greedy pick
    pub fallback: bool,
}

/// Fixed-capacity history; the oldest record is evicted first
#[derive(Debug, Clone)]
pub struct DecisionHistory {
    records: VecDeque<DecisionRecord>,
    capacity: usize,
}

impl DecisionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: DecisionRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&DecisionRecord> {
        self.records.back()
    }

    /// Oldest first
    pub fn records(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.records.iter()
    }

    /// The `max_n` most recent non-fallback records with confidence at or
    /// above `threshold`, in tick order
    pub fn highlights(&self, max_n: usize, threshold: f64) -> Vec<DecisionRecord> {
        let mut picked: Vec<DecisionRecord> = self
            .records
            .iter()
            .rev()
            .filter(|r| !r.fallback && r.confidence >= threshold)
            .take(max_n)
            .cloned()
            .collect();
        picked.reverse();
        picked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tick: Tick, confidence: f64, fallback: bool) -> DecisionRecord {
        DecisionRecord {
            tick,
            order: StrategicOrder::Build,
            reason: "test".into(),
            confidence,
            source: DecisionSource::Local,
            fallback,
        }
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let mut history = DecisionHistory::new(20);
        for tick in 0..25 {
            history.push(record(tick, 0.9, false));
        }
        assert_eq!(history.len(), 20);
        assert_eq!(history.records().next().map(|r| r.tick), Some(5));
        assert_eq!(history.latest().map(|r| r.tick), Some(24));
    }

    #[test]
    fn test_highlights_filter_and_order() {
        let mut history = DecisionHistory::new(20);
        history.push(record(10, 0.9, false));
        history.push(record(20, 0.3, false));
        history.push(record(30, 0.95, true));
        history.push(record(40, 0.7, false));
        history.push(record(50, 0.8, false));

        let ticks: Vec<Tick> = history.highlights(5, 0.6).iter().map(|r| r.tick).collect();
        assert_eq!(ticks, vec![10, 40, 50]);

        let ticks: Vec<Tick> = history.highlights(2, 0.6).iter().map(|r| r.tick).collect();
        assert_eq!(ticks, vec![40, 50]);

        assert!(history.highlights(0, 0.0).is_empty());
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(record(3, 0.5, true)).unwrap();
        assert_eq!(json["order"], "build");
        assert_eq!(json["source"], "local");
        assert_eq!(json["fallback"], true);
    }
}
