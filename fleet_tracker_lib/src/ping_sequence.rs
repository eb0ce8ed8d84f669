use serde::{Deserialize, Serialize};

use crate::ping::Ping;

/// Ordered pings for one route, newest first: index 0 is the most recent
/// sample, the last index the earliest. The convention is established here
/// at the ingestion boundary so consumers never have to re-infer it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PingSequence(Vec<Ping>);

impl PingSequence {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Accepts pings in any order and sorts them newest first.
    pub fn from_unordered(mut pings: Vec<Ping>) -> Self {
        pings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Self(pings)
    }

    /// Inserts a ping at its timestamp-ordered position. A fresh sample
    /// lands at index 0.
    pub fn record(&mut self, ping: Ping) {
        let at = self.0.partition_point(|p| p.timestamp > ping.timestamp);
        self.0.insert(at, ping);
    }

    pub fn newest(&self) -> Option<&Ping> {
        self.0.first()
    }

    pub fn earliest(&self) -> Option<&Ping> {
        self.0.last()
    }

    /// Everything between the newest and earliest ping, in sequence order.
    pub fn intermediate(&self) -> &[Ping] {
        if self.0.len() < 3 {
            &[]
        } else {
            &self.0[1..self.0.len() - 1]
        }
    }

    pub fn get(&self, index: usize) -> Option<&Ping> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Ping> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn ping_at(minutes_ago: i64) -> Ping {
        Ping::new(56.0, 10.0, Utc::now() - Duration::minutes(minutes_ago))
    }

    #[test]
    fn ingestion_establishes_newest_first_order() {
        let oldest = ping_at(30);
        let newest = ping_at(1);
        let middle = ping_at(10);

        let seq = PingSequence::from_unordered(vec![oldest.clone(), newest.clone(), middle.clone()]);

        assert_eq!(seq.newest(), Some(&newest));
        assert_eq!(seq.earliest(), Some(&oldest));
        assert_eq!(seq.intermediate(), &[middle]);
    }

    #[test]
    fn record_places_fresh_sample_at_front() {
        let mut seq = PingSequence::from_unordered(vec![ping_at(20), ping_at(10)]);
        let fresh = ping_at(0);
        seq.record(fresh.clone());

        assert_eq!(seq.len(), 3);
        assert_eq!(seq.newest(), Some(&fresh));
    }

    #[test]
    fn record_keeps_order_for_late_arrival() {
        let mut seq = PingSequence::from_unordered(vec![ping_at(20), ping_at(5)]);
        let late = ping_at(10);
        seq.record(late.clone());

        assert_eq!(seq.get(1), Some(&late));
    }

    #[test]
    fn short_sequences_have_no_intermediates() {
        assert!(PingSequence::new().intermediate().is_empty());
        let seq = PingSequence::from_unordered(vec![ping_at(2), ping_at(1)]);
        assert!(seq.intermediate().is_empty());
    }
}
