//! Per-line sequence tracking

use std::collections::HashMap;
use uuid::Uuid;

use crate::constants::REORDER_TOLERANCE;

/// What to do with an incoming sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceDecision {
    /// In order; `previous` is the last accepted number, if any
    Accept { previous: Option<u64> },
    /// Duplicate or slightly late
    DropReordered,
    /// Far behind the last accepted number: the stream restarted
    ResetAndAccept,
}

/// Last accepted sequence number per line
///
/// Keyed by line since a source may move between lines across updates.
#[derive(Debug, Default, Clone)]
pub struct SequenceTracker {
    last: HashMap<Uuid, u64>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self, line: Uuid) -> Option<u64> {
        self.last.get(&line).copied()
    }

    /// Classify without changing state
    pub fn classify(&self, line: Uuid, sequence: u64) -> SequenceDecision {
        match self.last(line) {
            None => SequenceDecision::Accept { previous: None },
            Some(last) if sequence > last => SequenceDecision::Accept {
                previous: Some(last),
            },
            Some(last) if last - sequence < REORDER_TOLERANCE => SequenceDecision::DropReordered,
            Some(_) => SequenceDecision::ResetAndAccept,
        }
    }

    /// Store the number of a fully processed packet
    pub fn record(&mut self, line: Uuid, sequence: u64) {
        self.last.insert(line, sequence);
    }

    pub fn forget(&mut self, line: Uuid) {
        self.last.remove(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_packet_accepted() {
        let tracker = SequenceTracker::new();
        assert_eq!(
            tracker.classify(Uuid::new_v4(), 42),
            SequenceDecision::Accept { previous: None }
        );
    }

    #[test]
    fn test_window_edges() {
        let line = Uuid::new_v4();
        let mut tracker = SequenceTracker::new();
        tracker.record(line, 100);

        assert_eq!(
            tracker.classify(line, 101),
            SequenceDecision::Accept {
                previous: Some(100)
            }
        );
        assert_eq!(tracker.classify(line, 100), SequenceDecision::DropReordered);
        assert_eq!(tracker.classify(line, 91), SequenceDecision::DropReordered);
        assert_eq!(tracker.classify(line, 90), SequenceDecision::ResetAndAccept);
        assert_eq!(tracker.classify(line, 0), SequenceDecision::ResetAndAccept);
    }

    #[test]
    fn test_lines_are_independent() {
        let proximity = Uuid::new_v4();
        let group = Uuid::new_v4();
        let mut tracker = SequenceTracker::new();
        tracker.record(proximity, 500);

        assert_eq!(
            tracker.classify(group, 3),
            SequenceDecision::Accept { previous: None }
        );
        tracker.forget(proximity);
        assert_eq!(tracker.last(proximity), None);
    }

    proptest! {
        #[test]
        fn prop_classification_matches_window(last in 0u64..1_000_000, back in 0u64..100) {
            let line = Uuid::nil();
            let mut tracker = SequenceTracker::new();
            tracker.record(line, last);
            let sequence = last.saturating_sub(back);
            let decision = tracker.classify(line, sequence);

            if last - sequence < REORDER_TOLERANCE {
                prop_assert_eq!(decision, SequenceDecision::DropReordered);
            } else {
                prop_assert_eq!(decision, SequenceDecision::ResetAndAccept);
            }
            // classification never mutates
            prop_assert_eq!(tracker.last(line), Some(last));
        }

        #[test]
        fn prop_forward_always_accepted(last in 0u64..1_000_000, ahead in 1u64..1000) {
            let line = Uuid::nil();
            let mut tracker = SequenceTracker::new();
            tracker.record(line, last);
            prop_assert_eq!(
                tracker.classify(line, last + ahead),
                SequenceDecision::Accept { previous: Some(last) }
            );
        }
    }
}
