use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, warn};

use crate::watch_types::{AvailabilityVerdict, StatusRecord, TargetKey, TransitionEvent};

/// Last known availability per target, with edge detection.
///
/// Owned by the monitor for the whole process lifetime; records are never
/// removed during a run.
#[derive(Debug, Default)]
pub struct StateTracker {
    records: HashMap<TargetKey, StatusRecord>,
}

impl StateTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `verdict` for `key` and report a full to available edge.
    ///
    /// Error verdicts never produce a transition and keep the previous
    /// availability; only `last_check` and `last_error` are updated.
    pub fn update(
        &mut self,
        key: &TargetKey,
        verdict: AvailabilityVerdict,
    ) -> Option<TransitionEvent> {
        let now = Utc::now();
        let record = self.records.entry(key.clone()).or_default();

        if let Some(ref error) = verdict.error {
            warn!(target_key = %key, error = %error, "check failed, keeping previous state");
            record.last_check = Some(now);
            record.last_error = Some(error.clone());
            return None;
        }

        let transition = (!record.available && verdict.available).then(|| TransitionEvent {
            target_key: key.clone(),
            verdict: verdict.clone(),
            detected_at: now,
        });

        if transition.is_some() {
            debug!(target_key = %key, "availability transition detected");
        }

        record.available = verdict.available;
        record.last_check = Some(now);
        record.details = Some(verdict);
        record.last_error = None;

        transition
    }

    /// Current record for `key`; unseen keys report the default record.
    pub fn record(&self, key: &TargetKey) -> StatusRecord {
        self.records.get(key).cloned().unwrap_or_default()
    }

    /// Number of targets seen so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no target has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over every held record.
    pub fn iter(&self) -> impl Iterator<Item = (&TargetKey, &StatusRecord)> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::{AvailabilityChecker, COURSE_NOT_FOUND};
    use crate::watch_types::{CourseRow, WatchTarget};

    fn verdict(target: &WatchTarget, available: bool) -> AvailabilityVerdict {
        let row = if available {
            let labels = target.section.iter().map(|s| format!("Section {}", s)).collect();
            CourseRow::new("CSX05 open", labels)
        } else {
            CourseRow::new("CSX05 Section Full", Vec::new())
        };
        AvailabilityChecker::new().check(target, Some(&row))
    }

    #[test]
    fn test_edge_triggered_notifications() {
        let target = WatchTarget::new("CSX05", "");
        let key = target.key();
        let mut tracker = StateTracker::new();

        let fired: Vec<usize> = [false, true, true, false, true]
            .iter()
            .enumerate()
            .filter_map(|(i, &available)| {
                tracker
                    .update(&key, verdict(&target, available))
                    .map(|_| i)
            })
            .collect();

        assert_eq!(fired, vec![1, 4]);
    }

    #[test]
    fn test_repeated_verdict_is_idempotent() {
        let target = WatchTarget::new("CSX05", "");
        let key = target.key();
        let mut tracker = StateTracker::new();
        let open = verdict(&target, true);

        assert!(tracker.update(&key, open.clone()).is_some());
        assert!(tracker.update(&key, open).is_none());
    }

    #[test]
    fn test_unseen_key_defaults_to_unavailable() {
        let tracker = StateTracker::new();
        let record = tracker.record(&WatchTarget::new("CS101", "").key());

        assert!(!record.available);
        assert!(record.last_check.is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_first_available_verdict_is_a_transition() {
        let target = WatchTarget::new("CSX05", "");
        let mut tracker = StateTracker::new();

        let event = tracker.update(&target.key(), verdict(&target, true)).unwrap();
        assert_eq!(event.target_key, target.key());
        assert!(event.verdict.available);
    }

    #[test]
    fn test_error_verdict_keeps_previous_state() {
        let target = WatchTarget::new("CSX05", "");
        let key = target.key();
        let checker = AvailabilityChecker::new();
        let mut tracker = StateTracker::new();

        assert!(tracker.update(&key, verdict(&target, true)).is_some());
        assert!(tracker.update(&key, checker.check(&target, None)).is_none());

        let record = tracker.record(&key);
        assert!(record.available);
        assert_eq!(record.last_error.as_deref(), Some(COURSE_NOT_FOUND));

        // The row comes back still open: no second notification.
        assert!(tracker.update(&key, verdict(&target, true)).is_none());
        assert!(tracker.record(&key).last_error.is_none());
    }

    #[test]
    fn test_error_verdict_on_unseen_key_is_not_a_transition() {
        let target = WatchTarget::new("CSX05", "");
        let mut tracker = StateTracker::new();

        assert!(
            tracker
                .update(&target.key(), AvailabilityChecker::new().check(&target, None))
                .is_none()
        );
        let record = tracker.record(&target.key());
        assert!(!record.available);
        assert!(record.last_check.is_some());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_targets_are_tracked_independently() {
        let a = WatchTarget::new("CSX05", "").with_section("A");
        let b = WatchTarget::new("CSX05", "").with_section("B");
        let mut tracker = StateTracker::new();

        assert!(tracker.update(&a.key(), verdict(&a, true)).is_some());
        assert!(tracker.update(&b.key(), verdict(&b, true)).is_some());
        assert_eq!(tracker.iter().count(), 2);
    }
}
