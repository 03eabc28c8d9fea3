//! The pure reconciliation step.
//!
//! Compares the desired events of one calendar with what the calendar holds
//! inside the sync horizon and decides what to create, keep and delete.
//! Nothing here talks to a store; [`SyncEngine`](crate::SyncEngine)
//! executes the plan.

use std::collections::HashSet;

use feedcal_core::{ResolvedEvent, SyncHorizon};
use feedcal_providers::{NewRemoteEvent, RemoteEvent};
use tracing::debug;

/// What reconciling one calendar will do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub calendar: String,
    /// Desired events with no remote counterpart, in desired order.
    pub create: Vec<NewRemoteEvent>,
    /// External ids of desired events already present remotely.
    pub keep: Vec<String>,
    /// In-window remote events that are not desired, or duplicates.
    pub delete: Vec<RemoteEvent>,
    /// External ids of desired events starting outside the horizon.
    pub skipped: Vec<String>,
}

impl SyncPlan {
    /// Number of store mutations the plan needs.
    pub fn mutation_count(&self) -> usize {
        self.create.len() + self.delete.len()
    }

    /// True when the calendar is already in sync.
    pub fn is_noop(&self) -> bool {
        self.mutation_count() == 0
    }
}

/// Builds the plan for `calendar`.
///
/// `remote_window` may contain events outside `horizon`; they are ignored
/// and never end up in `delete`. When the calendar already holds several
/// copies of one external id, the first listed copy is kept and the others
/// are deleted.
pub fn plan(
    calendar: &str,
    desired: &[ResolvedEvent],
    remote_window: &[RemoteEvent],
    horizon: &SyncHorizon,
) -> SyncPlan {
    let mut result = SyncPlan {
        calendar: calendar.to_string(),
        ..Default::default()
    };

    let in_window: Vec<&RemoteEvent> = remote_window
        .iter()
        .filter(|e| horizon.contains(&e.start))
        .collect();

    let mut lookup: HashSet<&str> = HashSet::new();
    let mut duplicate = vec![false; in_window.len()];
    for (idx, remote) in in_window.iter().enumerate() {
        if !lookup.insert(remote.external_id.as_str()) {
            debug!(
                "{}: duplicate remote event {} for {}",
                calendar, remote.remote_id, remote.external_id
            );
            duplicate[idx] = true;
        }
    }

    let desired_ids: HashSet<&str> = desired.iter().map(ResolvedEvent::id).collect();
    let mut planned: HashSet<&str> = HashSet::new();

    for event in desired {
        let id = event.id();
        if !planned.insert(id) {
            continue;
        }
        if !horizon.contains(&event.start) {
            result.skipped.push(id.to_string());
        } else if lookup.contains(id) {
            result.keep.push(id.to_string());
        } else {
            result.create.push(NewRemoteEvent::from_resolved(event));
        }
    }

    for (remote, duplicate) in in_window.iter().zip(duplicate) {
        if duplicate || !desired_ids.contains(remote.external_id.as_str()) {
            result.delete.push((*remote).clone());
        }
    }

    debug!(
        "{}: plan create={} keep={} delete={} skipped={}",
        calendar,
        result.create.len(),
        result.keep.len(),
        result.delete.len(),
        result.skipped.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use chrono_tz::Tz;
    use feedcal_core::{SourceEvent, resolve_event};

    const NY: Tz = chrono_tz::America::New_York;

    fn horizon() -> SyncHorizon {
        SyncHorizon::new(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(), 14, NY)
    }

    fn desired(id: &str, day: u32) -> ResolvedEvent {
        let source = SourceEvent::new(
            id,
            format!("event {id}"),
            NaiveDate::from_ymd_opt(2025, 7, day).unwrap(),
            "5:00 AM",
            "9:00 PM",
        );
        resolve_event(&source, &NY).unwrap()
    }

    fn remote(remote_id: &str, external_id: &str, day: u32) -> RemoteEvent {
        let start = NY.with_ymd_and_hms(2025, 7, day, 5, 0, 0).unwrap().with_timezone(&Utc);
        RemoteEvent::new(remote_id, external_id, "x", start, start)
    }

    fn remote_at(remote_id: &str, external_id: &str, start: chrono::DateTime<Utc>) -> RemoteEvent {
        RemoteEvent::new(remote_id, external_id, "x", start, start)
    }

    fn create_ids(plan: &SyncPlan) -> Vec<&str> {
        plan.create.iter().map(|e| e.external_id.as_str()).collect()
    }

    fn delete_ids(plan: &SyncPlan) -> Vec<&str> {
        plan.delete.iter().map(|e| e.external_id.as_str()).collect()
    }

    #[test]
    fn new_event_is_created() {
        let result = plan("all entertainment", &[desired("1", 1)], &[], &horizon());

        assert_eq!(create_ids(&result), vec!["1"]);
        assert!(result.keep.is_empty());
        assert!(result.delete.is_empty());
        assert_eq!(
            result.create[0].start,
            NY.with_ymd_and_hms(2025, 7, 1, 5, 0, 0).unwrap()
        );
    }

    #[test]
    fn existing_event_is_kept() {
        let result = plan(
            "all entertainment",
            &[desired("1", 1)],
            &[remote("r1", "1", 1)],
            &horizon(),
        );

        assert!(result.create.is_empty());
        assert_eq!(result.keep, vec!["1"]);
        assert!(result.delete.is_empty());
        assert!(result.is_noop());
    }

    #[test]
    fn undesired_event_in_window_is_deleted() {
        let result = plan(
            "all entertainment",
            &[desired("1", 1)],
            &[remote("r1", "1", 1), remote("r99", "99", 3)],
            &horizon(),
        );

        assert_eq!(delete_ids(&result), vec!["99"]);
        assert_eq!(result.keep, vec!["1"]);
    }

    #[test]
    fn out_of_window_remote_events_are_ignored() {
        let before = Utc.with_ymd_and_hms(2025, 6, 30, 12, 0, 0).unwrap();
        // horizon end is exclusive
        let at_end = NY
            .with_ymd_and_hms(2025, 7, 16, 0, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let result = plan(
            "music",
            &[],
            &[remote_at("old", "50", before), remote_at("late", "51", at_end)],
            &horizon(),
        );

        assert!(result.delete.is_empty());
        assert!(result.is_noop());
    }

    #[test]
    fn out_of_window_remote_copy_does_not_count_as_present() {
        let before = Utc.with_ymd_and_hms(2025, 6, 30, 12, 0, 0).unwrap();
        let result = plan("music", &[desired("1", 2)], &[remote_at("old", "1", before)], &horizon());
        assert_eq!(create_ids(&result), vec!["1"]);
    }

    #[test]
    fn duplicate_remote_copies_are_deleted() {
        let result = plan(
            "music",
            &[desired("1", 1)],
            &[remote("a", "1", 1), remote("b", "1", 1), remote("c", "1", 1)],
            &horizon(),
        );

        assert_eq!(result.keep, vec!["1"]);
        let removed: Vec<_> = result.delete.iter().map(|e| e.remote_id.as_str()).collect();
        assert_eq!(removed, vec!["b", "c"]);
    }

    #[test]
    fn desired_event_outside_horizon_is_skipped() {
        let far = {
            let source = SourceEvent::new(
                "7",
                "later",
                NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
                "5:00 AM",
                "6:00 AM",
            );
            resolve_event(&source, &NY).unwrap()
        };

        let result = plan("music", &[desired("1", 1), far], &[], &horizon());
        assert_eq!(create_ids(&result), vec!["1"]);
        assert_eq!(result.skipped, vec!["7"]);
    }

    #[test]
    fn empty_desired_set_clears_the_window() {
        let result = plan(
            "music",
            &[],
            &[remote("r1", "1", 1), remote("r2", "2", 5)],
            &horizon(),
        );
        assert_eq!(delete_ids(&result), vec!["1", "2"]);
    }

    #[test]
    fn creates_follow_desired_order() {
        let result = plan(
            "music",
            &[desired("3", 4), desired("1", 2), desired("2", 3), desired("1", 2)],
            &[remote("r2", "2", 3)],
            &horizon(),
        );
        assert_eq!(create_ids(&result), vec!["3", "1"]);
        assert_eq!(result.keep, vec!["2"]);
        assert_eq!(result.mutation_count(), 2);
    }
}
