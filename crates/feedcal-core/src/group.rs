//! Partitioning of resolved events by destination calendar.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::event::ResolvedEvent;
use crate::rule::Rule;

/// The desired contents of one destination calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarGroup {
    /// Calendar name, as written in the rule.
    pub calendar: String,
    events: Vec<ResolvedEvent>,
    seen: HashSet<String>,
}

impl CalendarGroup {
    fn new(calendar: String) -> Self {
        Self {
            calendar,
            events: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Adds an event unless one with the same id is already present.
    fn insert(&mut self, event: &ResolvedEvent) -> bool {
        if self.seen.insert(event.id().to_string()) {
            self.events.push(event.clone());
            true
        } else {
            false
        }
    }

    /// Events in insertion order, unique by id.
    pub fn events(&self) -> &[ResolvedEvent] {
        &self.events
    }

    /// Returns the ids of the grouped events, in order.
    pub fn ids(&self) -> Vec<&str> {
        self.events.iter().map(ResolvedEvent::id).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Calendar groups in first-rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarGroups {
    groups: Vec<CalendarGroup>,
    index: HashMap<String, usize>,
}

impl CalendarGroups {
    fn entry(&mut self, calendar: &str) -> &mut CalendarGroup {
        let idx = match self.index.get(calendar) {
            Some(&idx) => idx,
            None => {
                self.groups.push(CalendarGroup::new(calendar.to_string()));
                let idx = self.groups.len() - 1;
                self.index.insert(calendar.to_string(), idx);
                idx
            }
        };
        &mut self.groups[idx]
    }

    /// Looks up a group by calendar name.
    pub fn get(&self, calendar: &str) -> Option<&CalendarGroup> {
        self.index.get(calendar).map(|&idx| &self.groups[idx])
    }

    /// Iterates the groups in first-rule order.
    pub fn iter(&self) -> impl Iterator<Item = &CalendarGroup> {
        self.groups.iter()
    }

    /// Returns the calendar names in order.
    pub fn calendars(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.calendar.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl<'a> IntoIterator for &'a CalendarGroups {
    type Item = &'a CalendarGroup;
    type IntoIter = std::slice::Iter<'a, CalendarGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Groups `events` by the calendars of the rules they match.
///
/// Every calendar named by a rule gets a group, even when nothing matches it,
/// so the reconciler still clears stale entries from it. Rules without a
/// calendar name are ignored.
pub fn group(events: &[ResolvedEvent], rules: &[Rule]) -> CalendarGroups {
    let mut groups = CalendarGroups::default();

    for rule in rules {
        if rule.validate().is_err() {
            debug!("ignoring rule without calendar: {}", rule.describe());
            continue;
        }

        let group = groups.entry(&rule.calendar);
        let mut added = 0usize;
        for event in events.iter().filter(|e| rule.matches(&e.source)) {
            if group.insert(event) {
                added += 1;
            }
        }
        debug!(
            calendar = %rule.calendar,
            added,
            "rule matched {}",
            rule.describe()
        );
    }

    groups
}
