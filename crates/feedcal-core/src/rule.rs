//! Matching rules.
//!
//! A [`Rule`] names a destination calendar and up to four filters. Empty
//! filters are not applied, so a rule with every filter empty is a catch-all.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::SourceEvent;

/// Errors raised when a rule is structurally invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// The rule has no destination calendar.
    #[error("rule has no calendar name")]
    MissingCalendar,
}

/// A declarative filter that routes matching events to a calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// Destination calendar name.
    pub calendar: String,
    /// Case-insensitive substring of the event title.
    pub title: String,
    /// Case-insensitive substring of the event location.
    pub location: String,
    /// Case-insensitive substring of the event category.
    pub category: String,
    /// Matches when any of these is a case-insensitive substring of any
    /// event tag.
    pub tags: Vec<String>,
}

impl Rule {
    /// Creates a catch-all rule for `calendar`.
    pub fn new(calendar: impl Into<String>) -> Self {
        Self {
            calendar: calendar.into(),
            ..Default::default()
        }
    }

    /// Builder method to set the title filter.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Builder method to set the location filter.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Builder method to set the category filter.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Builder method to set the tag filter.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Checks that the rule can be used for grouping.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.calendar.trim().is_empty() {
            return Err(RuleError::MissingCalendar);
        }
        Ok(())
    }

    /// Returns true when no filter is populated.
    pub fn is_catch_all(&self) -> bool {
        self.title.is_empty()
            && self.location.is_empty()
            && self.category.is_empty()
            && self.tags.iter().all(|t| t.is_empty())
    }

    /// Decides whether `event` satisfies every populated filter.
    pub fn matches(&self, event: &SourceEvent) -> bool {
        contains_ci(&event.title, &self.title)
            && contains_ci(&event.location, &self.location)
            && contains_ci(&event.category, &self.category)
            && self.matches_tags(&event.tags)
    }

    fn matches_tags(&self, event_tags: &[String]) -> bool {
        let wanted: Vec<String> = self
            .tags
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();
        if wanted.is_empty() {
            return true;
        }

        event_tags.iter().any(|tag| {
            let tag = tag.to_lowercase();
            wanted.iter().any(|w| tag.contains(w.as_str()))
        })
    }

    /// Returns a short human description of the filters.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.title.is_empty() {
            parts.push(format!("title containing '{}'", self.title));
        }
        if !self.location.is_empty() {
            parts.push(format!("location containing '{}'", self.location));
        }
        if !self.category.is_empty() {
            parts.push(format!("category containing '{}'", self.category));
        }
        let tags: Vec<&str> = self
            .tags
            .iter()
            .map(String::as_str)
            .filter(|t| !t.is_empty())
            .collect();
        if !tags.is_empty() {
            parts.push(format!("tags containing [{}]", tags.join(", ")));
        }

        if parts.is_empty() {
            "all events".to_string()
        } else {
            parts.join(" and ")
        }
    }
}

/// Empty needles always match.
fn contains_ci(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}
