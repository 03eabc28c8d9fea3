//! Event types for the sync pipeline.
//!
//! - [`SourceEvent`]: an event as delivered by the remote feed, with its date
//!   and its start/end times still in their textual form
//! - [`ResolvedEvent`]: a source event whose times have been resolved into
//!   timezone-aware instants

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// An event fetched from the remote event feed.
///
/// Source events are immutable once fetched and live for a single sync run.
/// The `id` is the stable external identifier that is carried into the
/// destination calendars and used as the deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Stable external identifier, unique within the feed.
    pub id: String,
    /// The event title.
    pub title: String,
    /// The event location.
    pub location: String,
    /// The category name.
    pub category: String,
    /// Tag names, in feed order.
    pub tags: Vec<String>,
    /// The calendar date the event takes place on (local to the feed).
    pub date: NaiveDate,
    /// Start time as formatted by the feed (e.g. `"5:00 AM"`).
    pub start_time_text: String,
    /// End time as formatted by the feed (e.g. `"9:00 PM"`), may be empty.
    pub end_time_text: String,
}

impl SourceEvent {
    /// Creates a new source event with the required fields.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        date: NaiveDate,
        start_time_text: impl Into<String>,
        end_time_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            location: String::new(),
            category: String::new(),
            tags: Vec::new(),
            date,
            start_time_text: start_time_text.into(),
            end_time_text: end_time_text.into(),
        }
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Builder method to set the category name.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Builder method to add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Builder method to set all tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the description written into destination calendars.
    ///
    /// Lists the tags and the category, one per line.
    pub fn description(&self) -> String {
        format!("Tags: {}\nCategory: {}", self.tags.join(", "), self.category)
    }
}

/// A source event with resolved, timezone-aware start and end instants.
///
/// Invariant: `end >= start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEvent {
    /// The event as fetched.
    pub source: SourceEvent,
    /// When the event starts.
    pub start: DateTime<Tz>,
    /// When the event ends.
    pub end: DateTime<Tz>,
}

impl ResolvedEvent {
    /// Returns the external identifier of the underlying source event.
    pub fn id(&self) -> &str {
        &self.source.id
    }

    /// Returns the event title.
    pub fn title(&self) -> &str {
        &self.source.title
    }
}
