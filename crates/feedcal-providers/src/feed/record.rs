//! Feed records and their conversion to [`SourceEvent`].
//!
//! The feed is loosely typed: ids arrive as strings or numbers, any field may
//! be `null`, and the date carries a meaningless midnight time part. Records
//! are decoded one by one so a single malformed entry only drops itself.

use chrono::NaiveDate;
use feedcal_core::SourceEvent;
use serde::Deserialize;
use thiserror::Error;

/// Why a feed record could not become a source event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record is not an event object: {0}")]
    Malformed(String),

    #[error("record has no eventId")]
    MissingId,

    #[error("event {id} has no eventDate")]
    MissingDate { id: String },

    #[error("event {id} has an invalid eventDate '{text}'")]
    InvalidDate { id: String, text: String },
}

/// The list endpoint's response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct FeedResponse {
    #[serde(default)]
    pub data: Option<Vec<serde_json::Value>>,
}

/// One event record as delivered by the feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRecord {
    #[serde(default)]
    pub event_id: Option<RecordId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    /// Usually `{"name": ...}`, occasionally something else.
    #[serde(default)]
    pub category: Option<serde_json::Value>,
    #[serde(default)]
    pub tags: Option<Vec<FeedTag>>,
}

/// An event id, which the feed sends either quoted or as a bare number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Text(String),
    Number(serde_json::Number),
}

impl RecordId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedTag {
    #[serde(default)]
    pub name: Option<String>,
}

impl FeedRecord {
    /// Decodes a single record from its JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RecordError> {
        serde_json::from_value(value).map_err(|e| RecordError::Malformed(e.to_string()))
    }

    /// Converts the record into a source event.
    pub fn into_source_event(self) -> Result<SourceEvent, RecordError> {
        let id = self
            .event_id
            .map(RecordId::into_string)
            .filter(|id| !id.is_empty())
            .ok_or(RecordError::MissingId)?;

        let date_text = self
            .event_date
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| RecordError::MissingDate { id: id.clone() })?;
        let date = parse_event_date(&date_text).ok_or_else(|| RecordError::InvalidDate {
            id: id.clone(),
            text: date_text.clone(),
        })?;

        let category = self
            .category
            .as_ref()
            .and_then(|c| c.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string();

        let tags: Vec<String> = self
            .tags
            .unwrap_or_default()
            .into_iter()
            .filter_map(|t| t.name)
            .collect();

        Ok(SourceEvent::new(
            id,
            self.title.unwrap_or_default(),
            date,
            self.start_time.unwrap_or_default(),
            self.end_time.unwrap_or_default(),
        )
        .with_location(self.location.unwrap_or_default())
        .with_category(category)
        .with_tags(tags))
    }
}

/// Accepts `2025-07-01T00:00:00` as well as a bare `2025-07-01`.
fn parse_event_date(text: &str) -> Option<NaiveDate> {
    let date_part = text.trim().split('T').next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
