//! Low-level Google Calendar API v3 client.
//!
//! Maps each endpoint the store needs to one method and every non-success
//! status to a [`ProviderError`]. Knows nothing about sync semantics.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

use super::PROVIDER;

/// Google Calendar API client bound to one access token.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    api_base: String,
    access_token: String,
}

impl GoogleCalendarClient {
    pub fn new(
        http_client: reqwest::Client,
        api_base: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            api_base: api_base.into(),
            access_token: access_token.into(),
        }
    }

    fn calendar_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}",
            self.api_base,
            urlencoding::encode(calendar_id)
        )
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!("{}/events", self.calendar_url(calendar_id))
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(event_id)
        )
    }

    /// Sends a request and returns the successful response.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> ProviderResult<reqwest::Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ProviderError::from(e).with_provider(PROVIDER))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::from_status(status.as_u16(), context, &body).with_provider(PROVIDER))
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> ProviderResult<T> {
        let response = self.execute(request, context).await?;
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("{context}: failed to read response: {e}"))
                .with_provider(PROVIDER)
        })?;
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("{context}: failed to parse response: {e}"))
                .with_provider(PROVIDER)
        })
    }

    /// Lists every calendar on the user's calendar list.
    pub async fn list_calendars(&self) -> ProviderResult<Vec<CalendarListEntry>> {
        let url = format!("{}/users/me/calendarList", self.api_base);
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http_client.get(&url);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: Page<CalendarListEntry> =
                self.execute_json(request, "list calendars").await?;
            calendars.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("calendar list has {} entries", calendars.len());
        Ok(calendars)
    }

    /// Creates a secondary calendar.
    pub async fn insert_calendar(
        &self,
        summary: &str,
        time_zone: &str,
    ) -> ProviderResult<CalendarListEntry> {
        let url = format!("{}/calendars", self.api_base);
        let body = NewCalendar { summary, time_zone };
        self.execute_json(self.http_client.post(&url).json(&body), "create calendar")
            .await
    }

    /// Lists expanded event instances overlapping `[time_min, time_max)`.
    pub async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> ProviderResult<Vec<ApiEvent>> {
        let url = self.events_url(calendar_id);
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http_client.get(&url).query(&[
                ("singleEvents", "true".to_string()),
                ("timeMin", time_min.to_rfc3339()),
                ("timeMax", time_max.to_rfc3339()),
                ("maxResults", "2500".to_string()),
            ]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: Page<ApiEvent> = self.execute_json(request, "list events").await?;
            events.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("fetched {} events from calendar {}", events.len(), calendar_id);
        Ok(events)
    }

    pub async fn get_event(&self, calendar_id: &str, event_id: &str) -> ProviderResult<ApiEvent> {
        let url = self.event_url(calendar_id, event_id);
        self.execute_json(self.http_client.get(&url), "get event")
            .await
    }

    pub async fn insert_event(
        &self,
        calendar_id: &str,
        event: &EventBody,
    ) -> ProviderResult<ApiEvent> {
        let url = self.events_url(calendar_id);
        self.execute_json(self.http_client.post(&url).json(event), "create event")
            .await
    }

    /// Replaces an event, which also restores a cancelled one.
    pub async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &EventBody,
    ) -> ProviderResult<ApiEvent> {
        let url = self.event_url(calendar_id, event_id);
        self.execute_json(self.http_client.put(&url).json(event), "update event")
            .await
    }

    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> ProviderResult<()> {
        let url = self.event_url(calendar_id, event_id);
        self.execute(self.http_client.delete(&url), "delete event")
            .await
            .map(|_| ())
    }
}

/// A paginated list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewCalendar<'a> {
    summary: &'a str,
    time_zone: &'a str,
}

/// A calendar list entry, also the shape returned by calendar creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    pub time_zone: Option<String>,
}

/// An event resource as returned by the API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    pub id: Option<String>,
    pub summary: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub start: ApiEventTime,
    #[serde(default)]
    pub end: ApiEventTime,
    pub extended_properties: Option<ExtendedProperties>,
}

impl ApiEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    /// Returns a private extended property.
    pub fn private_property(&self, key: &str) -> Option<&str> {
        self.extended_properties
            .as_ref()?
            .private
            .get(key)
            .map(String::as_str)
    }
}

/// Either a timed (`dateTime`) or an all-day (`date`) boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedProperties {
    #[serde(default)]
    pub private: HashMap<String, String>,
}

/// Request body for event insert and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: ApiEventTime,
    pub end: ApiEventTime,
    pub extended_properties: ExtendedProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_event_page() {
        let json = r#"{
            "items": [
                {
                    "id": "123456",
                    "summary": "Groove Slayers",
                    "status": "confirmed",
                    "start": {"dateTime": "2025-07-01T05:00:00-04:00", "timeZone": "America/New_York"},
                    "end": {"dateTime": "2025-07-01T21:00:00-04:00"},
                    "extendedProperties": {"private": {"feedcalId": "123456"}}
                },
                {
                    "id": "allday",
                    "start": {"date": "2025-07-02"},
                    "end": {"date": "2025-07-03"}
                }
            ],
            "nextPageToken": "page-2"
        }"#;

        let page: Page<ApiEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_page_token.as_deref(), Some("page-2"));
        assert_eq!(page.items[0].private_property("feedcalId"), Some("123456"));
        assert!(page.items[1].private_property("feedcalId").is_none());
        assert_eq!(page.items[1].start.date.as_deref(), Some("2025-07-02"));
    }

    #[test]
    fn cancelled_event_without_times() {
        let event: ApiEvent =
            serde_json::from_str(r#"{"id": "x1234", "status": "cancelled"}"#).unwrap();
        assert!(event.is_cancelled());
        assert!(event.start.date_time.is_none());
    }

    #[test]
    fn event_body_serialization() {
        let body = EventBody {
            id: Some("123456".to_string()),
            summary: "Groove Slayers".to_string(),
            location: "Lake Sumter Landing".to_string(),
            description: "Tags: \nCategory: ".to_string(),
            start: ApiEventTime {
                date_time: Some("2025-07-01T05:00:00-04:00".to_string()),
                time_zone: Some("America/New_York".to_string()),
                ..Default::default()
            },
            end: ApiEventTime {
                date_time: Some("2025-07-01T21:00:00-04:00".to_string()),
                time_zone: Some("America/New_York".to_string()),
                ..Default::default()
            },
            extended_properties: ExtendedProperties {
                private: HashMap::from([("feedcalId".to_string(), "123456".to_string())]),
            },
            status: None,
        };

        let value = serde_json::to_value(&body).unwrap();
        insta::assert_json_snapshot!(value, @r#"
        {
          "description": "Tags: \nCategory: ",
          "end": {
            "dateTime": "2025-07-01T21:00:00-04:00",
            "timeZone": "America/New_York"
          },
          "extendedProperties": {
            "private": {
              "feedcalId": "123456"
            }
          },
          "id": "123456",
          "location": "Lake Sumter Landing",
          "start": {
            "dateTime": "2025-07-01T05:00:00-04:00",
            "timeZone": "America/New_York"
          },
          "summary": "Groove Slayers"
        }
        "#);
    }

    #[test]
    fn parse_calendar_entry() {
        let entry: CalendarListEntry = serde_json::from_str(
            r#"{"id": "abc@group.calendar.google.com", "summary": "all entertainment", "timeZone": "America/New_York"}"#,
        )
        .unwrap();
        assert_eq!(entry.summary, "all entertainment");
        assert_eq!(entry.time_zone.as_deref(), Some("America/New_York"));
    }
}
