//! The [`CalendarStore`] trait: destination calendars the sync writes to.
//!
//! Stores are addressed by calendar name, as written in the rules, and by the
//! store-assigned calendar id once resolved. Events carry two ids: the
//! store's own `remote_id` and the `external_id` copied from the source feed,
//! which is what reconciliation compares on.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use feedcal_core::{ResolvedEvent, SyncHorizon};

use crate::error::ProviderResult;

/// A boxed future for async trait methods.
///
/// Keeps the traits object-safe so the engine can hold `&dyn CalendarStore`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Title used when the source event has none.
pub const UNTITLED_EVENT: &str = "Untitled Event";

/// A destination calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarInfo {
    /// Store-assigned identifier.
    pub id: String,
    /// Display name, matched against rule calendar names.
    pub name: String,
    /// IANA zone name, when the store reports one.
    pub timezone: Option<String>,
}

impl CalendarInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            timezone: None,
        }
    }

    /// Builder method to set timezone.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }
}

/// An event as it currently exists in a destination calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEvent {
    /// Store-assigned identifier, used for deletion.
    pub remote_id: String,
    /// Identifier of the source event this was created from.
    pub external_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RemoteEvent {
    pub fn new(
        remote_id: impl Into<String>,
        external_id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            remote_id: remote_id.into(),
            external_id: external_id.into(),
            title: title.into(),
            start,
            end,
        }
    }
}

/// An event the reconciler asks a store to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRemoteEvent {
    pub external_id: String,
    pub title: String,
    pub location: String,
    pub description: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl NewRemoteEvent {
    /// Copies the descriptive fields of a resolved source event.
    pub fn from_resolved(event: &ResolvedEvent) -> Self {
        let source = &event.source;
        let title = if source.title.trim().is_empty() {
            UNTITLED_EVENT.to_string()
        } else {
            source.title.clone()
        };

        Self {
            external_id: source.id.clone(),
            title,
            location: source.location.clone(),
            description: source.description(),
            start: event.start,
            end: event.end,
        }
    }

    /// Returns the zone the event times are expressed in.
    pub fn timezone(&self) -> Tz {
        self.start.timezone()
    }
}

/// A destination calendar backend.
///
/// Implementations must be safe to call concurrently, although the sync
/// engine only issues one request at a time.
///
/// # Contract
///
/// - `create_event` with an external id that already exists in the calendar
///   must not produce a second copy.
/// - `delete_event` on an event that is already gone succeeds.
/// - Credential failures are reported with an authentication or
///   authorization [`ProviderErrorCode`](crate::ProviderErrorCode).
pub trait CalendarStore: Send + Sync {
    /// Returns the backend name used in logs and errors.
    fn name(&self) -> &str;

    /// Looks up a calendar by display name.
    fn find_calendar<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<CalendarInfo>>>;

    /// Creates a calendar with the given display name and zone.
    fn create_calendar<'a>(
        &'a self,
        name: &'a str,
        timezone: Tz,
    ) -> BoxFuture<'a, ProviderResult<CalendarInfo>>;

    /// Looks up a calendar by name, creating it when missing.
    fn find_or_create_calendar<'a>(
        &'a self,
        name: &'a str,
        timezone: Tz,
    ) -> BoxFuture<'a, ProviderResult<CalendarInfo>> {
        Box::pin(async move {
            match self.find_calendar(name).await? {
                Some(calendar) => Ok(calendar),
                None => self.create_calendar(name, timezone).await,
            }
        })
    }

    /// Lists the events of a calendar that start inside `horizon`.
    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        horizon: &'a SyncHorizon,
    ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>>;

    /// Creates an event and returns it as stored.
    fn create_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: &'a NewRemoteEvent,
    ) -> BoxFuture<'a, ProviderResult<RemoteEvent>>;

    /// Deletes an event by its store-assigned id.
    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        remote_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>>;
}
