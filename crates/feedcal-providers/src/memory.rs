//! In-memory calendar store.
//!
//! Backs the sync engine tests and offline dry runs. Supports seeding
//! calendars and events directly, injecting failures, and counting calls.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use chrono_tz::Tz;
use feedcal_core::SyncHorizon;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::store::{BoxFuture, CalendarInfo, CalendarStore, NewRemoteEvent, RemoteEvent};

const PROVIDER: &str = "memory";

/// How many times each store operation was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub find_calendar: usize,
    pub create_calendar: usize,
    pub list_events: usize,
    pub create_event: usize,
    pub delete_event: usize,
}

impl StoreCalls {
    /// Number of calls that changed state.
    pub fn mutations(&self) -> usize {
        self.create_calendar + self.create_event + self.delete_event
    }
}

#[derive(Debug)]
struct MemoryCalendar {
    info: CalendarInfo,
    events: Vec<RemoteEvent>,
}

#[derive(Debug, Default)]
struct State {
    calendars: Vec<MemoryCalendar>,
    next_id: u64,
    calls: StoreCalls,
    fail_create: HashMap<String, ProviderError>,
    fail_delete: HashSet<String>,
    fail_list: HashSet<String>,
    auth_failure: bool,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn calendar_mut(&mut self, calendar_id: &str) -> ProviderResult<&mut MemoryCalendar> {
        self.calendars
            .iter_mut()
            .find(|c| c.info.id == calendar_id)
            .ok_or_else(|| {
                ProviderError::not_found(format!("calendar {} not found", calendar_id))
                    .with_provider(PROVIDER)
            })
    }

    fn check_auth(&self) -> ProviderResult<()> {
        if self.auth_failure {
            return Err(
                ProviderError::authentication("credentials rejected").with_provider(PROVIDER)
            );
        }
        Ok(())
    }
}

/// A thread-safe calendar store that keeps everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a calendar directly, without counting it as a call.
    pub fn add_calendar(&self, name: &str, timezone: Tz) -> CalendarInfo {
        let mut state = self.lock();
        let id = state.next_id("cal");
        let info = CalendarInfo::new(id, name).with_timezone(timezone.name());
        state.calendars.push(MemoryCalendar {
            info: info.clone(),
            events: Vec::new(),
        });
        info
    }

    /// Adds an event directly, bypassing the duplicate check.
    pub fn insert_event(&self, calendar_id: &str, event: RemoteEvent) -> ProviderResult<()> {
        let mut state = self.lock();
        state.calendar_mut(calendar_id)?.events.push(event);
        Ok(())
    }

    /// Returns every event of the named calendar, in insertion order.
    pub fn events(&self, calendar_name: &str) -> Vec<RemoteEvent> {
        self.lock()
            .calendars
            .iter()
            .find(|c| c.info.name == calendar_name)
            .map(|c| c.events.clone())
            .unwrap_or_default()
    }

    /// Returns the names of all calendars, in creation order.
    pub fn calendar_names(&self) -> Vec<String> {
        self.lock()
            .calendars
            .iter()
            .map(|c| c.info.name.clone())
            .collect()
    }

    pub fn calls(&self) -> StoreCalls {
        self.lock().calls
    }

    /// Makes `create_event` fail with a server error for this external id.
    pub fn fail_create_for(&self, external_id: impl Into<String>) {
        self.fail_create_with(
            external_id,
            ProviderError::server("injected create failure").with_provider(PROVIDER),
        );
    }

    /// Makes `create_event` fail with `error` for this external id.
    pub fn fail_create_with(&self, external_id: impl Into<String>, error: ProviderError) {
        self.lock().fail_create.insert(external_id.into(), error);
    }

    /// Makes `delete_event` fail for events with this external id.
    pub fn fail_delete_for(&self, external_id: impl Into<String>) {
        self.lock().fail_delete.insert(external_id.into());
    }

    /// Makes `list_events` fail with a server error for this calendar name.
    pub fn fail_list_for(&self, calendar_name: impl Into<String>) {
        self.lock().fail_list.insert(calendar_name.into());
    }

    /// Makes every call fail with an authentication error.
    pub fn fail_auth(&self) {
        self.lock().auth_failure = true;
    }
}

impl InMemoryStore {
    fn find_calendar_now(&self, name: &str) -> ProviderResult<Option<CalendarInfo>> {
        let mut state = self.lock();
        state.calls.find_calendar += 1;
        state.check_auth()?;
        Ok(state
            .calendars
            .iter()
            .find(|c| c.info.name == name)
            .map(|c| c.info.clone()))
    }

    fn create_calendar_now(&self, name: &str, timezone: Tz) -> ProviderResult<CalendarInfo> {
        let mut state = self.lock();
        state.calls.create_calendar += 1;
        state.check_auth()?;
        let id = state.next_id("cal");
        let info = CalendarInfo::new(id, name).with_timezone(timezone.name());
        state.calendars.push(MemoryCalendar {
            info: info.clone(),
            events: Vec::new(),
        });
        debug!("created calendar {} ({})", name, info.id);
        Ok(info)
    }

    fn list_events_now(
        &self,
        calendar_id: &str,
        horizon: &SyncHorizon,
    ) -> ProviderResult<Vec<RemoteEvent>> {
        let mut state = self.lock();
        state.calls.list_events += 1;
        state.check_auth()?;
        let fail_list = state.fail_list.clone();
        let calendar = state.calendar_mut(calendar_id)?;
        if fail_list.contains(&calendar.info.name) {
            return Err(ProviderError::server("injected list failure").with_provider(PROVIDER));
        }
        Ok(calendar
            .events
            .iter()
            .filter(|e| horizon.contains(&e.start))
            .cloned()
            .collect())
    }

    fn create_event_now(
        &self,
        calendar_id: &str,
        event: &NewRemoteEvent,
    ) -> ProviderResult<RemoteEvent> {
        let mut state = self.lock();
        state.calls.create_event += 1;
        state.check_auth()?;
        if let Some(error) = state.fail_create.get(&event.external_id) {
            return Err(error.clone());
        }

        let remote_id = state.next_id("evt");
        let calendar = state.calendar_mut(calendar_id)?;
        if let Some(existing) = calendar
            .events
            .iter()
            .find(|e| e.external_id == event.external_id)
        {
            return Ok(existing.clone());
        }

        let created = RemoteEvent::new(
            remote_id,
            &event.external_id,
            &event.title,
            event.start.with_timezone(&Utc),
            event.end.with_timezone(&Utc),
        );
        calendar.events.push(created.clone());
        Ok(created)
    }

    fn delete_event_now(&self, calendar_id: &str, remote_id: &str) -> ProviderResult<()> {
        let mut state = self.lock();
        state.calls.delete_event += 1;
        state.check_auth()?;
        let fail_delete = state.fail_delete.clone();
        let calendar = state.calendar_mut(calendar_id)?;

        let Some(pos) = calendar.events.iter().position(|e| e.remote_id == remote_id) else {
            return Ok(());
        };
        if fail_delete.contains(&calendar.events[pos].external_id) {
            return Err(ProviderError::server("injected delete failure").with_provider(PROVIDER));
        }
        calendar.events.remove(pos);
        Ok(())
    }
}

impl CalendarStore for InMemoryStore {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn find_calendar<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<CalendarInfo>>> {
        let result = self.find_calendar_now(name);
        Box::pin(async move { result })
    }

    fn create_calendar<'a>(
        &'a self,
        name: &'a str,
        timezone: Tz,
    ) -> BoxFuture<'a, ProviderResult<CalendarInfo>> {
        let result = self.create_calendar_now(name, timezone);
        Box::pin(async move { result })
    }

    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        horizon: &'a SyncHorizon,
    ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>> {
        let result = self.list_events_now(calendar_id, horizon);
        Box::pin(async move { result })
    }

    fn create_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: &'a NewRemoteEvent,
    ) -> BoxFuture<'a, ProviderResult<RemoteEvent>> {
        let result = self.create_event_now(calendar_id, event);
        Box::pin(async move { result })
    }

    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        remote_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        let result = self.delete_event_now(calendar_id, remote_id);
        Box::pin(async move { result })
    }
}
