//! [`CalendarStore`] implementation on top of Google Calendar.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use feedcal_core::SyncHorizon;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};
use crate::store::{BoxFuture, CalendarInfo, CalendarStore, NewRemoteEvent, RemoteEvent};

use super::PROVIDER;
use super::client::{
    ApiEvent, ApiEventTime, CalendarListEntry, EventBody, ExtendedProperties,
    GoogleCalendarClient,
};
use super::config::GoogleConfig;
use super::oauth::OAuthClient;
use super::tokens::TokenStorage;

/// Private extended property holding the source event id.
pub const EXTERNAL_ID_PROPERTY: &str = "feedcalId";

/// Checks whether `id` is accepted by Google as a client-chosen event id:
/// 5 to 1024 characters from the base32hex alphabet (`a-v`, `0-9`).
pub fn is_valid_event_id(id: &str) -> bool {
    (5..=1024).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'v').contains(&b))
}

/// Google Calendar as a destination store.
///
/// Source ids that are valid Google event ids are used as the event id, so a
/// repeated insert conflicts instead of duplicating. The source id is also
/// kept in a private extended property for ids Google would reject.
pub struct GoogleStore {
    config: GoogleConfig,
    token_storage: TokenStorage,
    oauth_client: OAuthClient,
    http_client: reqwest::Client,
    /// Serializes token refreshes.
    refresh_lock: TokioMutex<()>,
}

impl GoogleStore {
    /// Creates the store and loads any persisted tokens.
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        config.validate()?;

        let token_storage = TokenStorage::new(&config.token_path);
        token_storage.load()?;

        let oauth_client = OAuthClient::new(&config)?;
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ProviderError::internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            token_storage,
            oauth_client,
            http_client,
            refresh_lock: TokioMutex::new(()),
        })
    }

    /// Runs the browser authorization flow and persists the tokens.
    pub async fn authenticate(&self) -> ProviderResult<()> {
        let tokens = self
            .oauth_client
            .authorize(&self.config.scopes, self.config.loopback_port_range)
            .await?;
        self.token_storage.set(tokens)?;
        info!("saved Google tokens to {}", self.token_storage.path().display());
        Ok(())
    }

    /// True when there are no usable tokens for the configured scopes.
    pub fn needs_reauth(&self) -> bool {
        self.token_storage.needs_reauth(&self.config.scopes)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token_storage
            .get()
            .is_some_and(|t| !t.is_expired() || t.refresh_token.is_some())
    }

    /// Returns a client with a valid access token, refreshing it if needed.
    async fn client(&self) -> ProviderResult<GoogleCalendarClient> {
        let _guard = self.refresh_lock.lock().await;

        let tokens = self.token_storage.get().ok_or_else(|| {
            ProviderError::authentication("not authenticated, run 'feedcal auth google'")
                .with_provider(PROVIDER)
        })?;

        let access_token = if tokens.is_expired() {
            let refresh_token = tokens.refresh_token.as_deref().ok_or_else(|| {
                ProviderError::authentication(
                    "access token expired and no refresh token, run 'feedcal auth google'",
                )
                .with_provider(PROVIDER)
            })?;

            debug!("refreshing expired access token");
            let response = self
                .oauth_client
                .refresh(refresh_token)
                .await
                .map_err(|e| e.with_provider(PROVIDER))?;
            self.token_storage
                .update_access_token(
                    response.access_token,
                    response.refresh_token,
                    response.expires_in,
                )?
                .access_token
        } else {
            tokens.access_token
        };

        Ok(GoogleCalendarClient::new(
            self.http_client.clone(),
            &self.config.api_base,
            access_token,
        ))
    }

    async fn find_calendar_impl(&self, name: &str) -> ProviderResult<Option<CalendarInfo>> {
        let client = self.client().await?;
        let found = client
            .list_calendars()
            .await?
            .into_iter()
            .find(|c| c.summary == name)
            .map(calendar_info);
        Ok(found)
    }

    async fn find_or_create_impl(&self, name: &str, timezone: Tz) -> ProviderResult<CalendarInfo> {
        if let Some(calendar) = self.find_calendar_impl(name).await? {
            if let Some(ref tz) = calendar.timezone
                && tz != timezone.name()
            {
                warn!(
                    "calendar '{}' uses timezone {}, expected {}",
                    name,
                    tz,
                    timezone.name()
                );
            }
            return Ok(calendar);
        }
        self.create_calendar_impl(name, timezone).await
    }

    async fn create_calendar_impl(&self, name: &str, timezone: Tz) -> ProviderResult<CalendarInfo> {
        let client = self.client().await?;
        let created = client.insert_calendar(name, timezone.name()).await?;
        info!("created calendar '{}' ({})", name, created.id);
        Ok(calendar_info(created))
    }

    async fn list_events_impl(
        &self,
        calendar_id: &str,
        horizon: &SyncHorizon,
    ) -> ProviderResult<Vec<RemoteEvent>> {
        let client = self.client().await?;
        let events = client
            .list_events(
                calendar_id,
                horizon.start().with_timezone(&Utc),
                horizon.end().with_timezone(&Utc),
            )
            .await?;

        let tz = horizon.timezone();
        Ok(events
            .into_iter()
            .filter(|e| !e.is_cancelled())
            .filter_map(|e| remote_event(e, &tz))
            // the API also returns events that merely overlap the window
            .filter(|e| horizon.contains(&e.start))
            .collect())
    }

    async fn create_event_impl(
        &self,
        calendar_id: &str,
        event: &NewRemoteEvent,
    ) -> ProviderResult<RemoteEvent> {
        let client = self.client().await?;
        let body = event_body(event);

        match client.insert_event(calendar_id, &body).await {
            Ok(created) => {
                debug!("created event {} in {}", event.external_id, calendar_id);
                converted(created, event)
            }
            Err(e) if e.code() == ProviderErrorCode::Conflict => {
                let Some(ref event_id) = body.id else {
                    return Err(e);
                };
                self.resolve_conflict(&client, calendar_id, event_id, body.clone(), event)
                    .await
            }
            Err(e) => Err(e),
        }
    }

    /// Handles an insert that hit an existing event id.
    ///
    /// A live event is returned as is. A cancelled one, which Google keeps
    /// around after deletion, is restored with the new contents.
    async fn resolve_conflict(
        &self,
        client: &GoogleCalendarClient,
        calendar_id: &str,
        event_id: &str,
        mut body: EventBody,
        event: &NewRemoteEvent,
    ) -> ProviderResult<RemoteEvent> {
        let existing = client.get_event(calendar_id, event_id).await?;
        if !existing.is_cancelled() {
            debug!("event {} already exists in {}", event_id, calendar_id);
            return converted(existing, event);
        }

        debug!("restoring cancelled event {} in {}", event_id, calendar_id);
        body.status = Some("confirmed".to_string());
        let restored = client.update_event(calendar_id, event_id, &body).await?;
        converted(restored, event)
    }

    async fn delete_event_impl(&self, calendar_id: &str, remote_id: &str) -> ProviderResult<()> {
        let client = self.client().await?;
        match client.delete_event(calendar_id, remote_id).await {
            Ok(()) => Ok(()),
            // 404 and 410 both mean the event is already gone
            Err(e) if e.is_not_found() => {
                debug!("event {} already deleted from {}", remote_id, calendar_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl CalendarStore for GoogleStore {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn find_calendar<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<CalendarInfo>>> {
        Box::pin(self.find_calendar_impl(name))
    }

    fn create_calendar<'a>(
        &'a self,
        name: &'a str,
        timezone: Tz,
    ) -> BoxFuture<'a, ProviderResult<CalendarInfo>> {
        Box::pin(self.create_calendar_impl(name, timezone))
    }

    fn find_or_create_calendar<'a>(
        &'a self,
        name: &'a str,
        timezone: Tz,
    ) -> BoxFuture<'a, ProviderResult<CalendarInfo>> {
        Box::pin(self.find_or_create_impl(name, timezone))
    }

    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        horizon: &'a SyncHorizon,
    ) -> BoxFuture<'a, ProviderResult<Vec<RemoteEvent>>> {
        Box::pin(self.list_events_impl(calendar_id, horizon))
    }

    fn create_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: &'a NewRemoteEvent,
    ) -> BoxFuture<'a, ProviderResult<RemoteEvent>> {
        Box::pin(self.create_event_impl(calendar_id, event))
    }

    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        remote_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(self.delete_event_impl(calendar_id, remote_id))
    }
}

fn calendar_info(entry: CalendarListEntry) -> CalendarInfo {
    let info = CalendarInfo::new(entry.id, entry.summary);
    match entry.time_zone {
        Some(tz) => info.with_timezone(tz),
        None => info,
    }
}

fn event_body(event: &NewRemoteEvent) -> EventBody {
    let tz = event.timezone().name().to_string();
    let boundary = |at: &DateTime<Tz>| ApiEventTime {
        date_time: Some(at.to_rfc3339()),
        time_zone: Some(tz.clone()),
        ..Default::default()
    };

    let mut extended_properties = ExtendedProperties::default();
    extended_properties
        .private
        .insert(EXTERNAL_ID_PROPERTY.to_string(), event.external_id.clone());

    EventBody {
        id: is_valid_event_id(&event.external_id).then(|| event.external_id.clone()),
        summary: event.title.clone(),
        location: event.location.clone(),
        description: event.description.clone(),
        start: boundary(&event.start),
        end: boundary(&event.end),
        extended_properties,
        status: None,
    }
}

/// Converts an API response for an event we just wrote.
fn converted(api: ApiEvent, event: &NewRemoteEvent) -> ProviderResult<RemoteEvent> {
    let tz = event.timezone();
    remote_event(api, &tz).ok_or_else(|| {
        ProviderError::invalid_response("event response has no id or start time")
            .with_provider(PROVIDER)
    })
}

/// Converts an API event, skipping ones without an id or a usable start.
///
/// Events written before the external id property existed used the source
/// id as their event id, so that is the fallback.
fn remote_event(api: ApiEvent, tz: &Tz) -> Option<RemoteEvent> {
    let id = api.id.clone()?;
    let external_id = api
        .private_property(EXTERNAL_ID_PROPERTY)
        .map(str::to_string)
        .unwrap_or_else(|| id.clone());

    let start = parse_boundary(&api.start, tz)?;
    let end = parse_boundary(&api.end, tz).unwrap_or(start);

    Some(RemoteEvent::new(
        id,
        external_id,
        api.summary.unwrap_or_default(),
        start,
        end,
    ))
}

fn parse_boundary(time: &ApiEventTime, tz: &Tz) -> Option<DateTime<Utc>> {
    if let Some(ref dt) = time.date_time {
        return DateTime::parse_from_rfc3339(dt)
            .map_err(|e| warn!("unparseable event time '{}': {}", dt, e))
            .ok()
            .map(|t| t.with_timezone(&Utc));
    }

    // all-day events start at local midnight
    let date = NaiveDate::parse_from_str(time.date.as_deref()?, "%Y-%m-%d").ok()?;
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}
