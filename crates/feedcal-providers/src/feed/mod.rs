//! HTTP event feed source.
//!
//! Fetches the paged event list endpoint in a single request covering the
//! whole sync horizon and decodes its `{"data": [...]}` envelope.

mod record;

use std::time::Duration;

use feedcal_core::{SourceEvent, SyncHorizon};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ProviderError, ProviderResult};
use crate::source::EventSource;
use crate::store::BoxFuture;

pub use record::{FeedRecord, FeedTag, RecordError, RecordId};

use record::FeedResponse;

const PROVIDER: &str = "feed";

/// Configuration for [`HttpFeedSource`].
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// The event list endpoint, without query string.
    pub url: String,
    /// Upper bound on the number of records requested.
    pub max_rows: u32,
    pub timeout: Duration,
    pub user_agent: String,
}

impl FeedConfig {
    pub const DEFAULT_URL: &'static str = "https://api.thevillages.com/cc3/Api/EventList";
    pub const DEFAULT_MAX_ROWS: u32 = 20_000;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// The endpoint wants a query id even when no saved query is used.
    const NULL_QUERY_ID: &'static str = "00000000000000000000000000";

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_rows: Self::DEFAULT_MAX_ROWS,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("feedcal/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Builder method to set the row limit.
    pub fn with_max_rows(mut self, max_rows: u32) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Builder method to set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the request URL for the days covered by `horizon`.
    pub fn request_url(&self, horizon: &SyncHorizon) -> ProviderResult<Url> {
        let mut url = Url::parse(&self.url).map_err(|e| {
            ProviderError::configuration(format!("invalid feed url '{}': {}", self.url, e))
        })?;

        url.query_pairs_mut()
            .append_pair("type_id", "0")
            .append_pair("date_filter", "99")
            .append_pair("tag_ids", "")
            .append_pair("searchtext", "")
            .append_pair("end_date", &horizon.last_day().format("%Y-%m-%d").to_string())
            .append_pair(
                "start_date",
                &horizon.first_day().format("%Y-%m-%d").to_string(),
            )
            .append_pair("start_row", "0")
            .append_pair("end_row", &self.max_rows.to_string())
            .append_pair("query_id", Self::NULL_QUERY_ID);

        Ok(url)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_URL)
    }
}

/// Event source backed by the HTTP event list endpoint.
#[derive(Debug)]
pub struct HttpFeedSource {
    config: FeedConfig,
    http_client: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new(config: FeedConfig) -> ProviderResult<Self> {
        // fail early on a bad url rather than at the first fetch
        Url::parse(&config.url).map_err(|e| {
            ProviderError::configuration(format!("invalid feed url '{}': {}", config.url, e))
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    async fn fetch(&self, horizon: &SyncHorizon) -> ProviderResult<Vec<SourceEvent>> {
        let url = self.config.request_url(horizon)?;
        debug!("fetching feed: {}", url);

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::from(e).with_provider(PROVIDER))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(
                ProviderError::from_status(status.as_u16(), "fetch events", &body)
                    .with_provider(PROVIDER),
            );
        }

        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response: {}", e))
                .with_provider(PROVIDER)
        })?;

        let events = decode_feed(&body)?;
        info!(
            "fetched {} events for {} to {}",
            events.len(),
            horizon.first_day(),
            horizon.last_day()
        );
        Ok(events)
    }
}

impl EventSource for HttpFeedSource {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn fetch_events<'a>(
        &'a self,
        horizon: &'a SyncHorizon,
    ) -> BoxFuture<'a, ProviderResult<Vec<SourceEvent>>> {
        Box::pin(self.fetch(horizon))
    }
}

/// Decodes a feed response body, skipping records that do not convert.
pub fn decode_feed(body: &str) -> ProviderResult<Vec<SourceEvent>> {
    let response: FeedResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response(format!("failed to parse feed: {}", e))
            .with_provider(PROVIDER)
    })?;

    let records = response.data.unwrap_or_default();
    let mut events = Vec::with_capacity(records.len());

    for (index, value) in records.into_iter().enumerate() {
        match FeedRecord::from_value(value).and_then(FeedRecord::into_source_event) {
            Ok(event) => events.push(event),
            Err(e) => warn!(index, "skipping feed record: {}", e),
        }
    }

    Ok(events)
}
