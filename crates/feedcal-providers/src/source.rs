//! The [`EventSource`] trait: where source events come from.

use feedcal_core::{SourceEvent, SyncHorizon};

use crate::error::ProviderResult;
use crate::store::BoxFuture;

/// A remote feed of source events.
///
/// A failed fetch is fatal to a sync run: without the full desired set, the
/// reconciler would delete everything it did not see.
pub trait EventSource: Send + Sync {
    /// Returns the source name used in logs and errors.
    fn name(&self) -> &str;

    /// Fetches the events taking place within `horizon`, in feed order.
    fn fetch_events<'a>(
        &'a self,
        horizon: &'a SyncHorizon,
    ) -> BoxFuture<'a, ProviderResult<Vec<SourceEvent>>>;
}

/// A source that serves a fixed list of events.
///
/// Used by tests and for replaying a saved feed.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    events: Vec<SourceEvent>,
}

impl StaticSource {
    pub fn new(events: Vec<SourceEvent>) -> Self {
        Self { events }
    }
}

impl EventSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_events<'a>(
        &'a self,
        _horizon: &'a SyncHorizon,
    ) -> BoxFuture<'a, ProviderResult<Vec<SourceEvent>>> {
        let events = self.events.clone();
        Box::pin(async move { Ok(events) })
    }
}
