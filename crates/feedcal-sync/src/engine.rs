//! The sync engine: fetch, resolve, group, then reconcile each calendar.

use std::collections::HashMap;

use feedcal_core::{CalendarGroup, Rule, SyncHorizon, group, resolve_all};
use feedcal_providers::{CalendarInfo, CalendarStore, EventSource, ProviderError};
use tracing::{debug, error, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::plan::{SyncPlan, plan};
use crate::report::{CalendarReport, MutationKind, MutationOutcome, RunReport};

/// Calendars resolved during one run, keyed by name.
///
/// `None` records a calendar that does not exist and was not created
/// because the run is a dry run.
type CalendarCache = HashMap<String, Option<CalendarInfo>>;

/// Drives one sync run from an event source into a calendar store.
///
/// Calendars are reconciled one at a time, in rule order. Each one is listed
/// once, before any of its mutations, and the resulting plan is executed
/// call by call. A failed call is recorded and the run moves on, except for
/// credential failures, which stop the run.
pub struct SyncEngine<'a> {
    source: &'a dyn EventSource,
    store: &'a dyn CalendarStore,
    dry_run: bool,
}

impl<'a> SyncEngine<'a> {
    pub fn new(source: &'a dyn EventSource, store: &'a dyn CalendarStore) -> Self {
        Self {
            source,
            store,
            dry_run: false,
        }
    }

    /// Builder method to plan without touching the store.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Runs a full sync over `horizon`.
    ///
    /// Fails only when the source cannot be read or returns nothing. Every
    /// other problem ends up in the returned report.
    pub async fn run(&self, rules: &[Rule], horizon: &SyncHorizon) -> SyncResult<RunReport> {
        info!(
            "syncing {} into {} for {}",
            self.source.name(),
            self.store.name(),
            horizon
        );

        let events = self
            .source
            .fetch_events(horizon)
            .await
            .map_err(SyncError::Fetch)?;
        if events.is_empty() {
            return Err(SyncError::EmptyFeed);
        }

        let (resolved, unresolved) = resolve_all(&events, &horizon.timezone());
        for rule in rules {
            debug!("rule for '{}': {}", rule.calendar, rule.describe());
        }
        let groups = group(&resolved, rules);
        info!(
            "{} events fetched, {} resolved, {} calendars",
            events.len(),
            resolved.len(),
            groups.len()
        );

        let mut report = RunReport::new(events.len(), unresolved, self.dry_run);
        let mut cache = CalendarCache::new();

        for calendar_group in &groups {
            let mut calendar_report = CalendarReport::new(&calendar_group.calendar);
            let result = self
                .reconcile_calendar(calendar_group, horizon, &mut cache, &mut calendar_report)
                .await;
            report.calendars.push(calendar_report);

            if let Err(e) = result {
                error!("stopping sync: {}", e);
                report.aborted = Some(SyncError::Authentication(e));
                break;
            }
        }

        Ok(report)
    }

    /// Reconciles one calendar into `report`.
    ///
    /// Returns an error only for credential failures; anything else is
    /// recorded in the report.
    async fn reconcile_calendar(
        &self,
        calendar_group: &CalendarGroup,
        horizon: &SyncHorizon,
        cache: &mut CalendarCache,
        report: &mut CalendarReport,
    ) -> Result<(), ProviderError> {
        let name = calendar_group.calendar.as_str();

        let calendar = match self.resolve_calendar(name, horizon, cache).await {
            Ok(calendar) => calendar,
            Err(e) => return fail_calendar(report, "resolve", e),
        };

        let remote = match calendar {
            Some(ref info) => match self.store.list_events(&info.id, horizon).await {
                Ok(events) => events,
                Err(e) => return fail_calendar(report, "list events of", e),
            },
            None => Vec::new(),
        };

        let plan = plan(name, calendar_group.events(), &remote, horizon);
        report.kept = plan.keep.clone();
        report.skipped = plan.skipped.clone();

        let result = match calendar {
            Some(ref info) if !self.dry_run => self.execute(&info.id, plan, report).await,
            _ => {
                preview(plan, report);
                Ok(())
            }
        };

        info!("{}", report);
        result
    }

    async fn resolve_calendar(
        &self,
        name: &str,
        horizon: &SyncHorizon,
        cache: &mut CalendarCache,
    ) -> Result<Option<CalendarInfo>, ProviderError> {
        if let Some(cached) = cache.get(name) {
            return Ok(cached.clone());
        }

        let calendar = if self.dry_run {
            let found = self.store.find_calendar(name).await?;
            if found.is_none() {
                info!("calendar '{}' does not exist, would create it", name);
            }
            found
        } else {
            Some(
                self.store
                    .find_or_create_calendar(name, horizon.timezone())
                    .await?,
            )
        };

        cache.insert(name.to_string(), calendar.clone());
        Ok(calendar)
    }

    /// Executes a plan, creates first.
    ///
    /// Stops at the first credential failure and returns it.
    async fn execute(
        &self,
        calendar_id: &str,
        plan: SyncPlan,
        report: &mut CalendarReport,
    ) -> Result<(), ProviderError> {
        for event in &plan.create {
            let result = self
                .store
                .create_event(calendar_id, event)
                .await
                .map(|created| debug!("{} stored as {}", event.external_id, created.remote_id));
            let outcome = to_outcome(MutationKind::Create, &event.external_id, &event.title, result);
            record(report, outcome)?;
        }

        for event in &plan.delete {
            let result = self.store.delete_event(calendar_id, &event.remote_id).await;
            let outcome = to_outcome(MutationKind::Delete, &event.external_id, &event.title, result);
            record(report, outcome)?;
        }

        Ok(())
    }
}

fn to_outcome(
    kind: MutationKind,
    external_id: &str,
    title: &str,
    result: Result<(), ProviderError>,
) -> MutationOutcome {
    match result {
        Ok(()) => MutationOutcome::succeeded(kind, external_id, title),
        Err(e) => MutationOutcome::failed(kind, external_id, title, e),
    }
}

/// Logs and records an outcome, returning credential failures.
fn record(report: &mut CalendarReport, outcome: MutationOutcome) -> Result<(), ProviderError> {
    let abort = match outcome.error {
        None => {
            info!(
                "{} '{}' ({}) in {}",
                outcome.kind, outcome.title, outcome.external_id, report.calendar
            );
            None
        }
        Some(ref e) => {
            warn!(
                "failed to {} {} in {}: {}",
                outcome.kind, outcome.external_id, report.calendar, e
            );
            e.is_auth_failure().then(|| e.clone())
        }
    };
    report.record(outcome);
    abort.map_or(Ok(()), Err)
}

/// Fills the report with what a plan would do, without outcomes.
fn preview(plan: SyncPlan, report: &mut CalendarReport) {
    for event in &plan.create {
        info!("would create '{}' ({}) in {}", event.title, event.external_id, plan.calendar);
    }
    for event in &plan.delete {
        info!("would delete '{}' ({}) from {}", event.title, event.external_id, plan.calendar);
    }
    report.created = plan.create.into_iter().map(|e| e.external_id).collect();
    report.deleted = plan.delete.into_iter().map(|e| e.external_id).collect();
}

/// Marks the calendar failed, or passes a credential failure up.
fn fail_calendar(
    report: &mut CalendarReport,
    action: &str,
    error: ProviderError,
) -> Result<(), ProviderError> {
    report.failure = Some(error.to_string());
    if error.is_auth_failure() {
        return Err(error);
    }
    warn!("failed to {} calendar '{}': {}", action, report.calendar, error);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use feedcal_core::SourceEvent;
    use feedcal_providers::{InMemoryStore, StaticSource};

    fn horizon() -> SyncHorizon {
        SyncHorizon::new(
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            14,
            chrono_tz::America::New_York,
        )
    }

    #[tokio::test]
    async fn empty_feed_aborts_before_touching_the_store() {
        let source = StaticSource::new(Vec::new());
        let store = InMemoryStore::new();
        let rules = vec![Rule::new("music")];

        let err = SyncEngine::new(&source, &store)
            .run(&rules, &horizon())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::EmptyFeed));
        assert_eq!(store.calls(), Default::default());
    }

    #[tokio::test]
    async fn calendar_cache_avoids_second_lookup() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 2).unwrap();
        let source = StaticSource::new(vec![SourceEvent::new("1", "A", date, "5:00 PM", "6:00 PM")]);
        let store = InMemoryStore::new();
        let engine = SyncEngine::new(&source, &store);
        let mut cache = CalendarCache::new();

        let first = engine.resolve_calendar("music", &horizon(), &mut cache).await.unwrap();
        let second = engine.resolve_calendar("music", &horizon(), &mut cache).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.calls().find_calendar, 1);
        assert_eq!(store.calls().create_calendar, 1);
    }
}
