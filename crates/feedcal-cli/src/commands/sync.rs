//! The `sync` command.

use std::path::{Path, PathBuf};

use feedcal_core::SyncHorizon;
use feedcal_providers::{CalendarStore, HttpFeedSource, InMemoryStore};
use feedcal_sync::{RunReport, SyncEngine};
use tracing::{info, warn};

use crate::config::FeedcalConfig;
use crate::error::{ClientError, ClientResult};

/// Flags of `feedcal sync`.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub dry_run: bool,
    pub offline: bool,
    pub rules: Option<PathBuf>,
    pub days: Option<u32>,
}

/// Runs one sync and prints its report.
///
/// Fails when the run could not start, was aborted, or left a calendar
/// unreconciled. Failed individual mutations are only reported.
pub async fn run(config: &FeedcalConfig, config_path: &Path, options: SyncOptions) -> ClientResult<()> {
    config.validate()?;

    let loaded = super::rules::collect(config, config_path, options.rules.as_deref())?;
    if !loaded.skipped.is_empty() {
        warn!("{} rule rows skipped", loaded.skipped.len());
    }

    let days = options.days.unwrap_or(config.sync.horizon_days);
    if days == 0 {
        return Err(ClientError::Config("--days must be at least 1".to_string()));
    }
    let horizon = SyncHorizon::starting_today(days, config.sync.timezone()?);

    let source = HttpFeedSource::new(config.feed.to_feed_config())?;
    let store = open_store(config, options.offline)?;

    let engine = SyncEngine::new(&source, store.as_ref()).with_dry_run(options.dry_run);
    let report = engine.run(&loaded.rules, &horizon).await?;

    println!("{}", report);
    for skipped in &report.unresolved {
        info!("unresolved event {} '{}': {}", skipped.id, skipped.title, skipped.error);
    }

    outcome(report)
}

fn open_store(config: &FeedcalConfig, offline: bool) -> ClientResult<Box<dyn CalendarStore>> {
    if offline {
        info!("planning against an empty in-memory calendar store");
        return Ok(Box::new(InMemoryStore::new()));
    }
    open_google_store(config)
}

#[cfg(feature = "google")]
fn open_google_store(config: &FeedcalConfig) -> ClientResult<Box<dyn CalendarStore>> {
    use feedcal_providers::google::GoogleStore;

    let settings = config.google.clone().unwrap_or_default();
    let store = GoogleStore::new(settings.to_store_config()?)?;
    if store.needs_reauth() {
        return Err(ClientError::AuthRequired(
            "no usable Google tokens. Run: feedcal auth google".to_string(),
        ));
    }
    Ok(Box::new(store))
}

#[cfg(not(feature = "google"))]
fn open_google_store(_config: &FeedcalConfig) -> ClientResult<Box<dyn CalendarStore>> {
    Err(ClientError::Config(
        "built without a calendar store. Use --dry-run --offline".to_string(),
    ))
}

/// Maps a finished run to the command result.
fn outcome(report: RunReport) -> ClientResult<()> {
    if let Some(aborted) = report.aborted {
        return Err(aborted.into());
    }
    match report.failed_calendars() {
        0 => Ok(()),
        1 => Err(ClientError::Sync("1 calendar could not be reconciled".to_string())),
        n => Err(ClientError::Sync(format!("{} calendars could not be reconciled", n))),
    }
}
