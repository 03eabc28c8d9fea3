//! Per-calendar and per-run sync reports.

use std::fmt;

use feedcal_core::SkippedEvent;
use feedcal_providers::ProviderError;

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// The result of one create or delete call.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub kind: MutationKind,
    pub external_id: String,
    pub title: String,
    /// Set when the store call failed.
    pub error: Option<ProviderError>,
}

impl MutationOutcome {
    pub fn succeeded(kind: MutationKind, external_id: &str, title: &str) -> Self {
        Self {
            kind,
            external_id: external_id.to_string(),
            title: title.to_string(),
            error: None,
        }
    }

    pub fn failed(kind: MutationKind, external_id: &str, title: &str, error: ProviderError) -> Self {
        Self {
            error: Some(error),
            ..Self::succeeded(kind, external_id, title)
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Overall state of one calendar after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarStatus {
    Complete,
    Partial { failed: usize },
    Failed { reason: String },
}

impl fmt::Display for CalendarStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Partial { failed: 1 } => write!(f, "partial (1 failed mutation)"),
            Self::Partial { failed } => write!(f, "partial ({} failed mutations)", failed),
            Self::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// What happened to one calendar.
///
/// In a dry run `created` and `deleted` hold what would have happened and
/// `outcomes` stays empty.
#[derive(Debug, Clone, Default)]
pub struct CalendarReport {
    pub calendar: String,
    pub created: Vec<String>,
    pub kept: Vec<String>,
    pub deleted: Vec<String>,
    /// Desired events outside the horizon.
    pub skipped: Vec<String>,
    pub outcomes: Vec<MutationOutcome>,
    /// Why the calendar could not be reconciled at all.
    pub failure: Option<String>,
}

impl CalendarReport {
    pub fn new(calendar: impl Into<String>) -> Self {
        Self {
            calendar: calendar.into(),
            ..Default::default()
        }
    }

    /// Records a mutation outcome, filing successes under created/deleted.
    pub fn record(&mut self, outcome: MutationOutcome) {
        if outcome.is_success() {
            let list = match outcome.kind {
                MutationKind::Create => &mut self.created,
                MutationKind::Delete => &mut self.deleted,
            };
            list.push(outcome.external_id.clone());
        }
        self.outcomes.push(outcome);
    }

    pub fn failed_mutations(&self) -> impl Iterator<Item = &MutationOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn status(&self) -> CalendarStatus {
        if let Some(ref reason) = self.failure {
            return CalendarStatus::Failed {
                reason: reason.clone(),
            };
        }
        match self.failed_mutations().count() {
            0 => CalendarStatus::Complete,
            failed => CalendarStatus::Partial { failed },
        }
    }
}

impl fmt::Display for CalendarReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} created, {} kept, {} deleted, {} skipped ({})",
            self.calendar,
            self.created.len(),
            self.kept.len(),
            self.deleted.len(),
            self.skipped.len(),
            self.status()
        )?;
        for outcome in self.failed_mutations() {
            if let Some(ref error) = outcome.error {
                write!(
                    f,
                    "\n  failed to {} {} '{}': {}",
                    outcome.kind, outcome.external_id, outcome.title, error
                )?;
            }
        }
        Ok(())
    }
}

/// The outcome of a whole sync run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub dry_run: bool,
    /// Number of events the source returned.
    pub fetched: usize,
    /// Events dropped because their times did not resolve.
    pub unresolved: Vec<SkippedEvent>,
    /// Calendars in processing order, including the one that was being
    /// reconciled when the run was aborted.
    pub calendars: Vec<CalendarReport>,
    /// Set when a credential failure stopped the run early.
    pub aborted: Option<SyncError>,
}

impl RunReport {
    pub fn new(fetched: usize, unresolved: Vec<SkippedEvent>, dry_run: bool) -> Self {
        Self {
            dry_run,
            fetched,
            unresolved,
            ..Default::default()
        }
    }

    pub fn calendar(&self, name: &str) -> Option<&CalendarReport> {
        self.calendars.iter().find(|c| c.calendar == name)
    }

    pub fn failed_calendars(&self) -> usize {
        self.calendars
            .iter()
            .filter(|c| matches!(c.status(), CalendarStatus::Failed { .. }))
            .count()
    }

    pub fn failed_mutations(&self) -> usize {
        self.calendars
            .iter()
            .map(|c| c.failed_mutations().count())
            .sum()
    }

    /// True when nothing was aborted and every calendar was reconciled.
    /// Failed individual mutations do not count.
    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.failed_calendars() == 0
    }

    pub fn total_created(&self) -> usize {
        self.calendars.iter().map(|c| c.created.len()).sum()
    }

    pub fn total_deleted(&self) -> usize {
        self.calendars.iter().map(|c| c.deleted.len()).sum()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            write!(f, "dry run, no changes made: ")?;
        }
        write!(
            f,
            "{} events fetched, {} unresolved, {} calendars",
            self.fetched,
            self.unresolved.len(),
            self.calendars.len()
        )?;
        for calendar in &self.calendars {
            write!(f, "\n{}", calendar)?;
        }
        if let Some(ref error) = self.aborted {
            write!(f, "\naborted: {}", error)?;
        }
        Ok(())
    }
}
