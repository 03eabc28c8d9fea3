//! Time resolution for source events.
//!
//! The feed delivers each event as a calendar date plus two 12-hour clock
//! strings. This module turns them into timezone-aware instants in a fixed
//! zone ([`resolve`], [`resolve_event`], [`resolve_all`]) and defines the
//! [`SyncHorizon`], the forward-looking window reconciliation works in.
//!
//! The zone is always passed explicitly; nothing here reads the process's
//! local timezone.

use std::fmt;

use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::warn;

use crate::event::{ResolvedEvent, SourceEvent};

/// The zone source event times are expressed in unless configured otherwise.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::New_York;

/// The clock format used by the feed, e.g. `"5:00 AM"`.
const TIME_FORMAT: &str = "%I:%M %p";

/// Which of the two time fields failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    Start,
    End,
}

impl fmt::Display for TimeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::End => write!(f, "end"),
        }
    }
}

/// Errors raised while resolving an event's times.
///
/// None of these abort a sync run: the affected event is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    /// The text is not a 12-hour clock time.
    #[error("invalid {field} time '{text}': expected a 12-hour time such as '5:00 PM'")]
    InvalidTime { field: TimeField, text: String },

    /// The local time falls in a daylight-saving gap.
    #[error("local time {local} does not exist in {tz}")]
    NonexistentLocalTime { local: NaiveDateTime, tz: Tz },

    /// The local time occurs twice because of a daylight-saving overlap.
    #[error("local time {local} is ambiguous in {tz}")]
    AmbiguousLocalTime { local: NaiveDateTime, tz: Tz },
}

/// Parses a 12-hour clock string such as `"5:00 AM"` or `" 12:30 pm "`.
pub fn parse_clock_time(text: &str, field: TimeField) -> Result<NaiveTime, TimeParseError> {
    NaiveTime::parse_from_str(text.trim(), TIME_FORMAT).map_err(|_| {
        TimeParseError::InvalidTime {
            field,
            text: text.to_string(),
        }
    })
}

/// Resolves a date and two clock strings into instants in `tz`.
///
/// - An empty `end_text` means the event ends when it starts.
/// - An end time earlier than the start time is placed on the next day.
/// - Local times that do not exist or are ambiguous in `tz` are rejected.
pub fn resolve(
    date: NaiveDate,
    start_text: &str,
    end_text: &str,
    tz: &Tz,
) -> Result<(DateTime<Tz>, DateTime<Tz>), TimeParseError> {
    let start_time = parse_clock_time(start_text, TimeField::Start)?;
    let end_time = if end_text.trim().is_empty() {
        start_time
    } else {
        parse_clock_time(end_text, TimeField::End)?
    };

    let start_local = date.and_time(start_time);
    let mut end_local = date.and_time(end_time);
    if end_local < start_local {
        end_local = end_local + Days::new(1);
    }

    Ok((localize(start_local, tz)?, localize(end_local, tz)?))
}

/// Resolves the times of a single source event.
pub fn resolve_event(event: &SourceEvent, tz: &Tz) -> Result<ResolvedEvent, TimeParseError> {
    let (start, end) = resolve(
        event.date,
        &event.start_time_text,
        &event.end_time_text,
        tz,
    )?;

    Ok(ResolvedEvent {
        source: event.clone(),
        start,
        end,
    })
}

/// An event dropped because its times could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEvent {
    pub id: String,
    pub title: String,
    pub error: TimeParseError,
}

/// Resolves a batch of events, preserving fetch order.
///
/// Events that fail to resolve are logged and returned separately; they take
/// no further part in matching or grouping.
pub fn resolve_all(events: &[SourceEvent], tz: &Tz) -> (Vec<ResolvedEvent>, Vec<SkippedEvent>) {
    let mut resolved = Vec::with_capacity(events.len());
    let mut skipped = Vec::new();

    for event in events {
        match resolve_event(event, tz) {
            Ok(r) => resolved.push(r),
            Err(error) => {
                warn!(id = %event.id, title = %event.title, "skipping event: {}", error);
                skipped.push(SkippedEvent {
                    id: event.id.clone(),
                    title: event.title.clone(),
                    error,
                });
            }
        }
    }

    (resolved, skipped)
}

fn localize(local: NaiveDateTime, tz: &Tz) -> Result<DateTime<Tz>, TimeParseError> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(_, _) => Err(TimeParseError::AmbiguousLocalTime { local, tz: *tz }),
        LocalResult::None => Err(TimeParseError::NonexistentLocalTime { local, tz: *tz }),
    }
}

/// Returns the first instant of `date` in `tz`.
fn start_of_day(date: NaiveDate, tz: &Tz) -> DateTime<Tz> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
}

/// The forward-looking window reconciliation is authoritative for.
///
/// Covers whole calendar days: from the start of `first_day` up to, but not
/// including, the start of the day after `last_day`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncHorizon {
    tz: Tz,
    first_day: NaiveDate,
    last_day: NaiveDate,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
}

impl SyncHorizon {
    /// Default number of days after today covered by the horizon.
    pub const DEFAULT_DAYS: u32 = 14;

    /// Creates a horizon covering `first_day` and the `days` days after it.
    pub fn new(first_day: NaiveDate, days: u32, tz: Tz) -> Self {
        let last_day = first_day + Days::new(u64::from(days));
        let start = start_of_day(first_day, &tz);
        let end = start_of_day(last_day + Days::new(1), &tz);
        Self {
            tz,
            first_day,
            last_day,
            start,
            end,
        }
    }

    /// Creates a horizon starting today, where "today" is taken in `tz`.
    pub fn starting_today(days: u32, tz: Tz) -> Self {
        Self::starting_on_day_of(Utc::now(), days, tz)
    }

    /// Creates a horizon starting on the day `now` falls on in `tz`.
    pub fn starting_on_day_of(now: DateTime<Utc>, days: u32, tz: Tz) -> Self {
        let today = now.with_timezone(&tz).date_naive();
        Self::new(today, days, tz)
    }

    /// Returns the zone the horizon is expressed in.
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Returns the first calendar day covered.
    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    /// Returns the last calendar day covered.
    pub fn last_day(&self) -> NaiveDate {
        self.last_day
    }

    /// Returns the inclusive start instant.
    pub fn start(&self) -> DateTime<Tz> {
        self.start
    }

    /// Returns the exclusive end instant.
    pub fn end(&self) -> DateTime<Tz> {
        self.end
    }

    /// Checks whether an instant falls inside the horizon: `[start, end)`.
    pub fn contains<Z: TimeZone>(&self, instant: &DateTime<Z>) -> bool {
        let instant = instant.with_timezone(&Utc);
        self.start.with_timezone(&Utc) <= instant && instant < self.end.with_timezone(&Utc)
    }
}

impl fmt::Display for SyncHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {} ({})", self.first_day, self.last_day, self.tz)
    }
}
