//! Core types: source events, rules, time resolution, calendar grouping

pub mod event;
pub mod group;
pub mod rule;
pub mod time;
pub mod tracing;

pub use event::{ResolvedEvent, SourceEvent};
pub use group::{CalendarGroup, CalendarGroups, group};
pub use rule::{Rule, RuleError};
pub use time::{
    DEFAULT_TIMEZONE, SkippedEvent, SyncHorizon, TimeField, TimeParseError, resolve,
    resolve_all, resolve_event,
};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
