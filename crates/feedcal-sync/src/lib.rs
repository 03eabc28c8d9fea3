//! Reconciliation of a source feed against managed calendars.
//!
//! [`plan`] is the pure diff for one calendar; [`SyncEngine`] runs the whole
//! pipeline and executes the plans against a
//! [`CalendarStore`](feedcal_providers::CalendarStore), producing a
//! [`RunReport`].

pub mod engine;
pub mod error;
pub mod plan;
pub mod report;

pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use plan::{SyncPlan, plan};
pub use report::{CalendarReport, CalendarStatus, MutationKind, MutationOutcome, RunReport};
