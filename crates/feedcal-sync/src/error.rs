//! Sync error types.

use feedcal_providers::ProviderError;
use thiserror::Error;

/// Result type for sync runs.
pub type SyncResult<T> = Result<T, SyncError>;

/// Failures that stop a whole sync run.
///
/// Anything scoped to a single calendar or mutation is recorded in the
/// [`RunReport`](crate::RunReport) instead.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// The event source could not be read.
    #[error("failed to fetch events: {0}")]
    Fetch(#[source] ProviderError),

    /// The source answered with no events at all.
    #[error("event feed returned no events, leaving calendars untouched")]
    EmptyFeed,

    /// The calendar store rejected the credentials.
    #[error("calendar store authentication failed: {0}")]
    Authentication(#[source] ProviderError),
}
