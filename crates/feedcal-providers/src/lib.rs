//! Event sources and calendar stores.
//!
//! - [`EventSource`] - where source events come from ([`HttpFeedSource`],
//!   [`StaticSource`])
//! - [`CalendarStore`] - the destination calendars ([`InMemoryStore`] and,
//!   with the `google` feature, [`google::GoogleStore`])
//! - [`ProviderError`] - the error type shared by both
//!
//! ```text
//! ┌─────────────────┐                 ┌─────────────────┐
//! │   Event feed    │                 │ Google Calendar │
//! └────────┬────────┘                 └────────▲────────┘
//!          │                                   │
//!          ▼                                   │
//! ┌─────────────────┐                 ┌────────┴────────┐
//! │ HttpFeedSource  │                 │   GoogleStore   │
//! └────────┬────────┘                 └────────▲────────┘
//!          │ EventSource         CalendarStore │
//!          └──────────────► sync ──────────────┘
//! ```

pub mod error;
pub mod feed;
#[cfg(feature = "google")]
pub mod google;
pub mod memory;
pub mod source;
pub mod store;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use feed::{FeedConfig, HttpFeedSource, decode_feed};
pub use memory::{InMemoryStore, StoreCalls};
pub use source::{EventSource, StaticSource};
pub use store::{BoxFuture, CalendarInfo, CalendarStore, NewRemoteEvent, RemoteEvent, UNTITLED_EVENT};
