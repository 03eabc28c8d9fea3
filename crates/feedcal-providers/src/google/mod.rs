//! Google Calendar store.
//!
//! Writes events through the Calendar API v3. Authorization uses the OAuth
//! 2.0 PKCE flow with a loopback redirect; tokens are persisted and
//! refreshed automatically.
//!
//! Google requires every application to bring its own OAuth client, so the
//! client id and secret always come from the user's configuration.
//!
//! # Example
//!
//! ```ignore
//! use feedcal_providers::google::{GoogleConfig, GoogleStore, OAuthCredentials};
//!
//! let credentials = OAuthCredentials::new(
//!     "your-client-id.apps.googleusercontent.com",
//!     "your-client-secret",
//! );
//! let store = GoogleStore::new(GoogleConfig::new(credentials))?;
//!
//! if store.needs_reauth() {
//!     store.authenticate().await?;
//! }
//! ```

mod client;
mod config;
mod oauth;
mod store;
mod tokens;

pub(crate) const PROVIDER: &str = "google";

pub use client::{ApiEvent, ApiEventTime, CalendarListEntry, GoogleCalendarClient};
pub use config::{GoogleConfig, OAuthCredentials};
pub use oauth::{OAuthClient, PkceFlow};
pub use store::{EXTERNAL_ID_PROPERTY, GoogleStore, is_valid_event_id};
pub use tokens::{TokenInfo, TokenStorage};
