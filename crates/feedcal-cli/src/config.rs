//! Configuration file.
//!
//! Everything lives in one `config.toml`, by default at
//! `~/.config/feedcal/config.toml`. Every section is optional.
//!
//! Credential values (`client_id`, `client_secret`) support secret references:
//! - `pass::path/in/store`, resolved via `pass show`
//! - `env::VAR_NAME`, resolved from the environment
//! - plain text, used as-is

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use feedcal_core::{DEFAULT_TIMEZONE, Rule};
use feedcal_providers::FeedConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// The whole `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedcalConfig {
    pub feed: FeedSettings,

    pub sync: SyncSettings,

    /// Google Calendar settings.
    #[cfg(feature = "google")]
    pub google: Option<GoogleSettings>,

    /// Rules declared inline, applied after those of `sync.rules_file`.
    pub rules: Vec<Rule>,
}

/// Where source events come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub url: String,

    /// Upper bound on the records requested per run.
    pub max_rows: u32,

    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: FeedConfig::DEFAULT_URL.to_string(),
            max_rows: FeedConfig::DEFAULT_MAX_ROWS,
            timeout: FeedConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl FeedSettings {
    pub fn to_feed_config(&self) -> FeedConfig {
        FeedConfig::new(&self.url)
            .with_max_rows(self.max_rows)
            .with_timeout(Duration::from_secs(self.timeout))
    }
}

/// Sync window and rule source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// IANA zone the feed's wall-clock times are in.
    pub timezone: String,

    /// Days after today covered by the sync.
    pub horizon_days: u32,

    /// CSV file with `calendar,title,location,category,tags` columns.
    pub rules_file: Option<PathBuf>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.name().to_string(),
            horizon_days: feedcal_core::SyncHorizon::DEFAULT_DAYS,
            rules_file: None,
        }
    }
}

impl SyncSettings {
    pub fn timezone(&self) -> ClientResult<Tz> {
        self.timezone.parse::<Tz>().map_err(|_| {
            ClientError::Config(format!("unknown timezone '{}' in [sync]", self.timezone))
        })
    }
}

impl FeedcalConfig {
    /// Loads the configuration from the default path, or defaults when the
    /// file does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("feedcal")
    }

    /// Checks values that only fail at run time otherwise.
    pub fn validate(&self) -> ClientResult<()> {
        self.sync.timezone()?;

        if self.sync.horizon_days == 0 {
            return Err(ClientError::Config(
                "sync.horizon_days must be at least 1".to_string(),
            ));
        }
        if self.feed.max_rows == 0 {
            return Err(ClientError::Config(
                "feed.max_rows must be at least 1".to_string(),
            ));
        }

        for (idx, rule) in self.rules.iter().enumerate() {
            rule.validate()
                .map_err(|e| ClientError::Config(format!("rules[{}]: {}", idx, e)))?;
        }

        Ok(())
    }
}

/// Expands a leading `~/` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// GoogleSettings
// ---------------------------------------------------------------------------

/// Google Calendar store settings.
#[cfg(feature = "google")]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GoogleSettings {
    /// OAuth client ID (supports `pass::` and `env::` prefixes).
    pub client_id: Option<String>,

    /// OAuth client secret (supports `pass::` and `env::` prefixes).
    pub client_secret: Option<String>,

    /// Path to token storage.
    pub token_path: Option<PathBuf>,
}

#[cfg(feature = "google")]
impl GoogleSettings {
    /// Builds the store configuration, resolving secret references.
    pub fn to_store_config(&self) -> ClientResult<feedcal_providers::google::GoogleConfig> {
        use feedcal_providers::google::GoogleConfig;

        let credentials = self.resolve_credentials()?;
        credentials
            .validate()
            .map_err(|e| ClientError::Config(format!("invalid Google credentials: {}", e)))?;

        let mut config = GoogleConfig::new(credentials);
        if let Some(ref path) = self.token_path {
            config = config.with_token_path(expand_home(path));
        }
        Ok(config)
    }

    /// Resolves both credentials through [`crate::secret::resolve`].
    pub(crate) fn resolve_credentials(
        &self,
    ) -> ClientResult<feedcal_providers::google::OAuthCredentials> {
        use feedcal_providers::google::OAuthCredentials;

        let raw_id = self.client_id.as_deref().ok_or_else(|| {
            ClientError::Config(format!(
                "Google credentials not found. Add to {}:\n  \
                 [google]\n  \
                 client_id = \"YOUR_ID.apps.googleusercontent.com\"\n  \
                 client_secret = \"YOUR_SECRET\"\n\n  \
                 Or run: feedcal auth google --credentials-file <path>",
                FeedcalConfig::default_path().display()
            ))
        })?;
        let raw_secret = self.client_secret.as_deref().ok_or_else(|| {
            ClientError::Config("client_secret is missing from the [google] section".to_string())
        })?;

        let client_id = crate::secret::resolve(raw_id)
            .map_err(|e| ClientError::Config(format!("failed to resolve client_id: {}", e)))?;
        let client_secret = crate::secret::resolve(raw_secret)
            .map_err(|e| ClientError::Config(format!("failed to resolve client_secret: {}", e)))?;

        Ok(OAuthCredentials::new(client_id, client_secret))
    }
}
