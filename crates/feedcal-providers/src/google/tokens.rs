//! OAuth token persistence.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

/// Access tokens are treated as expired this long before Google says so.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// A persisted OAuth token set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Scopes granted at authorization time.
    pub scopes: Vec<String>,
    pub last_refresh: DateTime<Utc>,
}

fn expiry_from(expires_in_secs: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in_secs
        .map(|secs| Utc::now() + Duration::seconds(secs) - Duration::seconds(EXPIRY_MARGIN_SECS))
}

impl TokenInfo {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expiry_from(expires_in_secs),
            scopes,
            last_refresh: Utc::now(),
        }
    }

    /// Tokens without a known expiry are assumed valid.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Replaces the access token after a refresh.
    ///
    /// Google only returns a new refresh token occasionally; the old one is
    /// kept when none is given.
    pub fn refreshed(
        &mut self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) {
        self.access_token = access_token.into();
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.expires_at = expiry_from(expires_in_secs);
        self.last_refresh = Utc::now();
    }
}

/// File-backed token storage with an in-memory copy.
#[derive(Debug)]
pub struct TokenStorage {
    path: PathBuf,
    tokens: RwLock<Option<TokenInfo>>,
}

impl TokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tokens: RwLock::new(None),
        }
    }

    /// Loads tokens from disk. Returns `false` when there is no token file.
    pub fn load(&self) -> ProviderResult<bool> {
        if !self.path.exists() {
            debug!("no token file at {}", self.path.display());
            return Ok(false);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to read token file: {}", e))
        })?;
        let tokens: TokenInfo = serde_json::from_str(&content).map_err(|e| {
            ProviderError::configuration(format!("failed to parse token file: {}", e))
        })?;

        debug!("loaded tokens from {}", self.path.display());
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Some(tokens);
        Ok(true)
    }

    /// Writes the current tokens atomically with owner-only permissions.
    fn save(&self, tokens: &TokenInfo) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::configuration(format!("failed to create token directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(tokens)
            .map_err(|e| ProviderError::internal(format!("failed to serialize tokens: {}", e)))?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content).map_err(|e| {
            ProviderError::configuration(format!("failed to write token file: {}", e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600)).map_err(|e| {
                ProviderError::configuration(format!("failed to restrict token file: {}", e))
            })?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to replace token file: {}", e))
        })?;

        debug!("saved tokens to {}", self.path.display());
        Ok(())
    }

    pub fn get(&self) -> Option<TokenInfo> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the tokens and saves them.
    pub fn set(&self, tokens: TokenInfo) -> ProviderResult<()> {
        self.save(&tokens)?;
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Some(tokens);
        Ok(())
    }

    /// Applies a refresh response and saves the result.
    pub fn update_access_token(
        &self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> ProviderResult<TokenInfo> {
        let mut tokens = self
            .get()
            .ok_or_else(|| ProviderError::internal("no tokens to update"))?;
        tokens.refreshed(access_token, refresh_token, expires_in_secs);
        self.set(tokens.clone())?;
        Ok(tokens)
    }

    pub fn clear(&self) -> ProviderResult<()> {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = None;
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                ProviderError::configuration(format!("failed to remove token file: {}", e))
            })?;
            info!("removed tokens at {}", self.path.display());
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when no tokens are stored or they lack a required scope.
    pub fn needs_reauth(&self, required_scopes: &[String]) -> bool {
        self.get()
            .is_none_or(|tokens| !tokens.has_scopes(required_scopes))
    }
}
