//! Error types shared by event sources and calendar stores.

use std::fmt;
use thiserror::Error;

/// The category of a provider error.
///
/// Drives the sync engine's policy: authentication and authorization
/// failures stop the whole run, everything else is scoped to the item or
/// calendar being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Credentials are missing, invalid or expired.
    AuthenticationFailed,
    /// The credentials lack permission for the operation.
    AuthorizationFailed,
    /// Connection failure, timeout, DNS resolution.
    NetworkError,
    /// Too many requests.
    RateLimited,
    /// 5xx responses.
    ServerError,
    /// The response body could not be understood.
    InvalidResponse,
    NotFound,
    /// The request was rejected as malformed (400).
    BadRequest,
    /// The request conflicts with existing state (409).
    Conflict,
    ConfigurationError,
    /// Calendar-level failure, e.g. a calendar that cannot be created.
    CalendarError,
    InternalError,
}

impl ProviderErrorCode {
    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError
        )
    }

    /// Returns true for credential failures, which no other calendar in the
    /// same run can recover from.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed | Self::AuthorizationFailed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::Conflict => "conflict",
            Self::ConfigurationError => "configuration_error",
            Self::CalendarError => "calendar_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised by an event source or a calendar store.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// The backend that raised the error, e.g. `"feed"` or `"google"`.
    provider: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            source: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthorizationFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::BadRequest, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Conflict, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    pub fn calendar(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::CalendarError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Maps a non-success HTTP status to an error.
    ///
    /// `body` is appended to the message for statuses without a dedicated
    /// code, where it usually carries the server's explanation. A 403 whose
    /// body names a quota reason is a rate limit, not an authorization
    /// failure.
    pub fn from_status(status: u16, context: &str, body: &str) -> Self {
        match status {
            401 => Self::authentication(format!("{context}: access token expired or invalid")),
            403 if error_reasons(body).iter().any(|r| QUOTA_REASONS.contains(&r.as_str())) => {
                Self::rate_limited(format!("{context}: quota exceeded: {}", body.trim()))
            }
            403 => Self::authorization(format!("{context}: access denied: {}", body.trim())),
            404 | 410 => Self::not_found(format!("{context}: not found")),
            409 => Self::conflict(format!("{context}: already exists")),
            429 => Self::rate_limited(format!("{context}: rate limit exceeded")),
            400 => Self::bad_request(format!("{context}: {body}")),
            s if s >= 500 => Self::server(format!("{context}: server error ({s}): {body}")),
            s => Self::invalid_response(format!("{context}: unexpected status ({s}): {body}")),
        }
    }

    /// Builder method to set the provider name.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Builder method to attach the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn is_auth_failure(&self) -> bool {
        self.code.is_auth_failure()
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ProviderErrorCode::NotFound
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Clone for ProviderError {
    /// The source chain is not cloneable and is dropped.
    fn clone(&self) -> Self {
        Self {
            code: self.code,
            message: self.message.clone(),
            provider: self.provider.clone(),
            source: None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            "request timeout".to_string()
        } else if e.is_connect() {
            format!("connection failed: {}", e)
        } else if e.is_decode() {
            return Self::invalid_response(format!("failed to decode response: {}", e))
                .with_source(e);
        } else {
            format!("request failed: {}", e)
        };
        Self::network(message).with_source(e)
    }
}

/// 403 reasons that mean "slow down" rather than "not allowed".
const QUOTA_REASONS: [&str; 4] = [
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "quotaExceeded",
    "dailyLimitExceeded",
];

/// Extracts `error.errors[].reason` from a Google-style error body.
fn error_reasons(body: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return Vec::new();
    };
    value
        .pointer("/error/errors")
        .and_then(serde_json::Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e.get("reason").and_then(serde_json::Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
