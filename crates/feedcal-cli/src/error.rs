//! Client error types.

use std::fmt;

use feedcal_providers::ProviderError;
use feedcal_sync::SyncError;

use crate::rules::RulesError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// Store or feed error.
    Provider(ProviderError),
    /// IO error.
    Io(std::io::Error),
    /// Authentication required.
    AuthRequired(String),
    /// The rules file could not be loaded.
    Rules(RulesError),
    /// The sync run failed or finished with failed calendars.
    Sync(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Provider(err) => write!(f, "provider error: {}", err),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::AuthRequired(msg) => write!(f, "authentication required: {}", msg),
            Self::Rules(err) => write!(f, "rules error: {}", err),
            Self::Sync(msg) => write!(f, "sync failed: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Provider(err) => Some(err),
            Self::Rules(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ProviderError> for ClientError {
    fn from(err: ProviderError) -> Self {
        if err.is_auth_failure() {
            Self::AuthRequired(err.to_string())
        } else {
            Self::Provider(err)
        }
    }
}

impl From<RulesError> for ClientError {
    fn from(err: RulesError) -> Self {
        Self::Rules(err)
    }
}

impl From<SyncError> for ClientError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Authentication(e) => Self::AuthRequired(e.to_string()),
            other => Self::Sync(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_become_auth_required() {
        let err: ClientError = ProviderError::authentication("token revoked").into();
        assert!(matches!(err, ClientError::AuthRequired(_)));

        let err: ClientError = ProviderError::server("boom").into();
        assert!(matches!(err, ClientError::Provider(_)));

        let err: ClientError =
            SyncError::Authentication(ProviderError::authentication("expired")).into();
        assert!(matches!(err, ClientError::AuthRequired(_)));

        let err: ClientError = SyncError::EmptyFeed.into();
        assert_eq!(
            err.to_string(),
            "sync failed: event feed returned no events, leaving calendars untouched"
        );
    }
}
