//! Error types for the schedule import subsystem.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while importing a timetable from the records portal.
#[derive(Debug, Error, Clone)]
pub enum ImportError {
    /// The portal rejected the credentials or issued no session cookie
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The timetable page did not contain the schedule table
    #[error("Schedule table not found in portal response")]
    TableNotFound,

    /// Network/HTTP request failed
    #[error("Network error: {message}")]
    Network { message: String },

    /// Server returned an unexpected response
    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },

    /// The caller's deadline elapsed before both portal calls finished
    #[error("Import timed out after {0:?}")]
    Timeout(Duration),

    /// URL parsing/construction failed
    #[error("URL error: {message}")]
    UrlError { message: String },

    /// Circuit breaker is open due to repeated failures
    #[error("Circuit breaker open - too many recent portal failures")]
    CircuitBreakerOpen,
}

impl ImportError {
    /// Returns true if this error is potentially transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ImportError::Network { .. }
                | ImportError::Timeout(_)
                | ImportError::UnexpectedResponse { .. }
        )
    }

    /// Returns true if this error says the portal itself is failing.
    /// A caller's deadline running out does not.
    pub fn counts_against_portal(&self) -> bool {
        matches!(
            self,
            ImportError::Network { .. } | ImportError::UnexpectedResponse { .. }
        )
    }
}

impl From<reqwest::Error> for ImportError {
    fn from(err: reqwest::Error) -> Self {
        ImportError::Network {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for ImportError {
    fn from(err: url::ParseError) -> Self {
        ImportError::UrlError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_retryable_but_not_a_portal_failure() {
        let timeout = ImportError::Timeout(Duration::from_secs(1));
        assert!(timeout.is_retryable());
        assert!(!timeout.counts_against_portal());

        let network = ImportError::Network {
            message: "connection reset".to_string(),
        };
        assert!(network.counts_against_portal());
        assert!(!ImportError::TableNotFound.counts_against_portal());
    }
}
