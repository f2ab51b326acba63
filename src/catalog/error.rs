//! Typed errors for catalog and credential calls.

use crate::config::RATE_LIMIT_SLEEP_MS;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP 429, with the server's Retry-After when it sent one
    #[error("Rate limited by the catalog")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl CatalogError {
    /// Errors worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CatalogError::Network(_)
                | CatalogError::RateLimited { .. }
                | CatalogError::Server { .. }
        )
    }

    /// The request was turned away before the service acted on it.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CatalogError::RateLimited { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CatalogError::RateLimited { retry_after_secs } => Some(
                retry_after_secs
                    .map(Duration::from_secs)
                    .unwrap_or(Duration::from_millis(RATE_LIMIT_SLEEP_MS)),
            ),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            CatalogError::Parse(e.to_string())
        } else {
            CatalogError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        CatalogError::Parse(e.to_string())
    }
}

#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum AuthError {
    #[error("No refresh token stored for user {0}")]
    MissingRefreshToken(String),

    #[error("Token refresh rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AuthError::InvalidResponse(e.to_string())
        } else {
            AuthError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CatalogError::Network("reset".into()).is_transient());
        assert!(CatalogError::RateLimited {
            retry_after_secs: None
        }
        .is_transient());
        assert!(CatalogError::Server {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(!CatalogError::Unauthorized("expired".into()).is_transient());
        assert!(!CatalogError::NotFound("track".into()).is_transient());
        assert!(!CatalogError::Parse("eof".into()).is_transient());
    }

    #[test]
    fn test_only_429_counts_as_rate_limited() {
        assert!(CatalogError::RateLimited {
            retry_after_secs: Some(1)
        }
        .is_rate_limited());
        assert!(!CatalogError::Network("timed out".into()).is_rate_limited());
        assert!(!CatalogError::Server {
            status: 500,
            message: String::new()
        }
        .is_rate_limited());
    }

    #[test]
    fn test_retry_after_only_on_rate_limit() {
        let limited = CatalogError::RateLimited {
            retry_after_secs: Some(3),
        };
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(
            CatalogError::RateLimited {
                retry_after_secs: None
            }
            .retry_after(),
            Some(Duration::from_millis(RATE_LIMIT_SLEEP_MS))
        );
        assert_eq!(CatalogError::Network("x".into()).retry_after(), None);
    }
}
