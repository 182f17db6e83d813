//! # Lookup Error Types
//!
//! Error types for configuration and product directory access.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Lookup Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Transport    │  │       Response          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  RequestFailed  │  │  UnexpectedStatus       │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  InvalidResponse        │ │
//! │  │  ConfigLoad/Save│  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  None of these reach the caller of `classify`: directory failures are  │
//! │  logged and degrade to the "not found" record.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use provenance_core::{CoreError, ValidationError};
use thiserror::Error;

/// Result type alias for lookup operations.
pub type LookupResult<T> = Result<T, LookupError>;

/// Everything that can go wrong while configuring or querying lookups.
#[derive(Debug, Error)]
pub enum LookupError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid lookup configuration.
    #[error("Invalid lookup configuration: {0}")]
    InvalidConfig(String),

    /// Invalid directory URL.
    #[error("Invalid directory URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// Keyword or table data rejected by the core rules.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The HTTP request could not be completed.
    #[error("Directory request failed: {0}")]
    RequestFailed(String),

    /// The configured timeout elapsed.
    #[error("Directory request timed out")]
    Timeout,

    // =========================================================================
    // Response Errors
    // =========================================================================
    /// The directory answered with a non-success HTTP status.
    #[error("Directory returned HTTP {0}")]
    UnexpectedStatus(u16),

    /// The body was not the JSON document we expect.
    #[error("Invalid directory response: {0}")]
    InvalidResponse(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for LookupError {
    fn from(err: ValidationError) -> Self {
        LookupError::InvalidConfig(err.to_string())
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LookupError::Timeout
        } else if err.is_decode() {
            LookupError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            LookupError::UnexpectedStatus(status.as_u16())
        } else {
            LookupError::RequestFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LookupError {
    fn from(err: serde_json::Error) -> Self {
        LookupError::InvalidResponse(err.to_string())
    }
}

impl From<url::ParseError> for LookupError {
    fn from(err: url::ParseError) -> Self {
        LookupError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for LookupError {
    fn from(err: std::io::Error) -> Self {
        LookupError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for LookupError {
    fn from(err: toml::de::Error) -> Self {
        LookupError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for LookupError {
    fn from(err: toml::ser::Error) -> Self {
        LookupError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl LookupError {
    /// Returns true if a later attempt might succeed.
    ///
    /// ## Retryable Errors
    /// - Connection failures
    /// - Timeouts
    /// - 5xx responses
    pub fn is_retryable(&self) -> bool {
        match self {
            LookupError::RequestFailed(_) | LookupError::Timeout => true,
            LookupError::UnexpectedStatus(code) => *code >= 500,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            LookupError::InvalidConfig(_)
                | LookupError::InvalidUrl(_)
                | LookupError::ConfigLoadFailed(_)
                | LookupError::ConfigSaveFailed(_)
                | LookupError::Core(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(LookupError::RequestFailed("refused".into()).is_retryable());
        assert!(LookupError::Timeout.is_retryable());
        assert!(LookupError::UnexpectedStatus(503).is_retryable());

        assert!(!LookupError::UnexpectedStatus(404).is_retryable());
        assert!(!LookupError::InvalidResponse("not json".into()).is_retryable());
        assert!(!LookupError::InvalidConfig("bad".into()).is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(LookupError::InvalidUrl("ftp://x".into()).is_config_error());
        let err: LookupError = ValidationError::Required {
            field: "products.name".into(),
        }
        .into();
        assert!(err.is_config_error());
        assert!(!LookupError::Timeout.is_config_error());
    }

    #[test]
    fn test_url_parse_error_converts() {
        let err: LookupError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, LookupError::InvalidUrl(_)));
    }
}
