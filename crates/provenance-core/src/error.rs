//! # Error Types
//!
//! Domain-specific error types for provenance-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  provenance-core errors (this file)                                    │
//! │  ├── ErrorKind        - Closed taxonomy shown to the user              │
//! │  ├── CaptureError     - ErrorKind + message + embedded flag            │
//! │  ├── CoreError        - Programming / state machine errors             │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  provenance-lookup errors (separate crate)                             │
//! │  └── LookupError      - Config / HTTP / decode failures                │
//! │                                                                         │
//! │  Flow: platform failure → ErrorKind → CaptureError → UI message        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Platform exceptions never leak past the backend; they are classified
//!    into [`ErrorKind`] first
//! 2. Every kind has exactly one user-facing message (two for denial,
//!    depending on whether the app runs inside another page's frame)
//! 3. Every kind is recoverable

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Error Kind
// =============================================================================

/// Closed set of failure kinds the scanner can report.
///
/// ## Platform Mapping
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Platform error name                    ErrorKind                       │
/// │  ─────────────────────────────────────  ──────────────────────          │
/// │  NotAllowedError, PermissionDeniedError PermissionDenied                │
/// │  NotFoundError, DevicesNotFoundError,   NoCameraFound                   │
/// │  OverconstrainedError                                                   │
/// │  SecurityError                          InsecureOrBlocked               │
/// │  NotSupportedError, TypeError           UnsupportedBrowser              │
/// │  anything else                          Unknown                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The user (or a policy) refused camera access.
    PermissionDenied,
    /// No video input device exists.
    NoCameraFound,
    /// The context is not secure, or a policy blocks the camera.
    InsecureOrBlocked,
    /// The platform has no camera API at all.
    UnsupportedBrowser,
    /// A still image contained no readable barcode.
    DecodeFailed,
    /// The product lookup itself failed.
    LookupFailed,
    /// Anything we could not classify.
    Unknown,
}

impl ErrorKind {
    /// Classifies a platform error by its name.
    ///
    /// Matching is exact on the well-known names and falls back to
    /// [`ErrorKind::Unknown`].
    pub fn from_platform_name(name: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" => ErrorKind::PermissionDenied,
            "NotFoundError"
            | "DevicesNotFoundError"
            | "OverconstrainedError"
            | "ConstraintNotSatisfiedError" => ErrorKind::NoCameraFound,
            "SecurityError" => ErrorKind::InsecureOrBlocked,
            "NotSupportedError" | "TypeError" => ErrorKind::UnsupportedBrowser,
            _ => ErrorKind::Unknown,
        }
    }

    /// Returns the user-facing message for this kind.
    ///
    /// `embedded` is true when the app runs inside another page's frame;
    /// those contexts frequently block the camera without prompting.
    pub fn message(self, embedded: bool) -> &'static str {
        match self {
            ErrorKind::PermissionDenied if embedded => {
                "Camera access is blocked in this embedded view. Open the scanner in a new tab and allow camera access."
            }
            ErrorKind::PermissionDenied => {
                "Camera permission denied. Allow camera access and try again."
            }
            ErrorKind::NoCameraFound => "No camera found on this device.",
            ErrorKind::InsecureOrBlocked => {
                "Camera access is blocked. The scanner must be served over HTTPS or from localhost."
            }
            ErrorKind::UnsupportedBrowser => {
                "Camera capture is not supported here. Try a different browser or upload a photo of the barcode."
            }
            ErrorKind::DecodeFailed => {
                "Could not read a barcode from that image. Try a sharper, well-lit photo."
            }
            ErrorKind::LookupFailed => "Failed to lookup product. Please try again.",
            ErrorKind::Unknown => "Camera access denied or not available",
        }
    }

    /// Returns true for kinds raised by the camera path.
    pub fn is_camera_error(self) -> bool {
        matches!(
            self,
            ErrorKind::PermissionDenied
                | ErrorKind::NoCameraFound
                | ErrorKind::InsecureOrBlocked
                | ErrorKind::UnsupportedBrowser
                | ErrorKind::Unknown
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::NoCameraFound => "no_camera_found",
            ErrorKind::InsecureOrBlocked => "insecure_or_blocked",
            ErrorKind::UnsupportedBrowser => "unsupported_browser",
            ErrorKind::DecodeFailed => "decode_failed",
            ErrorKind::LookupFailed => "lookup_failed",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Capture Error
// =============================================================================

/// A classified, user-presentable scanner error.
///
/// ## User Workflow
/// ```text
/// Start Scanning
///      │
///      ▼
/// Camera request fails (NotAllowedError)
///      │
///      ▼
/// CaptureError { kind: PermissionDenied, embedded: true, .. }
///      │
///      ▼
/// UI shows message + [Try Again] + [Open in new tab]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct CaptureError {
    /// Classified failure kind.
    pub kind: ErrorKind,

    /// Message shown to the user.
    pub message: String,

    /// Whether the app was embedded in another page's frame.
    pub embedded: bool,

    /// Raw platform detail, for logs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CaptureError {
    /// Creates an error carrying the standard message for `kind`.
    pub fn new(kind: ErrorKind, embedded: bool) -> Self {
        CaptureError {
            kind,
            message: kind.message(embedded).to_string(),
            embedded,
            detail: None,
        }
    }

    /// Attaches the raw platform detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Shorthand for a still-image decode failure.
    pub fn decode_failed() -> Self {
        CaptureError::new(ErrorKind::DecodeFailed, false)
    }

    /// Every scanner error can be retried.
    pub fn offers_retry(&self) -> bool {
        true
    }

    /// Embedded camera failures also offer to reopen the app in a new tab.
    pub fn offers_open_in_new_tab(&self) -> bool {
        self.embedded && self.kind.is_camera_error()
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Core logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The capture state machine was asked for a transition it does not allow.
    #[error("Cannot {action} while capture is {from}")]
    InvalidTransition { from: String, action: String },

    /// A keyword pattern could not be compiled.
    #[error("Invalid keyword pattern for {region}: {reason}")]
    InvalidKeywords { region: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., the same barcode listed twice).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_names_classify() {
        assert_eq!(
            ErrorKind::from_platform_name("NotAllowedError"),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            ErrorKind::from_platform_name("NotFoundError"),
            ErrorKind::NoCameraFound
        );
        assert_eq!(
            ErrorKind::from_platform_name("SecurityError"),
            ErrorKind::InsecureOrBlocked
        );
        assert_eq!(
            ErrorKind::from_platform_name("TypeError"),
            ErrorKind::UnsupportedBrowser
        );
        assert_eq!(
            ErrorKind::from_platform_name("NotReadableError"),
            ErrorKind::Unknown
        );
    }

    #[test]
    fn test_embedded_changes_denial_message() {
        let top = ErrorKind::PermissionDenied.message(false);
        let framed = ErrorKind::PermissionDenied.message(true);
        assert_ne!(top, framed);
        assert!(framed.contains("new tab"));

        // Only denial depends on framing
        assert_eq!(
            ErrorKind::NoCameraFound.message(true),
            ErrorKind::NoCameraFound.message(false)
        );
    }

    #[test]
    fn test_each_kind_has_distinct_message() {
        let kinds = [
            ErrorKind::PermissionDenied,
            ErrorKind::NoCameraFound,
            ErrorKind::InsecureOrBlocked,
            ErrorKind::UnsupportedBrowser,
            ErrorKind::DecodeFailed,
            ErrorKind::LookupFailed,
            ErrorKind::Unknown,
        ];
        let messages: std::collections::HashSet<_> =
            kinds.iter().map(|k| k.message(false)).collect();
        assert_eq!(messages.len(), kinds.len());
    }

    #[test]
    fn test_open_in_new_tab_only_when_embedded() {
        let err = CaptureError::new(ErrorKind::PermissionDenied, true);
        assert!(err.offers_retry());
        assert!(err.offers_open_in_new_tab());

        let err = CaptureError::new(ErrorKind::PermissionDenied, false);
        assert!(!err.offers_open_in_new_tab());

        let err = CaptureError::decode_failed();
        assert!(err.offers_retry());
        assert!(!err.offers_open_in_new_tab());
    }

    #[test]
    fn test_capture_error_display_is_message() {
        let err = CaptureError::new(ErrorKind::NoCameraFound, false).with_detail("ENOENT");
        assert_eq!(err.to_string(), "No camera found on this device.");
        assert_eq!(err.detail.as_deref(), Some("ENOENT"));
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "barcode".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
