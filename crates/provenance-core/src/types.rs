//! # Domain Types
//!
//! Core domain types used throughout the scanner.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────┐   │
//! │  │   ScanResult    │   │   ProductRecord     │   │  CaptureState   │   │
//! │  │  ─────────────  │   │  ─────────────────  │   │  ─────────────  │   │
//! │  │  text           │──►│  name, brand        │   │  Idle           │   │
//! │  │  format         │   │  barcode            │   │  Requesting..   │   │
//! │  │  decoded_at     │   │  region A / B flags │   │  Streaming      │   │
//! │  └─────────────────┘   │  description?       │   │  Error(reason)  │   │
//! │                        │  source?            │   └─────────────────┘   │
//! │                        └─────────────────────┘                          │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │  KnownProduct   │   │   Connection    │   │  PermissionStatus   │   │
//! │  │  (table entry)  │   │  None / A / B / │   │  Unknown / Granted  │   │
//! │  │                 │   │  Both           │   │  / Denied           │   │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CaptureError, ValidationError};

/// Name given to products no source knows about.
pub const NOT_FOUND_NAME: &str = "Product Not Found";

/// Brand given to products no source knows about.
pub const NOT_FOUND_BRAND: &str = "Unknown";

/// Description given to products no source knows about.
pub const NOT_FOUND_DESCRIPTION: &str =
    "This product is not in our database. Consider adding it to help the community.";

/// Source given to products no source knows about.
pub const NOT_FOUND_SOURCE: &str = "Not found";

// =============================================================================
// Scan Result
// =============================================================================

/// Text decoded from a single barcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// The decoded payload. Never empty.
    pub text: String,

    /// Symbology reported by the decoder (e.g. "EAN_13"), if any.
    pub format: Option<String>,

    /// When the code was decoded.
    #[ts(as = "String")]
    pub decoded_at: DateTime<Utc>,
}

impl ScanResult {
    /// Creates a scan result, rejecting empty payloads.
    pub fn new(text: impl Into<String>, format: Option<String>) -> Result<Self, ValidationError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "scan text".to_string(),
            });
        }

        Ok(ScanResult {
            text,
            format,
            decoded_at: Utc::now(),
        })
    }
}

// =============================================================================
// Product Record
// =============================================================================

/// Everything the scanner knows about one product.
///
/// Always fully populated: a lookup yields either a real record or the
/// [`ProductRecord::not_found`] sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    /// Display name.
    pub name: String,

    /// Brand or owning company.
    pub brand: String,

    /// The scanned barcode this record answers.
    pub barcode: String,

    /// Whether the brand is connected to Region A.
    pub connected_to_region_a: bool,

    /// Whether the brand is connected to Region B.
    pub connected_to_region_b: bool,

    /// Free-text explanation.
    pub description: Option<String>,

    /// Where the answer came from.
    pub source: Option<String>,
}

impl ProductRecord {
    /// The sentinel returned when neither the table nor the directory knows
    /// the barcode.
    pub fn not_found(barcode: impl Into<String>) -> Self {
        ProductRecord {
            name: NOT_FOUND_NAME.to_string(),
            brand: NOT_FOUND_BRAND.to_string(),
            barcode: barcode.into(),
            connected_to_region_a: false,
            connected_to_region_b: false,
            description: Some(NOT_FOUND_DESCRIPTION.to_string()),
            source: Some(NOT_FOUND_SOURCE.to_string()),
        }
    }

    /// Returns true for the "not found" sentinel. Every field but the
    /// barcode must match, so table entries that share a field are not
    /// mistaken for misses.
    pub fn is_not_found(&self) -> bool {
        self.name == NOT_FOUND_NAME
            && self.brand == NOT_FOUND_BRAND
            && !self.connected_to_region_a
            && !self.connected_to_region_b
            && self.description.as_deref() == Some(NOT_FOUND_DESCRIPTION)
            && self.source.as_deref() == Some(NOT_FOUND_SOURCE)
    }

    /// Collapses the two flags into a single connection value.
    #[inline]
    pub fn connection(&self) -> Connection {
        Connection::from_flags(self.connected_to_region_a, self.connected_to_region_b)
    }
}

// =============================================================================
// Known Product (table entry)
// =============================================================================

/// A row of the fixed product table.
///
/// Stored with snake_case keys because it is written by hand in
/// `provenance.toml`:
/// ```toml
/// [[products]]
/// barcode = "3017620425035"
/// name = "Nutella"
/// brand = "Ferrero"
/// connected_to_region_a = false
/// connected_to_region_b = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownProduct {
    /// Exact lookup key.
    pub barcode: String,
    pub name: String,
    pub brand: String,
    #[serde(default)]
    pub connected_to_region_a: bool,
    #[serde(default)]
    pub connected_to_region_b: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl KnownProduct {
    /// Builds the record answering `barcode`.
    ///
    /// The queried barcode always wins over the stored key, so the caller
    /// sees exactly what it asked for.
    pub fn to_record(&self, barcode: &str) -> ProductRecord {
        ProductRecord {
            name: self.name.clone(),
            brand: self.brand.clone(),
            barcode: barcode.to_string(),
            connected_to_region_a: self.connected_to_region_a,
            connected_to_region_b: self.connected_to_region_b,
            description: self.description.clone(),
            source: self.source.clone(),
        }
    }
}

// =============================================================================
// Connection
// =============================================================================

/// Which regions a product is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Connection {
    None,
    RegionA,
    RegionB,
    Both,
}

impl Connection {
    /// Builds the connection from the two record flags.
    pub fn from_flags(region_a: bool, region_b: bool) -> Self {
        match (region_a, region_b) {
            (true, true) => Connection::Both,
            (true, false) => Connection::RegionA,
            (false, true) => Connection::RegionB,
            (false, false) => Connection::None,
        }
    }

    /// Returns true when at least one region is flagged.
    pub fn is_connected(&self) -> bool {
        !matches!(self, Connection::None)
    }
}

// =============================================================================
// Capture State
// =============================================================================

/// Lifecycle state of the capture controller.
///
/// ## Transitions
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                                                                         │
/// │  ┌──────┐  request   ┌──────────────────────┐  start  ┌───────────┐   │
/// │  │ Idle │ ─────────► │ RequestingPermission │ ──────► │ Streaming │   │
/// │  └──────┘            └──────────────────────┘         └─────┬─────┘   │
/// │     ▲                     │ granted (probe released)        │         │
/// │     └─────────────────────┘                                 │         │
/// │     ▲                decode / stop                          │         │
/// │     └───────────────────────────────────────────────────────┘         │
/// │                                                                         │
/// │  Error(reason) is reachable from every state; retry returns to Idle.   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum CaptureState {
    /// Nothing is running.
    #[default]
    Idle,
    /// Waiting for the platform to answer a camera request.
    RequestingPermission,
    /// A stream is live and frames are being decoded.
    Streaming,
    /// The last operation failed.
    Error(CaptureError),
}

impl CaptureState {
    /// Returns true while a stream is live.
    pub fn is_streaming(&self) -> bool {
        matches!(self, CaptureState::Streaming)
    }

    /// Returns the error, if the state carries one.
    pub fn error(&self) -> Option<&CaptureError> {
        match self {
            CaptureState::Error(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "idle"),
            CaptureState::RequestingPermission => write!(f, "requesting_permission"),
            CaptureState::Streaming => write!(f, "streaming"),
            CaptureState::Error(err) => write!(f, "error({})", err.kind),
        }
    }
}

/// What we know about camera permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    /// Never asked in this session.
    #[default]
    Unknown,
    /// A probe stream was opened and released.
    Granted,
    /// The platform refused.
    Denied,
}

// =============================================================================
// Video Device
// =============================================================================

/// A video input the platform reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VideoDevice {
    /// Opaque identifier passed back to the platform.
    pub id: String,
    /// Human-readable label (may be empty before permission is granted).
    pub label: String,
}

impl VideoDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        VideoDevice {
            id: id.into(),
            label: label.into(),
        }
    }
}
