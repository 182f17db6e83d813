//! # provenance-core: Pure Logic for the Provenance Scanner
//!
//! Everything the scanner decides without touching a camera, the network or
//! the disk lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Provenance Scanner Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    provenance CLI (apps/cli)                    │   │
//! │  │     scan ──► ScanResult ──► lookup ──► ProductRecord ──► render │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────┐  ┌────────────▼────────────────────┐   │
//! │  │     provenance-capture      │  │       provenance-lookup         │   │
//! │  │  camera backends, decoder,  │  │  config, directory client,      │   │
//! │  │  CaptureController          │  │  ClassificationService          │   │
//! │  └──────────────┬──────────────┘  └────────────┬────────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────────────────────▼───────────────────┐   │
//! │  │             ★ provenance-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌────────┐ ┌──────────┐  │   │
//! │  │   │  types  │ │ classify │ │ capture │ │ policy │ │validation│  │   │
//! │  │   └─────────┘ └──────────┘ └─────────┘ └────────┘ └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO CAMERA • NO NETWORK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (ScanResult, ProductRecord, CaptureState, ...)
//! - [`classify`] - Product table and region keyword rules
//! - [`capture`] - Capture state machine and single-shot gate
//! - [`policy`] - How a record is worded for display
//! - [`error`] - Error kinds and user-facing messages
//! - [`validation`] - Manual input checks
//!
//! ## Example Usage
//!
//! ```rust
//! use provenance_core::classify::{RegionRules, TextFields};
//!
//! let rules = RegionRules::default();
//! let fields = TextFields {
//!     brands: "Osem",
//!     companies: "",
//!     countries: "Israel",
//! };
//! assert_eq!(rules.classify(&fields), (false, true));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod capture;
pub mod classify;
pub mod error;
pub mod policy;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use capture::{CaptureMachine, ScanGate, StreamConstraints};
pub use classify::{ProductTable, RegionRules};
pub use error::{CaptureError, CoreError, ErrorKind, ValidationError};
pub use policy::{DisplayPolicy, Severity, Verdict};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Longest barcode accepted from manual input.
///
/// GTIN-14 is the longest retail symbology; QR payloads used as keys are
/// allowed more room.
pub const MAX_BARCODE_LEN: usize = 128;
