//! # provenance-capture: Capture Controller
//!
//! Camera permission, stream lifecycle and barcode decoding.
//!
//! ## Modules
//!
//! - [`backend`] - Camera backend traits, frames, platform failures
//! - [`controller`] - [`CaptureController`]: permission, start, stop, still images
//! - [`decoder`] - Barcode decoding (rxing)
//! - [`v4l`] - Linux V4L2 backend (capture needs the `v4l` feature)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use provenance_capture::{default_backend, CaptureController, CaptureEvent, RxingDecoder};
//!
//! # async fn run() -> Result<(), provenance_core::CaptureError> {
//! let (controller, mut events) = CaptureController::new(default_backend(), Arc::new(RxingDecoder));
//! controller.start_capture().await?;
//!
//! if let Some(CaptureEvent::Decoded { result, .. }) = events.recv().await {
//!     println!("scanned {}", result.text);
//! }
//! controller.stop_capture().await;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backend;
pub mod controller;
pub mod decoder;
pub mod v4l;

// =============================================================================
// Re-exports
// =============================================================================

pub use backend::{default_backend, CameraBackend, Frame, PlatformFailure, UnavailableBackend};
pub use controller::{CaptureController, CaptureEvent, CaptureResult};
pub use decoder::{BarcodeDecoder, Decoded, RxingDecoder};
