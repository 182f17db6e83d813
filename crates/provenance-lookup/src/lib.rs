//! # provenance-lookup: Classification Service
//!
//! Turns a decoded barcode into a [`ProductRecord`](provenance_core::ProductRecord).
//!
//! ## Modules
//!
//! - [`config`] - `provenance.toml` loading, env overrides, validation
//! - [`directory`] - HTTP client for the external product directory
//! - [`service`] - The table → directory → sentinel lookup
//! - [`error`] - Lookup error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use provenance_lookup::{ClassificationService, LookupConfig};
//!
//! # async fn run() -> provenance_lookup::LookupResult<()> {
//! let config = LookupConfig::load(None)?;
//! let service = ClassificationService::from_config(&config)?;
//!
//! let record = service.classify("3017620425035").await;
//! println!("{} by {}", record.name, record.brand);
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod directory;
pub mod error;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::LookupConfig;
pub use directory::{DirectoryProduct, OpenFoodFactsClient, ProductDirectory};
pub use error::{LookupError, LookupResult};
pub use service::ClassificationService;
