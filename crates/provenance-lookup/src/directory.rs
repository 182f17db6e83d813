//! # Product Directory
//!
//! Access to the external product-information document store.
//!
//! ## Request / Response
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET {base_url}/api/v0/product/{barcode}.json                          │
//! │                                                                         │
//! │  { "status": 1,                      ──► Some(DirectoryProduct)        │
//! │    "product": { "product_name": "...",                                 │
//! │                 "brands": "...",                                       │
//! │                 "companies": "...",                                    │
//! │                 "countries": "..." } }                                 │
//! │                                                                         │
//! │  { "status": 0, ... } (200 or 404)   ──► None                          │
//! │  other non-2xx / not JSON / down     ──► Err(LookupError)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::DirectorySettings;
use crate::error::{LookupError, LookupResult};

// =============================================================================
// Document Types
// =============================================================================

/// The product object of a directory document.
///
/// Every field is free text and may be missing or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DirectoryProduct {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub brands: Option<String>,
    #[serde(default)]
    pub companies: Option<String>,
    #[serde(default)]
    pub countries: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectoryDocument {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    product: Option<DirectoryProduct>,
}

impl DirectoryDocument {
    fn into_found(self) -> Option<DirectoryProduct> {
        if self.status == 1 {
            self.product
        } else {
            None
        }
    }
}

// =============================================================================
// Directory Trait
// =============================================================================

/// A source of product documents keyed by barcode.
#[async_trait]
pub trait ProductDirectory: Send + Sync {
    /// Fetches the document for `barcode`.
    ///
    /// `Ok(None)` means the directory answered and does not know the product.
    async fn fetch(&self, barcode: &str) -> LookupResult<Option<DirectoryProduct>>;
}

// =============================================================================
// Open Food Facts Client
// =============================================================================

/// HTTP client for Open Food Facts compatible directories.
#[derive(Debug, Clone)]
pub struct OpenFoodFactsClient {
    client: Client,
    base_url: Url,
}

impl OpenFoodFactsClient {
    /// Builds a client from directory settings.
    pub fn new(settings: &DirectorySettings) -> LookupResult<Self> {
        let base_url = Url::parse(&settings.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(LookupError::InvalidUrl(settings.base_url.clone()));
        }

        let mut builder = Client::builder().user_agent(settings.user_agent.clone());
        if let Some(timeout) = settings.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| LookupError::InvalidConfig(e.to_string()))?;

        Ok(OpenFoodFactsClient { client, base_url })
    }

    /// The document URL for `barcode`. The barcode is percent-encoded as a
    /// single path segment.
    pub fn product_url(&self, barcode: &str) -> LookupResult<Url> {
        let file = format!("{}.json", barcode);
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LookupError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "v0", "product", file.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl ProductDirectory for OpenFoodFactsClient {
    async fn fetch(&self, barcode: &str) -> LookupResult<Option<DirectoryProduct>> {
        let url = self.product_url(barcode)?;
        debug!(%url, "Querying product directory");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            // Unknown products come back as 404 with a `status: 0` document
            let body = response.bytes().await?;
            return match serde_json::from_slice::<DirectoryDocument>(&body) {
                Ok(document) => Ok(document.into_found()),
                Err(_) => Err(LookupError::UnexpectedStatus(status.as_u16())),
            };
        }
        if !status.is_success() {
            return Err(LookupError::UnexpectedStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        let document: DirectoryDocument = serde_json::from_slice(&body)?;
        Ok(document.into_found())
    }
}
