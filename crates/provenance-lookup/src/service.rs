//! # Classification Service
//!
//! `classify(barcode) -> ProductRecord`. Never fails: the caller always gets
//! a complete record, even if that record is the "not found" sentinel.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  barcode                                                                │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  ProductTable ── hit ──────────────────────────────► stored record      │
//! │     │ miss                                                              │
//! │     ▼                                                                   │
//! │  ProductDirectory::fetch                                                │
//! │     ├── Ok(Some(doc)) ── RegionRules ──────────────► inferred record    │
//! │     ├── Ok(None)     ──┐                                                │
//! │     └── Err(e)  (warn) ┴───────────────────────────► not-found record   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use provenance_core::classify::TextFields;
use provenance_core::{ProductRecord, ProductTable, RegionRules};
use tracing::{debug, info, warn};

use crate::config::LookupConfig;
use crate::directory::{DirectoryProduct, OpenFoodFactsClient, ProductDirectory};
use crate::error::LookupResult;

/// Name used when the directory document has none.
pub const UNKNOWN_PRODUCT_NAME: &str = "Unknown Product";

/// Brand used when the directory document has none.
pub const UNKNOWN_BRAND: &str = "Unknown Brand";

/// Description attached to directory-derived records.
pub const DIRECTORY_DESCRIPTION: &str =
    "Product found in database - analysis based on available information";

/// Source attached to directory-derived records.
pub const DIRECTORY_SOURCE: &str = "Open Food Facts + Analysis";

/// Resolves barcodes to product records.
pub struct ClassificationService {
    table: ProductTable,
    rules: RegionRules,
    directory: Option<Arc<dyn ProductDirectory>>,
}

impl ClassificationService {
    /// Creates a service from its parts. `directory = None` answers from the
    /// table only.
    pub fn new(
        table: ProductTable,
        rules: RegionRules,
        directory: Option<Arc<dyn ProductDirectory>>,
    ) -> Self {
        ClassificationService {
            table,
            rules,
            directory,
        }
    }

    /// Builds the service described by `config`.
    pub fn from_config(config: &LookupConfig) -> LookupResult<Self> {
        let directory: Option<Arc<dyn ProductDirectory>> = if config.directory.enabled {
            Some(Arc::new(OpenFoodFactsClient::new(&config.directory)?))
        } else {
            info!("Product directory disabled, using the product table only");
            None
        };

        Ok(Self::new(
            config.product_table()?,
            config.region_rules()?,
            directory,
        ))
    }

    /// Classifies `barcode`.
    ///
    /// Directory failures are logged and answered with the sentinel record.
    pub async fn classify(&self, barcode: &str) -> ProductRecord {
        if let Some(record) = self.table.lookup(barcode) {
            debug!(barcode = %barcode, "Answered from product table");
            return record;
        }

        let Some(directory) = &self.directory else {
            return ProductRecord::not_found(barcode);
        };

        match directory.fetch(barcode).await {
            Ok(Some(product)) => {
                debug!(barcode = %barcode, "Answered from product directory");
                self.infer(barcode, product)
            }
            Ok(None) => {
                debug!(barcode = %barcode, "Product directory has no document");
                ProductRecord::not_found(barcode)
            }
            Err(e) => {
                warn!(
                    barcode = %barcode,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Product directory lookup failed"
                );
                ProductRecord::not_found(barcode)
            }
        }
    }

    /// Builds a record from a directory document.
    fn infer(&self, barcode: &str, product: DirectoryProduct) -> ProductRecord {
        let brands = product.brands.unwrap_or_default();
        let companies = product.companies.unwrap_or_default();
        let countries = product.countries.unwrap_or_default();

        let (region_a, region_b) = self.rules.classify(&TextFields {
            brands: &brands,
            companies: &companies,
            countries: &countries,
        });

        ProductRecord {
            name: non_empty_or(product.product_name, UNKNOWN_PRODUCT_NAME),
            brand: non_empty_or(Some(brands), UNKNOWN_BRAND),
            barcode: barcode.to_string(),
            connected_to_region_a: region_a,
            connected_to_region_b: region_b,
            description: Some(DIRECTORY_DESCRIPTION.to_string()),
            source: Some(DIRECTORY_SOURCE.to_string()),
        }
    }
}

fn non_empty_or(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use async_trait::async_trait;
    use provenance_core::classify::default_catalog;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Canned {
        Found(DirectoryProduct),
        Missing,
        Broken,
    }

    struct FakeDirectory {
        answer: Canned,
        calls: AtomicUsize,
    }

    impl FakeDirectory {
        fn new(answer: Canned) -> Arc<Self> {
            Arc::new(FakeDirectory {
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ProductDirectory for FakeDirectory {
        async fn fetch(&self, _barcode: &str) -> LookupResult<Option<DirectoryProduct>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.answer {
                Canned::Found(p) => Ok(Some(p.clone())),
                Canned::Missing => Ok(None),
                Canned::Broken => Err(LookupError::RequestFailed("connection refused".into())),
            }
        }
    }

    fn service(directory: Arc<FakeDirectory>) -> ClassificationService {
        ClassificationService::new(
            ProductTable::from_entries(default_catalog()).unwrap(),
            RegionRules::default(),
            Some(directory),
        )
    }

    #[tokio::test]
    async fn test_table_hit_skips_directory() {
        let directory = FakeDirectory::new(Canned::Broken);
        let svc = service(directory.clone());

        let record = svc.classify("8901030810033").await;
        assert_eq!(record.name, "McDonald's Sauce");
        assert_eq!(record.barcode, "8901030810033");
        assert!(record.connected_to_region_a);
        assert!(record.connected_to_region_b);
        assert_eq!(directory.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_table_record_returned_unchanged() {
        let svc = service(FakeDirectory::new(Canned::Missing));
        for entry in default_catalog() {
            let record = svc.classify(&entry.barcode).await;
            assert_eq!(record, entry.to_record(&entry.barcode));
        }

        let clean = svc.classify("3017620425035").await;
        assert!(!clean.connected_to_region_a);
        assert!(!clean.connected_to_region_b);
    }

    #[tokio::test]
    async fn test_unknown_barcode_gets_sentinel() {
        let directory = FakeDirectory::new(Canned::Missing);
        let svc = service(directory.clone());

        let record = svc.classify("0000000000000").await;
        assert!(record.is_not_found());
        assert_eq!(record.name, "Product Not Found");
        assert_eq!(record.brand, "Unknown");
        assert_eq!(record.source.as_deref(), Some("Not found"));
        assert!(!record.connected_to_region_a && !record.connected_to_region_b);
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_directory_failure_degrades_to_sentinel() {
        let svc = service(FakeDirectory::new(Canned::Broken));
        let record = svc.classify("5000000000000").await;
        assert_eq!(record, ProductRecord::not_found("5000000000000"));
    }

    #[tokio::test]
    async fn test_directory_document_is_classified() {
        let svc = service(FakeDirectory::new(Canned::Found(DirectoryProduct {
            product_name: Some("Peanut Butter".into()),
            brands: Some("Acme".into()),
            companies: Some("AMERICAN FOODS".into()),
            countries: None,
        })));

        let record = svc.classify("1111111111111").await;
        assert_eq!(record.name, "Peanut Butter");
        assert_eq!(record.brand, "Acme");
        assert!(record.connected_to_region_a);
        assert!(!record.connected_to_region_b);
        assert_eq!(record.source.as_deref(), Some(DIRECTORY_SOURCE));
        assert_eq!(record.description.as_deref(), Some(DIRECTORY_DESCRIPTION));
    }

    #[tokio::test]
    async fn test_empty_document_fields_use_fallbacks() {
        let svc = service(FakeDirectory::new(Canned::Found(DirectoryProduct {
            product_name: Some(String::new()),
            brands: None,
            companies: None,
            countries: Some("Israel".into()),
        })));

        let record = svc.classify("2222222222222").await;
        assert_eq!(record.name, UNKNOWN_PRODUCT_NAME);
        assert_eq!(record.brand, UNKNOWN_BRAND);
        assert!(!record.connected_to_region_a);
        assert!(record.connected_to_region_b);
    }

    #[tokio::test]
    async fn test_without_directory() {
        let mut config = LookupConfig::default();
        config.directory.enabled = false;
        let svc = ClassificationService::from_config(&config).unwrap();

        assert_eq!(svc.classify("0012000171901").await.name, "Pepsi Cola");
        assert!(svc.classify("9999999999999").await.is_not_found());
    }

    #[tokio::test]
    async fn test_from_config_with_unreachable_directory() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = LookupConfig::default();
        config.directory.base_url = format!("http://{}", addr);
        let svc = ClassificationService::from_config(&config).unwrap();

        assert!(svc.classify("4000000000000").await.is_not_found());
    }

    #[tokio::test]
    async fn test_zero_timeout_from_file_still_reaches_directory() {
        use axum::routing::get;
        use axum::{Json, Router};

        let app = Router::new().route(
            "/api/v0/product/{file}",
            get(|| async {
                Json(serde_json::json!({
                    "status": 1,
                    "product": { "product_name": "Bamba", "brands": "Osem", "countries": "Israel" }
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut config: LookupConfig = toml::from_str(&format!(
            "[directory]\nbase_url = \"http://{}\"\ntimeout_secs = 0\n",
            addr
        ))
        .unwrap();
        config.products.clear();
        let svc = ClassificationService::from_config(&config).unwrap();

        let record = svc.classify("7290000066318").await;
        assert_eq!(record.name, "Bamba");
        assert_eq!(record.source.as_deref(), Some(DIRECTORY_SOURCE));
        assert!(record.connected_to_region_b);
    }
}
