//! # Lookup Configuration
//!
//! Configuration for the classification service and its display policy.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PROVENANCE_DIRECTORY_URL=http://localhost:8080                     │
//! │     PROVENANCE_DIRECTORY_ENABLED=false                                 │
//! │     PROVENANCE_LOOKUP_TIMEOUT_SECS=10                                  │
//! │     PROVENANCE_USER_AGENT=my-scanner/1.0                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/scanner/provenance.toml (Linux)                          │
//! │     ~/Library/Application Support/com.provenance.scanner/... (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     Built-in product table, keyword lists and labels                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # provenance.toml
//! [directory]
//! base_url = "https://world.openfoodfacts.org"
//! enabled = true
//! # timeout_secs = 10   # unset: no timeout
//!
//! [keywords]
//! region_a = ["usa", "united states", "america"]
//! region_b = ["israel", "tel aviv"]
//!
//! [display]
//! region_a_label = "USA"
//! region_b_label = "other region"
//! highlight_dual = true
//!
//! [[products]]
//! barcode = "3017620425035"
//! name = "Nutella"
//! brand = "Ferrero"
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use provenance_core::classify::{
    default_catalog, DEFAULT_REGION_A_KEYWORDS, DEFAULT_REGION_B_KEYWORDS,
};
use provenance_core::{DisplayPolicy, KnownProduct, ProductTable, RegionRules};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{LookupError, LookupResult};

/// File name inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "provenance.toml";

// =============================================================================
// Directory Settings
// =============================================================================

/// Where and how to query the external product directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySettings {
    /// Base URL of the Open Food Facts compatible service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Set to false to answer from the product table only.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds. Unset means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    "https://world.openfoodfacts.org".to_string()
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("provenance-scanner/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for DirectorySettings {
    fn default() -> Self {
        DirectorySettings {
            base_url: default_base_url(),
            enabled: true,
            user_agent: default_user_agent(),
            timeout_secs: None,
        }
    }
}

impl DirectorySettings {
    /// Returns the timeout as a duration, if one is configured. Zero means
    /// no timeout, as it does for `PROVENANCE_LOOKUP_TIMEOUT_SECS`.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

// =============================================================================
// Keyword Settings
// =============================================================================

/// Keyword lists used for directory-only products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordSettings {
    #[serde(default = "default_region_a_keywords")]
    pub region_a: Vec<String>,

    #[serde(default = "default_region_b_keywords")]
    pub region_b: Vec<String>,
}

fn default_region_a_keywords() -> Vec<String> {
    DEFAULT_REGION_A_KEYWORDS.iter().map(|s| s.to_string()).collect()
}

fn default_region_b_keywords() -> Vec<String> {
    DEFAULT_REGION_B_KEYWORDS.iter().map(|s| s.to_string()).collect()
}

impl Default for KeywordSettings {
    fn default() -> Self {
        KeywordSettings {
            region_a: default_region_a_keywords(),
            region_b: default_region_b_keywords(),
        }
    }
}

// =============================================================================
// Display Settings
// =============================================================================

/// Presentation policy. Never changes the record itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default = "default_region_a_label")]
    pub region_a_label: String,

    #[serde(default = "default_region_b_label")]
    pub region_b_label: String,

    /// Render the dual-connection verdict as destructive.
    #[serde(default = "default_true")]
    pub highlight_dual: bool,

    /// Terms rewritten in description and source text.
    #[serde(default = "default_sanitize_terms")]
    pub sanitize_terms: Vec<String>,

    #[serde(default = "default_replacement")]
    pub replacement: String,
}

fn default_region_a_label() -> String {
    "USA".to_string()
}

fn default_region_b_label() -> String {
    "other region".to_string()
}

fn default_sanitize_terms() -> Vec<String> {
    vec!["israel".to_string(), "israeli".to_string()]
}

fn default_replacement() -> String {
    "other region".to_string()
}

impl Default for DisplaySettings {
    fn default() -> Self {
        DisplaySettings {
            region_a_label: default_region_a_label(),
            region_b_label: default_region_b_label(),
            highlight_dual: true,
            sanitize_terms: default_sanitize_terms(),
            replacement: default_replacement(),
        }
    }
}

// =============================================================================
// Main Lookup Configuration
// =============================================================================

/// Complete lookup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// External directory settings.
    #[serde(default)]
    pub directory: DirectorySettings,

    /// Region keyword lists.
    #[serde(default)]
    pub keywords: KeywordSettings,

    /// Display policy.
    #[serde(default)]
    pub display: DisplaySettings,

    /// The fixed product table consulted before the directory.
    #[serde(default = "default_catalog")]
    pub products: Vec<KnownProduct>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        LookupConfig {
            directory: DirectorySettings::default(),
            keywords: KeywordSettings::default(),
            display: DisplaySettings::default(),
            products: default_catalog(),
        }
    }
}

impl LookupConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (provenance.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> LookupResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading lookup config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load lookup config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> LookupResult<PathBuf> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| LookupError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Lookup config saved");
        Ok(path)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> LookupResult<()> {
        let url = url::Url::parse(&self.directory.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(LookupError::InvalidUrl(format!(
                "Directory URL must start with http:// or https://, got: {}",
                self.directory.base_url
            )));
        }

        // Compiling the rules checks for blank keywords
        self.region_rules()?;

        let mut seen = HashSet::with_capacity(self.products.len());
        for product in &self.products {
            if product.barcode.trim().is_empty() {
                return Err(LookupError::InvalidConfig(
                    "products.barcode must not be blank".into(),
                ));
            }
            if product.name.trim().is_empty() || product.brand.trim().is_empty() {
                return Err(LookupError::InvalidConfig(format!(
                    "product {} needs a name and a brand",
                    product.barcode
                )));
            }
            if !seen.insert(product.barcode.as_str()) {
                return Err(LookupError::InvalidConfig(format!(
                    "barcode {} is listed more than once",
                    product.barcode
                )));
            }
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key/value source.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PROVENANCE_DIRECTORY_URL") {
            debug!(url = %url, "Overriding directory URL from environment");
            self.directory.base_url = url;
        }

        if let Some(enabled) = lookup("PROVENANCE_DIRECTORY_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.directory.enabled = true,
                "0" | "false" | "no" | "off" => self.directory.enabled = false,
                _ => warn!(value = %enabled, "Unknown PROVENANCE_DIRECTORY_ENABLED value"),
            }
        }

        if let Some(timeout) = lookup("PROVENANCE_LOOKUP_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(0) => self.directory.timeout_secs = None,
                Ok(secs) => self.directory.timeout_secs = Some(secs),
                Err(_) => warn!(value = %timeout, "Ignoring invalid lookup timeout"),
            }
        }

        if let Some(agent) = lookup("PROVENANCE_USER_AGENT") {
            self.directory.user_agent = agent;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "provenance", "scanner")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// Compiles the keyword lists.
    pub fn region_rules(&self) -> LookupResult<RegionRules> {
        Ok(RegionRules::new(
            self.keywords.region_a.as_slice(),
            self.keywords.region_b.as_slice(),
        )?)
    }

    /// Builds the fixed product table.
    pub fn product_table(&self) -> LookupResult<ProductTable> {
        Ok(ProductTable::from_entries(self.products.clone())?)
    }

    /// Builds the display policy.
    pub fn display_policy(&self) -> LookupResult<DisplayPolicy> {
        Ok(DisplayPolicy::new(
            self.display.region_a_label.clone(),
            self.display.region_b_label.clone(),
            self.display.highlight_dual,
            self.display.sanitize_terms.as_slice(),
            self.display.replacement.clone(),
        )?)
    }
}
