//! # Classification Rules
//!
//! The data-driven half of product classification: the fixed product table
//! and the keyword rules used when a product only exists in the external
//! directory.
//!
//! ## Lookup Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      classify(barcode)                                  │
//! │                                                                         │
//! │  1. ProductTable::lookup(barcode)   exact key match                    │
//! │        │ hit ──────────────────────► stored flags, queried barcode     │
//! │        ▼ miss                                                           │
//! │  2. Directory document (I/O, provenance-lookup)                        │
//! │        │ found ────► RegionRules::classify("{brands} {companies}       │
//! │        │                                   {countries}")               │
//! │        ▼ missing / failed                                               │
//! │  3. ProductRecord::not_found(barcode)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Matching Semantics
//! Keywords are plain substrings, matched case-insensitively with no word
//! boundaries. "usa" therefore also matches inside "jerusalem". The result is
//! a best-effort hint, not an authoritative answer.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{KnownProduct, ProductRecord};

/// Region A keywords used when none are configured.
pub const DEFAULT_REGION_A_KEYWORDS: &[&str] = &[
    "usa",
    "united states",
    "america",
    "american",
    "california",
    "new york",
    "texas",
];

/// Region B keywords used when none are configured.
pub const DEFAULT_REGION_B_KEYWORDS: &[&str] = &["israel", "israeli", "tel aviv", "jerusalem"];

// =============================================================================
// Keyword Matcher
// =============================================================================

/// A compiled, case-insensitive alternation of keywords.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
    pattern: Option<Regex>,
}

impl KeywordMatcher {
    /// Compiles `keywords` for `region`.
    ///
    /// Keywords are escaped, so regex metacharacters match literally. An
    /// empty list yields a matcher that never matches; a blank keyword is
    /// rejected because it would match every product.
    pub fn new<S: AsRef<str>>(region: &str, keywords: &[S]) -> CoreResult<Self> {
        let mut normalized = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if keyword.is_empty() {
                return Err(CoreError::InvalidKeywords {
                    region: region.to_string(),
                    reason: "keywords must not be blank".to_string(),
                });
            }
            normalized.push(keyword);
        }

        if normalized.is_empty() {
            return Ok(KeywordMatcher {
                keywords: normalized,
                pattern: None,
            });
        }

        let alternation = normalized
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = RegexBuilder::new(&alternation)
            .case_insensitive(true)
            .build()
            .map_err(|e| CoreError::InvalidKeywords {
                region: region.to_string(),
                reason: e.to_string(),
            })?;

        Ok(KeywordMatcher {
            keywords: normalized,
            pattern: Some(pattern),
        })
    }

    /// Returns true if any keyword occurs in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.pattern
            .as_ref()
            .map(|p| p.is_match(text))
            .unwrap_or(false)
    }

    /// The normalized (trimmed, lowercased) keywords.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

// =============================================================================
// Region Rules
// =============================================================================

/// Free-text fields of a directory document that feed inference.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFields<'a> {
    pub brands: &'a str,
    pub companies: &'a str,
    pub countries: &'a str,
}

impl TextFields<'_> {
    /// The lowercased text the keywords run against.
    pub fn analysis_text(&self) -> String {
        format!("{} {} {}", self.brands, self.companies, self.countries).to_lowercase()
    }
}

/// Keyword rules for both regions.
#[derive(Debug, Clone)]
pub struct RegionRules {
    region_a: KeywordMatcher,
    region_b: KeywordMatcher,
}

impl RegionRules {
    /// Compiles the two keyword lists.
    pub fn new<S: AsRef<str>>(region_a: &[S], region_b: &[S]) -> CoreResult<Self> {
        Ok(RegionRules {
            region_a: KeywordMatcher::new("region_a", region_a)?,
            region_b: KeywordMatcher::new("region_b", region_b)?,
        })
    }

    /// Infers `(connected_to_region_a, connected_to_region_b)`.
    pub fn classify(&self, fields: &TextFields<'_>) -> (bool, bool) {
        let text = fields.analysis_text();
        (self.region_a.is_match(&text), self.region_b.is_match(&text))
    }

    pub fn region_a(&self) -> &KeywordMatcher {
        &self.region_a
    }

    pub fn region_b(&self) -> &KeywordMatcher {
        &self.region_b
    }
}

impl Default for RegionRules {
    fn default() -> Self {
        RegionRules {
            region_a: KeywordMatcher::new("region_a", DEFAULT_REGION_A_KEYWORDS)
                .expect("default keywords are valid"),
            region_b: KeywordMatcher::new("region_b", DEFAULT_REGION_B_KEYWORDS)
                .expect("default keywords are valid"),
        }
    }
}

// =============================================================================
// Product Table
// =============================================================================

/// The fixed in-memory table consulted before the directory.
#[derive(Debug, Clone, Default)]
pub struct ProductTable {
    entries: HashMap<String, KnownProduct>,
}

impl ProductTable {
    /// Builds the table, rejecting blank or duplicate barcodes.
    pub fn from_entries(entries: Vec<KnownProduct>) -> Result<Self, ValidationError> {
        let mut map = HashMap::with_capacity(entries.len());
        for entry in entries {
            if entry.barcode.trim().is_empty() {
                return Err(ValidationError::Required {
                    field: "products.barcode".to_string(),
                });
            }
            if map.contains_key(&entry.barcode) {
                return Err(ValidationError::Duplicate {
                    field: "products.barcode".to_string(),
                    value: entry.barcode,
                });
            }
            map.insert(entry.barcode.clone(), entry);
        }
        Ok(ProductTable { entries: map })
    }

    /// Exact-match lookup.
    pub fn lookup(&self, barcode: &str) -> Option<ProductRecord> {
        self.entries.get(barcode).map(|entry| entry.to_record(barcode))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The built-in product table.
pub fn default_catalog() -> Vec<KnownProduct> {
    const SOURCE: &str = "Company origin database";

    let entry = |barcode: &str, name: &str, brand: &str, a: bool, b: bool, description: &str| {
        KnownProduct {
            barcode: barcode.to_string(),
            name: name.to_string(),
            brand: brand.to_string(),
            connected_to_region_a: a,
            connected_to_region_b: b,
            description: Some(description.to_string()),
            source: Some(SOURCE.to_string()),
        }
    };

    vec![
        entry(
            "8901030859414",
            "Coca-Cola Classic",
            "The Coca-Cola Company",
            true,
            false,
            "American multinational beverage corporation",
        ),
        entry(
            "7290000010200",
            "Strauss Ice Cream",
            "Strauss Group",
            false,
            true,
            "Israeli food and beverage company",
        ),
        entry(
            "8901030810033",
            "McDonald's Sauce",
            "McDonald's Corporation",
            true,
            true,
            "American fast food corporation with Israeli franchises",
        ),
        entry(
            "3017620425035",
            "Nutella",
            "Ferrero",
            false,
            false,
            "Italian manufacturer with global operations",
        ),
        entry(
            "0012000171901",
            "Pepsi Cola",
            "PepsiCo",
            true,
            false,
            "American multinational food and beverage corporation",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields<'a>(brands: &'a str, companies: &'a str, countries: &'a str) -> TextFields<'a> {
        TextFields {
            brands,
            companies,
            countries,
        }
    }

    #[test]
    fn test_uppercase_company_sets_region_a() {
        let rules = RegionRules::default();
        assert_eq!(rules.classify(&fields("", "AMERICAN FOODS", "")), (true, false));
    }

    #[test]
    fn test_region_b_keywords() {
        let rules = RegionRules::default();
        assert_eq!(rules.classify(&fields("", "", "Tel Aviv")), (false, true));
        assert_eq!(rules.classify(&fields("Osem", "", "Israel")), (false, true));
    }

    #[test]
    fn test_substring_semantics() {
        let rules = RegionRules::default();
        // "usa" occurs inside "jerusalem"
        assert_eq!(rules.classify(&fields("", "Jerusalem Bakery", "")), (true, true));
    }

    #[test]
    fn test_no_match_leaves_flags_false() {
        let rules = RegionRules::default();
        assert_eq!(rules.classify(&fields("Ferrero", "", "Italy, France")), (false, false));
    }

    #[test]
    fn test_keywords_are_literal() {
        let rules = RegionRules::new(&["a.b"], &["(x)"]).unwrap();
        assert_eq!(rules.classify(&fields("axb", "", "")), (false, false));
        assert_eq!(rules.classify(&fields("A.B", "", "(X)")), (true, true));
    }

    #[test]
    fn test_blank_keyword_rejected() {
        assert!(RegionRules::new(&["usa", " "], &["israel"]).is_err());
    }

    #[test]
    fn test_empty_list_never_matches() {
        let empty: [&str; 0] = [];
        let rules = RegionRules::new(&empty, &empty).unwrap();
        assert_eq!(rules.classify(&fields("usa", "israel", "")), (false, false));
    }

    #[test]
    fn test_default_table_flags() {
        let table = ProductTable::from_entries(default_catalog()).unwrap();
        assert_eq!(table.len(), 5);

        let dual = table.lookup("8901030810033").unwrap();
        assert!(dual.connected_to_region_a && dual.connected_to_region_b);

        let clean = table.lookup("3017620425035").unwrap();
        assert!(!clean.connected_to_region_a && !clean.connected_to_region_b);
        assert_eq!(clean.name, "Nutella");

        assert!(table.lookup("0000000000000").is_none());
        // Keys are exact
        assert!(table.lookup(" 3017620425035").is_none());
    }

    #[test]
    fn test_duplicate_barcodes_rejected() {
        let mut entries = default_catalog();
        entries.push(entries[0].clone());
        assert!(matches!(
            ProductTable::from_entries(entries),
            Err(ValidationError::Duplicate { .. })
        ));
    }
}
