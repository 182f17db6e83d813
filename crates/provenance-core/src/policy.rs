//! # Display Policy
//!
//! Presentation rules for a classified product. None of this affects the
//! data: a [`ProductRecord`] is identical whatever policy renders it.
//!
//! ## Verdicts
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Flags (A, B)     Severity      Headline                                │
//! │  ─────────────    ──────────    ─────────────────────────────────────── │
//! │  (true,  true)    Destructive   Connected to both {A} & {B}             │
//! │  (true,  false)   Notice        Connected to {A}                        │
//! │  (false, true)    Notice        Connected to {B}                        │
//! │  (false, false)   Clean         No concerning connections found         │
//! │                                                                         │
//! │  highlight_dual = false demotes the dual case to Notice.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sanitizing
//! Description and source text may name Region B directly. The policy
//! rewrites the configured terms (case-insensitive, longest first) to a
//! neutral replacement before display.

use std::borrow::Cow;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{Connection, ProductRecord};

/// Title shown while a lookup is in flight.
pub const ANALYZING_TITLE: &str = "Analyzing Product...";

/// Headline for products with no flagged region.
pub const CLEAN_HEADLINE: &str = "No concerning connections found";

/// How loudly a verdict should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Destructive,
    Notice,
    Clean,
}

/// The one-line summary of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub severity: Severity,
    pub headline: String,
}

/// Labels, emphasis, and sanitizing rules for rendering records.
#[derive(Debug, Clone)]
pub struct DisplayPolicy {
    region_a_label: String,
    region_b_label: String,
    highlight_dual: bool,
    sanitizer: Option<Regex>,
    replacement: String,
}

impl DisplayPolicy {
    /// Builds a policy. `sanitize_terms` may be empty to disable rewriting.
    pub fn new<S: AsRef<str>>(
        region_a_label: impl Into<String>,
        region_b_label: impl Into<String>,
        highlight_dual: bool,
        sanitize_terms: &[S],
        replacement: impl Into<String>,
    ) -> CoreResult<Self> {
        let mut terms: Vec<String> = sanitize_terms
            .iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        // Longest first so "israeli" wins over "israel"
        terms.sort_by(|a, b| b.len().cmp(&a.len()));

        let sanitizer = if terms.is_empty() {
            None
        } else {
            let alternation = terms
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");
            Some(
                RegexBuilder::new(&alternation)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| CoreError::InvalidKeywords {
                        region: "display.sanitize_terms".to_string(),
                        reason: e.to_string(),
                    })?,
            )
        };

        Ok(DisplayPolicy {
            region_a_label: region_a_label.into(),
            region_b_label: region_b_label.into(),
            highlight_dual,
            sanitizer,
            replacement: replacement.into(),
        })
    }

    pub fn region_a_label(&self) -> &str {
        &self.region_a_label
    }

    pub fn region_b_label(&self) -> &str {
        &self.region_b_label
    }

    /// Summarizes a record.
    pub fn verdict(&self, record: &ProductRecord) -> Verdict {
        match record.connection() {
            Connection::Both => Verdict {
                severity: if self.highlight_dual {
                    Severity::Destructive
                } else {
                    Severity::Notice
                },
                headline: format!(
                    "Connected to both {} & {}",
                    self.region_a_label, self.region_b_label
                ),
            },
            Connection::RegionA => Verdict {
                severity: Severity::Notice,
                headline: format!("Connected to {}", self.region_a_label),
            },
            Connection::RegionB => Verdict {
                severity: Severity::Notice,
                headline: format!("Connected to {}", self.region_b_label),
            },
            Connection::None => Verdict {
                severity: Severity::Clean,
                headline: CLEAN_HEADLINE.to_string(),
            },
        }
    }

    /// Rewrites sanitized terms in free text.
    pub fn sanitize<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match &self.sanitizer {
            Some(re) => re.replace_all(text, self.replacement.as_str()),
            None => Cow::Borrowed(text),
        }
    }

    /// Subtitle shown under [`ANALYZING_TITLE`].
    pub fn analyzing_subtitle(&self) -> String {
        format!(
            "Checking connections to {} and {}",
            self.region_a_label, self.region_b_label
        )
    }

    /// "Yes" / "No" for a region row.
    pub fn flag_label(flag: bool) -> &'static str {
        if flag {
            "Yes"
        } else {
            "No"
        }
    }
}

impl Default for DisplayPolicy {
    fn default() -> Self {
        DisplayPolicy::new(
            "USA",
            "other region",
            true,
            &["israel", "israeli"],
            "other region",
        )
        .expect("default sanitize terms are valid")
    }
}
