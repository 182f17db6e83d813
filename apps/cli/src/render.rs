//! # Terminal Rendering
//!
//! Formats records, devices and errors for the terminal. Results go to
//! stdout; progress text and errors go to stderr so `--json` output can be
//! piped.
//!
//! ## Record Layout
//! ```text
//! McDonald's Sauce
//! McDonald's Corporation
//! Barcode: 8901030810033
//!
//! [!] Connected to both USA & other region
//!
//!   USA:          Yes
//!   other region: Yes
//!
//! American fast food corporation with other region franchises
//! Source: Company origin database
//! ```

use provenance_core::policy::ANALYZING_TITLE;
use provenance_core::{
    CaptureError, DisplayPolicy, ErrorKind, ProductRecord, Severity, VideoDevice,
};

/// Branch names that never get an indicator.
const HIDDEN_BRANCH: &str = "dev";

/// Prints command output in text or JSON form.
pub struct Output {
    policy: DisplayPolicy,
    json: bool,
}

impl Output {
    pub fn new(policy: DisplayPolicy, json: bool) -> Self {
        Output { policy, json }
    }

    /// Prints the build branch, when there is one worth showing.
    pub fn branch_banner(&self, branch: Option<&str>) {
        if let Some(line) = branch_indicator(branch) {
            eprintln!("{}", line);
        }
    }

    /// Shown once the camera is live.
    pub fn scanning(&self) {
        if !self.json {
            eprintln!("Scanning... point the camera at a barcode (Ctrl+C to stop)");
        }
    }

    /// Shown while a lookup is in flight.
    pub fn analyzing(&self) {
        if !self.json {
            eprintln!("{}", analyzing_text(&self.policy));
        }
    }

    pub fn record(&self, record: &ProductRecord) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(record)?);
        } else {
            println!("{}", format_record(&self.policy, record));
        }
        Ok(())
    }

    pub fn devices(&self, devices: &[VideoDevice]) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(devices)?);
        } else {
            println!("{}", format_devices(devices));
        }
        Ok(())
    }

    pub fn capture_error(&self, err: &CaptureError) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(err)?);
        } else {
            eprintln!("{}", format_capture_error(err));
        }
        Ok(())
    }

    pub fn lookup_failed(&self) {
        eprintln!("{}", ErrorKind::LookupFailed.message(false));
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// "Branch: {name}", hidden for empty names and "dev".
pub fn branch_indicator(branch: Option<&str>) -> Option<String> {
    let name = branch.map(str::trim).filter(|b| !b.is_empty())?;
    if name.eq_ignore_ascii_case(HIDDEN_BRANCH) {
        return None;
    }
    Some(format!("Branch: {}", name))
}

pub fn analyzing_text(policy: &DisplayPolicy) -> String {
    format!("{}\n{}", ANALYZING_TITLE, policy.analyzing_subtitle())
}

fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Destructive => "[!]",
        Severity::Notice => "[*]",
        Severity::Clean => "[ok]",
    }
}

pub fn format_record(policy: &DisplayPolicy, record: &ProductRecord) -> String {
    let verdict = policy.verdict(record);
    let label_a = format!("{}:", policy.region_a_label());
    let label_b = format!("{}:", policy.region_b_label());
    let width = label_a.len().max(label_b.len());

    let mut lines = vec![
        record.name.clone(),
        record.brand.clone(),
        format!("Barcode: {}", record.barcode),
        String::new(),
        format!("{} {}", severity_marker(verdict.severity), verdict.headline),
        String::new(),
        format!(
            "  {:<width$} {}",
            label_a,
            DisplayPolicy::flag_label(record.connected_to_region_a),
            width = width
        ),
        format!(
            "  {:<width$} {}",
            label_b,
            DisplayPolicy::flag_label(record.connected_to_region_b),
            width = width
        ),
    ];

    if let Some(description) = &record.description {
        lines.push(String::new());
        lines.push(policy.sanitize(description).into_owned());
    }
    if let Some(source) = &record.source {
        lines.push(format!("Source: {}", policy.sanitize(source)));
    }

    lines.join("\n")
}

pub fn format_devices(devices: &[VideoDevice]) -> String {
    if devices.is_empty() {
        return ErrorKind::NoCameraFound.message(false).to_string();
    }

    devices
        .iter()
        .map(|d| {
            if d.label.is_empty() {
                d.id.clone()
            } else {
                format!("{}  {}", d.id, d.label)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_capture_error(err: &CaptureError) -> String {
    let mut text = err.message.clone();
    if err.offers_retry() {
        text.push_str("\nRun the command again to retry.");
    }
    if err.offers_open_in_new_tab() {
        text.push_str("\nOpen the scanner in a new tab to get a camera prompt.");
    }
    text
}
