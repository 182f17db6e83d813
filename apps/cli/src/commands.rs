//! # Commands
//!
//! One function per subcommand. Each returns the process exit code; failures
//! the user should see are rendered here and reported as `ExitCode::FAILURE`,
//! while unexpected errors bubble up through `anyhow`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{debug, error, info, warn};

use provenance_capture::{default_backend, CaptureController, CaptureEvent, RxingDecoder};
use provenance_core::validation::{is_retail_barcode, validate_barcode};
use provenance_core::CaptureError;
use provenance_lookup::{ClassificationService, LookupConfig};

use crate::render::Output;
use crate::ConfigAction;

/// Exit code for a scan interrupted with Ctrl+C.
const INTERRUPTED: u8 = 130;

fn controller() -> (CaptureController, tokio::sync::mpsc::Receiver<CaptureEvent>) {
    CaptureController::new(default_backend(), Arc::new(RxingDecoder))
}

fn capture_failure(output: &Output, err: &CaptureError) -> anyhow::Result<ExitCode> {
    debug!(kind = %err.kind, detail = ?err.detail, "Capture failed");
    output.capture_error(err)?;
    Ok(ExitCode::FAILURE)
}

/// Classifies `barcode` and prints the record.
async fn classify_and_print(
    config: &LookupConfig,
    output: &Output,
    barcode: &str,
) -> anyhow::Result<ExitCode> {
    let service = match ClassificationService::from_config(config) {
        Ok(service) => service,
        Err(e) => {
            error!(
                error = %e,
                config_error = e.is_config_error(),
                "Classification service unavailable"
            );
            output.lookup_failed();
            return Ok(ExitCode::FAILURE);
        }
    };

    output.analyzing();
    let record = service.classify(barcode).await;
    info!(
        barcode = %barcode,
        found = !record.is_not_found(),
        connected = record.connection().is_connected(),
        "Classified"
    );

    output.record(&record)?;
    Ok(ExitCode::SUCCESS)
}

// =============================================================================
// lookup / decode / scan
// =============================================================================

pub async fn lookup(config: &LookupConfig, output: &Output, input: &str) -> anyhow::Result<ExitCode> {
    let barcode = validate_barcode(input)?;
    if !is_retail_barcode(&barcode) {
        warn!(barcode = %barcode, "Not an EAN/UPC code; the directory may not know it");
    }
    classify_and_print(config, output, &barcode).await
}

pub async fn decode(config: &LookupConfig, output: &Output, image: &Path) -> anyhow::Result<ExitCode> {
    let (controller, _events) = controller();

    match controller.decode_from_image(image).await {
        Ok(scan) => {
            debug!(text = %scan.text, format = ?scan.format, "Decoded image");
            classify_and_print(config, output, &scan.text).await
        }
        Err(err) => capture_failure(output, &err),
    }
}

pub async fn scan(config: &LookupConfig, output: &Output, list_devices: bool) -> anyhow::Result<ExitCode> {
    let (controller, mut events) = controller();

    if list_devices {
        return match controller.video_inputs().await {
            Ok(devices) => {
                output.devices(&devices)?;
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => capture_failure(output, &err),
        };
    }

    if let Err(err) = controller.start_capture().await {
        return capture_failure(output, &err);
    }
    output.scanning();

    let event = tokio::select! {
        event = events.recv() => event,
        _ = tokio::signal::ctrl_c() => None,
    };
    controller.stop_capture().await;

    match event {
        Some(CaptureEvent::Decoded { session_id, result }) => {
            debug!(session_id = %session_id, text = %result.text, "Scan complete");
            classify_and_print(config, output, &result.text).await
        }
        Some(CaptureEvent::Failed { error, .. }) => capture_failure(output, &error),
        None => {
            info!("Scan cancelled");
            Ok(ExitCode::from(INTERRUPTED))
        }
    }
}

// =============================================================================
// config
// =============================================================================

fn resolve_path(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    path.or_else(LookupConfig::default_config_path)
        .context("no config directory on this system; pass --config")
}

pub fn config(action: &ConfigAction, path: Option<PathBuf>, json: bool) -> anyhow::Result<ExitCode> {
    match action {
        ConfigAction::Path => {
            println!("{}", resolve_path(path)?.display());
        }
        ConfigAction::Show => {
            let config = LookupConfig::load(path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
        ConfigAction::Init { force } => {
            let written = init_config(resolve_path(path)?, *force)?;
            println!("Wrote {}", written.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Writes the default configuration to `target`.
fn init_config(target: PathBuf, force: bool) -> anyhow::Result<PathBuf> {
    if target.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", target.display());
    }
    Ok(LookupConfig::default().save(Some(target))?)
}
