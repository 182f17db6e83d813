//! # Provenance CLI
//!
//! Terminal front end for the barcode provenance scanner.
//!
//! ## Command Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         provenance <command>                            │
//! │                                                                         │
//! │  lookup <barcode> ──► validate ─────────────────────┐                   │
//! │                                                     │                   │
//! │  decode <image>   ──► CaptureController             │                   │
//! │                        .decode_from_image() ────────┤                   │
//! │                                                     ▼                   │
//! │  scan             ──► CaptureController       ClassificationService     │
//! │                        .start_capture()        .classify(barcode)       │
//! │                        first Decoded event ────►    │                   │
//! │                        .stop_capture()              ▼                   │
//! │                                               render (text / --json)   │
//! │                                                                         │
//! │  config path|show|init                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Logging
//! Logs go to stderr so stdout only carries rendered output. `RUST_LOG`
//! overrides the default filter.

mod commands;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use provenance_lookup::LookupConfig;

// =============================================================================
// Command Line
// =============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "provenance",
    version,
    about = "Scan a product barcode and check its regional connections"
)]
struct Cli {
    /// Path to provenance.toml
    #[arg(long, global = true, env = "PROVENANCE_CONFIG")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify a barcode typed on the command line
    Lookup {
        /// Barcode digits, e.g. 3017620425035
        barcode: String,
    },

    /// Decode a barcode from a photo and classify it
    Decode {
        /// PNG, JPEG or any other common image format
        image: PathBuf,
    },

    /// Scan with the camera until one barcode is read
    Scan {
        /// List video inputs and exit
        #[arg(long)]
        list_devices: bool,
    },

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Print the effective configuration
    Show,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// =============================================================================
// Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    debug!(command = ?cli.command, "Starting");

    match cli.command {
        Command::Config { action } => commands::config(&action, cli.config, cli.json),
        command => run(command, cli.config, cli.json).await,
    }
}

/// Runs a command that needs the loaded configuration.
async fn run(command: Command, config_path: Option<PathBuf>, json: bool) -> anyhow::Result<ExitCode> {
    let config = match &command {
        // Listing cameras does not depend on the config, so a broken file
        // should not block it
        Command::Scan { list_devices: true } => LookupConfig::load_or_default(config_path.clone()),
        _ => LookupConfig::load(config_path.clone())?,
    };
    let output = render::Output::new(config.display_policy()?, json);
    output.branch_banner(option_env!("PROVENANCE_BRANCH"));

    match command {
        Command::Lookup { barcode } => commands::lookup(&config, &output, &barcode).await,
        Command::Decode { image } => commands::decode(&config, &output, &image).await,
        Command::Scan { list_devices } => commands::scan(&config, &output, list_devices).await,
        Command::Config { action } => commands::config(&action, config_path, json),
    }
}

/// Installs the stderr subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,provenance=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["provenance", "lookup", "3017620425035", "--json"]);
        assert!(cli.json);
        match cli.command {
            Command::Lookup { barcode } => assert_eq!(barcode, "3017620425035"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_config_init_force() {
        let cli = Cli::parse_from([
            "provenance",
            "--config",
            "/tmp/p.toml",
            "config",
            "init",
            "--force",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.toml")));
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Init { force: true }
            }
        ));
    }

    #[test]
    fn test_scan_list_devices() {
        let cli = Cli::parse_from(["provenance", "scan", "--list-devices"]);
        assert!(matches!(cli.command, Command::Scan { list_devices: true }));
    }
}
