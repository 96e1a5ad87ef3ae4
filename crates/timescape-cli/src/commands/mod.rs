//! CLI command definitions and handlers.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Load configuration with graceful fallback to defaults.
///
/// If the config file doesn't exist the defaults are used. If it can't be
/// parsed or holds invalid settings, a warning is logged and the defaults are
/// used.
pub fn load_config() -> timescape_core::config::Config {
    match timescape_core::config::Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            timescape_core::config::Config::default()
        }
    }
}

pub mod config;
pub mod import;
pub mod scan;
pub mod show;

/// Timescape - import sticky notes from a companion device
#[derive(Parser)]
#[command(name = "timescape")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Scan the network for companions
    Scan(ScanArgs),

    /// Import notes from a companion
    Import(ImportArgs),

    /// Display notes from an export file
    Show(ShowArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the scan command
#[derive(Parser)]
pub struct ScanArgs {
    /// Duration to scan (e.g., 5s, 500ms)
    #[arg(short, long)]
    pub duration: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the import command
#[derive(Parser)]
pub struct ImportArgs {
    /// Connect directly to host:port instead of scanning
    #[arg(long, conflicts_with = "device")]
    pub host: Option<String>,

    /// Name of a discovered companion to import from
    #[arg(long)]
    pub device: Option<String>,

    /// Name shown on the companion's approval prompt
    #[arg(short, long)]
    pub name: Option<String>,

    /// Duration to scan (e.g., 5s, 500ms)
    #[arg(short, long)]
    pub duration: Option<String>,

    /// Write the imported notes to this file as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the show command
#[derive(Parser)]
pub struct ShowArgs {
    /// Export file to read
    #[arg(required_unless_present = "defaults")]
    pub file: Option<PathBuf>,

    /// Show the bundled default notes instead
    #[arg(long, conflicts_with = "file")]
    pub defaults: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Value to set
        value: String,
    },

    /// Show all configuration
    Show,

    /// Show the configuration file path
    Path,

    /// Reset to defaults
    Reset,
}
