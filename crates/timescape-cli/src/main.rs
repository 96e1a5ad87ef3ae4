//! Timescape CLI - import sticky notes from a companion device
//!
//! Timescape finds a companion app on the local network, asks it for an
//! export, and waits for the request to be approved on the companion.
//!
//! ## Quick Start
//!
//! ```bash
//! # See which companions are around
//! timescape scan
//!
//! # Import from the only (or a named) companion
//! timescape import --device "Pixel 8"
//!
//! # Skip discovery
//! timescape import --host 192.168.1.20:8765
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

use anyhow::Result;
use clap::Parser;

mod commands;
pub mod ui;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Command::Scan(args) => commands::scan::run(args).await,
        Command::Import(args) => commands::import::run(args).await,
        Command::Show(args) => commands::show::run(args),
        Command::Config(args) => commands::config::run(args).await,
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose {
        "warn,timescape=debug,timescape_core=debug"
    } else {
        "warn,timescape=info,timescape_core=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
