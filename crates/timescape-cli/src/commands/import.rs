//! Import command implementation.

use std::collections::HashSet;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use timescape_core::discovery::DiscoveredService;
use timescape_core::import::{ImportController, ImportState};
use timescape_core::notes::{ExportPayload, NoteRecord};

use super::scan::display_services;
use super::ImportArgs;
use crate::ui::{format_duration, parse_duration, print_notes};

/// Run the import command.
pub async fn run(args: ImportArgs) -> Result<()> {
    let mut config = super::load_config();

    if let Some(name) = &args.name {
        config.general.client_name.clone_from(name);
    }
    if let Some(d) = &args.duration {
        config.discovery.timeout = parse_duration(d)
            .context("Invalid duration format. Use formats like '500ms', '5s', '10s'")?;
    }

    let mut controller =
        ImportController::from_config(&config).context("Failed to set up the import")?;

    if let Some(host) = &args.host {
        if let Err(e) = controller.manual_connect(host) {
            if let Some(suggestion) = e.suggestion() {
                eprintln!("  {}", suggestion);
            }
            return Err(e.into());
        }
    } else {
        controller.discover();
        if !args.json {
            println!();
            println!(
                "Scanning for companions ({})...",
                format_duration(config.discovery.timeout)
            );
        }

        let services = match drive(&mut controller, args.json).await? {
            ImportState::DeviceList(services) => services,
            other => bail!("Discovery ended unexpectedly in state '{}'", other.name()),
        };

        if services.is_empty() {
            bail!(
                "No companions found. Make sure the companion app is open on the same \
                 network, or pass --host <address>"
            );
        }

        let index = pick_service(&services, args.device.as_deref(), args.json).await?;
        tracing::debug!(companion = %services[index].display_name, "Selected companion");
        if !controller.select_index(index) {
            bail!("Failed to select companion");
        }
    }

    match drive(&mut controller, args.json).await? {
        ImportState::Imported(_) => {
            let notes = controller.take_notes();
            finish(&notes, &args)
        }
        ImportState::Failed(message) => {
            tracing::warn!("Import failed: {}", message);
            if !args.json {
                eprintln!();
                eprintln!("  Import failed: {}", message);
                eprintln!();
            }
            bail!(message)
        }
        other => bail!("Import ended unexpectedly in state '{}'", other.name()),
    }
}

/// Wait for background work to settle, reporting progress. Ctrl-C cancels.
async fn drive(controller: &mut ImportController, quiet: bool) -> Result<ImportState> {
    loop {
        let state = controller.state().clone();
        if !state.is_busy() {
            return Ok(state);
        }

        if !quiet {
            report(&state);
        }

        let interrupted = tokio::select! {
            _ = controller.next_update() => false,
            _ = tokio::signal::ctrl_c() => true,
        };

        if interrupted {
            tracing::info!(attempt = %controller.attempt(), "Interrupted, cancelling");
            controller.cancel();
            bail!("Cancelled");
        }
    }
}

fn report(state: &ImportState) {
    match state {
        ImportState::RequestingApproval(target) => {
            println!();
            println!("  Contacting {}...", target);
        }
        ImportState::Waiting(_) => {
            println!("  Approve the request on your phone to continue.");
        }
        ImportState::Downloading(_) => {
            println!("  Approved. Downloading notes...");
        }
        _ => {}
    }
}

/// Choose which discovered companion to import from.
async fn pick_service(
    services: &[DiscoveredService],
    device: Option<&str>,
    json: bool,
) -> Result<usize> {
    if let Some(name) = device {
        return find_by_name(services, name)
            .with_context(|| format!("Companion '{}' not found in scan results", name));
    }

    if services.len() == 1 {
        return Ok(0);
    }

    if json {
        bail!("Multiple companions found; choose one with --device <name>");
    }

    println!();
    display_services(services);
    println!();
    println!("Enter a number to import from, or 'q' to quit:");
    print!("  > ");
    io::stdout().flush()?;

    let mut input = String::new();
    let mut reader = BufReader::new(tokio::io::stdin());
    reader.read_line(&mut input).await?;
    let input = input.trim();

    if input.eq_ignore_ascii_case("q") || input.is_empty() {
        bail!("Cancelled");
    }

    input
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=services.len()).contains(n))
        .map(|n| n - 1)
        .with_context(|| format!("'{}' is not a number between 1 and {}", input, services.len()))
}

/// Exact (case-insensitive) name match, else a unique partial match.
fn find_by_name(services: &[DiscoveredService], name: &str) -> Option<usize> {
    let name = name.trim().to_lowercase();

    if let Some(i) = services
        .iter()
        .position(|s| s.display_name.to_lowercase() == name)
    {
        return Some(i);
    }

    let mut partial = services
        .iter()
        .enumerate()
        .filter(|(_, s)| s.display_name.to_lowercase().contains(&name));

    match (partial.next(), partial.next()) {
        (Some((i, _)), None) => Some(i),
        _ => None,
    }
}

fn finish(notes: &[NoteRecord], args: &ImportArgs) -> Result<()> {
    if let Some(path) = &args.output {
        write_notes(notes, path)?;
    }

    if args.json {
        let output = serde_json::json!({
            "imported": notes.len(),
            "notes": notes,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("  Imported {} note(s).", notes.len());
    println!();
    print_notes(notes);

    if let Some(path) = &args.output {
        println!();
        println!("  Saved to {}", path.display());
    }

    Ok(())
}

/// Save imported notes as an export file that `timescape show` can read back.
fn write_notes(notes: &[NoteRecord], path: &Path) -> Result<()> {
    let flows: HashSet<i64> = notes.iter().map(|n| n.flow_id).collect();
    let payload = ExportPayload {
        version: 1,
        generated_at: chrono::Utc::now().timestamp_millis(),
        sticky_notes: notes.to_vec(),
        total_sticky_notes: i32::try_from(notes.len()).unwrap_or(i32::MAX),
        total_flows: i32::try_from(flows.len()).unwrap_or(i32::MAX),
    };

    let json = serde_json::to_string_pretty(&payload)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), notes = notes.len(), "Wrote export file");
    Ok(())
}
