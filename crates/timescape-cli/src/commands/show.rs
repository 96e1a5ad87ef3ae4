//! Show command implementation.

use anyhow::{Context, Result};

use timescape_core::notes::{default_notes, load_export_file, ExportPayload};

use super::ShowArgs;
use crate::ui::{format_timestamp, print_notes};

/// Run the show command.
pub fn run(args: ShowArgs) -> Result<()> {
    if args.defaults {
        let notes = default_notes();
        if args.json {
            println!("{}", serde_json::to_string_pretty(&notes)?);
        } else {
            println!();
            println!("Bundled notes");
            print_notes(&notes);
        }
        return Ok(());
    }

    let path = args.file.context("No export file given")?;
    let payload = load_export_file(&path)
        .with_context(|| format!("Failed to read export file {}", path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        display_payload(&payload);
    }

    Ok(())
}

fn display_payload(payload: &ExportPayload) {
    println!();
    println!("Export v{}", payload.version);
    println!("  Generated: {}", format_timestamp(payload.generated_at));
    println!(
        "  Notes:     {} ({} reported, {} flow(s))",
        payload.sticky_notes.len(),
        payload.total_sticky_notes,
        payload.total_flows
    );
    println!();
    print_notes(&payload.sticky_notes);
}
