//! Scan command implementation.

use anyhow::{Context, Result};

use timescape_core::discovery::{DiscoveredService, Discoverer};

use super::ScanArgs;
use crate::ui::{format_duration, parse_duration, rule, truncate_string};

/// Run the scan command.
pub async fn run(args: ScanArgs) -> Result<()> {
    let config = super::load_config();

    let duration = match &args.duration {
        Some(d) => parse_duration(d)
            .context("Invalid duration format. Use formats like '500ms', '5s', '10s'")?,
        None => config.discovery.timeout,
    };

    if !args.json {
        println!();
        println!("Scanning for companions ({})...", format_duration(duration));
        println!();
    }

    let services = Discoverer::mdns(&config.discovery).discover(duration).await;

    if args.json {
        output_json_services(&services)?;
    } else {
        display_services(&services);
    }

    Ok(())
}

/// Output services as JSON.
fn output_json_services(services: &[DiscoveredService]) -> Result<()> {
    let output = serde_json::json!({
        "companions": services.iter().map(|s| serde_json::json!({
            "name": s.display_name,
            "host": s.host,
            "port": s.port,
            "address": s.key(),
        })).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Display services as a text table.
pub fn display_services(services: &[DiscoveredService]) {
    println!("Companions on Network:");
    println!("{}", rule());
    println!("  {:3}  {:32}  {:30}", "#", "Name", "Address");
    println!("{}", rule());

    if services.is_empty() {
        println!("  (no companions found)");
        println!("{}", rule());
        return;
    }

    for (i, service) in services.iter().enumerate() {
        println!(
            "  {:3}  {:32}  {:30}",
            i + 1,
            truncate_string(&service.display_name, 32),
            truncate_string(&service.key(), 30),
        );
    }

    println!("{}", rule());
}
