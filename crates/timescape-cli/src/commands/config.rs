//! Config command implementation.

use anyhow::{Context, Result};

use timescape_core::config::Config;

use super::{ConfigAction, ConfigArgs};
use crate::ui::{format_duration, parse_duration, rule};

/// Run the config command.
pub async fn run(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Get { key } => {
            let config = super::load_config();
            match get_config_value(&config, &key) {
                Some(v) => println!("{}: {}", key, v),
                None => println!("Unknown configuration key: {}", key),
            }
        }

        ConfigAction::Set { key, value } => {
            let mut config = Config::load().context("Failed to load configuration")?;
            if set_config_value(&mut config, &key, &value)? {
                config.save()?;
                println!("Set {} = {}", key, value);
            } else {
                println!("Unknown configuration key: {}", key);
            }
        }

        ConfigAction::Show => {
            let config = super::load_config();
            println!();
            println!("Timescape Configuration");
            println!("{}", rule());
            println!();
            println!("[general]");
            println!("  client_name = \"{}\"", config.general.client_name);
            println!();
            println!("[discovery]");
            println!("  service_type = \"{}\"", config.discovery.service_type);
            println!(
                "  timeout = \"{}\"",
                format_duration(config.discovery.timeout)
            );
            println!();
            println!("[pairing]");
            println!("  probe = {}", config.pairing.probe);
            println!(
                "  poll_interval = \"{}\"",
                format_duration(config.pairing.poll_interval)
            );
            println!(
                "  approval_timeout = \"{}\"",
                format_duration(config.pairing.approval_timeout)
            );
            println!(
                "  request_timeout = \"{}\"",
                format_duration(config.pairing.request_timeout)
            );
            println!();
        }

        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
        }

        ConfigAction::Reset => {
            Config::default().save()?;
            println!("Configuration reset to defaults.");
        }
    }

    Ok(())
}

fn get_config_value(config: &Config, key: &str) -> Option<String> {
    match key {
        "client_name" => Some(config.general.client_name.clone()),
        "service_type" => Some(config.discovery.service_type.clone()),
        "discovery_timeout" => Some(format_duration(config.discovery.timeout)),
        "probe" => Some(config.pairing.probe.to_string()),
        "poll_interval" => Some(format_duration(config.pairing.poll_interval)),
        "approval_timeout" => Some(format_duration(config.pairing.approval_timeout)),
        "request_timeout" => Some(format_duration(config.pairing.request_timeout)),
        _ => None,
    }
}

fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<bool> {
    let duration = || {
        parse_duration(value)
            .with_context(|| format!("Invalid duration '{}'. Use formats like '500ms', '5s'", value))
    };

    match key {
        "client_name" => config.general.client_name = value.to_string(),
        "service_type" => config.discovery.service_type = value.to_string(),
        "discovery_timeout" => config.discovery.timeout = duration()?,
        "probe" => config.pairing.probe = value.parse()?,
        "poll_interval" => config.pairing.poll_interval = duration()?,
        "approval_timeout" => config.pairing.approval_timeout = duration()?,
        "request_timeout" => config.pairing.request_timeout = duration()?,
        _ => return Ok(false),
    }

    config
        .validate()
        .with_context(|| format!("Invalid value for {}", key))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_get_and_set_values() {
        let mut config = Config::default();

        assert!(set_config_value(&mut config, "client_name", "Wrist").unwrap());
        assert!(set_config_value(&mut config, "poll_interval", "500ms").unwrap());
        assert!(set_config_value(&mut config, "probe", "false").unwrap());

        assert_eq!(get_config_value(&config, "client_name").unwrap(), "Wrist");
        assert_eq!(config.pairing.poll_interval, Duration::from_millis(500));
        assert_eq!(get_config_value(&config, "probe").unwrap(), "false");
    }

    #[test]
    fn test_unknown_and_invalid_values() {
        let mut config = Config::default();

        assert!(!set_config_value(&mut config, "port", "8080").unwrap());
        assert!(get_config_value(&config, "port").is_none());
        assert!(set_config_value(&mut config, "approval_timeout", "soon").is_err());
        assert!(set_config_value(&mut config, "probe", "maybe").is_err());
    }

    #[test]
    fn test_zero_pairing_durations_are_refused() {
        let mut config = Config::default();

        assert!(set_config_value(&mut config, "poll_interval", "0s").is_err());
        assert!(set_config_value(&mut config, "approval_timeout", "0ms").is_err());
        assert!(set_config_value(&mut config, "discovery_timeout", "0s").unwrap());
    }
}
