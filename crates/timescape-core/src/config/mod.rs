//! Configuration management for Timescape.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/timescape/config.toml` |
//! | macOS | `~/Library/Application Support/com.timescape.Timescape/config.toml` |
//! | Windows | `%APPDATA%\Timescape\Timescape\config\config.toml` |
//!
//! ## Example
//!
//! ```toml
//! [general]
//! client_name = "Wrist"
//!
//! [discovery]
//! timeout = "5s"
//!
//! [pairing]
//! poll_interval = "1s"
//! approval_timeout = "30s"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration struct for Timescape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Discovery settings
    pub discovery: DiscoveryConfig,
    /// Pairing protocol settings
    pub pairing: PairingConfig,
}

/// General configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Name shown on the companion when asking for approval
    pub client_name: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            client_name: hostname::get().map_or_else(
                |_| "Timescape Watch".to_string(),
                |h| h.to_string_lossy().to_string(),
            ),
        }
    }
}

/// Discovery configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// mDNS service type to browse for
    pub service_type: String,
    /// How long a scan runs
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_type: crate::SERVICE_TYPE.to_string(),
            timeout: Duration::from_millis(crate::DEFAULT_DISCOVERY_TIMEOUT_MS),
        }
    }
}

/// Pairing protocol configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Probe `/meta` before requesting a session
    pub probe: bool,
    /// Delay between approval status polls
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Give up waiting for approval after this long
    #[serde(with = "humantime_serde")]
    pub approval_timeout: Duration,
    /// Timeout for each HTTP request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            probe: true,
            poll_interval: Duration::from_millis(crate::DEFAULT_POLL_INTERVAL_MS),
            approval_timeout: Duration::from_secs(crate::DEFAULT_APPROVAL_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(crate::DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl PairingConfig {
    /// Reject a zero poll interval or approval timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::ConfigError(
                "pairing.poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.approval_timeout.is_zero() {
            return Err(Error::ConfigError(
                "pairing.approval_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read or
    /// parsed, or holds invalid settings.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// holds invalid settings (see [`Config::validate`]).
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        config.validate()?;

        Ok(config)
    }

    /// Check values that would make the client misbehave.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.pairing.validate()
    }

    /// Save configuration to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| Error::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "timescape", "Timescape")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.strip_suffix("ms")
            .map(|millis| {
                millis
                    .parse()
                    .map(Duration::from_millis)
                    .map_err(serde::de::Error::custom)
            })
            .or_else(|| {
                s.strip_suffix('s').map(|secs| {
                    secs.parse()
                        .map(Duration::from_secs)
                        .map_err(serde::de::Error::custom)
                })
            })
            .or_else(|| {
                s.strip_suffix('m').map(|mins| {
                    mins.parse::<u64>()
                        .map_err(serde::de::Error::custom)
                        .and_then(|m| {
                            m.checked_mul(60)
                                .map(Duration::from_secs)
                                .ok_or_else(|| serde::de::Error::custom("duration too large"))
                        })
                })
            })
            .unwrap_or_else(|| Err(serde::de::Error::custom("invalid duration format")))
    }
}
