//! Connection targets for the pairing client.
//!
//! A target is either picked from discovery results or typed in by hand as
//! `host:port`. Manual entry only covers IPv4 addresses and hostnames; the
//! address is split at its single `:` separator.

use std::fmt;

use crate::error::{Error, Result};

/// Host and port of a companion to import from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionTarget {
    /// Hostname or IP address
    pub host: String,
    /// TCP port, never zero
    pub port: u16,
}

impl ConnectionTarget {
    /// Create a target, validating the host and port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if the host is empty or the port is zero.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        if host.is_empty() || port == 0 {
            return Err(Error::InvalidFormat(format!("{host}:{port}")));
        }
        Ok(Self { host, port })
    }

    /// Base URL for HTTP requests against this target.
    ///
    /// IPv6 literals are wrapped in brackets.
    #[must_use]
    pub fn base_url(&self) -> String {
        if self.host.contains(':') {
            format!("http://[{}]:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parse a user-typed `host:port` string into a [`ConnectionTarget`].
///
/// # Examples
///
/// ```
/// use timescape_core::connection::parse_address;
///
/// let target = parse_address("10.0.0.5:8080").unwrap();
/// assert_eq!(target.host, "10.0.0.5");
/// assert_eq!(target.port, 8080);
///
/// assert!(parse_address("10.0.0.5").is_err());
/// ```
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] if there is no `:`, the host is empty,
/// or the port is not a number in `1..=65535`.
pub fn parse_address(raw: &str) -> Result<ConnectionTarget> {
    let trimmed = raw.trim();
    let invalid = || Error::InvalidFormat(trimmed.to_string());

    let (host, port) = trimmed.split_once(':').ok_or_else(invalid)?;
    if host.is_empty() {
        return Err(invalid());
    }

    let port: u32 = port.parse().map_err(|_| invalid())?;
    let port = u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(invalid)?;

    Ok(ConnectionTarget {
        host: host.to_string(),
        port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4_with_port() {
        let target = parse_address("10.0.0.5:8080").unwrap();
        assert_eq!(target.host, "10.0.0.5");
        assert_eq!(target.port, 8080);
    }

    #[test]
    fn test_parse_hostname() {
        let target = parse_address("pixel.local:8765").unwrap();
        assert_eq!(target.host, "pixel.local");
        assert_eq!(target.port, 8765);
    }

    #[test]
    fn test_parse_whitespace() {
        let target = parse_address("  192.168.1.100:52540  ").unwrap();
        assert_eq!(target.host, "192.168.1.100");
        assert_eq!(target.port, 52540);
    }

    #[test]
    fn test_parse_port_bounds() {
        assert_eq!(parse_address("h:1").unwrap().port, 1);
        assert_eq!(parse_address("h:65535").unwrap().port, 65535);
    }

    #[test]
    fn test_parse_invalid() {
        for raw in [
            "nocolon",
            ":80",
            "host:",
            "host:99999",
            "host:0",
            "host:abc",
            "host:-1",
            "",
            "   ",
            "::1:80",
        ] {
            assert!(
                matches!(parse_address(raw), Err(Error::InvalidFormat(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_target_new_validates() {
        assert!(ConnectionTarget::new("", 80).is_err());
        assert!(ConnectionTarget::new("host", 0).is_err());
        assert!(ConnectionTarget::new("host", 80).is_ok());
    }

    #[test]
    fn test_display_and_base_url() {
        let target = ConnectionTarget::new("10.0.0.5", 8080).unwrap();
        assert_eq!(target.to_string(), "10.0.0.5:8080");
        assert_eq!(target.base_url(), "http://10.0.0.5:8080");

        let v6 = ConnectionTarget::new("fe80::1", 8080).unwrap();
        assert_eq!(v6.base_url(), "http://[fe80::1]:8080");
    }
}
