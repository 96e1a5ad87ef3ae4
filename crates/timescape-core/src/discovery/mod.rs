//! Local network discovery for Timescape.
//!
//! Companions advertise themselves with a single well-known service type
//! (`_timescape._tcp.local.` by default). A scan has two stages:
//!
//! 1. An [`AdvertisementSource`] pushes [`Advertisement`]s as they are seen.
//! 2. Each advertisement is handed to a [`ServiceResolver`] on its own task,
//!    which turns it into a concrete host, port and display name.
//!
//! [`Discoverer::discover`] drives both for a fixed duration, collecting
//! results into a concurrent map keyed by `host:port`, and returns them
//! sorted by display name. Resolutions still running at the deadline are
//! abandoned. Discovery never fails from the caller's point of view: any
//! problem just means fewer (or no) services in the result.
//!
//! ## mDNS
//!
//! With the `mdns` feature (on by default), [`mdns::MdnsSource`] implements
//! the source and resolver on top of `mdns-sd`.

#[cfg(feature = "mdns")]
pub mod mdns;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::connection::ConnectionTarget;
use crate::error::Result;

/// An announced but not yet resolved service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Instance name, e.g. `Pixel 8`
    pub name: String,
    /// Service type the instance was announced under
    pub service_type: String,
    /// Fully qualified instance name, unique per scan
    pub fullname: String,
}

impl Advertisement {
    /// Create a new advertisement.
    pub fn new(
        name: impl Into<String>,
        service_type: impl Into<String>,
        fullname: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
            fullname: fullname.into(),
        }
    }
}

/// A companion resolved to a reachable endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredService {
    /// Name to show in a device list
    pub display_name: String,
    /// IP address or hostname
    pub host: String,
    /// TCP port of the companion's HTTP server
    pub port: u16,
}

impl DiscoveredService {
    /// Identity of the service within a scan (`host:port`).
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection target for this service.
    #[must_use]
    pub fn target(&self) -> ConnectionTarget {
        ConnectionTarget {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

impl fmt::Display for DiscoveredService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.display_name, self.host, self.port)
    }
}

/// Resolves advertisements into concrete endpoints.
#[async_trait]
pub trait ServiceResolver: Send + Sync {
    /// Resolve one advertisement.
    ///
    /// May wait indefinitely; the discoverer abandons it at the scan deadline.
    async fn resolve(&self, advertisement: &Advertisement) -> Result<DiscoveredService>;
}

/// Stops a running scan.
pub trait ScanStop: Send {
    /// Stop scanning and release platform resources.
    fn stop(self: Box<Self>) -> Result<()>;
}

/// A running scan started by an [`AdvertisementSource`].
pub struct Scan {
    /// Advertisements as they are announced
    pub advertisements: mpsc::UnboundedReceiver<Advertisement>,
    /// Resolver bound to this scan
    pub resolver: Arc<dyn ServiceResolver>,
    /// Handle that stops the scan
    pub stop: Box<dyn ScanStop>,
}

/// Platform scanner producing advertisements for one service type.
pub trait AdvertisementSource: Send + Sync {
    /// Start scanning for `service_type`.
    ///
    /// Must be called from within a Tokio runtime.
    fn start(&self, service_type: &str) -> Result<Scan>;
}

/// Runs bounded discovery scans.
#[derive(Clone)]
pub struct Discoverer {
    source: Arc<dyn AdvertisementSource>,
    service_type: String,
}

impl fmt::Debug for Discoverer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Discoverer")
            .field("service_type", &self.service_type)
            .finish_non_exhaustive()
    }
}

impl Discoverer {
    /// Create a discoverer scanning `source` for `service_type`.
    pub fn new(source: Arc<dyn AdvertisementSource>, service_type: impl Into<String>) -> Self {
        Self {
            source,
            service_type: service_type.into(),
        }
    }

    /// Create an mDNS-backed discoverer for the configured service type.
    #[cfg(feature = "mdns")]
    #[must_use]
    pub fn mdns(config: &crate::config::DiscoveryConfig) -> Self {
        Self::new(Arc::new(mdns::MdnsSource), config.service_type.clone())
    }

    /// The service type this discoverer scans for.
    #[must_use]
    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    /// Scan for `timeout` and return every service resolved in that window.
    ///
    /// The result is deduplicated by `host:port` and sorted by display name,
    /// then by `host:port`. Returns an empty list if nothing resolved.
    pub async fn discover(&self, timeout: Duration) -> Vec<DiscoveredService> {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let Scan {
            mut advertisements,
            resolver,
            stop,
        } = match self.source.start(&self.service_type) {
            Ok(scan) => scan,
            Err(e) => {
                tracing::warn!(service_type = %self.service_type, "Failed to start discovery: {e}");
                return Vec::new();
            }
        };

        tracing::debug!(service_type = %self.service_type, ?timeout, "Discovery started");

        let found: Arc<DashMap<String, DiscoveredService>> = Arc::new(DashMap::new());
        let mut resolutions = JoinSet::new();
        let mut scanning = true;

        loop {
            if !scanning && resolutions.is_empty() {
                break;
            }

            tokio::select! {
                () = &mut deadline => break,
                advertisement = advertisements.recv(), if scanning => {
                    let Some(advertisement) = advertisement else {
                        scanning = false;
                        continue;
                    };

                    if !matches_service_type(&advertisement.service_type, &self.service_type) {
                        tracing::trace!(
                            name = %advertisement.name,
                            service_type = %advertisement.service_type,
                            "Ignoring advertisement for another service type"
                        );
                        continue;
                    }

                    let resolver = Arc::clone(&resolver);
                    let found = Arc::clone(&found);
                    resolutions.spawn(async move {
                        match resolver.resolve(&advertisement).await {
                            Ok(service) => {
                                tracing::debug!(
                                    name = %service.display_name,
                                    address = %service.key(),
                                    "Resolved service"
                                );
                                found.insert(service.key(), service);
                            }
                            Err(e) => {
                                tracing::debug!(name = %advertisement.name, "Resolution failed: {e}");
                            }
                        }
                    });
                }
                Some(joined) = resolutions.join_next(), if !resolutions.is_empty() => {
                    if let Err(e) = joined {
                        tracing::debug!("Resolution task ended abnormally: {e}");
                    }
                }
            }
        }

        if !resolutions.is_empty() {
            tracing::debug!(pending = resolutions.len(), "Abandoning unfinished resolutions");
        }
        resolutions.abort_all();

        if let Err(e) = stop.stop() {
            tracing::debug!("Failed to stop discovery scan: {e}");
        }

        let mut services: Vec<DiscoveredService> =
            found.iter().map(|entry| entry.value().clone()).collect();
        sort_services(&mut services);

        tracing::info!(count = services.len(), "Discovery finished");

        services
    }
}

/// Sort by display name, breaking ties by `host:port`.
pub fn sort_services(services: &mut [DiscoveredService]) {
    services.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then_with(|| a.key().cmp(&b.key()))
    });
}

/// Compare service types ignoring case, trailing dots and the `.local` domain.
#[must_use]
pub fn matches_service_type(announced: &str, wanted: &str) -> bool {
    fn normalize(service_type: &str) -> String {
        let lower = service_type.trim().trim_end_matches('.').to_ascii_lowercase();
        lower.strip_suffix(".local").unwrap_or(&lower).to_string()
    }

    normalize(announced) == normalize(wanted)
}
