//! mDNS/DNS-SD discovery for Timescape.
//!
//! Each scan runs its own `mdns-sd` daemon browsing the companion service
//! type. A pump task reads daemon events: `ServiceFound` becomes an
//! [`Advertisement`], and `ServiceResolved` completes the pending
//! [`ServiceResolver::resolve`] call for that instance.
//!
//! ## TXT Records
//!
//! Companions may publish a `device_name` TXT property; it is preferred over
//! the instance name for display.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use super::{
    Advertisement, AdvertisementSource, DiscoveredService, Scan, ScanStop, ServiceResolver,
};
use crate::error::{Error, Result};

/// TXT record keys read from companion advertisements.
pub mod txt_keys {
    /// Human-readable device name
    pub const DEVICE_NAME: &str = "device_name";
}

/// mDNS advertisement source.
///
/// Stateless; every call to [`AdvertisementSource::start`] creates a fresh
/// daemon that lives until the scan is stopped or dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct MdnsSource;

impl AdvertisementSource for MdnsSource {
    fn start(&self, service_type: &str) -> Result<Scan> {
        let daemon =
            ServiceDaemon::new().map_err(|e| Error::Discovery(format!("mDNS daemon error: {e}")))?;

        let receiver = daemon
            .browse(service_type)
            .map_err(|e| Error::Discovery(format!("Failed to browse mDNS services: {e}")))?;

        let (advertisement_tx, advertisement_rx) = mpsc::unbounded_channel();
        let resolver = Arc::new(MdnsResolver::default());

        let pump = tokio::spawn(pump_events(
            receiver,
            advertisement_tx,
            Arc::clone(&resolver),
            service_type.to_string(),
        ));

        tracing::debug!(service_type, "Browsing mDNS");

        Ok(Scan {
            advertisements: advertisement_rx,
            resolver,
            stop: Box::new(MdnsScan {
                daemon: Some(daemon),
                service_type: service_type.to_string(),
                pump,
            }),
        })
    }
}

/// Resolver fed by the daemon's `ServiceResolved` events.
#[derive(Debug, Default)]
pub struct MdnsResolver {
    /// Resolution outcome per full instance name; `None` if unusable
    resolved: DashMap<String, Option<DiscoveredService>>,
    notify: Notify,
}

impl MdnsResolver {
    fn complete(&self, fullname: String, service: Option<DiscoveredService>) {
        self.resolved.insert(fullname, service);
        self.notify.notify_waiters();
    }

    fn lookup(&self, fullname: &str) -> Option<Option<DiscoveredService>> {
        self.resolved.get(fullname).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl ServiceResolver for MdnsResolver {
    async fn resolve(&self, advertisement: &Advertisement) -> Result<DiscoveredService> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.lookup(&advertisement.fullname) {
                Some(Some(service)) => return Ok(service),
                Some(None) => {
                    return Err(Error::Discovery(format!(
                        "'{}' resolved without a usable address",
                        advertisement.fullname
                    )))
                }
                None => notified.await,
            }
        }
    }
}

/// Running mDNS scan; stops browsing and shuts the daemon down.
struct MdnsScan {
    /// The mDNS daemon (wrapped in Option to support Drop)
    daemon: Option<ServiceDaemon>,
    service_type: String,
    pump: JoinHandle<()>,
}

impl MdnsScan {
    fn shutdown(&mut self) -> Result<()> {
        self.pump.abort();

        let Some(daemon) = self.daemon.take() else {
            return Ok(());
        };

        let stopped = daemon
            .stop_browse(&self.service_type)
            .map_err(|e| Error::Discovery(format!("Failed to stop mDNS browse: {e}")));

        // The status receiver is dropped; waiting on it would block the runtime.
        let shut = daemon
            .shutdown()
            .map(drop)
            .map_err(|e| Error::Discovery(format!("Failed to shutdown mDNS daemon: {e}")));

        stopped.and(shut)
    }
}

impl ScanStop for MdnsScan {
    fn stop(mut self: Box<Self>) -> Result<()> {
        let result = self.shutdown();
        tracing::debug!(service_type = %self.service_type, "mDNS scan stopped");
        result
    }
}

impl Drop for MdnsScan {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::debug!("mDNS scan shutdown during drop: {e}");
        }
    }
}

async fn pump_events(
    receiver: flume::Receiver<ServiceEvent>,
    advertisements: mpsc::UnboundedSender<Advertisement>,
    resolver: Arc<MdnsResolver>,
    service_type: String,
) {
    let mut announced = HashSet::new();

    while let Ok(event) = receiver.recv_async().await {
        match event {
            ServiceEvent::ServiceFound(ty, fullname) => {
                if announced.insert(fullname.clone()) {
                    let name = instance_name(&fullname, &ty);
                    if advertisements
                        .send(Advertisement::new(name, ty, fullname))
                        .is_err()
                    {
                        break;
                    }
                }
            }
            ServiceEvent::ServiceResolved(info) => {
                let fullname = info.get_fullname().to_string();
                let service = service_from_info(&info, &service_type);
                if service.is_none() {
                    tracing::debug!(instance = %fullname, "Resolved service has no usable address");
                }
                resolver.complete(fullname.clone(), service);

                // Cached records can resolve without a prior ServiceFound.
                if announced.insert(fullname.clone()) {
                    let ty = info.get_type().to_string();
                    let name = instance_name(&fullname, &ty);
                    if advertisements
                        .send(Advertisement::new(name, ty, fullname))
                        .is_err()
                    {
                        break;
                    }
                }
            }
            ServiceEvent::SearchStopped(_) => break,
            other => tracing::trace!(?other, "mDNS event"),
        }
    }
}

/// Strip the service type from a full instance name.
fn instance_name(fullname: &str, service_type: &str) -> String {
    fullname
        .strip_suffix(service_type)
        .map(|name| name.trim_end_matches('.'))
        .filter(|name| !name.is_empty())
        .unwrap_or(fullname)
        .to_string()
}

/// Build a [`DiscoveredService`] from a resolved record.
///
/// Prefers an IPv4 address, then any address, then the advertised hostname.
fn service_from_info(info: &ServiceInfo, service_type: &str) -> Option<DiscoveredService> {
    let port = info.get_port();
    if port == 0 {
        return None;
    }

    let addresses = info.get_addresses();
    let host = addresses
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addresses.iter().next())
        .map(ToString::to_string)
        .or_else(|| {
            let hostname = info.get_hostname().trim_end_matches('.');
            (!hostname.is_empty()).then(|| hostname.to_string())
        })?;

    let display_name = info
        .get_properties()
        .get(txt_keys::DEVICE_NAME)
        .map(|p| p.val_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| instance_name(info.get_fullname(), service_type));

    Some(DiscoveredService {
        display_name,
        host,
        port,
    })
}
