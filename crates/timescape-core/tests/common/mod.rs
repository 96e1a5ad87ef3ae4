//! Common test utilities for `Timescape` integration tests.
//!
//! Provides a scripted companion HTTP server and a scripted discovery source.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use timescape_core::config::PairingConfig;
use timescape_core::connection::ConnectionTarget;
use timescape_core::discovery::{
    Advertisement, AdvertisementSource, DiscoveredService, Scan, ScanStop, ServiceResolver,
};
use timescape_core::{Error, Result};

/// Responses the mock companion gives, per endpoint.
#[derive(Debug, Clone)]
pub struct Script {
    /// Status returned by `/meta`
    pub meta: StatusCode,
    /// Status and body returned by `/session/request`
    pub session: (StatusCode, Value),
    /// Responses to successive `/session/status` polls; the last one repeats
    pub statuses: Vec<(StatusCode, Value)>,
    /// Status and raw body returned by `/export`
    pub export: (StatusCode, String),
}

impl Default for Script {
    fn default() -> Self {
        Self {
            meta: StatusCode::OK,
            session: (StatusCode::OK, json!({ "sessionId": "s1" })),
            statuses: vec![
                (StatusCode::OK, json!({ "status": "PENDING" })),
                (StatusCode::OK, json!({ "status": "APPROVED", "token": "tok1" })),
            ],
            export: (StatusCode::OK, sample_export(2)),
        }
    }
}

/// Request log kept by the mock companion.
#[derive(Debug, Default)]
pub struct Calls {
    pub meta: AtomicUsize,
    pub session: AtomicUsize,
    pub status: AtomicUsize,
    pub export: AtomicUsize,
    pub session_bodies: Mutex<Vec<Value>>,
    pub polled_sessions: Mutex<Vec<String>>,
    pub export_tokens: Mutex<Vec<String>>,
}

impl Calls {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct Shared {
    script: Script,
    calls: Arc<Calls>,
}

/// A companion HTTP server bound to an ephemeral localhost port.
pub struct MockCompanion {
    pub addr: SocketAddr,
    pub calls: Arc<Calls>,
    server: tokio::task::JoinHandle<()>,
}

impl MockCompanion {
    /// Start serving `script`.
    pub async fn start(script: Script) -> Self {
        let calls = Arc::new(Calls::default());
        let shared = Arc::new(Shared {
            script,
            calls: Arc::clone(&calls),
        });

        let app = Router::new()
            .route("/meta", get(meta))
            .route("/session/request", post(session_request))
            .route("/session/status", get(session_status))
            .route("/export", get(export))
            .with_state(shared);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock companion");
        let addr = listener.local_addr().expect("local addr");

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            calls,
            server,
        }
    }

    /// Connection target for this companion.
    pub fn target(&self) -> ConnectionTarget {
        ConnectionTarget::new("127.0.0.1", self.addr.port()).expect("valid target")
    }

    /// `host:port` string for manual entry.
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.addr.port())
    }
}

impl Drop for MockCompanion {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn meta(State(shared): State<Arc<Shared>>) -> StatusCode {
    shared.calls.meta.fetch_add(1, Ordering::SeqCst);
    shared.script.meta
}

async fn session_request(
    State(shared): State<Arc<Shared>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    shared.calls.session.fetch_add(1, Ordering::SeqCst);
    shared.calls.session_bodies.lock().unwrap().push(body);

    let (status, body) = shared.script.session.clone();
    (status, Json(body))
}

async fn session_status(
    State(shared): State<Arc<Shared>>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let n = shared.calls.status.fetch_add(1, Ordering::SeqCst);
    if let Some(id) = query.get("sessionId") {
        shared.calls.polled_sessions.lock().unwrap().push(id.clone());
    }

    let statuses = &shared.script.statuses;
    let (status, body) = statuses[n.min(statuses.len() - 1)].clone();
    (status, Json(body))
}

async fn export(
    State(shared): State<Arc<Shared>>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    shared.calls.export.fetch_add(1, Ordering::SeqCst);
    if let Some(token) = query.get("token") {
        shared.calls.export_tokens.lock().unwrap().push(token.clone());
    }

    let (status, body) = shared.script.export.clone();
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

/// An export payload with `count` notes.
pub fn sample_export(count: usize) -> String {
    let notes: Vec<Value> = (1..=count)
        .map(|i| {
            json!({
                "id": i,
                "flowId": 10,
                "flowName": "Biology",
                "cardId": 100 + i,
                "cardTitle": format!("Card {i}"),
                "color": "#FFF59D",
                "rotation": -2.5,
                "front": { "label": "Q", "text": format!("Question {i}") },
                "back": { "label": "A", "text": format!("Answer {i}") }
            })
        })
        .collect();

    json!({
        "version": 1,
        "generatedAt": 1_700_000_000_000_i64,
        "stickyNotes": notes,
        "totalStickyNotes": count,
        "totalFlows": 1
    })
    .to_string()
}

/// Pairing settings with short intervals for tests.
pub fn fast_pairing() -> PairingConfig {
    PairingConfig {
        probe: true,
        poll_interval: Duration::from_millis(10),
        approval_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(2),
    }
}

/// A discovered service for a fake device.
pub fn service(name: &str, host: &str, port: u16) -> DiscoveredService {
    DiscoveredService {
        display_name: name.to_string(),
        host: host.to_string(),
        port,
    }
}

/// One scripted advertisement and how it resolves.
#[derive(Debug, Clone)]
pub struct FakeAd {
    pub advertisement: Advertisement,
    /// `None` makes resolution fail
    pub resolves_to: Option<DiscoveredService>,
    /// Delay before the advertisement is announced
    pub announce_after: Duration,
    /// Time the resolution takes
    pub resolve_after: Duration,
}

impl FakeAd {
    /// An advertisement announced and resolved immediately.
    pub fn instant(service: DiscoveredService) -> Self {
        let fullname = format!("{}.{}", service.display_name, timescape_core::SERVICE_TYPE);
        Self {
            advertisement: Advertisement::new(
                service.display_name.clone(),
                timescape_core::SERVICE_TYPE,
                fullname,
            ),
            resolves_to: Some(service),
            announce_after: Duration::ZERO,
            resolve_after: Duration::ZERO,
        }
    }

    pub fn announced_after(mut self, delay: Duration) -> Self {
        self.announce_after = delay;
        self
    }

    pub fn resolved_after(mut self, delay: Duration) -> Self {
        self.resolve_after = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.resolves_to = None;
        self
    }

    pub fn with_service_type(mut self, service_type: &str) -> Self {
        self.advertisement.service_type = service_type.to_string();
        self
    }
}

/// Scripted discovery source.
#[derive(Debug, Clone, Default)]
pub struct FakeSource {
    pub ads: Vec<FakeAd>,
    /// Advertisements for the second and later scans; `ads` is reused once
    /// these run out
    pub rescans: Vec<Vec<FakeAd>>,
    pub fail_start: bool,
    pub fail_stop: bool,
    /// End the scan once every advertisement has been announced
    pub finish_after_announce: bool,
    pub stops: Arc<AtomicUsize>,
    pub starts: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new(ads: Vec<FakeAd>) -> Self {
        Self {
            ads,
            ..Self::default()
        }
    }
}

impl AdvertisementSource for FakeSource {
    fn start(&self, _service_type: &str) -> Result<Scan> {
        if self.fail_start {
            return Err(Error::Discovery("scanner unavailable".to_string()));
        }

        let scan = self.starts.fetch_add(1, Ordering::SeqCst);
        let ads = scan
            .checked_sub(1)
            .and_then(|i| self.rescans.get(i))
            .unwrap_or(&self.ads)
            .clone();

        let (tx, rx) = mpsc::unbounded_channel();
        let finish = self.finish_after_announce;

        let announcer = {
            let tx = tx.clone();
            let ads = ads.clone();
            tokio::spawn(async move {
                for ad in ads {
                    tokio::time::sleep(ad.announce_after).await;
                    if tx.send(ad.advertisement).is_err() {
                        return;
                    }
                }
                if finish {
                    drop(tx);
                } else {
                    std::future::pending::<()>().await;
                }
            })
        };

        let resolutions = ads
            .iter()
            .map(|ad| {
                (
                    ad.advertisement.fullname.clone(),
                    (ad.resolves_to.clone(), ad.resolve_after),
                )
            })
            .collect();

        // With `finish_after_announce`, only the announcer holds a sender.
        let held = (!finish).then_some(tx);

        Ok(Scan {
            advertisements: rx,
            resolver: Arc::new(FakeResolver { resolutions }),
            stop: Box::new(FakeStop {
                _sender: held,
                announcer,
                fail: self.fail_stop,
                stops: Arc::clone(&self.stops),
            }),
        })
    }
}

struct FakeResolver {
    resolutions: HashMap<String, (Option<DiscoveredService>, Duration)>,
}

#[async_trait]
impl ServiceResolver for FakeResolver {
    async fn resolve(&self, advertisement: &Advertisement) -> Result<DiscoveredService> {
        let (service, delay) = self
            .resolutions
            .get(&advertisement.fullname)
            .cloned()
            .ok_or_else(|| Error::Discovery("unknown advertisement".to_string()))?;

        tokio::time::sleep(delay).await;
        service.ok_or_else(|| Error::Discovery("resolution failed".to_string()))
    }
}

struct FakeStop {
    _sender: Option<mpsc::UnboundedSender<Advertisement>>,
    announcer: tokio::task::JoinHandle<()>,
    fail: bool,
    stops: Arc<AtomicUsize>,
}

impl ScanStop for FakeStop {
    fn stop(self: Box<Self>) -> Result<()> {
        self.announcer.abort();
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(Error::Discovery("stop failed".to_string()))
        } else {
            Ok(())
        }
    }
}
