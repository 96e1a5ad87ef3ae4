//! Import state machine and controller.
//!
//! [`ImportController`] owns the current [`ImportState`] and runs discovery
//! and pairing on background tasks. Every user action that starts, restarts
//! or abandons work bumps the controller's [`AttemptId`]; background tasks
//! tag each event they send with the attempt that spawned them, and events
//! carrying an older tag are dropped when they arrive. A superseded task is
//! also aborted, but tagging alone keeps late events from leaking into a
//! newer attempt.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut controller = ImportController::from_config(&config)?;
//! controller.discover();
//!
//! loop {
//!     match controller.next_update().await {
//!         ImportState::DeviceList(services) => { /* show list, call select() */ }
//!         ImportState::Imported(count) => break,
//!         ImportState::Failed(message) => { /* show message, retry() or close() */ }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! A UI that prefers to watch rather than drive the loop can
//! [`subscribe`](ImportController::subscribe) to state snapshots.

mod state;

pub use state::{reduce, transition, ImportEvent, ImportState};

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::connection::{parse_address, ConnectionTarget};
use crate::discovery::{DiscoveredService, Discoverer};
use crate::error::Result;
use crate::notes::NoteRecord;
use crate::pairing::PairingClient;

/// Identifies one import attempt. Increases with every new attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AttemptId(u64);

impl AttemptId {
    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An event produced on behalf of a specific attempt.
#[derive(Debug, Clone)]
pub struct AttemptEvent {
    /// Attempt that produced the event
    pub attempt: AttemptId,
    /// The event itself
    pub event: ImportEvent,
}

impl AttemptEvent {
    /// Tag `event` with `attempt`.
    #[must_use]
    pub fn new(attempt: AttemptId, event: ImportEvent) -> Self {
        Self { attempt, event }
    }
}

/// Drives discovery and pairing, and owns the import state.
///
/// Background work is spawned onto the current Tokio runtime, so the action
/// methods must be called from within one.
pub struct ImportController {
    discoverer: Discoverer,
    client: PairingClient,
    client_name: String,
    discovery_timeout: Duration,

    state: ImportState,
    attempt: AttemptId,
    notes: Vec<NoteRecord>,
    task: Option<JoinHandle<()>>,

    event_tx: mpsc::UnboundedSender<AttemptEvent>,
    event_rx: mpsc::UnboundedReceiver<AttemptEvent>,
    state_tx: watch::Sender<ImportState>,
}

impl fmt::Debug for ImportController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportController")
            .field("state", &self.state)
            .field("attempt", &self.attempt)
            .field("notes", &self.notes.len())
            .field("client_name", &self.client_name)
            .finish_non_exhaustive()
    }
}

impl ImportController {
    /// Create a controller.
    pub fn new(
        discoverer: Discoverer,
        client: PairingClient,
        client_name: impl Into<String>,
        discovery_timeout: Duration,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ImportState::Idle);

        Self {
            discoverer,
            client,
            client_name: client_name.into(),
            discovery_timeout,
            state: ImportState::Idle,
            attempt: AttemptId::default(),
            notes: Vec::new(),
            task: None,
            event_tx,
            event_rx,
            state_tx,
        }
    }

    /// Create an mDNS-backed controller from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    #[cfg(feature = "mdns")]
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        Ok(Self::new(
            Discoverer::mdns(&config.discovery),
            PairingClient::new(config.pairing.clone())?,
            config.general.client_name.clone(),
            config.discovery.timeout,
        ))
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &ImportState {
        &self.state
    }

    /// Current attempt.
    #[must_use]
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Notes from the most recent successful import.
    #[must_use]
    pub fn notes(&self) -> &[NoteRecord] {
        &self.notes
    }

    /// Take ownership of the imported notes, leaving none behind.
    pub fn take_notes(&mut self) -> Vec<NoteRecord> {
        std::mem::take(&mut self.notes)
    }

    /// Watch state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ImportState> {
        self.state_tx.subscribe()
    }

    /// Start a discovery scan, abandoning whatever was in flight.
    pub fn discover(&mut self) {
        self.start_discovery(ImportEvent::Discover);
    }

    /// Scan again after a failure. Ignored in any other state.
    pub fn retry(&mut self) {
        self.start_discovery(ImportEvent::Retry);
    }

    /// Pair with a device from the current device list.
    ///
    /// Returns `false` if no device list is showing.
    pub fn select(&mut self, target: ConnectionTarget) -> bool {
        self.start_pairing(target.clone(), ImportEvent::Select(target))
    }

    /// Pair with the `index`th entry of the current device list.
    ///
    /// Returns `false` if no device list is showing or the index is out of range.
    pub fn select_index(&mut self, index: usize) -> bool {
        let target = match &self.state {
            ImportState::DeviceList(services) => {
                services.get(index).map(DiscoveredService::target)
            }
            _ => None,
        };

        target.is_some_and(|target| self.select(target))
    }

    /// Pair with a typed `host:port` address, abandoning whatever was in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`](crate::Error::InvalidFormat) if the
    /// address does not parse; the state is left untouched.
    pub fn manual_connect(&mut self, raw: &str) -> Result<()> {
        let target = parse_address(raw)?;
        self.start_pairing(target.clone(), ImportEvent::ManualConnect(target));
        Ok(())
    }

    /// Abandon the in-flight attempt and return to idle.
    pub fn cancel(&mut self) {
        self.begin(ImportEvent::Cancel);
    }

    /// Dismiss a finished attempt and return to idle.
    pub fn close(&mut self) {
        self.begin(ImportEvent::Close);
    }

    /// Apply an event from a background task.
    ///
    /// Returns `true` if the state changed. Events from superseded attempts
    /// and events that are invalid in the current state are dropped.
    pub fn apply(&mut self, message: AttemptEvent) -> bool {
        if message.attempt != self.attempt {
            tracing::debug!(
                attempt = %message.attempt,
                current = %self.attempt,
                event = message.event.name(),
                "Discarding stale event"
            );
            return false;
        }

        let imported = match &message.event {
            ImportEvent::PayloadReady(notes) => Some(notes.clone()),
            _ => None,
        };

        let Some(next) = self.step(message.event) else {
            return false;
        };

        if let Some(notes) = imported {
            self.notes = notes;
        }
        if !next.is_busy() {
            self.task = None;
        }
        self.set_state(next);
        true
    }

    /// Wait for the next state change caused by background work.
    ///
    /// Stale and invalid events are consumed silently. If nothing is in
    /// flight this waits until a new action is taken elsewhere, so callers
    /// should only await it while [`ImportState::is_busy`] holds.
    pub async fn next_update(&mut self) -> ImportState {
        // `event_tx` lives as long as `self`, so the channel never closes.
        while let Some(message) = self.event_rx.recv().await {
            if self.apply(message) {
                break;
            }
        }
        self.state.clone()
    }

    fn start_discovery(&mut self, event: ImportEvent) {
        let Some(attempt) = self.begin(event) else {
            return;
        };

        let discoverer = self.discoverer.clone();
        let timeout = self.discovery_timeout;
        let tx = self.event_tx.clone();

        self.spawn(async move {
            let services = discoverer.discover(timeout).await;
            let _ = tx.send(AttemptEvent::new(attempt, ImportEvent::Found(services)));
        });
    }

    fn start_pairing(&mut self, target: ConnectionTarget, event: ImportEvent) -> bool {
        let Some(attempt) = self.begin(event) else {
            return false;
        };

        let client = self.client.clone();
        let client_name = self.client_name.clone();
        let tx = self.event_tx.clone();

        self.spawn(async move {
            let waiting_tx = tx.clone();
            let downloading_tx = tx.clone();

            let result = client
                .import_from_target(
                    &target,
                    &client_name,
                    move || {
                        let _ = waiting_tx
                            .send(AttemptEvent::new(attempt, ImportEvent::SessionObtained));
                    },
                    move || {
                        let _ = downloading_tx
                            .send(AttemptEvent::new(attempt, ImportEvent::Approved));
                    },
                )
                .await;

            let event = match result {
                Ok(notes) => ImportEvent::PayloadReady(notes),
                Err(e) => ImportEvent::Error(e.to_string()),
            };
            let _ = tx.send(AttemptEvent::new(attempt, event));
        });

        true
    }

    /// Apply a user action. Valid actions start a new attempt and abort the
    /// previous task; invalid ones change nothing.
    fn begin(&mut self, event: ImportEvent) -> Option<AttemptId> {
        let next = self.step(event)?;

        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.attempt = self.attempt.next();
        self.set_state(next);

        Some(self.attempt)
    }

    fn step(&self, event: ImportEvent) -> Option<ImportState> {
        let name = event.name();
        let next = transition(&self.state, event);
        if next.is_none() {
            tracing::trace!(state = self.state.name(), event = name, "Ignoring event");
        }
        next
    }

    fn spawn<F>(&mut self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.task = Some(tokio::spawn(work));
    }

    fn set_state(&mut self, next: ImportState) {
        tracing::debug!(
            attempt = %self.attempt,
            from = self.state.name(),
            to = next.name(),
            "Import state changed"
        );
        self.state = next.clone();
        self.state_tx.send_replace(next);
    }
}

impl Drop for ImportController {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
