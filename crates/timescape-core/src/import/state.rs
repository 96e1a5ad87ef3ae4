//! Import states, events and the reducer.
//!
//! ```text
//! Idle ──Discover──▶ Searching ──Found──▶ DeviceList
//!                                             │ Select / ManualConnect
//!                                             ▼
//!            Failed ◀──Error── RequestingApproval ──SessionObtained──▶ Waiting
//!              ▲                                                        │ Approved
//!              └───────────────Error─────────── Downloading ◀───────────┘
//!                                                   │ PayloadReady
//!                                                   ▼
//!                                               Imported
//! ```
//!
//! `Imported` and `Failed` return to `Idle` on `Close`. `Failed` can also
//! `Retry` (back to `Searching`) or `ManualConnect`. `Discover` and
//! `ManualConnect` are accepted in every state so a new attempt can replace
//! one in flight, and `Cancel` abandons any in-flight state.

use crate::connection::ConnectionTarget;
use crate::discovery::DiscoveredService;
use crate::notes::NoteRecord;

/// Where an import currently stands.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ImportState {
    /// Nothing happening
    #[default]
    Idle,
    /// Discovery scan running
    Searching,
    /// Scan finished; pick a device
    DeviceList(Vec<DiscoveredService>),
    /// Asking the companion for a session
    RequestingApproval(ConnectionTarget),
    /// Waiting for the user to approve on the companion
    Waiting(ConnectionTarget),
    /// Approved; fetching the export
    Downloading(ConnectionTarget),
    /// Done; number of notes imported
    Imported(usize),
    /// Attempt failed with a user-facing message
    Failed(String),
}

impl ImportState {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Searching => "searching",
            Self::DeviceList(_) => "device_list",
            Self::RequestingApproval(_) => "requesting_approval",
            Self::Waiting(_) => "waiting",
            Self::Downloading(_) => "downloading",
            Self::Imported(_) => "imported",
            Self::Failed(_) => "failed",
        }
    }

    /// Whether a background task is working on this state.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Searching | Self::RequestingApproval(_) | Self::Waiting(_) | Self::Downloading(_)
        )
    }

    /// The companion this state is talking to, if any.
    #[must_use]
    pub const fn target(&self) -> Option<&ConnectionTarget> {
        match self {
            Self::RequestingApproval(target) | Self::Waiting(target) | Self::Downloading(target) => {
                Some(target)
            }
            _ => None,
        }
    }
}

/// Inputs to the state machine, from the user or from background work.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportEvent {
    /// Start a discovery scan
    Discover,
    /// Discovery finished
    Found(Vec<DiscoveredService>),
    /// User picked a discovered device
    Select(ConnectionTarget),
    /// User typed an address
    ManualConnect(ConnectionTarget),
    /// User backed out
    Cancel,
    /// Companion granted a session and is prompting for approval
    SessionObtained,
    /// Companion approved the import
    Approved,
    /// Export downloaded and decoded
    PayloadReady(Vec<NoteRecord>),
    /// The attempt failed
    Error(String),
    /// Try discovery again after a failure
    Retry,
    /// Dismiss a finished attempt
    Close,
}

impl ImportEvent {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::Found(_) => "found",
            Self::Select(_) => "select",
            Self::ManualConnect(_) => "manual_connect",
            Self::Cancel => "cancel",
            Self::SessionObtained => "session_obtained",
            Self::Approved => "approved",
            Self::PayloadReady(_) => "payload_ready",
            Self::Error(_) => "error",
            Self::Retry => "retry",
            Self::Close => "close",
        }
    }
}

/// Compute the next state, or `None` if `event` is not valid in `state`.
#[must_use]
pub fn transition(state: &ImportState, event: ImportEvent) -> Option<ImportState> {
    use ImportEvent as E;
    use ImportState as S;

    let next = match (state, event) {
        (_, E::Discover) | (S::Failed(_), E::Retry) => S::Searching,
        (_, E::ManualConnect(target)) | (S::DeviceList(_), E::Select(target)) => {
            S::RequestingApproval(target)
        }
        (S::Searching, E::Found(services)) => S::DeviceList(services),
        (
            S::Searching
            | S::DeviceList(_)
            | S::RequestingApproval(_)
            | S::Waiting(_)
            | S::Downloading(_),
            E::Cancel,
        )
        | (S::Imported(_) | S::Failed(_), E::Close) => S::Idle,
        (S::RequestingApproval(target), E::SessionObtained) => S::Waiting(target.clone()),
        (S::Waiting(target), E::Approved) => S::Downloading(target.clone()),
        (S::Downloading(_), E::PayloadReady(notes)) => S::Imported(notes.len()),
        (S::RequestingApproval(_) | S::Waiting(_) | S::Downloading(_), E::Error(message)) => {
            S::Failed(message)
        }
        _ => return None,
    };

    Some(next)
}

/// Pure reducer: invalid events leave the state unchanged.
#[must_use]
pub fn reduce(state: &ImportState, event: ImportEvent) -> ImportState {
    let name = event.name();
    transition(state, event).unwrap_or_else(|| {
        tracing::trace!(state = state.name(), event = name, "Ignoring event");
        state.clone()
    })
}
