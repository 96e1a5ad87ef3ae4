//! # Timescape Core Library
//!
//! `timescape-core` lets a small client device pull a bundle of sticky notes
//! from a companion device on the same local network. The companion has to
//! approve every import by hand, so no pairing credentials are needed up front.
//!
//! ## Flow
//!
//! 1. [`discovery`] scans for companions advertising `_timescape._tcp`
//! 2. The user picks one (or types `host:port`, see [`connection`])
//! 3. [`pairing`] requests a session, polls until the companion approves,
//!    then fetches the export with the issued token
//! 4. [`notes`] decodes the payload into [`notes::NoteRecord`]s
//!
//! [`import`] ties these together in a state machine that a UI can observe.
//!
//! ## Modules
//!
//! - [`config`] - Configuration management
//! - [`connection`] - Manual `host:port` targets
//! - [`discovery`] - Local network discovery via mDNS
//! - [`error`] - Error type shared by every module
//! - [`import`] - Import state machine and controller
//! - [`notes`] - Note records, export payload decoding
//! - [`pairing`] - Session request / approval / export client
//!
//! ## Example
//!
//! ```rust,ignore
//! use timescape_core::connection::parse_address;
//! use timescape_core::pairing::PairingClient;
//!
//! let target = parse_address("192.168.1.20:8765")?;
//! let client = PairingClient::new(Default::default())?;
//! let notes = client
//!     .import_from_target(&target, "Watch", || {}, || {})
//!     .await?;
//! println!("imported {} notes", notes.len());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod import;
pub mod notes;
pub mod pairing;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// mDNS service type advertised by companions.
pub const SERVICE_TYPE: &str = "_timescape._tcp.local.";

/// Default discovery scan duration in milliseconds
pub const DEFAULT_DISCOVERY_TIMEOUT_MS: u64 = 5_000;

/// Default interval between approval polls in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Default time to wait for the companion to approve, in seconds
pub const DEFAULT_APPROVAL_TIMEOUT_SECS: u64 = 30;

/// Default timeout for a single HTTP request, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
