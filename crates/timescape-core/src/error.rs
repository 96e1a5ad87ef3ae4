//! Error types for Timescape.
//!
//! Every failure of an import attempt is represented by one [`Error`]
//! variant. Its `Display` output is the message shown to the user when an
//! attempt ends in the failed state.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// A specialized `Result` type for Timescape operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Timescape.
#[derive(Error, Debug)]
pub enum Error {
    /// Manually entered address is not `host:port`
    #[error("invalid address '{0}', expected host:port")]
    InvalidFormat(String),

    /// Companion rejected the session request
    #[error("session request failed with HTTP {0}")]
    SessionRequestFailed(u16),

    /// Approval status poll returned a non-success status
    #[error("status check failed with HTTP {0}")]
    StatusCheckFailed(u16),

    /// The request was denied on the companion
    #[error("Denied on phone")]
    Denied,

    /// Nobody approved the request in time
    #[error("timed out waiting for approval after {0:?}")]
    ApprovalTimeout(Duration),

    /// Companion approved but sent no token
    #[error("approval response did not include a token")]
    MissingToken,

    /// Export endpoint returned a non-success status
    #[error("export failed with HTTP {0}")]
    ExportFailed(u16),

    /// Export body could not be decoded
    #[error("malformed export payload: {0}")]
    MalformedPayload(String),

    /// Transport failure (refused, reset, timed out)
    #[error("network error: {0}")]
    Network(String),

    /// Companion answered with something that isn't the protocol
    #[error("unexpected response from companion: {0}")]
    Protocol(String),

    /// Discovery backend failure
    #[error("discovery error: {0}")]
    Discovery(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns whether starting a new attempt could plausibly succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::ApprovalTimeout(_)
                | Self::StatusCheckFailed(_)
                | Self::SessionRequestFailed(_)
                | Self::ExportFailed(_)
        )
    }

    /// Returns a helpful suggestion for resolving the error, if applicable.
    #[must_use]
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::InvalidFormat(_) => {
                Some("Enter the address shown on the phone, e.g. 192.168.1.20:8765")
            }
            Self::Denied => Some(
                "The import was declined on the phone.\n\
                 Start a new import and tap Approve when prompted.",
            ),
            Self::ApprovalTimeout(_) => Some(
                "Open the companion app on your phone and approve the request\n\
                 before the timer runs out.",
            ),
            Self::Network(_) => Some(
                "Make sure the phone is on the same Wi-Fi network and the\n\
                 companion app is open, then try again.",
            ),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
