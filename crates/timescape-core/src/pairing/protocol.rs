//! Wire types for the companion's HTTP API.
//!
//! | Endpoint | Method | Request | Response |
//! |---|---|---|---|
//! | `/meta` | GET | - | ignored |
//! | `/session/request` | POST | [`SessionRequest`] | [`SessionResponse`] |
//! | `/session/status` | GET | `?sessionId=` | [`StatusResponse`] |
//! | `/export` | GET | `?token=` | [`ExportPayload`](crate::notes::ExportPayload) |

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Liveness probe path
pub const META_PATH: &str = "/meta";
/// Session request path
pub const SESSION_REQUEST_PATH: &str = "/session/request";
/// Approval status path
pub const SESSION_STATUS_PATH: &str = "/session/status";
/// Export path
pub const EXPORT_PATH: &str = "/export";

/// Query parameter carrying the session ID
pub const SESSION_ID_PARAM: &str = "sessionId";
/// Query parameter carrying the approval token
pub const TOKEN_PARAM: &str = "token";

/// Body of `POST /session/request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    /// Fresh per attempt
    pub client_id: Uuid,
    /// Shown on the companion's approval prompt
    pub client_name: String,
}

impl SessionRequest {
    /// Create a request with a new random client ID.
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            client_name: client_name.into(),
        }
    }
}

/// Response of `POST /session/request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Session to poll for approval
    pub session_id: String,
}

/// Response of `GET /session/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// `APPROVED`, `DENIED`, or anything else while pending
    pub status: String,
    /// Present once approved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl StatusResponse {
    /// Interpret the status field (case-insensitive).
    #[must_use]
    pub fn approval(&self) -> Approval {
        if self.status.eq_ignore_ascii_case("APPROVED") {
            Approval::Approved
        } else if self.status.eq_ignore_ascii_case("DENIED") {
            Approval::Denied
        } else {
            Approval::Pending
        }
    }
}

/// Approval state reported by the companion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    /// Still waiting for the user on the companion
    Pending,
    /// Approved; a token should accompany the response
    Approved,
    /// Declined on the companion
    Denied,
}

/// Session issued by the companion for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a session ID string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw session ID.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token authorising a single export fetch.
#[derive(Clone, PartialEq, Eq)]
pub struct ApprovalToken(String);

impl ApprovalToken {
    /// Wrap a token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApprovalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApprovalToken(..)")
    }
}
