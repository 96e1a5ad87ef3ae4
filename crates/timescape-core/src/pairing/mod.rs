//! Pairing client for importing notes from a companion.
//!
//! One import attempt runs four phases in order against a single target:
//!
//! 1. **Probe** - `GET /meta`; failures are ignored
//! 2. **Session request** - `POST /session/request` with a fresh client ID
//! 3. **Approval** - poll `GET /session/status` at a fixed interval until
//!    the companion approves or denies, or the approval timeout passes
//! 4. **Export** - `GET /export` with the approval token, decoded into notes
//!
//! Any failure in phases 2-4 ends the attempt. A status poll that fails is
//! not retried; the whole attempt fails and the user starts a new one.

pub mod protocol;

use reqwest::{Client, Response};
use tokio::time::Instant;

use crate::config::PairingConfig;
use crate::connection::ConnectionTarget;
use crate::error::{Error, Result};
use crate::notes::{decode_export, ExportPayload, NoteRecord};

use protocol::{
    Approval, ApprovalToken, SessionId, SessionRequest, SessionResponse, StatusResponse,
    EXPORT_PATH, META_PATH, SESSION_ID_PARAM, SESSION_REQUEST_PATH, SESSION_STATUS_PATH,
    TOKEN_PARAM,
};

/// HTTP client speaking the companion's pairing protocol.
#[derive(Debug, Clone)]
pub struct PairingClient {
    client: Client,
    config: PairingConfig,
}

impl PairingClient {
    /// Create a pairing client.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` has a zero poll interval or approval
    /// timeout, or if the HTTP client cannot be built.
    pub fn new(config: PairingConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// The pairing settings in use.
    #[must_use]
    pub fn config(&self) -> &PairingConfig {
        &self.config
    }

    /// Run a full import attempt against `target`.
    ///
    /// `on_waiting` is called once the session has been granted and the
    /// companion is showing its approval prompt. `on_downloading` is called
    /// once the request has been approved, before the export is fetched.
    ///
    /// # Errors
    ///
    /// Returns the error of the first phase that failed. Its `Display` is
    /// the message to show the user.
    pub async fn import_from_target<W, D>(
        &self,
        target: &ConnectionTarget,
        client_name: &str,
        on_waiting: W,
        on_downloading: D,
    ) -> Result<Vec<NoteRecord>>
    where
        W: FnOnce() + Send,
        D: FnOnce() + Send,
    {
        let base = target.base_url();
        tracing::info!(companion = %target, client_name, "Starting import");

        let result = self
            .run_phases(&base, client_name, on_waiting, on_downloading)
            .await;

        match &result {
            Ok(payload) => tracing::info!(
                companion = %target,
                notes = payload.sticky_notes.len(),
                version = payload.version,
                "Import complete"
            ),
            Err(e) => tracing::warn!(companion = %target, "Import failed: {e}"),
        }

        result.map(|payload| payload.sticky_notes)
    }

    async fn run_phases<W, D>(
        &self,
        base: &str,
        client_name: &str,
        on_waiting: W,
        on_downloading: D,
    ) -> Result<ExportPayload>
    where
        W: FnOnce() + Send,
        D: FnOnce() + Send,
    {
        if self.config.probe {
            self.probe(base).await;
        }

        let session = self.request_session(base, client_name).await?;
        on_waiting();

        let token = self.await_approval(base, &session).await?;
        on_downloading();

        self.fetch_export(base, &token).await
    }

    /// Check the companion is up. Never fails.
    async fn probe(&self, base: &str) {
        match self.client.get(format!("{base}{META_PATH}")).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Companion answered liveness probe");
            }
            Ok(response) => {
                tracing::debug!(status = %response.status(), "Liveness probe returned an error");
            }
            Err(e) => {
                tracing::debug!("Liveness probe failed: {e}");
            }
        }
    }

    async fn request_session(&self, base: &str, client_name: &str) -> Result<SessionId> {
        let request = SessionRequest::new(client_name);
        tracing::debug!(client_id = %request.client_id, "Requesting session");

        let response = self
            .client
            .post(format!("{base}{SESSION_REQUEST_PATH}"))
            .json(&request)
            .send()
            .await?;

        let response = check_status(response, Error::SessionRequestFailed)?;
        let body: SessionResponse = response
            .json()
            .await
            .map_err(|e| Error::Protocol(format!("invalid session response: {e}")))?;

        if body.session_id.is_empty() {
            return Err(Error::Protocol("empty session id".to_string()));
        }

        tracing::debug!(session = %body.session_id, "Session granted, waiting for approval");
        Ok(SessionId::new(body.session_id))
    }

    async fn await_approval(&self, base: &str, session: &SessionId) -> Result<ApprovalToken> {
        let deadline = Instant::now() + self.config.approval_timeout;
        let mut polls: u32 = 0;

        loop {
            polls += 1;
            let status = self.poll_status(base, session).await?;

            match status.approval() {
                Approval::Approved => {
                    tracing::debug!(polls, "Import approved");
                    return status
                        .token
                        .filter(|token| !token.is_empty())
                        .map(ApprovalToken::new)
                        .ok_or(Error::MissingToken);
                }
                Approval::Denied => {
                    tracing::debug!(polls, "Import denied");
                    return Err(Error::Denied);
                }
                Approval::Pending => {
                    tracing::trace!(polls, status = %status.status, "Approval pending");
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;

            if Instant::now() >= deadline {
                return Err(Error::ApprovalTimeout(self.config.approval_timeout));
            }
        }
    }

    async fn poll_status(&self, base: &str, session: &SessionId) -> Result<StatusResponse> {
        let response = self
            .client
            .get(format!("{base}{SESSION_STATUS_PATH}"))
            .query(&[(SESSION_ID_PARAM, session.as_str())])
            .send()
            .await?;

        check_status(response, Error::StatusCheckFailed)?
            .json()
            .await
            .map_err(|e| Error::Protocol(format!("invalid status response: {e}")))
    }

    async fn fetch_export(&self, base: &str, token: &ApprovalToken) -> Result<ExportPayload> {
        let response = self
            .client
            .get(format!("{base}{EXPORT_PATH}"))
            .query(&[(TOKEN_PARAM, token.as_str())])
            .send()
            .await?;

        let body = check_status(response, Error::ExportFailed)?.bytes().await?;
        tracing::debug!(bytes = body.len(), "Export downloaded");

        decode_export(&body)
    }
}

/// Pass through 2xx responses, map anything else with `to_error`.
fn check_status(response: Response, to_error: fn(u16) -> Error) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(to_error(status.as_u16()))
    }
}
