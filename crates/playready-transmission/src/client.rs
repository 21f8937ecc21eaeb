//! JSON-RPC transport with Transmission's CSRF session handshake.
//!
//! # Design
//! - Transmission answers `409 Conflict` with a fresh session id whenever the
//!   caller's id is missing or stale; the id is stored and the request retried once.
//! - The stored id is shared by every caller of the client.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use playready_config::TransmissionConfig;
use playready_torrent_core::{RpcError, RpcTransport};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

/// Header carrying the Transmission session id.
pub const SESSION_HEADER: &str = "X-Transmission-Session-Id";
/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(12);
const MAX_ATTEMPTS: usize = 2;

#[derive(Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    arguments: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: String,
    #[serde(default)]
    arguments: Value,
}

/// Transmission RPC client.
pub struct TransmissionClient {
    http: Client,
    url: String,
    username: String,
    password: String,
    session: Mutex<Option<String>>,
}

impl TransmissionClient {
    /// Build a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Transport`] when the HTTP client cannot be constructed.
    pub fn new(config: &TransmissionConfig) -> Result<Self, RpcError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(RpcError::transport)?;
        Ok(Self {
            http,
            url: config.url.trim().to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            session: Mutex::new(None),
        })
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<String>> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("transmission session mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }

    fn session_id(&self) -> Option<String> {
        self.lock_session().clone()
    }
}

#[async_trait]
impl RpcTransport for TransmissionClient {
    async fn call(&self, method: &str, arguments: Value) -> Result<Value, RpcError> {
        let payload = RpcRequest { method, arguments };

        for attempt in 1..=MAX_ATTEMPTS {
            let mut request = self.http.post(&self.url).json(&payload);
            if let Some(session) = self.session_id() {
                request = request.header(SESSION_HEADER, session);
            }
            if !self.username.is_empty() || !self.password.is_empty() {
                request = request.basic_auth(&self.username, Some(&self.password));
            }

            let response = request.send().await.map_err(RpcError::transport)?;
            let status = response.status();

            if status == StatusCode::CONFLICT {
                let session = response
                    .headers()
                    .get(SESSION_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .filter(|value| !value.is_empty())
                    .map(ToOwned::to_owned)
                    .ok_or(RpcError::SessionHeaderMissing)?;
                debug!(method, attempt, "transmission session renegotiated");
                *self.lock_session() = Some(session);
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(RpcError::Status {
                    status: status.as_u16(),
                    body: body.trim().to_string(),
                });
            }

            let decoded: RpcResponse = response.json().await.map_err(|err| RpcError::Decode {
                detail: err.to_string(),
            })?;
            if decoded.result != "success" {
                return Err(RpcError::Rejected {
                    result: decoded.result,
                });
            }
            return Ok(decoded.arguments);
        }

        Err(RpcError::SessionNegotiation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    const RPC_PATH: &str = "/transmission/rpc";

    fn client(server: &MockServer, username: &str) -> anyhow::Result<TransmissionClient> {
        Ok(TransmissionClient::new(&TransmissionConfig {
            url: server.url(RPC_PATH),
            username: username.to_string(),
            password: String::new(),
            download_dir: "/downloads".to_string(),
        })?)
    }

    #[tokio::test]
    async fn conflict_stores_session_and_retries() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let conflict = server.mock(|when, then| {
            when.method(POST).path(RPC_PATH).header_missing(SESSION_HEADER);
            then.status(409).header(SESSION_HEADER, "abc123");
        });
        let accepted = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "abc123");
            then.status(200)
                .json_body(json!({"result": "success", "arguments": {"torrents": []}}));
        });

        let client = client(&server, "")?;
        let arguments = client.call("torrent-get", json!({"fields": ["id"]})).await?;
        assert_eq!(arguments, json!({"torrents": []}));

        client.call("torrent-get", json!({"fields": ["id"]})).await?;
        conflict.assert_calls(1);
        accepted.assert_calls(2);
        Ok(())
    }

    #[tokio::test]
    async fn conflict_without_header_fails() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path(RPC_PATH);
            then.status(409);
        });

        let err = client(&server, "")?
            .call("torrent-get", json!({}))
            .await
            .expect_err("missing session header must fail");
        assert!(matches!(err, RpcError::SessionHeaderMissing));
        Ok(())
    }

    #[tokio::test]
    async fn repeated_conflicts_give_up_after_two_attempts() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let conflict = server.mock(|when, then| {
            when.method(POST).path(RPC_PATH);
            then.status(409).header(SESSION_HEADER, "rotating");
        });

        let err = client(&server, "")?
            .call("torrent-get", json!({}))
            .await
            .expect_err("negotiation must give up");
        assert!(matches!(err, RpcError::SessionNegotiation));
        conflict.assert_calls(2);
        Ok(())
    }

    #[tokio::test]
    async fn error_status_carries_trimmed_body() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path(RPC_PATH);
            then.status(401).body("  Unauthorized User \n");
        });

        let err = client(&server, "viewer")?
            .call("torrent-get", json!({}))
            .await
            .expect_err("401 must fail");
        match err {
            RpcError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Unauthorized User");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn non_success_result_is_rejected() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path(RPC_PATH);
            then.status(200)
                .json_body(json!({"result": "duplicate torrent", "arguments": {}}));
        });

        let err = client(&server, "")?
            .call("torrent-add", json!({"metainfo": "AA=="}))
            .await
            .expect_err("rejection must fail");
        assert_eq!(err.detail(), "Transmission error: duplicate torrent");
        Ok(())
    }
}
