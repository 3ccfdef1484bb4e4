// Status bridge HTTP client
//
// The bridge owns the encrypted local session with each tester. This client
// only asks it for a device's current status and relays the answer,
// retrying transient failures within the bounds the caller supplies.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::status::StatusPayload;
use crate::transport::{RetryPolicy, TransportConfig};

const MAX_ERROR_BODY: usize = 200;

/// One status query for one device.
///
/// Borrowed so the caller keeps ownership of the local key.
#[derive(Debug, Clone, Copy)]
pub struct StatusRequest<'a> {
    pub device_id: &'a str,
    pub address: &'a str,
    pub local_key: &'a SecretString,
    /// Dotted protocol version, e.g. `"3.5"`.
    pub version: &'a str,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Serialize)]
struct StatusRequestBody<'a> {
    id: &'a str,
    ip: &'a str,
    key: &'a str,
    version: &'a str,
}

/// HTTP client for the local status bridge.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BridgeClient {
    /// Create a bridge client from a `TransportConfig`.
    ///
    /// `base_url` is the bridge root, e.g. `http://127.0.0.1:8888`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a bridge client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The bridge base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/status`, keeping any path prefix on the base URL.
    pub(crate) fn status_url(&self) -> Result<Url, Error> {
        let full = format!("{}/status", self.base_url.as_str().trim_end_matches('/'));
        Ok(Url::parse(&full)?)
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Fetch the current status of one device.
    ///
    /// Transient failures are retried up to `request.retry` total attempts
    /// with a fixed delay between them. The last error is returned once the
    /// attempts run out.
    pub async fn status(&self, request: &StatusRequest<'_>) -> Result<StatusPayload, Error> {
        let url = self.status_url()?;
        let attempts = request.retry.attempts();
        let mut attempt = 1;

        loop {
            match self.status_once(url.clone(), request).await {
                Ok(payload) => {
                    debug!(
                        device_id = request.device_id,
                        attempt,
                        kind = payload.kind(),
                        "status received"
                    );
                    return Ok(payload);
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        device_id = request.device_id,
                        attempt,
                        attempts,
                        error = %e,
                        "status request failed, retrying"
                    );
                    tokio::time::sleep(request.retry.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn status_once(&self, url: Url, request: &StatusRequest<'_>) -> Result<StatusPayload, Error> {
        debug!("POST {}", url);

        let body = StatusRequestBody {
            id: request.device_id,
            ip: request.address,
            key: request.local_key.expose_secret(),
            version: request.version,
        };

        let resp = self
            .http
            .post(url)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.send_error(e, request.timeout))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| self.send_error(e, request.timeout))?;

        if !status.is_success() {
            return Err(Error::Bridge {
                status: status.as_u16(),
                message: error_message(&text, status),
            });
        }

        match StatusPayload::from_body(&text) {
            Ok(payload) => Ok(payload),
            Err(e) => Err(Error::Deserialization {
                message: e.to_string(),
                body: text,
            }),
        }
    }

    fn send_error(&self, e: reqwest::Error, timeout: Duration) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                timeout_secs: timeout.as_secs(),
            }
        } else if e.is_connect() {
            Error::Unavailable {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            }
        } else {
            Error::Transport(e)
        }
    }
}

fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_owned();
    }
    trimmed.chars().take(MAX_ERROR_BODY).collect()
}
