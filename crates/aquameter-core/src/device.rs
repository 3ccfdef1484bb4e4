// ── Device client seam ──
//
// A `Connector` turns validated parameters into a `DeviceClient`; the client
// performs one logical status round trip per call, with the timeout and
// bounded retries taken from its parameters. The bridge-backed pair is the
// production implementation.

use std::future::Future;

use aquameter_api::{BridgeClient, StatusPayload, StatusRequest, TransportConfig};
use tracing::debug;
use url::Url;

use crate::config::ConnectionParameters;

/// One device's status source.
pub trait DeviceClient: Send + Sync + 'static {
    /// Fetch the current status. Retries are internal; the caller sees one
    /// outcome per call.
    fn fetch_status(
        &self,
    ) -> impl Future<Output = Result<StatusPayload, aquameter_api::Error>> + Send;
}

/// Builds device clients. Connecting never fails; I/O happens on fetch.
pub trait Connector: Send + Sync + 'static {
    type Client: DeviceClient;

    fn connect(&self, params: &ConnectionParameters) -> Self::Client;
}

// ── Bridge-backed implementation ─────────────────────────────────

/// Connector that talks to devices through the local status bridge.
///
/// Holds one shared HTTP client; every device client built from it reuses
/// the same connection pool.
#[derive(Debug, Clone)]
pub struct BridgeConnector {
    bridge: BridgeClient,
}

impl BridgeConnector {
    pub fn new(bridge_url: Url) -> Result<Self, aquameter_api::Error> {
        Self::with_transport(bridge_url, &TransportConfig::default())
    }

    pub fn with_transport(
        bridge_url: Url,
        transport: &TransportConfig,
    ) -> Result<Self, aquameter_api::Error> {
        Ok(Self {
            bridge: BridgeClient::new(bridge_url, transport)?,
        })
    }

    pub fn bridge_url(&self) -> &Url {
        self.bridge.base_url()
    }
}

impl Connector for BridgeConnector {
    type Client = BridgeDeviceClient;

    fn connect(&self, params: &ConnectionParameters) -> BridgeDeviceClient {
        debug!(
            device_id = params.device_id(),
            address = params.address(),
            protocol = %params.protocol_version(),
            bridge = %self.bridge.base_url(),
            "device client configured"
        );
        BridgeDeviceClient {
            bridge: self.bridge.clone(),
            params: params.clone(),
        }
    }
}

/// A device client bound to one set of connection parameters.
#[derive(Debug, Clone)]
pub struct BridgeDeviceClient {
    bridge: BridgeClient,
    params: ConnectionParameters,
}

impl BridgeDeviceClient {
    pub fn params(&self) -> &ConnectionParameters {
        &self.params
    }
}

impl DeviceClient for BridgeDeviceClient {
    async fn fetch_status(&self) -> Result<StatusPayload, aquameter_api::Error> {
        let params = &self.params;
        let request = StatusRequest {
            device_id: params.device_id(),
            address: params.address(),
            local_key: params.local_key(),
            version: params.protocol_version().as_str(),
            timeout: params.socket_timeout(),
            retry: params.profile().retry_policy(),
        };
        self.bridge.status(&request).await
    }
}
