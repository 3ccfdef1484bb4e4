// ── Polling coordinator ──
//
// Owns the per-device polling state: a lazily built device client, the last
// successful reading and the last failure. One update cycle fetches,
// classifies and maps a status answer; cycles never overlap.

use std::sync::Arc;

use aquameter_api::StatusPayload;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::catalog::SensorCatalog;
use crate::config::DeviceEntry;
use crate::device::{Connector, DeviceClient};
use crate::error::{UpdateFailed, UpdateFailure};
use crate::mapper::{MappedReading, map_reading};
use crate::sensor::SensorState;

// ── CoordinatorState ─────────────────────────────────────────────

/// Polling state observable by consumers.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorState {
    /// Survives failed cycles.
    pub last_reading: Option<MappedReading>,
    pub last_success: Option<DateTime<Utc>>,
    /// Cleared by the next successful cycle.
    pub last_failure: Option<UpdateFailure>,
    pub last_cycle_succeeded: bool,
}

impl CoordinatorState {
    /// A key is available when the last cycle succeeded and produced it.
    pub fn is_available(&self, key: &str) -> bool {
        self.last_cycle_succeeded
            && self
                .last_reading
                .as_ref()
                .is_some_and(|r| !r.is_empty() && r.contains(key))
    }

    pub fn value(&self, key: &str) -> Option<f64> {
        self.last_reading.as_ref().and_then(|r| r.get(key))
    }
}

// ── PollingCoordinator ───────────────────────────────────────────

/// Drives update cycles for one configured device.
pub struct PollingCoordinator<C: Connector> {
    entry: DeviceEntry,
    connector: Arc<C>,
    catalog: Arc<SensorCatalog>,
    client: Mutex<Option<C::Client>>,
    state: watch::Sender<CoordinatorState>,
}

impl<C: Connector> PollingCoordinator<C> {
    pub fn new(entry: DeviceEntry, connector: Arc<C>, catalog: Arc<SensorCatalog>) -> Self {
        let (state, _) = watch::channel(CoordinatorState::default());
        Self {
            entry,
            connector,
            catalog,
            client: Mutex::new(None),
            state,
        }
    }

    pub fn entry(&self) -> &DeviceEntry {
        &self.entry
    }

    pub fn device_id(&self) -> &str {
        self.entry.unique_id()
    }

    pub fn catalog(&self) -> &SensorCatalog {
        &self.catalog
    }

    // ── Update cycle ─────────────────────────────────────────────

    /// Run one update cycle.
    ///
    /// Builds the device client on first use, fetches and classifies the
    /// status, and maps it on success. Every failure is reported as a single
    /// [`UpdateFailed`]; the previous reading is kept either way.
    pub async fn run_update_cycle(&self) -> Result<MappedReading, UpdateFailed> {
        let mut slot = self.client.lock().await;
        let client = slot.get_or_insert_with(|| {
            info!(
                device_id = self.device_id(),
                address = self.entry.params.address(),
                protocol = %self.entry.params.protocol_version(),
                "configuring device client"
            );
            self.connector.connect(&self.entry.params)
        });

        debug!(device_id = self.device_id(), "starting update cycle");
        let outcome = match client.fetch_status().await {
            Ok(payload) => self.interpret(payload),
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(reading) => {
                debug!(
                    device_id = self.device_id(),
                    measurements = reading.len(),
                    "update cycle complete"
                );
                let now = Utc::now();
                self.state.send_modify(|s| {
                    s.last_reading = Some(reading.clone());
                    s.last_success = Some(now);
                    s.last_failure = None;
                    s.last_cycle_succeeded = true;
                });
                Ok(reading)
            }
            Err(cause) => {
                warn!(
                    device_id = self.device_id(),
                    kind = cause.kind(),
                    error = %cause,
                    "update cycle failed"
                );
                self.state.send_modify(|s| {
                    s.last_failure = Some(cause.clone());
                    s.last_cycle_succeeded = false;
                });
                Err(UpdateFailed {
                    device_id: self.device_id().to_owned(),
                    cause,
                })
            }
        }
    }

    fn interpret(&self, payload: StatusPayload) -> Result<MappedReading, UpdateFailure> {
        let points = UpdateFailure::from_payload(payload)?;
        debug!(
            device_id = self.device_id(),
            data_points = points.len(),
            "received data points"
        );
        Ok(map_reading(&points, &self.catalog))
    }

    /// Drop the device client; the next cycle builds a fresh one.
    pub async fn reset_client(&self) {
        *self.client.lock().await = None;
        debug!(device_id = self.device_id(), "device client reset");
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn snapshot(&self) -> CoordinatorState {
        self.state.borrow().clone()
    }

    /// Receives a new value after every cycle.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    /// The outbound view for every catalog entry, in catalog order.
    pub fn sensor_states(&self) -> Vec<SensorState> {
        let state = self.state.borrow();
        self.catalog
            .iter()
            .map(|definition| SensorState::new(&self.entry, definition, &state))
            .collect()
    }
}
