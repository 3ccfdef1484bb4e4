// ── Setup validation ──
//
// A one-shot reachability check run before a device configuration is
// accepted, both on first setup and on every reconfiguration. Uses the
// tighter setup profile and a fresh client each time.

use std::sync::Arc;

use aquameter_api::StatusPayload;
use tracing::{info, warn};

use crate::config::{ConnectionParameters, ConnectionProfile, DeviceEntry, EntryChanges};
use crate::device::{Connector, DeviceClient};
use crate::error::{SetupError, UpdateFailure};

/// Title used when no display name was given.
pub const DEFAULT_TITLE: &str = "Water Quality Tester";

/// Validates candidate configurations against the live device.
pub struct SetupValidator<C: Connector> {
    connector: Arc<C>,
    profile: ConnectionProfile,
}

impl<C: Connector> SetupValidator<C> {
    pub fn new(connector: Arc<C>) -> Self {
        Self {
            connector,
            profile: ConnectionProfile::SETUP,
        }
    }

    pub fn with_profile(mut self, profile: ConnectionProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Check that `candidate` reaches a device that reports data points.
    ///
    /// Returns the entry title on success. Nothing is persisted here.
    pub async fn validate(
        &self,
        candidate: &ConnectionParameters,
        name: Option<&str>,
    ) -> Result<String, SetupError> {
        let params = candidate.with_profile(self.profile)?;
        info!(
            device_id = params.device_id(),
            address = params.address(),
            protocol = %params.protocol_version(),
            "testing device connection"
        );

        let client = self.connector.connect(&params);
        let result = match client.fetch_status().await {
            Ok(payload) => classify_payload(payload),
            Err(e) => Err(classify_transport(&e)),
        };

        match result {
            Ok(points) => {
                info!(device_id = params.device_id(), data_points = points, "device connection OK");
                Ok(title(name))
            }
            Err(e) => {
                warn!(
                    device_id = params.device_id(),
                    reason = e.reason_code(),
                    error = %e,
                    "device validation failed"
                );
                Err(e)
            }
        }
    }

    /// Validate an already typed entry.
    pub async fn validate_entry(&self, entry: &DeviceEntry) -> Result<String, SetupError> {
        self.validate(&entry.params, Some(&entry.name)).await
    }

    /// Overlay `changes` onto `existing` and validate the merged entry.
    ///
    /// Returns the merged entry only when it validates; `existing` is never
    /// modified.
    pub async fn validate_reconfigure(
        &self,
        existing: &DeviceEntry,
        changes: &EntryChanges,
    ) -> Result<DeviceEntry, SetupError> {
        let merged = existing.apply(changes)?;
        self.validate_entry(&merged).await?;
        Ok(merged)
    }
}

fn classify_payload(payload: StatusPayload) -> Result<usize, SetupError> {
    match UpdateFailure::from_payload(payload) {
        Ok(points) => Ok(points.len()),
        Err(failure @ UpdateFailure::MalformedResponse) => Err(SetupError::InvalidData {
            reason: failure.to_string(),
        }),
        Err(failure) => Err(SetupError::CannotConnect {
            reason: failure.to_string(),
        }),
    }
}

fn classify_transport(err: &aquameter_api::Error) -> SetupError {
    use aquameter_api::Error;

    match err {
        Error::Unavailable { .. } | Error::ClientBuild(_) => SetupError::CannotConnect {
            reason: format!("dependency unavailable: {err}"),
        },
        Error::Deserialization { .. } | Error::InvalidUrl(_) => SetupError::Unknown {
            message: err.to_string(),
        },
        _ => SetupError::CannotConnect {
            reason: err.to_string(),
        },
    }
}

fn title(name: Option<&str>) -> String {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_TITLE)
        .to_owned()
}
