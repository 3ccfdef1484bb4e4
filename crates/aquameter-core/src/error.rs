// ── Core error types ──
//
// Update cycles and setup validation fail in different vocabularies:
// polling records *why* a cycle failed, setup reports a reason code the
// caller can show to a person. Both are built from `aquameter_api::Error`
// and the classified status payload, never from raw HTTP details.

use std::sync::Arc;

use aquameter_api::{DataPoints, StatusPayload};
use thiserror::Error;
use tracing::debug;

/// Unified error type for parameter, catalog and hub operations.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input errors ─────────────────────────────────────────────────
    #[error("Invalid {field}: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Invalid sensor catalog: {message}")]
    Catalog { message: String },

    // ── Hub errors ───────────────────────────────────────────────────
    #[error("Device {device_id} is already set up")]
    AlreadySetUp { device_id: String },

    #[error("Device {device_id} is not ready: {source}")]
    NotReady {
        device_id: String,
        #[source]
        source: UpdateFailed,
    },

    #[error("Device hub is shut down")]
    ShutDown,
}

// ── Update failures ──────────────────────────────────────────────────

/// Why one update cycle produced no reading.
#[derive(Debug, Clone, Error)]
pub enum UpdateFailure {
    /// The round trip itself failed (timeout, refused, bridge error).
    #[error("connection error: {0}")]
    Connection(#[source] Arc<aquameter_api::Error>),

    #[error("no response from device")]
    NoResponse,

    #[error("device error: {message} (code: {code})")]
    DeviceReported { code: String, message: String },

    #[error("no data points in device response")]
    MalformedResponse,
}

impl UpdateFailure {
    /// Classify a status answer: data points pass through, every other
    /// shape becomes the matching failure.
    pub fn from_payload(payload: StatusPayload) -> Result<DataPoints, Self> {
        match payload {
            StatusPayload::DataPoints(points) => Ok(points),
            StatusPayload::DeviceError { code, message } => {
                Err(Self::DeviceReported { code, message })
            }
            StatusPayload::Incomplete(body) => {
                debug!(%body, "answer without data points");
                Err(Self::MalformedResponse)
            }
            StatusPayload::Empty => Err(Self::NoResponse),
        }
    }

    /// Short label for logs and machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::NoResponse => "no_response",
            Self::DeviceReported { .. } => "device_reported",
            Self::MalformedResponse => "malformed_response",
        }
    }
}

impl From<aquameter_api::Error> for UpdateFailure {
    fn from(err: aquameter_api::Error) -> Self {
        Self::Connection(Arc::new(err))
    }
}

/// The single failure signal an update cycle raises to its scheduler.
#[derive(Debug, Clone, Error)]
#[error("Update failed for {device_id}: {cause}")]
pub struct UpdateFailed {
    pub device_id: String,
    #[source]
    pub cause: UpdateFailure,
}

// ── Setup errors ─────────────────────────────────────────────────────

/// Why a candidate configuration was rejected.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Cannot connect to device: {reason}")]
    CannotConnect { reason: String },

    #[error("Device returned invalid data: {reason}")]
    InvalidData { reason: String },

    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Unexpected error: {message}")]
    Unknown { message: String },
}

impl SetupError {
    /// Stable reason code shown to whoever is configuring the device.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::CannotConnect { .. } => "cannot_connect",
            Self::InvalidData { .. } => "invalid_data",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Unknown { .. } => "unknown",
        }
    }
}

impl From<CoreError> for SetupError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidParameter { field, reason } => Self::InvalidInput { field, reason },
            other => Self::Unknown {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn payload_classification() {
        let points =
            UpdateFailure::from_payload(StatusPayload::classify(json!({ "dps": { "8": 238 } })))
                .unwrap();
        assert_eq!(points.get("8"), Some(&json!(238)));

        let cases = [
            (json!({ "Error": "busy", "Err": "1" }), "device_reported"),
            (json!({ "devId": "bf01" }), "malformed_response"),
            (json!({ "dps": {} }), "malformed_response"),
        ];
        for (body, kind) in cases {
            let err = UpdateFailure::from_payload(StatusPayload::classify(body)).unwrap_err();
            assert_eq!(err.kind(), kind);
        }
        let err = UpdateFailure::from_payload(StatusPayload::Empty).unwrap_err();
        assert_eq!(err.kind(), "no_response");
    }

    #[test]
    fn transport_errors_are_connection_failures() {
        let err = UpdateFailure::from(aquameter_api::Error::Timeout { timeout_secs: 20 });
        assert_eq!(err.kind(), "connection");
        assert_eq!(err.to_string(), "connection error: Request timed out after 20s");
    }

    #[test]
    fn reason_codes_are_stable() {
        let cases = [
            (
                SetupError::CannotConnect {
                    reason: "no response".into(),
                },
                "cannot_connect",
            ),
            (
                SetupError::InvalidData {
                    reason: "no data points".into(),
                },
                "invalid_data",
            ),
            (
                SetupError::Unknown {
                    message: "boom".into(),
                },
                "unknown",
            ),
        ];
        for (err, code) in cases {
            assert_eq!(err.reason_code(), code);
        }
    }

    #[test]
    fn parameter_errors_become_invalid_input() {
        let err: SetupError = CoreError::InvalidParameter {
            field: "address".into(),
            reason: "must not be empty".into(),
        }
        .into();
        assert_eq!(err.reason_code(), "invalid_input");
    }

    #[test]
    fn update_failed_names_device_and_cause() {
        let err = UpdateFailed {
            device_id: "bf01".into(),
            cause: UpdateFailure::DeviceReported {
                code: "1".into(),
                message: "busy".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "Update failed for bf01: device error: busy (code: 1)"
        );
        assert_eq!(err.cause.kind(), "device_reported");
    }
}
