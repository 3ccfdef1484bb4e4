// ── Runtime connection configuration ──
//
// These types describe *how* to reach one tester. They carry the local key
// and connection tuning, but never touch disk. The CLI builds a
// `DeviceEntry` from its config file and hands it in.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use aquameter_api::RetryPolicy;
use secrecy::{ExposeSecret, SecretString};

use crate::error::CoreError;

/// Default polling cadence for a device entry.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest accepted polling cadence.
pub const MIN_SCAN_INTERVAL: Duration = Duration::from_secs(1);

// ── ProtocolVersion ──────────────────────────────────────────────

/// Local protocol revision spoken by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolVersion {
    V3_1,
    V3_2,
    V3_3,
    V3_4,
    #[default]
    V3_5,
}

impl ProtocolVersion {
    pub const ALL: [Self; 5] = [Self::V3_1, Self::V3_2, Self::V3_3, Self::V3_4, Self::V3_5];

    /// Dotted form used on the wire and in config files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V3_1 => "3.1",
            Self::V3_2 => "3.2",
            Self::V3_3 => "3.3",
            Self::V3_4 => "3.4",
            Self::V3_5 => "3.5",
        }
    }

    /// Numeric form as written in TOML (`protocol_version = 3.5`).
    pub fn as_f64(self) -> f64 {
        match self {
            Self::V3_1 => 3.1,
            Self::V3_2 => 3.2,
            Self::V3_3 => 3.3,
            Self::V3_4 => 3.4,
            Self::V3_5 => 3.5,
        }
    }

    pub fn from_f64(value: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| (v.as_f64() - value).abs() < 1e-6)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == trimmed)
            .ok_or_else(|| CoreError::InvalidParameter {
                field: "protocol_version".into(),
                reason: format!("unsupported version '{trimmed}' (expected 3.1 to 3.5)"),
            })
    }
}

// ── ConnectionProfile ────────────────────────────────────────────

/// Socket timeout and retry bounds for one logical round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub socket_timeout: Duration,
    /// Total attempts, including the first.
    pub retry_limit: u32,
    pub retry_delay: Duration,
}

impl ConnectionProfile {
    /// Long-running polling clients.
    pub const POLLING: Self = Self {
        socket_timeout: Duration::from_secs(20),
        retry_limit: 3,
        retry_delay: Duration::from_secs(2),
    };

    /// One-shot validation during setup and reconfiguration.
    pub const SETUP: Self = Self {
        socket_timeout: Duration::from_secs(10),
        retry_limit: 2,
        retry_delay: Duration::from_secs(1),
    };

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_limit, self.retry_delay)
    }
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self::POLLING
    }
}

// ── ConnectionParameters ─────────────────────────────────────────

/// Everything needed to reach one device.
///
/// Validated at construction and immutable afterwards; a changed field means
/// a new value and a new device client. `Debug` never shows the key.
#[derive(Debug, Clone)]
pub struct ConnectionParameters {
    device_id: String,
    local_key: SecretString,
    address: String,
    protocol_version: ProtocolVersion,
    profile: ConnectionProfile,
}

impl ConnectionParameters {
    /// Validate and build parameters with the polling profile.
    pub fn new(
        device_id: impl Into<String>,
        local_key: SecretString,
        address: impl Into<String>,
        protocol_version: ProtocolVersion,
    ) -> Result<Self, CoreError> {
        let device_id = non_empty("device_id", device_id.into())?;
        let address = non_empty("address", address.into())?;
        if address.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidParameter {
                field: "address".into(),
                reason: "must not contain whitespace".into(),
            });
        }
        if local_key.expose_secret().trim().is_empty() {
            return Err(CoreError::InvalidParameter {
                field: "local_key".into(),
                reason: "must not be empty".into(),
            });
        }

        Ok(Self {
            device_id,
            local_key,
            address,
            protocol_version,
            profile: ConnectionProfile::POLLING,
        })
    }

    /// Same device, different timeout and retry bounds.
    pub fn with_profile(&self, profile: ConnectionProfile) -> Result<Self, CoreError> {
        if profile.retry_limit == 0 {
            return Err(CoreError::InvalidParameter {
                field: "retry_limit".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(Self {
            profile,
            ..self.clone()
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn local_key(&self) -> &SecretString {
        &self.local_key
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    pub fn profile(&self) -> ConnectionProfile {
        self.profile
    }

    pub fn socket_timeout(&self) -> Duration {
        self.profile.socket_timeout
    }

    pub fn retry_limit(&self) -> u32 {
        self.profile.retry_limit
    }

    pub fn retry_delay(&self) -> Duration {
        self.profile.retry_delay
    }
}

fn non_empty(field: &str, value: String) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidParameter {
            field: field.to_owned(),
            reason: "must not be empty".into(),
        });
    }
    Ok(trimmed.to_owned())
}

// ── DeviceEntry ──────────────────────────────────────────────────

/// A validated, typed configuration entry for one device.
#[derive(Debug, Clone)]
pub struct DeviceEntry {
    pub name: String,
    pub params: ConnectionParameters,
    pub scan_interval: Duration,
}

impl DeviceEntry {
    pub fn new(
        name: impl Into<String>,
        params: ConnectionParameters,
        scan_interval: Duration,
    ) -> Result<Self, CoreError> {
        if scan_interval < MIN_SCAN_INTERVAL {
            return Err(CoreError::InvalidParameter {
                field: "scan_interval".into(),
                reason: format!("must be at least {}s", MIN_SCAN_INTERVAL.as_secs()),
            });
        }
        Ok(Self {
            name: name.into(),
            params,
            scan_interval,
        })
    }

    /// Entries are unique per device id.
    pub fn unique_id(&self) -> &str {
        self.params.device_id()
    }

    /// Overlay `changes` onto this entry, validating the result.
    ///
    /// Untouched fields keep their current values, including the profile.
    pub fn apply(&self, changes: &EntryChanges) -> Result<Self, CoreError> {
        let current = &self.params;
        let params = ConnectionParameters::new(
            changes
                .device_id
                .clone()
                .unwrap_or_else(|| current.device_id().to_owned()),
            changes
                .local_key
                .clone()
                .unwrap_or_else(|| current.local_key().clone()),
            changes
                .address
                .clone()
                .unwrap_or_else(|| current.address().to_owned()),
            changes
                .protocol_version
                .unwrap_or(current.protocol_version()),
        )?
        .with_profile(current.profile())?;

        Self::new(
            changes.name.clone().unwrap_or_else(|| self.name.clone()),
            params,
            changes.scan_interval.unwrap_or(self.scan_interval),
        )
    }
}

/// Field-by-field changes for reconfiguring an entry. `None` keeps the
/// current value.
#[derive(Debug, Clone, Default)]
pub struct EntryChanges {
    pub name: Option<String>,
    pub device_id: Option<String>,
    pub local_key: Option<SecretString>,
    pub address: Option<String>,
    pub protocol_version: Option<ProtocolVersion>,
    pub scan_interval: Option<Duration>,
}

impl EntryChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.device_id.is_none()
            && self.local_key.is_none()
            && self.address.is_none()
            && self.protocol_version.is_none()
            && self.scan_interval.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn key(value: &str) -> SecretString {
        SecretString::from(value.to_owned())
    }

    fn params() -> ConnectionParameters {
        ConnectionParameters::new(
            "bf70d7388a31ac0421bfyi",
            key("0123456789abcdef"),
            "192.168.20.161",
            ProtocolVersion::V3_5,
        )
        .unwrap()
    }

    #[test]
    fn new_parameters_use_polling_profile() {
        let p = params();
        assert_eq!(p.socket_timeout(), Duration::from_secs(20));
        assert_eq!(p.retry_limit(), 3);
        assert_eq!(p.retry_delay(), Duration::from_secs(2));
    }

    #[test]
    fn empty_fields_are_rejected() {
        let missing_id =
            ConnectionParameters::new("  ", key("k"), "10.0.0.2", ProtocolVersion::V3_3);
        assert!(matches!(
            missing_id,
            Err(CoreError::InvalidParameter { ref field, .. }) if field == "device_id"
        ));

        let missing_key = ConnectionParameters::new("abc", key(""), "10.0.0.2", ProtocolVersion::V3_3);
        assert!(matches!(
            missing_key,
            Err(CoreError::InvalidParameter { ref field, .. }) if field == "local_key"
        ));

        let bad_address =
            ConnectionParameters::new("abc", key("k"), "10.0.0 .2", ProtocolVersion::V3_3);
        assert!(bad_address.is_err());
    }

    #[test]
    fn debug_output_redacts_key() {
        let rendered = format!("{:?}", params());
        assert!(!rendered.contains("0123456789abcdef"));
    }

    #[test]
    fn protocol_version_parses_supported_values_only() {
        assert_eq!("3.3".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::V3_3);
        assert!("3.6".parse::<ProtocolVersion>().is_err());
        assert_eq!(ProtocolVersion::from_f64(3.4), Some(ProtocolVersion::V3_4));
        assert_eq!(ProtocolVersion::from_f64(2.0), None);
    }

    #[test]
    fn profile_with_zero_retries_is_rejected() {
        let profile = ConnectionProfile {
            retry_limit: 0,
            ..ConnectionProfile::SETUP
        };
        assert!(params().with_profile(profile).is_err());
    }

    #[test]
    fn apply_overlays_only_given_fields() {
        let entry = DeviceEntry::new("Pool", params(), DEFAULT_SCAN_INTERVAL).unwrap();
        let changes = EntryChanges {
            address: Some("192.168.20.170".into()),
            scan_interval: Some(Duration::from_secs(60)),
            ..EntryChanges::default()
        };

        let merged = entry.apply(&changes).unwrap();

        assert_eq!(merged.params.address(), "192.168.20.170");
        assert_eq!(merged.params.device_id(), "bf70d7388a31ac0421bfyi");
        assert_eq!(merged.scan_interval, Duration::from_secs(60));
        assert_eq!(merged.name, "Pool");
        // Original is untouched.
        assert_eq!(entry.params.address(), "192.168.20.161");
    }

    #[test]
    fn apply_rejects_invalid_overlay() {
        let entry = DeviceEntry::new("Pool", params(), DEFAULT_SCAN_INTERVAL).unwrap();
        let changes = EntryChanges {
            address: Some(String::new()),
            ..EntryChanges::default()
        };
        assert!(entry.apply(&changes).is_err());
        assert!(!changes.is_empty());
        assert!(EntryChanges::default().is_empty());
    }

    #[test]
    fn sub_second_scan_interval_is_rejected() {
        assert!(DeviceEntry::new("Pool", params(), Duration::from_millis(200)).is_err());
    }
}
