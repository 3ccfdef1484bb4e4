//! Shared configuration for the aquameter CLI.
//!
//! TOML device profiles, local key resolution (env + keyring + plaintext),
//! and translation to `aquameter_core::DeviceEntry`. The CLI adds
//! `GlobalOpts`-aware wrappers on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use aquameter_core::{
    ConnectionParameters, CoreError, DeviceEntry, ProtocolVersion, validator::DEFAULT_TITLE,
};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Keyring service name for stored local keys.
pub const KEYRING_SERVICE: &str = "aquameter";

/// Environment prefix for config overrides (`AQUAMETER_DEFAULTS__BRIDGE_URL`).
pub const ENV_PREFIX: &str = "AQUAMETER_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no local key configured for device '{device}'")]
    NoCredentials { device: String },

    #[error("device id {device_id} is already configured as '{profile}'")]
    AlreadyConfigured { device_id: String, profile: String },

    #[error("device '{name}' not found in config")]
    DeviceNotFound { name: String, available: Vec<String> },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<CoreError> for ConfigError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidParameter { field, reason } => Self::Validation { field, reason },
            other => Self::Validation {
                field: "device".into(),
                reason: other.to_string(),
            },
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Device profile used when none is named on the command line.
    pub default_device: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceProfile>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Local status bridge root URL.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    #[serde(default = "default_output")]
    pub output: String,

    /// Seconds between update cycles.
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,

    #[serde(default = "default_protocol_version")]
    pub protocol_version: f64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            output: default_output(),
            scan_interval: default_scan_interval(),
            protocol_version: default_protocol_version(),
        }
    }
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:8888".into()
}
fn default_output() -> String {
    "table".into()
}
fn default_scan_interval() -> u64 {
    30
}
fn default_protocol_version() -> f64 {
    ProtocolVersion::default().as_f64()
}

/// A named device profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DeviceProfile {
    /// Display name (defaults to "Water Quality Tester").
    pub name: Option<String>,

    /// Device id as reported by the vendor cloud.
    pub device_id: String,

    /// Device IP address or hostname on the local network.
    pub host: String,

    /// Local key (plaintext — prefer keyring or env var).
    pub local_key: Option<String>,

    /// Environment variable name containing the local key.
    pub local_key_env: Option<String>,

    /// Override protocol version (3.1 to 3.5).
    pub protocol_version: Option<f64>,

    /// Override scan interval in seconds.
    pub scan_interval: Option<u64>,
}

impl DeviceProfile {
    /// Copy the non-secret fields of a validated entry into this profile.
    pub fn apply_entry(&mut self, entry: &DeviceEntry) {
        self.name = Some(entry.name.clone());
        self.device_id = entry.params.device_id().to_owned();
        self.host = entry.params.address().to_owned();
        self.protocol_version = Some(entry.params.protocol_version().as_f64());
        self.scan_interval = Some(entry.scan_interval.as_secs());
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_TITLE)
    }
}

// ── Profile management ──────────────────────────────────────────────

impl Config {
    pub fn device(&self, name: &str) -> Result<&DeviceProfile, ConfigError> {
        self.devices.get(name).ok_or_else(|| self.not_found(name))
    }

    pub fn device_mut(&mut self, name: &str) -> Result<&mut DeviceProfile, ConfigError> {
        if !self.devices.contains_key(name) {
            return Err(self.not_found(name));
        }
        self.devices
            .get_mut(name)
            .ok_or_else(|| ConfigError::DeviceNotFound {
                name: name.into(),
                available: Vec::new(),
            })
    }

    /// Profile name already holding `device_id`, if any.
    pub fn find_by_device_id(&self, device_id: &str) -> Option<&str> {
        self.devices
            .iter()
            .find(|(_, p)| p.device_id == device_id)
            .map(|(name, _)| name.as_str())
    }

    /// Register a new profile. The first profile becomes the default.
    pub fn add_device(&mut self, name: &str, profile: DeviceProfile) -> Result<(), ConfigError> {
        if let Some(existing) = self.find_by_device_id(&profile.device_id) {
            return Err(ConfigError::AlreadyConfigured {
                device_id: profile.device_id.clone(),
                profile: existing.to_owned(),
            });
        }
        if self.devices.contains_key(name) {
            return Err(ConfigError::Validation {
                field: "name".into(),
                reason: format!("a device profile named '{name}' already exists"),
            });
        }
        if self.default_device.is_none() {
            self.default_device = Some(name.to_owned());
        }
        self.devices.insert(name.to_owned(), profile);
        Ok(())
    }

    /// Remove a profile, clearing the default if it pointed there.
    pub fn remove_device(&mut self, name: &str) -> Result<DeviceProfile, ConfigError> {
        let removed = self.devices.remove(name).ok_or_else(|| self.not_found(name))?;
        if self.default_device.as_deref() == Some(name) {
            self.default_device = None;
        }
        Ok(removed)
    }

    /// The profile to use: explicit choice, then the configured default,
    /// then the only profile if there is exactly one.
    pub fn active_device_name(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_device.clone())
            .or_else(|| {
                let mut names = self.devices.keys();
                match (names.next(), names.next()) {
                    (Some(only), None) => Some(only.clone()),
                    _ => None,
                }
            })
    }

    fn not_found(&self, name: &str) -> ConfigError {
        ConfigError::DeviceNotFound {
            name: name.into(),
            available: self.devices.keys().cloned().collect(),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "aquameter", "aquameter").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("aquameter");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from `path` + environment. A missing file yields
/// the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parent dirs.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

// ── Local key resolution ────────────────────────────────────────────

/// Keyring account for a device profile's local key.
pub fn keyring_account(device: &str) -> String {
    format!("{device}/local-key")
}

/// Resolve a device's local key: env var, then keyring, then plaintext.
pub fn resolve_local_key(profile: &DeviceProfile, device: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's local_key_env → env var lookup
    if let Some(ref env_name) = profile.local_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_account(device)) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref key) = profile.local_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials {
        device: device.into(),
    })
}

/// Store a device's local key in the system keyring.
pub fn store_local_key(device: &str, key: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_account(device))?;
    entry.set_password(key)?;
    Ok(())
}

/// Remove a device's local key from the keyring. Missing entries are fine.
pub fn delete_local_key(device: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_account(device))?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ── Translation to core types ───────────────────────────────────────

/// Parse a TOML protocol version number.
pub fn parse_protocol_version(value: f64) -> Result<ProtocolVersion, ConfigError> {
    ProtocolVersion::from_f64(value).ok_or_else(|| ConfigError::Validation {
        field: "protocol_version".into(),
        reason: format!("unsupported version {value} (expected 3.1 to 3.5)"),
    })
}

/// Build connection parameters from a profile with an already resolved key.
pub fn profile_to_params(
    defaults: &Defaults,
    profile: &DeviceProfile,
    local_key: SecretString,
) -> Result<ConnectionParameters, ConfigError> {
    let version = parse_protocol_version(profile.protocol_version.unwrap_or(defaults.protocol_version))?;
    Ok(ConnectionParameters::new(
        profile.device_id.clone(),
        local_key,
        profile.host.clone(),
        version,
    )?)
}

/// Build a validated `DeviceEntry` (polling profile) from a named profile.
pub fn device_to_entry(
    defaults: &Defaults,
    profile: &DeviceProfile,
    device: &str,
) -> Result<DeviceEntry, ConfigError> {
    let local_key = resolve_local_key(profile, device)?;
    let params = profile_to_params(defaults, profile, local_key)?;
    let scan_interval =
        Duration::from_secs(profile.scan_interval.unwrap_or(defaults.scan_interval));
    Ok(DeviceEntry::new(
        profile.display_name(),
        params,
        scan_interval,
    )?)
}

/// Parse the configured bridge URL.
pub fn bridge_url(raw: &str) -> Result<url::Url, ConfigError> {
    url::Url::parse(raw).map_err(|e| ConfigError::Validation {
        field: "bridge_url".into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn pool_profile() -> DeviceProfile {
        DeviceProfile {
            name: Some("Pool Tester".into()),
            device_id: "bf70d7388a31ac0421bfyi".into(),
            host: "192.168.20.161".into(),
            local_key: Some("0123456789abcdef".into()),
            ..DeviceProfile::default()
        }
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.add_device("pool", pool_profile()).unwrap();
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.default_device.as_deref(), Some("pool"));
        assert_eq!(loaded.devices.get("pool"), Some(&pool_profile()));
        assert_eq!(loaded.defaults.bridge_url, "http://127.0.0.1:8888");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.devices.is_empty());
        assert_eq!(cfg.defaults.scan_interval, 30);
        assert!((cfg.defaults.protocol_version - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn hand_written_toml_is_understood() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_device = "spa"

[defaults]
bridge_url = "http://bridge.lan:8888"
scan_interval = 60

[devices.spa]
device_id = "bf11"
host = "10.0.0.7"
local_key = "k"
protocol_version = 3.3
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        let spa = cfg.device("spa").unwrap();
        assert_eq!(spa.protocol_version, Some(3.3));
        assert_eq!(cfg.defaults.bridge_url, "http://bridge.lan:8888");
        assert_eq!(cfg.defaults.output, "table");

        let entry = device_to_entry(&cfg.defaults, spa, "spa").unwrap();
        assert_eq!(entry.params.protocol_version(), ProtocolVersion::V3_3);
        assert_eq!(entry.scan_interval, Duration::from_secs(60));
        assert_eq!(entry.name, DEFAULT_TITLE);
    }

    #[test]
    fn second_profile_for_same_device_is_rejected() {
        let mut cfg = Config::default();
        cfg.add_device("pool", pool_profile()).unwrap();

        let err = cfg.add_device("pool-2", pool_profile()).unwrap_err();

        match err {
            ConfigError::AlreadyConfigured { profile, .. } => assert_eq!(profile, "pool"),
            other => panic!("expected AlreadyConfigured, got: {other:?}"),
        }
        assert_eq!(cfg.devices.len(), 1);
    }

    #[test]
    fn device_to_entry_uses_plaintext_key_and_defaults() {
        let defaults = Defaults::default();
        let entry = device_to_entry(&defaults, &pool_profile(), "pool").unwrap();

        assert_eq!(entry.name, "Pool Tester");
        assert_eq!(entry.params.local_key().expose_secret(), "0123456789abcdef");
        assert_eq!(entry.params.protocol_version(), ProtocolVersion::V3_5);
        assert_eq!(entry.scan_interval, Duration::from_secs(30));
    }

    #[test]
    fn unsupported_protocol_version_is_a_validation_error() {
        let profile = DeviceProfile {
            protocol_version: Some(3.9),
            ..pool_profile()
        };
        let err = device_to_entry(&Defaults::default(), &profile, "pool").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "protocol_version"));
    }

    #[test]
    fn empty_host_is_a_validation_error() {
        let profile = DeviceProfile {
            host: String::new(),
            ..pool_profile()
        };
        let err = device_to_entry(&Defaults::default(), &profile, "pool").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "address"));
    }

    #[test]
    fn active_device_falls_back_to_only_profile() {
        let mut cfg = Config::default();
        assert_eq!(cfg.active_device_name(None), None);

        cfg.devices.insert("pool".into(), pool_profile());
        assert_eq!(cfg.active_device_name(None).as_deref(), Some("pool"));
        assert_eq!(cfg.active_device_name(Some("spa")).as_deref(), Some("spa"));
    }

    #[test]
    fn removing_default_clears_it() {
        let mut cfg = Config::default();
        cfg.add_device("pool", pool_profile()).unwrap();

        cfg.remove_device("pool").unwrap();

        assert!(cfg.default_device.is_none());
        assert!(matches!(
            cfg.remove_device("pool"),
            Err(ConfigError::DeviceNotFound { .. })
        ));
    }

    #[test]
    fn apply_entry_copies_non_secret_fields() {
        let mut profile = pool_profile();
        let entry = device_to_entry(&Defaults::default(), &profile, "pool").unwrap();
        let moved = entry
            .apply(&aquameter_core::EntryChanges {
                address: Some("192.168.20.170".into()),
                ..Default::default()
            })
            .unwrap();

        profile.apply_entry(&moved);

        assert_eq!(profile.host, "192.168.20.170");
        assert_eq!(profile.scan_interval, Some(30));
        assert_eq!(profile.local_key.as_deref(), Some("0123456789abcdef"));
    }
}
