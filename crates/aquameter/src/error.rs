//! CLI error types with miette diagnostics.
//!
//! Maps config, setup and update failures into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use aquameter_config::ConfigError;
use aquameter_core::{CoreError, SetupError, UpdateFailed, UpdateFailure};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const UPDATE_FAILED: i32 = 8;
    pub const INVALID_DATA: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Device I/O ───────────────────────────────────────────────────
    #[error("Update failed for {device}: {source}")]
    #[diagnostic(
        code(aquameter::update_failed),
        help(
            "The device did not deliver a usable reading.\n\
             Check that it is powered and reachable, then run: aquameter validate"
        )
    )]
    UpdateFailed {
        device: String,
        #[source]
        source: UpdateFailure,
    },

    #[error("Device rejected ({reason_code}): {message}")]
    #[diagnostic(
        code(aquameter::setup_rejected),
        help(
            "Check the device id, host, local key and protocol version.\n\
             Nothing was written to the configuration."
        )
    )]
    SetupRejected {
        reason_code: &'static str,
        message: String,
    },

    #[error("Invalid status bridge URL '{url}'")]
    #[diagnostic(
        code(aquameter::bridge),
        help("Set defaults.bridge_url in the config file or pass --bridge http://host:port")
    )]
    Bridge {
        url: String,
        #[source]
        source: aquameter_api::Error,
    },

    // ── Credentials ──────────────────────────────────────────────────
    #[error("No local key configured for device '{device}'")]
    #[diagnostic(
        code(aquameter::no_credentials),
        help(
            "Store one with: aquameter config set-key {device}\n\
             Or set local_key_env in the device profile."
        )
    )]
    NoCredentials { device: String },

    #[error("Keyring error: {reason}")]
    #[diagnostic(code(aquameter::keyring))]
    Keyring { reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(aquameter::validation))]
    Validation { field: String, reason: String },

    #[error("Device {device_id} is already configured as '{profile}'")]
    #[diagnostic(
        code(aquameter::already_configured),
        help("Edit the existing profile with: aquameter config edit {profile}")
    )]
    AlreadyConfigured { device_id: String, profile: String },

    #[error("Device hub is shut down")]
    #[diagnostic(code(aquameter::hub_shut_down))]
    HubShutDown,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Device profile '{name}' not found in configuration")]
    #[diagnostic(
        code(aquameter::device_not_found),
        help(
            "Available devices: {available}\n\
             Add one with: aquameter config init"
        )
    )]
    DeviceNotFound { name: String, available: String },

    #[error("No device configured")]
    #[diagnostic(
        code(aquameter::no_config),
        help(
            "Add one with: aquameter config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(aquameter::config))]
    Config(Box<figment::Error>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(aquameter::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize output: {0}")]
    #[diagnostic(code(aquameter::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to serialize output: {0}")]
    #[diagnostic(code(aquameter::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to write config: {0}")]
    #[diagnostic(code(aquameter::config_write))]
    ConfigWrite(String),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UpdateFailed { .. } => exit_code::UPDATE_FAILED,
            Self::SetupRejected { reason_code, .. } => match *reason_code {
                "cannot_connect" => exit_code::CONNECTION,
                "invalid_data" => exit_code::INVALID_DATA,
                "invalid_input" => exit_code::USAGE,
                _ => exit_code::GENERAL,
            },
            Self::DeviceNotFound { .. } | Self::NoConfig { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. }
            | Self::AlreadyConfigured { .. }
            | Self::NoCredentials { .. }
            | Self::Bridge { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions from lower layers ────────────────────────────────────

impl From<UpdateFailed> for CliError {
    fn from(err: UpdateFailed) -> Self {
        Self::UpdateFailed {
            device: err.device_id,
            source: err.cause,
        }
    }
}

impl From<SetupError> for CliError {
    fn from(err: SetupError) -> Self {
        Self::SetupRejected {
            reason_code: err.reason_code(),
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidParameter { field, reason } => Self::Validation { field, reason },
            CoreError::Catalog { message } => Self::Validation {
                field: "catalog".into(),
                reason: message,
            },
            CoreError::AlreadySetUp { device_id } => Self::AlreadyConfigured {
                profile: device_id.clone(),
                device_id,
            },
            CoreError::NotReady { source, .. } => source.into(),
            CoreError::ShutDown => Self::HubShutDown,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { device } => Self::NoCredentials { device },
            ConfigError::AlreadyConfigured { device_id, profile } => {
                Self::AlreadyConfigured { device_id, profile }
            }
            ConfigError::DeviceNotFound { name, available } => Self::DeviceNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            },
            ConfigError::Keyring(e) => Self::Keyring {
                reason: e.to_string(),
            },
            ConfigError::Serialization(e) => Self::ConfigWrite(e.to_string()),
            ConfigError::Figment(e) => Self::Config(e),
            ConfigError::Io(e) => Self::Io(e),
        }
    }
}
