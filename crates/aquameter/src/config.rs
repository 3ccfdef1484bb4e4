//! CLI configuration: thin wrapper around `aquameter_config` that applies
//! the global flags (`--config`, `--device`, `--bridge`).

use std::path::PathBuf;
use std::sync::Arc;

use clap::ValueEnum;

pub use aquameter_config::{Config, DeviceProfile};
use aquameter_core::{BridgeConnector, DeviceEntry};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Config file in effect: `--config` / `AQUAMETER_CONFIG`, else the
/// platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(aquameter_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(aquameter_config::load_config_from(&config_file(global))?)
}

pub fn save(global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    Ok(aquameter_config::save_config_to(cfg, &config_file(global))?)
}

/// Output format in effect: `--output` / `AQUAMETER_OUTPUT`, else
/// `defaults.output` from the config file.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> Result<OutputFormat, CliError> {
    if let Some(format) = &global.output {
        return Ok(format.clone());
    }
    OutputFormat::from_str(&cfg.defaults.output, true).map_err(|reason| CliError::Validation {
        field: "defaults.output".into(),
        reason,
    })
}

/// Name of the device profile to operate on.
pub fn active_device(global: &GlobalOpts, cfg: &Config) -> Result<String, CliError> {
    cfg.active_device_name(global.device.as_deref())
        .ok_or_else(|| {
            if cfg.devices.is_empty() {
                CliError::NoConfig {
                    path: config_file(global).display().to_string(),
                }
            } else {
                CliError::Validation {
                    field: "device".into(),
                    reason: format!(
                        "several devices are configured ({}); pick one with --device or `aquameter config use`",
                        cfg.devices.keys().cloned().collect::<Vec<_>>().join(", ")
                    ),
                }
            }
        })
}

/// Resolve the active profile into a validated polling entry.
pub fn resolve_entry(global: &GlobalOpts, cfg: &Config) -> Result<(String, DeviceEntry), CliError> {
    let name = active_device(global, cfg)?;
    let profile = cfg.device(&name)?;
    let entry = aquameter_config::device_to_entry(&cfg.defaults, profile, &name)?;
    Ok((name, entry))
}

/// Connector for the status bridge: `--bridge` wins over the config file.
pub fn connector(global: &GlobalOpts, cfg: &Config) -> Result<Arc<BridgeConnector>, CliError> {
    let raw = global.bridge.as_deref().unwrap_or(&cfg.defaults.bridge_url);
    let url = aquameter_config::bridge_url(raw)?;
    let connector = BridgeConnector::new(url).map_err(|source| CliError::Bridge {
        url: raw.to_owned(),
        source,
    })?;
    Ok(Arc::new(connector))
}
