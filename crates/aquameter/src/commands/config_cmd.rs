//! Config subcommand handlers.
//!
//! Every path that creates or changes a device profile validates the result
//! against the live device first; the config file is written only when that
//! check passes.

use std::time::Duration;

use dialoguer::{Input, Select};
use secrecy::SecretString;
use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use aquameter_core::validator::DEFAULT_TITLE;
use aquameter_core::{DeviceEntry, EntryChanges, ProtocolVersion, SetupValidator};

use crate::cli::{AddDeviceArgs, ConfigCommand, EditDeviceArgs, GlobalOpts};
use crate::config::{self, Config, DeviceProfile};
use crate::error::CliError;
use crate::output;

use super::util::{self, prompt_err};

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking the local keys.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_device {
        let _ = writeln!(out, "default_device = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "bridge_url = \"{}\"", cfg.defaults.bridge_url);
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "scan_interval = {}", cfg.defaults.scan_interval);
    let _ = writeln!(out, "protocol_version = {}", cfg.defaults.protocol_version);

    for (name, p) in &cfg.devices {
        let _ = writeln!(out);
        let _ = writeln!(out, "[devices.{name}]");
        if let Some(ref title) = p.name {
            let _ = writeln!(out, "name = \"{title}\"");
        }
        let _ = writeln!(out, "device_id = \"{}\"", p.device_id);
        let _ = writeln!(out, "host = \"{}\"", p.host);
        if p.local_key.is_some() {
            let _ = writeln!(out, "local_key = \"****\"");
        }
        if let Some(ref env) = p.local_key_env {
            let _ = writeln!(out, "local_key_env = \"{env}\"");
        }
        if let Some(version) = p.protocol_version {
            let _ = writeln!(out, "protocol_version = {version}");
        }
        if let Some(secs) = p.scan_interval {
            let _ = writeln!(out, "scan_interval = {secs}");
        }
    }

    out
}

fn parse_version(raw: &str) -> Result<ProtocolVersion, CliError> {
    Ok(raw.parse::<ProtocolVersion>()?)
}

fn prompt_local_key(prompt: &str) -> Result<String, CliError> {
    let key = rpassword::prompt_password(prompt).map_err(prompt_err)?;
    if key.trim().is_empty() {
        return Err(CliError::Validation {
            field: "local_key".into(),
            reason: "local key cannot be empty".into(),
        });
    }
    Ok(key)
}

/// Offer to store the local key in the system keyring or return it for
/// plaintext config.
///
/// Returns `Some(key)` if the user chose plaintext, `None` if stored in the keyring.
fn prompt_keyring_storage(key: &str, device: &str) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the local key?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        aquameter_config::store_local_key(device, key)?;
        eprintln!("   ✓ local key stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(key.to_owned()))
    }
}

/// Check a new profile against the live device and fill in its validated
/// fields. The config is not touched.
async fn validate_new_device(
    global: &GlobalOpts,
    cfg: &Config,
    name: &str,
    profile: &mut DeviceProfile,
    key: SecretString,
) -> Result<(), CliError> {
    if cfg.devices.contains_key(name) {
        return Err(CliError::Validation {
            field: "name".into(),
            reason: format!("a device profile named '{name}' already exists"),
        });
    }
    if let Some(existing) = cfg.find_by_device_id(profile.device_id.trim()) {
        return Err(CliError::AlreadyConfigured {
            device_id: profile.device_id.trim().to_owned(),
            profile: existing.to_owned(),
        });
    }

    let params = aquameter_config::profile_to_params(&cfg.defaults, profile, key)?;
    let scan_interval =
        Duration::from_secs(profile.scan_interval.unwrap_or(cfg.defaults.scan_interval));
    let entry = DeviceEntry::new(profile.display_name(), params, scan_interval)?;

    let validator = SetupValidator::new(config::connector(global, cfg)?);
    let spinner = util::spinner("Testing connection to device...", global.quiet);
    let result = validator.validate_entry(&entry).await;
    spinner.finish_and_clear();
    result?;

    profile.apply_entry(&entry);
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(command: ConfigCommand, global: &GlobalOpts) -> Result<(), CliError> {
    match command {
        ConfigCommand::Init => init(global).await,
        ConfigCommand::Add(args) => add(args, global).await,
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            output::print_output(&format_config_redacted(&cfg), global.quiet);
            Ok(())
        }
        ConfigCommand::Devices => devices(global),
        ConfigCommand::Edit(args) => edit(args, global).await,
        ConfigCommand::Remove { name } => remove(&name, global),
        ConfigCommand::Use { name } => {
            let mut cfg = config::load(global)?;
            cfg.device(&name)?;
            cfg.default_device = Some(name.clone());
            config::save(global, &cfg)?;
            if !global.quiet {
                eprintln!("✓ Default device set to '{name}'");
            }
            Ok(())
        }
        ConfigCommand::SetKey { name } => {
            let cfg = config::load(global)?;
            let name = match name {
                Some(n) => n,
                None => config::active_device(global, &cfg)?,
            };
            cfg.device(&name)?;
            let key = prompt_local_key(&format!("Local key for '{name}': "))?;
            aquameter_config::store_local_key(&name, &key)?;
            if !global.quiet {
                eprintln!("✓ Local key for '{name}' stored in system keyring");
            }
            Ok(())
        }
    }
}

// ── Init: interactive wizard ────────────────────────────────────────

async fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_file(global);
    let mut cfg = config::load(global)?;
    eprintln!("aquameter -- device setup");
    eprintln!("   Config path: {}\n", path.display());

    let name: String = Input::new()
        .with_prompt("Profile name")
        .default("pool".into())
        .interact_text()
        .map_err(prompt_err)?;

    let title: String = Input::new()
        .with_prompt("Display name")
        .default(DEFAULT_TITLE.into())
        .interact_text()
        .map_err(prompt_err)?;

    let device_id: String = Input::new()
        .with_prompt("Device id")
        .interact_text()
        .map_err(prompt_err)?;

    let host: String = Input::new()
        .with_prompt("Device IP address")
        .interact_text()
        .map_err(prompt_err)?;

    let key = prompt_local_key("Local key: ")?;

    let versions: Vec<&str> = ProtocolVersion::ALL
        .into_iter()
        .map(ProtocolVersion::as_str)
        .collect();
    let default_version = ProtocolVersion::ALL
        .iter()
        .position(|v| *v == ProtocolVersion::default())
        .unwrap_or_default();
    let selected = Select::new()
        .with_prompt("Protocol version")
        .items(&versions)
        .default(default_version)
        .interact()
        .map_err(prompt_err)?;
    let version = ProtocolVersion::ALL
        .get(selected)
        .copied()
        .unwrap_or_default();

    let scan_interval: u64 = Input::new()
        .with_prompt("Scan interval (seconds)")
        .default(cfg.defaults.scan_interval)
        .interact_text()
        .map_err(prompt_err)?;

    let mut profile = DeviceProfile {
        name: Some(title),
        device_id,
        host,
        protocol_version: Some(version.as_f64()),
        scan_interval: Some(scan_interval),
        ..DeviceProfile::default()
    };
    validate_new_device(
        global,
        &cfg,
        &name,
        &mut profile,
        SecretString::from(key.clone()),
    )
    .await?;

    profile.local_key = prompt_keyring_storage(&key, &name)?;
    cfg.add_device(&name, profile)?;
    config::save(global, &cfg)?;

    eprintln!("\n✓ Device '{name}' added");
    eprintln!("   Try: aquameter status --device {name}");
    Ok(())
}

// ── Add: flag-driven setup ──────────────────────────────────────────

async fn add(args: AddDeviceArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load(global)?;

    let protocol_version = args
        .protocol_version
        .as_deref()
        .map(parse_version)
        .transpose()?
        .map(ProtocolVersion::as_f64);

    let mut profile = DeviceProfile {
        name: args.title,
        device_id: args.device_id,
        host: args.host,
        local_key: args.local_key.clone(),
        local_key_env: args.local_key_env.clone(),
        protocol_version,
        scan_interval: args.scan_interval,
    };

    let (key, prompted) = if let Some(key) = args.local_key {
        (key, false)
    } else if let Some(var) = args.local_key_env {
        let key = std::env::var(&var).map_err(|_| CliError::Validation {
            field: "local_key_env".into(),
            reason: format!("environment variable {var} is not set"),
        })?;
        (key, false)
    } else {
        (prompt_local_key("Local key: ")?, true)
    };

    validate_new_device(
        global,
        &cfg,
        &args.name,
        &mut profile,
        SecretString::from(key.clone()),
    )
    .await?;

    if prompted {
        aquameter_config::store_local_key(&args.name, &key)?;
    }
    cfg.add_device(&args.name, profile)?;
    config::save(global, &cfg)?;

    if !global.quiet {
        eprintln!("✓ Device '{}' added", args.name);
    }
    Ok(())
}

// ── Edit: reconfigure with validation ───────────────────────────────

async fn edit(args: EditDeviceArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load(global)?;
    let name = match args.name {
        Some(n) => n,
        None => config::active_device(global, &cfg)?,
    };
    let existing = aquameter_config::device_to_entry(&cfg.defaults, cfg.device(&name)?, &name)?;

    let new_key = if args.new_key {
        Some(prompt_local_key("New local key: ")?)
    } else {
        None
    };
    let changes = EntryChanges {
        name: args.title,
        device_id: args.device_id,
        local_key: new_key.clone().map(SecretString::from),
        address: args.host,
        protocol_version: args.protocol_version.as_deref().map(parse_version).transpose()?,
        scan_interval: args.scan_interval.map(Duration::from_secs),
    };
    if changes.is_empty() {
        return Err(CliError::Validation {
            field: "edit".into(),
            reason: "nothing to change; pass at least one of --title, --device-id, --host, \
                     --protocol-version, --scan-interval or --new-key"
                .into(),
        });
    }
    if let Some(owner) = changes
        .device_id
        .as_deref()
        .and_then(|id| cfg.find_by_device_id(id.trim()))
        .filter(|owner| *owner != name)
    {
        return Err(CliError::AlreadyConfigured {
            device_id: changes.device_id.clone().unwrap_or_default(),
            profile: owner.to_owned(),
        });
    }

    let validator = SetupValidator::new(config::connector(global, &cfg)?);
    let spinner = util::spinner("Testing connection to device...", global.quiet);
    let result = validator.validate_reconfigure(&existing, &changes).await;
    spinner.finish_and_clear();
    let merged = result?;

    let stored = cfg.device_mut(&name)?;
    stored.apply_entry(&merged);
    if let Some(key) = new_key {
        if stored.local_key.is_some() {
            stored.local_key = Some(key);
        } else {
            aquameter_config::store_local_key(&name, &key)?;
        }
    }
    config::save(global, &cfg)?;

    if !global.quiet {
        eprintln!("✓ Device '{name}' updated");
    }
    Ok(())
}

// ── Remove ──────────────────────────────────────────────────────────

fn remove(name: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load(global)?;
    cfg.device(name)?;

    if !util::confirm(&format!("Remove device profile '{name}'?"), global.yes)? {
        return Ok(());
    }

    cfg.remove_device(name)?;
    if let Err(e) = aquameter_config::delete_local_key(name) {
        warn!(device = name, error = %e, "could not remove local key from keyring");
    }
    config::save(global, &cfg)?;

    if !global.quiet {
        eprintln!("✓ Device '{name}' removed");
    }
    Ok(())
}

// ── Devices: list profiles ──────────────────────────────────────────

#[derive(Serialize)]
struct DeviceSummary {
    name: String,
    title: String,
    device_id: String,
    host: String,
    protocol_version: f64,
    scan_interval: u64,
    key_source: &'static str,
    default: bool,
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Device ID")]
    device_id: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Protocol")]
    protocol_version: f64,
    #[tabled(rename = "Interval")]
    interval: String,
    #[tabled(rename = "Key")]
    key_source: &'static str,
}

impl DeviceRow {
    fn new(s: &DeviceSummary) -> Self {
        Self {
            marker: if s.default { "*" } else { "" },
            name: s.name.clone(),
            title: s.title.clone(),
            device_id: s.device_id.clone(),
            host: s.host.clone(),
            protocol_version: s.protocol_version,
            interval: humantime::format_duration(Duration::from_secs(s.scan_interval))
                .to_string(),
            key_source: s.key_source,
        }
    }
}

fn devices(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let default = cfg.active_device_name(None);

    let summaries: Vec<DeviceSummary> = cfg
        .devices
        .iter()
        .map(|(name, p)| DeviceSummary {
            name: name.clone(),
            title: p.display_name().to_owned(),
            device_id: p.device_id.clone(),
            host: p.host.clone(),
            protocol_version: p.protocol_version.unwrap_or(cfg.defaults.protocol_version),
            scan_interval: p.scan_interval.unwrap_or(cfg.defaults.scan_interval),
            key_source: if p.local_key_env.is_some() {
                "env"
            } else if p.local_key.is_some() {
                "config"
            } else {
                "keyring"
            },
            default: default.as_deref() == Some(name.as_str()),
        })
        .collect();

    let format = config::output_format(global, &cfg)?;
    let out = output::render_list(&format, &summaries, DeviceRow::new, |s| {
        s.name.clone()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
