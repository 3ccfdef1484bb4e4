//! Clap derive structures for the `aquameter` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// aquameter -- read 8-in-1 water quality testers on the local network
#[derive(Debug, Parser)]
#[command(
    name = "aquameter",
    version,
    about = "Read 8-in-1 water quality testers from the command line",
    long_about = "Polls data-point based water quality testers (temperature, pH, TDS,\n\
        conductivity, salinity, ORP) through a local status bridge and maps\n\
        their raw data points into physical values.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file to use instead of the platform default
    #[arg(long, env = "AQUAMETER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Device profile to use
    #[arg(long, short = 'd', env = "AQUAMETER_DEVICE", global = true)]
    pub device: Option<String>,

    /// Status bridge URL (overrides config)
    #[arg(long, short = 'b', env = "AQUAMETER_BRIDGE", global = true)]
    pub bridge: Option<String>,

    /// Output format [default: defaults.output from the config, else table]
    #[arg(long, short = 'o', env = "AQUAMETER_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one update cycle and show the current readings
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Poll the device and print every update until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Check that the configured device answers with data points
    Validate,

    /// List the measurements a tester reports
    Sensors,

    /// Manage CLI configuration and device profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Reading commands ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Print the raw data points instead of mapped sensors
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between update cycles (overrides the profile)
    #[arg(long, short = 'i', value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Add a device with guided setup (validates before writing)
    Init,

    /// Add a device from flags (validates before writing)
    Add(AddDeviceArgs),

    /// Display current configuration (secrets masked)
    Show,

    /// List configured device profiles
    Devices,

    /// Change a device profile (validates the result before writing)
    Edit(EditDeviceArgs),

    /// Remove a device profile
    Remove {
        /// Profile name
        name: String,
    },

    /// Set the default device profile
    Use {
        /// Profile name
        name: String,
    },

    /// Store a device's local key in the system keyring
    SetKey {
        /// Profile name (defaults to the active device)
        name: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct AddDeviceArgs {
    /// Profile name
    pub name: String,

    /// Device id
    #[arg(long)]
    pub device_id: String,

    /// Device IP address or hostname
    #[arg(long)]
    pub host: String,

    /// Display name
    #[arg(long)]
    pub title: Option<String>,

    /// Local key (stored in plaintext; prefer --local-key-env or the keyring)
    #[arg(long, conflicts_with = "local_key_env")]
    pub local_key: Option<String>,

    /// Environment variable holding the local key
    #[arg(long)]
    pub local_key_env: Option<String>,

    /// Protocol version (3.1 to 3.5)
    #[arg(long)]
    pub protocol_version: Option<String>,

    /// Seconds between update cycles
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub scan_interval: Option<u64>,
}

#[derive(Debug, Args)]
pub struct EditDeviceArgs {
    /// Profile name (defaults to the active device)
    pub name: Option<String>,

    /// New display name
    #[arg(long)]
    pub title: Option<String>,

    /// New device id
    #[arg(long)]
    pub device_id: Option<String>,

    /// New IP address or hostname
    #[arg(long)]
    pub host: Option<String>,

    /// New protocol version (3.1 to 3.5)
    #[arg(long)]
    pub protocol_version: Option<String>,

    /// New scan interval in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub scan_interval: Option<u64>,

    /// Prompt for a new local key
    #[arg(long)]
    pub new_key: bool,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
