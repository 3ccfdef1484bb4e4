//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one line per item.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use aquameter_core::{MeasurementDefinition, SensorState};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

fn availability(available: bool, color: bool) -> String {
    match (available, color) {
        (true, true) => "ok".green().to_string(),
        (false, true) => "unavailable".red().to_string(),
        (true, false) => "ok".into(),
        (false, false) => "unavailable".into(),
    }
}

/// Value cell text; `-` when the sensor has never reported.
pub fn format_value(value: Option<f64>) -> String {
    value.as_ref().map_or_else(|| "-".into(), ToString::to_string)
}

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct SensorRow {
    #[tabled(rename = "Sensor")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl SensorRow {
    pub fn new(state: &SensorState, color: bool) -> Self {
        Self {
            name: state.name.clone(),
            value: format_value(state.value),
            unit: state.unit.clone().unwrap_or_default(),
            status: availability(state.available, color),
        }
    }
}

/// Plain form: `key=value`, with an empty value when unknown.
pub fn sensor_plain(state: &SensorState) -> String {
    let value = state
        .value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    format!("{}={value}", state.key)
}

#[derive(Tabled)]
pub struct DefinitionRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "DP")]
    data_point: u32,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Scale")]
    scale: String,
    #[tabled(rename = "Class")]
    class: String,
}

impl DefinitionRow {
    pub fn new(def: &MeasurementDefinition) -> Self {
        Self {
            key: def.key.to_string(),
            name: def.name.to_string(),
            data_point: def.data_point,
            unit: def.unit.as_deref().unwrap_or_default().to_owned(),
            scale: def
                .scale
                .map_or_else(|| "1".into(), |s| format!("1/{}", s.divisor())),
            class: match def.device_class {
                Some(class) => class.to_string(),
                None => def.state_class.to_string(),
            },
        }
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the original data via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: calls `line_fn` on each item to emit one line per item
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    line_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(data.iter().map(&line_fn).collect::<Vec<_>>().join("\n")),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, which returns a pre-formatted string.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    line_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(line_fn(data)),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

pub(crate) fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let out = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(out)
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_yaml::to_string(data)?)
}
