//! `aquameter validate`: setup-style check of the active profile.

use serde::Serialize;

use aquameter_core::SetupValidator;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct ValidationReport {
    profile: String,
    title: String,
    device_id: String,
    host: String,
    protocol_version: String,
    result: &'static str,
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let (profile, entry) = config::resolve_entry(global, &cfg)?;
    let format = config::output_format(global, &cfg)?;
    let validator = SetupValidator::new(config::connector(global, &cfg)?);

    let spinner = util::spinner("Checking device...", global.quiet);
    let result = validator.validate_entry(&entry).await;
    spinner.finish_and_clear();
    let title = result?;

    let report = ValidationReport {
        profile,
        title,
        device_id: entry.unique_id().to_owned(),
        host: entry.params.address().to_owned(),
        protocol_version: entry.params.protocol_version().to_string(),
        result: "ok",
    };
    let out = output::render_single(
        &format,
        &report,
        |r| {
            format!(
                "✓ {} ({}) answered with data points\n  device id: {}\n  protocol:  {}",
                r.title, r.host, r.device_id, r.protocol_version
            )
        },
        |r| r.result.to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
