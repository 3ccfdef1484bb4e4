//! `aquameter status`: one update cycle, then the sensor view.

use std::sync::Arc;

use aquameter_core::{
    Connector, DeviceClient, PollingCoordinator, SensorCatalog, UpdateFailed, UpdateFailure,
};

use crate::cli::{GlobalOpts, OutputFormat, StatusArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, SensorRow};

use super::util;

pub async fn handle(args: &StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let (_, entry) = config::resolve_entry(global, &cfg)?;
    let connector = config::connector(global, &cfg)?;
    let format = config::output_format(global, &cfg)?;

    if args.raw {
        return raw(&*connector, &entry, &format, global).await;
    }

    let coordinator =
        PollingCoordinator::new(entry, connector, Arc::new(SensorCatalog::reference()));

    let spinner = util::spinner("Reading device...", global.quiet);
    let result = coordinator.run_update_cycle().await;
    spinner.finish_and_clear();
    result?;

    let states = coordinator.sensor_states();
    let color = output::should_color(&global.color);
    let out = output::render_list(
        &format,
        &states,
        |s| SensorRow::new(s, color),
        output::sensor_plain,
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Print the device's data points exactly as reported, before mapping.
async fn raw<C: Connector>(
    connector: &C,
    entry: &aquameter_core::DeviceEntry,
    format: &OutputFormat,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let client = connector.connect(&entry.params);

    let spinner = util::spinner("Reading device...", global.quiet);
    let result = client.fetch_status().await;
    spinner.finish_and_clear();

    let points = result
        .map_err(UpdateFailure::from)
        .and_then(UpdateFailure::from_payload)
        .map_err(|cause| UpdateFailed {
            device_id: entry.unique_id().to_owned(),
            cause,
        })?;

    let out = output::render_single(
        format,
        &points,
        |p| {
            p.iter()
                .map(|(dp, value)| format!("{dp:>5}  {value}"))
                .collect::<Vec<_>>()
                .join("\n")
        },
        |p| {
            p.iter()
                .map(|(dp, value)| format!("{dp}={value}"))
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
