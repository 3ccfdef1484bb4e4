//! `aquameter watch`: keep polling and print each update until Ctrl-C.

use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::warn;

use aquameter_core::{
    BridgeConnector, CoordinatorState, DeviceHub, EntryChanges, PollingCoordinator, SensorState,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, SensorRow};

use super::util;

/// One printed update.
#[derive(Serialize)]
struct WatchUpdate<'a> {
    device: &'a str,
    at: DateTime<Utc>,
    sensors: Vec<SensorState>,
}

pub async fn handle(args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let (profile, mut entry) = config::resolve_entry(global, &cfg)?;
    if let Some(secs) = args.interval {
        entry = entry.apply(&EntryChanges {
            scan_interval: Some(Duration::from_secs(secs)),
            ..EntryChanges::default()
        })?;
    }
    let interval = entry.scan_interval;
    let format = config::output_format(global, &cfg)?;
    let hub = DeviceHub::new(config::connector(global, &cfg)?);

    let spinner = util::spinner("Connecting...", global.quiet);
    let setup = hub.setup_entry(entry).await;
    spinner.finish_and_clear();
    let coordinator = setup?;

    if !global.quiet && matches!(format, OutputFormat::Table) {
        eprintln!(
            "Watching {profile} every {} (Ctrl-C to stop)",
            humantime::format_duration(interval)
        );
    }

    let mut updates = coordinator.subscribe();
    let initial = updates.borrow_and_update().clone();
    print_update(&coordinator, &initial, &format, global)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let changed = tokio::select! {
            _ = &mut ctrl_c => None,
            changed = updates.changed() => Some(changed),
        };
        match changed {
            None | Some(Err(_)) => break,
            Some(Ok(())) => {
                let state = updates.borrow_and_update().clone();
                print_update(&coordinator, &state, &format, global)?;
            }
        }
    }

    hub.shutdown().await;
    Ok(())
}

fn print_update(
    coordinator: &PollingCoordinator<BridgeConnector>,
    state: &CoordinatorState,
    format: &OutputFormat,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !state.last_cycle_succeeded {
        if let Some(ref failure) = state.last_failure {
            warn!(kind = failure.kind(), "{failure}");
            if !global.quiet {
                eprintln!(
                    "{}  update failed: {failure} (keeping last reading)",
                    Local::now().format("%H:%M:%S")
                );
            }
        }
        return Ok(());
    }

    let update = WatchUpdate {
        device: coordinator.device_id(),
        at: state.last_success.unwrap_or_else(Utc::now),
        sensors: coordinator.sensor_states(),
    };
    let color = output::should_color(&global.color);
    let out = output::render_single(
        format,
        &update,
        |u| {
            let rows: Vec<SensorRow> = u.sensors.iter().map(|s| SensorRow::new(s, color)).collect();
            format!(
                "{}\n{}",
                u.at.with_timezone(&Local).format("%H:%M:%S"),
                output::render_table(&rows)
            )
        },
        |u| {
            u.sensors
                .iter()
                .map(output::sensor_plain)
                .collect::<Vec<_>>()
                .join(" ")
        },
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
