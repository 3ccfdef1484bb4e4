//! `aquameter sensors`: the built-in measurement catalog.

use aquameter_core::{MeasurementDefinition, SensorCatalog};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output::{self, DefinitionRow};

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let format = config::output_format(global, &config::load(global)?)?;
    let catalog = SensorCatalog::reference();
    let definitions: Vec<MeasurementDefinition> = catalog.iter().cloned().collect();

    let out = output::render_list(&format, &definitions, DefinitionRow::new, |d| {
        d.key.to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
