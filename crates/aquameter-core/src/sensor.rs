// ── Outbound sensor view ──
//
// What consumers see per catalog entry: identity, presentation hints, the
// latest value, availability, and a few attributes describing its source.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::{DeviceClass, MeasurementDefinition, StateClass};
use crate::config::DeviceEntry;
use crate::coordinator::CoordinatorState;

/// Extra attributes attached to a sensor once the device has reported data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorAttributes {
    pub device_id: String,
    pub sensor_type: String,
    pub data_point: u32,
    pub last_update: Option<DateTime<Utc>>,
}

/// One measurement as exposed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    /// `{device_id}_{key}`; stable across restarts.
    pub unique_id: String,
    /// `{device name} {measurement name}`.
    pub name: String,
    pub key: String,
    pub unit: Option<String>,
    pub device_class: Option<DeviceClass>,
    pub state_class: StateClass,
    pub icon: Option<String>,
    /// Latest known value. May be stale when `available` is false.
    pub value: Option<f64>,
    pub available: bool,
    pub attributes: Option<SensorAttributes>,
}

impl SensorState {
    pub fn new(
        entry: &DeviceEntry,
        definition: &MeasurementDefinition,
        state: &CoordinatorState,
    ) -> Self {
        let device_id = entry.unique_id();
        let reading = state.last_reading.as_ref();

        let attributes = reading.filter(|r| !r.is_empty()).map(|_| SensorAttributes {
            device_id: device_id.to_owned(),
            sensor_type: definition.key.to_string(),
            data_point: definition.data_point,
            last_update: state.last_success,
        });

        Self {
            unique_id: format!("{device_id}_{}", definition.key),
            name: format!("{} {}", entry.name, definition.name),
            key: definition.key.to_string(),
            unit: definition.unit.as_deref().map(str::to_owned),
            device_class: definition.device_class,
            state_class: definition.state_class,
            icon: definition.icon.as_deref().map(str::to_owned),
            value: reading.and_then(|r| r.get(&definition.key)),
            available: state.is_available(&definition.key),
            attributes,
        }
    }
}
