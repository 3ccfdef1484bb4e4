// aquameter-core: Polling and mapping layer between aquameter-api and consumers (CLI).

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod device;
pub mod error;
pub mod hub;
pub mod mapper;
pub mod sensor;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;

// ── Primary re-exports ──────────────────────────────────────────────
pub use catalog::{DeviceClass, MeasurementDefinition, Scale, SensorCatalog, StateClass};
pub use config::{
    ConnectionParameters, ConnectionProfile, DeviceEntry, EntryChanges, ProtocolVersion,
};
pub use coordinator::{CoordinatorState, PollingCoordinator};
pub use device::{BridgeConnector, BridgeDeviceClient, Connector, DeviceClient};
pub use error::{CoreError, SetupError, UpdateFailed, UpdateFailure};
pub use hub::DeviceHub;
pub use mapper::{MappedReading, map_reading};
pub use sensor::{SensorAttributes, SensorState};
pub use validator::SetupValidator;
