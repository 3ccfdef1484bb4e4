// aquameter-api: Async client for the local status bridge (device status as JSON)

pub mod bridge;
pub mod error;
pub mod status;
pub mod transport;

pub use bridge::{BridgeClient, StatusRequest};
pub use error::Error;
pub use status::{DataPoints, StatusPayload};
pub use transport::{RetryPolicy, TransportConfig};
