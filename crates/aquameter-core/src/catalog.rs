// ── Sensor catalog ──
//
// Static definitions of the measurements a tester exposes. Each one binds a
// measurement key to the raw data point that carries it, plus the unit,
// scale divisor and presentation hints consumers need.

use std::borrow::Cow;
use std::collections::HashSet;

use serde::Serialize;
use strum::{AsRefStr, Display};

use crate::error::CoreError;

/// Positive integer divisor applied to a raw data-point value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Scale(u32);

impl Scale {
    pub const TENTHS: Self = Self(10);
    pub const HUNDREDTHS: Self = Self(100);

    /// `None` for a zero divisor.
    pub const fn new(divisor: u32) -> Option<Self> {
        if divisor == 0 { None } else { Some(Self(divisor)) }
    }

    pub const fn divisor(self) -> u32 {
        self.0
    }

    pub fn apply(self, raw: f64) -> f64 {
        raw / f64::from(self.0)
    }
}

/// Physical quantity hint for consumers that group or convert values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Temperature,
    Voltage,
}

/// How a value behaves over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    /// A point-in-time reading.
    #[default]
    Measurement,
}

/// One measurement a tester reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementDefinition {
    pub key: Cow<'static, str>,
    pub name: Cow<'static, str>,
    pub data_point: u32,
    pub unit: Option<Cow<'static, str>>,
    pub scale: Option<Scale>,
    pub device_class: Option<DeviceClass>,
    pub state_class: StateClass,
    pub icon: Option<Cow<'static, str>>,
}

impl MeasurementDefinition {
    pub fn new(
        key: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
        data_point: u32,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            data_point,
            unit: None,
            scale: None,
            device_class: None,
            state_class: StateClass::Measurement,
            icon: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<Cow<'static, str>>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_device_class(mut self, class: DeviceClass) -> Self {
        self.device_class = Some(class);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<Cow<'static, str>>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Convert a raw reading; no scale means a divisor of one.
    pub fn scale_value(&self, raw: f64) -> f64 {
        self.scale.map_or(raw, |s| s.apply(raw))
    }

    /// Data-point id as it appears in a status payload.
    pub fn data_point_id(&self) -> String {
        self.data_point.to_string()
    }
}

const fn reference(
    key: &'static str,
    name: &'static str,
    data_point: u32,
    unit: Option<&'static str>,
    scale: Option<Scale>,
    device_class: Option<DeviceClass>,
    icon: &'static str,
) -> MeasurementDefinition {
    MeasurementDefinition {
        key: Cow::Borrowed(key),
        name: Cow::Borrowed(name),
        data_point,
        unit: match unit {
            Some(u) => Some(Cow::Borrowed(u)),
            None => None,
        },
        scale,
        device_class,
        state_class: StateClass::Measurement,
        icon: Some(Cow::Borrowed(icon)),
    }
}

/// The 8-in-1 tester's measurements, in presentation order.
const REFERENCE_SENSORS: [MeasurementDefinition; 8] = [
    reference(
        "temperature",
        "Temperature",
        8,
        Some("°C"),
        Some(Scale::TENTHS),
        Some(DeviceClass::Temperature),
        "mdi:thermometer",
    ),
    reference("ph", "pH", 106, Some("pH"), Some(Scale::HUNDREDTHS), None, "mdi:test-tube"),
    reference("tds", "TDS", 111, Some("ppm"), None, None, "mdi:water-opacity"),
    reference("ec", "Conductivity", 116, Some("µS/cm"), None, None, "mdi:flash"),
    reference(
        "salinity",
        "Salinity",
        121,
        Some("%"),
        Some(Scale::HUNDREDTHS),
        None,
        "mdi:shaker-outline",
    ),
    reference(
        "orp",
        "ORP",
        131,
        Some("mV"),
        None,
        Some(DeviceClass::Voltage),
        "mdi:lightning-bolt",
    ),
    reference(
        "conductivity_factor",
        "Conductivity Factor",
        136,
        None,
        None,
        None,
        "mdi:chart-line",
    ),
    reference("pro_sensor", "PRO Sensor", 126, None, None, None, "mdi:help-circle"),
];

/// An ordered set of measurement definitions with unique keys and data points.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SensorCatalog {
    entries: Vec<MeasurementDefinition>,
}

impl SensorCatalog {
    /// The built-in 8-in-1 tester catalog.
    pub fn reference() -> Self {
        Self {
            entries: REFERENCE_SENSORS.to_vec(),
        }
    }

    /// Build a custom catalog, rejecting duplicate keys or data points.
    pub fn new(entries: Vec<MeasurementDefinition>) -> Result<Self, CoreError> {
        let mut keys = HashSet::new();
        let mut data_points = HashSet::new();
        for entry in &entries {
            if entry.key.is_empty() {
                return Err(CoreError::Catalog {
                    message: format!("data point {} has an empty key", entry.data_point),
                });
            }
            if !keys.insert(entry.key.as_ref()) {
                return Err(CoreError::Catalog {
                    message: format!("duplicate measurement key '{}'", entry.key),
                });
            }
            if !data_points.insert(entry.data_point) {
                return Err(CoreError::Catalog {
                    message: format!("duplicate data point {}", entry.data_point),
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn by_key(&self, key: &str) -> Option<&MeasurementDefinition> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn by_data_point(&self, data_point: u32) -> Option<&MeasurementDefinition> {
        self.entries.iter().find(|e| e.data_point == data_point)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MeasurementDefinition> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SensorCatalog {
    fn default() -> Self {
        Self::reference()
    }
}

impl<'a> IntoIterator for &'a SensorCatalog {
    type Item = &'a MeasurementDefinition;
    type IntoIter = std::slice::Iter<'a, MeasurementDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
