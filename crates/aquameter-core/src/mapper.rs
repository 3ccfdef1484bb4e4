// ── Value mapping ──
//
// Turns raw data points into named physical values using a catalog.
// A missing or non-numeric data point drops that one measurement and
// leaves the rest alone.

use std::collections::BTreeMap;

use aquameter_api::DataPoints;
use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::SensorCatalog;

/// Measurement key → physical value, for the keys that were present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MappedReading(BTreeMap<String, f64>);

impl MappedReading {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    fn insert(&mut self, key: String, value: f64) {
        self.0.insert(key, value);
    }
}

impl FromIterator<(String, f64)> for MappedReading {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Map every catalog entry whose data point is present and numeric.
pub fn map_reading(points: &DataPoints, catalog: &SensorCatalog) -> MappedReading {
    let mut reading = MappedReading::default();

    for definition in catalog {
        let id = definition.data_point_id();
        let Some(raw) = points.get(&id) else {
            warn!(
                key = %definition.key,
                data_point = definition.data_point,
                "data point missing from device status"
            );
            continue;
        };
        let Some(raw_value) = raw.as_f64() else {
            warn!(
                key = %definition.key,
                data_point = definition.data_point,
                raw = %raw,
                "data point is not numeric, skipping"
            );
            continue;
        };

        let value = definition.scale_value(raw_value);
        debug!(key = %definition.key, raw = raw_value, value, "mapped data point");
        reading.insert(definition.key.to_string(), value);
    }

    reading
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::catalog::{MeasurementDefinition, Scale};

    fn points(value: serde_json::Value) -> DataPoints {
        match value {
            serde_json::Value::Object(map) => map,
            _ => DataPoints::new(),
        }
    }

    #[test]
    fn present_points_are_scaled() {
        let reading = map_reading(
            &points(json!({ "8": 238, "106": 790 })),
            &SensorCatalog::reference(),
        );

        let expected: MappedReading = [("ph".to_owned(), 7.9), ("temperature".to_owned(), 23.8)]
            .into_iter()
            .collect();
        assert_eq!(reading, expected);
    }

    #[test]
    fn absent_points_do_not_affect_others() {
        let reading = map_reading(
            &points(json!({ "111": 420, "999": 1 })),
            &SensorCatalog::reference(),
        );
        assert_eq!(reading.len(), 1);
        assert_eq!(reading.get("tds"), Some(420.0));
        assert!(!reading.contains("temperature"));
    }

    #[test]
    fn non_numeric_points_are_skipped() {
        let reading = map_reading(
            &points(json!({ "8": "warm", "131": 265, "126": true })),
            &SensorCatalog::reference(),
        );
        assert_eq!(reading.len(), 1);
        assert_eq!(reading.get("orp"), Some(265.0));
    }

    #[test]
    fn fractional_raw_values_pass_through() {
        let reading = map_reading(
            &points(json!({ "136": 0.65, "121": 12 })),
            &SensorCatalog::reference(),
        );
        assert_eq!(reading.get("conductivity_factor"), Some(0.65));
        assert_eq!(reading.get("salinity"), Some(0.12));
    }

    #[test]
    fn empty_points_give_empty_reading() {
        let reading = map_reading(&DataPoints::new(), &SensorCatalog::reference());
        assert!(reading.is_empty());
    }

    #[test]
    fn custom_catalog_is_respected() {
        let catalog = SensorCatalog::new(vec![
            MeasurementDefinition::new("chlorine", "Free Chlorine", 140)
                .with_unit("ppm")
                .with_scale(Scale::TENTHS),
        ])
        .unwrap();
        let reading = map_reading(&points(json!({ "140": 15, "8": 238 })), &catalog);
        assert_eq!(reading.iter().collect::<Vec<_>>(), vec![("chlorine", 1.5)]);
    }

    #[test]
    fn mapping_is_repeatable() {
        let raw = points(json!({ "8": 251, "106": 702, "116": 1330 }));
        let catalog = SensorCatalog::reference();
        assert_eq!(map_reading(&raw, &catalog), map_reading(&raw, &catalog));
    }
}
