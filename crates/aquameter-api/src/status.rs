// Raw device status payloads and their classification.
//
// The bridge relays whatever the device answered. A usable answer carries a
// `dps` object keyed by stringified data-point id. A device-side failure
// carries `Error` (message) and optionally `Err` (code). Anything else is
// incomplete.

use serde_json::{Map, Value};

pub const DATA_POINTS_KEY: &str = "dps";
pub const ERROR_MESSAGE_KEY: &str = "Error";
pub const ERROR_CODE_KEY: &str = "Err";

const UNKNOWN_CODE: &str = "Unknown";
const UNKNOWN_MESSAGE: &str = "Unknown error";

/// Raw data points as reported by the device, keyed by data-point id.
pub type DataPoints = Map<String, Value>;

/// One status answer, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusPayload {
    /// A non-empty `dps` object.
    DataPoints(DataPoints),
    /// The device (or its session) reported an error record.
    DeviceError { code: String, message: String },
    /// A non-empty answer without usable data points. Holds the answer.
    Incomplete(Value),
    /// Nothing came back.
    Empty,
}

impl StatusPayload {
    /// Classify a decoded status document.
    ///
    /// An error record wins over data points when both are present. An empty
    /// or non-object `dps` counts as incomplete.
    pub fn classify(value: Value) -> Self {
        if is_empty_value(&value) {
            return Self::Empty;
        }
        let Value::Object(mut object) = value else {
            return Self::Incomplete(value);
        };

        if let Some(message) = object.get(ERROR_MESSAGE_KEY) {
            let message = text_or(message, UNKNOWN_MESSAGE);
            let code = object
                .get(ERROR_CODE_KEY)
                .map_or_else(|| UNKNOWN_CODE.to_owned(), |c| text_or(c, UNKNOWN_CODE));
            return Self::DeviceError { code, message };
        }

        match object.remove(DATA_POINTS_KEY) {
            Some(Value::Object(points)) if !points.is_empty() => Self::DataPoints(points),
            Some(other) => {
                object.insert(DATA_POINTS_KEY.to_owned(), other);
                Self::Incomplete(Value::Object(object))
            }
            None => Self::Incomplete(Value::Object(object)),
        }
    }

    /// Decode and classify a raw response body. A blank body is `Empty`.
    pub fn from_body(body: &str) -> Result<Self, serde_json::Error> {
        if body.trim().is_empty() {
            return Ok(Self::Empty);
        }
        serde_json::from_str(body).map(Self::classify)
    }

    pub fn data_points(&self) -> Option<&DataPoints> {
        match self {
            Self::DataPoints(points) => Some(points),
            _ => None,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataPoints(_) => "data_points",
            Self::DeviceError { .. } => "device_error",
            Self::Incomplete(_) => "incomplete",
            Self::Empty => "empty",
        }
    }
}

fn text_or(value: &Value, fallback: &str) -> String {
    match value {
        Value::Null => fallback.to_owned(),
        Value::String(s) if s.is_empty() => fallback.to_owned(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}
