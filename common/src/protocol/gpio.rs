use serde::{Serialize, Serializer, Deserialize};
use serde_json::Value;
use crate::protocol::{PinInfo, GPIO_MODE};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SetupRequest {
    #[serde(default)]
    pub direction: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Any JSON value, see [`truthy`]
    #[serde(default)]
    pub state: Value,
}

impl WriteRequest {
    pub fn level(&self) -> bool {
        truthy(&self.state)
    }
}

/// Result of a setup, write or read request.
#[derive(Debug, Serialize)]
pub struct PinResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<bool>,
    #[serde(serialize_with = "empty_object_if_none")]
    pub pin_info: Option<PinInfo>,
    pub gpio_mode: &'static str,
    /// Number from the request path, `None` if the segment was not a number
    pub physical_pin: Option<i64>,
}

impl PinResult {
    pub fn new(physical_pin: Option<i64>, success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            state: None,
            pin_info: None,
            gpio_mode: GPIO_MODE,
            physical_pin,
        }
    }

    pub fn with_state(mut self, state: bool) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_pin_info(mut self, pin_info: Option<PinInfo>) -> Self {
        self.pin_info = pin_info;
        self
    }
}

fn empty_object_if_none<S: Serializer>(pin_info: &Option<PinInfo>, serializer: S) -> Result<S::Ok, S::Error> {
    match pin_info {
        Some(info) => info.serialize(serializer),
        None => serde_json::Map::new().serialize(serializer),
    }
}

/// Boolean coercion of a requested level: null, false, 0, "", [] and {} are
/// low, everything else is high.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
