//! Open key/value configuration attached to every widget.
//!
//! There is no fixed schema: whatever keys a layout file carries are kept
//! verbatim and written back on save, so newer widget kinds can add settings
//! without breaking older layouts. Every read supplies a typed default, which
//! means a partial or slightly mistyped configuration never produces an error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known configuration keys
pub mod keys {
    pub const DISPLAY_NAME: &str = "display_name";
    pub const DESCRIPTION: &str = "description";
    pub const SHOW_TITLE: &str = "show_title";
    pub const SHOW_CLOSE: &str = "show_close";

    pub const BG_COLOR: &str = "bg_color";
    pub const TEXT_COLOR: &str = "text_color";
    pub const BORDER_COLOR: &str = "border_color";
    pub const ACCENT_COLOR: &str = "accent_color";
    pub const WARNING_COLOR: &str = "warning_color";
    pub const CRITICAL_COLOR: &str = "critical_color";

    pub const FONT_SIZE: &str = "font_size";
    pub const BORDER_WIDTH: &str = "border_width";
    pub const BORDER_RADIUS: &str = "border_radius";

    pub const UNIT: &str = "unit";
    pub const DECIMAL_PLACES: &str = "decimal_places";
    pub const CONVERSION_FACTOR: &str = "conversion_factor";
    pub const CONVERSION_OFFSET: &str = "conversion_offset";
    pub const FACTOR: &str = "factor";
    pub const OFFSET: &str = "offset";

    pub const MIN_VALUE: &str = "min_value";
    pub const MAX_VALUE: &str = "max_value";
    pub const WARNING_ENABLED: &str = "warning_enabled";
    pub const WARNING_LOW: &str = "warning_low";
    pub const WARNING_HIGH: &str = "warning_high";

    pub const ICON: &str = "icon";
    pub const OPACITY: &str = "opacity";
    pub const ORIENTATION: &str = "orientation";
    pub const THEME_MODE: &str = "theme_mode";

    pub const TOGGLE_ON_PAYLOAD: &str = "toggle_on_payload";
    pub const TOGGLE_OFF_PAYLOAD: &str = "toggle_off_payload";
    pub const TOGGLE_INPUT_TOPIC: &str = "toggle_input_topic";
    pub const TOGGLE_OFF_COLOR: &str = "toggle_off_color";

    pub const BUTTON_ON_PAYLOAD: &str = "button_on_payload";
    pub const BUTTON_OFF_PAYLOAD: &str = "button_off_payload";
    pub const BUTTON_MODE: &str = "button_mode";
    pub const BUTTON_FEEDBACK_TOPIC: &str = "button_feedback_topic";

    pub const SLIDER_INPUT_TOPIC: &str = "slider_input_topic";
    pub const SLIDER_STEP: &str = "slider_step";
}

/// Customisable appearance and behaviour settings of one widget.
///
/// Serialises transparently as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetConfig(Map<String, Value>);

impl WidgetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Builder style setter, mostly for tests and defaults
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Overwrites every key present in `other`, keeps the rest
    pub fn merge(&mut self, other: &WidgetConfig) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Fills in keys missing from `self` with the values from `defaults`
    pub fn fill_defaults(&mut self, defaults: &WidgetConfig) {
        for (key, value) in defaults.iter() {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    pub fn get_str(&self, key: &str, default: &str) -> String {
        match self.0.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => default.to_string(),
        }
    }

    /// Like [`get_str`](Self::get_str) but treats blank strings as missing
    pub fn get_non_empty(&self, key: &str) -> Option<String> {
        let value = self.get_str(key, "");
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        let parsed = match self.0.get(key) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|v| v.is_finite()).unwrap_or(default)
    }

    /// Reads the first key present out of `keys`
    pub fn get_f64_any(&self, keys: &[&str], default: f64) -> f64 {
        keys.iter()
            .find(|key| self.0.contains_key(**key))
            .map(|key| self.get_f64(key, default))
            .unwrap_or(default)
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        match self.0.get(key) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|v| v.is_finite()).map(|v| v.round() as i64))
                .unwrap_or(default),
            Some(Value::String(s)) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.round() as i64))
                    .unwrap_or(default)
            }
            _ => default,
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(default),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => default,
            },
            _ => default,
        }
    }
}

impl From<Map<String, Value>> for WidgetConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
