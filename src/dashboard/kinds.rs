//! Widget kinds and their kind-specific behaviour.
//!
//! Every kind is a closed enum variant; everything that differs between
//! kinds (payload parsing, outbound payloads, sizes, extra input topics)
//! is reached through the [`KindBehavior`] trait object returned by
//! [`WidgetKind::behavior`].

use super::config::{keys, WidgetConfig};
use super::error::DashboardError;
use super::geometry::Size;
use super::widget::{UserEdit, WidgetValue};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Label,
    Gauge,
    GaugeCircular,
    GaugeLinear,
    GaugeSpeedometer,
    Slider,
    Toggle,
    Button,
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 8] = [
        WidgetKind::Label,
        WidgetKind::Gauge,
        WidgetKind::GaugeCircular,
        WidgetKind::GaugeLinear,
        WidgetKind::GaugeSpeedometer,
        WidgetKind::Slider,
        WidgetKind::Toggle,
        WidgetKind::Button,
    ];

    /// Identifier used in layout files
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetKind::Label => "label",
            WidgetKind::Gauge => "gauge",
            WidgetKind::GaugeCircular => "gauge_circular",
            WidgetKind::GaugeLinear => "gauge_linear",
            WidgetKind::GaugeSpeedometer => "gauge_speedometer",
            WidgetKind::Slider => "slider",
            WidgetKind::Toggle => "toggle",
            WidgetKind::Button => "button",
        }
    }

    /// Identifier title-cased, e.g. "Gauge Linear"
    pub fn title(&self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_gauge(&self) -> bool {
        matches!(
            self,
            WidgetKind::Gauge
                | WidgetKind::GaugeCircular
                | WidgetKind::GaugeLinear
                | WidgetKind::GaugeSpeedometer
        )
    }

    /// True for kinds that publish on user interaction
    pub fn is_interactive(&self) -> bool {
        matches!(self, WidgetKind::Slider | WidgetKind::Toggle | WidgetKind::Button)
    }

    pub fn behavior(&self) -> &'static dyn KindBehavior {
        match self {
            WidgetKind::Label => &LABEL,
            WidgetKind::Gauge => &GAUGE,
            WidgetKind::GaugeCircular => &GAUGE_CIRCULAR,
            WidgetKind::GaugeLinear => &GAUGE_LINEAR,
            WidgetKind::GaugeSpeedometer => &GAUGE_SPEEDOMETER,
            WidgetKind::Slider => &SLIDER,
            WidgetKind::Toggle => &TOGGLE,
            WidgetKind::Button => &BUTTON,
        }
    }
}

impl Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WidgetKind {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        WidgetKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| DashboardError::UnknownWidgetKind(s.to_string()))
    }
}

/// Result of a user edit: the new local value and the payload to publish
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub value: WidgetValue,
    pub payload: String,
}

/// Behaviour that differs between widget kinds
pub trait KindBehavior: Send + Sync {
    fn kind(&self) -> WidgetKind;

    fn min_size(&self) -> Size;

    fn default_size(&self) -> Size;

    /// Interprets an inbound payload; the error string ends up in the widget's error state
    fn parse_payload(&self, payload: &str, config: &WidgetConfig) -> Result<WidgetValue, String>;

    /// Applies a user edit, `None` for display-only kinds or edits that do not apply
    fn apply_edit(
        &self,
        _edit: UserEdit,
        _current: &WidgetValue,
        _config: &WidgetConfig,
    ) -> Option<EditOutcome> {
        None
    }

    /// Payload a value change would publish if it were not suppressed
    fn publish_payload(&self, _value: &WidgetValue, _config: &WidgetConfig) -> Option<String> {
        None
    }

    /// Additional topics the widget listens on besides its own
    fn input_topics(&self, _config: &WidgetConfig) -> Vec<String> {
        Vec::new()
    }

    /// Text shown for an on/off state
    fn state_label(&self, on: bool, _config: &WidgetConfig) -> String {
        let label = if on { "ON" } else { "OFF" };
        label.to_string()
    }

    /// Canonical string of a value, used for layout files
    fn canonical_value(&self, value: &WidgetValue, _config: &WidgetConfig) -> String {
        match value {
            WidgetValue::Empty => String::new(),
            WidgetValue::Text(text) => text.clone(),
            WidgetValue::Number(number) => format_number(*number),
            WidgetValue::Bool(on) => on.to_string(),
        }
    }
}

/// Shortest decimal form of a number, `55` instead of `55.0`
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        // avoids "-0"
        return "0".to_string();
    }
    value.to_string()
}

/// Parses a finite number out of a trimmed payload
pub fn parse_number(payload: &str) -> Result<f64, String> {
    let trimmed = payload.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!("Expected a number, got '{}'", trimmed)),
    }
}

/// Clamps into `[min, max]`, tolerating swapped bounds
pub fn clamp_range(value: f64, min: f64, max: f64) -> f64 {
    let (low, high) = if min <= max { (min, max) } else { (max, min) };
    value.max(low).min(high)
}

fn value_range(config: &WidgetConfig) -> (f64, f64) {
    (
        config.get_f64(keys::MIN_VALUE, 0.0),
        config.get_f64(keys::MAX_VALUE, 100.0),
    )
}

fn parse_switch(payload: &str, on: &str, off: &str) -> Result<bool, String> {
    let trimmed = payload.trim();
    if trimmed == on.trim() {
        return Ok(true);
    }
    if trimmed == off.trim() {
        return Ok(false);
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "on" | "1" => Ok(true),
        "false" | "off" | "0" => Ok(false),
        _ => Err(format!("Expected '{}' or '{}', got '{}'", on, off, trimmed)),
    }
}

fn optional_topic(config: &WidgetConfig, key: &str) -> Vec<String> {
    config.get_non_empty(key).into_iter().collect()
}

fn current_state(value: &WidgetValue) -> bool {
    matches!(value, WidgetValue::Bool(true))
}

pub struct LabelBehavior;

impl KindBehavior for LabelBehavior {
    fn kind(&self) -> WidgetKind {
        WidgetKind::Label
    }

    fn min_size(&self) -> Size {
        Size::new(100, 60)
    }

    fn default_size(&self) -> Size {
        Size::new(200, 100)
    }

    fn parse_payload(&self, payload: &str, _config: &WidgetConfig) -> Result<WidgetValue, String> {
        Ok(WidgetValue::Text(payload.to_string()))
    }
}

pub struct GaugeBehavior {
    variant: WidgetKind,
}

impl KindBehavior for GaugeBehavior {
    fn kind(&self) -> WidgetKind {
        self.variant
    }

    fn min_size(&self) -> Size {
        Size::new(120, 100)
    }

    fn default_size(&self) -> Size {
        match self.variant {
            WidgetKind::GaugeLinear => Size::new(240, 100),
            _ => Size::new(200, 160),
        }
    }

    fn parse_payload(&self, payload: &str, _config: &WidgetConfig) -> Result<WidgetValue, String> {
        parse_number(payload).map(WidgetValue::Number)
    }
}

pub struct SliderBehavior;

impl SliderBehavior {
    fn quantize(value: f64, config: &WidgetConfig) -> f64 {
        let (min, max) = value_range(config);
        let step = config.get_f64(keys::SLIDER_STEP, 1.0);
        let low = min.min(max);
        let stepped = if step > 0.0 {
            low + ((value - low) / step).round() * step
        } else {
            value
        };
        // strip float noise such as 0.30000000000000004
        let stepped = (stepped * 1e9).round() / 1e9;
        clamp_range(stepped, min, max)
    }
}

impl KindBehavior for SliderBehavior {
    fn kind(&self) -> WidgetKind {
        WidgetKind::Slider
    }

    fn min_size(&self) -> Size {
        Size::new(140, 80)
    }

    fn default_size(&self) -> Size {
        Size::new(240, 100)
    }

    fn parse_payload(&self, payload: &str, config: &WidgetConfig) -> Result<WidgetValue, String> {
        let (min, max) = value_range(config);
        parse_number(payload).map(|value| WidgetValue::Number(clamp_range(value, min, max)))
    }

    fn apply_edit(
        &self,
        edit: UserEdit,
        _current: &WidgetValue,
        config: &WidgetConfig,
    ) -> Option<EditOutcome> {
        match edit {
            UserEdit::SetNumber(value) if value.is_finite() => {
                let value = Self::quantize(value, config);
                Some(EditOutcome {
                    value: WidgetValue::Number(value),
                    payload: format_number(value),
                })
            }
            _ => None,
        }
    }

    fn publish_payload(&self, value: &WidgetValue, _config: &WidgetConfig) -> Option<String> {
        match value {
            WidgetValue::Number(number) => Some(format_number(*number)),
            _ => None,
        }
    }

    fn input_topics(&self, config: &WidgetConfig) -> Vec<String> {
        optional_topic(config, keys::SLIDER_INPUT_TOPIC)
    }
}

pub struct ToggleBehavior;

impl ToggleBehavior {
    fn payloads(config: &WidgetConfig) -> (String, String) {
        (
            config.get_str(keys::TOGGLE_ON_PAYLOAD, "1"),
            config.get_str(keys::TOGGLE_OFF_PAYLOAD, "0"),
        )
    }
}

impl KindBehavior for ToggleBehavior {
    fn kind(&self) -> WidgetKind {
        WidgetKind::Toggle
    }

    fn min_size(&self) -> Size {
        Size::new(120, 60)
    }

    fn default_size(&self) -> Size {
        Size::new(160, 80)
    }

    fn parse_payload(&self, payload: &str, config: &WidgetConfig) -> Result<WidgetValue, String> {
        let (on, off) = Self::payloads(config);
        parse_switch(payload, &on, &off).map(WidgetValue::Bool)
    }

    fn apply_edit(
        &self,
        edit: UserEdit,
        current: &WidgetValue,
        config: &WidgetConfig,
    ) -> Option<EditOutcome> {
        let on = match edit {
            UserEdit::SetBool(on) => on,
            UserEdit::Press => !current_state(current),
            UserEdit::SetNumber(_) => return None,
        };
        let value = WidgetValue::Bool(on);
        let payload = self.publish_payload(&value, config)?;
        Some(EditOutcome { value, payload })
    }

    fn publish_payload(&self, value: &WidgetValue, config: &WidgetConfig) -> Option<String> {
        let (on, off) = Self::payloads(config);
        match value {
            WidgetValue::Bool(true) => Some(on),
            WidgetValue::Bool(false) => Some(off),
            _ => None,
        }
    }

    fn input_topics(&self, config: &WidgetConfig) -> Vec<String> {
        optional_topic(config, keys::TOGGLE_INPUT_TOPIC)
    }
}

pub struct ButtonBehavior;

impl ButtonBehavior {
    fn payloads(config: &WidgetConfig) -> (String, String) {
        (
            config.get_str(keys::BUTTON_ON_PAYLOAD, "ON"),
            config.get_str(keys::BUTTON_OFF_PAYLOAD, "OFF"),
        )
    }

    fn is_momentary(config: &WidgetConfig) -> bool {
        config
            .get_str(keys::BUTTON_MODE, "toggle")
            .trim()
            .eq_ignore_ascii_case("momentary")
    }
}

impl KindBehavior for ButtonBehavior {
    fn kind(&self) -> WidgetKind {
        WidgetKind::Button
    }

    fn min_size(&self) -> Size {
        Size::new(100, 60)
    }

    fn default_size(&self) -> Size {
        Size::new(140, 80)
    }

    fn parse_payload(&self, payload: &str, config: &WidgetConfig) -> Result<WidgetValue, String> {
        let (on, off) = Self::payloads(config);
        parse_switch(payload, &on, &off).map(WidgetValue::Bool)
    }

    fn apply_edit(
        &self,
        edit: UserEdit,
        current: &WidgetValue,
        config: &WidgetConfig,
    ) -> Option<EditOutcome> {
        let (on_payload, _) = Self::payloads(config);
        if Self::is_momentary(config) {
            return match edit {
                UserEdit::Press | UserEdit::SetBool(true) => Some(EditOutcome {
                    value: WidgetValue::Bool(false),
                    payload: on_payload,
                }),
                _ => None,
            };
        }

        let on = match edit {
            UserEdit::SetBool(on) => on,
            UserEdit::Press => !current_state(current),
            UserEdit::SetNumber(_) => return None,
        };
        let value = WidgetValue::Bool(on);
        let payload = self.publish_payload(&value, config)?;
        Some(EditOutcome { value, payload })
    }

    fn publish_payload(&self, value: &WidgetValue, config: &WidgetConfig) -> Option<String> {
        if Self::is_momentary(config) {
            return None;
        }
        let (on, off) = Self::payloads(config);
        match value {
            WidgetValue::Bool(true) => Some(on),
            WidgetValue::Bool(false) => Some(off),
            _ => None,
        }
    }

    fn input_topics(&self, config: &WidgetConfig) -> Vec<String> {
        optional_topic(config, keys::BUTTON_FEEDBACK_TOPIC)
    }

    fn state_label(&self, on: bool, config: &WidgetConfig) -> String {
        let (on_payload, off_payload) = Self::payloads(config);
        if on {
            on_payload
        } else {
            off_payload
        }
    }

    fn canonical_value(&self, value: &WidgetValue, config: &WidgetConfig) -> String {
        match value {
            WidgetValue::Bool(on) => self.state_label(*on, config),
            WidgetValue::Empty => String::new(),
            WidgetValue::Text(text) => text.clone(),
            WidgetValue::Number(number) => format_number(*number),
        }
    }
}

static LABEL: LabelBehavior = LabelBehavior;
static GAUGE: GaugeBehavior = GaugeBehavior {
    variant: WidgetKind::Gauge,
};
static GAUGE_CIRCULAR: GaugeBehavior = GaugeBehavior {
    variant: WidgetKind::GaugeCircular,
};
static GAUGE_LINEAR: GaugeBehavior = GaugeBehavior {
    variant: WidgetKind::GaugeLinear,
};
static GAUGE_SPEEDOMETER: GaugeBehavior = GaugeBehavior {
    variant: WidgetKind::GaugeSpeedometer,
};
static SLIDER: SliderBehavior = SliderBehavior;
static TOGGLE: ToggleBehavior = ToggleBehavior;
static BUTTON: ButtonBehavior = ButtonBehavior;
