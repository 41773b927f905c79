//! The widget model shared by every dashboard element.
//!
//! A [`Widget`] owns its configuration, geometry, last value and error
//! state. Inbound messages and user edits both end in the same value-change
//! path; only the user-edit path may produce an [`OutboundMessage`], because
//! a message arriving from the broker runs in the [`UpdatePhase::Updating`]
//! phase which suppresses publishing. A slider listening on its own topic
//! therefore never echoes the broker back to itself.

use super::config::{keys, WidgetConfig};
use super::error::DashboardError;
use super::geometry::{Geometry, Size};
use super::interaction::Interaction;
use super::kinds::{clamp_range, format_number, parse_number, WidgetKind};
use crate::mqtt::{topic_matches, QosLevel};
use tracing::{debug, warn};

/// Last known value of a widget
#[derive(Debug, Clone, Default, PartialEq)]
pub enum WidgetValue {
    /// Nothing received yet
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl WidgetValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            WidgetValue::Number(number) => Some(*number),
            WidgetValue::Text(text) => parse_number(text).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WidgetValue::Bool(on) => Some(*on),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, WidgetValue::Empty)
    }
}

/// Value change requested by the user
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UserEdit {
    /// Slider moved to a value
    SetNumber(f64),
    /// Switch set explicitly
    SetBool(bool),
    /// Button or toggle clicked
    Press,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WarningLevel {
    #[default]
    None,
    Warning,
    Critical,
}

/// Whether the widget is currently applying a broker message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdatePhase {
    #[default]
    Idle,
    Updating,
}

/// A publish the canvas should hand to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: String,
    pub qos: QosLevel,
    pub retain: bool,
}

/// Visual properties derived from a configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Appearance {
    pub title: String,
    pub description: String,
    pub background: String,
    pub text_color: String,
    pub border_color: String,
    pub accent_color: String,
    pub warning_color: String,
    pub critical_color: String,
    pub off_color: String,
    pub font_size: f32,
    pub title_font_size: f32,
    pub border_width: f32,
    pub border_radius: f32,
    pub show_title: bool,
    pub show_close: bool,
    pub opacity: f32,
    pub icon: String,
    pub orientation: String,
}

impl Appearance {
    pub fn derive(kind: WidgetKind, config: &WidgetConfig) -> Self {
        let font_size = config.get_f64(keys::FONT_SIZE, 16.0).clamp(6.0, 96.0) as f32;
        Self {
            title: config
                .get_non_empty(keys::DISPLAY_NAME)
                .unwrap_or_else(|| kind.title()),
            description: config.get_str(keys::DESCRIPTION, ""),
            background: config.get_str(keys::BG_COLOR, "#ffffff"),
            text_color: config.get_str(keys::TEXT_COLOR, "#212529"),
            border_color: config.get_str(keys::BORDER_COLOR, "#dee2e6"),
            accent_color: config.get_str(keys::ACCENT_COLOR, "#0d6efd"),
            warning_color: config.get_str(keys::WARNING_COLOR, "#ffc107"),
            critical_color: config.get_str(keys::CRITICAL_COLOR, "#dc3545"),
            off_color: config.get_str(keys::TOGGLE_OFF_COLOR, "#6c757d"),
            font_size,
            title_font_size: (font_size - 2.0).max(10.0),
            border_width: config.get_f64(keys::BORDER_WIDTH, 1.0).clamp(0.0, 20.0) as f32,
            border_radius: config.get_f64(keys::BORDER_RADIUS, 4.0).clamp(0.0, 100.0) as f32,
            show_title: config.get_bool(keys::SHOW_TITLE, true),
            show_close: config.get_bool(keys::SHOW_CLOSE, true),
            opacity: config.get_f64(keys::OPACITY, 1.0).clamp(0.1, 1.0) as f32,
            icon: config.get_str(keys::ICON, ""),
            orientation: config.get_str(keys::ORIENTATION, "horizontal"),
        }
    }
}

/// One live dashboard widget
#[derive(Debug, Clone)]
pub struct Widget {
    kind: WidgetKind,
    topic: String,
    geometry: Geometry,
    config: WidgetConfig,
    appearance: Appearance,
    value: WidgetValue,
    display: String,
    warning: WarningLevel,
    error: Option<String>,
    interaction: Interaction,
    phase: UpdatePhase,
}

impl Widget {
    /// Creates a widget; the geometry is kept as given apart from the minimum size and canvas bounds
    pub fn new(kind: WidgetKind, topic: impl Into<String>, geometry: Geometry, config: WidgetConfig) -> Self {
        let min = kind.behavior().min_size().at_least_grid_minimum();
        let geometry = geometry.bounded(min);
        let appearance = Appearance::derive(kind, &config);
        Self {
            kind,
            topic: topic.into(),
            geometry,
            config,
            appearance,
            value: WidgetValue::Empty,
            display: String::new(),
            warning: WarningLevel::None,
            error: None,
            interaction: Interaction::Idle,
            phase: UpdatePhase::Idle,
        }
    }

    pub fn kind(&self) -> WidgetKind {
        self.kind
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn appearance(&self) -> &Appearance {
        &self.appearance
    }

    pub fn value(&self) -> &WidgetValue {
        &self.value
    }

    /// Formatted value as shown on screen, empty until the first value arrives
    pub fn display_text(&self) -> &str {
        &self.display
    }

    pub fn warning(&self) -> WarningLevel {
        self.warning
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    pub fn min_size(&self) -> Size {
        self.kind.behavior().min_size()
    }

    /// Merges `config` into the current configuration and re-derives everything visual
    pub fn apply_configuration(&mut self, config: &WidgetConfig) {
        self.config.merge(config);
        self.refresh();
    }

    /// Replaces the whole configuration
    pub fn replace_configuration(&mut self, config: WidgetConfig) {
        self.config = config;
        self.refresh();
    }

    fn refresh(&mut self) {
        self.appearance = Appearance::derive(self.kind, &self.config);
        self.refresh_display();
    }

    fn refresh_display(&mut self) {
        let behavior = self.kind.behavior();
        self.display = match &self.value {
            WidgetValue::Empty => String::new(),
            WidgetValue::Text(text) => self.format_value(text),
            WidgetValue::Number(number) => self.format_value(&format_number(*number)),
            WidgetValue::Bool(on) => behavior.state_label(*on, &self.config),
        };
        self.warning = self
            .value
            .as_number()
            .map(|number| self.classify_warning(number))
            .unwrap_or_default();
    }

    /// Applies the linear conversion, rounding and unit to a raw value.
    ///
    /// Non-numeric input comes back unchanged.
    pub fn format_value(&self, raw: &str) -> String {
        let number = match parse_number(raw) {
            Ok(number) => number,
            Err(_) => return raw.to_string(),
        };

        let factor = self
            .config
            .get_f64_any(&[keys::CONVERSION_FACTOR, keys::FACTOR], 1.0);
        let offset = self
            .config
            .get_f64_any(&[keys::CONVERSION_OFFSET, keys::OFFSET], 0.0);
        let decimals = self.config.get_i64(keys::DECIMAL_PLACES, 1).clamp(0, 10) as usize;

        let converted = number * factor + offset;
        let mut text = format!("{:.*}", decimals, converted);
        let unit = self.config.get_str(keys::UNIT, "");
        if !unit.trim().is_empty() {
            text.push(' ');
            text.push_str(unit.trim());
        }
        text
    }

    /// Three-tier threshold check; critical wins at the exact threshold
    pub fn classify_warning(&self, raw: f64) -> WarningLevel {
        if !self.config.get_bool(keys::WARNING_ENABLED, false) {
            return WarningLevel::None;
        }
        let low = self.config.get_f64(keys::WARNING_LOW, 20.0);
        let high = self.config.get_f64(keys::WARNING_HIGH, 80.0);

        if raw <= low || raw >= high {
            WarningLevel::Critical
        } else if raw <= low * 1.2 || raw >= high * 0.8 {
            WarningLevel::Warning
        } else {
            WarningLevel::None
        }
    }

    /// Position of the current value inside `[min_value, max_value]` as 0..=1
    pub fn ratio(&self) -> Option<f32> {
        let value = self.value.as_number()?;
        let min = self.config.get_f64(keys::MIN_VALUE, 0.0);
        let max = self.config.get_f64(keys::MAX_VALUE, 100.0);
        if (max - min).abs() < f64::EPSILON {
            return Some(0.0);
        }
        let clamped = clamp_range(value, min, max);
        Some(((clamped - min) / (max - min)).clamp(0.0, 1.0) as f32)
    }

    /// Every non-empty filter this widget listens on
    pub fn subscription_topics(&self) -> Vec<String> {
        let mut topics = Vec::new();
        if !self.topic.trim().is_empty() {
            topics.push(self.topic.clone());
        }
        for topic in self.kind.behavior().input_topics(&self.config) {
            if !topics.contains(&topic) {
                topics.push(topic);
            }
        }
        topics
    }

    pub fn listens_to(&self, topic: &str) -> bool {
        self.subscription_topics()
            .iter()
            .any(|filter| topic_matches(filter, topic))
    }

    /// Applies an inbound broker message.
    ///
    /// Never publishes: the value change runs in [`UpdatePhase::Updating`].
    /// An unreadable payload puts the widget into its error state and is
    /// reported back, the previous value stays in place.
    pub fn on_message(&mut self, topic: &str, payload: &str) -> Result<Option<OutboundMessage>, DashboardError> {
        if !self.listens_to(topic) {
            return Ok(None);
        }

        let behavior = self.kind.behavior();
        match behavior.parse_payload(payload, &self.config) {
            Ok(value) => {
                self.error = None;
                self.phase = UpdatePhase::Updating;
                let echo = behavior.publish_payload(&value, &self.config);
                let outbound = self.value_changed(value, echo);
                self.phase = UpdatePhase::Idle;
                Ok(outbound)
            }
            Err(reason) => {
                warn!("{} widget on {}: {}", self.kind, topic, reason);
                self.error = Some(reason.clone());
                Err(DashboardError::PayloadParse {
                    topic: topic.to_string(),
                    payload: payload.to_string(),
                    reason,
                })
            }
        }
    }

    /// Applies a user edit and returns the message to publish, if any
    pub fn on_user_edit(&mut self, edit: UserEdit) -> Option<OutboundMessage> {
        let outcome = self
            .kind
            .behavior()
            .apply_edit(edit, &self.value, &self.config)?;
        self.value_changed(outcome.value, Some(outcome.payload))
    }

    fn value_changed(&mut self, value: WidgetValue, payload: Option<String>) -> Option<OutboundMessage> {
        self.value = value;
        self.refresh_display();

        let payload = payload?;
        if self.phase == UpdatePhase::Updating {
            debug!("Suppressing publish to {} while applying a broker message", self.topic);
            return None;
        }
        if self.topic.trim().is_empty() {
            return None;
        }
        Some(OutboundMessage {
            topic: self.topic.clone(),
            payload,
            qos: QosLevel::AtMostOnce,
            retain: false,
        })
    }

    /// Canonical string of the current value for persistence
    pub fn get_value(&self) -> String {
        self.kind
            .behavior()
            .canonical_value(&self.value, &self.config)
    }

    /// Restores a persisted value without publishing it.
    ///
    /// Returns false when the stored text does not fit this kind.
    pub fn restore_value(&mut self, stored: &str) -> bool {
        if stored.is_empty() {
            return true;
        }
        let behavior = self.kind.behavior();
        match behavior.parse_payload(stored, &self.config) {
            Ok(value) => {
                self.phase = UpdatePhase::Updating;
                self.value_changed(value, None);
                self.phase = UpdatePhase::Idle;
                true
            }
            Err(reason) => {
                debug!("Ignoring stored value for {} widget: {}", self.kind, reason);
                false
            }
        }
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Moves by a pointer delta, snapping to the grid
    pub fn move_by(&mut self, dx: i32, dy: i32) {
        self.geometry = self.geometry.translated(dx, dy);
    }

    /// Grows or shrinks by a delta, snapping to the grid and keeping the minimum size
    pub fn resize_by(&mut self, dw: i32, dh: i32) {
        self.geometry = self.geometry.grown(dw, dh, self.min_size());
    }

    /// Starts a drag or resize gesture; false if the press does not hit this widget
    pub fn pointer_down(&mut self, px: i32, py: i32, allow_resize: bool) -> bool {
        match self.interaction.begin(self.geometry, px, py, allow_resize) {
            Some(gesture) => {
                self.interaction = gesture;
                true
            }
            None => false,
        }
    }

    /// Follows the pointer; returns true when the geometry changed
    pub fn pointer_move(&mut self, px: i32, py: i32) -> bool {
        match self.interaction.track(px, py, self.min_size()) {
            Some(geometry) if geometry != self.geometry => {
                self.geometry = geometry;
                true
            }
            _ => false,
        }
    }

    pub fn pointer_up(&mut self) {
        self.interaction = Interaction::Idle;
    }
}
