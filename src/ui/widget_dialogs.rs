//! Dialogs for creating widgets and editing their configuration

use crate::dashboard::{keys, Widget, WidgetConfig, WidgetId, WidgetKind, WidgetSpec};
use eframe::egui::{self, ComboBox, Id, Modal, ScrollArea, Ui};
use serde_json::Value;

use super::common::UiColors;

/// Modal asking for kind, topic and an optional display name
#[derive(Debug)]
pub struct AddWidgetDialog {
    open: bool,
    kind: WidgetKind,
    topic: String,
    display_name: String,
    error: Option<String>,
}

impl Default for AddWidgetDialog {
    fn default() -> Self {
        Self {
            open: false,
            kind: WidgetKind::Label,
            topic: String::new(),
            display_name: String::new(),
            error: None,
        }
    }
}

impl AddWidgetDialog {
    pub fn open(&mut self) {
        self.open = true;
        self.error = None;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.topic.clear();
        self.display_name.clear();
        self.error = None;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Shown inside the dialog, e.g. when the canvas rejected the topic
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn to_spec(&self) -> WidgetSpec {
        let mut config = WidgetConfig::new();
        if !self.display_name.trim().is_empty() {
            config.set(keys::DISPLAY_NAME, self.display_name.trim());
        }
        WidgetSpec::new(self.kind.as_str(), self.topic.trim()).with_config(config)
    }

    /// Renders the dialog; returns a spec once the user pressed "Add"
    pub fn show(&mut self, ui: &mut Ui, kinds: &[WidgetKind]) -> Option<WidgetSpec> {
        if !self.open {
            return None;
        }

        let mut add = false;
        let mut cancel = false;
        let modal = Modal::new(Id::new("add_widget")).show(ui.ctx(), |ui| {
            ui.set_width(280.0);
            ui.heading("Add Widget");

            ui.label("Type");
            ComboBox::from_id_salt("widget_kind")
                .selected_text(self.kind.title())
                .show_ui(ui, |ui| {
                    for kind in kinds {
                        ui.selectable_value(&mut self.kind, *kind, kind.title());
                    }
                });
            ui.label("Topic");
            ui.text_edit_singleline(&mut self.topic);
            ui.label("Display name");
            ui.text_edit_singleline(&mut self.display_name);

            if let Some(error) = &self.error {
                ui.colored_label(UiColors::INACTIVE, error);
            }
            ui.separator();

            egui::Sides::new().show(
                ui,
                |left| add = left.button("Add").clicked(),
                |right| cancel = right.button("Cancel").clicked(),
            );
        });

        if cancel || modal.should_close() {
            self.close();
            return None;
        }
        if add {
            if self.topic.trim().is_empty() && self.kind.is_interactive() {
                self.set_error("Interactive widgets need a topic");
                return None;
            }
            return Some(self.to_spec());
        }
        None
    }
}

/// Keys offered in the customization window for a kind
pub fn editable_keys(kind: WidgetKind) -> Vec<&'static str> {
    let mut offered = vec![
        keys::DISPLAY_NAME,
        keys::DESCRIPTION,
        keys::SHOW_TITLE,
        keys::SHOW_CLOSE,
        keys::BG_COLOR,
        keys::TEXT_COLOR,
        keys::BORDER_COLOR,
        keys::ACCENT_COLOR,
        keys::FONT_SIZE,
        keys::BORDER_WIDTH,
        keys::BORDER_RADIUS,
        keys::OPACITY,
    ];
    let numeric = [
        keys::UNIT,
        keys::DECIMAL_PLACES,
        keys::CONVERSION_FACTOR,
        keys::CONVERSION_OFFSET,
    ];
    let ranged = [keys::MIN_VALUE, keys::MAX_VALUE];
    let warnings = [
        keys::WARNING_ENABLED,
        keys::WARNING_LOW,
        keys::WARNING_HIGH,
        keys::WARNING_COLOR,
        keys::CRITICAL_COLOR,
    ];

    match kind {
        WidgetKind::Label => offered.extend(numeric),
        WidgetKind::Gauge
        | WidgetKind::GaugeCircular
        | WidgetKind::GaugeLinear
        | WidgetKind::GaugeSpeedometer => {
            offered.extend(numeric);
            offered.extend(ranged);
            offered.extend(warnings);
            offered.push(keys::ORIENTATION);
        }
        WidgetKind::Slider => {
            offered.extend(numeric);
            offered.extend(ranged);
            offered.extend([keys::SLIDER_STEP, keys::SLIDER_INPUT_TOPIC, keys::ORIENTATION]);
        }
        WidgetKind::Toggle => offered.extend([
            keys::TOGGLE_ON_PAYLOAD,
            keys::TOGGLE_OFF_PAYLOAD,
            keys::TOGGLE_INPUT_TOPIC,
            keys::TOGGLE_OFF_COLOR,
        ]),
        WidgetKind::Button => offered.extend([
            keys::BUTTON_ON_PAYLOAD,
            keys::BUTTON_OFF_PAYLOAD,
            keys::BUTTON_MODE,
            keys::BUTTON_FEEDBACK_TOPIC,
            keys::TOGGLE_OFF_COLOR,
        ]),
    }
    offered
}

const NUMERIC_KEYS: [&str; 14] = [
    keys::FONT_SIZE,
    keys::BORDER_WIDTH,
    keys::BORDER_RADIUS,
    keys::OPACITY,
    keys::DECIMAL_PLACES,
    keys::CONVERSION_FACTOR,
    keys::CONVERSION_OFFSET,
    keys::FACTOR,
    keys::OFFSET,
    keys::MIN_VALUE,
    keys::MAX_VALUE,
    keys::WARNING_LOW,
    keys::WARNING_HIGH,
    keys::SLIDER_STEP,
];

const BOOL_KEYS: [&str; 3] = [keys::SHOW_TITLE, keys::SHOW_CLOSE, keys::WARNING_ENABLED];

/// Converts a text field back into a configuration value.
///
/// Numeric and boolean keys are stored typed when the text parses,
/// everything else (topics, payloads, colours) stays a string.
pub fn field_value(key: &str, text: &str) -> Value {
    let trimmed = text.trim();
    if NUMERIC_KEYS.iter().any(|numeric| *numeric == key) {
        if let Ok(integer) = trimmed.parse::<i64>() {
            return Value::from(integer);
        }
        if let Some(number) = trimmed
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .and_then(serde_json::Number::from_f64)
        {
            return Value::Number(number);
        }
    }
    if BOOL_KEYS.iter().any(|flag| *flag == key) {
        match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => return Value::Bool(true),
            "false" | "0" | "no" | "off" => return Value::Bool(false),
            _ => {}
        }
    }
    Value::String(text.to_string())
}

/// Window editing the configuration of one widget
#[derive(Debug, Default)]
pub struct CustomizeDialog {
    target: Option<WidgetId>,
    title: String,
    fields: Vec<(&'static str, String)>,
}

impl CustomizeDialog {
    pub fn target(&self) -> Option<WidgetId> {
        self.target
    }

    /// Opens the window with the widget's current values
    pub fn open(&mut self, id: WidgetId, widget: &Widget) {
        let config = widget.config();
        self.target = Some(id);
        self.title = format!("Customize {}", widget.appearance().title);
        self.fields = editable_keys(widget.kind())
            .into_iter()
            .map(|key| (key, config.get_str(key, "")))
            .collect();
    }

    pub fn close(&mut self) {
        self.target = None;
        self.fields.clear();
    }

    /// Configuration holding every non-empty field
    pub fn to_config(&self) -> WidgetConfig {
        let mut config = WidgetConfig::new();
        for (key, text) in &self.fields {
            if !text.trim().is_empty() {
                config.set(key, field_value(key, text));
            }
        }
        config
    }

    /// Renders the window; returns the target and the new configuration on "Apply"
    pub fn show(&mut self, ctx: &egui::Context) -> Option<(WidgetId, WidgetConfig)> {
        let target = self.target?;

        let mut open = true;
        let mut apply = false;
        let mut close = false;
        egui::Window::new(self.title.as_str())
            .id(Id::new("customize_widget"))
            .open(&mut open)
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                ScrollArea::vertical().max_height(420.0).show(ui, |ui| {
                    egui::Grid::new("customize_fields")
                        .num_columns(2)
                        .spacing([8.0, 4.0])
                        .show(ui, |ui| {
                            for (key, text) in self.fields.iter_mut() {
                                ui.label(*key);
                                ui.text_edit_singleline(text);
                                ui.end_row();
                            }
                        });
                });
                ui.separator();
                egui::Sides::new().show(
                    ui,
                    |left| apply = left.button("Apply").clicked(),
                    |right| close = right.button("Close").clicked(),
                );
            });

        let result = apply.then(|| (target, self.to_config()));
        if !open || close {
            self.close();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::canvas::tests::recording_canvas;

    #[test]
    fn spec_carries_kind_topic_and_name() {
        let mut dialog = AddWidgetDialog::default();
        dialog.kind = WidgetKind::Slider;
        dialog.topic = " home/dimmer ".to_string();
        dialog.display_name = "Dimmer".to_string();

        let spec = dialog.to_spec();
        assert_eq!(spec.kind, "slider");
        assert_eq!(spec.topic, "home/dimmer");
        assert_eq!(spec.config.get_str(keys::DISPLAY_NAME, ""), "Dimmer");
        assert!(spec.position.is_none());
    }

    #[test]
    fn blank_name_leaves_config_empty() {
        let dialog = AddWidgetDialog::default();
        assert!(dialog.to_spec().config.is_empty());
    }

    #[test]
    fn field_values_are_typed_by_key() {
        assert_eq!(field_value(keys::DECIMAL_PLACES, "2"), Value::from(2));
        assert_eq!(field_value(keys::MAX_VALUE, "12.5"), Value::from(12.5));
        assert_eq!(field_value(keys::WARNING_ENABLED, "yes"), Value::Bool(true));
        assert_eq!(field_value(keys::TOGGLE_ON_PAYLOAD, "1"), Value::from("1"));
        assert_eq!(field_value(keys::SLIDER_INPUT_TOPIC, "a/b"), Value::from("a/b"));
        assert_eq!(field_value(keys::MIN_VALUE, "low"), Value::from("low"));
    }

    #[test]
    fn interactive_kinds_offer_their_topics() {
        assert!(editable_keys(WidgetKind::Slider).contains(&keys::SLIDER_INPUT_TOPIC));
        assert!(editable_keys(WidgetKind::Toggle).contains(&keys::TOGGLE_INPUT_TOPIC));
        assert!(editable_keys(WidgetKind::Button).contains(&keys::BUTTON_FEEDBACK_TOPIC));
        assert!(!editable_keys(WidgetKind::Label).contains(&keys::MIN_VALUE));
    }

    #[test]
    fn customize_round_trips_existing_values() {
        let (mut canvas, _) = recording_canvas(false);
        let config = WidgetConfig::new()
            .with(keys::UNIT, "°C")
            .with(keys::DECIMAL_PLACES, 2)
            .with("vendor_key", "kept");
        let id = canvas
            .add_widget(WidgetSpec::new("gauge", "t").with_config(config))
            .unwrap();

        let mut dialog = CustomizeDialog::default();
        dialog.open(id, canvas.get(id).unwrap());
        assert_eq!(dialog.target(), Some(id));

        let edited = dialog.to_config();
        assert_eq!(edited.get_str(keys::UNIT, ""), "°C");
        assert_eq!(edited.get_i64(keys::DECIMAL_PLACES, 0), 2);
        // keys outside the form are left to the merge
        assert!(!edited.contains("vendor_key"));

        canvas.configure_widget(id, &edited).unwrap();
        assert_eq!(canvas.get(id).unwrap().config().get_str("vendor_key", ""), "kept");

        dialog.close();
        assert_eq!(dialog.target(), None);
    }
}
