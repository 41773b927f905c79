//! Layout documents: saving the widget set to JSON and rebuilding it.
//!
//! Files are written as `{"version": 3, "widgets": [...]}`. Reading accepts
//! that form, a bare list of widgets, and the older row/column documents
//! that carried `min`/`max`/`state` fields and no pixel geometry.
//!
//! A document is always parsed completely before the canvas is touched, so
//! a broken file never leaves a half-cleared dashboard behind.

use super::canvas::Canvas;
use super::config::{keys, WidgetConfig};
use super::error::LayoutError;
use super::geometry::Size;
use super::kinds::format_number;
use super::registry::WidgetSpec;
use super::widget::Widget;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Version written into new layout files
pub const LAYOUT_VERSION: u64 = 3;

/// One widget as stored in a layout file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetDescriptor {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    #[serde(default)]
    pub config: WidgetConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    // fields of older documents, read but never written
    #[serde(default, skip_serializing)]
    pub min: Option<f64>,
    #[serde(default, skip_serializing)]
    pub max: Option<f64>,
    #[serde(default, skip_serializing)]
    pub state: Option<bool>,
}

impl WidgetDescriptor {
    pub fn from_widget(widget: &Widget) -> Self {
        let geometry = widget.geometry();
        let value = widget.get_value();
        Self {
            kind: Some(widget.kind().as_str().to_string()),
            topic: Some(widget.topic().to_string()),
            x: Some(geometry.x),
            y: Some(geometry.y),
            width: Some(geometry.width),
            height: Some(geometry.height),
            config: widget.config().clone(),
            value: (!value.is_empty()).then_some(Value::String(value)),
            ..Default::default()
        }
    }

    /// Turns the descriptor into a creation request; the error names what is missing
    pub fn to_spec(&self) -> Result<WidgetSpec, String> {
        let kind = self
            .kind
            .as_deref()
            .map(str::trim)
            .filter(|kind| !kind.is_empty())
            .ok_or_else(|| "missing type".to_string())?;
        let topic = self
            .topic
            .as_deref()
            .ok_or_else(|| "missing topic".to_string())?;

        let mut config = self.config.clone();
        if let Some(min) = self.min {
            if !config.contains(keys::MIN_VALUE) {
                config.set(keys::MIN_VALUE, min);
            }
        }
        if let Some(max) = self.max {
            if !config.contains(keys::MAX_VALUE) {
                config.set(keys::MAX_VALUE, max);
            }
        }

        let mut spec = WidgetSpec::new(kind, topic).with_config(config);
        if let (Some(x), Some(y)) = (self.x, self.y) {
            spec.position = Some((x, y));
        }
        if let (Some(width), Some(height)) = (self.width, self.height) {
            spec.size = Some(Size::new(width, height));
        }
        spec.value = self
            .value
            .as_ref()
            .and_then(stored_value)
            .or_else(|| self.state.map(|state| state.to_string()));
        Ok(spec)
    }
}

fn stored_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => number.as_f64().map(format_number),
        Value::Bool(on) => Some(on.to_string()),
        other => Some(other.to_string()),
    }
}

/// Outcome of rebuilding a canvas from a document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreReport {
    pub created: usize,
    /// One line per entry that was left out
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutDocument {
    pub version: u64,
    pub widgets: Vec<WidgetDescriptor>,
    /// Entries that were not even shaped like a widget
    #[serde(skip)]
    malformed: Vec<String>,
}

impl LayoutDocument {
    pub fn new(widgets: Vec<WidgetDescriptor>) -> Self {
        Self {
            version: LAYOUT_VERSION,
            widgets,
            malformed: Vec::new(),
        }
    }

    /// Describes every live widget in insertion order
    pub fn capture(canvas: &Canvas) -> Self {
        Self::new(
            canvas
                .iter()
                .map(|(_, widget)| WidgetDescriptor::from_widget(widget))
                .collect(),
        )
    }

    pub fn to_json(&self) -> Result<String, LayoutError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a bare widget list or a `{"version", "widgets"}` object
    pub fn parse(text: &str) -> Result<Self, LayoutError> {
        let root: Value = serde_json::from_str(text)?;
        let (version, entries) = match root {
            Value::Array(entries) => (LAYOUT_VERSION, entries),
            Value::Object(mut object) => {
                let version = object.get("version").and_then(Value::as_u64).unwrap_or(1);
                match object.remove("widgets") {
                    Some(Value::Array(entries)) => (version, entries),
                    Some(_) => {
                        return Err(LayoutError::InvalidDocument(
                            "'widgets' is not a list".to_string(),
                        ))
                    }
                    None => {
                        return Err(LayoutError::InvalidDocument(
                            "missing 'widgets' list".to_string(),
                        ))
                    }
                }
            }
            _ => {
                return Err(LayoutError::InvalidDocument(
                    "expected a list of widgets or an object with a 'widgets' list".to_string(),
                ))
            }
        };

        let mut widgets = Vec::with_capacity(entries.len());
        let mut malformed = Vec::new();
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value::<WidgetDescriptor>(entry) {
                Ok(descriptor) => widgets.push(descriptor),
                Err(e) => {
                    warn!("Layout entry {} is malformed: {}", index + 1, e);
                    malformed.push(format!("entry {}: {}", index + 1, e));
                }
            }
        }

        debug!(
            "Parsed layout version {} with {} widgets",
            version,
            widgets.len()
        );
        Ok(Self {
            version,
            widgets,
            malformed,
        })
    }

    /// Replaces the canvas content with this document.
    ///
    /// Geometry is taken as stored. Entries without a type or topic, or
    /// with a type nobody knows, are skipped with a warning.
    pub fn restore(&self, canvas: &mut Canvas) -> RestoreReport {
        canvas.clear_all();
        let mut report = RestoreReport {
            created: 0,
            skipped: self.malformed.clone(),
        };

        for (index, descriptor) in self.widgets.iter().enumerate() {
            let result = descriptor
                .to_spec()
                .and_then(|spec| canvas.add_widget(spec).map_err(|e| e.to_string()));
            match result {
                Ok(_) => report.created += 1,
                Err(reason) => {
                    warn!("Skipping layout entry {}: {}", index + 1, reason);
                    report.skipped.push(format!("entry {}: {}", index + 1, reason));
                }
            }
        }

        info!(
            "Restored {} widgets ({} skipped)",
            report.created,
            report.skipped.len()
        );
        report
    }
}

/// Loads a layout file into the canvas; on any error the canvas is left as it was
pub fn load_file(path: &Path, canvas: &mut Canvas) -> Result<RestoreReport, LayoutError> {
    info!("Loading layout from {}", path.display());
    let text = fs::read_to_string(path).map_err(|source| LayoutError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document = LayoutDocument::parse(&text)?;
    Ok(document.restore(canvas))
}

/// Writes the canvas to a layout file, creating parent directories; returns the widget count
pub fn save_file(path: &Path, canvas: &Canvas) -> Result<usize, LayoutError> {
    let document = LayoutDocument::capture(canvas);
    let json = document.to_json()?;

    let io_error = |source| LayoutError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, json).map_err(io_error)?;

    info!("Saved {} widgets to {}", document.widgets.len(), path.display());
    Ok(document.widgets.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::canvas::tests::recording_canvas;
    use crate::dashboard::geometry::{Geometry, CANVAS_LIMIT};
    use crate::dashboard::kinds::WidgetKind;
    use serde_json::json;

    fn populated_canvas() -> Canvas {
        let (mut canvas, _) = recording_canvas(true);
        canvas
            .add_widget(
                WidgetSpec::new("gauge_circular", "sensors/temp")
                    .at(20, 20)
                    .sized(200, 160)
                    .with_config(
                        WidgetConfig::new()
                            .with(keys::MIN_VALUE, 0)
                            .with(keys::MAX_VALUE, 100)
                            .with(keys::UNIT, "°C")
                            .with(keys::WARNING_ENABLED, true)
                            .with(keys::ACCENT_COLOR, "#0d6efd")
                            .with("future_setting", json!({"nested": [1, 2]})),
                    ),
            )
            .unwrap();
        canvas
            .add_widget(WidgetSpec::new("gauge_linear", "tank/level").at(240, 20))
            .unwrap();
        canvas
            .add_widget(
                WidgetSpec::new("slider", "dimmer")
                    .at(20, 200)
                    .sized(260, 100)
                    .with_config(WidgetConfig::new().with(keys::SLIDER_STEP, 0.5)),
            )
            .unwrap();
        canvas
            .add_widget(
                WidgetSpec::new("button", "relay")
                    .at(300, 200)
                    .with_config(WidgetConfig::new().with(keys::BUTTON_MODE, "momentary")),
            )
            .unwrap();
        canvas.add_widget(WidgetSpec::new("label", "")).unwrap();
        canvas
            .add_widget(
                WidgetSpec::new("toggle", "lamp")
                    .at(20, 440)
                    .with_config(WidgetConfig::new().with(keys::TOGGLE_ON_PAYLOAD, "on")),
            )
            .unwrap();
        canvas
            .add_widget(WidgetSpec::new("gauge", "power").at(200, 440).sized(180, 140))
            .unwrap();
        canvas
            .add_widget(
                WidgetSpec::new("gauge_speedometer", "car/speed")
                    .at(400, 440)
                    .with_config(WidgetConfig::new().with(keys::MAX_VALUE, 240).with(keys::UNIT, "km/h")),
            )
            .unwrap();
        canvas.route_message("sensors/temp", "21.5");
        canvas.route_message("dimmer", "40");
        canvas.route_message("lamp", "on");
        canvas.route_message("car/speed", "88");
        canvas
    }

    fn snapshot(canvas: &Canvas) -> Vec<(WidgetKind, String, Geometry, WidgetConfig, String)> {
        canvas
            .iter()
            .map(|(_, widget)| {
                (
                    widget.kind(),
                    widget.topic().to_string(),
                    widget.geometry(),
                    widget.config().clone(),
                    widget.get_value(),
                )
            })
            .collect()
    }

    #[test]
    fn save_and_load_reproduce_widgets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("layout.json");
        let original = populated_canvas();

        assert_eq!(save_file(&path, &original).unwrap(), 8);

        let (mut restored, _) = recording_canvas(true);
        let report = load_file(&path, &mut restored).unwrap();
        assert_eq!(report.created, 8);
        assert!(report.skipped.is_empty());
        assert_eq!(snapshot(&restored), snapshot(&original));

        let kinds: Vec<WidgetKind> = restored.iter().map(|(_, widget)| widget.kind()).collect();
        assert!(kinds.contains(&WidgetKind::Toggle));
        assert!(kinds.contains(&WidgetKind::Gauge));
        assert!(kinds.contains(&WidgetKind::GaugeSpeedometer));
        let toggle = restored
            .iter()
            .map(|(_, widget)| widget)
            .find(|widget| widget.kind() == WidgetKind::Toggle)
            .unwrap();
        assert_eq!(toggle.get_value(), "true");
    }

    #[test]
    fn document_keeps_specific_kind() {
        let document = LayoutDocument::capture(&populated_canvas());
        let json: Value = serde_json::from_str(&document.to_json().unwrap()).unwrap();
        assert_eq!(json["version"], 3);
        assert_eq!(json["widgets"][1]["type"], "gauge_linear");
        assert_eq!(json["widgets"][0]["value"], "21.5");
        assert!(json["widgets"][1].get("value").is_none());
    }

    #[test]
    fn malformed_file_leaves_canvas_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ \"widgets\": [ {\"type\": \"label\", ").unwrap();

        let mut canvas = populated_canvas();
        let before = snapshot(&canvas);
        let result = load_file(&path, &mut canvas);

        assert!(matches!(result, Err(LayoutError::Parse(_))));
        assert_eq!(snapshot(&canvas), before);
    }

    #[test]
    fn missing_file_leaves_canvas_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut canvas = populated_canvas();
        let result = load_file(&dir.path().join("nope.json"), &mut canvas);
        assert!(matches!(result, Err(LayoutError::Io { .. })));
        assert_eq!(canvas.len(), 8);
    }

    #[test]
    fn wrong_shape_is_rejected() {
        assert!(matches!(
            LayoutDocument::parse("{\"version\": 3}"),
            Err(LayoutError::InvalidDocument(_))
        ));
        assert!(matches!(
            LayoutDocument::parse("42"),
            Err(LayoutError::InvalidDocument(_))
        ));
    }

    #[test]
    fn bare_list_is_accepted() {
        let text = r##"[
            { "type": "gauge_circular", "topic": "sensors/temp", "x": 20, "y": 20,
              "width": 200, "height": 160,
              "config": { "min_value": 0, "max_value": 100, "unit": "°C", "decimal_places": 1,
                          "warning_enabled": true, "warning_low": 10, "warning_high": 90 } }
        ]"##;
        let (mut canvas, log) = recording_canvas(true);
        let report = LayoutDocument::parse(text).unwrap().restore(&mut canvas);

        assert_eq!(report.created, 1);
        let (_, widget) = canvas.iter().next().unwrap();
        assert_eq!(widget.kind(), WidgetKind::GaugeCircular);
        assert_eq!(widget.geometry(), Geometry::new(20, 20, 200, 160));
        assert_eq!(log.lock().unwrap().subscribes, vec!["sensors/temp"]);
    }

    #[test]
    fn incomplete_entries_are_skipped() {
        let text = r#"{"version": 3, "widgets": [
            {"topic": "no/type"},
            {"type": "label"},
            {"type": "hologram", "topic": "x"},
            "not a widget",
            {"type": "label", "topic": "ok"}
        ]}"#;
        let (mut canvas, _) = recording_canvas(true);
        let report = LayoutDocument::parse(text).unwrap().restore(&mut canvas);

        assert_eq!(report.created, 1);
        assert_eq!(report.skipped.len(), 4);
        assert_eq!(canvas.len(), 1);
    }

    #[test]
    fn legacy_row_column_document_loads() {
        let text = r#"{"version": 2, "widgets": [
            {"type": "slider", "topic": "fan", "position": {"row": 0, "col": 1},
             "value": 50, "min": 0, "max": 200, "state": null},
            {"type": "button", "topic": "relay", "position": {"row": 1, "col": 0}, "state": true},
            {"type": "label", "topic": "status", "value": "idle"}
        ]}"#;
        let (mut canvas, _) = recording_canvas(true);
        let report = LayoutDocument::parse(text).unwrap().restore(&mut canvas);
        assert_eq!(report.created, 3);

        let widgets: Vec<&Widget> = canvas.iter().map(|(_, widget)| widget).collect();
        assert_eq!(widgets[0].config().get_f64(keys::MAX_VALUE, 0.0), 200.0);
        assert_eq!(widgets[0].get_value(), "50");
        assert_eq!(widgets[1].get_value(), "ON");
        assert_eq!(widgets[2].display_text(), "idle");

        for (i, a) in widgets.iter().enumerate() {
            for b in &widgets[i + 1..] {
                assert!(!a.geometry().overlaps(&b.geometry()));
            }
        }
    }

    #[test]
    fn far_out_coordinates_are_clamped_and_placement_still_works() {
        let text = r#"[{"type": "label", "topic": "a", "x": 2147483000, "y": 20,
                        "width": 1000, "height": 100}]"#;
        let (mut canvas, _) = recording_canvas(true);
        let report = LayoutDocument::parse(text).unwrap().restore(&mut canvas);
        assert_eq!(report.created, 1);

        let far = canvas.iter().next().unwrap().1.geometry();
        assert_eq!(far, Geometry::new(CANVAS_LIMIT, 20, 1000, 100));

        let id = canvas.add_widget(WidgetSpec::new("label", "b")).unwrap();
        let placed = canvas.get(id).unwrap().geometry();
        assert_eq!((placed.x, placed.y), (20, 20));
        assert!(!placed.overlaps(&far));
    }

    #[test]
    fn restoring_does_not_publish() {
        let text = r#"[{"type": "toggle", "topic": "lamp", "x": 0, "y": 0, "value": "true"}]"#;
        let (mut canvas, log) = recording_canvas(true);
        LayoutDocument::parse(text).unwrap().restore(&mut canvas);
        assert!(log.lock().unwrap().publishes.is_empty());
        let (_, toggle) = canvas.iter().next().unwrap();
        assert_eq!(toggle.get_value(), "true");
    }
}
