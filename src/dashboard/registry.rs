//! Widget factory: resolves kind identifiers and validates construction arguments

use super::config::WidgetConfig;
use super::error::DashboardError;
use super::geometry::{Geometry, Size};
use super::kinds::WidgetKind;
use super::widget::Widget;
use crate::mqtt::topic::is_wildcard;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Everything needed to create one widget.
///
/// `position` and `size` are optional; the canvas picks a free spot and the
/// kind's default size when they are missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetSpec {
    pub kind: String,
    pub topic: String,
    pub position: Option<(i32, i32)>,
    pub size: Option<Size>,
    pub config: WidgetConfig,
    /// Value to restore without publishing, canonical string form
    pub value: Option<String>,
}

impl WidgetSpec {
    pub fn new(kind: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            topic: topic.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.position = Some((x, y));
        self
    }

    pub fn sized(mut self, width: i32, height: i32) -> Self {
        self.size = Some(Size::new(width, height));
        self
    }

    pub fn with_geometry(self, geometry: Geometry) -> Self {
        self.at(geometry.x, geometry.y)
            .sized(geometry.width, geometry.height)
    }

    pub fn with_config(mut self, config: WidgetConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Maps kind identifiers to widget kinds and builds widgets
#[derive(Debug, Clone)]
pub struct WidgetRegistry {
    kinds: BTreeMap<&'static str, WidgetKind>,
}

impl Default for WidgetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WidgetRegistry {
    pub fn new() -> Self {
        let kinds = WidgetKind::ALL
            .iter()
            .map(|kind| (kind.as_str(), *kind))
            .collect();
        Self { kinds }
    }

    /// Known kinds in identifier order
    pub fn kinds(&self) -> impl Iterator<Item = WidgetKind> + '_ {
        self.kinds.values().copied()
    }

    pub fn resolve(&self, name: &str) -> Result<WidgetKind, DashboardError> {
        let wanted = name.trim().to_ascii_lowercase();
        self.kinds
            .get(wanted.as_str())
            .copied()
            .ok_or_else(|| DashboardError::UnknownWidgetKind(name.to_string()))
    }

    /// Trims a topic and rejects filters the kind cannot use.
    ///
    /// An empty topic is allowed and leaves the widget unsubscribed.
    /// Wildcards are only valid for display kinds, since interactive kinds
    /// publish on their topic.
    pub fn normalize_topic(&self, kind: WidgetKind, topic: &str) -> Result<String, DashboardError> {
        let topic = topic.trim();
        if topic.contains('\0') {
            return Err(DashboardError::InvalidTopic(topic.replace('\0', "\\0")));
        }
        if !is_valid_filter(topic) {
            return Err(DashboardError::InvalidTopic(topic.to_string()));
        }
        if kind.is_interactive() && is_wildcard(topic) {
            return Err(DashboardError::InvalidTopic(format!(
                "{} ({} widgets publish and cannot use wildcards)",
                topic, kind
            )));
        }
        Ok(topic.to_string())
    }

    pub fn default_size(&self, kind: WidgetKind) -> Size {
        kind.behavior().default_size()
    }

    /// Builds a widget at a known position; the stored value is restored without publishing
    pub fn build(&self, spec: WidgetSpec, position: (i32, i32)) -> Result<Widget, DashboardError> {
        let kind = self.resolve(&spec.kind)?;
        let topic = self.normalize_topic(kind, &spec.topic)?;
        let size = spec.size.unwrap_or_else(|| self.default_size(kind));
        let geometry = Geometry::new(position.0, position.1, size.width, size.height);

        debug!("Building {} widget for '{}' at {}", kind, topic, geometry);
        let mut widget = Widget::new(kind, topic, geometry, spec.config);
        if widget.geometry().right() < geometry.right() || widget.geometry().bottom() < geometry.bottom() {
            warn!("{} widget at {} pulled inside the canvas as {}", kind, geometry, widget.geometry());
        }
        if let Some(value) = spec.value.as_deref() {
            widget.restore_value(value);
        }
        Ok(widget)
    }
}

/// Wildcards must fill a whole level and `#` must come last
fn is_valid_filter(filter: &str) -> bool {
    let levels: Vec<&str> = filter.split('/').collect();
    levels.iter().enumerate().all(|(index, level)| {
        if level.contains('#') {
            *level == "#" && index == levels.len() - 1
        } else if level.contains('+') {
            *level == "+"
        } else {
            true
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::config::keys;
    use crate::dashboard::geometry::CANVAS_LIMIT;

    #[test]
    fn resolves_known_kinds_only() {
        let registry = WidgetRegistry::new();
        assert_eq!(registry.resolve("gauge_speedometer").unwrap(), WidgetKind::GaugeSpeedometer);
        assert_eq!(registry.resolve("SLIDER").unwrap(), WidgetKind::Slider);
        assert!(matches!(
            registry.resolve("chart"),
            Err(DashboardError::UnknownWidgetKind(_))
        ));
        assert_eq!(registry.kinds().count(), WidgetKind::ALL.len());
    }

    #[test]
    fn topics_are_trimmed_and_validated() {
        let registry = WidgetRegistry::new();
        assert_eq!(
            registry.normalize_topic(WidgetKind::Label, "  home/temp ").unwrap(),
            "home/temp"
        );
        assert_eq!(registry.normalize_topic(WidgetKind::Gauge, "").unwrap(), "");
        assert!(registry.normalize_topic(WidgetKind::Label, "home/#").is_ok());
        assert!(registry.normalize_topic(WidgetKind::Label, "home/#/temp").is_err());
        assert!(registry.normalize_topic(WidgetKind::Label, "home/te+mp").is_err());
        assert!(registry.normalize_topic(WidgetKind::Slider, "home/+").is_err());
    }

    #[test]
    fn build_uses_default_size_and_restores_value() {
        let registry = WidgetRegistry::new();
        let spec = WidgetSpec::new("gauge_linear", "tank/level")
            .with_config(WidgetConfig::new().with(keys::UNIT, "%"))
            .with_value("42");
        let widget = registry.build(spec, (40, 20)).unwrap();

        assert_eq!(widget.geometry(), Geometry::new(40, 20, 240, 100));
        assert_eq!(widget.get_value(), "42");
        assert_eq!(widget.display_text(), "42.0 %");
    }

    #[test]
    fn build_keeps_exact_geometry() {
        let registry = WidgetRegistry::new();
        let spec = WidgetSpec::new("label", "t").sized(210, 130);
        let widget = registry.build(spec, (33, 47)).unwrap();
        assert_eq!(widget.geometry(), Geometry::new(33, 47, 210, 130));
    }

    #[test]
    fn build_clamps_geometry_beyond_canvas_limit() {
        let registry = WidgetRegistry::new();
        let spec = WidgetSpec::new("label", "t").sized(i32::MAX, 100);
        let widget = registry.build(spec, (i32::MAX, 40)).unwrap();
        assert_eq!(
            widget.geometry(),
            Geometry::new(CANVAS_LIMIT, 40, CANVAS_LIMIT, 100)
        );
    }

    #[test]
    fn build_rejects_unknown_kind() {
        let registry = WidgetRegistry::new();
        assert!(registry.build(WidgetSpec::new("radar", "t"), (0, 0)).is_err());
    }
}
