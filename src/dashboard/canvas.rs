//! The dashboard canvas: owns every live widget and mediates all broker traffic.
//!
//! Widgets live in an arena addressed by [`WidgetId`] handles. Removing a
//! widget bumps the slot generation, so a handle kept by the UI after the
//! widget is gone simply stops resolving instead of reaching a recycled slot.
//! Topic subscriptions are tracked in one set; each topic reaches the
//! transport at most once no matter how many widgets use it.

use super::config::WidgetConfig;
use super::error::DashboardError;
use super::geometry::{Geometry, Size, CANVAS_LIMIT, GRID_SIZE};
use super::registry::{WidgetRegistry, WidgetSpec};
use super::widget::{OutboundMessage, UserEdit, Widget};
use crate::mqtt::{BrokerSettings, ConnectionStatus, QosLevel, Transport, TransportEvent};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Distance kept from the canvas border when placing new widgets
pub const CANVAS_MARGIN: i32 = 20;

/// Canvas width used for the placement scan until the UI reports the real one
pub const DEFAULT_CANVAS_WIDTH: i32 = 1200;

/// Stable handle of a widget on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId {
    index: u32,
    generation: u32,
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    widget: Option<Widget>,
}

pub struct Canvas {
    registry: WidgetRegistry,
    transport: Box<dyn Transport>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Live handles in insertion order
    order: Vec<WidgetId>,
    subscriptions: BTreeSet<String>,
    status: ConnectionStatus,
    presentation: bool,
    width: i32,
}

impl Canvas {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            registry: WidgetRegistry::new(),
            transport,
            slots: Vec::new(),
            free: Vec::new(),
            order: Vec::new(),
            subscriptions: BTreeSet::new(),
            status: ConnectionStatus::default(),
            presentation: false,
            width: DEFAULT_CANVAS_WIDTH,
        }
    }

    pub fn registry(&self) -> &WidgetRegistry {
        &self.registry
    }

    /// Width the placement scan wraps at
    pub fn set_width(&mut self, width: i32) {
        self.width = width.max(CANVAS_MARGIN * 2 + GRID_SIZE);
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: WidgetId) -> Option<&Widget> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.widget.as_ref())
    }

    fn get_mut(&mut self, id: WidgetId) -> Result<&mut Widget, DashboardError> {
        widget_mut(&mut self.slots, id)
    }

    /// Live widgets in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (WidgetId, &Widget)> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.get(*id).map(|widget| (*id, widget)))
    }

    pub fn ids(&self) -> Vec<WidgetId> {
        self.order.clone()
    }

    pub fn subscribed_topics(&self) -> impl Iterator<Item = &str> + '_ {
        self.subscriptions.iter().map(String::as_str)
    }

    /// Topmost widget under a canvas point
    pub fn widget_at(&self, x: i32, y: i32) -> Option<WidgetId> {
        self.order
            .iter()
            .rev()
            .copied()
            .find(|id| self.get(*id).is_some_and(|widget| widget.geometry().contains(x, y)))
    }

    /// Creates a widget and subscribes its topics.
    ///
    /// An unknown kind or invalid topic creates nothing. Without an explicit
    /// position the widget goes to the first free spot of the placement scan.
    pub fn add_widget(&mut self, spec: WidgetSpec) -> Result<WidgetId, DashboardError> {
        let kind = self.registry.resolve(&spec.kind)?;
        let position = match spec.position {
            Some(position) => position,
            None => {
                let size = spec.size.unwrap_or_else(|| self.registry.default_size(kind));
                let min = kind.behavior().min_size().at_least_grid_minimum();
                self.next_free_position(Size::new(
                    size.width.clamp(min.width, CANVAS_LIMIT),
                    size.height.clamp(min.height, CANVAS_LIMIT),
                ))
            }
        };

        let widget = self.registry.build(spec, position)?;
        info!(
            "Added {} widget for '{}' at {}",
            widget.kind(),
            widget.topic(),
            widget.geometry()
        );
        let topics = widget.subscription_topics();
        let id = self.insert(widget);
        self.subscribe_all(topics);
        Ok(id)
    }

    fn insert(&mut self, widget: Widget) -> WidgetId {
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.widget = Some(widget);
                WidgetId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    widget: Some(widget),
                });
                WidgetId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        self.order.push(id);
        id
    }

    fn subscribe_all(&mut self, topics: Vec<String>) {
        for topic in topics {
            if self.subscriptions.contains(&topic) {
                continue;
            }
            let live = self.transport.subscribe(&topic, QosLevel::AtMostOnce);
            if live {
                info!("Subscribed to {}", topic);
            } else {
                debug!("Subscription to {} deferred until connected", topic);
            }
            self.subscriptions.insert(topic);
        }
    }

    /// Detaches a widget from routing and drops it from the collection.
    ///
    /// The topic stays subscribed at the transport.
    pub fn remove_widget(&mut self, id: WidgetId) -> Result<Widget, DashboardError> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .ok_or(DashboardError::StaleHandle)?;
        let widget = slot.widget.take().ok_or(DashboardError::StaleHandle)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.order.retain(|live| *live != id);
        info!("Removed {} widget for '{}'", widget.kind(), widget.topic());
        Ok(widget)
    }

    /// Removes every widget; returns how many were removed
    pub fn clear_all(&mut self) -> usize {
        let ids = std::mem::take(&mut self.order);
        let mut removed = 0;
        for id in ids {
            if let Some(slot) = self
                .slots
                .get_mut(id.index as usize)
                .filter(|slot| slot.generation == id.generation)
            {
                if slot.widget.take().is_some() {
                    slot.generation = slot.generation.wrapping_add(1);
                    self.free.push(id.index);
                    removed += 1;
                }
            }
        }
        info!("Cleared {} widgets", removed);
        removed
    }

    /// Hands an inbound message to every widget listening on the topic.
    ///
    /// Payload errors stay inside the affected widget. Returns the number
    /// of widgets that accepted the payload.
    pub fn route_message(&mut self, topic: &str, payload: &str) -> usize {
        let mut accepted = 0;
        let mut outbound = Vec::new();

        for id in &self.order {
            let Some(widget) = self
                .slots
                .get_mut(id.index as usize)
                .filter(|slot| slot.generation == id.generation)
                .and_then(|slot| slot.widget.as_mut())
            else {
                continue;
            };
            if !widget.listens_to(topic) {
                continue;
            }
            match widget.on_message(topic, payload) {
                Ok(message) => {
                    accepted += 1;
                    outbound.extend(message.map(|message| (*id, message)));
                }
                Err(e) => debug!("Widget {} rejected message: {}", id, e),
            }
        }

        for (id, message) in outbound {
            if let Err(e) = self.publish(id, message) {
                warn!("{}", e);
            }
        }
        accepted
    }

    /// Applies a user edit and publishes the result.
    ///
    /// Returns `Ok(false)` when the edit produced nothing to publish. A
    /// failed publish keeps the new local value and puts the widget into
    /// its error state.
    pub fn user_edit(&mut self, id: WidgetId, edit: UserEdit) -> Result<bool, DashboardError> {
        let outbound = self.get_mut(id)?.on_user_edit(edit);
        match outbound {
            Some(message) => self.publish(id, message).map(|_| true),
            None => Ok(false),
        }
    }

    fn publish(&mut self, id: WidgetId, message: OutboundMessage) -> Result<(), DashboardError> {
        let sent = self.transport.publish(
            &message.topic,
            &message.payload,
            message.qos,
            message.retain,
        );
        let connected = self.transport.is_connected();
        let widget = widget_mut(&mut self.slots, id)?;

        if sent {
            debug!("Published '{}' to {}", message.payload, message.topic);
            widget.clear_error();
            return Ok(());
        }

        let reason = if connected {
            "transport rejected the message".to_string()
        } else {
            "not connected to broker".to_string()
        };
        warn!("Publish to {} failed: {}", message.topic, reason);
        widget.set_error(format!("Publish failed: {}", reason));
        Err(DashboardError::PublishFailure {
            topic: message.topic,
            reason,
        })
    }

    pub fn move_widget(&mut self, id: WidgetId, dx: i32, dy: i32) -> Result<Geometry, DashboardError> {
        let widget = self.get_mut(id)?;
        widget.move_by(dx, dy);
        Ok(widget.geometry())
    }

    pub fn resize_widget(&mut self, id: WidgetId, dw: i32, dh: i32) -> Result<Geometry, DashboardError> {
        let widget = self.get_mut(id)?;
        widget.resize_by(dw, dh);
        Ok(widget.geometry())
    }

    /// Starts a drag or, near an edge and outside presentation mode, a resize
    pub fn pointer_down(&mut self, id: WidgetId, x: i32, y: i32) -> Result<bool, DashboardError> {
        let allow_resize = !self.presentation;
        Ok(self.get_mut(id)?.pointer_down(x, y, allow_resize))
    }

    pub fn pointer_move(&mut self, id: WidgetId, x: i32, y: i32) -> Result<bool, DashboardError> {
        Ok(self.get_mut(id)?.pointer_move(x, y))
    }

    pub fn pointer_up(&mut self, id: WidgetId) -> Result<(), DashboardError> {
        self.get_mut(id)?.pointer_up();
        Ok(())
    }

    /// Merges a configuration into a widget and subscribes any new input topic
    pub fn configure_widget(&mut self, id: WidgetId, config: &WidgetConfig) -> Result<(), DashboardError> {
        let widget = self.get_mut(id)?;
        widget.apply_configuration(config);
        let topics = widget.subscription_topics();
        self.subscribe_all(topics);
        Ok(())
    }

    /// Clears a widget's error state, e.g. from a context menu
    pub fn clear_widget_error(&mut self, id: WidgetId) -> Result<(), DashboardError> {
        self.get_mut(id)?.clear_error();
        Ok(())
    }

    /// Applies one event drained from the transport
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(message) => {
                let accepted = self.route_message(&message.topic, &message.payload);
                debug!("{} delivered to {} widgets", message, accepted);
            }
            TransportEvent::Status(status) => {
                info!("Connection status: {}", status);
                self.status = status;
            }
        }
    }

    pub fn connection_status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn connect(&mut self, settings: BrokerSettings) {
        self.status = ConnectionStatus::new(false, format!("Connecting to {}...", settings));
        self.transport.connect(settings);
    }

    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn presentation_mode(&self) -> bool {
        self.presentation
    }

    /// Toggles presentation mode; running resize gestures are cancelled on entry
    pub fn set_presentation_mode(&mut self, enabled: bool) {
        if self.presentation == enabled {
            return;
        }
        self.presentation = enabled;
        if enabled {
            for slot in self.slots.iter_mut() {
                if let Some(widget) = slot.widget.as_mut() {
                    if widget.interaction().is_resizing() {
                        widget.pointer_up();
                    }
                }
            }
        }
        info!("Presentation mode {}", if enabled { "on" } else { "off" });
    }

    /// First free spot for a widget of `size`, scanning rows left to right
    pub fn next_free_position(&self, size: Size) -> (i32, i32) {
        let occupied: Vec<Geometry> = self.iter().map(|(_, widget)| widget.geometry()).collect();
        let mut y = CANVAS_MARGIN;
        loop {
            let mut x = CANVAS_MARGIN;
            loop {
                let candidate = Geometry::new(x, y, size.width, size.height);
                if !occupied.iter().any(|geometry| geometry.overlaps(&candidate)) {
                    return (x, y);
                }
                x += GRID_SIZE;
                if x.saturating_add(size.width) > self.width - CANVAS_MARGIN {
                    break;
                }
            }
            y += GRID_SIZE;
        }
    }
}

fn widget_mut(slots: &mut [Slot], id: WidgetId) -> Result<&mut Widget, DashboardError> {
    slots
        .get_mut(id.index as usize)
        .filter(|slot| slot.generation == id.generation)
        .and_then(|slot| slot.widget.as_mut())
        .ok_or(DashboardError::StaleHandle)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dashboard::config::keys;
    use crate::dashboard::kinds::WidgetKind;
    use crate::dashboard::widget::WidgetValue;
    use crate::mqtt::MqttMessage;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    pub(crate) struct TransportLog {
        pub subscribes: Vec<String>,
        pub publishes: Vec<(String, String)>,
        pub connected: bool,
    }

    /// Transport double that records every call
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingTransport {
        pub log: Arc<Mutex<TransportLog>>,
    }

    impl Transport for RecordingTransport {
        fn connect(&mut self, _settings: BrokerSettings) {
            self.log.lock().unwrap().connected = true;
        }

        fn disconnect(&mut self) {
            self.log.lock().unwrap().connected = false;
        }

        fn publish(&mut self, topic: &str, payload: &str, _qos: QosLevel, _retain: bool) -> bool {
            let mut log = self.log.lock().unwrap();
            if !log.connected {
                return false;
            }
            log.publishes.push((topic.to_string(), payload.to_string()));
            true
        }

        fn subscribe(&mut self, topic: &str, _qos: QosLevel) -> bool {
            let mut log = self.log.lock().unwrap();
            log.subscribes.push(topic.to_string());
            log.connected
        }

        fn is_connected(&self) -> bool {
            self.log.lock().unwrap().connected
        }
    }

    pub(crate) fn recording_canvas(connected: bool) -> (Canvas, Arc<Mutex<TransportLog>>) {
        let transport = RecordingTransport::default();
        transport.log.lock().unwrap().connected = connected;
        let log = transport.log.clone();
        (Canvas::new(Box::new(transport)), log)
    }

    #[test]
    fn message_reaches_every_widget_on_topic() {
        let (mut canvas, _) = recording_canvas(true);
        let a = canvas.add_widget(WidgetSpec::new("gauge", "t/1")).unwrap();
        let b = canvas.add_widget(WidgetSpec::new("label", "t/1")).unwrap();
        let other = canvas.add_widget(WidgetSpec::new("label", "t/2")).unwrap();

        assert_eq!(canvas.route_message("t/1", "42"), 2);
        assert_eq!(canvas.get(a).unwrap().value(), &WidgetValue::Number(42.0));
        assert_eq!(canvas.get(b).unwrap().value(), &WidgetValue::Text("42".to_string()));
        assert!(canvas.get(other).unwrap().value().is_empty());
    }

    #[test]
    fn shared_topic_is_subscribed_once() {
        let (mut canvas, log) = recording_canvas(true);
        for kind in ["label", "gauge", "gauge_circular"] {
            canvas.add_widget(WidgetSpec::new(kind, "sensors/temp")).unwrap();
        }
        assert_eq!(log.lock().unwrap().subscribes, vec!["sensors/temp"]);
        assert_eq!(canvas.subscribed_topics().collect::<Vec<_>>(), vec!["sensors/temp"]);
    }

    #[test]
    fn empty_topic_is_not_subscribed() {
        let (mut canvas, log) = recording_canvas(true);
        canvas.add_widget(WidgetSpec::new("label", "   ")).unwrap();
        assert!(log.lock().unwrap().subscribes.is_empty());
    }

    #[test]
    fn slider_edit_publishes_once_without_echo() {
        let (mut canvas, log) = recording_canvas(true);
        let slider = canvas.add_widget(WidgetSpec::new("slider", "topic")).unwrap();

        assert!(canvas.user_edit(slider, UserEdit::SetNumber(55.0)).unwrap());
        canvas.route_message("topic", "55");

        let publishes = log.lock().unwrap().publishes.clone();
        assert_eq!(publishes, vec![("topic".to_string(), "55".to_string())]);
    }

    #[test]
    fn unknown_kind_creates_nothing() {
        let (mut canvas, log) = recording_canvas(true);
        let result = canvas.add_widget(WidgetSpec::new("thermometer", "t"));
        assert!(matches!(result, Err(DashboardError::UnknownWidgetKind(_))));
        assert!(canvas.is_empty());
        assert!(log.lock().unwrap().subscribes.is_empty());
    }

    #[test]
    fn removed_widget_stops_receiving_and_handle_goes_stale() {
        let (mut canvas, _) = recording_canvas(true);
        let first = canvas.add_widget(WidgetSpec::new("gauge", "t")).unwrap();
        canvas.remove_widget(first).unwrap();

        assert_eq!(canvas.route_message("t", "1"), 0);
        assert!(matches!(canvas.remove_widget(first), Err(DashboardError::StaleHandle)));

        let second = canvas.add_widget(WidgetSpec::new("gauge", "t")).unwrap();
        assert_ne!(first, second);
        assert!(canvas.get(first).is_none());
        assert!(canvas.get(second).is_some());
        assert!(matches!(
            canvas.user_edit(first, UserEdit::Press),
            Err(DashboardError::StaleHandle)
        ));
    }

    #[test]
    fn clear_all_keeps_subscriptions() {
        let (mut canvas, log) = recording_canvas(true);
        canvas.add_widget(WidgetSpec::new("label", "a")).unwrap();
        canvas.add_widget(WidgetSpec::new("label", "b")).unwrap();

        assert_eq!(canvas.clear_all(), 2);
        assert!(canvas.is_empty());
        assert_eq!(canvas.clear_all(), 0);

        canvas.add_widget(WidgetSpec::new("label", "a")).unwrap();
        assert_eq!(log.lock().unwrap().subscribes, vec!["a", "b"]);
    }

    #[test]
    fn publish_while_offline_marks_error_and_keeps_value() {
        let (mut canvas, log) = recording_canvas(false);
        let toggle = canvas.add_widget(WidgetSpec::new("toggle", "lamp")).unwrap();

        let result = canvas.user_edit(toggle, UserEdit::Press);
        assert!(matches!(result, Err(DashboardError::PublishFailure { .. })));
        let widget = canvas.get(toggle).unwrap();
        assert!(widget.has_error());
        assert_eq!(widget.value(), &WidgetValue::Bool(true));

        log.lock().unwrap().connected = true;
        assert!(canvas.user_edit(toggle, UserEdit::Press).unwrap());
        assert!(!canvas.get(toggle).unwrap().has_error());
    }

    #[test]
    fn default_placement_scans_rows() {
        let (mut canvas, _) = recording_canvas(true);
        let ids: Vec<WidgetId> = (0..6)
            .map(|_| canvas.add_widget(WidgetSpec::new("label", "t")).unwrap())
            .collect();

        let positions: Vec<(i32, i32)> = ids
            .iter()
            .map(|id| {
                let geometry = canvas.get(*id).unwrap().geometry();
                (geometry.x, geometry.y)
            })
            .collect();
        assert_eq!(
            positions,
            vec![(20, 20), (220, 20), (420, 20), (620, 20), (820, 20), (20, 120)]
        );

        let geometries: Vec<Geometry> = canvas.iter().map(|(_, w)| w.geometry()).collect();
        for (i, a) in geometries.iter().enumerate() {
            for b in &geometries[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
    }

    #[test]
    fn explicit_position_is_kept() {
        let (mut canvas, _) = recording_canvas(true);
        let id = canvas
            .add_widget(WidgetSpec::new("button", "b").at(500, 300).sized(160, 80))
            .unwrap();
        assert_eq!(canvas.get(id).unwrap().geometry(), Geometry::new(500, 300, 160, 80));
    }

    #[test]
    fn presentation_mode_blocks_resize() {
        let (mut canvas, _) = recording_canvas(true);
        let id = canvas
            .add_widget(WidgetSpec::new("label", "t").at(100, 100))
            .unwrap();

        canvas.set_presentation_mode(true);
        assert!(canvas.pointer_down(id, 299, 150).unwrap());
        assert!(!canvas.get(id).unwrap().interaction().is_resizing());
        canvas.pointer_up(id).unwrap();

        canvas.set_presentation_mode(false);
        assert!(canvas.pointer_down(id, 299, 150).unwrap());
        assert!(canvas.get(id).unwrap().interaction().is_resizing());
        canvas.pointer_move(id, 339, 150).unwrap();
        canvas.pointer_up(id).unwrap();
        assert_eq!(canvas.get(id).unwrap().geometry().width, 240);
    }

    #[test]
    fn configure_subscribes_new_input_topic() {
        let (mut canvas, log) = recording_canvas(true);
        let id = canvas.add_widget(WidgetSpec::new("button", "relay/set")).unwrap();
        let config = WidgetConfig::new().with(keys::BUTTON_FEEDBACK_TOPIC, "relay/state");
        canvas.configure_widget(id, &config).unwrap();

        assert_eq!(log.lock().unwrap().subscribes, vec!["relay/set", "relay/state"]);
        canvas.route_message("relay/state", "ON");
        assert_eq!(canvas.get(id).unwrap().get_value(), "ON");
        assert!(log.lock().unwrap().publishes.is_empty());
    }

    #[test]
    fn bad_payload_only_affects_that_widget() {
        let (mut canvas, _) = recording_canvas(true);
        let gauge = canvas.add_widget(WidgetSpec::new("gauge", "t")).unwrap();
        let label = canvas.add_widget(WidgetSpec::new("label", "t")).unwrap();

        assert_eq!(canvas.route_message("t", "abc"), 1);
        assert!(canvas.get(gauge).unwrap().has_error());
        assert!(!canvas.get(label).unwrap().has_error());
    }

    #[test]
    fn events_update_status_and_widgets() {
        let (mut canvas, _) = recording_canvas(false);
        let id = canvas.add_widget(WidgetSpec::new("label", "a/+")).unwrap();

        canvas.handle_event(TransportEvent::Status(ConnectionStatus::new(true, "Connected to localhost:1883")));
        assert!(canvas.connection_status().connected);

        canvas.handle_event(TransportEvent::Message(MqttMessage::new("a/b", "hello")));
        assert_eq!(canvas.get(id).unwrap().display_text(), "hello");
    }

    #[test]
    fn widget_at_prefers_topmost() {
        let (mut canvas, _) = recording_canvas(true);
        let below = canvas.add_widget(WidgetSpec::new("label", "t").at(0, 0)).unwrap();
        let above = canvas.add_widget(WidgetSpec::new("label", "t").at(100, 0)).unwrap();
        assert_eq!(canvas.widget_at(150, 50), Some(above));
        assert_eq!(canvas.widget_at(50, 50), Some(below));
        assert_eq!(canvas.widget_at(1000, 1000), None);
        assert_eq!(canvas.get(below).unwrap().kind(), WidgetKind::Label);
    }
}
