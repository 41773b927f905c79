//! Painting of dashboard widgets and translation of pointer input.
//!
//! Nothing here mutates the canvas. Each frame the view paints every widget
//! from its current state and records what the user did as
//! [`WidgetAction`]s; the application applies them once painting is done,
//! so the canvas is never borrowed mutably while it is being drawn.

use super::common::{color_or, faded, UiColors};
use crate::dashboard::{
    geometry::GRID_SIZE, keys, Canvas, ResizeDirection, UserEdit, WarningLevel, Widget, WidgetId,
    WidgetKind,
};
use eframe::egui::{
    self, pos2, vec2, Align2, Color32, CornerRadius, CursorIcon, FontId, Id, Painter, Pos2, Rect,
    RichText, Sense, Shape, Stroke, StrokeKind, Ui, UiBuilder,
};
use std::f32::consts::PI;

/// Something the user did to a widget during the last frame
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetAction {
    PointerDown { id: WidgetId, x: i32, y: i32 },
    PointerMove { id: WidgetId, x: i32, y: i32 },
    PointerUp(WidgetId),
    Edit(WidgetId, UserEdit),
    Remove(WidgetId),
    Customize(WidgetId),
    ClearError(WidgetId),
}

/// Frame-wide drawing parameters
#[derive(Debug, Clone, Copy)]
pub struct CanvasView {
    /// Screen position of canvas coordinate (0, 0)
    pub origin: Pos2,
    pub presentation: bool,
    /// Widget opacity while presenting
    pub presentation_opacity: f32,
}

impl CanvasView {
    pub fn widget_rect(&self, widget: &Widget) -> Rect {
        let geometry = widget.geometry();
        Rect::from_min_size(
            self.origin + vec2(geometry.x as f32, geometry.y as f32),
            vec2(geometry.width as f32, geometry.height as f32),
        )
    }

    /// Screen position to canvas coordinates
    pub fn to_canvas(&self, pos: Pos2) -> (i32, i32) {
        (
            (pos.x - self.origin.x).round() as i32,
            (pos.y - self.origin.y).round() as i32,
        )
    }

    fn opacity(&self, widget: &Widget) -> f32 {
        if self.presentation {
            self.presentation_opacity
        } else {
            widget.appearance().opacity
        }
    }
}

/// Paints every widget in insertion order and collects the user's actions
pub fn show_canvas(ui: &mut Ui, canvas: &Canvas, view: &CanvasView) -> Vec<WidgetAction> {
    let mut actions = Vec::new();
    for (id, widget) in canvas.iter() {
        show_widget(ui, view, id, widget, &mut actions);
    }
    actions
}

/// Dots on every grid intersection inside `rect`, counted from `origin`
pub fn paint_grid(painter: &Painter, rect: Rect, origin: Pos2) {
    let step = GRID_SIZE as f32;
    let first = |start: f32, edge: f32| start + step * ((edge - start) / step).ceil().max(1.0);
    let mut y = first(origin.y, rect.top());
    while y < rect.bottom() {
        let mut x = first(origin.x, rect.left());
        while x < rect.right() {
            painter.circle_filled(pos2(x, y), 1.0, UiColors::GRID);
            x += step;
        }
        y += step;
    }
}

pub fn show_widget(
    ui: &mut Ui,
    view: &CanvasView,
    id: WidgetId,
    widget: &Widget,
    actions: &mut Vec<WidgetAction>,
) {
    let rect = view.widget_rect(widget);
    let response = ui.interact(rect, Id::new(("dashboard_widget", id)), Sense::click_and_drag());

    if !view.presentation {
        let direction = widget.interaction().resize_direction().or_else(|| {
            response.hover_pos().and_then(|pos| {
                let local = pos - rect.min;
                ResizeDirection::hit_test(
                    local.x.round() as i32,
                    local.y.round() as i32,
                    rect.width().round() as i32,
                    rect.height().round() as i32,
                )
            })
        });
        if let Some(direction) = direction {
            ui.ctx().set_cursor_icon(resize_cursor(direction));
        }
    }

    if response.drag_started() {
        let press = ui
            .input(|i| i.pointer.press_origin())
            .or_else(|| response.interact_pointer_pos());
        if let Some(pos) = press {
            let (x, y) = view.to_canvas(pos);
            actions.push(WidgetAction::PointerDown { id, x, y });
        }
    }
    if response.dragged() {
        if let Some(pos) = response.interact_pointer_pos() {
            let (x, y) = view.to_canvas(pos);
            actions.push(WidgetAction::PointerMove { id, x, y });
        }
    }
    if response.drag_stopped() {
        actions.push(WidgetAction::PointerUp(id));
    }

    let appearance = widget.appearance();
    let opacity = view.opacity(widget);
    let painter = ui.painter_at(rect);
    let radius = corner_radius(appearance.border_radius);

    painter.rect_filled(
        rect,
        radius,
        faded(color_or(&appearance.background, Color32::WHITE), opacity),
    );

    if !view.presentation || widget.has_error() {
        let (width, color) = if widget.has_error() {
            (
                appearance.border_width.max(2.0),
                color_or(&appearance.critical_color, UiColors::INACTIVE),
            )
        } else {
            (
                appearance.border_width,
                color_or(&appearance.border_color, UiColors::BORDER),
            )
        };
        if width > 0.0 {
            painter.rect_stroke(
                rect,
                radius,
                Stroke::new(width, faded(color, opacity)),
                StrokeKind::Inside,
            );
        }
    }

    let text_color = faded(color_or(&appearance.text_color, Color32::BLACK), opacity);
    let mut body = rect.shrink(6.0);

    if appearance.show_title && !view.presentation {
        let title_height = appearance.title_font_size + 4.0;
        painter.text(
            body.left_top(),
            Align2::LEFT_TOP,
            &appearance.title,
            FontId::proportional(appearance.title_font_size),
            text_color,
        );
        body.min.y += title_height;
    }

    if appearance.show_close && !view.presentation {
        let close_rect = Rect::from_min_size(rect.right_top() + vec2(-20.0, 2.0), vec2(18.0, 18.0));
        let close = ui.put(
            close_rect,
            egui::Button::new(RichText::new("✕").color(text_color)).frame(false),
        );
        if close.clicked() {
            actions.push(WidgetAction::Remove(id));
        }
    }

    if let Some(error) = widget.error() {
        let error_height = 14.0;
        painter.text(
            pos2(body.left(), body.bottom()),
            Align2::LEFT_BOTTOM,
            error,
            FontId::proportional(11.0),
            color_or(&appearance.critical_color, UiColors::INACTIVE),
        );
        body.max.y -= error_height;
    }

    if body.width() > 4.0 && body.height() > 4.0 {
        paint_body(ui, &painter, body, id, widget, opacity, actions);
    }

    let response = match widget.error() {
        Some(error) => response.on_hover_text(error),
        None => response,
    };
    response.context_menu(|ui| {
        if ui.button("Customize…").clicked() {
            actions.push(WidgetAction::Customize(id));
            ui.close_menu();
        }
        if widget.has_error() && ui.button("Clear error").clicked() {
            actions.push(WidgetAction::ClearError(id));
            ui.close_menu();
        }
        if ui.button("Remove").clicked() {
            actions.push(WidgetAction::Remove(id));
            ui.close_menu();
        }
    });
}

fn paint_body(
    ui: &mut Ui,
    painter: &Painter,
    body: Rect,
    id: WidgetId,
    widget: &Widget,
    opacity: f32,
    actions: &mut Vec<WidgetAction>,
) {
    let appearance = widget.appearance();
    let text_color = faded(color_or(&appearance.text_color, Color32::BLACK), opacity);
    let font = FontId::proportional(appearance.font_size);

    match widget.kind() {
        WidgetKind::Label => {
            painter.text(body.center(), Align2::CENTER_CENTER, shown_text(widget), font, text_color);
        }
        WidgetKind::Gauge | WidgetKind::GaugeCircular | WidgetKind::GaugeSpeedometer => {
            let (start, sweep) = gauge_sweep(widget.kind());
            let radius = (body.width().min(body.height() * 1.6) / 2.0 - 6.0).max(8.0);
            let center = if widget.kind() == WidgetKind::GaugeSpeedometer {
                pos2(body.center().x, body.bottom() - 8.0)
            } else {
                body.center()
            };
            let track = faded(color_or(&appearance.border_color, UiColors::BORDER), opacity);
            let indicator = faded(indicator_color(widget), opacity);
            let thickness = (radius / 6.0).clamp(3.0, 14.0);

            painter.add(Shape::line(
                arc_points(center, radius, start, sweep, 48),
                Stroke::new(thickness, track),
            ));
            if let Some(ratio) = widget.ratio() {
                if ratio > 0.0 {
                    painter.add(Shape::line(
                        arc_points(center, radius, start, sweep * ratio, 48),
                        Stroke::new(thickness, indicator),
                    ));
                }
                if widget.kind() == WidgetKind::GaugeSpeedometer {
                    let angle = start + sweep * ratio;
                    let tip = center + vec2(angle.cos(), angle.sin()) * (radius - thickness);
                    painter.line_segment([center, tip], Stroke::new(2.0, text_color));
                    painter.circle_filled(center, 4.0, text_color);
                }
            }
            let text_pos = if widget.kind() == WidgetKind::GaugeSpeedometer {
                center - vec2(0.0, radius * 0.45)
            } else {
                center
            };
            painter.text(text_pos, Align2::CENTER_CENTER, shown_text(widget), font, text_color);
        }
        WidgetKind::GaugeLinear => {
            let vertical = appearance.orientation.eq_ignore_ascii_case("vertical");
            let track_color = faded(color_or(&appearance.border_color, UiColors::BORDER), opacity);
            let indicator = faded(indicator_color(widget), opacity);
            let ratio = widget.ratio().unwrap_or(0.0);

            let (track, text_pos) = if vertical {
                let track = Rect::from_center_size(
                    pos2(body.left() + 16.0, body.center().y),
                    vec2(14.0, body.height() - 4.0),
                );
                (track, pos2(track.right() + 8.0, body.center().y))
            } else {
                let track = Rect::from_min_size(
                    pos2(body.left(), body.bottom() - 16.0),
                    vec2(body.width(), 14.0),
                );
                (track, pos2(body.left(), track.top() - 4.0))
            };
            painter.rect_filled(track, CornerRadius::same(4), track_color);
            let fill = if vertical {
                Rect::from_min_max(
                    pos2(track.left(), track.bottom() - track.height() * ratio),
                    track.max,
                )
            } else {
                Rect::from_min_max(
                    track.min,
                    pos2(track.left() + track.width() * ratio, track.bottom()),
                )
            };
            if ratio > 0.0 {
                painter.rect_filled(fill, CornerRadius::same(4), indicator);
            }
            let align = if vertical {
                Align2::LEFT_CENTER
            } else {
                Align2::LEFT_BOTTOM
            };
            painter.text(text_pos, align, shown_text(widget), font, text_color);
        }
        WidgetKind::Slider => {
            let config = widget.config();
            let min = config.get_f64(keys::MIN_VALUE, 0.0);
            let max = config.get_f64(keys::MAX_VALUE, 100.0);
            let (low, high) = if min <= max { (min, max) } else { (max, min) };
            let step = config.get_f64(keys::SLIDER_STEP, 1.0);
            let vertical = widget.appearance().orientation.eq_ignore_ascii_case("vertical");
            let mut value = widget.value().as_number().unwrap_or(low);

            painter.text(
                body.center_top(),
                Align2::CENTER_TOP,
                shown_text(widget),
                font,
                text_color,
            );
            let control = Rect::from_min_max(pos2(body.left(), body.top() + 22.0), body.max);
            let changed = ui
                .scope_builder(UiBuilder::new().max_rect(control).id_salt(("slider", id)), |ui| {
                    ui.spacing_mut().slider_width = if vertical {
                        control.height() - 8.0
                    } else {
                        control.width() - 8.0
                    };
                    let mut slider = egui::Slider::new(&mut value, low..=high).show_value(false);
                    if step > 0.0 {
                        slider = slider.step_by(step);
                    }
                    if vertical {
                        slider = slider.vertical();
                    }
                    ui.add(slider).changed()
                })
                .inner;
            if changed {
                actions.push(WidgetAction::Edit(id, UserEdit::SetNumber(value)));
            }
        }
        WidgetKind::Toggle => {
            let on = widget.value().as_bool().unwrap_or(false);
            let switch = Rect::from_center_size(
                body.center(),
                vec2(body.width().min(64.0), body.height().min(30.0)),
            );
            let track_color = if on {
                color_or(&appearance.accent_color, UiColors::ACTIVE)
            } else {
                color_or(&appearance.off_color, UiColors::BORDER)
            };
            let knob_radius = switch.height() / 2.0 - 3.0;
            let knob_x = if on {
                switch.right() - knob_radius - 3.0
            } else {
                switch.left() + knob_radius + 3.0
            };

            painter.rect_filled(
                switch,
                corner_radius(switch.height() / 2.0),
                faded(track_color, opacity),
            );
            painter.circle_filled(
                pos2(knob_x, switch.center().y),
                knob_radius,
                faded(Color32::WHITE, opacity),
            );

            let clicked = ui
                .interact(switch, Id::new(("toggle_switch", id)), Sense::click())
                .clicked();
            if clicked {
                actions.push(WidgetAction::Edit(id, UserEdit::Press));
            }
        }
        WidgetKind::Button => {
            let on = widget.value().as_bool().unwrap_or(false);
            let fill = if on {
                color_or(&appearance.accent_color, UiColors::ACTIVE)
            } else {
                color_or(&appearance.off_color, UiColors::BORDER)
            };
            let label = if widget.display_text().is_empty() {
                widget
                    .kind()
                    .behavior()
                    .state_label(false, widget.config())
            } else {
                widget.display_text().to_string()
            };
            let text = RichText::new(label)
                .size(appearance.font_size)
                .color(faded(Color32::WHITE, opacity));
            let button = egui::Button::new(text)
                .fill(faded(fill, opacity))
                .corner_radius(corner_radius(appearance.border_radius));
            if ui.put(body.shrink(4.0), button).clicked() {
                actions.push(WidgetAction::Edit(id, UserEdit::Press));
            }
        }
    }
}

fn shown_text(widget: &Widget) -> &str {
    if widget.display_text().is_empty() {
        "--"
    } else {
        widget.display_text()
    }
}

fn corner_radius(radius: f32) -> CornerRadius {
    CornerRadius::same(radius.round().clamp(0.0, u8::MAX as f32) as u8)
}

/// Colour of a gauge indicator for the widget's warning level
pub fn indicator_color(widget: &Widget) -> Color32 {
    let appearance = widget.appearance();
    match widget.warning() {
        WarningLevel::Critical => color_or(&appearance.critical_color, UiColors::INACTIVE),
        WarningLevel::Warning => color_or(&appearance.warning_color, Color32::YELLOW),
        WarningLevel::None => color_or(&appearance.accent_color, UiColors::ACTIVE),
    }
}

/// Start angle and sweep in radians, screen coordinates (y grows downwards)
pub fn gauge_sweep(kind: WidgetKind) -> (f32, f32) {
    match kind {
        WidgetKind::GaugeSpeedometer => (PI, PI),
        _ => (0.75 * PI, 1.5 * PI),
    }
}

/// Polyline along a circular arc, `segments + 1` points
pub fn arc_points(center: Pos2, radius: f32, start: f32, sweep: f32, segments: usize) -> Vec<Pos2> {
    let segments = segments.max(1);
    (0..=segments)
        .map(|i| {
            let angle = start + sweep * i as f32 / segments as f32;
            center + vec2(angle.cos(), angle.sin()) * radius
        })
        .collect()
}

fn resize_cursor(direction: ResizeDirection) -> CursorIcon {
    match direction {
        ResizeDirection::North => CursorIcon::ResizeNorth,
        ResizeDirection::NorthEast => CursorIcon::ResizeNorthEast,
        ResizeDirection::East => CursorIcon::ResizeEast,
        ResizeDirection::SouthEast => CursorIcon::ResizeSouthEast,
        ResizeDirection::South => CursorIcon::ResizeSouth,
        ResizeDirection::SouthWest => CursorIcon::ResizeSouthWest,
        ResizeDirection::West => CursorIcon::ResizeWest,
        ResizeDirection::NorthWest => CursorIcon::ResizeNorthWest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{Geometry, WidgetConfig};

    fn near(a: Pos2, b: Pos2) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn arc_runs_from_start_to_end() {
        let center = pos2(100.0, 100.0);
        let points = arc_points(center, 50.0, PI, PI, 4);
        assert_eq!(points.len(), 5);
        assert!(near(points[0], pos2(50.0, 100.0)));
        // half way through a speedometer sweep is straight up
        assert!(near(points[2], pos2(100.0, 50.0)));
        assert!(near(points[4], pos2(150.0, 100.0)));
    }

    #[test]
    fn canvas_coordinates_are_relative_to_origin() {
        let view = CanvasView {
            origin: pos2(10.0, 40.0),
            presentation: false,
            presentation_opacity: 1.0,
        };
        assert_eq!(view.to_canvas(pos2(30.4, 100.6)), (20, 61));

        let widget = Widget::new(
            WidgetKind::Label,
            "t",
            Geometry::new(20, 40, 200, 100),
            WidgetConfig::new(),
        );
        let rect = view.widget_rect(&widget);
        assert_eq!(rect.min, pos2(30.0, 80.0));
        assert_eq!(rect.size(), vec2(200.0, 100.0));
    }

    #[test]
    fn presentation_uses_global_opacity() {
        let widget = Widget::new(
            WidgetKind::Label,
            "t",
            Geometry::new(0, 0, 200, 100),
            WidgetConfig::new().with(keys::OPACITY, 0.5),
        );
        let mut view = CanvasView {
            origin: Pos2::ZERO,
            presentation: false,
            presentation_opacity: 0.8,
        };
        assert_eq!(view.opacity(&widget), 0.5);
        view.presentation = true;
        assert_eq!(view.opacity(&widget), 0.8);
    }

    #[test]
    fn indicator_follows_warning_level() {
        let config = WidgetConfig::new()
            .with(keys::WARNING_ENABLED, true)
            .with(keys::ACCENT_COLOR, "#0000ff")
            .with(keys::CRITICAL_COLOR, "#ff0000");
        let mut widget = Widget::new(WidgetKind::Gauge, "t", Geometry::new(0, 0, 200, 160), config);

        widget.on_message("t", "50").unwrap();
        assert_eq!(indicator_color(&widget), Color32::from_rgb(0, 0, 255));
        widget.on_message("t", "95").unwrap();
        assert_eq!(indicator_color(&widget), Color32::from_rgb(255, 0, 0));
    }
}
