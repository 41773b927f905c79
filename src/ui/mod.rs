//! # OpenDash User Interface Module
//!
//! The eframe/egui application that puts the dashboard canvas on screen.
//!
//! ## Why This Module Exists
//!
//! The dashboard core knows nothing about pixels or frames. This module is
//! the glue between it and the window: it drains transport events into the
//! canvas once per frame, paints every widget, turns pointer input into
//! canvas gestures and user edits, and offers the handful of dialogs needed
//! to connect to a broker, add widgets, customize them and load or save
//! layout files.
//!
//! ## Three-Panel Layout
//!
//! - **Top Panel**: connection, widget and layout actions, presentation toggle
//! - **Central Panel**: the scrollable widget canvas
//! - **Bottom Panel**: connection status, counts and the last notice
//!
//! ## Frame Processing
//!
//! Every frame runs the same sequence:
//! 1. Drain pending [`TransportEvent`]s with `try_recv` into the canvas
//! 2. Render panels and dialogs, collecting [`WidgetAction`]s
//! 3. Apply the collected actions to the canvas
//!
//! Requests a repaint every 33ms so broker traffic shows up without user
//! input.

pub mod common;
pub mod connection_form;
pub mod widget_dialogs;
pub mod widget_view;

use eframe::egui::{self, vec2, Button, Color32, ScrollArea, Sense, TextEdit};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dashboard::{layout, Canvas, DashboardError, WidgetKind};
use crate::mqtt::TransportEvent;
use crate::persistence::{AppSettings, SettingsClient};

use self::common::{apply_theme, create_frame, UiColors};
use self::connection_form::{ConnectionForm, FormOutcome};
use self::widget_dialogs::{AddWidgetDialog, CustomizeDialog};
use self::widget_view::{paint_grid, show_canvas, CanvasView, WidgetAction};

/// How long a notice stays in the status bar
const NOTICE_TIMEOUT: Duration = Duration::from_secs(8);

/// Events applied per frame at most; the rest waits for the next frame
const MAX_EVENTS_PER_FRAME: usize = 512;

const DEFAULT_LAYOUT_FILE: &str = "dashboard.json";

struct Notice {
    text: String,
    error: bool,
    shown_at: Instant,
}

/// The dashboard window.
///
/// Owns the canvas outright; the MQTT worker and the persistence worker
/// are only reached through channels, so nothing in a frame blocks.
pub struct DashboardApp {
    canvas: Canvas,
    events: mpsc::Receiver<TransportEvent>,
    settings: AppSettings,
    settings_client: SettingsClient,
    layout_path: String,
    connection_form: ConnectionForm,
    add_dialog: AddWidgetDialog,
    customize: CustomizeDialog,
    notice: Option<Notice>,
}

impl DashboardApp {
    /// Creates the application and opens the startup layout, if any.
    ///
    /// # Parameters
    /// - `cc`: eframe creation context
    /// - `canvas`: canvas already wired to the MQTT handle
    /// - `events`: receiving end of the transport event channel
    /// - `settings`: settings loaded at startup
    /// - `settings_client`: handle for background settings saves
    /// - `layout_dir`: directory suggested for layout files
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        canvas: Canvas,
        events: mpsc::Receiver<TransportEvent>,
        settings: AppSettings,
        settings_client: SettingsClient,
        layout_dir: PathBuf,
    ) -> Self {
        apply_theme(&cc.egui_ctx, settings.is_dark());

        let layout_path = settings
            .initial_layout()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| layout_dir.join(DEFAULT_LAYOUT_FILE));

        let mut app = Self {
            canvas,
            events,
            layout_path: layout_path.display().to_string(),
            settings,
            settings_client,
            connection_form: ConnectionForm::default(),
            add_dialog: AddWidgetDialog::default(),
            customize: CustomizeDialog::default(),
            notice: None,
        };

        if let Some(path) = app.settings.initial_layout().map(Path::to_path_buf) {
            app.load_layout(&path);
        }
        app
    }

    fn drain_events(&mut self) {
        for _ in 0..MAX_EVENTS_PER_FRAME {
            match self.events.try_recv() {
                Ok(event) => self.canvas.handle_event(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    debug!("Transport event channel closed");
                    break;
                }
            }
        }
    }

    fn notify(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            error: false,
            shown_at: Instant::now(),
        });
    }

    fn notify_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        warn!("{}", text);
        self.notice = Some(Notice {
            text,
            error: true,
            shown_at: Instant::now(),
        });
    }

    fn load_layout(&mut self, path: &Path) {
        match layout::load_file(path, &mut self.canvas) {
            Ok(report) => {
                self.customize.close();
                self.settings.remember_layout(path);
                self.layout_path = path.display().to_string();
                if report.skipped.is_empty() {
                    self.notify(format!("Loaded {} widgets from {}", report.created, path.display()));
                } else {
                    for reason in &report.skipped {
                        debug!("Skipped layout entry: {}", reason);
                    }
                    self.notify_error(format!(
                        "Loaded {} widgets from {}, skipped {}",
                        report.created,
                        path.display(),
                        report.skipped.len()
                    ));
                }
            }
            Err(e) => self.notify_error(format!("Layout not loaded: {}", e)),
        }
    }

    fn save_layout(&mut self, path: &Path) {
        match layout::save_file(path, &self.canvas) {
            Ok(count) => {
                self.settings.remember_layout(path);
                self.layout_path = path.display().to_string();
                self.notify(format!("Saved {} widgets to {}", count, path.display()));
            }
            Err(e) => self.notify_error(format!("Layout not saved: {}", e)),
        }
    }

    fn save_settings(&mut self) {
        if self.settings_client.save(&self.settings) {
            self.notify("Settings saved");
        } else {
            self.notify_error("Settings could not be queued for saving");
        }
    }

    fn apply_actions(&mut self, actions: Vec<WidgetAction>) {
        for action in actions {
            let result = match action {
                WidgetAction::PointerDown { id, x, y } => {
                    self.canvas.pointer_down(id, x, y).map(|_| ())
                }
                WidgetAction::PointerMove { id, x, y } => {
                    self.canvas.pointer_move(id, x, y).map(|_| ())
                }
                WidgetAction::PointerUp(id) => self.canvas.pointer_up(id),
                WidgetAction::Edit(id, edit) => self.canvas.user_edit(id, edit).map(|_| ()),
                WidgetAction::Remove(id) => {
                    if self.customize.target() == Some(id) {
                        self.customize.close();
                    }
                    self.canvas.remove_widget(id).map(|_| ())
                }
                WidgetAction::Customize(id) => match self.canvas.get(id) {
                    Some(widget) => {
                        self.customize.open(id, widget);
                        Ok(())
                    }
                    None => Err(DashboardError::StaleHandle),
                },
                WidgetAction::ClearError(id) => self.canvas.clear_widget_error(id),
            };

            match result {
                Ok(()) => {}
                Err(DashboardError::StaleHandle) => debug!("Ignoring action for a removed widget"),
                Err(e) => self.notify_error(e.to_string()),
            }
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            if self.canvas.is_connected() {
                if ui.button("Disconnect").clicked() {
                    info!("Disconnect requested");
                    self.canvas.disconnect();
                }
            } else if ui.button("Connect…").clicked() {
                self.connection_form
                    .open(&self.settings.broker, self.settings.auto_connect);
            }

            let presenting = self.canvas.presentation_mode();
            if !presenting {
                ui.separator();
                if ui.button("Add Widget").clicked() {
                    self.add_dialog.open();
                }

                ui.separator();
                ui.label("Layout");
                ui.add(TextEdit::singleline(&mut self.layout_path).desired_width(260.0));
                if ui.button("Load").clicked() {
                    match resolve_layout_path(&self.layout_path) {
                        Some(path) => self.load_layout(&path),
                        None => self.notify_error("Enter a layout file path first"),
                    }
                }
                if ui.button("Save").clicked() {
                    match resolve_layout_path(&self.layout_path) {
                        Some(path) => self.save_layout(&path),
                        None => self.notify_error("Enter a layout file path first"),
                    }
                }
                if ui
                    .add_enabled(!self.canvas.is_empty(), Button::new("Clear"))
                    .clicked()
                {
                    self.customize.close();
                    let removed = self.canvas.clear_all();
                    self.notify(format!("Removed {} widgets", removed));
                }
            }

            ui.separator();
            let mut presentation = presenting;
            if ui.toggle_value(&mut presentation, "Presentation").changed() {
                self.canvas.set_presentation_mode(presentation);
            }

            let theme_label = if self.settings.is_dark() { "Light" } else { "Dark" };
            if ui.button(theme_label).clicked() {
                self.settings.theme = if self.settings.is_dark() {
                    "light".to_string()
                } else {
                    "dark".to_string()
                };
                apply_theme(ui.ctx(), self.settings.is_dark());
            }
            if ui.button("Save Settings").clicked() {
                self.save_settings();
            }
        });
    }

    fn status_bar(&mut self, ui: &mut egui::Ui) {
        if self
            .notice
            .as_ref()
            .is_some_and(|notice| notice.shown_at.elapsed() > NOTICE_TIMEOUT)
        {
            self.notice = None;
        }

        let status = self.canvas.connection_status();
        let status_color = if status.connected {
            UiColors::ACTIVE
        } else {
            UiColors::INACTIVE
        };
        ui.horizontal_centered(|ui| {
            ui.colored_label(status_color, "\u{2B24}");
            ui.label(status.message.as_str());
            ui.separator();
            ui.label(format!("Widgets: {}", self.canvas.len()));
            ui.label(format!("Topics: {}", self.canvas.subscribed_topics().count()));
            if let Some(notice) = &self.notice {
                ui.separator();
                if notice.error {
                    ui.colored_label(UiColors::INACTIVE, notice.text.as_str());
                } else {
                    ui.label(notice.text.as_str());
                }
            }
        });
    }

    fn canvas_panel(&mut self, ui: &mut egui::Ui) -> Vec<WidgetAction> {
        let background = if self.settings.is_dark() {
            UiColors::EXTREME_BG
        } else {
            UiColors::LIGHT_BG
        };
        let available = ui.available_size();
        self.canvas.set_width(available.x as i32);

        let extent = self.canvas.iter().fold(available, |extent, (_, widget)| {
            let geometry = widget.geometry();
            vec2(
                extent.x.max(geometry.right().saturating_add(40) as f32),
                extent.y.max(geometry.bottom().saturating_add(40) as f32),
            )
        });

        ScrollArea::both()
            .drag_to_scroll(false)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                let (rect, _) = ui.allocate_exact_size(extent, Sense::hover());
                let painter = ui.painter_at(rect);
                painter.rect_filled(rect, egui::CornerRadius::ZERO, background);
                if !self.canvas.presentation_mode() {
                    paint_grid(&painter, rect.intersect(ui.clip_rect()), rect.min);
                }
                if self.canvas.is_empty() {
                    painter.text(
                        rect.min + vec2(24.0, 24.0),
                        egui::Align2::LEFT_TOP,
                        "No widgets yet. Use \"Add Widget\" or load a layout.",
                        egui::FontId::proportional(16.0),
                        Color32::GRAY,
                    );
                }

                let view = CanvasView {
                    origin: rect.min,
                    presentation: self.canvas.presentation_mode(),
                    presentation_opacity: self.settings.presentation_opacity(),
                };
                show_canvas(ui, &self.canvas, &view)
            })
            .inner
    }

    fn dialogs(&mut self, ui: &mut egui::Ui) {
        match self.connection_form.show(ui) {
            FormOutcome::Connect {
                broker,
                auto_connect,
            } => {
                info!("Connecting to {}", broker);
                self.settings.broker = broker.clone();
                self.settings.auto_connect = auto_connect;
                self.canvas.connect(broker);
                if !self.settings_client.save(&self.settings) {
                    warn!("Broker settings not saved");
                }
            }
            FormOutcome::Cancelled | FormOutcome::Pending => {}
        }

        let kinds: Vec<WidgetKind> = self.canvas.registry().kinds().collect();
        if let Some(spec) = self.add_dialog.show(ui, &kinds) {
            match self.canvas.add_widget(spec) {
                Ok(id) => {
                    debug!("Created widget {}", id);
                    self.add_dialog.close();
                }
                Err(e) => self.add_dialog.set_error(e.to_string()),
            }
        }

        if let Some((id, config)) = self.customize.show(ui.ctx()) {
            if let Err(e) = self.canvas.configure_widget(id, &config) {
                self.customize.close();
                match e {
                    DashboardError::StaleHandle => debug!("Widget {} is gone", id),
                    other => self.notify_error(other.to_string()),
                }
            }
        }
    }
}

/// Turns the text of the layout path field into a path; `~/` expands to the home directory
pub fn resolve_layout_path(text: &str) -> Option<PathBuf> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => Some(home.join(rest)),
            None => {
                warn!("Could not determine home directory, using path as typed");
                Some(PathBuf::from(trimmed))
            }
        },
        None => Some(PathBuf::from(trimmed)),
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        let (inner_size, fullscreen) = ctx.input(|i| {
            let viewport = i.viewport();
            (viewport.inner_rect.map(|rect| [rect.width(), rect.height()]), viewport.fullscreen)
        });
        if self.settings.window.track_viewport(inner_size, fullscreen) {
            debug!("Window now {:?}", self.settings.window);
        }
        ctx.request_repaint_after(Duration::from_millis(33));

        egui::TopBottomPanel::top("top_panel")
            .frame(create_frame(UiColors::MAIN_BG, UiColors::BORDER))
            .show(ctx, |ui| self.toolbar(ui));

        egui::TopBottomPanel::bottom("bottom_panel")
            .show_separator_line(false)
            .show(ctx, |ui| self.status_bar(ui));

        let actions = egui::CentralPanel::default()
            .frame(egui::Frame::new())
            .show(ctx, |ui| {
                let actions = self.canvas_panel(ui);
                self.dialogs(ui);
                actions
            })
            .inner;

        self.apply_actions(actions);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        info!("Shutting down, saving settings");
        if !self.settings_client.save(&self.settings) {
            error!("Settings could not be saved on exit");
        }
    }
}
