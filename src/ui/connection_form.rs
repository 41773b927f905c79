//! Broker connection dialog

use crate::mqtt::BrokerSettings;
use eframe::egui::{self, Id, Modal, TextEdit, Ui};
use tracing::debug;

use super::common::UiColors;

/// What the user decided in the dialog this frame
#[derive(Debug, Clone, PartialEq)]
pub enum FormOutcome {
    Pending,
    Connect {
        broker: BrokerSettings,
        auto_connect: bool,
    },
    Cancelled,
}

/// Editable copy of the broker settings; nothing is applied until "Connect"
#[derive(Debug, Default)]
pub struct ConnectionForm {
    open: bool,
    host: String,
    port: String,
    username: String,
    password: String,
    client_id: String,
    keep_alive: String,
    use_tls: bool,
    auto_connect: bool,
    error: Option<String>,
}

impl ConnectionForm {
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Opens the dialog pre-filled with the current settings
    pub fn open(&mut self, broker: &BrokerSettings, auto_connect: bool) {
        self.host = broker.host.clone();
        self.port = broker.port.to_string();
        self.username = broker.username.clone();
        self.password = broker.password.clone();
        self.client_id = broker.client_id.clone();
        self.keep_alive = broker.keep_alive_secs.to_string();
        self.use_tls = broker.use_tls;
        self.auto_connect = auto_connect;
        self.error = None;
        self.open = true;
    }

    /// Checks the draft and builds settings from it
    pub fn validate(&self) -> Result<BrokerSettings, String> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err("Host must not be empty".to_string());
        }
        if host.contains(char::is_whitespace) {
            return Err("Host must not contain spaces".to_string());
        }
        let port = match self.port.trim().parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => return Err(format!("Invalid port '{}'", self.port.trim())),
        };
        let keep_alive_secs = if self.keep_alive.trim().is_empty() {
            BrokerSettings::default().keep_alive_secs
        } else {
            self.keep_alive
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("Invalid keep-alive '{}'", self.keep_alive.trim()))?
        };
        let client_id = match self.client_id.trim() {
            "" => BrokerSettings::default().client_id,
            id => id.to_string(),
        };

        Ok(BrokerSettings {
            host: host.to_string(),
            port,
            username: self.username.trim().to_string(),
            password: self.password.clone(),
            use_tls: self.use_tls,
            client_id,
            keep_alive_secs,
        })
    }

    pub fn show(&mut self, ui: &mut Ui) -> FormOutcome {
        if !self.open {
            return FormOutcome::Pending;
        }

        let mut outcome = FormOutcome::Pending;
        let modal = Modal::new(Id::new("broker_connection")).show(ui.ctx(), |ui| {
            ui.set_width(280.0);
            ui.heading("MQTT Broker");

            egui::Grid::new("broker_fields")
                .num_columns(2)
                .spacing([8.0, 4.0])
                .show(ui, |ui| {
                    ui.label("Host");
                    ui.text_edit_singleline(&mut self.host);
                    ui.end_row();
                    ui.label("Port");
                    ui.text_edit_singleline(&mut self.port);
                    ui.end_row();
                    ui.label("User");
                    ui.text_edit_singleline(&mut self.username);
                    ui.end_row();
                    ui.label("Password");
                    ui.add(TextEdit::singleline(&mut self.password).password(true));
                    ui.end_row();
                    ui.label("Client ID");
                    ui.text_edit_singleline(&mut self.client_id);
                    ui.end_row();
                    ui.label("Keep-alive (s)");
                    ui.text_edit_singleline(&mut self.keep_alive);
                    ui.end_row();
                });
            ui.checkbox(&mut self.use_tls, "Use SSL/TLS");
            ui.checkbox(&mut self.auto_connect, "Connect at startup");

            if let Some(error) = &self.error {
                ui.colored_label(UiColors::INACTIVE, error);
            }
            ui.separator();

            let mut connect = false;
            let mut cancel = false;
            egui::Sides::new().show(
                ui,
                |left| connect = left.button("Connect").clicked(),
                |right| cancel = right.button("Cancel").clicked(),
            );

            if cancel {
                outcome = FormOutcome::Cancelled;
            } else if connect {
                match self.validate() {
                    Ok(broker) => {
                        outcome = FormOutcome::Connect {
                            broker,
                            auto_connect: self.auto_connect,
                        };
                    }
                    Err(e) => {
                        debug!("Rejected broker settings: {}", e);
                        self.error = Some(e);
                    }
                }
            }
        });

        if modal.should_close() && outcome == FormOutcome::Pending {
            outcome = FormOutcome::Cancelled;
        }
        if outcome != FormOutcome::Pending {
            self.open = false;
        }
        outcome
    }
}
