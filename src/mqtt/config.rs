use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Broker connection parameters handed to the MQTT worker on every connect.
///
/// Shared between the settings file and the connection dialog so both
/// speak the same structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    /// Hostname or IP of the broker
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
    pub client_id: String,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u64,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: String::new(),
            password: String::new(),
            use_tls: false,
            client_id: "opendash".to_string(),
            keep_alive_secs: 60,
        }
    }
}

impl BrokerSettings {
    pub fn keep_alive(&self) -> Duration {
        // rumqttc rejects keep-alive intervals below five seconds
        Duration::from_secs(self.keep_alive_secs.max(5))
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() || !self.password.is_empty()
    }
}

impl fmt::Display for BrokerSettings {
    /// Formats as "user@host:port"; the password is never shown.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.username.is_empty() {
            write!(f, "{}:{}", self.host, self.port)
        } else {
            write!(f, "{}@{}:{}", self.username, self.host, self.port)
        }
    }
}

/// Delivery guarantee requested for a publish or subscribe.
///
/// Passed through to the broker untouched; the dashboard itself never
/// interprets it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QosLevel {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl From<QosLevel> for rumqttc::QoS {
    fn from(level: QosLevel) -> Self {
        match level {
            QosLevel::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QosLevel::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QosLevel::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}
