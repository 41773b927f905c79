use chrono::NaiveDateTime;
use std::fmt;

/// One message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
    pub timestamp: NaiveDateTime,
}

impl MqttMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        MqttMessage {
            topic: topic.into(),
            payload: payload.into(),
            timestamp: chrono::Local::now().naive_local(),
        }
    }

    /// Builds a message from raw packet bytes, replacing invalid UTF-8.
    pub fn from_bytes(topic: impl Into<String>, payload: &[u8]) -> Self {
        Self::new(topic, String::from_utf8_lossy(payload).into_owned())
    }
}

impl fmt::Display for MqttMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let preview: String = self.payload.chars().take(32).collect();
        write!(f, "{} - {}: {}", self.timestamp, self.topic, preview)
    }
}

/// Last known connection state as reported by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub message: String,
    pub since: NaiveDateTime,
}

impl ConnectionStatus {
    pub fn new(connected: bool, message: impl Into<String>) -> Self {
        Self {
            connected,
            message: message.into(),
            since: chrono::Local::now().naive_local(),
        }
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new(false, "Disconnected")
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = if self.connected {
            "Connected"
        } else {
            "Disconnected"
        };
        write!(f, "{}: {}", state, self.message)
    }
}

/// Everything the worker reports back to the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(MqttMessage),
    Status(ConnectionStatus),
}

/// Human readable text for an MQTT 3.1.1 CONNACK return code.
pub fn connack_reason(code: u8) -> String {
    match code {
        0 => "Connection successful".to_string(),
        1 => "Incorrect protocol version".to_string(),
        2 => "Invalid client identifier".to_string(),
        3 => "Server unavailable".to_string(),
        4 => "Bad username or password".to_string(),
        5 => "Not authorized".to_string(),
        other => format!("Connection failed with code {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lossy_payload_decoding() {
        let msg = MqttMessage::from_bytes("t/1", &[0x34, 0x32, 0xff]);
        assert_eq!(msg.topic, "t/1");
        assert!(msg.payload.starts_with("42"));
    }

    #[test]
    fn reason_codes() {
        assert_eq!(connack_reason(4), "Bad username or password");
        assert_eq!(connack_reason(5), "Not authorized");
        assert_eq!(connack_reason(134), "Connection failed with code 134");
    }

    #[test]
    fn status_display() {
        let status = ConnectionStatus::new(true, "Connected to localhost:1883");
        assert_eq!(status.to_string(), "Connected: Connected to localhost:1883");
    }
}
