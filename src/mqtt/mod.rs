//! # MQTT Transport Module
//!
//! Wraps the broker connection behind a small publish/subscribe surface so the
//! dashboard core never sees rumqttc types directly.
//!
//! ## Why This Module Exists
//!
//! Every dashboard widget is bound to a topic. The dashboard needs to
//! subscribe to those topics, push values back when the user moves a slider
//! or flips a toggle, and learn about connection changes, without blocking
//! the UI thread while the network does its work.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker settings and QoS levels
//! ├── message_manager.rs  - Inbound message and status events
//! ├── topic.rs            - Topic filter matching
//! └── mqtt_handler.rs     - Transport trait, worker task and session state machine
//! ```
//!
//! ## Threading
//!
//! The rumqttc event loop runs in its own tokio task. The UI thread only
//! queues commands and drains [`message_manager::TransportEvent`]s once per
//! frame, so every widget mutation still happens on the UI thread.

pub mod config;
pub mod message_manager;
pub mod mqtt_handler;
pub mod topic;

pub use config::{BrokerSettings, QosLevel};
pub use message_manager::{ConnectionStatus, MqttMessage, TransportEvent};
pub use mqtt_handler::{MqttHandle, Transport, TransportError, WorkerGuard};
pub use topic::topic_matches;
