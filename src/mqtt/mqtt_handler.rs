//! MQTT connection worker with statum state machine for the session lifecycle
//!
//! The UI thread only ever touches [`MqttHandle`], which implements the
//! [`Transport`] trait by queueing commands for a background tokio task.
//! The task owns the rumqttc client and event loop and reports inbound
//! messages and connection changes back through a bounded channel.
//!
//! # State Machine
//!
//! ```text
//! Idle ──► Configured ──► Online ──► (exit: Disconnected | Failed | Reconnect | Shutdown)
//!   ▲                                   │
//!   └───────────────────────────────────┘
//! ```
//!
//! A failed or dropped connection is reported once and the worker goes back
//! to waiting for the next explicit connect request.

use super::config::{BrokerSettings, QosLevel};
use super::message_manager::{connack_reason, ConnectionStatus, MqttMessage, TransportEvent};
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet};
use statum::{machine, state};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Capacity of the rumqttc request queue
const REQUEST_CAPACITY: usize = 100;

/// Publish/subscribe primitives the dashboard needs from a message broker.
///
/// `connect` is asynchronous: success is only known once a
/// [`TransportEvent::Status`] arrives. `publish` and `subscribe` are fire and
/// forget and answer with whether the request could be handed over.
pub trait Transport: Send {
    fn connect(&mut self, settings: BrokerSettings);

    fn disconnect(&mut self);

    /// Returns false when not connected or the request could not be queued
    fn publish(&mut self, topic: &str, payload: &str, qos: QosLevel, retain: bool) -> bool;

    /// Returns true only if connected and the request was queued
    fn subscribe(&mut self, topic: &str, qos: QosLevel) -> bool;

    fn is_connected(&self) -> bool;
}

/// Errors raised while setting up or driving a broker session
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid broker settings: {0}")]
    InvalidSettings(String),

    #[error("Command channel closed")]
    ChannelClosed,

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Requests queued from the UI thread to the worker
#[derive(Debug)]
pub enum TransportCommand {
    Connect(BrokerSettings),
    Disconnect,
    Publish {
        topic: String,
        payload: String,
        qos: QosLevel,
        retain: bool,
    },
    Subscribe {
        topic: String,
        qos: QosLevel,
    },
}

/// Front side of the MQTT worker, owned by the UI thread
pub struct MqttHandle {
    commands: mpsc::Sender<TransportCommand>,
    connected: Arc<AtomicBool>,
    shutdown: CancellationToken,
    worker: Option<WorkerGuard>,
}

/// Ownership of the worker task, for whoever waits for it at shutdown
pub struct WorkerGuard {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl WorkerGuard {
    /// Stops the worker and waits until it has closed the broker session
    pub async fn shutdown(self) {
        info!("Shutting down MQTT worker");
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            error!("MQTT worker ended abnormally: {}", e);
        }
    }
}

impl MqttHandle {
    /// Spawns the worker task and returns the handle plus the event receiver
    /// the UI drains once per frame.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(buffer: usize) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (command_tx, command_rx) = mpsc::channel(buffer);
        let (event_tx, event_rx) = mpsc::channel(buffer);
        let connected = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();

        let worker = MqttWorker {
            commands: command_rx,
            events: event_tx,
            connected: connected.clone(),
            shutdown: shutdown.clone(),
            subscriptions: BTreeMap::new(),
        };
        let task = tokio::spawn(worker.run());

        let handle = MqttHandle {
            commands: command_tx,
            connected,
            worker: Some(WorkerGuard {
                shutdown: shutdown.clone(),
                task,
            }),
            shutdown,
        };
        (handle, event_rx)
    }

    /// Stops the worker and waits for it to close the broker session
    pub async fn shutdown(mut self) {
        match self.worker.take() {
            Some(worker) => worker.shutdown().await,
            None => self.shutdown.cancel(),
        }
    }

    /// Hands the worker task to a caller that outlives this handle.
    ///
    /// The handle keeps working; dropping it still stops the worker, and the
    /// guard lets the caller wait for the DISCONNECT to be flushed.
    pub fn take_worker(&mut self) -> Option<WorkerGuard> {
        self.worker.take()
    }

    /// Signals the worker to stop without waiting for it
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    fn queue(&self, command: TransportCommand) -> Result<(), TransportError> {
        self.commands.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                TransportError::Connection("command queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => TransportError::ChannelClosed,
        })
    }
}

impl Transport for MqttHandle {
    fn connect(&mut self, settings: BrokerSettings) {
        info!("Requesting connection to {}", settings);
        if let Err(e) = self.queue(TransportCommand::Connect(settings)) {
            error!("Failed to request connection: {}", e);
        }
    }

    fn disconnect(&mut self) {
        info!("Requesting disconnect");
        if let Err(e) = self.queue(TransportCommand::Disconnect) {
            error!("Failed to request disconnect: {}", e);
        }
    }

    fn publish(&mut self, topic: &str, payload: &str, qos: QosLevel, retain: bool) -> bool {
        if !self.is_connected() {
            debug!("Publish to {} rejected: not connected", topic);
            return false;
        }
        let command = TransportCommand::Publish {
            topic: topic.to_string(),
            payload: payload.to_string(),
            qos,
            retain,
        };
        match self.queue(command) {
            Ok(()) => true,
            Err(e) => {
                warn!("Publish to {} failed: {}", topic, e);
                false
            }
        }
    }

    fn subscribe(&mut self, topic: &str, qos: QosLevel) -> bool {
        let command = TransportCommand::Subscribe {
            topic: topic.to_string(),
            qos,
        };
        match self.queue(command) {
            Ok(()) => self.is_connected(),
            Err(e) => {
                warn!("Subscribe to {} failed: {}", topic, e);
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for MqttHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Why an online session ended
#[derive(Debug)]
pub enum SessionExit {
    Disconnected,
    Failed(String),
    Reconnect(BrokerSettings),
    Shutdown,
}

/// States of one broker session
#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Idle,       // Settings received, nothing validated yet
    Configured, // Options built and validated
    Online,     // Client created, event loop being polled
}

/// One connection attempt and its lifetime, from settings to exit
#[machine]
pub struct MqttSession<S: SessionState> {
    settings: BrokerSettings,
    options: Option<MqttOptions>,
    client: Option<AsyncClient>,
    eventloop: Option<EventLoop>,
}

impl<S: SessionState> MqttSession<S> {
    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }
}

impl MqttSession<Idle> {
    pub fn create(settings: BrokerSettings) -> Self {
        debug!("Creating MQTT session for {}", settings);
        Self::new(settings, None, None, None)
    }

    /// Validates the settings and builds the rumqttc options
    pub fn configure(mut self) -> Result<MqttSession<Configured>, TransportError> {
        let host = self.settings.host.trim().to_string();
        if host.is_empty() {
            return Err(TransportError::InvalidSettings(
                "broker address is empty".to_string(),
            ));
        }
        if self.settings.port == 0 {
            return Err(TransportError::InvalidSettings(
                "port must be between 1 and 65535".to_string(),
            ));
        }

        let client_id = if self.settings.client_id.trim().is_empty() {
            format!("opendash-{}", std::process::id())
        } else {
            self.settings.client_id.trim().to_string()
        };

        let mut options = MqttOptions::new(client_id, host, self.settings.port);
        options.set_keep_alive(self.settings.keep_alive());
        if self.settings.has_credentials() {
            options.set_credentials(
                self.settings.username.clone(),
                self.settings.password.clone(),
            );
        }
        if self.settings.use_tls {
            debug!("Configuring TLS transport");
            options.set_transport(rumqttc::Transport::tls_with_default_config());
        }

        self.options = Some(options);
        Ok(self.transition())
    }
}

impl MqttSession<Configured> {
    /// Creates the client; the network connection starts with the first poll
    pub fn connect(mut self) -> MqttSession<Online> {
        info!("Connecting to {}", self.settings);
        if let Some(options) = self.options.take() {
            let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
            self.client = Some(client);
            self.eventloop = Some(eventloop);
        }
        self.transition()
    }
}

impl MqttSession<Online> {
    /// Drives the event loop until the session ends
    pub async fn run(mut self, worker: &mut MqttWorker) -> SessionExit {
        let (client, mut eventloop) = match (self.client.take(), self.eventloop.take()) {
            (Some(client), Some(eventloop)) => (client, eventloop),
            _ => return SessionExit::Failed("session was not configured".to_string()),
        };

        loop {
            tokio::select! {
                _ = worker.shutdown.cancelled() => {
                    close(&client, &mut eventloop).await;
                    return SessionExit::Shutdown;
                }
                command = worker.commands.recv() => match command {
                    None => {
                        close(&client, &mut eventloop).await;
                        return SessionExit::Shutdown;
                    }
                    Some(TransportCommand::Connect(next)) => {
                        info!("New connection requested, closing current session");
                        close(&client, &mut eventloop).await;
                        return SessionExit::Reconnect(next);
                    }
                    Some(TransportCommand::Disconnect) => {
                        close(&client, &mut eventloop).await;
                        return SessionExit::Disconnected;
                    }
                    Some(TransportCommand::Publish { topic, payload, qos, retain }) => {
                        if let Err(e) = client.try_publish(topic.as_str(), qos.into(), retain, payload.into_bytes()) {
                            warn!("Failed to publish to {}: {}", topic, e);
                        }
                    }
                    Some(TransportCommand::Subscribe { topic, qos }) => {
                        worker.subscriptions.insert(topic.clone(), qos);
                        if worker.is_connected() {
                            if let Err(e) = client.try_subscribe(topic.as_str(), qos.into()) {
                                warn!("Failed to subscribe to {}: {}", topic, e);
                            }
                        }
                    }
                },
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        let code = ack.code as u8;
                        if code != 0 {
                            return SessionExit::Failed(connack_reason(code));
                        }
                        worker.connected.store(true, Ordering::SeqCst);
                        let mut message = format!("Connected to {}:{}", self.settings.host, self.settings.port);
                        if self.settings.use_tls {
                            message.push_str(" (SSL/TLS)");
                        }
                        info!("{}", message);
                        worker.report(true, message).await;
                        worker.resubscribe(&client);
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = MqttMessage::from_bytes(publish.topic.clone(), &publish.payload);
                        debug!("Received message on {}", message.topic);
                        if worker.events.send(TransportEvent::Message(message)).await.is_err() {
                            warn!("Event receiver dropped, stopping session");
                            return SessionExit::Shutdown;
                        }
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        return SessionExit::Failed("broker closed the connection".to_string());
                    }
                    Ok(_) => {}
                    Err(e) => return SessionExit::Failed(describe_connection_error(e)),
                }
            }
        }
    }
}

/// Sends DISCONNECT and polls until it is written out, bounded by a second
async fn close(client: &AsyncClient, eventloop: &mut EventLoop) {
    if let Err(e) = client.try_disconnect() {
        debug!("Disconnect request not queued: {}", e);
        return;
    }
    let flushed = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    if flushed.is_err() {
        debug!("Timed out flushing DISCONNECT");
    }
}

fn describe_connection_error(error: ConnectionError) -> String {
    match error {
        ConnectionError::ConnectionRefused(code) => connack_reason(code as u8),
        other => other.to_string(),
    }
}

/// Background task owning the broker connection
pub struct MqttWorker {
    commands: mpsc::Receiver<TransportCommand>,
    events: mpsc::Sender<TransportEvent>,
    connected: Arc<AtomicBool>,
    shutdown: CancellationToken,
    /// Every topic ever requested, replayed after each successful connect
    subscriptions: BTreeMap<String, QosLevel>,
}

impl MqttWorker {
    async fn run(mut self) {
        info!("MQTT worker started");
        let mut pending: Option<BrokerSettings> = None;

        loop {
            let settings = match pending.take() {
                Some(settings) => settings,
                None => match self.wait_for_connect().await {
                    Some(settings) => settings,
                    None => break,
                },
            };

            match self.run_session(settings).await {
                SessionExit::Reconnect(next) => {
                    self.connected.store(false, Ordering::SeqCst);
                    pending = Some(next);
                }
                SessionExit::Disconnected => {
                    self.connected.store(false, Ordering::SeqCst);
                    info!("Disconnected");
                    self.report(false, "Disconnected").await;
                }
                SessionExit::Failed(reason) => {
                    self.connected.store(false, Ordering::SeqCst);
                    error!("MQTT connection error: {}", reason);
                    self.report(false, format!("Error: {}", reason)).await;
                }
                SessionExit::Shutdown => break,
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        info!("MQTT worker stopped");
    }

    async fn run_session(&mut self, settings: BrokerSettings) -> SessionExit {
        let session = match MqttSession::<Idle>::create(settings).configure() {
            Ok(session) => session,
            Err(e) => return SessionExit::Failed(e.to_string()),
        };
        session.connect().run(self).await
    }

    /// Handles commands while offline until a connect request arrives
    async fn wait_for_connect(&mut self) -> Option<BrokerSettings> {
        loop {
            let command = tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                command = self.commands.recv() => command?,
            };
            match command {
                TransportCommand::Connect(settings) => return Some(settings),
                TransportCommand::Subscribe { topic, qos } => {
                    debug!("Remembering subscription to {} until connected", topic);
                    self.subscriptions.insert(topic, qos);
                }
                TransportCommand::Publish { topic, .. } => {
                    debug!("Dropping publish to {} while offline", topic);
                }
                TransportCommand::Disconnect => {
                    debug!("Disconnect requested while not connected");
                }
            }
        }
    }

    fn resubscribe(&self, client: &AsyncClient) {
        for (topic, qos) in &self.subscriptions {
            debug!("Subscribing to {}", topic);
            if let Err(e) = client.try_subscribe(topic.as_str(), (*qos).into()) {
                warn!("Failed to subscribe to {}: {}", topic, e);
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn report(&self, connected: bool, message: impl Into<String>) {
        let status = ConnectionStatus::new(connected, message);
        if self.events.send(TransportEvent::Status(status)).await.is_err() {
            debug!("Status dropped, event receiver closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_rejects_empty_host() {
        let settings = BrokerSettings {
            host: "  ".to_string(),
            ..BrokerSettings::default()
        };
        let result = MqttSession::<Idle>::create(settings).configure();
        assert!(matches!(result, Err(TransportError::InvalidSettings(_))));
    }

    #[test]
    fn configure_rejects_port_zero() {
        let settings = BrokerSettings {
            port: 0,
            ..BrokerSettings::default()
        };
        assert!(MqttSession::<Idle>::create(settings).configure().is_err());
    }

    #[tokio::test]
    async fn publish_is_rejected_while_offline() {
        let (mut handle, _events) = MqttHandle::spawn(16);
        assert!(!handle.is_connected());
        assert!(!handle.publish("t/1", "42", QosLevel::AtMostOnce, false));
        assert!(!handle.subscribe("t/1", QosLevel::AtMostOnce));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn detached_worker_stops_after_handle_is_dropped() {
        let (mut handle, _events) = MqttHandle::spawn(16);
        let guard = handle.take_worker().expect("worker present");
        assert!(handle.take_worker().is_none());

        handle.connect(BrokerSettings::default());
        drop(handle);

        tokio::time::timeout(Duration::from_secs(3), guard.shutdown())
            .await
            .expect("worker stops within timeout");
    }

    #[tokio::test]
    async fn invalid_settings_are_reported_as_status() {
        let (mut handle, mut events) = MqttHandle::spawn(16);
        handle.connect(BrokerSettings {
            host: String::new(),
            ..BrokerSettings::default()
        });

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("status within timeout")
            .expect("channel open");
        match event {
            TransportEvent::Status(status) => {
                assert!(!status.connected);
                assert!(status.message.starts_with("Error:"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        handle.shutdown().await;
    }
}
