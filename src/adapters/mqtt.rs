//! MQTT session adapter.
//!
//! Implements [`ChannelPort`] as one broker session subscribed to the
//! command topic at QoS 0.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` with an event callback.
//!   The callback runs in the ESP-IDF MQTT task; it only flips the shared
//!   session flags and forwards complete payloads into an mpsc queue that
//!   [`ChannelPort::poll`] drains on the control thread.
//! - **all other targets**: an in-process loopback broker.  Publishing to
//!   the subscribed topic delivers the message back, like a real broker
//!   echoing the device's own replies.
//!
//! ```text
//!   broker ──▶ MQTT task callback ──mpsc──▶ poll() ──▶ CommandProcessor
//!                 │
//!                 └──▶ SessionFlags { connected, resubscribe }
//! ```

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

use log::{info, warn};

use crate::app::ports::{ChannelError, ChannelPort, ConnectivityState, InboundMessage};
use crate::config::MqttSettings;

#[cfg(target_os = "espidf")]
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc,
};
#[cfg(target_os = "espidf")]
use std::time::{Duration, Instant};

#[cfg(target_os = "espidf")]
use embedded_svc::mqtt::client::{Details, EventPayload, QoS};
#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EspMqttEvent, MqttClientConfiguration};

/// Inbound payloads larger than this are dropped at the adapter.
pub const MAX_INBOUND_PAYLOAD: usize = 512;

/// How long `connect` waits for the broker's CONNACK.
#[cfg(target_os = "espidf")]
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ───────────────────────────────────────────────────────────────
// Shared session state (ESP-IDF)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
#[derive(Default)]
struct SessionFlags {
    connected: AtomicBool,
    /// Set when the client library re-established the session by itself.
    resubscribe: AtomicBool,
}

#[cfg(target_os = "espidf")]
fn on_event(event: &EspMqttEvent<'_>, flags: &SessionFlags, tx: &mpsc::Sender<InboundMessage>) {
    match event.payload() {
        EventPayload::Connected(_) => {
            if flags.connected.swap(true, Ordering::AcqRel) {
                return;
            }
            flags.resubscribe.store(true, Ordering::Release);
        }
        EventPayload::Disconnected => {
            flags.connected.store(false, Ordering::Release);
        }
        EventPayload::Received { topic, data, details, .. } => {
            if !matches!(details, Details::Complete) {
                return;
            }
            if data.len() > MAX_INBOUND_PAYLOAD {
                warn!("MQTT: dropping oversized payload ({} bytes)", data.len());
                return;
            }
            let message = InboundMessage {
                topic: topic.unwrap_or_default().to_string(),
                payload: data.to_vec(),
            };
            let _ = tx.send(message);
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// MQTT adapter
// ───────────────────────────────────────────────────────────────

pub struct MqttChannel {
    state: ConnectivityState,
    topic: Option<String>,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    inbox: Option<mpsc::Receiver<InboundMessage>>,
    #[cfg(target_os = "espidf")]
    flags: Arc<SessionFlags>,
    #[cfg(not(target_os = "espidf"))]
    inbox: VecDeque<InboundMessage>,
    #[cfg(not(target_os = "espidf"))]
    published: Vec<(String, String)>,
    #[cfg(not(target_os = "espidf"))]
    sim_refusals: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_connects: u32,
}

impl Default for MqttChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttChannel {
    pub fn new() -> Self {
        Self {
            state: ConnectivityState::Disconnected,
            topic: None,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            inbox: None,
            #[cfg(target_os = "espidf")]
            flags: Arc::new(SessionFlags::default()),
            #[cfg(not(target_os = "espidf"))]
            inbox: VecDeque::new(),
            #[cfg(not(target_os = "espidf"))]
            published: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_refusals: 0,
            #[cfg(not(target_os = "espidf"))]
            sim_connects: 0,
        }
    }

    /// Subscribed topic of the current session.
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, settings: &MqttSettings) -> Result<(), ChannelError> {
        // Dropping the old client stops its task and discards anything
        // still queued from the previous session.
        self.client = None;
        self.inbox = None;

        let flags = Arc::new(SessionFlags::default());
        let (tx, rx) = mpsc::channel();
        let conf = MqttClientConfiguration {
            client_id: Some(settings.client_id.as_str()),
            username: (!settings.username.is_empty()).then_some(settings.username.as_str()),
            password: (!settings.password.is_empty()).then_some(settings.password.as_str()),
            ..Default::default()
        };

        let cb_flags = flags.clone();
        let mut client = EspMqttClient::new_cb(&settings.url(), &conf, move |event| {
            on_event(&event, &cb_flags, &tx);
        })
        .map_err(|e| ChannelError::Client(e.code()))?;

        let deadline = Instant::now() + CONNECT_TIMEOUT;
        while !flags.connected.load(Ordering::Acquire) {
            if Instant::now() >= deadline {
                return Err(ChannelError::Timeout);
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        client
            .subscribe(&settings.topic, QoS::AtMostOnce)
            .map_err(|_| ChannelError::SubscribeFailed)?;
        flags.resubscribe.store(false, Ordering::Release);

        self.client = Some(client);
        self.inbox = Some(rx);
        self.flags = flags;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, settings: &MqttSettings) -> Result<(), ChannelError> {
        self.sim_connects += 1;
        if self.sim_refusals > 0 {
            self.sim_refusals -= 1;
            warn!("MQTT(sim): {} refused '{}'", settings.url(), settings.client_id);
            return Err(ChannelError::Refused);
        }
        self.inbox.clear();
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.client.is_some() && self.flags.connected.load(Ordering::Acquire)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        true
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &str) -> Result<(), ChannelError> {
        let client = self.client.as_mut().ok_or(ChannelError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes())
            .map(|_| ())
            .map_err(|_| ChannelError::PublishFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &str) -> Result<(), ChannelError> {
        self.published.push((topic.to_string(), payload.to_string()));
        if self.topic.as_deref() == Some(topic) {
            self.inbox.push_back(InboundMessage {
                topic: topic.to_string(),
                payload: payload.as_bytes().to_vec(),
            });
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_poll(&mut self) -> Option<InboundMessage> {
        if self.flags.resubscribe.swap(false, Ordering::AcqRel) {
            if let (Some(client), Some(topic)) = (self.client.as_mut(), self.topic.as_deref()) {
                match client.subscribe(topic, QoS::AtMostOnce) {
                    Ok(_) => info!("MQTT: session resumed, re-subscribed to '{}'", topic),
                    Err(e) => warn!("MQTT: re-subscribe failed: {}", e),
                }
            }
        }
        self.inbox.as_ref()?.try_recv().ok()
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_poll(&mut self) -> Option<InboundMessage> {
        self.inbox.pop_front()
    }
}

// ── Simulation controls ───────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl MqttChannel {
    /// Simulation: the broker refuses the next `n` connects.
    pub fn refuse_next(&mut self, n: u32) {
        self.sim_refusals = n;
    }

    /// Simulation: the broker drops the session.
    pub fn drop_session(&mut self) {
        self.state = ConnectivityState::Disconnected;
    }

    /// Simulation: another client publishes `payload` on `topic`.
    pub fn inject(&mut self, topic: &str, payload: &[u8]) {
        if payload.len() > MAX_INBOUND_PAYLOAD {
            warn!("MQTT(sim): dropping oversized payload ({} bytes)", payload.len());
            return;
        }
        if self.topic.as_deref() == Some(topic) {
            self.inbox.push_back(InboundMessage { topic: topic.to_string(), payload: payload.to_vec() });
        }
    }

    /// Everything published so far, oldest first.
    pub fn published(&self) -> &[(String, String)] {
        &self.published
    }

    pub fn take_published(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.published)
    }

    pub fn connect_attempts(&self) -> u32 {
        self.sim_connects
    }
}

// ───────────────────────────────────────────────────────────────
// ChannelPort
// ───────────────────────────────────────────────────────────────

impl ChannelPort for MqttChannel {
    fn connect(&mut self, settings: &MqttSettings) -> Result<(), ChannelError> {
        self.state = ConnectivityState::Connecting;
        self.topic = Some(settings.topic.clone());
        match self.platform_connect(settings) {
            Ok(()) => {
                self.state = ConnectivityState::Connected;
                info!("MQTT: session up, subscribed to '{}'", settings.topic);
                Ok(())
            }
            Err(e) => {
                self.state = ConnectivityState::Disconnected;
                Err(e)
            }
        }
    }

    fn state(&self) -> ConnectivityState {
        match self.state {
            ConnectivityState::Connected if !self.platform_is_connected() => {
                ConnectivityState::Disconnected
            }
            other => other,
        }
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        self.platform_publish(topic, payload)
    }

    fn poll(&mut self) -> Option<InboundMessage> {
        if !self.is_connected() {
            return None;
        }
        self.platform_poll()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
