//! Recording mocks for every port, shared by the integration tests.
//!
//! Each mock records the calls it receives so tests can assert on the full
//! history without touching GPIO registers, sockets or flash.

use std::collections::VecDeque;
use std::net::Ipv4Addr;

use pinlink::app::commands::PinLevel;
use pinlink::app::events::AppEvent;
use pinlink::app::ports::{
    ChannelError, ChannelPort, ConfigError, ConnectivityState, EventSink, GpioError, GpioPort,
    InboundMessage, IndicatorPort, LinkError, LinkInfo, LinkPort, ManifestSource, PulsePattern,
    StatusError, StatusPort,
};
use pinlink::app::status::{HttpMethod, StatusPresenter, StatusReply};
use pinlink::config::{MqttSettings, WifiSettings};

pub const TOPIC: &str = "home/test/pins";

/// Minimal valid manifest with two declared outputs (GPIO 5 and 13).
pub fn manifest_json() -> String {
    format!(
        r#"{{
            "wifi": {{ "hostname": "pinlink-test", "ssid": "TestNet", "password": "password123" }},
            "mqtt": {{ "host": "10.0.0.2", "port": 1883, "clientID": "pinlink-test", "topic": "{TOPIC}" }},
            "devices": [
                {{ "name": "lamp", "pin": "D1", "type": "OUTPUT" }},
                {{ "name": "fan", "pin": "GPIO13", "type": "OUTPUT" }}
            ]
        }}"#
    )
}

// ── Hardware ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HwCall {
    Configure(u8),
    Write(u8, PinLevel),
    Pulse(u8),
}

#[derive(Default)]
pub struct MockHardware {
    pub calls: Vec<HwCall>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(u8, PinLevel)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HwCall::Write(pin, level) => Some((*pin, *level)),
                _ => None,
            })
            .collect()
    }

    pub fn pulses(&self) -> Vec<u8> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HwCall::Pulse(times) => Some(*times),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl GpioPort for MockHardware {
    fn configure_output(&mut self, pin: u8) -> Result<(), GpioError> {
        self.calls.push(HwCall::Configure(pin));
        Ok(())
    }

    fn write(&mut self, pin: u8, level: PinLevel) -> Result<(), GpioError> {
        self.calls.push(HwCall::Write(pin, level));
        Ok(())
    }
}

impl IndicatorPort for MockHardware {
    fn pulse(&mut self, pattern: PulsePattern) {
        self.calls.push(HwCall::Pulse(pattern.times));
    }
}

// ── Manifest source ───────────────────────────────────────────

/// Returns queued results in order, then repeats the last one.
pub struct MockManifest {
    results: VecDeque<Result<String, ConfigError>>,
    last: Result<String, ConfigError>,
    pub reads: u32,
}

#[allow(dead_code)]
impl MockManifest {
    pub fn ok(text: impl Into<String>) -> Self {
        Self::sequence(vec![Ok(text.into())])
    }

    pub fn sequence(results: Vec<Result<String, ConfigError>>) -> Self {
        let last = results.last().cloned().unwrap_or(Err(ConfigError::NotFound));
        Self { results: results.into(), last, reads: 0 }
    }
}

impl ManifestSource for MockManifest {
    fn read_manifest(&mut self) -> Result<String, ConfigError> {
        self.reads += 1;
        self.results.pop_front().unwrap_or_else(|| self.last.clone())
    }
}

// ── Link ──────────────────────────────────────────────────────

pub struct MockLink {
    pub attached: bool,
    pub failures: u32,
    pub attach_calls: u32,
    pub reattach_calls: u32,
}

#[allow(dead_code)]
impl MockLink {
    pub fn new() -> Self {
        Self { attached: false, failures: 0, attach_calls: 0, reattach_calls: 0 }
    }

    fn try_attach(&mut self, settings: &WifiSettings) -> Result<LinkInfo, LinkError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(LinkError::AssociationFailed);
        }
        self.attached = true;
        let mut hostname = heapless::String::new();
        hostname.push_str(&settings.hostname).map_err(|()| LinkError::InvalidHostname)?;
        Ok(LinkInfo { hostname, address: Ipv4Addr::new(10, 0, 0, 42) })
    }
}

impl LinkPort for MockLink {
    fn attach(&mut self, settings: &WifiSettings) -> Result<LinkInfo, LinkError> {
        self.attach_calls += 1;
        self.try_attach(settings)
    }

    fn reattach(&mut self, settings: &WifiSettings) -> Result<LinkInfo, LinkError> {
        self.reattach_calls += 1;
        self.try_attach(settings)
    }

    fn state(&self) -> ConnectivityState {
        if self.attached { ConnectivityState::Connected } else { ConnectivityState::Disconnected }
    }
}

// ── Channel ───────────────────────────────────────────────────

pub struct MockChannel {
    pub connected: bool,
    pub refusals: u32,
    pub connects: u32,
    pub published: Vec<(String, String)>,
    pub inbox: VecDeque<InboundMessage>,
}

#[allow(dead_code)]
impl MockChannel {
    pub fn new() -> Self {
        Self {
            connected: false,
            refusals: 0,
            connects: 0,
            published: Vec::new(),
            inbox: VecDeque::new(),
        }
    }

    pub fn deliver(&mut self, payload: &str) {
        self.inbox.push_back(InboundMessage { topic: TOPIC.into(), payload: payload.as_bytes().to_vec() });
    }

    pub fn payloads(&self) -> Vec<&str> {
        self.published.iter().map(|(_, p)| p.as_str()).collect()
    }
}

impl ChannelPort for MockChannel {
    fn connect(&mut self, _settings: &MqttSettings) -> Result<(), ChannelError> {
        self.connects += 1;
        if self.refusals > 0 {
            self.refusals -= 1;
            return Err(ChannelError::Refused);
        }
        self.connected = true;
        Ok(())
    }

    fn state(&self) -> ConnectivityState {
        if self.connected { ConnectivityState::Connected } else { ConnectivityState::Disconnected }
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), ChannelError> {
        if !self.connected {
            return Err(ChannelError::NotConnected);
        }
        self.published.push((topic.into(), payload.into()));
        Ok(())
    }

    fn poll(&mut self) -> Option<InboundMessage> {
        if !self.connected {
            return None;
        }
        self.inbox.pop_front()
    }
}

// ── Status ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockStatus {
    pub pending: Vec<(HttpMethod, String)>,
    pub replies: Vec<StatusReply>,
    pub running: bool,
    /// Number of upcoming `start` calls that fail.
    pub start_failures: u32,
    pub starts: u32,
}

#[allow(dead_code)]
impl MockStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, method: HttpMethod, uri: &str) {
        self.pending.push((method, uri.into()));
    }
}

impl StatusPort for MockStatus {
    fn start(&mut self) -> Result<(), StatusError> {
        self.starts += 1;
        if self.start_failures > 0 {
            self.start_failures -= 1;
            return Err(StatusError::Server(-1));
        }
        self.running = true;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn serve_pending(&mut self, presenter: &StatusPresenter) -> usize {
        let served = self.pending.len();
        for (method, uri) in self.pending.drain(..) {
            self.replies.push(presenter.respond(method, &uri));
        }
        served
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct LogSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
