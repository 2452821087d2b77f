//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ GatewayService (domain)
//! ```
//!
//! Driven adapters (GPIO, indicator, WiFi, MQTT, HTTP, flash, event sinks)
//! implement these traits.  The [`GatewayService`](super::service::GatewayService)
//! consumes them via generics, so the domain core never touches hardware or
//! sockets directly and runs unchanged on the host.
//!
//! All port errors are typed and `Copy`; they fold into
//! [`crate::error::Error`] at the service boundary.

use std::net::Ipv4Addr;

use crate::app::commands::PinLevel;
use crate::app::status::StatusPresenter;
use crate::config::{MqttSettings, WifiSettings};

// ───────────────────────────────────────────────────────────────
// Connectivity
// ───────────────────────────────────────────────────────────────

/// Connection state of the network link or the broker session.
///
/// Tracked independently for each; the control loop observes transitions
/// by polling, never by callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    Connecting,
    Connected,
}

// ───────────────────────────────────────────────────────────────
// GPIO port (driven adapter: domain → pins)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the controllable output pins.
pub trait GpioPort {
    /// Configure `pin` as a push-pull output.
    fn configure_output(&mut self, pin: u8) -> Result<(), GpioError>;

    /// Drive `pin` to `level`.
    fn write(&mut self, pin: u8, level: PinLevel) -> Result<(), GpioError>;
}

// ───────────────────────────────────────────────────────────────
// Indicator port (driven adapter: domain → buzzer / LED)
// ───────────────────────────────────────────────────────────────

/// A burst of on/off pulses on the indicator output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulsePattern {
    pub times: u8,
    pub period_ms: u32,
}

impl PulsePattern {
    pub const fn new(times: u8, period_ms: u32) -> Self {
        Self { times, period_ms }
    }
}

/// Human-observable signalling output.
///
/// Pulsing blocks the caller for `2 * times * period_ms`; patterns are
/// short enough that the loop tolerates it.
pub trait IndicatorPort {
    fn pulse(&mut self, pattern: PulsePattern);
}

// ───────────────────────────────────────────────────────────────
// Network link port (WiFi station)
// ───────────────────────────────────────────────────────────────

/// Identity the link obtained on a successful attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    pub hostname: heapless::String<32>,
    pub address: Ipv4Addr,
}

pub trait LinkPort {
    /// One bounded association attempt using `settings`.
    fn attach(&mut self, settings: &WifiSettings) -> Result<LinkInfo, LinkError>;

    /// Re-establish the link after a drop.  Idempotent: calling it while
    /// already attached returns the current identity.
    fn reattach(&mut self, settings: &WifiSettings) -> Result<LinkInfo, LinkError>;

    /// Non-blocking state query.
    fn state(&self) -> ConnectivityState;

    fn is_attached(&self) -> bool {
        self.state() == ConnectivityState::Connected
    }
}

// ───────────────────────────────────────────────────────────────
// Message channel port (MQTT session)
// ───────────────────────────────────────────────────────────────

/// A message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub trait ChannelPort {
    /// Authenticate and subscribe to `settings.topic` (at-most-once).
    fn connect(&mut self, settings: &MqttSettings) -> Result<(), ChannelError>;

    fn state(&self) -> ConnectivityState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectivityState::Connected
    }

    /// Best-effort publish; no delivery acknowledgement.
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), ChannelError>;

    /// Next inbound message, if any.  Never blocks.
    fn poll(&mut self) -> Option<InboundMessage>;
}

// ───────────────────────────────────────────────────────────────
// Status port (HTTP endpoint)
// ───────────────────────────────────────────────────────────────

pub trait StatusPort {
    /// Start listening.  Idempotent once running.
    fn start(&mut self) -> Result<(), StatusError>;

    fn is_running(&self) -> bool;

    /// Answer every pending request from `presenter`; returns how many
    /// requests were served since the previous call.
    fn serve_pending(&mut self, presenter: &StatusPresenter) -> usize;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Manifest source port (driven adapter: flash → domain)
// ───────────────────────────────────────────────────────────────

/// Raw access to the persisted device manifest.
pub trait ManifestSource {
    fn read_manifest(&mut self) -> Result<String, ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from loading or validating the device manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The flash filesystem could not be mounted (ESP-IDF error code).
    MountFailed(i32),
    /// No manifest file in storage.
    NotFound,
    /// Manifest exceeds the read limit.
    TooLarge(usize),
    /// Generic I/O error from the storage backend.
    Io,
    /// Manifest is not valid JSON for the expected shape.
    Parse { line: usize, column: usize },
    /// A field failed validation.  The `&'static str` names it.
    Invalid(&'static str),
}

/// Errors from [`LinkPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    InvalidSsid,
    InvalidPassword,
    InvalidHostname,
    /// Static addressing settings could not be applied.
    InvalidAddress,
    /// The access point did not accept the association in time.
    AssociationFailed,
    /// Associated, but no IPv4 address was obtained.
    NoAddress,
    /// Driver-level failure (ESP-IDF error code).
    Driver(i32),
}

/// Errors from [`ChannelPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    NotConnected,
    /// Broker closed the session during the handshake.
    Refused,
    /// No CONNACK within the connect window.
    Timeout,
    SubscribeFailed,
    PublishFailed,
    /// Client-level failure (ESP-IDF error code).
    Client(i32),
}

/// Errors from [`StatusPort::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusError {
    /// Server or handler registration failed (ESP-IDF error code).
    Server(i32),
}

/// Errors from [`GpioPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioError {
    InvalidPin(u8),
    Driver(i32),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MountFailed(code) => write!(f, "filesystem mount failed ({})", code),
            Self::NotFound => write!(f, "manifest not found"),
            Self::TooLarge(len) => write!(f, "manifest too large ({} bytes)", len),
            Self::Io => write!(f, "I/O error"),
            Self::Parse { line, column } => {
                write!(f, "invalid JSON at line {}, column {}", line, column)
            }
            Self::Invalid(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "invalid SSID"),
            Self::InvalidPassword => write!(f, "invalid password"),
            Self::InvalidHostname => write!(f, "invalid hostname"),
            Self::InvalidAddress => write!(f, "invalid static address"),
            Self::AssociationFailed => write!(f, "association failed"),
            Self::NoAddress => write!(f, "no IPv4 address"),
            Self::Driver(code) => write!(f, "driver error ({})", code),
        }
    }
}

impl core::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Refused => write!(f, "connection refused"),
            Self::Timeout => write!(f, "connect timed out"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::Client(code) => write!(f, "client error ({})", code),
        }
    }
}

impl core::fmt::Display for StatusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Server(code) => write!(f, "HTTP server error ({})", code),
        }
    }
}

impl core::fmt::Display for GpioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidPin(pin) => write!(f, "invalid GPIO {}", pin),
            Self::Driver(code) => write!(f, "driver error ({})", code),
        }
    }
}
