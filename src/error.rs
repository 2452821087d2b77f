//! Unified error taxonomy for the PinLink firmware.
//!
//! Every recoverable failure in the control loop funnels into [`Error`].
//! None of them is fatal: the owning component's setup step is retried
//! after a fixed delay, and the failure category is signalled to a human
//! observer through an indicator pulse count ([`Error::pulse_count`]).
//! All variants are `Copy` so they can be carried in events and logged
//! without allocation.

use core::fmt;

use crate::app::ports::{ChannelError, ConfigError, LinkError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The manifest could not be read from persistent storage.
    ConfigLoad(ConfigError),
    /// The manifest was read but is not a valid device manifest.
    ConfigParse(ConfigError),
    /// A network association attempt failed.
    NetworkAttach(LinkError),
    /// The broker session could not be established.
    BrokerConnect(ChannelError),
    /// An inbound payload is not a decodable command.
    CommandDecode(DecodeError),
    /// A decoded command carries a value the device will not act on.
    InvalidCommandValue(InvalidValue),
}

impl Error {
    /// Number of indicator pulses that identifies this failure category.
    pub const fn pulse_count(&self) -> u8 {
        match self {
            Self::ConfigLoad(_) | Self::ConfigParse(_) => 3,
            Self::NetworkAttach(_) => 2,
            Self::BrokerConnect(_) => 5,
            Self::CommandDecode(_) | Self::InvalidCommandValue(_) => 1,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigLoad(e) => write!(f, "config load: {e}"),
            Self::ConfigParse(e) => write!(f, "config parse: {e}"),
            Self::NetworkAttach(e) => write!(f, "network attach: {e}"),
            Self::BrokerConnect(e) => write!(f, "broker connect: {e}"),
            Self::CommandDecode(e) => write!(f, "command decode: {e}"),
            Self::InvalidCommandValue(e) => write!(f, "invalid command value: {e}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Parse { .. } | ConfigError::Invalid(_) => Self::ConfigParse(e),
            _ => Self::ConfigLoad(e),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::NetworkAttach(e)
    }
}

impl From<ChannelError> for Error {
    fn from(e: ChannelError) -> Self {
        Self::BrokerConnect(e)
    }
}

// ---------------------------------------------------------------------------
// Command decode errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload exceeds the command size limit.
    TooLarge(usize),
    /// Payload bytes are not UTF-8.
    NotUtf8,
    /// Payload is not well-formed JSON.
    Malformed,
    /// JSON parsed, but the top level is not an object.
    NotAnObject,
    /// A required field is absent.
    MissingField(&'static str),
    /// `pin` is present but not an integer.
    PinNotInteger,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge(len) => write!(f, "payload too large ({len} bytes)"),
            Self::NotUtf8 => write!(f, "payload is not UTF-8"),
            Self::Malformed => write!(f, "malformed JSON"),
            Self::NotAnObject => write!(f, "JSON is not an object"),
            Self::MissingField(name) => write!(f, "missing field '{name}'"),
            Self::PinNotInteger => write!(f, "'pin' is not an integer"),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::CommandDecode(e)
    }
}

// ---------------------------------------------------------------------------
// Command value errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidValue {
    /// `state` is neither "ON" nor "OFF".
    State,
    /// `pin` is outside the board's output-capable GPIO range.
    PinOutOfRange(i64),
    /// `pin` is in range but not declared in the manifest (restricted mode).
    PinNotDeclared(u8),
    /// The GPIO driver refused to drive the pin.
    PinRejected(u8),
}

impl fmt::Display for InvalidValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State => write!(f, "state must be \"ON\" or \"OFF\""),
            Self::PinOutOfRange(pin) => write!(f, "pin {pin} is not an output-capable GPIO"),
            Self::PinNotDeclared(pin) => write!(f, "GPIO {pin} is not declared in the manifest"),
            Self::PinRejected(pin) => write!(f, "GPIO {pin} rejected by driver"),
        }
    }
}

impl From<InvalidValue> for Error {
    fn from(e: InvalidValue) -> Self {
        Self::InvalidCommandValue(e)
    }
}
