//! Inbound pin commands and the replies sent back for them.
//!
//! Wire format on the command topic:
//!
//! ```text
//!   {"pin": 5, "state": "ON"}     → drive GPIO 5 high, reply "OK"
//!   {"pin": 5, "state": "OFF"}    → drive GPIO 5 low,  reply "OK"
//!   {"pin": 5, "state": "DIM"}    → no change,         reply "Invalid state"
//!   hello                         → no change,         reply "Not a valid JSON message"
//!   status                        → no change,         reply "OK"
//! ```
//!
//! Replies go out on the same topic the command arrived on, so the device
//! hears its own replies (and its keep-alives) echoed back by the broker.
//! Those echoes are recognised as [`Decoded::Echo`] and dropped without a
//! reply, which keeps the reply loop from feeding itself.

use core::fmt;

use crate::error::{DecodeError, Error, InvalidValue};

/// Maximum accepted command payload, in bytes.
pub const MAX_COMMAND_PAYLOAD: usize = 256;

/// Liveness query that always answers [`Response::Ok`].
pub const STATUS_QUERY: &str = "status";

/// Output level requested for a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinLevel {
    High,
    Low,
}

impl PinLevel {
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }
}

/// A validated request to drive one pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub pin: u8,
    pub level: PinLevel,
}

/// Every payload the device ever publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Ok,
    InvalidState,
    NotValidJson,
    KeepAlive,
}

impl Response {
    pub const ALL: [Self; 4] = [Self::Ok, Self::InvalidState, Self::NotValidJson, Self::KeepAlive];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::InvalidState => "Invalid state",
            Self::NotValidJson => "Not a valid JSON message",
            Self::KeepAlive => "keep-alive",
        }
    }

    /// Reply for a rejected command.
    pub const fn for_error(error: &Error) -> Self {
        match error {
            Error::InvalidCommandValue(_) => Self::InvalidState,
            _ => Self::NotValidJson,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of decoding one inbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// One of our own publications echoed back; drop silently.
    Echo,
    /// [`STATUS_QUERY`].
    StatusQuery,
    /// Well-formed command.  `pin` is not yet range-checked.
    Command { pin: i64, level: PinLevel },
    Rejected(Error),
}

/// True if `payload` is byte-for-byte one of the device's own publications.
pub fn is_echo(payload: &[u8]) -> bool {
    Response::ALL.iter().any(|r| r.as_str().as_bytes() == payload)
}

pub fn decode(payload: &[u8]) -> Decoded {
    if is_echo(payload) {
        return Decoded::Echo;
    }
    if payload == STATUS_QUERY.as_bytes() {
        return Decoded::StatusQuery;
    }
    match parse(payload) {
        Ok((pin, level)) => Decoded::Command { pin, level },
        Err(e) => Decoded::Rejected(e),
    }
}

fn parse(payload: &[u8]) -> Result<(i64, PinLevel), Error> {
    if payload.len() > MAX_COMMAND_PAYLOAD {
        return Err(DecodeError::TooLarge(payload.len()).into());
    }
    let text = core::str::from_utf8(payload).map_err(|_| DecodeError::NotUtf8)?;
    let value: serde_json::Value = serde_json::from_str(text).map_err(|_| DecodeError::Malformed)?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;

    let pin = object.get("pin").ok_or(DecodeError::MissingField("pin"))?;
    let state = object.get("state").ok_or(DecodeError::MissingField("state"))?;
    let pin = pin.as_i64().ok_or(DecodeError::PinNotInteger)?;

    let level = match state.as_str() {
        Some("ON") => PinLevel::High,
        Some("OFF") => PinLevel::Low,
        _ => return Err(InvalidValue::State.into()),
    };
    Ok((pin, level))
}
