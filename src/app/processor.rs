//! Command processing: decode → validate → drive pin → reply → pulse.
//!
//! Messages are handled one at a time on the control thread; this is the
//! only place (besides boot-time initialisation) where pin levels change.

use log::{debug, info, warn};

use crate::app::commands::{self, Command, Decoded, PinLevel, Response};
use crate::app::events::AppEvent;
use crate::app::ports::{ChannelPort, EventSink, GpioPort, InboundMessage, IndicatorPort, PulsePattern};
use crate::error::{Error, InvalidValue};
use crate::pin_table::PinTable;
use crate::pins::Board;

/// Which pins a command may drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinGuard {
    /// Any output-capable GPIO on the board.
    AnyOutput,
    /// Only pins resolved from the manifest.
    ManifestOnly,
}

impl PinGuard {
    pub const fn from_restrict(restrict_to_manifest: bool) -> Self {
        if restrict_to_manifest { Self::ManifestOnly } else { Self::AnyOutput }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Echo of our own publication: no reply, no pulse.
    Ignored,
    Replied(Response),
}

#[derive(Debug, Clone)]
pub struct CommandProcessor {
    board: Board,
    guard: PinGuard,
    pulse_ms: u32,
}

impl CommandProcessor {
    pub fn new(board: Board, guard: PinGuard, pulse_ms: u32) -> Self {
        Self { board, guard, pulse_ms }
    }

    pub fn guard(&self) -> PinGuard {
        self.guard
    }

    pub fn handle(
        &self,
        message: &InboundMessage,
        pins: &PinTable,
        channel: &mut impl ChannelPort,
        hw: &mut (impl GpioPort + IndicatorPort),
        sink: &mut impl EventSink,
    ) -> Outcome {
        let response = match commands::decode(&message.payload) {
            Decoded::Echo => {
                debug!("CMD | ignoring echo on '{}'", message.topic);
                return Outcome::Ignored;
            }
            Decoded::StatusQuery => Response::Ok,
            Decoded::Command { pin, level } => match self.apply(pin, level, pins, hw) {
                Ok(command) => {
                    info!("CMD | GPIO {} -> {:?}", command.pin, command.level);
                    sink.emit(&AppEvent::CommandApplied { pin: command.pin, level: command.level });
                    Response::Ok
                }
                Err(error) => self.reject(error, sink),
            },
            Decoded::Rejected(error) => self.reject(error, sink),
        };

        if let Err(e) = channel.publish(&message.topic, response.as_str()) {
            warn!("CMD | reply '{}' dropped: {}", response, e);
        }
        hw.pulse(PulsePattern::new(1, self.pulse_ms));
        Outcome::Replied(response)
    }

    fn apply(
        &self,
        pin: i64,
        level: PinLevel,
        pins: &PinTable,
        hw: &mut impl GpioPort,
    ) -> Result<Command, Error> {
        let pin = u8::try_from(pin)
            .ok()
            .filter(|p| self.board.is_output_capable(*p as u32))
            .ok_or(InvalidValue::PinOutOfRange(pin))?;
        if self.guard == PinGuard::ManifestOnly && !pins.contains(pin) {
            return Err(InvalidValue::PinNotDeclared(pin).into());
        }
        hw.write(pin, level).map_err(|_| InvalidValue::PinRejected(pin))?;
        Ok(Command { pin, level })
    }

    fn reject(&self, error: Error, sink: &mut impl EventSink) -> Response {
        let reply = Response::for_error(&error);
        warn!("CMD | rejected ({}), replying '{}'", error, reply);
        sink.emit(&AppEvent::CommandRejected { error, reply });
        reply
    }
}
