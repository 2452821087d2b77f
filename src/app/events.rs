//! Outbound application events.
//!
//! The [`GatewayService`](super::service::GatewayService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (the firmware logs them to serial).

use crate::app::commands::{PinLevel, Response};
use crate::app::ports::{LinkInfo, StatusError};
use crate::app::service::Phase;
use crate::error::Error;
use crate::pin_table::SkippedBinding;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The control loop moved between phases.
    PhaseChanged { from: Phase, to: Phase },

    /// Manifest loaded and pins resolved.
    ManifestLoaded { pins: usize, skipped: usize },

    /// A manifest pin binding could not be resolved.
    PinSkipped(SkippedBinding),

    /// A resolved pin was initialised as an output, driven low.
    PinInitialised { name: String, pin: u8 },

    /// A setup step failed and will be retried.
    Failure { error: Error, attempt: u32 },

    /// The network link is up.
    Attached(LinkInfo),

    /// The network link dropped.
    LinkLost,

    /// Broker session established and subscribed.
    BrokerConnected,

    /// Broker session dropped.
    BrokerLost,

    /// Liveness message published.
    KeepAliveSent,

    /// A command drove a pin.
    CommandApplied { pin: u8, level: PinLevel },

    /// A command was answered without touching any pin.
    CommandRejected { error: Error, reply: Response },

    /// `n` HTTP status requests were answered.
    StatusServed(usize),

    /// The HTTP endpoint could not be started; commands keep flowing.
    StatusUnavailable { error: StatusError, attempt: u32 },
}
