//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART in production), one tagged line
//! per event.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            AppEvent::PhaseChanged { from, to } => {
                info!("PHASE | {:?} -> {:?}", from, to);
            }
            AppEvent::ManifestLoaded { pins, skipped } => {
                info!("CONFIG | pins={} skipped={}", pins, skipped);
            }
            AppEvent::PinSkipped(skip) => {
                warn!("CONFIG | skipped '{}' pin='{}': {}", skip.name, skip.pin, skip.reason);
            }
            AppEvent::PinInitialised { name, pin } => {
                debug!("GPIO | '{}' = GPIO {} (low)", name, pin);
            }
            AppEvent::Failure { error, attempt } => {
                warn!("RETRY | {} | attempt={} pulses={}", error, attempt, error.pulse_count());
            }
            AppEvent::Attached(link) => {
                info!("LINK | up | host={} ip={}", link.hostname, link.address);
            }
            AppEvent::LinkLost => {
                warn!("LINK | down");
            }
            AppEvent::BrokerConnected => {
                info!("MQTT | up");
            }
            AppEvent::BrokerLost => {
                warn!("MQTT | down");
            }
            AppEvent::KeepAliveSent => {
                debug!("MQTT | keep-alive");
            }
            AppEvent::CommandApplied { pin, level } => {
                info!("CMD | GPIO {} = {:?}", pin, level);
            }
            AppEvent::CommandRejected { error, reply } => {
                info!("CMD | rejected: {} | reply='{}'", error, reply);
            }
            AppEvent::StatusServed(n) => {
                debug!("HTTP | served {} request(s)", n);
            }
            AppEvent::StatusUnavailable { error, attempt } => {
                warn!("HTTP | {} | attempt={}", error, attempt);
            }
        }
    }
}
