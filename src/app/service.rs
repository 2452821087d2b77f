//! Gateway service: the hexagonal core and its control loop.
//!
//! [`GatewayService`] owns the manifest, the resolved pin table, the retry
//! timers and the command processor.  All I/O flows through port traits
//! injected at call sites, so the whole loop runs on the host against
//! mock or simulated adapters.
//!
//! ```text
//!            boot() ok                       link + broker up
//!  Booting ────────────▶ Attaching ─────────────────────────────▶ Operational
//!   │  ▲                    ▲  │ attach / reattach (2 pulses)          │
//!   └──┘ config failure     │  │ connect (5 pulses)                    │
//!        (3 pulses)         │  └──┘                                    │
//!                           └────────────── link lost ─────────────────┘
//! ```
//!
//! Every setup step is retried with a fixed delay, forever.  There is no
//! terminal state.

use log::{debug, info, warn};

use crate::app::commands::{PinLevel, Response};
use crate::app::events::AppEvent;
use crate::app::ports::{
    ChannelPort, EventSink, GpioPort, IndicatorPort, LinkPort, ManifestSource, PulsePattern,
    StatusPort,
};
use crate::app::processor::{CommandProcessor, PinGuard};
use crate::app::status::StatusPresenter;
use crate::config::{ConfigStore, RuntimeConfig};
use crate::error::Error;
use crate::pin_table::PinTable;
use crate::pins::Board;
use crate::scheduler::{IntervalTimer, RetryPolicy};

// ───────────────────────────────────────────────────────────────
// Phase & stats
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a loadable manifest.
    Booting,
    /// Bringing up the network link and the broker session.
    Attaching,
    /// Serving commands.
    Operational,
}

/// Loop counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub boot_attempts: u32,
    pub attach_attempts: u32,
    pub broker_attempts: u32,
    pub messages_handled: u32,
    pub keepalives_sent: u32,
    pub status_served: u32,
}

// ───────────────────────────────────────────────────────────────
// GatewayService
// ───────────────────────────────────────────────────────────────

pub struct GatewayService {
    board: Board,
    phase: Phase,
    runtime: RuntimeConfig,
    store: Option<ConfigStore>,
    pins: PinTable,
    processor: CommandProcessor,
    presenter: StatusPresenter,
    boot_retry: RetryPolicy,
    link_retry: RetryPolicy,
    broker_retry: RetryPolicy,
    status_retry: RetryPolicy,
    keepalive: IntervalTimer,
    /// Set after the first successful attach; later attempts use `reattach`.
    ever_attached: bool,
    /// Link came back (or must come back) without us recording its identity.
    identity_stale: bool,
    /// Broker state seen on the previous pass, for drop detection.
    broker_up: bool,
    stats: LoopStats,
}

impl GatewayService {
    /// Construct the service for `board` with default timing.
    ///
    /// Does **not** load the manifest; call [`boot`](Self::boot) until it
    /// returns `true`.
    pub fn new(board: Board) -> Self {
        let runtime = RuntimeConfig::default();
        Self {
            board,
            phase: Phase::Booting,
            processor: CommandProcessor::new(board, PinGuard::AnyOutput, runtime.indicator_pulse_ms),
            boot_retry: RetryPolicy::fixed(runtime.retry_delay_ms),
            link_retry: RetryPolicy::fixed(runtime.retry_delay_ms),
            broker_retry: RetryPolicy::fixed(runtime.retry_delay_ms),
            status_retry: RetryPolicy::fixed(runtime.retry_delay_ms),
            keepalive: IntervalTimer::new(runtime.keepalive_interval_ms, 0),
            runtime,
            store: None,
            pins: PinTable::default(),
            presenter: StatusPresenter::default(),
            ever_attached: false,
            identity_stale: false,
            broker_up: false,
            stats: LoopStats::default(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn board(&self) -> Board {
        self.board
    }

    pub fn runtime(&self) -> &RuntimeConfig {
        &self.runtime
    }

    pub fn store(&self) -> Option<&ConfigStore> {
        self.store.as_ref()
    }

    pub fn pins(&self) -> &PinTable {
        &self.pins
    }

    pub fn presenter(&self) -> &StatusPresenter {
        &self.presenter
    }

    // ── Booting ───────────────────────────────────────────────

    /// One manifest load attempt, if the boot retry is due.
    ///
    /// Returns `true` once the service has left [`Phase::Booting`].
    pub fn boot(
        &mut self,
        now_ms: u64,
        source: &mut impl ManifestSource,
        hw: &mut (impl GpioPort + IndicatorPort),
        sink: &mut impl EventSink,
    ) -> bool {
        if self.phase != Phase::Booting {
            return true;
        }
        if !self.boot_retry.is_due(now_ms) {
            return false;
        }
        let attempt = self.boot_retry.record_attempt(now_ms);
        self.stats.boot_attempts = self.stats.boot_attempts.wrapping_add(1);

        match ConfigStore::load(source) {
            Ok(store) => {
                self.boot_retry.succeed();
                self.install(store, now_ms, hw, sink);
                true
            }
            Err(e) => {
                self.fail(Error::from(e), attempt, hw, sink);
                false
            }
        }
    }

    fn install(
        &mut self,
        store: ConfigStore,
        now_ms: u64,
        hw: &mut (impl GpioPort + IndicatorPort),
        sink: &mut impl EventSink,
    ) {
        let (pins, skipped) = PinTable::resolve(store.devices(), self.board);
        for skip in &skipped {
            warn!("CONFIG | skipping device '{}' (pin '{}'): {}", skip.name, skip.pin, skip.reason);
            sink.emit(&AppEvent::PinSkipped(skip.clone()));
        }

        for pin in pins.iter() {
            let ready = hw
                .configure_output(pin.identifier)
                .and_then(|()| hw.write(pin.identifier, PinLevel::Low));
            match ready {
                Ok(()) => {
                    info!("CONFIG | '{}' on GPIO {} as output", pin.name, pin.identifier);
                    sink.emit(&AppEvent::PinInitialised { name: pin.name.clone(), pin: pin.identifier });
                }
                Err(e) => warn!("CONFIG | '{}' on GPIO {}: {}", pin.name, pin.identifier, e),
            }
        }

        let runtime = store.runtime().clone();
        self.processor = CommandProcessor::new(
            self.board,
            PinGuard::from_restrict(runtime.restrict_to_manifest),
            runtime.indicator_pulse_ms,
        );
        self.link_retry = RetryPolicy::fixed(runtime.retry_delay_ms);
        self.broker_retry = RetryPolicy::fixed(runtime.retry_delay_ms);
        self.status_retry = RetryPolicy::fixed(runtime.retry_delay_ms);
        self.keepalive = IntervalTimer::new(runtime.keepalive_interval_ms, now_ms);
        self.presenter = StatusPresenter::new(store.to_json());

        sink.emit(&AppEvent::ManifestLoaded { pins: pins.len(), skipped: skipped.len() });
        info!(
            "CONFIG | manifest loaded: {} pin(s), {} skipped, topic '{}'",
            pins.len(),
            skipped.len(),
            store.mqtt().topic
        );

        self.runtime = runtime;
        self.pins = pins;
        self.store = Some(store);
        self.enter(Phase::Attaching, sink);
    }

    // ── Per-pass orchestration ────────────────────────────────

    /// Run one control-loop pass.  Never blocks beyond a single bounded
    /// connect attempt and indicator pulses.
    pub fn tick(
        &mut self,
        now_ms: u64,
        link: &mut impl LinkPort,
        channel: &mut impl ChannelPort,
        hw: &mut (impl GpioPort + IndicatorPort),
        status: &mut impl StatusPort,
        sink: &mut impl EventSink,
    ) {
        match self.phase {
            Phase::Booting => {}
            Phase::Attaching => self.tick_attaching(now_ms, link, channel, hw, status, sink),
            Phase::Operational => self.tick_operational(now_ms, link, channel, hw, status, sink),
        }
    }

    fn tick_attaching(
        &mut self,
        now_ms: u64,
        link: &mut impl LinkPort,
        channel: &mut impl ChannelPort,
        hw: &mut (impl GpioPort + IndicatorPort),
        status: &mut impl StatusPort,
        sink: &mut impl EventSink,
    ) {
        if !link.is_attached() || self.identity_stale {
            if !self.link_retry.is_due(now_ms) {
                return;
            }
            if !self.attach_link(now_ms, link, hw, sink) {
                return;
            }
        }

        self.serve_status(now_ms, status, hw, sink);

        if !channel.is_connected() && self.broker_retry.is_due(now_ms) {
            self.connect_broker(now_ms, channel, hw, sink);
        }
        if channel.is_connected() {
            self.broker_up = true;
            self.enter(Phase::Operational, sink);
        }
    }

    fn tick_operational(
        &mut self,
        now_ms: u64,
        link: &mut impl LinkPort,
        channel: &mut impl ChannelPort,
        hw: &mut (impl GpioPort + IndicatorPort),
        status: &mut impl StatusPort,
        sink: &mut impl EventSink,
    ) {
        // 1. HTTP
        self.serve_status(now_ms, status, hw, sink);

        // 2. Link health; the broker session is left alone.
        if !link.is_attached() {
            warn!("LINK | connection lost, reattaching");
            sink.emit(&AppEvent::LinkLost);
            self.identity_stale = true;
            self.enter(Phase::Attaching, sink);
            return;
        }

        // 3. Broker health
        let mut attempted = false;
        if !channel.is_connected() {
            if self.broker_up {
                self.broker_up = false;
                warn!("MQTT | session lost, reconnecting");
                sink.emit(&AppEvent::BrokerLost);
            }
            if self.broker_retry.is_due(now_ms) {
                attempted = true;
                self.connect_broker(now_ms, channel, hw, sink);
            }
        }

        // 4. Liveness slot
        if self.keepalive.fire(now_ms) {
            if channel.is_connected() {
                self.send_keepalive(channel, sink);
            } else if !attempted {
                self.connect_broker(now_ms, channel, hw, sink);
            }
        }

        // 5. Inbound commands
        while let Some(message) = channel.poll() {
            self.stats.messages_handled = self.stats.messages_handled.wrapping_add(1);
            self.processor.handle(&message, &self.pins, channel, hw, sink);
        }
    }

    // ── Steps ─────────────────────────────────────────────────

    fn attach_link(
        &mut self,
        now_ms: u64,
        link: &mut impl LinkPort,
        hw: &mut impl IndicatorPort,
        sink: &mut impl EventSink,
    ) -> bool {
        let attempt = self.link_retry.record_attempt(now_ms);
        self.stats.attach_attempts = self.stats.attach_attempts.wrapping_add(1);
        let Some(store) = &self.store else {
            return false;
        };

        let result = if self.ever_attached {
            link.reattach(store.wifi())
        } else {
            info!("LINK | connecting to '{}'", store.wifi().ssid);
            link.attach(store.wifi())
        };

        match result {
            Ok(info) => {
                info!("LINK | attached as {} @ {}", info.hostname, info.address);
                self.link_retry.succeed();
                self.ever_attached = true;
                self.identity_stale = false;
                self.presenter.set_identity(&info);
                sink.emit(&AppEvent::Attached(info));
                true
            }
            Err(e) => {
                self.fail(Error::NetworkAttach(e), attempt, hw, sink);
                false
            }
        }
    }

    fn connect_broker(
        &mut self,
        now_ms: u64,
        channel: &mut impl ChannelPort,
        hw: &mut impl IndicatorPort,
        sink: &mut impl EventSink,
    ) -> bool {
        let attempt = self.broker_retry.record_attempt(now_ms);
        self.stats.broker_attempts = self.stats.broker_attempts.wrapping_add(1);
        let Some(store) = &self.store else {
            return false;
        };

        match channel.connect(store.mqtt()) {
            Ok(()) => {
                info!(
                    "MQTT | connected to {} as '{}', subscribed to '{}'",
                    store.mqtt().url(),
                    store.mqtt().client_id,
                    store.mqtt().topic
                );
                self.broker_retry.succeed();
                self.broker_up = true;
                sink.emit(&AppEvent::BrokerConnected);
                true
            }
            Err(e) => {
                self.fail(Error::BrokerConnect(e), attempt, hw, sink);
                false
            }
        }
    }

    fn send_keepalive(&mut self, channel: &mut impl ChannelPort, sink: &mut impl EventSink) {
        let Some(store) = &self.store else {
            return;
        };
        match channel.publish(&store.mqtt().topic, Response::KeepAlive.as_str()) {
            Ok(()) => {
                debug!("MQTT | keep-alive -> '{}'", store.mqtt().topic);
                self.stats.keepalives_sent = self.stats.keepalives_sent.wrapping_add(1);
                sink.emit(&AppEvent::KeepAliveSent);
            }
            Err(e) => warn!("MQTT | keep-alive dropped: {}", e),
        }
    }

    fn serve_status(
        &mut self,
        now_ms: u64,
        status: &mut impl StatusPort,
        hw: &mut impl IndicatorPort,
        sink: &mut impl EventSink,
    ) {
        if !status.is_running() && !self.start_status(now_ms, status, sink) {
            return;
        }
        let served = status.serve_pending(&self.presenter);
        if served == 0 {
            return;
        }
        for _ in 0..served {
            hw.pulse(PulsePattern::new(1, self.runtime.indicator_pulse_ms));
        }
        self.stats.status_served = self.stats.status_served.wrapping_add(served as u32);
        sink.emit(&AppEvent::StatusServed(served));
    }

    /// Losing the endpoint never holds up the command path: a failed start
    /// is logged and retried on the fixed delay.
    fn start_status(&mut self, now_ms: u64, status: &mut impl StatusPort, sink: &mut impl EventSink) -> bool {
        if !self.status_retry.is_due(now_ms) {
            return false;
        }
        let attempt = self.status_retry.record_attempt(now_ms);
        match status.start() {
            Ok(()) => {
                self.status_retry.succeed();
                info!("HTTP | endpoint listening");
                true
            }
            Err(error) => {
                warn!("HTTP | {} (attempt {}), retrying in {} ms", error, attempt, self.runtime.retry_delay_ms);
                sink.emit(&AppEvent::StatusUnavailable { error, attempt });
                false
            }
        }
    }

    fn fail(&self, error: Error, attempt: u32, hw: &mut impl IndicatorPort, sink: &mut impl EventSink) {
        warn!("{} (attempt {}), retrying in {} ms", error, attempt, self.runtime.retry_delay_ms);
        hw.pulse(PulsePattern::new(error.pulse_count(), self.runtime.indicator_pulse_ms));
        sink.emit(&AppEvent::Failure { error, attempt });
    }

    fn enter(&mut self, to: Phase, sink: &mut impl EventSink) {
        if self.phase == to {
            return;
        }
        let from = self.phase;
        self.phase = to;
        info!("LOOP | {:?} -> {:?}", from, to);
        sink.emit(&AppEvent::PhaseChanged { from, to });
    }
}
