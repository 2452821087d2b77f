//! PinLink firmware entry point
//!
//! Hexagonal architecture with a single-threaded polling control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   FlashManifestSource          │
//! │  (Gpio+Indicator)  (EventSink)    (ManifestSource)             │
//! │  WifiLink          MqttChannel    StatusServer    UptimeClock  │
//! │  (LinkPort)        (ChannelPort)  (StatusPort)                 │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            GatewayService (pure logic)                 │    │
//! │  │  ConfigStore · PinTable · CommandProcessor · Status    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyOutputPin, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use pinlink::adapters::hardware::HardwareAdapter;
use pinlink::adapters::http::StatusServer;
use pinlink::adapters::log_sink::LogEventSink;
use pinlink::adapters::mqtt::MqttChannel;
use pinlink::adapters::storage::FlashManifestSource;
use pinlink::adapters::time::UptimeClock;
use pinlink::adapters::wifi::WifiLink;
use pinlink::app::service::GatewayService;
use pinlink::drivers::hw_init;
use pinlink::drivers::indicator::PulseIndicator;
use pinlink::pins::Board;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PinLink v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let board = Board::from_build_env();
    info!("Board: {}", board.name());

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // ── 2. Indicator + built-in LED ───────────────────────────
    // SAFETY: the buzzer GPIO is reserved for the indicator and never
    // appears in a manifest-driven output on a correctly wired board.
    let buzzer = unsafe { AnyOutputPin::new(i32::from(board.buzzer_gpio())) };
    let indicator = PulseIndicator::new(PinDriver::output(buzzer)?, FreeRtos);
    let mut hw = HardwareAdapter::new(indicator);

    let led = board.led_gpio();
    let led_on = hw_init::gpio_configure_output(led)
        .and_then(|()| hw_init::gpio_write(led, !board.led_active_low()));
    if let Err(e) = led_on {
        warn!("LED on GPIO {} unavailable: {}", led, e);
    }

    let clock = UptimeClock::new();
    let mut sink = LogEventSink::new();
    let mut service = GatewayService::new(board);

    // ── 3. Boot: load the manifest, forever ───────────────────
    FreeRtos::delay_ms(service.runtime().boot_settle_ms);
    let mut source = FlashManifestSource::device();
    while !service.boot(clock.uptime_ms(), &mut source, &mut hw, &mut sink) {
        FreeRtos::delay_ms(service.runtime().loop_interval_ms);
    }

    // ── 4. Network adapters ───────────────────────────────────
    let mut link = WifiLink::new(peripherals.modem, sysloop, nvs)?;
    let mut channel = MqttChannel::new();
    // Started from the loop once the link is up; a failed start is retried.
    let mut status = StatusServer::new();

    info!("Entering control loop");

    // ── 5. Control loop ───────────────────────────────────────
    loop {
        service.tick(clock.uptime_ms(), &mut link, &mut channel, &mut hw, &mut status, &mut sink);
        FreeRtos::delay_ms(service.runtime().loop_interval_ms);
    }
}
