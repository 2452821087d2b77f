//! Pulse indicator (buzzer or LED) driver.
//!
//! Generic over the `embedded-hal` 1.0 [`OutputPin`] and [`DelayNs`]
//! traits: on ESP-IDF a `PinDriver` plus `FreeRtos` delay, on the host
//! any recording mock.
//!
//! ```text
//!   pulse(3, 100 ms):  ▔▔▁▁▔▔▁▁▔▔▁▁      (100 ms high, 100 ms low) × 3
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

pub struct PulseIndicator<P, D> {
    pin: P,
    delay: D,
    pulses: u32,
}

impl<P: OutputPin, D: DelayNs> PulseIndicator<P, D> {
    /// Take ownership of `pin` and drive it low.
    pub fn new(mut pin: P, delay: D) -> Self {
        let _ = pin.set_low();
        Self { pin, delay, pulses: 0 }
    }

    /// Blocking burst: `times` × (`period_ms` high, `period_ms` low).
    pub fn pulse(&mut self, times: u8, period_ms: u32) {
        for _ in 0..times {
            let _ = self.pin.set_high();
            self.delay.delay_ms(period_ms);
            let _ = self.pin.set_low();
            self.delay.delay_ms(period_ms);
        }
        self.pulses = self.pulses.wrapping_add(times as u32);
    }

    /// Total pulses emitted since construction.
    pub fn pulse_count(&self) -> u32 {
        self.pulses
    }
}
