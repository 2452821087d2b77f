//! Hardware adapter. Bridges GPIO and the pulse indicator to domain ports.
//!
//! Exposes the controllable outputs through [`GpioPort`] and the buzzer
//! through [`IndicatorPort`].  This is the only module in the system that
//! drives pins.  On non-espidf targets the underlying `hw_init` calls are
//! simulation stubs and the adapter's level mirror is the observable state.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::app::commands::PinLevel;
use crate::app::ports::{GpioError, GpioPort, IndicatorPort, PulsePattern};
use crate::drivers::hw_init::{self, HwInitError};
use crate::drivers::indicator::PulseIndicator;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<P, D> {
    indicator: PulseIndicator<P, D>,
    /// Bit n set: GPIO n configured as output.
    configured: u64,
    /// Bit n set: GPIO n last driven high.
    levels: u64,
}

impl<P: OutputPin, D: DelayNs> HardwareAdapter<P, D> {
    pub fn new(indicator: PulseIndicator<P, D>) -> Self {
        Self { indicator, configured: 0, levels: 0 }
    }

    /// Last level written to `pin`, if it was ever configured.
    pub fn level(&self, pin: u8) -> Option<PinLevel> {
        let bit = bit(pin).ok()?;
        if self.configured & bit == 0 {
            return None;
        }
        Some(if self.levels & bit != 0 { PinLevel::High } else { PinLevel::Low })
    }

    pub fn indicator(&self) -> &PulseIndicator<P, D> {
        &self.indicator
    }
}

fn bit(pin: u8) -> Result<u64, GpioError> {
    1u64.checked_shl(pin as u32).ok_or(GpioError::InvalidPin(pin))
}

fn driver_error(e: HwInitError) -> GpioError {
    match e {
        HwInitError::GpioConfigFailed(rc) | HwInitError::GpioWriteFailed(rc) => GpioError::Driver(rc),
    }
}

// ── GpioPort implementation ───────────────────────────────────

impl<P: OutputPin, D: DelayNs> GpioPort for HardwareAdapter<P, D> {
    fn configure_output(&mut self, pin: u8) -> Result<(), GpioError> {
        let bit = bit(pin)?;
        hw_init::gpio_configure_output(pin).map_err(driver_error)?;
        self.configured |= bit;
        Ok(())
    }

    fn write(&mut self, pin: u8, level: PinLevel) -> Result<(), GpioError> {
        let bit = bit(pin)?;
        // Commands may target any output-capable GPIO, not just the ones
        // initialised from the manifest.
        if self.configured & bit == 0 {
            self.configure_output(pin)?;
        }
        hw_init::gpio_write(pin, level.is_high()).map_err(driver_error)?;
        if level.is_high() {
            self.levels |= bit;
        } else {
            self.levels &= !bit;
        }
        Ok(())
    }
}

// ── IndicatorPort implementation ──────────────────────────────

impl<P: OutputPin, D: DelayNs> IndicatorPort for HardwareAdapter<P, D> {
    fn pulse(&mut self, pattern: PulsePattern) {
        self.indicator.pulse(pattern.times, pattern.period_ms);
    }
}
