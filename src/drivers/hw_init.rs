//! Raw GPIO output configuration and level control.
//!
//! Pin numbers come from the device manifest at runtime, so outputs are
//! configured one at a time with raw ESP-IDF sys calls instead of typed
//! `PinDriver`s.  Only called from the control thread.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// ── Error type ────────────────────────────────────────────────

/// Errors while configuring or driving a GPIO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    GpioWriteFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::GpioWriteFailed(rc)  => write!(f, "GPIO write failed (rc={})", rc),
        }
    }
}

// ── GPIO Outputs ──────────────────────────────────────────────

/// Configure `pin` as a push-pull output with pulls disabled.
#[cfg(target_os = "espidf")]
pub fn gpio_configure_output(pin: u8) -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        ..Default::default()
    };
    // SAFETY: gpio_config only touches the IO-MUX/GPIO registers of the
    // pins in the mask; the caller validated the pin number for this board.
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_configure_output(pin: u8) -> Result<(), HwInitError> {
    log::debug!("hw_init(sim): GPIO {} as output", pin);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: u8, high: bool) -> Result<(), HwInitError> {
    // SAFETY: gpio_set_level writes the output register of a configured
    // output pin.  Main-loop only.
    let ret = unsafe { gpio_set_level(pin as i32, u32::from(high)) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioWriteFailed(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: u8, _high: bool) -> Result<(), HwInitError> {
    Ok(())
}
