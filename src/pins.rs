//! GPIO assignments for the supported controller boards.
//!
//! Single source of truth for the indicator outputs and the addressable
//! GPIO range.  The board is resolved once at boot ([`Board::from_build_env`])
//! and passed by value to everything that validates pin numbers.
//!
//! ```text
//!   Board          buzzer  LED (polarity)    GPIO range   outputs
//!   Esp32DevKit    27      2 (active high)   0-39         0-33 except 6-11, 20, 24, 28-31
//!   NodeMcuStyle   16      2 (active low)    0-16         0-16 except 6-11
//! ```
//!
//! GPIO 6-11 carry the SPI flash bus on both modules.

// ---------------------------------------------------------------------------
// NodeMCU silkscreen labels
// ---------------------------------------------------------------------------

/// `D0`..`D10` → GPIO number, as printed on NodeMCU-style carrier boards.
pub const NODEMCU_LABELS: [u8; 11] = [16, 5, 4, 0, 2, 14, 12, 13, 15, 3, 1];

/// Resolve a `Dn` silkscreen label (case-insensitive) to its GPIO number.
pub fn nodemcu_label(label: &str) -> Option<u8> {
    let digits = label.strip_prefix('D').or_else(|| label.strip_prefix('d'))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: usize = digits.parse().ok()?;
    NODEMCU_LABELS.get(index).copied()
}

// ---------------------------------------------------------------------------
// Board variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Board {
    /// ESP32 DevKit-style module.
    Esp32DevKit,
    /// NodeMCU-style carrier (ESP8266 pinout).
    NodeMcuStyle,
}

impl Board {
    /// Board selected at build time through `PINLINK_BOARD`
    /// (`esp32` or `nodemcu`); defaults to [`Board::Esp32DevKit`].
    pub fn from_build_env() -> Self {
        option_env!("PINLINK_BOARD")
            .and_then(Self::from_name)
            .unwrap_or(Self::Esp32DevKit)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "esp32" | "esp32-devkit" | "devkit" => Some(Self::Esp32DevKit),
            "nodemcu" | "esp8266" => Some(Self::NodeMcuStyle),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Esp32DevKit => "esp32-devkit",
            Self::NodeMcuStyle => "nodemcu",
        }
    }

    /// Indicator buzzer output.
    pub const fn buzzer_gpio(self) -> u8 {
        match self {
            Self::Esp32DevKit => 27,
            Self::NodeMcuStyle => 16,
        }
    }

    /// Built-in LED.
    pub const fn led_gpio(self) -> u8 {
        2
    }

    /// NodeMCU modules wire the LED to 3V3, so it lights on LOW.
    pub const fn led_active_low(self) -> bool {
        matches!(self, Self::NodeMcuStyle)
    }

    /// Highest addressable GPIO number.
    pub const fn max_gpio(self) -> u8 {
        match self {
            Self::Esp32DevKit => 39,
            Self::NodeMcuStyle => 16,
        }
    }

    pub const fn is_addressable(self, pin: u32) -> bool {
        pin <= self.max_gpio() as u32
    }

    /// Bit `n` set when GPIO `n` may be driven as an output.
    const fn output_mask(self) -> u64 {
        match self {
            // 0-33 minus the flash bus and the unbonded 20, 24, 28-31.
            Self::Esp32DevKit => 0x0000_0003_0EEF_F03F,
            // 0-16 minus the flash bus.
            Self::NodeMcuStyle => 0x0001_F03F,
        }
    }

    /// GPIO 34-39 on the ESP32 are input-only.
    pub const fn is_output_capable(self, pin: u32) -> bool {
        pin < 64 && self.output_mask() & (1u64 << pin) != 0
    }
}
