//! Resolution of manifest pin bindings into a fixed-capacity lookup table.
//!
//! Bindings that cannot be resolved are skipped with a reason; resolution
//! never fails as a whole, so one typo in `devices` does not keep the rest
//! of the board offline.

use core::fmt;

use heapless::Vec as HVec;

use crate::config::PinBinding;
use crate::pins::{self, Board};

/// Maximum number of resolved bindings.
pub const MAX_PINS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Output,
}

impl Direction {
    fn parse(kind: &str) -> Option<Self> {
        kind.trim().eq_ignore_ascii_case("OUTPUT").then_some(Self::Output)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPin {
    pub name: String,
    pub identifier: u8,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The raw spec is not a `Dn` label, `GPIOn` or integer.
    UnknownPin,
    /// Parsed, but outside the board's GPIO range.
    OutOfRange(u32),
    /// In range, but the GPIO cannot drive an output.
    NotOutputCapable(u8),
    UnsupportedType,
    /// The entry has no usable name.
    MissingName,
    DuplicateName,
    TableFull,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPin => write!(f, "unrecognised pin"),
            Self::OutOfRange(pin) => write!(f, "GPIO {} out of range", pin),
            Self::NotOutputCapable(pin) => write!(f, "GPIO {} is input-only", pin),
            Self::UnsupportedType => write!(f, "unsupported type"),
            Self::MissingName => write!(f, "missing name"),
            Self::DuplicateName => write!(f, "duplicate name"),
            Self::TableFull => write!(f, "pin table full"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBinding {
    pub name: String,
    pub pin: String,
    pub reason: SkipReason,
}

/// Parse a raw pin spec into a GPIO number without range checks.
pub fn parse_pin_spec(spec: &str) -> Option<u32> {
    let spec = spec.trim();
    if let Some(gpio) = pins::nodemcu_label(spec) {
        return Some(gpio as u32);
    }
    let digits = spec
        .get(..4)
        .filter(|prefix| prefix.eq_ignore_ascii_case("GPIO"))
        .map_or(spec, |_| &spec[4..]);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinTable {
    pins: HVec<ResolvedPin, MAX_PINS>,
}

impl PinTable {
    /// Resolve `bindings` against `board`, returning the table and every
    /// binding that was skipped.
    pub fn resolve(bindings: &[PinBinding], board: Board) -> (Self, Vec<SkippedBinding>) {
        let mut table = Self::default();
        let mut skipped = Vec::new();

        for binding in bindings {
            match table.resolve_one(binding, board) {
                Ok(pin) => {
                    if table.pins.push(pin).is_err() {
                        skipped.push(skip(binding, SkipReason::TableFull));
                    }
                }
                Err(reason) => skipped.push(skip(binding, reason)),
            }
        }
        (table, skipped)
    }

    fn resolve_one(&self, binding: &PinBinding, board: Board) -> Result<ResolvedPin, SkipReason> {
        if binding.name.trim().is_empty() {
            return Err(SkipReason::MissingName);
        }
        let direction = Direction::parse(&binding.kind).ok_or(SkipReason::UnsupportedType)?;
        let raw = parse_pin_spec(&binding.pin).ok_or(SkipReason::UnknownPin)?;
        if !board.is_addressable(raw) {
            return Err(SkipReason::OutOfRange(raw));
        }
        let identifier = raw as u8;
        if !board.is_output_capable(raw) {
            return Err(SkipReason::NotOutputCapable(identifier));
        }
        if self.get(&binding.name).is_some() {
            return Err(SkipReason::DuplicateName);
        }
        Ok(ResolvedPin { name: binding.name.clone(), identifier, direction })
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedPin> {
        self.pins.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, identifier: u8) -> bool {
        self.pins.iter().any(|p| p.identifier == identifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedPin> {
        self.pins.iter()
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

fn skip(binding: &PinBinding, reason: SkipReason) -> SkippedBinding {
    SkippedBinding { name: binding.name.clone(), pin: binding.pin.clone(), reason }
}
