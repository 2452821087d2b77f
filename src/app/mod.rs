//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the rules of the PinLink gateway: command decoding
//! and validation, status responses, and the reconnecting control loop.
//! All interaction with hardware and the network happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable without
//! real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod processor;
pub mod service;
pub mod status;
