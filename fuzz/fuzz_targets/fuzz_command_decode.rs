//! Fuzz target: `commands::decode`
//!
//! Drives arbitrary MQTT payloads into the command decoder and asserts
//! that it never panics and only accepts bounded UTF-8 payloads.
//!
//! cargo fuzz run fuzz_command_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use pinlink::app::commands::{decode, is_echo, Decoded, Response, MAX_COMMAND_PAYLOAD};

fuzz_target!(|data: &[u8]| {
    match decode(data) {
        Decoded::Echo => assert!(is_echo(data)),
        Decoded::StatusQuery => assert_eq!(data, b"status"),
        Decoded::Command { .. } => {
            assert!(data.len() <= MAX_COMMAND_PAYLOAD, "oversized payload accepted");
            assert!(core::str::from_utf8(data).is_ok(), "accepted payload must be UTF-8");
        }
        Decoded::Rejected(error) => {
            // Every rejection maps to a reply the device can publish.
            let reply = Response::for_error(&error);
            assert!(matches!(reply, Response::InvalidState | Response::NotValidJson));
        }
    }
});
