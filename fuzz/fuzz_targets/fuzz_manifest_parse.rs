//! Fuzz target: `ConfigStore::parse` + `PinTable::resolve`
//!
//! Feeds arbitrary text to the manifest parser.  Anything it accepts must
//! resolve into a pin table within capacity and re-serialise to JSON that
//! parses back to the same manifest.
//!
//! cargo fuzz run fuzz_manifest_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use pinlink::config::ConfigStore;
use pinlink::pin_table::{PinTable, MAX_PINS};
use pinlink::pins::Board;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(store) = ConfigStore::parse(text) else {
        return;
    };

    for board in [Board::Esp32DevKit, Board::NodeMcuStyle] {
        let (table, skipped) = PinTable::resolve(store.devices(), board);
        assert!(table.len() <= MAX_PINS);
        assert_eq!(table.len() + skipped.len(), store.devices().len());
    }

    let json = store.to_json();
    if let Ok(again) = ConfigStore::parse(&json) {
        assert_eq!(again.manifest(), store.manifest());
    }
});
