//! Boot phase: manifest loading, pin initialisation and config retry.

use super::mock_hw::{manifest_json, HwCall, LogSink, MockHardware, MockManifest};

use pinlink::app::commands::PinLevel;
use pinlink::app::events::AppEvent;
use pinlink::app::ports::ConfigError;
use pinlink::app::service::{GatewayService, Phase};
use pinlink::error::Error;
use pinlink::pin_table::SkipReason;
use pinlink::pins::Board;

#[test]
fn valid_manifest_enters_attaching() {
    let mut service = GatewayService::new(Board::Esp32DevKit);
    let mut source = MockManifest::ok(manifest_json());
    let mut hw = MockHardware::new();
    let mut sink = LogSink::new();

    assert!(service.boot(0, &mut source, &mut hw, &mut sink));
    assert_eq!(service.phase(), Phase::Attaching);
    assert_eq!(service.pins().len(), 2);
    assert_eq!(service.pins().get("lamp").map(|p| p.identifier), Some(5));
    assert_eq!(service.pins().get("fan").map(|p| p.identifier), Some(13));
    assert!(sink.events.contains(&AppEvent::ManifestLoaded { pins: 2, skipped: 0 }));
}

#[test]
fn declared_pins_start_low() {
    let mut service = GatewayService::new(Board::Esp32DevKit);
    let mut hw = MockHardware::new();
    service.boot(0, &mut MockManifest::ok(manifest_json()), &mut hw, &mut LogSink::new());

    assert_eq!(
        hw.calls,
        vec![
            HwCall::Configure(5),
            HwCall::Write(5, PinLevel::Low),
            HwCall::Configure(13),
            HwCall::Write(13, PinLevel::Low),
        ]
    );
}

#[test]
fn missing_manifest_pulses_three_times_and_stays_booting() {
    let mut service = GatewayService::new(Board::Esp32DevKit);
    let mut source = MockManifest::sequence(vec![Err(ConfigError::NotFound)]);
    let mut hw = MockHardware::new();
    let mut sink = LogSink::new();

    assert!(!service.boot(0, &mut source, &mut hw, &mut sink));
    assert_eq!(service.phase(), Phase::Booting);
    assert_eq!(hw.pulses(), vec![3]);
    assert!(sink.events.contains(&AppEvent::Failure {
        error: Error::ConfigLoad(ConfigError::NotFound),
        attempt: 1,
    }));
}

#[test]
fn config_retry_waits_for_fixed_delay() {
    let mut service = GatewayService::new(Board::Esp32DevKit);
    let mut source = MockManifest::sequence(vec![Err(ConfigError::Io), Ok(manifest_json())]);
    let mut hw = MockHardware::new();
    let mut sink = LogSink::new();

    assert!(!service.boot(0, &mut source, &mut hw, &mut sink));
    assert!(!service.boot(1_999, &mut source, &mut hw, &mut sink));
    assert_eq!(source.reads, 1, "no read before the retry delay elapses");

    assert!(service.boot(2_000, &mut source, &mut hw, &mut sink));
    assert_eq!(source.reads, 2);
    assert_eq!(service.stats().boot_attempts, 2);
}

#[test]
fn malformed_manifest_is_a_parse_failure() {
    let mut service = GatewayService::new(Board::Esp32DevKit);
    let mut source = MockManifest::ok("{ \"wifi\": ");
    let mut hw = MockHardware::new();
    let mut sink = LogSink::new();

    assert!(!service.boot(0, &mut source, &mut hw, &mut sink));
    let parse_failures = sink.count(|e| {
        matches!(e, AppEvent::Failure { error: Error::ConfigParse(ConfigError::Parse { .. }), .. })
    });
    assert_eq!(parse_failures, 1);
    assert_eq!(hw.pulses(), vec![3]);
}

#[test]
fn unresolvable_bindings_are_skipped_not_fatal() {
    let text = manifest_json().replace("\"GPIO13\"", "\"GPIO99\"");
    let mut service = GatewayService::new(Board::Esp32DevKit);
    let mut sink = LogSink::new();

    assert!(service.boot(0, &mut MockManifest::ok(text), &mut MockHardware::new(), &mut sink));
    assert_eq!(service.pins().len(), 1);
    let skipped: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::PinSkipped(skip) => Some(skip.reason),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec![SkipReason::OutOfRange(99)]);
}

#[test]
fn mistyped_binding_entries_do_not_block_boot() {
    let text = manifest_json().replace(
        r#"{ "name": "fan", "pin": "GPIO13", "type": "OUTPUT" }"#,
        r#"{ "name": "ghost", "pin": null }, { "name": "neg", "pin": -1 }, { "pin": "D2" },
           { "name": "flash", "pin": 6 }, { "name": "fan", "pin": "GPIO13", "type": "OUTPUT" }"#,
    );
    let mut service = GatewayService::new(Board::Esp32DevKit);
    let mut hw = MockHardware::new();
    let mut sink = LogSink::new();

    assert!(service.boot(0, &mut MockManifest::ok(text), &mut hw, &mut sink));
    assert_eq!(service.phase(), Phase::Attaching);
    assert_eq!(service.pins().len(), 2);
    assert!(service.pins().contains(5) && service.pins().contains(13));
    assert_eq!(hw.writes(), vec![(5, PinLevel::Low), (13, PinLevel::Low)]);

    let skipped: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::PinSkipped(skip) => Some(skip.reason),
            _ => None,
        })
        .collect();
    assert_eq!(
        skipped,
        vec![
            SkipReason::UnknownPin,
            SkipReason::UnknownPin,
            SkipReason::MissingName,
            SkipReason::NotOutputCapable(6),
        ]
    );
    assert!(hw.pulses().is_empty());
}

#[test]
fn boot_after_success_is_a_no_op() {
    let mut service = GatewayService::new(Board::Esp32DevKit);
    let mut source = MockManifest::ok(manifest_json());
    let mut hw = MockHardware::new();
    let mut sink = LogSink::new();

    service.boot(0, &mut source, &mut hw, &mut sink);
    assert!(service.boot(5_000, &mut source, &mut hw, &mut sink));
    assert_eq!(source.reads, 1);
}
