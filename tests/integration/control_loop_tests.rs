//! Attaching → Operational orchestration against recording mocks.

use super::mock_hw::{
    manifest_json, LogSink, MockChannel, MockHardware, MockLink, MockManifest, MockStatus, TOPIC,
};

use pinlink::app::commands::PinLevel;
use pinlink::app::events::AppEvent;
use pinlink::app::service::{GatewayService, Phase};
use pinlink::app::status::HttpMethod;
use pinlink::pins::Board;

struct Rig {
    service: GatewayService,
    link: MockLink,
    channel: MockChannel,
    hw: MockHardware,
    status: MockStatus,
    sink: LogSink,
}

impl Rig {
    fn booted(manifest: String) -> Self {
        let mut rig = Self {
            service: GatewayService::new(Board::Esp32DevKit),
            link: MockLink::new(),
            channel: MockChannel::new(),
            hw: MockHardware::new(),
            status: MockStatus::new(),
            sink: LogSink::new(),
        };
        assert!(rig.service.boot(0, &mut MockManifest::ok(manifest), &mut rig.hw, &mut rig.sink));
        rig.hw.clear();
        rig
    }

    fn operational() -> Self {
        let mut rig = Self::booted(manifest_json());
        rig.tick(0);
        assert_eq!(rig.service.phase(), Phase::Operational);
        rig.hw.clear();
        rig
    }

    fn tick(&mut self, now_ms: u64) {
        self.service.tick(
            now_ms,
            &mut self.link,
            &mut self.channel,
            &mut self.hw,
            &mut self.status,
            &mut self.sink,
        );
    }
}

fn restricted_manifest() -> String {
    let mut value: serde_json::Value = serde_json::from_str(&manifest_json()).unwrap();
    value["runtime"] = serde_json::json!({ "restrict_to_manifest": true });
    value.to_string()
}

// ── Attaching ─────────────────────────────────────────────────

#[test]
fn first_pass_attaches_and_connects() {
    let mut rig = Rig::booted(manifest_json());
    rig.tick(0);

    assert_eq!(rig.service.phase(), Phase::Operational);
    assert_eq!(rig.link.attach_calls, 1);
    assert_eq!(rig.link.reattach_calls, 0);
    assert_eq!(rig.channel.connects, 1);
    assert!(rig.sink.events.contains(&AppEvent::BrokerConnected));
}

#[test]
fn link_failures_pulse_twice_and_wait_for_retry_delay() {
    let mut rig = Rig::booted(manifest_json());
    rig.link.failures = 2;

    rig.tick(0);
    assert_eq!(rig.hw.pulses(), vec![2]);
    rig.tick(1_000);
    assert_eq!(rig.link.attach_calls, 1, "retry must wait for the fixed delay");
    rig.tick(2_000);
    assert_eq!(rig.hw.pulses(), vec![2, 2]);
    assert_eq!(rig.service.phase(), Phase::Attaching);

    rig.tick(4_000);
    assert_eq!(rig.link.attach_calls, 3);
    assert_eq!(rig.service.phase(), Phase::Operational);
}

#[test]
fn broker_refusal_pulses_five_times_and_retries() {
    let mut rig = Rig::booted(manifest_json());
    rig.channel.refusals = 1;

    rig.tick(0);
    assert_eq!(rig.service.phase(), Phase::Attaching);
    assert_eq!(rig.hw.pulses(), vec![5]);

    rig.tick(100);
    assert_eq!(rig.channel.connects, 1);
    assert_eq!(rig.link.attach_calls, 1, "attached link is not re-attached");

    rig.tick(2_000);
    assert_eq!(rig.channel.connects, 2);
    assert_eq!(rig.service.phase(), Phase::Operational);
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn on_command_drives_pin_high_and_replies_ok() {
    let mut rig = Rig::operational();
    rig.channel.deliver(r#"{"pin":5,"state":"ON"}"#);
    rig.tick(10);

    assert_eq!(rig.hw.writes(), vec![(5, PinLevel::High)]);
    assert_eq!(rig.channel.published, vec![(TOPIC.to_string(), "OK".to_string())]);
    assert_eq!(rig.hw.pulses(), vec![1]);
    assert_eq!(rig.service.stats().messages_handled, 1);
}

#[test]
fn off_command_drives_pin_low() {
    let mut rig = Rig::operational();
    rig.channel.deliver(r#"{"pin":13,"state":"OFF"}"#);
    rig.tick(10);

    assert_eq!(rig.hw.writes(), vec![(13, PinLevel::Low)]);
    assert_eq!(rig.channel.payloads(), vec!["OK"]);
}

#[test]
fn unknown_state_is_rejected_without_mutation() {
    let mut rig = Rig::operational();
    rig.channel.deliver(r#"{"pin":5,"state":"TOGGLE"}"#);
    rig.tick(10);

    assert!(rig.hw.writes().is_empty());
    assert_eq!(rig.channel.payloads(), vec!["Invalid state"]);
    assert_eq!(rig.hw.pulses(), vec![1]);
}

#[test]
fn unparseable_payloads_reply_not_valid_json() {
    let mut rig = Rig::operational();
    rig.channel.deliver("turn it on");
    rig.channel.deliver(r#"{"pin":5}"#);
    rig.tick(10);

    assert!(rig.hw.writes().is_empty());
    assert_eq!(rig.channel.payloads(), vec!["Not a valid JSON message", "Not a valid JSON message"]);
}

#[test]
fn own_publications_are_ignored() {
    let mut rig = Rig::operational();
    for echo in ["OK", "Invalid state", "Not a valid JSON message", "keep-alive"] {
        rig.channel.deliver(echo);
    }
    rig.tick(10);

    assert!(rig.channel.published.is_empty());
    assert!(rig.hw.pulses().is_empty());
}

#[test]
fn status_query_replies_ok() {
    let mut rig = Rig::operational();
    rig.channel.deliver("status");
    rig.tick(10);

    assert_eq!(rig.channel.payloads(), vec!["OK"]);
    assert!(rig.hw.writes().is_empty());
}

#[test]
fn input_only_and_out_of_range_pins_rejected() {
    let mut rig = Rig::operational();
    rig.channel.deliver(r#"{"pin":34,"state":"ON"}"#);
    rig.channel.deliver(r#"{"pin":40,"state":"ON"}"#);
    rig.channel.deliver(r#"{"pin":-1,"state":"ON"}"#);
    rig.tick(10);

    assert!(rig.hw.writes().is_empty());
    assert_eq!(rig.channel.payloads(), vec!["Invalid state"; 3]);
}

#[test]
fn undeclared_pins_allowed_by_default() {
    let mut rig = Rig::operational();
    rig.channel.deliver(r#"{"pin":4,"state":"ON"}"#);
    rig.tick(10);

    assert_eq!(rig.hw.writes(), vec![(4, PinLevel::High)]);
}

#[test]
fn restricted_manifest_rejects_undeclared_pins() {
    let mut rig = Rig::booted(restricted_manifest());
    rig.tick(0);
    rig.channel.deliver(r#"{"pin":4,"state":"ON"}"#);
    rig.channel.deliver(r#"{"pin":5,"state":"ON"}"#);
    rig.tick(10);

    assert_eq!(rig.hw.writes(), vec![(5, PinLevel::High)]);
    assert_eq!(rig.channel.payloads(), vec!["Invalid state", "OK"]);
}

// ── Liveness ──────────────────────────────────────────────────

#[test]
fn keepalive_published_after_interval() {
    let mut rig = Rig::operational();

    rig.tick(10_000);
    assert!(rig.channel.published.is_empty(), "slot fires only after strictly more than the interval");

    rig.tick(10_001);
    assert_eq!(rig.channel.published, vec![(TOPIC.to_string(), "keep-alive".to_string())]);
    assert_eq!(rig.service.stats().keepalives_sent, 1);

    rig.tick(15_000);
    assert_eq!(rig.channel.published.len(), 1);
}

#[test]
fn broker_drop_reconnects_at_most_once_per_pass() {
    let mut rig = Rig::operational();
    rig.channel.connected = false;
    rig.channel.refusals = 10;

    rig.tick(1_000);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::BrokerLost), 1);
    assert_eq!(rig.channel.connects, 2);

    // Broker retry and liveness slot both due: still only one attempt.
    rig.tick(10_001);
    assert_eq!(rig.channel.connects, 3);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::BrokerLost), 1);
    assert_eq!(rig.service.phase(), Phase::Operational);
}

#[test]
fn broker_recovers_on_retry() {
    let mut rig = Rig::operational();
    rig.channel.connected = false;
    rig.tick(500);

    assert!(rig.channel.connected);
    rig.channel.deliver(r#"{"pin":5,"state":"ON"}"#);
    rig.tick(510);
    assert_eq!(rig.channel.payloads(), vec!["OK"]);
}

// ── Link loss ─────────────────────────────────────────────────

#[test]
fn link_loss_returns_to_attaching_and_reattaches() {
    let mut rig = Rig::operational();
    rig.link.attached = false;

    rig.tick(100);
    assert_eq!(rig.service.phase(), Phase::Attaching);
    assert!(rig.sink.events.contains(&AppEvent::LinkLost));

    rig.tick(200);
    assert_eq!(rig.link.reattach_calls, 1);
    assert_eq!(rig.link.attach_calls, 1);
    assert_eq!(rig.channel.connects, 1, "broker session left alone");
    assert_eq!(rig.service.phase(), Phase::Operational);
}

#[test]
fn link_loss_skips_rest_of_pass() {
    let mut rig = Rig::operational();
    rig.link.attached = false;
    rig.channel.deliver(r#"{"pin":5,"state":"ON"}"#);

    rig.tick(100);
    assert!(rig.hw.writes().is_empty());
    assert_eq!(rig.channel.inbox.len(), 1);
}

// ── Status ────────────────────────────────────────────────────

#[test]
fn status_requests_served_with_one_pulse_each() {
    let mut rig = Rig::operational();
    rig.status.request(HttpMethod::Get, "/");
    rig.status.request(HttpMethod::Get, "/config");
    rig.status.request(HttpMethod::Post, "/");
    rig.tick(10);

    let replies = &rig.status.replies;
    assert_eq!(replies[0].status, 200);
    assert_eq!(replies[0].body, "Hello from pinlink-test @ 10.0.0.42");
    assert_eq!(replies[1].content_type, "application/json");
    assert!(replies[1].body.contains("\"clientID\":\"pinlink-test\""));
    assert_eq!(replies[2].status, 405);

    assert_eq!(rig.hw.pulses(), vec![1, 1, 1]);
    assert!(rig.sink.events.contains(&AppEvent::StatusServed(3)));
}

#[test]
fn status_served_while_broker_unavailable() {
    let mut rig = Rig::booted(manifest_json());
    rig.channel.refusals = 100;
    rig.tick(0);
    rig.hw.clear();

    rig.status.request(HttpMethod::Get, "/missing");
    rig.tick(100);
    assert_eq!(rig.service.phase(), Phase::Attaching);
    assert_eq!(rig.status.replies[0].status, 404);
}

#[test]
fn http_start_failure_leaves_commands_flowing() {
    let mut rig = Rig::booted(manifest_json());
    rig.status.start_failures = 1;
    rig.tick(0);

    assert_eq!(rig.service.phase(), Phase::Operational);
    assert!(!rig.status.running);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::StatusUnavailable { attempt: 1, .. })), 1);

    rig.status.request(HttpMethod::Get, "/");
    rig.channel.deliver(r#"{"pin":5,"state":"ON"}"#);
    rig.tick(10);
    assert_eq!(rig.hw.writes(), vec![(5, PinLevel::High)]);
    assert_eq!(rig.channel.payloads(), vec!["OK"]);
    assert!(rig.status.replies.is_empty());
    assert_eq!(rig.status.starts, 1, "no restart before the retry delay");

    rig.tick(2_000);
    assert!(rig.status.running);
    assert_eq!(rig.status.starts, 2);
    assert_eq!(rig.status.replies[0].status, 200);
}
