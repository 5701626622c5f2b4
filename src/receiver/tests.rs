//! End-to-end tests for the receive loop over real loopback UDP

use super::*;
use crate::store::StoreValue;
use rosc::{encoder, OscPacket, OscType};
use std::net::UdpSocket;
use std::time::Duration;

fn loopback_config(auto_add: bool) -> ReceiverConfig {
    ReceiverConfig {
        bind_address: "127.0.0.1".to_string(),
        port: 0,
        auto_add_addresses: auto_add,
    }
}

fn start_receiver(auto_add: bool) -> (OscReceiver, SocketAddr) {
    let mut receiver = OscReceiver::new();
    let addr = receiver
        .start(&loopback_config(auto_add))
        .expect("bind loopback");
    (receiver, addr)
}

fn send(target: SocketAddr, payloads: &[Vec<u8>]) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    for payload in payloads {
        socket.send_to(payload, target).unwrap();
    }
}

fn osc_message(address: &str, args: Vec<OscType>) -> Vec<u8> {
    encoder::encode(&OscPacket::Message(rosc::OscMessage {
        addr: address.to_string(),
        args,
    }))
    .unwrap()
}

fn float_message(address: &str, value: f32) -> Vec<u8> {
    osc_message(address, vec![OscType::Float(value)])
}

/// Poll until `expected` datagrams have been read (loopback delivery is
/// asynchronous), summing the per-call summaries.
fn poll_until(receiver: &mut OscReceiver, store: &mut ValueStore, expected: usize) -> PollSummary {
    let mut total = PollSummary::default();
    for _ in 0..200 {
        let summary = receiver.poll(store);
        total.received += summary.received;
        total.applied += summary.applied;
        total.created += summary.created;
        total.ignored += summary.ignored;
        total.rejected += summary.rejected;
        total.malformed += summary.malformed;
        if total.received >= expected {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    total
}

#[test]
fn test_single_float_message_creates_entry() {
    let (mut receiver, addr) = start_receiver(true);
    let mut store = ValueStore::new();

    send(addr, &[float_message("/synth/freq", 440.0)]);
    let summary = poll_until(&mut receiver, &mut store, 1);

    assert_eq!(summary.received, 1);
    assert_eq!(summary.created, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("osc_synth_freq"), Some(&StoreValue::Float(440.0)));
    assert_eq!(store.entry("osc_synth_freq").map(|e| e.enabled), Some(true));
}

#[test]
fn test_colliding_addresses_last_write_wins() {
    let (mut receiver, addr) = start_receiver(true);
    let mut store = ValueStore::new();

    send(
        addr,
        &[float_message("/Foo-Bar", 1.0), float_message("/foo_bar", 2.0)],
    );
    let summary = poll_until(&mut receiver, &mut store, 2);

    assert_eq!(summary.applied, 2);
    assert_eq!(summary.created, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("osc_foo_bar"), Some(&StoreValue::Float(2.0)));
}

#[test]
fn test_bad_datagrams_do_not_stop_the_drain() {
    let (mut receiver, addr) = start_receiver(true);
    let mut store = ValueStore::new();

    let mut bundle = b"#bundle\0".to_vec();
    bundle.extend_from_slice(&[0u8; 8]);

    send(
        addr,
        &[
            b"/unterminated".to_vec(),
            bundle,
            b"nope\0\0\0\0,f\0\0\0\0\0\0".to_vec(),
            float_message("/after", 0.5),
        ],
    );
    let summary = poll_until(&mut receiver, &mut store, 4);

    assert_eq!(summary.received, 4);
    assert_eq!(summary.malformed, 1);
    assert_eq!(summary.rejected, 2);
    assert_eq!(summary.applied, 1);
    assert_eq!(store.get("osc_after"), Some(&StoreValue::Float(0.5)));

    let stats = receiver.stats();
    assert_eq!(stats.datagrams, 4);
    assert_eq!(stats.messages, 1);
}

#[test]
fn test_auto_add_disabled_ignores_unknown() {
    let (mut receiver, addr) = start_receiver(false);
    let mut store = ValueStore::new();
    let known = store.add_address("/known");

    send(
        addr,
        &[float_message("/unknown", 1.0), float_message("/known", 3.0)],
    );
    let summary = poll_until(&mut receiver, &mut store, 2);

    assert_eq!(summary.ignored, 1);
    assert_eq!(summary.applied, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(&known), Some(&StoreValue::Float(3.0)));
}

#[test]
fn test_disabled_entry_frozen_over_the_wire() {
    let (mut receiver, addr) = start_receiver(true);
    let mut store = ValueStore::new();

    send(addr, &[float_message("/knob", 0.25)]);
    poll_until(&mut receiver, &mut store, 1);
    store.set_enabled("osc_knob", false);

    send(
        addr,
        &[
            float_message("/knob", 0.75),
            osc_message("/knob", vec![OscType::String("x".into())]),
        ],
    );
    let summary = poll_until(&mut receiver, &mut store, 2);

    assert_eq!(summary.ignored, 2);
    assert_eq!(store.get("osc_knob"), Some(&StoreValue::Float(0.25)));
}

#[test]
fn test_argumentless_message_stores_zero() {
    let (mut receiver, addr) = start_receiver(true);
    let mut store = ValueStore::new();

    send(addr, &[osc_message("/bang", vec![])]);
    poll_until(&mut receiver, &mut store, 1);

    assert_eq!(store.get("osc_bang"), Some(&StoreValue::Float(0.0)));
}

#[test]
fn test_poll_without_data_returns_immediately() {
    let (mut receiver, _addr) = start_receiver(true);
    let mut store = ValueStore::new();

    assert_eq!(receiver.poll(&mut store), PollSummary::default());
    assert!(store.is_empty());
}

#[test]
fn test_per_poll_limit() {
    let mut receiver = OscReceiver::new().with_max_datagrams_per_poll(2);
    let addr = receiver.start(&loopback_config(true)).unwrap();
    let mut store = ValueStore::new();

    let payloads: Vec<Vec<u8>> = (0..5)
        .map(|i| float_message(&format!("/ch/{}", i), i as f32))
        .collect();
    send(addr, &payloads);
    std::thread::sleep(Duration::from_millis(50));

    let first = receiver.poll(&mut store);
    assert!(first.received <= 2);

    let rest = poll_until(&mut receiver, &mut store, 5 - first.received);
    assert_eq!(first.received + rest.received, 5);
    assert_eq!(store.len(), 5);
}

#[test]
fn test_poll_while_idle_is_noop() {
    let mut receiver = OscReceiver::new();
    let mut store = ValueStore::new();

    assert_eq!(receiver.state(), ReceiverState::Idle);
    assert_eq!(receiver.poll(&mut store), PollSummary::default());
    assert_eq!(receiver.drain(|_, _| panic!("no packets while idle")), 0);
}

#[test]
fn test_state_transitions_and_idempotent_stop() {
    let mut receiver = OscReceiver::new();
    receiver.stop(); // before start

    let addr = receiver.start(&loopback_config(true)).unwrap();
    assert_eq!(receiver.state(), ReceiverState::Listening);
    assert_eq!(receiver.local_addr(), Some(addr));
    assert_eq!(receiver.config().map(|c| c.auto_add_addresses), Some(true));

    receiver.stop();
    receiver.stop();
    assert_eq!(receiver.state(), ReceiverState::Idle);
    assert!(receiver.local_addr().is_none());

    // A new session can be started after stopping
    receiver.start(&loopback_config(false)).unwrap();
    assert!(receiver.is_listening());
    assert_eq!(receiver.stats().sessions, 2);
}

#[test]
fn test_start_twice_is_rejected() {
    let (mut receiver, addr) = start_receiver(true);

    match receiver.start(&loopback_config(true)) {
        Err(ReceiverError::AlreadyListening(existing)) => assert_eq!(existing, addr),
        other => panic!("expected AlreadyListening, got {:?}", other),
    }
    assert_eq!(receiver.local_addr(), Some(addr));
}

#[test]
fn test_second_session_on_same_port_fails_to_bind() {
    let (_first, addr) = start_receiver(true);

    let mut second = OscReceiver::new();
    let config = ReceiverConfig {
        bind_address: "127.0.0.1".to_string(),
        port: addr.port(),
        auto_add_addresses: true,
    };

    let err = second.start(&config).unwrap_err();
    assert!(matches!(err, ReceiverError::Bind { .. }));
    assert_eq!(second.state(), ReceiverState::Idle);
}

#[test]
fn test_reconfigure_retries_after_failed_restart() {
    let blocker = UdpSocket::bind("127.0.0.1:0").unwrap();
    let busy_port = blocker.local_addr().unwrap().port();
    let target = ReceiverConfig {
        port: busy_port,
        ..loopback_config(true)
    };

    let (mut receiver, _) = start_receiver(true);
    let err = receiver.reconfigure(&target, 4096).unwrap_err();
    assert!(matches!(err, ReceiverError::Bind { .. }));
    assert_eq!(receiver.state(), ReceiverState::Idle);

    // Same settings again once the port is free
    drop(blocker);
    assert!(receiver.reconfigure(&target, 4096).unwrap());
    assert_eq!(receiver.local_addr().map(|a| a.port()), Some(busy_port));

    // Unchanged settings keep the running session
    assert!(!receiver.reconfigure(&target, 4096).unwrap());
    assert_eq!(receiver.stats().sessions, 2);
}

#[test]
fn test_reconfigure_applies_poll_cap() {
    let (mut receiver, addr) = start_receiver(true);
    let config = receiver.config().cloned().unwrap();
    let mut store = ValueStore::new();

    assert!(!receiver.reconfigure(&config, 1).unwrap());
    assert_eq!(receiver.max_datagrams_per_poll(), 1);
    assert!(!receiver.reconfigure(&config, 0).unwrap());
    assert_eq!(receiver.max_datagrams_per_poll(), 1);

    send(addr, &[float_message("/a", 1.0), float_message("/b", 2.0)]);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(receiver.poll(&mut store).received, 1);
}

#[test]
fn test_invalid_bind_address_fails() {
    let mut receiver = OscReceiver::new();
    let config = ReceiverConfig {
        bind_address: "not an address".to_string(),
        port: 9000,
        auto_add_addresses: true,
    };

    let err = receiver.start(&config).unwrap_err();
    assert!(err.to_string().contains("not an address:9000"));
    assert_eq!(receiver.state(), ReceiverState::Idle);
}

#[test]
fn test_drain_reports_sources() {
    let (mut receiver, addr) = start_receiver(true);
    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    sender.send_to(&float_message("/x", 1.0), addr).unwrap();

    let mut seen = Vec::new();
    for _ in 0..200 {
        receiver.drain(|source, result| seen.push((source, result)));
        if !seen.is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, sender.local_addr().unwrap());
    assert!(matches!(seen[0].1, Ok(Decoded::Message(_))));
}
