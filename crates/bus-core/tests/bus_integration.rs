//! Multi-endpoint scenarios that don't fit naturally as unit tests
//! next to a single module: broadcast fan-out across three endpoints,
//! fragmentation of an oversized payload, ring-full back-pressure, and
//! `wait_for` timeout expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bus_codec::Value;
use bus_core::endpoint::{Callback, CallbackDescriptor};
use bus_core::{Bus, BusConfig, Dispatcher};
use bus_schema::{Catalog, Event, EventArg};

fn catalog() -> Arc<Catalog> {
    Arc::new(
        Catalog::from_events(vec![
            Event::new(
                "players.joined",
                1,
                vec![
                    EventArg::new("timestamp", "datetime", 1),
                    EventArg::new("player", "string", 2),
                ],
                "None",
            ),
            Event::new(
                "players.list",
                2,
                vec![EventArg::new("blob", "string", 1)],
                "string",
            ),
        ])
        .unwrap(),
    )
}

fn pump(dispatcher: Arc<Dispatcher>, iterations: u32) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for _ in 0..iterations {
            dispatcher.tick();
            std::thread::sleep(Duration::from_millis(2));
        }
    })
}

#[test]
fn broadcast_reaches_every_other_endpoint_but_not_the_source() {
    let dispatcher = Arc::new(Dispatcher::new(BusConfig::default()));
    let catalog = catalog();

    let a = Arc::new(Bus::new(dispatcher.get_bus_data("a").unwrap(), catalog.clone()));
    let b = Arc::new(Bus::new(dispatcher.get_bus_data("b").unwrap(), catalog.clone()));
    let c = Arc::new(Bus::new(dispatcher.get_bus_data("c").unwrap(), catalog.clone()));

    let pump_handle = pump(dispatcher.clone(), 200);
    a.start();
    b.start();
    c.start();

    let event = catalog.lookup_by_name("players.joined").unwrap();
    let received_b: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let received_c: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));

    for (bus, sink) in [(&b, received_b.clone()), (&c, received_c.clone())] {
        let sink = sink.clone();
        let callback: Callback = Arc::new(move |args: &HashMap<String, Value>| {
            if let Some(Value::Str(player)) = args.get("player") {
                sink.lock().unwrap().push(player.clone());
            }
            None
        });
        let descriptor = CallbackDescriptor::new(
            callback,
            vec![
                ("timestamp".to_string(), "datetime".to_string()),
                ("player".to_string(), "string".to_string()),
            ],
            "None",
        );
        bus.register(&event, descriptor).unwrap();
    }

    let mut kwargs = HashMap::new();
    kwargs.insert("player".to_string(), Value::Str("steve".to_string()));
    a.trigger(&event, kwargs, None).unwrap();

    std::thread::sleep(Duration::from_millis(300));

    a.stop();
    b.stop();
    c.stop();
    pump_handle.join().unwrap();

    assert_eq!(received_b.lock().unwrap().as_slice(), ["steve"]);
    assert_eq!(received_c.lock().unwrap().as_slice(), ["steve"]);
}

#[test]
fn oversized_payload_is_fragmented_and_reassembled() {
    let config = BusConfig {
        memory_size: 32,
        max_frame_length: 64,
        known_endpoints: Vec::new(),
    };
    let dispatcher = Arc::new(Dispatcher::new(config));
    let catalog = catalog();

    let sender = Arc::new(Bus::new(dispatcher.get_bus_data("sender").unwrap(), catalog.clone()));
    let receiver = Arc::new(Bus::new(dispatcher.get_bus_data("receiver").unwrap(), catalog.clone()));

    let pump_handle = pump(dispatcher.clone(), 400);
    sender.start();
    receiver.start();

    let event = catalog.lookup_by_name("players.list").unwrap();
    let big_payload = "x".repeat(250);
    let received: Arc<std::sync::Mutex<Option<String>>> = Arc::new(std::sync::Mutex::new(None));
    let received_for_callback = received.clone();
    let callback: Callback = Arc::new(move |args: &HashMap<String, Value>| {
        if let Some(Value::Str(blob)) = args.get("blob") {
            *received_for_callback.lock().unwrap() = Some(blob.clone());
        }
        Some(Value::Str("ack".to_string()))
    });
    let descriptor = CallbackDescriptor::new(
        callback,
        vec![("blob".to_string(), "string".to_string())],
        "string",
    );
    receiver.register(&event, descriptor).unwrap();

    let mut kwargs = HashMap::new();
    kwargs.insert("blob".to_string(), Value::Str(big_payload.clone()));
    let result = sender.trigger(&event, kwargs, Some(Duration::from_secs(2))).unwrap();

    sender.stop();
    receiver.stop();
    pump_handle.join().unwrap();

    assert_eq!(result, Some(Value::Str("ack".to_string())));
    assert_eq!(received.lock().unwrap().as_deref(), Some(big_payload.as_str()));
}

#[test]
fn ring_full_drops_forwarding_to_a_saturated_peer_without_blocking_others() {
    let config = BusConfig {
        memory_size: 2,
        max_frame_length: 256,
        known_endpoints: Vec::new(),
    };
    let dispatcher = Dispatcher::new(config);
    let catalog = catalog();

    let source = dispatcher.get_bus_data("source").unwrap();
    let slow_peer = dispatcher.get_bus_data("slow").unwrap();
    let healthy_peer = dispatcher.get_bus_data("healthy").unwrap();

    // Saturate the slow peer's read ring directly so the next forward
    // hits RingFull for it but must still reach the healthy peer.
    slow_peer.read_ring.lock().push("filler-one").unwrap();
    slow_peer.read_ring.lock().push("filler-two").unwrap();

    let sender = Bus::new(source, catalog.clone());
    let event = catalog.lookup_by_name("players.joined").unwrap();
    let mut kwargs = HashMap::new();
    kwargs.insert("player".to_string(), Value::Str("alex".to_string()));
    sender.trigger(&event, kwargs, None).unwrap();

    dispatcher.tick();

    assert_eq!(slow_peer.read_ring.lock().peek(0), Some("filler-one".to_string()));
    assert!(healthy_peer.read_ring.lock().peek(0).is_some());
}

#[test]
fn wait_for_expires_with_no_response_and_leaves_no_dangling_subscriber() {
    let dispatcher = Dispatcher::new(BusConfig::default());
    let catalog = catalog();
    let bus = Bus::new(dispatcher.get_bus_data("lonely").unwrap(), catalog.clone());

    let event = catalog.lookup_by_name("players.list").unwrap();
    let start = std::time::Instant::now();
    let result = bus.wait_for(&event, Some(Duration::from_millis(100)));
    assert_eq!(result, None);
    assert!(start.elapsed() >= Duration::from_millis(90));
}
