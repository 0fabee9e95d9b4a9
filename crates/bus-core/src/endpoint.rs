//! `Bus`: the local endpoint API — `register`/`unregister`/`trigger`/
//! `wait_for`/`start`/`stop` — built on a [`crate::dispatcher::BusData`]
//! ring pair and a [`bus_schema::Catalog`].

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bus_codec::{fragment, types_equal, RoutingPrefix, Value};
use bus_schema::{decode_event, encode_event, Catalog, Event};
use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};

use crate::dispatcher::BusData;
use crate::error::BusError;

/// A subscribed callback: given the triggering event's named
/// arguments, returns `Some(value)` to reply (only meaningful for
/// events with a return type) or `None` to let other subscribers take
/// a turn.
pub type Callback = Arc<dyn Fn(&HashMap<String, Value>) -> Option<Value> + Send + Sync>;

/// A callback plus the signature it was written against. Rust has no
/// runtime reflection over closures, so callers declare the argument
/// and return types they expect; [`Bus::register`] checks them against
/// the event's schema before accepting the subscription.
#[derive(Clone)]
pub struct CallbackDescriptor {
    pub callback: Callback,
    pub declared_args: Vec<(String, String)>,
    pub declared_return_type: String,
}

impl CallbackDescriptor {
    pub fn new(
        callback: Callback,
        declared_args: Vec<(String, String)>,
        declared_return_type: impl Into<String>,
    ) -> Self {
        CallbackDescriptor {
            callback,
            declared_args,
            declared_return_type: declared_return_type.into(),
        }
    }
}

struct Shared {
    data: BusData,
    catalog: Arc<Catalog>,
    subscribers: Mutex<HashMap<u32, Vec<CallbackDescriptor>>>,
    listening: AtomicBool,
    message_counter: AtomicU8,
}

/// A process's handle onto the bus: one ring pair plus the local
/// bookkeeping (subscribers, listener thread) needed to use it.
pub struct Bus {
    shared: Arc<Shared>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Bus {
    pub fn new(data: BusData, catalog: Arc<Catalog>) -> Self {
        Bus {
            shared: Arc::new(Shared {
                data,
                catalog,
                subscribers: Mutex::new(HashMap::new()),
                listening: AtomicBool::new(false),
                message_counter: AtomicU8::new(0),
            }),
            listener: Mutex::new(None),
        }
    }

    /// Attaches to an already-running dispatcher's rings for `key` by
    /// name, for a module process that did not create the dispatcher
    /// itself. `instance_id` is [`crate::dispatcher::Dispatcher::instance_id`]
    /// of the running dispatcher, published out of band (config file,
    /// environment variable, or similar).
    pub fn attach(
        instance_id: &str,
        key: &str,
        config: crate::config::BusConfig,
        catalog: Arc<Catalog>,
    ) -> Result<Self, BusError> {
        let write_ring = crate::ring::Ring::open(
            &crate::naming::ring_os_id(instance_id, key, "write"),
            config.memory_size,
            config.max_frame_length,
        )?;
        let read_ring = crate::ring::Ring::open(
            &crate::naming::ring_os_id(instance_id, key, "read"),
            config.memory_size,
            config.max_frame_length,
        )?;
        let id_cell = crate::meta::IdCell::open(&crate::naming::ring_os_id(instance_id, key, "meta"))?;
        let data = BusData {
            key: key.to_string(),
            endpoint_id: id_cell.read(),
            write_ring: Arc::new(write_ring),
            read_ring: Arc::new(read_ring),
            config,
        };
        Ok(Bus::new(data, catalog))
    }

    pub fn endpoint_id(&self) -> u8 {
        self.shared.data.endpoint_id
    }

    /// Subscribes `descriptor.callback` to `event`, rejecting it if its
    /// declared argument or return types disagree with the schema.
    pub fn register(&self, event: &Event, descriptor: CallbackDescriptor) -> Result<(), BusError> {
        check_signature(event, &descriptor)?;
        self.shared
            .subscribers
            .lock()
            .entry(event.id)
            .or_default()
            .push(descriptor);
        Ok(())
    }

    /// Removes the first subscriber of `event` whose callback is the
    /// same `Arc` as `callback`. A no-op (with a warning) if none
    /// matches.
    pub fn unregister(&self, event: &Event, callback: &Callback) {
        let mut subscribers = self.shared.subscribers.lock();
        if let Some(list) = subscribers.get_mut(&event.id) {
            if let Some(pos) = list.iter().position(|d| Arc::ptr_eq(&d.callback, callback)) {
                list.remove(pos);
                return;
            }
        }
        warn!(event = %event.name, "unregister: no matching subscriber found");
    }

    /// Encodes, fragments, and pushes `event` with `kwargs` to the
    /// write ring. If the event declares a return type, blocks (up to
    /// `timeout`, defaulting to 5 seconds when `None`) for the
    /// correlated response and returns its `result`.
    pub fn trigger(
        &self,
        event: &Event,
        mut kwargs: HashMap<String, Value>,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>, BusError> {
        autofill_timestamp(event, &mut kwargs);
        self.send(event, 0, &kwargs)?;
        if !event.has_return() {
            return Ok(None);
        }
        let timeout = timeout.unwrap_or(Duration::from_secs(5));
        let response_event = event.response_event()?;
        Ok(self
            .wait_for(&response_event, Some(timeout))
            .and_then(|mut args| args.remove("result")))
    }

    /// Blocks until `event` is received (by this endpoint's listener)
    /// or `timeout` elapses, returning its arguments. `None` timeout
    /// waits indefinitely. Requires [`Bus::start`] to have been called.
    pub fn wait_for(&self, event: &Event, timeout: Option<Duration>) -> Option<HashMap<String, Value>> {
        let state: Arc<(Mutex<Option<HashMap<String, Value>>>, Condvar)> =
            Arc::new((Mutex::new(None), Condvar::new()));
        let state_for_callback = state.clone();
        let callback: Callback = Arc::new(move |args: &HashMap<String, Value>| {
            let (lock, cvar) = &*state_for_callback;
            *lock.lock() = Some(args.clone());
            cvar.notify_all();
            None
        });
        let descriptor = CallbackDescriptor::new(
            callback.clone(),
            event.args.iter().map(|a| (a.name.clone(), a.type_name.clone())).collect(),
            "None",
        );
        if let Err(e) = self.register(event, descriptor) {
            error!(event = %event.name, error = %e, "wait_for: could not register synthetic listener");
            return None;
        }

        let (lock, cvar) = &*state;
        let mut guard = lock.lock();
        let deadline = timeout.map(|d| Instant::now() + d);
        while guard.is_none() {
            match deadline {
                Some(dl) => {
                    let now = Instant::now();
                    if now >= dl {
                        break;
                    }
                    let wait_result = cvar.wait_for(&mut guard, dl - now);
                    if wait_result.timed_out() {
                        break;
                    }
                }
                None => cvar.wait(&mut guard),
            }
        }
        let result = guard.clone();
        drop(guard);
        self.unregister(event, &callback);
        result
    }

    fn send(&self, event: &Event, target_id: u8, kwargs: &HashMap<String, Value>) -> Result<(), BusError> {
        let payload = encode_event(event, kwargs)?;
        let max_inner = self.shared.data.config.max_inner_len();
        let pieces = fragment(&payload, max_inner);
        if pieces.len() > u8::MAX as usize {
            return Err(BusError::SignatureMismatch {
                event: event.name.clone(),
                reason: format!("encoded payload needs {} fragments, more than 255", pieces.len()),
            });
        }
        let message_id = self.shared.message_counter.fetch_add(1, Ordering::SeqCst);
        let fragment_count = pieces.len() as u8;
        let frames: Vec<String> = pieces
            .iter()
            .enumerate()
            .map(|(i, piece)| {
                let prefix = RoutingPrefix {
                    source_id: self.shared.data.endpoint_id,
                    target_id,
                    fragment_index: i as u8,
                    fragment_count,
                    message_id,
                };
                format!("{}{piece}", prefix.encode())
            })
            .collect();
        self.shared.data.write_ring.lock().push_all(&frames)?;
        Ok(())
    }

    /// Spawns the listener thread that pops frames from the read ring,
    /// reassembles them, and dispatches to subscribers. A no-op (with
    /// a warning) if already started.
    pub fn start(self: &Arc<Self>) {
        if self.shared.listening.swap(true, Ordering::SeqCst) {
            warn!(key = %self.shared.data.key, "bus already listening, ignoring start()");
            return;
        }
        let bus = self.clone();
        let handle = std::thread::Builder::new()
            .name(format!("bus-listener-{}", self.shared.data.key))
            .spawn(move || bus.listen())
            .expect("failed to spawn bus listener thread");
        *self.listener.lock() = Some(handle);
    }

    pub fn stop(&self) {
        if !self.shared.listening.swap(false, Ordering::SeqCst) {
            warn!(key = %self.shared.data.key, "bus not listening, ignoring stop()");
            return;
        }
        if let Some(handle) = self.listener.lock().take() {
            let _ = handle.join();
        }
    }

    pub fn is_listening(&self) -> bool {
        self.shared.listening.load(Ordering::SeqCst)
    }

    fn listen(self: Arc<Self>) {
        let mut reassembler = bus_codec::Reassembler::new();
        while self.shared.listening.load(Ordering::SeqCst) {
            let frame = self.shared.data.read_ring.lock().pop_front();
            let Some(frame) = frame else {
                std::thread::sleep(Duration::from_millis(5));
                continue;
            };
            let (prefix, payload) = match RoutingPrefix::decode(&frame) {
                Ok(v) => v,
                Err(e) => {
                    error!(error = %e, "dropping frame with malformed routing prefix");
                    continue;
                }
            };
            match reassembler.accept(&prefix, payload) {
                Ok(Some(full_payload)) => self.handle_payload(prefix.source_id, &full_payload),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "dropping unreassemblable fragment"),
            }
        }
    }

    fn handle_payload(self: &Arc<Self>, source_id: u8, payload: &str) {
        let (event, args) = match decode_event(&self.shared.catalog, payload) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "dropping undecodable event payload");
                return;
            }
        };
        let subscribers = self.shared.subscribers.lock().get(&event.id).cloned();
        let Some(subscribers) = subscribers.filter(|s| !s.is_empty()) else {
            debug!(event = %event.name, "no subscribers, dropping");
            return;
        };
        let bus = self.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("bus-callback-{}", event.name))
            .spawn(move || bus.exec_callbacks(event, source_id, args, subscribers));
        if let Err(e) = spawned {
            error!(error = %e, "failed to spawn callback worker thread");
        }
    }

    fn exec_callbacks(
        &self,
        event: Event,
        source_id: u8,
        args: HashMap<String, Value>,
        subscribers: Vec<CallbackDescriptor>,
    ) {
        for subscriber in subscribers {
            let args_for_call = args.clone();
            let result = catch_unwind(AssertUnwindSafe(|| (subscriber.callback)(&args_for_call)));
            let value = match result {
                Ok(value) => value,
                Err(_) => {
                    error!(event = %event.name, "subscriber callback panicked");
                    continue;
                }
            };
            let Some(value) = value else { continue };
            if !event.has_return() {
                continue;
            }
            match event.response_event() {
                Ok(response_event) => {
                    let mut reply = HashMap::new();
                    reply.insert("result".to_string(), value);
                    if let Err(e) = self.send(&response_event, source_id, &reply) {
                        error!(event = %event.name, error = %e, "failed to send response event");
                    }
                }
                Err(e) => error!(event = %event.name, error = %e, "could not derive response event"),
            }
            break;
        }
    }
}

fn autofill_timestamp(event: &Event, kwargs: &mut HashMap<String, Value>) {
    if kwargs.contains_key("timestamp") {
        return;
    }
    if event
        .args
        .iter()
        .any(|a| a.name == "timestamp" && types_equal(&a.type_name, "datetime"))
    {
        kwargs.insert("timestamp".to_string(), Value::DateTime(Utc::now()));
    }
}

fn check_signature(event: &Event, descriptor: &CallbackDescriptor) -> Result<(), BusError> {
    if descriptor.declared_args.len() != event.args.len() {
        return Err(BusError::SignatureMismatch {
            event: event.name.clone(),
            reason: format!(
                "expected {} argument(s), callback declares {}",
                event.args.len(),
                descriptor.declared_args.len()
            ),
        });
    }
    for arg in &event.args {
        let declared = descriptor
            .declared_args
            .iter()
            .find(|(name, _)| name == &arg.name)
            .ok_or_else(|| BusError::SignatureMismatch {
                event: event.name.clone(),
                reason: format!("callback does not declare argument {:?}", arg.name),
            })?;
        if !types_equal(&declared.1, &arg.type_name) {
            return Err(BusError::SignatureMismatch {
                event: event.name.clone(),
                reason: format!(
                    "argument {:?} declared as {:?}, event expects {:?}",
                    arg.name, declared.1, arg.type_name
                ),
            });
        }
    }
    if !types_equal(&descriptor.declared_return_type, &event.return_type) {
        return Err(BusError::SignatureMismatch {
            event: event.name.clone(),
            reason: format!(
                "callback declares return type {:?}, event expects {:?}",
                descriptor.declared_return_type, event.return_type
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusConfig;
    use crate::dispatcher::Dispatcher;
    use bus_schema::EventArg;

    fn two_endpoint_catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::from_events(vec![
                Event::new("server.ping", 1, vec![EventArg::new("name", "string", 1)], "string"),
                Event::new(
                    "players.joined",
                    2,
                    vec![
                        EventArg::new("timestamp", "datetime", 1),
                        EventArg::new("player", "string", 2),
                    ],
                    "None",
                ),
            ])
            .unwrap(),
        )
    }

    fn wire(dispatcher: &Dispatcher, catalog: &Arc<Catalog>, key: &str) -> Arc<Bus> {
        let data = dispatcher.get_bus_data(key).unwrap();
        Arc::new(Bus::new(data, catalog.clone()))
    }

    #[test]
    fn register_rejects_mismatched_signature() {
        let dispatcher = Dispatcher::new(BusConfig::default());
        let catalog = two_endpoint_catalog();
        let bus = wire(&dispatcher, &catalog, "a");
        let event = catalog.lookup_by_name("server.ping").unwrap();
        let descriptor = CallbackDescriptor::new(
            Arc::new(|_: &HashMap<String, Value>| None),
            vec![("name".to_string(), "int".to_string())],
            "string",
        );
        assert!(matches!(
            bus.register(&event, descriptor),
            Err(BusError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn ping_round_trip_across_two_endpoints() {
        let dispatcher = Arc::new(Dispatcher::new(BusConfig::default()));
        let catalog = two_endpoint_catalog();
        let server = wire(&dispatcher, &catalog, "server");
        let client = wire(&dispatcher, &catalog, "client");

        let dispatcher_for_loop = dispatcher.clone();
        let dispatcher_handle = std::thread::spawn(move || {
            for _ in 0..200 {
                dispatcher_for_loop.tick();
                std::thread::sleep(Duration::from_millis(2));
            }
        });

        server.start();
        client.start();

        let ping = catalog.lookup_by_name("server.ping").unwrap();
        let descriptor = CallbackDescriptor::new(
            Arc::new(|args: &HashMap<String, Value>| {
                if let Some(Value::Str(name)) = args.get("name") {
                    Some(Value::Str(format!("pong {name}")))
                } else {
                    None
                }
            }),
            vec![("name".to_string(), "string".to_string())],
            "string",
        );
        server.register(&ping, descriptor).unwrap();

        let mut kwargs = HashMap::new();
        kwargs.insert("name".to_string(), Value::Str("alice".to_string()));
        let result = client
            .trigger(&ping, kwargs, Some(Duration::from_secs(2)))
            .unwrap();
        assert_eq!(result, Some(Value::Str("pong alice".to_string())));

        server.stop();
        client.stop();
        dispatcher_handle.join().unwrap();
    }

    #[test]
    fn wait_for_times_out_when_nothing_arrives() {
        let dispatcher = Dispatcher::new(BusConfig::default());
        let catalog = two_endpoint_catalog();
        let bus = wire(&dispatcher, &catalog, "solo");
        bus.start();
        let event = catalog.lookup_by_name("players.joined").unwrap();
        let result = bus.wait_for(&event, Some(Duration::from_millis(50)));
        assert_eq!(result, None);
        bus.stop();
    }

    #[test]
    fn unregister_is_a_noop_for_unknown_callback() {
        let dispatcher = Dispatcher::new(BusConfig::default());
        let catalog = two_endpoint_catalog();
        let bus = wire(&dispatcher, &catalog, "solo2");
        let event = catalog.lookup_by_name("server.ping").unwrap();
        let callback: Callback = Arc::new(|_| None);
        bus.unregister(&event, &callback);
    }
}
