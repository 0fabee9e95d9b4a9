//! The star-topology router: owns one write/read ring pair per
//! registered endpoint and forwards frames between them by
//! `target_id`, unicast or broadcast.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bus_codec::RoutingPrefix;
use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::config::BusConfig;
use crate::error::DispatcherError;
use crate::meta::IdCell;
use crate::naming::ring_os_id;
use crate::ring::Ring;

/// The per-endpoint handle returned by [`Dispatcher::get_bus_data`]:
/// everything [`crate::endpoint::Bus`] needs to read and write its
/// rings.
#[derive(Clone)]
pub struct BusData {
    pub key: String,
    pub endpoint_id: u8,
    pub write_ring: Arc<Ring>,
    pub read_ring: Arc<Ring>,
    pub config: BusConfig,
}

#[derive(Clone)]
struct EndpointRecord {
    key: String,
    endpoint_id: u8,
    write_ring: Arc<Ring>,
    read_ring: Arc<Ring>,
}

/// Owns the shared memory backing every endpoint's rings and routes
/// frames between them. Exactly one dispatcher exists per bus; it is
/// created once by the host process (`services/bus-daemon`) and run
/// on its own thread via [`Dispatcher::mainloop`].
pub struct Dispatcher {
    instance_id: String,
    config: BusConfig,
    endpoints: Mutex<Vec<EndpointRecord>>,
    running: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(config: BusConfig) -> Self {
        let instance_id: String = {
            let mut rng = rand::rng();
            (0..8).map(|_| char::from_digit(rng.random_range(0..16), 16).unwrap()).collect()
        };
        Dispatcher {
            instance_id,
            config,
            endpoints: Mutex::new(Vec::new()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The id a module process needs to pass to [`crate::endpoint::Bus::attach`]
    /// in order to find this dispatcher's shared memory segments.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Allocates (or returns the existing) ring pair for `key`,
    /// assigning a random `endpoint_id` in `1..=255` on first
    /// registration. Stable for the dispatcher's lifetime.
    pub fn get_bus_data(&self, key: &str) -> Result<BusData, DispatcherError> {
        let mut endpoints = self.endpoints.lock();
        if let Some(existing) = endpoints.iter().find(|e| e.key == key) {
            return Ok(BusData {
                key: existing.key.clone(),
                endpoint_id: existing.endpoint_id,
                write_ring: existing.write_ring.clone(),
                read_ring: existing.read_ring.clone(),
                config: self.config.clone(),
            });
        }

        let endpoint_id = self.assign_id(&endpoints)?;
        let write_ring = Ring::create(
            &ring_os_id(&self.instance_id, key, "write"),
            self.config.memory_size,
            self.config.max_frame_length,
        )?;
        let read_ring = Ring::create(
            &ring_os_id(&self.instance_id, key, "read"),
            self.config.memory_size,
            self.config.max_frame_length,
        )?;
        IdCell::create(&ring_os_id(&self.instance_id, key, "meta"), endpoint_id)?;

        let record = EndpointRecord {
            key: key.to_string(),
            endpoint_id,
            write_ring: Arc::new(write_ring),
            read_ring: Arc::new(read_ring),
        };
        let data = BusData {
            key: record.key.clone(),
            endpoint_id: record.endpoint_id,
            write_ring: record.write_ring.clone(),
            read_ring: record.read_ring.clone(),
            config: self.config.clone(),
        };
        info!(key, endpoint_id, "registered bus endpoint");
        endpoints.push(record);
        Ok(data)
    }

    fn assign_id(&self, existing: &[EndpointRecord]) -> Result<u8, DispatcherError> {
        const ATTEMPTS: u32 = 512;
        let mut rng = rand::rng();
        for _ in 0..ATTEMPTS {
            let candidate = rng.random_range(1..=255u8);
            if !existing.iter().any(|e| e.endpoint_id == candidate) {
                return Ok(candidate);
            }
        }
        Err(DispatcherError::IdSpaceExhausted(ATTEMPTS))
    }

    /// Releases the shared memory for `key`.
    pub fn release(&self, key: &str) -> Result<(), DispatcherError> {
        let mut endpoints = self.endpoints.lock();
        let index = endpoints
            .iter()
            .position(|e| e.key == key)
            .ok_or_else(|| DispatcherError::UnknownKey(key.to_string()))?;
        endpoints.remove(index);
        Ok(())
    }

    /// Releases every endpoint's shared memory.
    pub fn release_all(&self) {
        self.endpoints.lock().clear();
    }

    /// Runs the forwarding loop until [`Dispatcher::stop`] is called.
    /// Intended to be run on its own thread.
    pub fn mainloop(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!("dispatcher mainloop started");
        while self.running.load(Ordering::SeqCst) {
            self.tick();
            std::thread::sleep(Duration::from_millis(10));
        }
        info!("dispatcher mainloop stopped");
    }

    /// Runs one forwarding pass over every registered endpoint. Exposed
    /// publicly as the building block [`Dispatcher::mainloop`] is built
    /// from, for callers that want to drive the loop themselves (tests,
    /// or an embedding process with its own scheduler).
    pub fn tick(&self) {
        let snapshot: Vec<EndpointRecord> = self.endpoints.lock().clone();
        for source in &snapshot {
            let candidate = source.write_ring.lock().peek(0);
            let Some(frame) = candidate else { continue };
            match RoutingPrefix::decode(&frame) {
                Ok((prefix, _)) => {
                    for peer in &snapshot {
                        if peer.key == source.key {
                            continue;
                        }
                        if prefix.target_id != 0 && prefix.target_id != peer.endpoint_id {
                            continue;
                        }
                        if peer.read_ring.lock().push(&frame).is_err() {
                            warn!(
                                peer = %peer.key,
                                source = %source.key,
                                "slot saturation, dropping frame for peer"
                            );
                        }
                    }
                }
                Err(e) => error!(source = %source.key, error = %e, "malformed routing prefix, dropping frame"),
            }
            debug!(source = %source.key, "forwarded outgoing frame");
            source.write_ring.lock().pop_front();
        }
    }

    /// Stops the main loop. The current iteration finishes; already
    /// forwarded frames are not rolled back, and frames still pending
    /// in a write ring are not guaranteed to be drained.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_stable_ids_and_reuses_existing_key() {
        let dispatcher = Dispatcher::new(BusConfig::default());
        let a = dispatcher.get_bus_data("alpha").unwrap();
        let a_again = dispatcher.get_bus_data("alpha").unwrap();
        assert_eq!(a.endpoint_id, a_again.endpoint_id);
        assert_ne!(a.endpoint_id, 0);

        let b = dispatcher.get_bus_data("beta").unwrap();
        assert_ne!(a.endpoint_id, b.endpoint_id);
    }

    #[test]
    fn forwards_unicast_and_broadcast() {
        let dispatcher = Dispatcher::new(BusConfig::default());
        let a = dispatcher.get_bus_data("a").unwrap();
        let b = dispatcher.get_bus_data("b").unwrap();
        let c = dispatcher.get_bus_data("c").unwrap();

        let unicast = RoutingPrefix {
            source_id: a.endpoint_id,
            target_id: b.endpoint_id,
            fragment_index: 0,
            fragment_count: 1,
            message_id: 1,
        };
        a.write_ring.lock().push(&format!("{}payload", unicast.encode())).unwrap();
        dispatcher.tick();
        assert_eq!(b.read_ring.lock().peek(0).unwrap().ends_with("payload"), true);
        assert_eq!(c.read_ring.lock().peek(0), None);
        assert_eq!(a.write_ring.lock().peek(0), None);
    }

    #[test]
    fn broadcast_excludes_source() {
        let dispatcher = Dispatcher::new(BusConfig::default());
        let a = dispatcher.get_bus_data("a").unwrap();
        let b = dispatcher.get_bus_data("b").unwrap();

        let broadcast = RoutingPrefix {
            source_id: a.endpoint_id,
            target_id: 0,
            fragment_index: 0,
            fragment_count: 1,
            message_id: 7,
        };
        a.write_ring.lock().push(&format!("{}hi", broadcast.encode())).unwrap();
        dispatcher.tick();
        assert!(b.read_ring.lock().peek(0).is_some());
        assert_eq!(a.read_ring.lock().peek(0), None);
    }
}
