//! Endpoint registry for Thru routing and voice-dump broadcast

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A transport endpoint that can accept raw MIDI bytes.
///
/// Implementations wrap a physical output port (see `output.rs`) or a
/// test double. Send failures stay inside the transport; the dispatch
/// core never sees them.
pub trait MidiEndpoint: Send + Sync {
    /// Send one fully framed MIDI message, tagged with a source cable.
    fn send(&self, message: &[u8], cable: u8);
}

/// Shared name -> endpoint table.
///
/// Created empty at startup and only ever added to. Registration is a
/// device-setup operation that completes before message handling starts;
/// the lock guards memory safety, not setup ordering.
#[derive(Clone, Default)]
pub struct EndpointRegistry {
    endpoints: Arc<RwLock<HashMap<String, Arc<dyn MidiEndpoint>>>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `endpoint` under `name`.
    ///
    /// An empty name or a second registration of the same endpoint handle
    /// is a caller bug. Re-using a name for a *different* endpoint
    /// replaces the old entry (last write wins).
    pub fn register(&self, name: &str, endpoint: Arc<dyn MidiEndpoint>) {
        assert!(!name.is_empty(), "endpoint name must not be empty");
        if let Ok(mut map) = self.endpoints.write() {
            assert!(
                !map.values().any(|existing| Arc::ptr_eq(existing, &endpoint)),
                "endpoint registered twice"
            );
            if map.insert(name.to_string(), endpoint).is_some() {
                log::debug!("MIDI: endpoint name '{}' re-registered, previous entry replaced", name);
            }
        }
    }

    /// Look up an endpoint by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn MidiEndpoint>> {
        self.endpoints
            .read()
            .ok()
            .and_then(|map| map.get(name).cloned())
    }

    /// Send `message` to every registered endpoint, the sender included.
    pub fn broadcast(&self, message: &[u8]) {
        if let Ok(map) = self.endpoints.read() {
            for endpoint in map.values() {
                endpoint.send(message, 0);
            }
        }
    }
}
