//! Physical output endpoints
//!
//! `PortEndpoint` adapts a midir output connection to the `MidiEndpoint`
//! trait so voice dumps, broadcasts and Thru traffic reach a real port.
//! Send failures stay here: they are logged and swallowed, invisible to
//! the dispatch core.

use crate::connection::MidiPorts;
use crate::registry::MidiEndpoint;
use midir::MidiOutputConnection;
use std::sync::{Arc, Mutex};

/// A registered output port.
pub struct PortEndpoint {
    connection: Mutex<MidiOutputConnection>,
}

impl PortEndpoint {
    /// Connect to the first output port matching `port_match`.
    ///
    /// Returns `None` when no port matches; the caller decides whether the
    /// device runs input-only.
    pub fn connect(port_match: &str) -> Option<Arc<Self>> {
        MidiPorts::connect_output(port_match).map(Self::new)
    }

    /// Wrap an already established output connection.
    pub fn new(connection: MidiOutputConnection) -> Arc<Self> {
        Arc::new(Self {
            connection: Mutex::new(connection),
        })
    }
}

impl MidiEndpoint for PortEndpoint {
    fn send(&self, message: &[u8], _cable: u8) {
        if let Ok(mut connection) = self.connection.lock() {
            if let Err(e) = connection.send(message) {
                log::warn!(
                    "MIDI: Failed to send {} bytes to output port: {}",
                    message.len(),
                    e
                );
            }
        }
    }
}
