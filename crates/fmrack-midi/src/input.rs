//! MIDI input handling
//!
//! Receives raw MIDI bytes from the midir callback and feeds them straight
//! into a `MessageRouter`. The callback runs on the MIDI driver thread and
//! must stay fast; the router's internal lock serializes it against every
//! other input source.

use crate::connection::{MidiConnectionError, MidiPorts};
use crate::router::MessageRouter;
use midir::MidiInputConnection;
use std::sync::Arc;

/// Callback data passed to midir
struct CallbackData {
    router: Arc<MessageRouter>,
    cable: u8,
}

/// MIDI input handler
///
/// Owns the midir connection and keeps it alive for the duration.
pub struct MidiInputHandler {
    _connection: MidiInputConnection<CallbackData>,
}

impl MidiInputHandler {
    /// Connect to the first input port matching `port_match` and route its
    /// traffic into `router`, tagged with `cable`.
    pub fn connect(
        port_match: &str,
        router: Arc<MessageRouter>,
        cable: u8,
    ) -> Result<Self, MidiConnectionError> {
        let (midi_in, port) = MidiPorts::find_input_port(port_match)?;

        let callback_data = CallbackData { router, cable };

        let connection = midi_in
            .connect(&port, "fmrack-midi-input", Self::midi_callback, callback_data)
            .map_err(|e| MidiConnectionError::ConnectionError(e.to_string()))?;

        log::info!("MIDI: Input handler connected (cable {})", cable);

        Ok(Self {
            _connection: connection,
        })
    }

    /// The midir callback function
    ///
    /// Called from the MIDI driver thread whenever a message is received.
    /// Messages arrive fully framed; running status is expanded by the
    /// driver before we see the bytes.
    fn midi_callback(_timestamp: u64, data: &[u8], callback_data: &mut CallbackData) {
        callback_data.router.handle(data, callback_data.cable);
    }
}
