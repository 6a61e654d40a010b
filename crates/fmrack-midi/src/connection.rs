//! MIDI port discovery
//!
//! Uses midir for cross-platform MIDI I/O (ALSA on Linux, CoreMIDI on macOS,
//! WinMM on Windows). Ports are matched case-insensitively as substrings, so
//! a device name like "umidi" finds "USB umidi1 28:0".

use midir::{MidiInput, MidiInputPort, MidiOutput, MidiOutputConnection};

/// Error type for MIDI connection operations
#[derive(Debug, thiserror::Error)]
pub enum MidiConnectionError {
    #[error("Failed to initialize MIDI input: {0}")]
    InputInitError(String),

    #[error("Failed to initialize MIDI output: {0}")]
    OutputInitError(String),

    #[error("No MIDI input ports available")]
    NoInputPorts,

    #[error("No MIDI port found matching pattern: {0}")]
    PortNotFound(String),

    #[error("Failed to connect to MIDI port: {0}")]
    ConnectionError(String),

    #[error("Failed to get port info: {0}")]
    PortInfoError(String),
}

/// Port discovery entry points.
pub struct MidiPorts;

impl MidiPorts {
    /// Find the first input port matching `port_match`.
    ///
    /// Returns the `MidiInput` instance together with the port so the caller
    /// can attach its own callback (see `MidiInputHandler::connect`).
    pub fn find_input_port(
        port_match: &str,
    ) -> Result<(MidiInput, MidiInputPort), MidiConnectionError> {
        let pattern = port_match.to_lowercase();

        let midi_in = MidiInput::new("fmrack-midi-in")
            .map_err(|e| MidiConnectionError::InputInitError(e.to_string()))?;

        let in_ports = midi_in.ports();
        if in_ports.is_empty() {
            return Err(MidiConnectionError::NoInputPorts);
        }

        let input_port = in_ports
            .into_iter()
            .find(|port| {
                midi_in
                    .port_name(port)
                    .map(|name| name.to_lowercase().contains(&pattern))
                    .unwrap_or(false)
            })
            .ok_or_else(|| MidiConnectionError::PortNotFound(port_match.to_string()))?;

        let port_name = midi_in
            .port_name(&input_port)
            .map_err(|e| MidiConnectionError::PortInfoError(e.to_string()))?;

        log::info!("MIDI: Found input port: {}", port_name);

        Ok((midi_in, input_port))
    }

    /// Connect to the first output port matching `port_match`.
    ///
    /// Output is best-effort: a missing or failing port means the device
    /// just never receives dumps or Thru traffic.
    pub fn connect_output(port_match: &str) -> Option<MidiOutputConnection> {
        let pattern = port_match.to_lowercase();

        let midi_out = match MidiOutput::new("fmrack-midi-out") {
            Ok(out) => out,
            Err(e) => {
                log::warn!("MIDI: Failed to initialize output: {}", e);
                return None;
            }
        };

        let out_ports = midi_out.ports();

        let output_port = out_ports.iter().find(|port| {
            midi_out
                .port_name(port)
                .map(|name| name.to_lowercase().contains(&pattern))
                .unwrap_or(false)
        })?;

        let port_name = midi_out.port_name(output_port).ok()?;
        log::info!("MIDI: Found output port: {}", port_name);

        match midi_out.connect(output_port, "fmrack-midi-output") {
            Ok(conn) => Some(conn),
            Err(e) => {
                log::warn!("MIDI: Failed to connect to output: {}", e);
                None
            }
        }
    }

    /// List all available MIDI input ports
    pub fn list_input_ports() -> Result<Vec<String>, MidiConnectionError> {
        let midi_in = MidiInput::new("fmrack-midi-list")
            .map_err(|e| MidiConnectionError::InputInitError(e.to_string()))?;

        let ports: Vec<String> = midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect();

        Ok(ports)
    }

    /// List all available MIDI output ports
    pub fn list_output_ports() -> Result<Vec<String>, MidiConnectionError> {
        let midi_out = MidiOutput::new("fmrack-midi-list")
            .map_err(|e| MidiConnectionError::OutputInitError(e.to_string()))?;

        let ports: Vec<String> = midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect();

        Ok(ports)
    }
}
