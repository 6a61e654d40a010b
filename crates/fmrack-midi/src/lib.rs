//! MIDI ingestion and dispatch engine for the fmrack FM synthesizer
//!
//! This crate provides:
//! - MIDI device connection and input handling via midir
//! - Per-tone-generator message routing with Channel/Omni/Disabled mapping
//! - An NRPN two-stage latch for incremental voice editing over CC
//! - Vendor SysEx outcome routing (function parameters, bulk uploads,
//!   incremental voice edits, voice-dump requests)
//! - MIDI-Thru forwarding between endpoints and voice-dump broadcast
//! - Bounded channel bridge for UI activity monitoring
//!
//! # Architecture
//!
//! ```text
//! MIDI device → midir callback → MessageRouter::handle()
//!                                  ├─ trace / Thru forward   (no lock)
//!                                  ├─ master volume SysEx
//!                                  ├─ UI notify / performance select
//!                                  └─ per-TG loop → Synthesizer setters
//!                                                 → NRPN commits
//!                                                 → SysEx outcomes
//!                                                 → dump broadcast
//! ```
//!
//! The midir callback is synchronous; the router's internal lock serializes
//! concurrent sources, and `ActivityFeed` bridges UI notifications to a
//! consumer thread via a bounded flume channel. The synthesizer itself
//! lives behind the `Synthesizer` trait: this crate never performs audio
//! synthesis, file I/O or transport framing.

mod activity;
mod channel_map;
mod config;
mod connection;
mod input;
pub mod message;
mod nrpn;
mod output;
mod registry;
mod router;
mod scale;
mod synth;
mod sysex;

pub use activity::{ActivityEvent, ActivityFeed};
pub use channel_map::{ChannelMap, MidiChannel};
pub use config::{default_settings_path, load_settings, save_settings, MidiSettings};
pub use connection::{MidiConnectionError, MidiPorts};
pub use input::MidiInputHandler;
pub use nrpn::{GlobalParam, NrpnCommit, NrpnLatch, OperatorParam, NRPN_PROGRAM_CHANGE};
pub use output::PortEndpoint;
pub use registry::{EndpointRegistry, MidiEndpoint};
pub use router::MessageRouter;
pub use scale::{rescale_detune, scale};
pub use synth::{Synthesizer, UiListener};
pub use sysex::{FunctionParam, SysExError, SysExOutcome, VOICE_ALGORITHM_INDEX};

use std::sync::Arc;

/// Number of tone generators in the instrument.
pub const TONE_GENERATORS: usize = 8;

/// Length of the canonical single-voice SysEx dump.
pub const VOICE_DUMP_LEN: usize = 163;

/// Device set manager
///
/// Owns the endpoint registry, one router per connected input device and
/// the midir connections that keep them alive. The synthesizer and UI
/// collaborators are shared by every router.
pub struct MidiSystem {
    synth: Arc<dyn Synthesizer>,
    ui: Arc<dyn UiListener>,
    settings: Arc<MidiSettings>,
    registry: EndpointRegistry,
    routers: Vec<Arc<MessageRouter>>,
    inputs: Vec<MidiInputHandler>,
}

impl MidiSystem {
    pub fn new(
        synth: Arc<dyn Synthesizer>,
        ui: Arc<dyn UiListener>,
        settings: MidiSettings,
    ) -> Self {
        Self {
            synth,
            ui,
            settings: Arc::new(settings),
            registry: EndpointRegistry::new(),
            routers: Vec::new(),
            inputs: Vec::new(),
        }
    }

    /// Connect a named device whose ports match `port_match`.
    ///
    /// The input side is required; the output side is best-effort and, when
    /// present, is registered under `name` so Thru and broadcasts reach it.
    /// The source cable id is the connection order.
    pub fn connect_device(
        &mut self,
        name: &str,
        port_match: &str,
    ) -> Result<Arc<MessageRouter>, MidiConnectionError> {
        let router = Arc::new(MessageRouter::new(
            name,
            self.synth.clone(),
            self.ui.clone(),
            self.settings.clone(),
            self.registry.clone(),
        ));

        let cable = self.inputs.len() as u8;
        let input = MidiInputHandler::connect(port_match, router.clone(), cable)?;

        if let Some(endpoint) = PortEndpoint::connect(port_match) {
            self.registry.register(name, endpoint);
        } else {
            log::info!("MIDI: Device '{}' has no output port, input only", name);
        }

        self.inputs.push(input);
        self.routers.push(router.clone());
        log::info!("MIDI: Device '{}' connected (cable {})", name, cable);

        Ok(router)
    }

    /// The shared endpoint registry.
    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Routers in connection order, one per device.
    pub fn routers(&self) -> &[Arc<MessageRouter>] {
        &self.routers
    }

    pub fn settings(&self) -> &MidiSettings {
        &self.settings
    }
}
