//! Collaborator seams
//!
//! The engine drives the synthesizer and the user interface exclusively
//! through these traits; nothing in this crate performs synthesis, file
//! I/O or rendering.

use crate::channel_map::MidiChannel;
use crate::nrpn::{GlobalParam, OperatorParam};
use crate::sysex::FunctionParam;
use crate::VOICE_DUMP_LEN;

/// Capability set the router consumes from the synthesizer.
///
/// `tg` is always a tone generator index below `TONE_GENERATORS`.
/// Implementations are called with the router lock held: they must not
/// block indefinitely and must not call back into the router.
pub trait Synthesizer: Send + Sync {
    // Notes
    fn key_down(&self, tg: usize, note: u8, velocity: u8);
    fn key_up(&self, tg: usize, note: u8);

    // Continuous controllers
    fn set_aftertouch(&self, tg: usize, value: u8);
    fn set_mod_wheel(&self, tg: usize, value: u8);
    fn set_foot_controller(&self, tg: usize, value: u8);
    fn set_breath_controller(&self, tg: usize, value: u8);
    fn set_volume(&self, tg: usize, value: u8);
    fn set_pan(&self, tg: usize, value: u8);
    fn bank_select_msb(&self, tg: usize, value: u8);
    fn bank_select_lsb(&self, tg: usize, value: u8);
    fn set_sustain(&self, tg: usize, on: bool);
    /// Value already rescaled to 0-99.
    fn set_resonance(&self, tg: usize, value: u8);
    /// Value already rescaled to 0-99.
    fn set_cutoff(&self, tg: usize, value: u8);
    /// Value already rescaled to 0-99.
    fn set_reverb_send(&self, tg: usize, value: u8);
    /// Value already rescaled to -99..=99; 0 means no detune.
    fn set_master_tune(&self, tg: usize, value: i16);
    fn panic(&self, tg: usize, value: u8);
    fn notes_off(&self, tg: usize, value: u8);
    fn program_change(&self, tg: usize, program: u8);
    /// Centered pitch bend, -8192..=8191.
    fn set_pitch_bend(&self, tg: usize, value: i16);
    /// Re-apply controller state after a controller source changed.
    fn controllers_refresh(&self, tg: usize);

    // Instrument-wide
    fn set_master_volume(&self, volume: f32);

    // Performances
    /// Channel dedicated to performance selection, or `Disabled`.
    fn performance_select_channel(&self) -> MidiChannel;
    /// Switch the whole instrument to another performance.
    fn program_change_performance(&self, program: u8);

    // Parameter tables
    fn set_function_param(&self, tg: usize, param: FunctionParam, value: u8);
    /// `op` is an operator index 0-5; `value` is already rescaled.
    fn set_operator_param(&self, tg: usize, op: u8, param: OperatorParam, value: u8);
    /// `value` is already rescaled.
    fn set_global_param(&self, tg: usize, param: GlobalParam, value: u8);

    // SysEx support
    /// Classify a raw SysEx buffer. See `SysExOutcome::from_code` for the
    /// partitioning of the returned code.
    fn classify_sysex(&self, tg: usize, message: &[u8]) -> i16;
    /// Load a complete voice block from a validated bulk upload.
    fn load_voice(&self, tg: usize, message: &[u8]);
    /// Set one element of the unpacked voice data by index.
    fn set_voice_data_element(&self, tg: usize, index: u16, value: u8);
    /// Produce the canonical single-voice SysEx dump.
    fn voice_dump(&self, tg: usize) -> [u8; VOICE_DUMP_LEN];
}

/// Raw channel-voice activity sink for the user interface.
///
/// Notified for every Note On, Note Off and Control Change regardless of
/// whether any tone generator is mapped to the channel, so the interface
/// can reflect all incoming traffic.
pub trait UiListener: Send + Sync {
    /// `kind` is the status byte with the channel nibble cleared.
    fn midi_activity(&self, channel: u8, kind: u8, data1: u8, data2: u8);
}
