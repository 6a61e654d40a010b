//! Message routing and per-tone-generator dispatch
//!
//! One router exists per input endpoint. `handle` receives fully framed
//! messages (from a midir callback or from tests) and drives the
//! synthesizer, the UI listener and the endpoint registry:
//!
//! ```text
//! transport -> handle() -> trace / Thru forward      (before the lock)
//!                       -> master volume SysEx
//!                       -> UI notify / performance select
//!                       -> per-TG loop -> note, CC, PC, bend setters
//!                                      -> NRPN commits
//!                                      -> SysEx outcomes -> dump broadcast
//! ```
//!
//! Everything below the short-message drop runs under one mutex, so
//! concurrent sources serialize their mutations of the channel map, the
//! NRPN latches and the synthesizer. Thru and the diagnostic trace stay
//! outside the lock: message bytes are immutable once framed and
//! forwarding mutates nothing local.

use crate::channel_map::{ChannelMap, MidiChannel};
use crate::config::MidiSettings;
use crate::message;
use crate::nrpn::{NrpnCommit, NrpnLatch};
use crate::registry::EndpointRegistry;
use crate::scale::{rescale_detune, scale};
use crate::synth::{Synthesizer, UiListener};
use crate::sysex::{SysExOutcome, VOICE_ALGORITHM_INDEX};
use crate::TONE_GENERATORS;
use std::sync::{Arc, Mutex};

/// State mutated under the router lock.
struct RouterState {
    channels: ChannelMap,
    nrpn: [NrpnLatch; TONE_GENERATORS],
}

/// Per-endpoint message router.
pub struct MessageRouter {
    name: String,
    synth: Arc<dyn Synthesizer>,
    ui: Arc<dyn UiListener>,
    settings: Arc<MidiSettings>,
    registry: EndpointRegistry,
    state: Mutex<RouterState>,
}

impl MessageRouter {
    pub fn new(
        name: impl Into<String>,
        synth: Arc<dyn Synthesizer>,
        ui: Arc<dyn UiListener>,
        settings: Arc<MidiSettings>,
        registry: EndpointRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            synth,
            ui,
            settings,
            registry,
            state: Mutex::new(RouterState {
                channels: ChannelMap::new(),
                nrpn: [NrpnLatch::new(); TONE_GENERATORS],
            }),
        }
    }

    /// This router's endpoint name, used for Thru matching.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assign a MIDI channel to a tone generator.
    pub fn set_channel(&self, tg: usize, channel: MidiChannel) {
        if let Ok(mut state) = self.state.lock() {
            state.channels.set(tg, channel);
        }
    }

    /// Current channel assignment for a tone generator.
    pub fn channel(&self, tg: usize) -> MidiChannel {
        self.state
            .lock()
            .map(|state| state.channels.get(tg))
            .unwrap_or(MidiChannel::Disabled)
    }

    /// Handle one framed MIDI message arriving from `cable`.
    pub fn handle(&self, message: &[u8], cable: u8) {
        if self.settings.dump_enabled {
            message::trace_message(message, cable);
        }

        // Thru forwards verbatim, even messages the dispatch below drops.
        if !self.settings.thru_in.is_empty() && self.name == self.settings.thru_in {
            if let Some(endpoint) = self.registry.lookup(&self.settings.thru_out) {
                endpoint.send(message, cable);
            }
        }

        if message.len() < 2 {
            return;
        }

        let Ok(mut guard) = self.state.lock() else {
            return;
        };
        let state = &mut *guard;

        if is_master_volume(message) {
            // TODO: revisit this combine before trusting it with real
            // volume data; ANDing the two 7-bit data bytes can only ever
            // produce zero, but the behavior ships as-is until the
            // intended formula is verified against hardware.
            let raw = (message[5] & 0x7c) as u32 & (((message[6] & 0x7c) as u32) << 7);
            let volume = raw as f32 / (1u32 << 14) as f32;
            log::info!("MIDI: master volume {}", volume);
            self.synth.set_master_volume(volume);
            return;
        }

        let status = message[0];
        let channel = message::status_channel(status);
        let kind = message::status_type(status);

        // Instrument-level handling before any tone generator sees the
        // message.
        match kind {
            message::NOTE_OFF | message::NOTE_ON | message::CONTROL_CHANGE => {
                if message.len() >= 3 {
                    self.ui
                        .midi_activity(channel, status & 0xF0, message[1], message[2]);
                }
            }
            message::PROGRAM_CHANGE => {
                if self.settings.program_change_enabled {
                    let perf = self.synth.performance_select_channel();
                    if perf.matches(channel) {
                        self.synth.program_change_performance(message[1]);
                    }
                }
            }
            _ => {}
        }

        for tg in 0..TONE_GENERATORS {
            if status == message::SYSEX_BEGIN {
                // SysEx addresses its target through the channel nibble of
                // the third byte.
                let Some(sysex_channel) = message.get(2).map(|byte| byte & 0x0F) else {
                    continue;
                };
                if state.channels.get(tg).matches(sysex_channel) {
                    log::debug!(
                        "MIDI: SysEx for TG {} ({} bytes, channel nibble {})",
                        tg,
                        message.len(),
                        sysex_channel
                    );
                    self.handle_system_exclusive(message, cable, tg);
                }
            } else if state.channels.get(tg).matches(channel) {
                self.dispatch_channel_voice(state, message, kind, tg);
            }
        }
    }

    fn dispatch_channel_voice(&self, state: &mut RouterState, message: &[u8], kind: u8, tg: usize) {
        match kind {
            message::NOTE_ON => {
                if message.len() < 3 {
                    return;
                }
                match message[2] {
                    0 => self.synth.key_up(tg, message[1]),
                    velocity @ 1..=127 => self.synth.key_down(tg, message[1], velocity),
                    _ => {}
                }
            }
            message::NOTE_OFF => {
                if message.len() < 3 {
                    return;
                }
                self.synth.key_up(tg, message[1]);
            }
            message::CHANNEL_AFTERTOUCH => {
                self.synth.set_aftertouch(tg, message[1]);
                self.synth.controllers_refresh(tg);
            }
            message::CONTROL_CHANGE => {
                if message.len() < 3 {
                    return;
                }
                self.dispatch_control_change(state, tg, message[1], message[2]);
            }
            message::PROGRAM_CHANGE => {
                if self.settings.program_change_enabled
                    && self.synth.performance_select_channel().is_disabled()
                {
                    self.synth.program_change(tg, message[1]);
                }
            }
            message::PITCH_BEND => {
                if message.len() < 3 {
                    return;
                }
                self.synth
                    .set_pitch_bend(tg, message::pitch_bend_value(message[1], message[2]));
            }
            _ => {}
        }
    }

    fn dispatch_control_change(&self, state: &mut RouterState, tg: usize, controller: u8, value: u8) {
        match controller {
            message::CC_MODULATION => {
                self.synth.set_mod_wheel(tg, value);
                self.synth.controllers_refresh(tg);
            }
            message::CC_FOOT_PEDAL => {
                self.synth.set_foot_controller(tg, value);
                self.synth.controllers_refresh(tg);
            }
            message::CC_BREATH_CONTROLLER => {
                self.synth.set_breath_controller(tg, value);
                self.synth.controllers_refresh(tg);
            }
            message::CC_VOLUME => self.synth.set_volume(tg, value),
            message::CC_PAN => self.synth.set_pan(tg, value),
            message::CC_BANK_SELECT_MSB => self.synth.bank_select_msb(tg, value),
            message::CC_BANK_SELECT_LSB => self.synth.bank_select_lsb(tg, value),
            message::CC_SUSTAIN => self.synth.set_sustain(tg, value >= 64),
            message::CC_RESONANCE => self.synth.set_resonance(tg, scale(99, value)),
            message::CC_FREQUENCY_CUTOFF => self.synth.set_cutoff(tg, scale(99, value)),
            message::CC_REVERB_LEVEL => self.synth.set_reverb_send(tg, scale(99, value)),
            message::CC_DETUNE_LEVEL => self.synth.set_master_tune(tg, rescale_detune(value)),
            message::CC_ALL_SOUND_OFF => self.synth.panic(tg, value),
            message::CC_ALL_NOTES_OFF => {
                // Omni receivers ignore All Notes Off (MIDI 1.0, modes 1 & 2).
                if !self.settings.ignore_all_notes_off && !state.channels.get(tg).is_omni() {
                    self.synth.notes_off(tg, value);
                }
            }
            message::CC_NRPN_PARAM_MSB => state.nrpn[tg].set_op(value),
            message::CC_NRPN_PARAM_LSB => state.nrpn[tg].set_offset(value),
            message::CC_NRPN_DATA_LSB => self.commit_nrpn(state, tg, value),
            _ => {}
        }
    }

    fn commit_nrpn(&self, state: &mut RouterState, tg: usize, value: u8) {
        match state.nrpn[tg].commit(value) {
            NrpnCommit::ProgramChange { program } => self.synth.program_change(tg, program),
            NrpnCommit::Operator { op, param, value } => {
                self.synth.set_operator_param(tg, op, param, value);
                // TODO: send a partial update instead of the whole voice
                self.send_voice_dump(tg);
            }
            NrpnCommit::Global { param, value } => {
                self.synth.set_global_param(tg, param, value);
                self.send_voice_dump(tg);
            }
            NrpnCommit::Unmapped => self.send_voice_dump(tg),
        }
    }

    fn handle_system_exclusive(&self, message: &[u8], cable: u8, tg: usize) {
        let code = self.synth.classify_sysex(tg, message);
        log::debug!("MIDI: SysEx classifier returned {}", code);

        match SysExOutcome::from_code(code, message) {
            SysExOutcome::Rejected(reason) => log::error!("MIDI: SysEx rejected: {}", reason),
            SysExOutcome::Function { param, value } => {
                log::debug!("MIDI: function parameter {:?} = {}", param, value);
                self.synth.set_function_param(tg, param, value);
            }
            SysExOutcome::VoiceUpload => {
                log::debug!("MIDI: voice bulk upload for TG {}", tg);
                self.synth.load_voice(tg, message);
            }
            SysExOutcome::BankUpload => {
                log::warn!("MIDI: bank bulk upload recognized but not implemented, ignoring");
            }
            SysExOutcome::VoiceParam { index, value } => {
                log::debug!("MIDI: voice parameter {} = {}", index, value);
                self.synth.set_voice_data_element(tg, index, value);
                if index == VOICE_ALGORITHM_INDEX {
                    // An algorithm change re-routes carriers; release
                    // everything so no note is left hanging.
                    self.synth.notes_off(tg, 0);
                }
            }
            SysExOutcome::DumpRequest { voice } => {
                log::debug!("MIDI: voice {} dump requested from cable {}", voice, cable);
                self.send_voice_dump(tg);
            }
            SysExOutcome::Unrecognized => {}
        }
    }

    /// Broadcast this TG's current voice to every registered endpoint.
    fn send_voice_dump(&self, tg: usize) {
        let dump = self.synth.voice_dump(tg);
        self.registry.broadcast(&dump);
    }
}

/// Universal real-time master volume block: `F0 .. 04 01 ll mm F7`.
fn is_master_volume(message: &[u8]) -> bool {
    message.len() >= 7
        && message[0] == message::SYSEX_BEGIN
        && message[3] == 0x04
        && message[4] == 0x01
        && message[message.len() - 1] == message::SYSEX_END
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nrpn::{GlobalParam, OperatorParam};
    use crate::registry::MidiEndpoint;
    use crate::sysex::FunctionParam;
    use crate::VOICE_DUMP_LEN;
    use std::thread;

    /// Records every synthesizer call as a readable string.
    #[derive(Default)]
    struct RecordingSynth {
        calls: Mutex<Vec<String>>,
        classify_code: Mutex<i16>,
        perf_channel: Mutex<MidiChannel>,
    }

    impl RecordingSynth {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.calls()
                .iter()
                .filter(|call| call.starts_with(prefix))
                .count()
        }

        fn set_classify_code(&self, code: i16) {
            *self.classify_code.lock().unwrap() = code;
        }

        fn set_perf_channel(&self, channel: MidiChannel) {
            *self.perf_channel.lock().unwrap() = channel;
        }
    }

    impl Synthesizer for RecordingSynth {
        fn key_down(&self, tg: usize, note: u8, velocity: u8) {
            self.record(format!("key_down tg{} note{} vel{}", tg, note, velocity));
        }
        fn key_up(&self, tg: usize, note: u8) {
            self.record(format!("key_up tg{} note{}", tg, note));
        }
        fn set_aftertouch(&self, tg: usize, value: u8) {
            self.record(format!("set_aftertouch tg{} {}", tg, value));
        }
        fn set_mod_wheel(&self, tg: usize, value: u8) {
            self.record(format!("set_mod_wheel tg{} {}", tg, value));
        }
        fn set_foot_controller(&self, tg: usize, value: u8) {
            self.record(format!("set_foot_controller tg{} {}", tg, value));
        }
        fn set_breath_controller(&self, tg: usize, value: u8) {
            self.record(format!("set_breath_controller tg{} {}", tg, value));
        }
        fn set_volume(&self, tg: usize, value: u8) {
            self.record(format!("set_volume tg{} {}", tg, value));
        }
        fn set_pan(&self, tg: usize, value: u8) {
            self.record(format!("set_pan tg{} {}", tg, value));
        }
        fn bank_select_msb(&self, tg: usize, value: u8) {
            self.record(format!("bank_select_msb tg{} {}", tg, value));
        }
        fn bank_select_lsb(&self, tg: usize, value: u8) {
            self.record(format!("bank_select_lsb tg{} {}", tg, value));
        }
        fn set_sustain(&self, tg: usize, on: bool) {
            self.record(format!("set_sustain tg{} {}", tg, on));
        }
        fn set_resonance(&self, tg: usize, value: u8) {
            self.record(format!("set_resonance tg{} {}", tg, value));
        }
        fn set_cutoff(&self, tg: usize, value: u8) {
            self.record(format!("set_cutoff tg{} {}", tg, value));
        }
        fn set_reverb_send(&self, tg: usize, value: u8) {
            self.record(format!("set_reverb_send tg{} {}", tg, value));
        }
        fn set_master_tune(&self, tg: usize, value: i16) {
            self.record(format!("set_master_tune tg{} {}", tg, value));
        }
        fn panic(&self, tg: usize, value: u8) {
            self.record(format!("panic tg{} {}", tg, value));
        }
        fn notes_off(&self, tg: usize, value: u8) {
            self.record(format!("notes_off tg{} {}", tg, value));
        }
        fn program_change(&self, tg: usize, program: u8) {
            self.record(format!("program_change tg{} {}", tg, program));
        }
        fn set_pitch_bend(&self, tg: usize, value: i16) {
            self.record(format!("set_pitch_bend tg{} {}", tg, value));
        }
        fn controllers_refresh(&self, tg: usize) {
            self.record(format!("controllers_refresh tg{}", tg));
        }
        fn set_master_volume(&self, volume: f32) {
            self.record(format!("set_master_volume {}", volume));
        }
        fn performance_select_channel(&self) -> MidiChannel {
            *self.perf_channel.lock().unwrap()
        }
        fn program_change_performance(&self, program: u8) {
            self.record(format!("program_change_performance {}", program));
        }
        fn set_function_param(&self, tg: usize, param: FunctionParam, value: u8) {
            self.record(format!("set_function_param tg{} {:?} {}", tg, param, value));
        }
        fn set_operator_param(&self, tg: usize, op: u8, param: OperatorParam, value: u8) {
            self.record(format!("set_operator_param tg{} op{} {:?} {}", tg, op, param, value));
        }
        fn set_global_param(&self, tg: usize, param: GlobalParam, value: u8) {
            self.record(format!("set_global_param tg{} {:?} {}", tg, param, value));
        }
        fn classify_sysex(&self, tg: usize, message: &[u8]) -> i16 {
            self.record(format!("classify tg{} len{}", tg, message.len()));
            *self.classify_code.lock().unwrap()
        }
        fn load_voice(&self, tg: usize, message: &[u8]) {
            self.record(format!("load_voice tg{} len{}", tg, message.len()));
        }
        fn set_voice_data_element(&self, tg: usize, index: u16, value: u8) {
            self.record(format!("set_voice_data_element tg{} idx{} {}", tg, index, value));
        }
        fn voice_dump(&self, tg: usize) -> [u8; VOICE_DUMP_LEN] {
            self.record(format!("voice_dump tg{}", tg));
            [0x42; VOICE_DUMP_LEN]
        }
    }

    #[derive(Default)]
    struct RecordingUi {
        events: Mutex<Vec<(u8, u8, u8, u8)>>,
    }

    impl RecordingUi {
        fn events(&self) -> Vec<(u8, u8, u8, u8)> {
            self.events.lock().unwrap().clone()
        }
    }

    impl UiListener for RecordingUi {
        fn midi_activity(&self, channel: u8, kind: u8, data1: u8, data2: u8) {
            self.events.lock().unwrap().push((channel, kind, data1, data2));
        }
    }

    #[derive(Default)]
    struct RecordingEndpoint {
        received: Mutex<Vec<Vec<u8>>>,
    }

    impl RecordingEndpoint {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn received(&self) -> Vec<Vec<u8>> {
            self.received.lock().unwrap().clone()
        }
    }

    impl MidiEndpoint for RecordingEndpoint {
        fn send(&self, message: &[u8], _cable: u8) {
            self.received.lock().unwrap().push(message.to_vec());
        }
    }

    struct Fixture {
        router: Arc<MessageRouter>,
        synth: Arc<RecordingSynth>,
        ui: Arc<RecordingUi>,
        registry: EndpointRegistry,
    }

    fn fixture() -> Fixture {
        fixture_with(MidiSettings::default())
    }

    fn fixture_with(settings: MidiSettings) -> Fixture {
        let synth = RecordingSynth::new();
        let ui = Arc::new(RecordingUi::default());
        let registry = EndpointRegistry::new();
        let router = Arc::new(MessageRouter::new(
            "umidi1",
            synth.clone(),
            ui.clone(),
            Arc::new(settings),
            registry.clone(),
        ));
        Fixture {
            router,
            synth,
            ui,
            registry,
        }
    }

    #[test]
    fn test_note_on_reaches_mapped_tg() {
        let f = fixture();
        f.router.set_channel(2, MidiChannel::Channel(3));
        f.router.handle(&[0x93, 60, 100], 0);
        assert_eq!(f.synth.calls(), vec!["key_down tg2 note60 vel100"]);
    }

    #[test]
    fn test_note_on_zero_velocity_is_key_up() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.router.handle(&[0x90, 60, 0], 0);
        assert_eq!(f.synth.calls(), vec!["key_up tg0 note60"]);
    }

    #[test]
    fn test_note_off() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.router.handle(&[0x80, 60, 64], 0);
        assert_eq!(f.synth.calls(), vec!["key_up tg0 note60"]);
    }

    #[test]
    fn test_omni_matches_every_channel() {
        let f = fixture();
        f.router.set_channel(1, MidiChannel::Omni);
        f.router.handle(&[0x90, 60, 100], 0);
        f.router.handle(&[0x9F, 62, 100], 0);
        assert_eq!(
            f.synth.calls(),
            vec!["key_down tg1 note60 vel100", "key_down tg1 note62 vel100"]
        );
    }

    #[test]
    fn test_ui_notified_without_any_mapping() {
        let f = fixture();
        f.router.handle(&[0x95, 60, 100], 0);
        assert!(f.synth.calls().is_empty());
        assert_eq!(f.ui.events(), vec![(5, 0x90, 60, 100)]);
    }

    #[test]
    fn test_short_message_dropped() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Omni);
        f.router.handle(&[0xF8], 0);
        assert!(f.synth.calls().is_empty());
        assert!(f.ui.events().is_empty());
    }

    #[test]
    fn test_aftertouch_triggers_refresh() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(1));
        f.router.handle(&[0xD1, 55], 0);
        assert_eq!(
            f.synth.calls(),
            vec!["set_aftertouch tg0 55", "controllers_refresh tg0"]
        );
    }

    #[test]
    fn test_pitch_bend_decode() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.router.handle(&[0xE0, 0x00, 0x40], 0);
        f.router.handle(&[0xE0, 0x00, 0x00], 0);
        f.router.handle(&[0xE0, 0x7F, 0x7F], 0);
        assert_eq!(
            f.synth.calls(),
            vec![
                "set_pitch_bend tg0 0",
                "set_pitch_bend tg0 -8192",
                "set_pitch_bend tg0 8191"
            ]
        );
    }

    #[test]
    fn test_cc_direct_setters() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.router.handle(&[0xB0, 7, 100], 0);
        f.router.handle(&[0xB0, 10, 64], 0);
        f.router.handle(&[0xB0, 0, 1], 0);
        f.router.handle(&[0xB0, 32, 2], 0);
        f.router.handle(&[0xB0, 120, 0], 0);
        assert_eq!(
            f.synth.calls(),
            vec![
                "set_volume tg0 100",
                "set_pan tg0 64",
                "bank_select_msb tg0 1",
                "bank_select_lsb tg0 2",
                "panic tg0 0"
            ]
        );
    }

    #[test]
    fn test_cc_mod_wheel_refreshes_controllers() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.router.handle(&[0xB0, 1, 127], 0);
        assert_eq!(
            f.synth.calls(),
            vec!["set_mod_wheel tg0 127", "controllers_refresh tg0"]
        );
    }

    #[test]
    fn test_cc_sustain_threshold() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.router.handle(&[0xB0, 64, 63], 0);
        f.router.handle(&[0xB0, 64, 64], 0);
        assert_eq!(
            f.synth.calls(),
            vec!["set_sustain tg0 false", "set_sustain tg0 true"]
        );
    }

    #[test]
    fn test_cc_rescaled_setters() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.router.handle(&[0xB0, 71, 127], 0);
        f.router.handle(&[0xB0, 74, 64], 0);
        f.router.handle(&[0xB0, 91, 127], 0);
        f.router.handle(&[0xB0, 94, 0], 0);
        f.router.handle(&[0xB0, 94, 127], 0);
        assert_eq!(
            f.synth.calls(),
            vec![
                "set_resonance tg0 99",
                "set_cutoff tg0 49",
                "set_reverb_send tg0 99",
                "set_master_tune tg0 0",
                "set_master_tune tg0 99"
            ]
        );
    }

    #[test]
    fn test_all_notes_off_delivered_on_plain_channel() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.router.handle(&[0xB0, 123, 0], 0);
        assert_eq!(f.synth.calls(), vec!["notes_off tg0 0"]);
    }

    #[test]
    fn test_all_notes_off_suppressed_in_omni() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Omni);
        f.router.handle(&[0xB0, 123, 0], 0);
        assert!(f.synth.calls().is_empty());
    }

    #[test]
    fn test_all_notes_off_suppressed_by_setting() {
        let settings = MidiSettings {
            ignore_all_notes_off: true,
            ..MidiSettings::default()
        };
        let f = fixture_with(settings);
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.router.handle(&[0xB0, 123, 0], 0);
        assert!(f.synth.calls().is_empty());
    }

    #[test]
    fn test_program_change_per_tg() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.router.handle(&[0xC0, 12], 0);
        assert_eq!(f.synth.calls(), vec!["program_change tg0 12"]);
    }

    #[test]
    fn test_program_change_disabled_in_settings() {
        let settings = MidiSettings {
            program_change_enabled: false,
            ..MidiSettings::default()
        };
        let f = fixture_with(settings);
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.router.handle(&[0xC0, 12], 0);
        assert!(f.synth.calls().is_empty());
    }

    #[test]
    fn test_performance_select_replaces_per_tg_program_change() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(5));
        f.synth.set_perf_channel(MidiChannel::Channel(5));
        f.router.handle(&[0xC5, 7], 0);
        assert_eq!(f.synth.count("program_change_performance 7"), 1);
        assert_eq!(f.synth.count("program_change tg"), 0);
    }

    #[test]
    fn test_performance_select_omni_channel() {
        let f = fixture();
        f.synth.set_perf_channel(MidiChannel::Omni);
        f.router.handle(&[0xC3, 2], 0);
        assert_eq!(f.synth.count("program_change_performance 2"), 1);
    }

    #[test]
    fn test_master_volume_sysex_bypasses_dispatch() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Omni);
        f.router
            .handle(&[0xF0, 0x7F, 0x7F, 0x04, 0x01, 0x7F, 0x7F, 0xF7], 0);
        // The inherited combine ANDs the data bytes, so the value is 0.
        assert_eq!(f.synth.calls(), vec!["set_master_volume 0"]);
    }

    #[test]
    fn test_nrpn_sequence_commits_once_and_broadcasts() {
        let f = fixture();
        f.router.set_channel(1, MidiChannel::Channel(0));
        let a = RecordingEndpoint::new();
        let b = RecordingEndpoint::new();
        f.registry.register("umidi1", a.clone());
        f.registry.register("ttymidi", b.clone());

        f.router.handle(&[0xB0, 99, 0], 0);
        f.router.handle(&[0xB0, 98, 16], 0);
        f.router.handle(&[0xB0, 38, 64], 0);

        assert_eq!(f.synth.count("set_operator_param"), 1);
        assert_eq!(
            f.synth.count("set_operator_param tg1 op0 OutputLevel 49"),
            1
        );
        assert_eq!(f.synth.count("voice_dump"), 1);
        assert_eq!(a.received().len(), 1);
        assert_eq!(b.received().len(), 1);
        assert_eq!(a.received()[0].len(), VOICE_DUMP_LEN);
    }

    #[test]
    fn test_nrpn_program_change_commit_sends_no_dump() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        let endpoint = RecordingEndpoint::new();
        f.registry.register("ttymidi", endpoint.clone());

        f.router.handle(&[0xB0, 98, 21], 0);
        f.router.handle(&[0xB0, 38, 9], 0);

        assert_eq!(f.synth.count("program_change tg0 9"), 1);
        assert_eq!(f.synth.count("set_operator_param"), 0);
        assert_eq!(f.synth.count("set_global_param"), 0);
        assert_eq!(f.synth.count("voice_dump"), 0);
        assert!(endpoint.received().is_empty());
    }

    #[test]
    fn test_nrpn_global_commit() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.router.handle(&[0xB0, 99, 6], 0);
        f.router.handle(&[0xB0, 98, 8], 0);
        f.router.handle(&[0xB0, 38, 127], 0);
        assert_eq!(f.synth.count("set_global_param tg0 Algorithm 31"), 1);
        assert_eq!(f.synth.count("voice_dump"), 1);
    }

    #[test]
    fn test_nrpn_unmapped_offset_still_dumps() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.router.handle(&[0xB0, 99, 2], 0);
        f.router.handle(&[0xB0, 98, 120], 0);
        f.router.handle(&[0xB0, 38, 1], 0);
        assert_eq!(f.synth.count("set_operator_param"), 0);
        assert_eq!(f.synth.count("set_global_param"), 0);
        assert_eq!(f.synth.count("voice_dump"), 1);
    }

    #[test]
    fn test_rejected_sysex_mutates_nothing() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.synth.set_classify_code(-6);
        f.router.handle(&[0xF0, 0x43, 0x10, 0x00, 0x00, 0x00, 0xF7], 0);
        assert_eq!(f.synth.calls(), vec!["classify tg0 len7"]);
    }

    #[test]
    fn test_sysex_function_parameter() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.synth.set_classify_code(64);
        f.router.handle(&[0xF0, 0x43, 0x10, 0x08, 0x41, 0x01, 0xF7], 0);
        assert_eq!(f.synth.count("set_function_param tg0 MonoMode 1"), 1);
    }

    #[test]
    fn test_sysex_voice_upload() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.synth.set_classify_code(100);
        f.router.handle(&[0xF0, 0x43, 0x00, 0x00, 0x01, 0x1B, 0xF7], 0);
        assert_eq!(f.synth.count("load_voice tg0 len7"), 1);
    }

    #[test]
    fn test_sysex_bank_upload_not_implemented() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.synth.set_classify_code(200);
        f.router.handle(&[0xF0, 0x43, 0x00, 0x09, 0x20, 0x00, 0xF7], 0);
        assert_eq!(f.synth.calls(), vec!["classify tg0 len7"]);
    }

    #[test]
    fn test_sysex_voice_param_edit() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.synth.set_classify_code(300);
        f.router.handle(&[0xF0, 0x43, 0x10, 0x00, 0x08, 0x32, 0xF7], 0);
        assert_eq!(f.synth.count("set_voice_data_element tg0 idx8 50"), 1);
        assert_eq!(f.synth.count("notes_off"), 0);
    }

    #[test]
    fn test_sysex_algorithm_edit_releases_notes() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.synth.set_classify_code(300);
        // index = 0x06 + (0x01 & 0x03) * 128 = 134, the algorithm slot
        f.router.handle(&[0xF0, 0x43, 0x10, 0x01, 0x06, 0x1F, 0xF7], 0);
        assert_eq!(f.synth.count("set_voice_data_element tg0 idx134 31"), 1);
        assert_eq!(f.synth.count("notes_off tg0 0"), 1);
    }

    #[test]
    fn test_sysex_dump_request_broadcasts_to_all() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.synth.set_classify_code(500);
        let a = RecordingEndpoint::new();
        let b = RecordingEndpoint::new();
        f.registry.register("umidi1", a.clone());
        f.registry.register("ttymidi", b.clone());

        f.router.handle(&[0xF0, 0x43, 0x20, 0x00, 0x00, 0x00, 0xF7], 0);

        assert_eq!(f.synth.count("voice_dump tg0"), 1);
        assert_eq!(a.received().len(), 1);
        assert_eq!(b.received().len(), 1);
        assert_eq!(b.received()[0].len(), VOICE_DUMP_LEN);
    }

    #[test]
    fn test_sysex_channel_nibble_selects_tg() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(1));
        f.router.set_channel(1, MidiChannel::Channel(2));
        f.synth.set_classify_code(-11);
        f.router.handle(&[0xF0, 0x43, 0x12, 0x00, 0x00, 0x00, 0xF7], 0);
        assert_eq!(f.synth.calls(), vec!["classify tg1 len7"]);
    }

    #[test]
    fn test_thru_forwards_verbatim() {
        let settings = MidiSettings {
            thru_in: "umidi1".to_string(),
            thru_out: "ttymidi".to_string(),
            ..MidiSettings::default()
        };
        let f = fixture_with(settings);
        let out = RecordingEndpoint::new();
        f.registry.register("ttymidi", out.clone());

        // Forwarded even though the dispatch below drops it.
        f.router.handle(&[0xF8], 0);
        f.router.handle(&[0x90, 60, 100], 0);

        assert_eq!(out.received(), vec![vec![0xF8], vec![0x90, 60, 100]]);
    }

    #[test]
    fn test_thru_requires_matching_name() {
        let settings = MidiSettings {
            thru_in: "ttymidi".to_string(),
            thru_out: "umidi2".to_string(),
            ..MidiSettings::default()
        };
        let f = fixture_with(settings);
        let out = RecordingEndpoint::new();
        f.registry.register("umidi2", out.clone());

        f.router.handle(&[0x90, 60, 100], 0);
        assert!(out.received().is_empty());
    }

    #[test]
    fn test_concurrent_sources_serialize() {
        let f = fixture();
        f.router.set_channel(0, MidiChannel::Channel(0));
        f.router.set_channel(1, MidiChannel::Channel(1));

        let rounds: usize = 50;
        let router_a = f.router.clone();
        let a = thread::spawn(move || {
            for _ in 0..rounds {
                router_a.handle(&[0xB0, 99, 0], 0);
                router_a.handle(&[0xB0, 98, 16], 0);
                router_a.handle(&[0xB0, 38, 64], 0);
            }
        });
        let router_b = f.router.clone();
        let b = thread::spawn(move || {
            for _ in 0..rounds {
                router_b.handle(&[0xB1, 99, 3], 1);
                router_b.handle(&[0xB1, 98, 0], 1);
                router_b.handle(&[0xB1, 38, 127], 1);
            }
        });
        a.join().unwrap();
        b.join().unwrap();

        // Each source commits only against its own latch; the lock keeps
        // the sequences from corrupting each other.
        assert_eq!(
            f.synth.count("set_operator_param tg0 op0 OutputLevel 49"),
            rounds
        );
        assert_eq!(
            f.synth.count("set_operator_param tg1 op3 EgRate1 99"),
            rounds
        );
        assert_eq!(f.synth.count("voice_dump"), 2 * rounds);
    }
}
