//! Raw MIDI byte vocabulary
//!
//! Status nibbles, controller numbers and System Exclusive framing bytes,
//! plus the small helpers for picking framed messages apart. Every caller
//! hands this crate one fully framed message at a time; running status
//! never reaches us.

/// Note Off status nibble.
pub const NOTE_OFF: u8 = 0b1000;
/// Note On status nibble (velocity 0 doubles as Note Off).
pub const NOTE_ON: u8 = 0b1001;
/// Control Change status nibble.
pub const CONTROL_CHANGE: u8 = 0b1011;
/// Program Change status nibble.
pub const PROGRAM_CHANGE: u8 = 0b1100;
/// Channel Aftertouch status nibble (polyphonic aftertouch is not supported).
pub const CHANNEL_AFTERTOUCH: u8 = 0b1101;
/// Pitch Bend status nibble.
pub const PITCH_BEND: u8 = 0b1110;

/// System Exclusive start marker.
pub const SYSEX_BEGIN: u8 = 0xF0;
/// System Exclusive end marker.
pub const SYSEX_END: u8 = 0xF7;
/// System real-time Timing Clock.
pub const TIMING_CLOCK: u8 = 0xF8;
/// System real-time Active Sensing.
pub const ACTIVE_SENSING: u8 = 0xFE;

// Control change numbers this engine dispatches on
pub const CC_BANK_SELECT_MSB: u8 = 0;
pub const CC_MODULATION: u8 = 1;
pub const CC_BREATH_CONTROLLER: u8 = 2;
pub const CC_FOOT_PEDAL: u8 = 4;
pub const CC_VOLUME: u8 = 7;
pub const CC_PAN: u8 = 10;
pub const CC_BANK_SELECT_LSB: u8 = 32;
pub const CC_NRPN_DATA_LSB: u8 = 38;
pub const CC_SUSTAIN: u8 = 64;
pub const CC_RESONANCE: u8 = 71;
pub const CC_FREQUENCY_CUTOFF: u8 = 74;
pub const CC_REVERB_LEVEL: u8 = 91;
pub const CC_DETUNE_LEVEL: u8 = 94;
pub const CC_NRPN_PARAM_LSB: u8 = 98;
pub const CC_NRPN_PARAM_MSB: u8 = 99;
pub const CC_ALL_SOUND_OFF: u8 = 120;
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// Upper nibble of a status byte (the message type).
#[inline]
pub fn status_type(status: u8) -> u8 {
    status >> 4
}

/// Lower nibble of a status byte (the channel).
#[inline]
pub fn status_channel(status: u8) -> u8 {
    status & 0x0F
}

/// Reassemble a pitch-bend value from its two 7-bit data bytes.
///
/// 0x2000 is the wheel center, so the result covers -8192..=8191.
pub fn pitch_bend_value(data1: u8, data2: u8) -> i16 {
    let mut value = data1 as i16;
    value |= (data2 as i16) << 7;
    value - 0x2000
}

/// Trace one message at debug level.
///
/// SysEx payloads are dumped in full, 16 bytes per line. Lone Timing
/// Clock and Active Sensing bytes are suppressed so the trace stays
/// readable while a device is idling.
pub fn trace_message(message: &[u8], cable: u8) {
    match message.len() {
        0 => {}
        1 => {
            if message[0] != TIMING_CLOCK && message[0] != ACTIVE_SENSING {
                log::debug!("MIDI{}: {:02X}", cable, message[0]);
            }
        }
        2 => log::debug!("MIDI{}: {:02X} {:02X}", cable, message[0], message[1]),
        3 => log::debug!(
            "MIDI{}: {:02X} {:02X} {:02X}",
            cable,
            message[0],
            message[1],
            message[2]
        ),
        len => {
            if message[0] == SYSEX_BEGIN {
                let mut dump = String::new();
                for (i, byte) in message.iter().enumerate() {
                    if i % 16 == 0 {
                        dump.push_str(&format!("\n{:04}:", i));
                    }
                    dump.push_str(&format!(" 0x{:02x}", byte));
                }
                log::debug!("MIDI{}: SysEx data length [{}]:{}", cable, len, dump);
            } else {
                log::debug!(
                    "MIDI{}: unhandled event type {:02X}, length {}",
                    cable,
                    message[0],
                    len
                );
            }
        }
    }
}
