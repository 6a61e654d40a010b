//! Channel-to-tone-generator routing table

use crate::TONE_GENERATORS;

/// MIDI channel assignment for one tone generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MidiChannel {
    /// Respond on a single channel (0-15).
    Channel(u8),
    /// Respond on every channel.
    Omni,
    /// Do not respond at all.
    #[default]
    Disabled,
}

impl MidiChannel {
    /// Does a message on `channel` address this assignment?
    pub fn matches(&self, channel: u8) -> bool {
        match self {
            MidiChannel::Channel(assigned) => *assigned == channel,
            MidiChannel::Omni => true,
            MidiChannel::Disabled => false,
        }
    }

    pub fn is_omni(&self) -> bool {
        matches!(self, MidiChannel::Omni)
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, MidiChannel::Disabled)
    }
}

/// Per-tone-generator channel assignments.
///
/// Always exactly `TONE_GENERATORS` slots; every slot starts `Disabled`
/// until an explicit assignment arrives from configuration.
#[derive(Debug, Clone)]
pub struct ChannelMap {
    slots: [MidiChannel; TONE_GENERATORS],
}

impl ChannelMap {
    pub fn new() -> Self {
        Self {
            slots: [MidiChannel::Disabled; TONE_GENERATORS],
        }
    }

    /// Assign `channel` to tone generator `tg`.
    ///
    /// An out-of-range `tg` is a caller bug, not a runtime condition.
    pub fn set(&mut self, tg: usize, channel: MidiChannel) {
        assert!(tg < TONE_GENERATORS, "tone generator index {tg} out of range");
        self.slots[tg] = channel;
    }

    /// Current assignment for tone generator `tg`.
    pub fn get(&self, tg: usize) -> MidiChannel {
        assert!(tg < TONE_GENERATORS, "tone generator index {tg} out of range");
        self.slots[tg]
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::new()
    }
}
