//! UI activity bridge
//!
//! The router notifies the interface of raw channel-voice traffic from
//! whatever thread delivered the message. This bridge turns those
//! callbacks into a bounded flume channel an interface thread can drain
//! at its own pace.

use crate::synth::UiListener;
use std::sync::Arc;

/// One observed channel-voice message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityEvent {
    /// MIDI channel (0-15).
    pub channel: u8,
    /// Status byte with the channel nibble cleared (0x80, 0x90, 0xB0).
    pub kind: u8,
    pub data1: u8,
    pub data2: u8,
}

/// Flume-backed `UiListener`.
///
/// Events are pushed with `try_send`; when the interface stalls and the
/// channel fills up, events are dropped with a warning rather than
/// blocking the dispatch path.
pub struct ActivityFeed {
    tx: flume::Sender<ActivityEvent>,
}

impl ActivityFeed {
    /// Create a feed with room for `capacity` pending events.
    pub fn bounded(capacity: usize) -> (Arc<Self>, flume::Receiver<ActivityEvent>) {
        let (tx, rx) = flume::bounded(capacity);
        (Arc::new(Self { tx }), rx)
    }
}

impl UiListener for ActivityFeed {
    fn midi_activity(&self, channel: u8, kind: u8, data1: u8, data2: u8) {
        let event = ActivityEvent {
            channel,
            kind,
            data1,
            data2,
        };
        if self.tx.try_send(event).is_err() {
            log::warn!("MIDI: activity channel full, dropping event");
        }
    }
}
