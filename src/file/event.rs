use crate::constants::{
    END_OF_EXCLUSIVE, META_END_OF_TRACK, META_EVENT, META_TEMPO, SYSTEM_EXCLUSIVE,
};
use crate::core::vlq::Vlq;
use crate::core::StatusType;
use std::hash::{Hash, Hasher};

/// The classification of one event as it appeared in the file.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum EventKind {
    /// A channel message: the status nibble and the channel it addresses.
    ChannelVoice { status: StatusType, channel: u8 },
    /// A system exclusive message. The data excludes the leading `0xF0` and
    /// includes the terminating `0xF7`; split messages are delivered whole.
    SystemExclusive,
    /// An `F7`-prefixed chunk used to embed arbitrary bytes, typically
    /// real-time system messages, in a file.
    EscapeSequence,
    /// A meta event and its type byte.
    Meta { meta_type: u8 },
    /// A system common or system real time status that has no business in a
    /// file. Surfaced so the handler can decide what to do with it.
    InvalidSystemCommon { status: u8 },
}

/// One timed MIDI record: what it is, the bytes that followed its status, and
/// where and when it occurred.
#[derive(Clone, Debug)]
pub struct Event {
    kind: EventKind,
    data: Vec<u8>,
    track: u16,
    delta_ticks: u32,
    absolute_ticks: u64,
}

impl Event {
    pub(crate) fn new(
        kind: EventKind,
        data: Vec<u8>,
        track: u16,
        delta_ticks: u32,
        absolute_ticks: u64,
    ) -> Self {
        Self {
            kind,
            data,
            track,
            delta_ticks,
            absolute_ticks,
        }
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// The payload bytes exactly as they appeared after the status byte.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The 0-based index of the track this event came from.
    pub fn track(&self) -> u16 {
        self.track
    }

    /// Ticks elapsed since the previous event in the same track.
    pub fn delta_ticks(&self) -> u32 {
        self.delta_ticks
    }

    /// Ticks elapsed since the start of the track.
    pub fn absolute_ticks(&self) -> u64 {
        self.absolute_ticks
    }

    /// The status byte this event was (or would be) stored under.
    pub fn status_byte(&self) -> u8 {
        match self.kind {
            EventKind::ChannelVoice { status, channel } => ((status as u8) << 4) | channel,
            EventKind::SystemExclusive => SYSTEM_EXCLUSIVE,
            EventKind::EscapeSequence => END_OF_EXCLUSIVE,
            EventKind::Meta { .. } => META_EVENT,
            EventKind::InvalidSystemCommon { status } => status,
        }
    }

    pub fn is_channel_voice(&self) -> bool {
        matches!(self.kind, EventKind::ChannelVoice { .. })
    }

    pub fn is_sysex(&self) -> bool {
        matches!(self.kind, EventKind::SystemExclusive)
    }

    pub fn is_escape(&self) -> bool {
        matches!(self.kind, EventKind::EscapeSequence)
    }

    pub fn is_meta(&self) -> bool {
        matches!(self.kind, EventKind::Meta { .. })
    }

    pub fn meta_type(&self) -> Option<u8> {
        match self.kind {
            EventKind::Meta { meta_type } => Some(meta_type),
            _ => None,
        }
    }

    pub fn is_end_of_track(&self) -> bool {
        self.meta_type() == Some(META_END_OF_TRACK)
    }

    pub fn is_tempo(&self) -> bool {
        self.meta_type() == Some(META_TEMPO)
    }

    /// True for a note-on with a nonzero velocity. A note-on with velocity 0
    /// is a note-off in disguise.
    pub fn is_note_on(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ChannelVoice {
                status: StatusType::NoteOn,
                ..
            }
        ) && self.data.get(1).copied().unwrap_or(0) > 0
    }

    pub fn is_note_off(&self) -> bool {
        match self.kind {
            EventKind::ChannelVoice {
                status: StatusType::NoteOff,
                ..
            } => true,
            EventKind::ChannelVoice {
                status: StatusType::NoteOn,
                ..
            } => self.data.get(1).copied().unwrap_or(0) == 0,
            _ => false,
        }
    }

    /// Serialize back to the on-wire byte sequence, status byte included,
    /// without the leading delta time.
    pub fn to_file_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() + 3);
        match self.kind {
            EventKind::ChannelVoice { .. } | EventKind::InvalidSystemCommon { .. } => {
                bytes.push(self.status_byte());
                bytes.extend_from_slice(&self.data);
            }
            EventKind::SystemExclusive | EventKind::EscapeSequence => {
                bytes.push(self.status_byte());
                bytes.extend_from_slice(&Vlq::new(self.data.len() as u32).to_bytes());
                bytes.extend_from_slice(&self.data);
            }
            EventKind::Meta { meta_type } => {
                bytes.push(META_EVENT);
                bytes.push(meta_type);
                bytes.extend_from_slice(&Vlq::new(self.data.len() as u32).to_bytes());
                bytes.extend_from_slice(&self.data);
            }
        }
        bytes
    }
}

// Two events are the same event if they are the same kind of thing with the
// same payload at the same place and time. The delta is presentation detail
// and depends on what preceded the event, so it takes no part in identity.
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.data == other.data
            && self.track == other.track
            && self.absolute_ticks == other.absolute_ticks
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.data.hash(state);
        self.track.hash(state);
        self.absolute_ticks.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_on(track: u16, delta: u32, absolute: u64, note: u8, velocity: u8) -> Event {
        Event::new(
            EventKind::ChannelVoice {
                status: StatusType::NoteOn,
                channel: 3,
            },
            vec![note, velocity],
            track,
            delta,
            absolute,
        )
    }

    #[test]
    fn channel_voice_bytes() {
        let event = note_on(0, 0, 0, 0x40, 0x64);
        assert_eq!(0x93, event.status_byte());
        assert_eq!(vec![0x93, 0x40, 0x64], event.to_file_bytes());
    }

    #[test]
    fn meta_bytes() {
        let event = Event::new(
            EventKind::Meta { meta_type: 0x51 },
            vec![0x07, 0xA1, 0x20],
            0,
            0,
            0,
        );
        assert!(event.is_tempo());
        assert_eq!(vec![0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20], event.to_file_bytes());
    }

    #[test]
    fn sysex_bytes() {
        let event = Event::new(
            EventKind::SystemExclusive,
            vec![0x7E, 0x00, 0x06, 0x7F, 0xF7],
            0,
            0,
            0,
        );
        assert_eq!(
            vec![0xF0, 0x05, 0x7E, 0x00, 0x06, 0x7F, 0xF7],
            event.to_file_bytes()
        );
    }

    #[test]
    fn equality_ignores_delta() {
        let a = note_on(1, 0, 480, 0x40, 0x64);
        let b = note_on(1, 480, 480, 0x40, 0x64);
        assert_eq!(a, b);
        let c = note_on(1, 0, 481, 0x40, 0x64);
        assert_ne!(a, c);
    }

    #[test]
    fn note_classifiers() {
        assert!(note_on(0, 0, 0, 0x40, 0x64).is_note_on());
        let zero_velocity = note_on(0, 0, 0, 0x40, 0x00);
        assert!(!zero_velocity.is_note_on());
        assert!(zero_velocity.is_note_off());
    }
}
