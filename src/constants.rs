/*!
Byte values from the MIDI 1.0 and Standard MIDI File specifications that the
parser and writer dispatch on.
!*/

/// `0x80`: `Note Off` status (channel in the low nibble).
pub const NOTE_OFF: u8 = 0x80;

/// `0x90`: `Note On` status. A velocity of 0 means `Note Off`.
pub const NOTE_ON: u8 = 0x90;

/// `0xA0`: `Polyphonic Key Pressure` (aftertouch) status.
pub const POLY_PRESSURE: u8 = 0xA0;

/// `0xB0`: `Control Change` status. Channel Mode messages share this status
/// and are differentiated by a first data byte of 121 to 127.
pub const CONTROLLER_CHANGE: u8 = 0xB0;

/// `0xC0`: `Program Change` status. Carries one data byte.
pub const PROGRAM_CHANGE: u8 = 0xC0;

/// `0xD0`: `Channel Pressure` (mono aftertouch) status. Carries one data byte.
pub const CHANNEL_PRESSURE: u8 = 0xD0;

/// `0xE0`: `Pitch Bend` status. Carries a 14-bit value, LSB first.
pub const PITCH_BEND: u8 = 0xE0;

/// `0xF0`: File Spec: `F0 <length> <bytes to be transmitted after F0>`
pub const SYSTEM_EXCLUSIVE: u8 = 0xF0;

/// `0xF1`: MIDI Time Code quarter frame. Real-time only; invalid in a file.
pub const MIDI_TIME_CODE: u8 = 0xF1;

/// `0xF2`: Song Position Pointer. Real-time only; invalid in a file.
pub const SONG_POSITION_POINTER: u8 = 0xF2;

/// `0xF3`: Song Select. Real-time only; invalid in a file.
pub const SONG_SELECT: u8 = 0xF3;

/// `0xF7`: End of Exclusive. In a file this status introduces an escape
/// sequence, `F7 <length> <all bytes to be transmitted>`, or a continuation
/// packet of a split system-exclusive message.
pub const END_OF_EXCLUSIVE: u8 = 0xF7;

/// `0xFF`: File Spec: All meta-events begin with FF, then have an event type
/// byte (which is always less than 128).
pub const META_EVENT: u8 = 0xFF;

// Meta event type bytes.

/// `FF 00 02 ssss`: Sequence Number.
pub const META_SEQUENCE_NUMBER: u8 = 0x00;

/// `FF 01 len text`: Text.
pub const META_TEXT: u8 = 0x01;

/// `FF 02 len text`: Copyright Notice.
pub const META_COPYRIGHT: u8 = 0x02;

/// `FF 03 len text`: Sequence/Track Name. In a format 0 track, or the first
/// track of a format 1 file, the name of the sequence; otherwise the name of
/// the track.
pub const META_SEQUENCE_NAME: u8 = 0x03;

/// `FF 04 len text`: Instrument Name.
pub const META_INSTRUMENT_NAME: u8 = 0x04;

/// `FF 05 len text`: Lyric.
pub const META_LYRIC: u8 = 0x05;

/// `FF 06 len text`: Marker.
pub const META_MARKER: u8 = 0x06;

/// `FF 07 len text`: Cue Point.
pub const META_CUE_POINT: u8 = 0x07;

/// `FF 08 len text`: Program Name.
pub const META_PROGRAM_NAME: u8 = 0x08;

/// `FF 09 len text`: Device Name.
pub const META_DEVICE_NAME: u8 = 0x09;

/// `FF 20 01 cc`: MIDI Channel Prefix (deprecated).
pub const META_CHANNEL_PREFIX: u8 = 0x20;

/// `FF 21 01 pp`: MIDI Port (deprecated).
pub const META_MIDI_PORT: u8 = 0x21;

/// `FF 2F 00`: End of Track. This event is not optional.
pub const META_END_OF_TRACK: u8 = 0x2F;

/// `FF 51 03 tttttt`: Set Tempo, in microseconds per MIDI quarter-note.
pub const META_TEMPO: u8 = 0x51;

/// `FF 54 05 hr mn se fr ff`: SMPTE Offset.
pub const META_SMPTE_OFFSET: u8 = 0x54;

/// `FF 58 04 nn dd cc bb`: Time Signature.
pub const META_TIME_SIGNATURE: u8 = 0x58;

/// `FF 59 02 sf mi`: Key Signature.
pub const META_KEY_SIGNATURE: u8 = 0x59;

/// `FF 7F len data`: Sequencer-Specific Meta-Event.
pub const META_SEQUENCER_SPECIFIC: u8 = 0x7F;

/// Default tempo, 120 beats per minute expressed in microseconds per
/// quarter-note.
pub const DEFAULT_MICROSECONDS_PER_QUARTER: u32 = 500_000;

/// Tempo is stored in three bytes, hence the odd upper bound.
pub const MAX_MICROSECONDS_PER_QUARTER: u32 = 16_777_215;

/// Data byte count for system common statuses that leak into files. These
/// should not appear in a well-formed SMF but the sizes let the parser step
/// over them.
pub(crate) fn system_data_len(status: u8) -> usize {
    match status {
        MIDI_TIME_CODE => 1,
        SONG_POSITION_POINTER => 2,
        SONG_SELECT => 1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_sizes() {
        assert_eq!(1, system_data_len(MIDI_TIME_CODE));
        assert_eq!(2, system_data_len(SONG_POSITION_POINTER));
        assert_eq!(1, system_data_len(SONG_SELECT));
        assert_eq!(0, system_data_len(0xF6));
        assert_eq!(0, system_data_len(0xFE));
    }
}
