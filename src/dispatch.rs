//! Decomposes raw parsing events into per-subtype callbacks. The
//! [`DispatchingHandler`] wraps any [`MessageHandler`] and implements the
//! parser-facing [`EventHandler`] by inspecting status nibbles and meta type
//! bytes, so concrete handlers deal in notes and tempos instead of byte
//! payloads.

use crate::constants::{
    META_CHANNEL_PREFIX, META_COPYRIGHT, META_CUE_POINT, META_DEVICE_NAME, META_END_OF_TRACK,
    META_INSTRUMENT_NAME, META_KEY_SIGNATURE, META_LYRIC, META_MARKER, META_MIDI_PORT,
    META_PROGRAM_NAME, META_SEQUENCER_SPECIFIC, META_SEQUENCE_NAME, META_SEQUENCE_NUMBER,
    META_SMPTE_OFFSET, META_TEMPO, META_TEXT, META_TIME_SIGNATURE,
};
use crate::core::bew::read_bew;
use crate::core::StatusType;
use crate::file::{Event, EventKind, Header};
use crate::handler::{EventHandler, HandlerResult};
use log::warn;

/// Per-subtype callbacks. Every method is a no-op by default; implement the
/// ones you care about. Text payloads arrive as raw bytes because the file
/// format does not promise an encoding.
pub trait MessageHandler {
    fn header(&mut self, header: &Header) -> HandlerResult {
        let _ = header;
        Ok(())
    }

    fn start_of_track(&mut self, track: u16) -> HandlerResult {
        let _ = track;
        Ok(())
    }

    fn end_of_track(&mut self, track: u16) -> HandlerResult {
        let _ = track;
        Ok(())
    }

    fn eof(&mut self) -> HandlerResult {
        Ok(())
    }

    // channel messages

    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> HandlerResult {
        let _ = (channel, note, velocity);
        Ok(())
    }

    fn note_off(&mut self, channel: u8, note: u8, velocity: u8) -> HandlerResult {
        let _ = (channel, note, velocity);
        Ok(())
    }

    fn poly_pressure(&mut self, channel: u8, note: u8, pressure: u8) -> HandlerResult {
        let _ = (channel, note, pressure);
        Ok(())
    }

    fn controller_change(&mut self, channel: u8, controller: u8, value: u8) -> HandlerResult {
        let _ = (channel, controller, value);
        Ok(())
    }

    fn program_change(&mut self, channel: u8, program: u8) -> HandlerResult {
        let _ = (channel, program);
        Ok(())
    }

    fn channel_pressure(&mut self, channel: u8, pressure: u8) -> HandlerResult {
        let _ = (channel, pressure);
        Ok(())
    }

    /// `value` is the 14-bit bend amount; 0x2000 is center.
    fn pitch_bend(&mut self, channel: u8, value: u16) -> HandlerResult {
        let _ = (channel, value);
        Ok(())
    }

    // system exclusive and friends

    /// A complete sysex payload, `0xF0` stripped, terminating `0xF7` present.
    fn system_exclusive(&mut self, data: &[u8]) -> HandlerResult {
        let _ = data;
        Ok(())
    }

    fn escape_sequence(&mut self, data: &[u8]) -> HandlerResult {
        let _ = data;
        Ok(())
    }

    fn invalid_message(&mut self, status: u8, data: &[u8]) -> HandlerResult {
        let _ = (status, data);
        Ok(())
    }

    // meta events

    fn sequence_number(&mut self, value: u16) -> HandlerResult {
        let _ = value;
        Ok(())
    }

    fn text(&mut self, text: &[u8]) -> HandlerResult {
        let _ = text;
        Ok(())
    }

    fn copyright(&mut self, text: &[u8]) -> HandlerResult {
        let _ = text;
        Ok(())
    }

    /// In a format 1 file the name on track 0 names the whole sequence.
    fn sequence_name(&mut self, text: &[u8]) -> HandlerResult {
        let _ = text;
        Ok(())
    }

    fn instrument_name(&mut self, text: &[u8]) -> HandlerResult {
        let _ = text;
        Ok(())
    }

    fn lyric(&mut self, text: &[u8]) -> HandlerResult {
        let _ = text;
        Ok(())
    }

    fn marker(&mut self, text: &[u8]) -> HandlerResult {
        let _ = text;
        Ok(())
    }

    fn cue_point(&mut self, text: &[u8]) -> HandlerResult {
        let _ = text;
        Ok(())
    }

    fn program_name(&mut self, text: &[u8]) -> HandlerResult {
        let _ = text;
        Ok(())
    }

    fn device_name(&mut self, text: &[u8]) -> HandlerResult {
        let _ = text;
        Ok(())
    }

    fn channel_prefix(&mut self, channel: u8) -> HandlerResult {
        let _ = channel;
        Ok(())
    }

    fn midi_port(&mut self, port: u8) -> HandlerResult {
        let _ = port;
        Ok(())
    }

    /// Tempo in microseconds per quarter-note.
    fn tempo(&mut self, microseconds_per_quarter: u32) -> HandlerResult {
        let _ = microseconds_per_quarter;
        Ok(())
    }

    fn smpte_offset(
        &mut self,
        hour: u8,
        minute: u8,
        second: u8,
        frame: u8,
        frame_part: u8,
    ) -> HandlerResult {
        let _ = (hour, minute, second, frame, frame_part);
        Ok(())
    }

    fn time_signature(
        &mut self,
        numerator: u8,
        denominator: u8,
        clocks_per_click: u8,
        thirty_seconds_per_quarter: u8,
    ) -> HandlerResult {
        let _ = (
            numerator,
            denominator,
            clocks_per_click,
            thirty_seconds_per_quarter,
        );
        Ok(())
    }

    fn key_signature(&mut self, accidentals: i8, minor: bool) -> HandlerResult {
        let _ = (accidentals, minor);
        Ok(())
    }

    fn sequencer_specific(&mut self, data: &[u8]) -> HandlerResult {
        let _ = data;
        Ok(())
    }

    /// Meta events of unrecognized type, or recognized types whose payload
    /// has the wrong length.
    fn unknown_meta(&mut self, meta_type: u8, data: &[u8]) -> HandlerResult {
        let _ = (meta_type, data);
        Ok(())
    }
}

/// Wraps a [`MessageHandler`] to receive raw parser events, decompose them,
/// and keep the time bookkeeping: a running absolute tick count and the
/// relative ticks since the previous event.
pub struct DispatchingHandler<M: MessageHandler> {
    inner: M,
    relative_ticks: u32,
    absolute_ticks: u64,
    current_track: Option<u16>,
    convert_zero_velocity: bool,
}

impl<M: MessageHandler> DispatchingHandler<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            relative_ticks: 0,
            absolute_ticks: 0,
            current_track: None,
            convert_zero_velocity: true,
        }
    }

    /// A note-on with a velocity of 0x00 is actually the same as a note-off
    /// with a velocity of 0x40. When this flag is set (the default), such
    /// note-ons are delivered through `note_off`, which is less surprising
    /// for anyone not versed in the intimate details of the MIDI spec.
    pub fn convert_zero_velocity(mut self, convert: bool) -> Self {
        self.convert_zero_velocity = convert;
        self
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    pub fn into_inner(self) -> M {
        self.inner
    }

    /// Ticks since the start of the current track.
    pub fn absolute_ticks(&self) -> u64 {
        self.absolute_ticks
    }

    /// Ticks since the previous event.
    pub fn relative_ticks(&self) -> u32 {
        self.relative_ticks
    }

    pub fn current_track(&self) -> Option<u16> {
        self.current_track
    }

    fn dispatch_channel(&mut self, event: &Event) -> HandlerResult {
        let (status, channel) = match event.kind() {
            EventKind::ChannelVoice { status, channel } => (*status, *channel),
            _ => return Ok(()),
        };
        let data = event.data();
        match status {
            StatusType::NoteOn => {
                let (note, velocity) = (data[0], data[1]);
                if velocity == 0 && self.convert_zero_velocity {
                    self.inner.note_off(channel, note, 0x40)
                } else {
                    self.inner.note_on(channel, note, velocity)
                }
            }
            StatusType::NoteOff => self.inner.note_off(channel, data[0], data[1]),
            StatusType::PolyPressure => self.inner.poly_pressure(channel, data[0], data[1]),
            StatusType::Control => self.inner.controller_change(channel, data[0], data[1]),
            StatusType::Program => self.inner.program_change(channel, data[0]),
            StatusType::ChannelPressure => self.inner.channel_pressure(channel, data[0]),
            StatusType::PitchBend => {
                // lsb arrives first on the wire
                let value = (u16::from(data[1]) << 7) | u16::from(data[0]);
                self.inner.pitch_bend(channel, value)
            }
        }
    }

    fn dispatch_meta(&mut self, event: &Event) -> HandlerResult {
        let meta_type = match event.meta_type() {
            Some(t) => t,
            None => return Ok(()),
        };
        let data = event.data();
        match meta_type {
            META_END_OF_TRACK => Ok(()), // delivered through end_of_track
            META_TEMPO if data.len() == 3 => self.inner.tempo(read_bew(data)),
            META_TIME_SIGNATURE if data.len() == 4 => {
                self.inner.time_signature(data[0], data[1], data[2], data[3])
            }
            META_KEY_SIGNATURE if data.len() == 2 => {
                self.inner.key_signature(data[0] as i8, data[1] == 1)
            }
            META_SEQUENCE_NAME => self.inner.sequence_name(data),
            META_PROGRAM_NAME => self.inner.program_name(data),
            META_INSTRUMENT_NAME => self.inner.instrument_name(data),
            META_TEXT => self.inner.text(data),
            META_COPYRIGHT => self.inner.copyright(data),
            META_SEQUENCE_NUMBER if data.len() == 2 => {
                self.inner.sequence_number(read_bew(data) as u16)
            }
            META_LYRIC => self.inner.lyric(data),
            META_MARKER => self.inner.marker(data),
            META_CUE_POINT => self.inner.cue_point(data),
            META_DEVICE_NAME => self.inner.device_name(data),
            META_CHANNEL_PREFIX if data.len() == 1 => self.inner.channel_prefix(data[0]),
            META_MIDI_PORT if data.len() == 1 => self.inner.midi_port(data[0]),
            META_SMPTE_OFFSET if data.len() == 5 => self
                .inner
                .smpte_offset(data[0], data[1], data[2], data[3], data[4]),
            META_SEQUENCER_SPECIFIC => self.inner.sequencer_specific(data),
            _ => self.inner.unknown_meta(meta_type, data),
        }
    }
}

impl<M: MessageHandler> EventHandler for DispatchingHandler<M> {
    fn header(&mut self, header: &Header) -> HandlerResult {
        self.inner.header(header)
    }

    fn reset_ticks(&mut self) -> HandlerResult {
        self.relative_ticks = 0;
        self.absolute_ticks = 0;
        Ok(())
    }

    fn update_ticks(&mut self, delta_ticks: u32) -> HandlerResult {
        self.relative_ticks = delta_ticks;
        self.absolute_ticks += u64::from(delta_ticks);
        Ok(())
    }

    fn start_of_track(&mut self, track: u16) -> HandlerResult {
        self.current_track = Some(track);
        self.inner.start_of_track(track)
    }

    fn end_of_track(&mut self, track: u16) -> HandlerResult {
        self.current_track = None;
        self.inner.end_of_track(track)
    }

    fn channel_message(&mut self, event: Event) -> HandlerResult {
        self.dispatch_channel(&event)
    }

    fn sysex_message(&mut self, event: Event) -> HandlerResult {
        self.inner.system_exclusive(event.data())
    }

    fn escape_sequence(&mut self, event: Event) -> HandlerResult {
        self.inner.escape_sequence(event.data())
    }

    fn meta_message(&mut self, event: Event) -> HandlerResult {
        self.dispatch_meta(&event)
    }

    fn invalid_message(&mut self, event: Event) -> HandlerResult {
        warn!(
            "received invalid event type ({:#04X}) of {} bytes",
            event.status_byte(),
            event.data().len()
        );
        self.inner.invalid_message(event.status_byte(), event.data())
    }

    fn eof(&mut self) -> HandlerResult {
        self.current_track = None;
        self.inner.eof()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use std::io::Cursor;

    #[derive(Default)]
    struct NoteLog {
        ons: Vec<(u8, u8, u8)>,
        offs: Vec<(u8, u8, u8)>,
        tempos: Vec<u32>,
        bends: Vec<(u8, u16)>,
        unknown_metas: Vec<u8>,
    }

    impl MessageHandler for NoteLog {
        fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> HandlerResult {
            self.ons.push((channel, note, velocity));
            Ok(())
        }

        fn note_off(&mut self, channel: u8, note: u8, velocity: u8) -> HandlerResult {
            self.offs.push((channel, note, velocity));
            Ok(())
        }

        fn tempo(&mut self, microseconds_per_quarter: u32) -> HandlerResult {
            self.tempos.push(microseconds_per_quarter);
            Ok(())
        }

        fn pitch_bend(&mut self, channel: u8, value: u16) -> HandlerResult {
            self.bends.push((channel, value));
            Ok(())
        }

        fn unknown_meta(&mut self, meta_type: u8, _data: &[u8]) -> HandlerResult {
            self.unknown_metas.push(meta_type);
            Ok(())
        }
    }

    fn file_with_track(track_payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![
            0x4D, 0x54, 0x68, 0x64, 0x00, 0x00, 0x00, 0x06, //
            0x00, 0x00, 0x00, 0x01, 0x00, 0x60,
        ];
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(track_payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(track_payload);
        bytes
    }

    fn run(track: &[u8]) -> DispatchingHandler<NoteLog> {
        let mut handler = DispatchingHandler::new(NoteLog::default());
        parse(Cursor::new(file_with_track(track)), &mut handler, true).unwrap();
        handler
    }

    #[test]
    fn zero_velocity_becomes_note_off() {
        let handler = run(&[
            0x00, 0x90, 0x40, 0x64, // note on
            0x10, 0x40, 0x00, // running status, velocity 0
            0x00, 0xFF, 0x2F, 0x00,
        ]);
        let log = handler.inner();
        assert_eq!(vec![(0, 0x40, 0x64)], log.ons);
        assert_eq!(vec![(0, 0x40, 0x40)], log.offs);
    }

    #[test]
    fn zero_velocity_conversion_disabled() {
        let mut handler = DispatchingHandler::new(NoteLog::default()).convert_zero_velocity(false);
        let track = [
            0x00, 0x90, 0x40, 0x00, // note on, velocity 0
            0x00, 0xFF, 0x2F, 0x00,
        ];
        parse(Cursor::new(file_with_track(&track)), &mut handler, true).unwrap();
        let log = handler.inner();
        assert_eq!(vec![(0, 0x40, 0x00)], log.ons);
        assert!(log.offs.is_empty());
    }

    #[test]
    fn tempo_decomposition() {
        let handler = run(&[
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // 500000 us per quarter
            0x00, 0xFF, 0x2F, 0x00,
        ]);
        assert_eq!(vec![500_000], handler.inner().tempos);
    }

    #[test]
    fn pitch_bend_least_significant_byte_first() {
        let handler = run(&[
            0x00, 0xE0, 0x00, 0x40, // center
            0x00, 0xE0, 0x7F, 0x7F, // maximum
            0x00, 0xFF, 0x2F, 0x00,
        ]);
        assert_eq!(vec![(0, 0x2000), (0, 0x3FFF)], handler.inner().bends);
    }

    #[test]
    fn malformed_meta_payload_goes_to_unknown() {
        let handler = run(&[
            0x00, 0xFF, 0x51, 0x02, 0x07, 0xA1, // tempo with only two bytes
            0x00, 0xFF, 0x2F, 0x00,
        ]);
        assert!(handler.inner().tempos.is_empty());
        assert_eq!(vec![0x51], handler.inner().unknown_metas);
    }

    #[test]
    fn tick_bookkeeping() {
        let handler = run(&[
            0x00, 0x90, 0x40, 0x64, //
            0x81, 0x40, 0x80, 0x40, 0x40, // delta 192
            0x60, 0xFF, 0x2F, 0x00, // delta 96
        ]);
        assert_eq!(288, handler.absolute_ticks());
        assert_eq!(None, handler.current_track());
    }
}
