//! The symmetric encoder: a handler-shaped component that turns event calls
//! back into a Standard MIDI File. Events accumulate in a per-track buffer so
//! the `MTrk` length can be computed, and every event is written with an
//! explicit status byte; running status is never emitted.

use crate::constants::{
    CHANNEL_PRESSURE, CONTROLLER_CHANGE, END_OF_EXCLUSIVE, MAX_MICROSECONDS_PER_QUARTER,
    META_CHANNEL_PREFIX, META_COPYRIGHT, META_CUE_POINT, META_DEVICE_NAME, META_END_OF_TRACK,
    META_EVENT, META_INSTRUMENT_NAME, META_LYRIC, META_MARKER, META_MIDI_PORT, META_PROGRAM_NAME,
    META_SEQUENCER_SPECIFIC, META_SEQUENCE_NAME, META_SEQUENCE_NUMBER, META_SMPTE_OFFSET,
    META_TEMPO, META_TEXT, META_TIME_SIGNATURE, META_KEY_SIGNATURE, NOTE_OFF, NOTE_ON,
    PITCH_BEND, POLY_PRESSURE, PROGRAM_CHANGE, SYSTEM_EXCLUSIVE,
};
use crate::core::bew::write_bew;
use crate::core::vlq::{encode_u32, MAX_VLQ_VALUE};
use crate::file::{Division, Event, Format, Header};
use crate::handler::{EventHandler, HandlerError, HandlerResult};
use crate::Result;
use log::trace;
use snafu::ResultExt;
use std::io::Write;

/// Writes MIDI events out as a Standard MIDI File. The sink receives the
/// header chunk immediately; track events collect in an internal buffer that
/// is emitted, with its length, by `end_of_track`.
pub struct Writer<W: Write> {
    sink: W,
    track_buffer: Option<Vec<u8>>,
    relative_ticks: u32,
    absolute_ticks: u64,
    current_track: Option<u16>,
}

impl<W: Write> Writer<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            track_buffer: None,
            relative_ticks: 0,
            absolute_ticks: 0,
            current_track: None,
        }
    }

    /// Give the sink back, discarding any unfinished track buffer.
    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Ticks accumulated since the last written event.
    pub fn relative_ticks(&self) -> u32 {
        self.relative_ticks
    }

    /// Ticks since the start of the current track.
    pub fn absolute_ticks(&self) -> u64 {
        self.absolute_ticks
    }

    /// Write the `MThd` chunk.
    pub fn header(&mut self, format: Format, num_tracks: u16, division: Division) -> Result<()> {
        if format == Format::Single && num_tracks != 1 {
            badarg!(
                "a format 0 file must declare exactly 1 track, not {}",
                num_tracks
            );
        }
        Header::new(format, num_tracks, division).write(&mut self.sink)?;
        Ok(())
    }

    /// Open a track: subsequent events are buffered until `end_of_track`.
    pub fn start_of_track(&mut self) -> Result<()> {
        if self.track_buffer.is_some() {
            badarg!(
                "track {} is still open",
                self.current_track.unwrap_or_default()
            );
        }
        let track = match self.current_track {
            None => 0,
            Some(t) => t + 1,
        };
        trace!("starting track {}", track);
        self.current_track = Some(track);
        self.track_buffer = Some(Vec::new());
        self.relative_ticks = 0;
        self.absolute_ticks = 0;
        Ok(())
    }

    /// Let `delta_ticks` elapse before the next event.
    pub fn update_ticks(&mut self, delta_ticks: u32) -> Result<()> {
        self.relative_ticks = match self.relative_ticks.checked_add(delta_ticks) {
            Some(v) if v <= MAX_VLQ_VALUE => v,
            _ => badarg!(
                "accumulated delta time exceeds the four-byte limit ({})",
                MAX_VLQ_VALUE
            ),
        };
        self.absolute_ticks += u64::from(delta_ticks);
        Ok(())
    }

    /// Position the next event at an absolute tick. Rewinding is an error.
    pub fn set_absolute_ticks(&mut self, ticks: u64) -> Result<()> {
        if ticks < self.absolute_ticks {
            badarg!(
                "cannot rewind from tick {} to tick {}",
                self.absolute_ticks,
                ticks
            );
        }
        let delta = ticks - self.absolute_ticks;
        if delta > u64::from(MAX_VLQ_VALUE) {
            badarg!("a delta of {} ticks does not fit a four-byte quantity", delta);
        }
        self.update_ticks(delta as u32)
    }

    /// The low-level primitive: write the accumulated delta time as a
    /// variable-length quantity, then the raw event bytes, into the current
    /// track buffer.
    pub fn event_slice(&mut self, event_bytes: &[u8]) -> Result<()> {
        let delta = self.relative_ticks;
        let buffer = match self.track_buffer.as_mut() {
            Some(b) => b,
            None => badarg!("event of {} bytes written outside a track", event_bytes.len()),
        };
        buffer.extend_from_slice(&encode_u32(delta));
        buffer.extend_from_slice(event_bytes);
        self.relative_ticks = 0;
        Ok(())
    }

    /// Close the track: append the end-of-track meta event and emit the
    /// `MTrk` chunk with its computed length.
    pub fn end_of_track(&mut self) -> Result<()> {
        let track_data = match self.track_buffer.take() {
            Some(b) => b,
            None => badarg!("end_of_track with no track open (track {:?})", self.current_track),
        };
        let mut eot_slice = encode_u32(self.relative_ticks);
        eot_slice.extend_from_slice(&[META_EVENT, META_END_OF_TRACK, 0x00]);
        self.relative_ticks = 0;

        self.sink.write_all(b"MTrk").context(wr!())?;
        let chunk_length = (track_data.len() + eot_slice.len()) as u32;
        self.sink
            .write_all(&chunk_length.to_be_bytes())
            .context(wr!())?;
        self.sink.write_all(&track_data).context(wr!())?;
        self.sink.write_all(&eot_slice).context(wr!())?;
        trace!(
            "wrote track {} of {} bytes",
            self.current_track.unwrap_or_default(),
            chunk_length
        );
        Ok(())
    }

    /// Flush the sink. No more tracks may follow.
    pub fn eof(&mut self) -> Result<()> {
        if self.track_buffer.is_some() {
            badarg!(
                "eof with track {} still open",
                self.current_track.unwrap_or_default()
            );
        }
        self.sink.flush().context(wr!())?;
        Ok(())
    }

    // channel voice events

    pub fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<()> {
        check_channel(channel)?;
        check_data_byte("note", note)?;
        check_data_byte("velocity", velocity)?;
        self.event_slice(&[NOTE_ON | channel, note, velocity])
    }

    pub fn note_off(&mut self, channel: u8, note: u8, velocity: u8) -> Result<()> {
        check_channel(channel)?;
        check_data_byte("note", note)?;
        check_data_byte("velocity", velocity)?;
        self.event_slice(&[NOTE_OFF | channel, note, velocity])
    }

    /// Polyphonic key pressure, status `0xA0`.
    pub fn poly_pressure(&mut self, channel: u8, note: u8, pressure: u8) -> Result<()> {
        check_channel(channel)?;
        check_data_byte("note", note)?;
        check_data_byte("pressure", pressure)?;
        self.event_slice(&[POLY_PRESSURE | channel, note, pressure])
    }

    pub fn controller_change(&mut self, channel: u8, controller: u8, value: u8) -> Result<()> {
        check_channel(channel)?;
        check_data_byte("controller", controller)?;
        check_data_byte("value", value)?;
        self.event_slice(&[CONTROLLER_CHANGE | channel, controller, value])
    }

    pub fn program_change(&mut self, channel: u8, program: u8) -> Result<()> {
        check_channel(channel)?;
        check_data_byte("program", program)?;
        self.event_slice(&[PROGRAM_CHANGE | channel, program])
    }

    pub fn channel_pressure(&mut self, channel: u8, pressure: u8) -> Result<()> {
        check_channel(channel)?;
        check_data_byte("pressure", pressure)?;
        self.event_slice(&[CHANNEL_PRESSURE | channel, pressure])
    }

    /// Pitch bend, a 14-bit value written least-significant byte first.
    /// 0x2000 is center.
    pub fn pitch_bend(&mut self, channel: u8, value: u16) -> Result<()> {
        check_channel(channel)?;
        if value > 0x3FFF {
            badarg!("pitch bend {} is out of range 0..=16383", value);
        }
        let lsb = (value & 0x7F) as u8;
        let msb = ((value >> 7) & 0x7F) as u8;
        self.event_slice(&[PITCH_BEND | channel, lsb, msb])
    }

    // system exclusive

    /// Write a complete system exclusive message. `data` is the payload
    /// between the `F0` and the terminating `F7`, both of which are written
    /// by this method.
    pub fn system_exclusive(&mut self, data: &[u8]) -> Result<()> {
        let mut bytes = vec![SYSTEM_EXCLUSIVE];
        bytes.extend_from_slice(&vlq_length(data.len() + 1)?);
        bytes.extend_from_slice(data);
        bytes.push(END_OF_EXCLUSIVE);
        self.event_slice(&bytes)
    }

    /// Write an escape sequence carrying arbitrary bytes, typically a system
    /// common or real time message that has no place of its own in a file.
    pub fn escape_sequence(&mut self, data: &[u8]) -> Result<()> {
        let mut bytes = vec![END_OF_EXCLUSIVE];
        bytes.extend_from_slice(&vlq_length(data.len())?);
        bytes.extend_from_slice(data);
        self.event_slice(&bytes)
    }

    // meta events

    /// Write a meta event of the given type.
    pub fn meta_slice(&mut self, meta_type: u8, data: &[u8]) -> Result<()> {
        if meta_type > 0x7F {
            badarg!("meta type {:#04X} is out of range 0..=0x7F", meta_type);
        }
        let mut bytes = vec![META_EVENT, meta_type];
        bytes.extend_from_slice(&vlq_length(data.len())?);
        bytes.extend_from_slice(data);
        self.event_slice(&bytes)
    }

    pub fn sequence_number(&mut self, value: u16) -> Result<()> {
        self.meta_slice(META_SEQUENCE_NUMBER, &write_bew(u32::from(value), 2))
    }

    pub fn text(&mut self, text: &str) -> Result<()> {
        self.meta_slice(META_TEXT, text.as_bytes())
    }

    pub fn copyright(&mut self, text: &str) -> Result<()> {
        self.meta_slice(META_COPYRIGHT, text.as_bytes())
    }

    /// The name of the sequence (track 0) or of the track.
    pub fn sequence_name(&mut self, text: &str) -> Result<()> {
        self.meta_slice(META_SEQUENCE_NAME, text.as_bytes())
    }

    pub fn instrument_name(&mut self, text: &str) -> Result<()> {
        self.meta_slice(META_INSTRUMENT_NAME, text.as_bytes())
    }

    pub fn lyric(&mut self, text: &str) -> Result<()> {
        self.meta_slice(META_LYRIC, text.as_bytes())
    }

    pub fn marker(&mut self, text: &str) -> Result<()> {
        self.meta_slice(META_MARKER, text.as_bytes())
    }

    pub fn cue_point(&mut self, text: &str) -> Result<()> {
        self.meta_slice(META_CUE_POINT, text.as_bytes())
    }

    pub fn program_name(&mut self, text: &str) -> Result<()> {
        self.meta_slice(META_PROGRAM_NAME, text.as_bytes())
    }

    pub fn device_name(&mut self, text: &str) -> Result<()> {
        self.meta_slice(META_DEVICE_NAME, text.as_bytes())
    }

    pub fn channel_prefix(&mut self, channel: u8) -> Result<()> {
        check_channel(channel)?;
        self.meta_slice(META_CHANNEL_PREFIX, &[channel])
    }

    /// MIDI port meta event, type `0x21`.
    pub fn midi_port(&mut self, port: u8) -> Result<()> {
        check_data_byte("port", port)?;
        self.meta_slice(META_MIDI_PORT, &[port])
    }

    /// Set tempo in microseconds per quarter-note.
    pub fn tempo(&mut self, microseconds_per_quarter: u32) -> Result<()> {
        if microseconds_per_quarter > MAX_MICROSECONDS_PER_QUARTER {
            badarg!(
                "tempo {} exceeds the three-byte maximum {}",
                microseconds_per_quarter,
                MAX_MICROSECONDS_PER_QUARTER
            );
        }
        // the tempo payload is a bare three-byte big-endian value
        self.meta_slice(META_TEMPO, &microseconds_per_quarter.to_be_bytes()[1..])
    }

    pub fn smpte_offset(
        &mut self,
        hour: u8,
        minute: u8,
        second: u8,
        frame: u8,
        frame_part: u8,
    ) -> Result<()> {
        self.meta_slice(
            META_SMPTE_OFFSET,
            &[hour, minute, second, frame, frame_part],
        )
    }

    /// Time signature: `numerator`, `denominator` as a negative power of two
    /// (2 = quarter note, 3 = eighth), MIDI `clocks_per_click`, and the
    /// number of notated 32nd notes per MIDI quarter note.
    pub fn time_signature(
        &mut self,
        numerator: u8,
        denominator: u8,
        clocks_per_click: u8,
        thirty_seconds_per_quarter: u8,
    ) -> Result<()> {
        self.meta_slice(
            META_TIME_SIGNATURE,
            &[
                numerator,
                denominator,
                clocks_per_click,
                thirty_seconds_per_quarter,
            ],
        )
    }

    /// Key signature: `accidentals` counts sharps (positive) or flats
    /// (negative), -7 through 7; `minor` selects the minor mode.
    pub fn key_signature(&mut self, accidentals: i8, minor: bool) -> Result<()> {
        if !(-7..=7).contains(&accidentals) {
            badarg!("{} accidentals is out of range -7..=7", accidentals);
        }
        self.meta_slice(
            META_KEY_SIGNATURE,
            &[accidentals as u8, if minor { 1 } else { 0 }],
        )
    }

    pub fn sequencer_specific(&mut self, data: &[u8]) -> Result<()> {
        self.meta_slice(META_SEQUENCER_SPECIFIC, data)
    }
}

fn check_channel(channel: u8) -> Result<()> {
    if channel > 15 {
        badarg!("channel {} is out of range 0..=15", channel);
    }
    Ok(())
}

fn check_data_byte(name: &str, value: u8) -> Result<()> {
    if value > 127 {
        badarg!("{} {} is out of range 0..=127", name, value);
    }
    Ok(())
}

fn vlq_length(len: usize) -> Result<Vec<u8>> {
    if len > MAX_VLQ_VALUE as usize {
        badarg!("a payload of {} bytes does not fit a four-byte length", len);
    }
    Ok(encode_u32(len as u32))
}

// The writer is a discrete component that happens to speak the handler
// interface, so a parse can be replayed into it directly. The end-of-track
// meta event arriving through `meta_message` is absorbed because
// `end_of_track` writes its own.
impl<W: Write> EventHandler for Writer<W> {
    fn header(&mut self, header: &Header) -> HandlerResult {
        Writer::header(self, *header.format(), header.num_tracks(), *header.division())
            .map_err(HandlerError::from)
    }

    fn reset_ticks(&mut self) -> HandlerResult {
        self.relative_ticks = 0;
        self.absolute_ticks = 0;
        Ok(())
    }

    fn update_ticks(&mut self, delta_ticks: u32) -> HandlerResult {
        Writer::update_ticks(self, delta_ticks).map_err(HandlerError::from)
    }

    fn start_of_track(&mut self, _track: u16) -> HandlerResult {
        Writer::start_of_track(self).map_err(HandlerError::from)
    }

    fn end_of_track(&mut self, _track: u16) -> HandlerResult {
        Writer::end_of_track(self).map_err(HandlerError::from)
    }

    fn channel_message(&mut self, event: Event) -> HandlerResult {
        self.event_slice(&event.to_file_bytes())
            .map_err(HandlerError::from)
    }

    fn sysex_message(&mut self, event: Event) -> HandlerResult {
        self.event_slice(&event.to_file_bytes())
            .map_err(HandlerError::from)
    }

    fn escape_sequence(&mut self, event: Event) -> HandlerResult {
        self.event_slice(&event.to_file_bytes())
            .map_err(HandlerError::from)
    }

    fn meta_message(&mut self, event: Event) -> HandlerResult {
        if event.is_end_of_track() {
            return Ok(());
        }
        self.event_slice(&event.to_file_bytes())
            .map_err(HandlerError::from)
    }

    fn invalid_message(&mut self, event: Event) -> HandlerResult {
        self.event_slice(&event.to_file_bytes())
            .map_err(HandlerError::from)
    }

    fn eof(&mut self) -> HandlerResult {
        Writer::eof(self).map_err(HandlerError::from)
    }
}
