//! The streaming parser. It pulls bytes from a seekable source, keeps only
//! the state it needs to decode the raw data (running status, a pending
//! sysex assembly), and reports everything else to the handler as it goes.

use crate::byte_source::{ByteError, ByteSource};
use crate::constants::{system_data_len, END_OF_EXCLUSIVE, META_END_OF_TRACK, META_EVENT, SYSTEM_EXCLUSIVE};
use crate::core::StatusType;
use crate::error::{self, LibResult};
use crate::file::{Division, Event, EventKind, Format, Header};
use crate::handler::EventHandler;
use crate::Result;
use log::{debug, trace, warn};
use snafu::ResultExt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

/// How the parser treats files that bend the rules. In strict mode every
/// structural problem aborts the parse; in lenient mode the parser warns and
/// does its best to resynchronize. Handler and io errors surface in both
/// modes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ParserSettings {
    pub strict: bool,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Parse a complete file from a seekable byte source, driving `handler`.
pub fn parse<R: Read + Seek, H: EventHandler>(source: R, handler: H, strict: bool) -> Result<()> {
    let mut parser = Parser::with_settings(source, handler, ParserSettings { strict });
    parser.parse_header()?;
    parser.parse_tracks()
}

/// Parse a file from disk, driving `handler`.
pub fn parse_file<P: AsRef<Path>, H: EventHandler>(
    path: P,
    handler: H,
    strict: bool,
) -> Result<()> {
    let source = ByteSource::new_file(path).context(io!())?;
    let mut parser = Parser::from_source(source, handler, ParserSettings { strict });
    parser.parse_header()?;
    parser.parse_tracks()
}

/// A partially assembled multi-packet sysex message. Owned by the parser
/// until the terminating `0xF7` arrives, then handed to the handler stamped
/// with the time of the first packet.
struct SysexAssembly {
    data: Vec<u8>,
    delta_ticks: u32,
    absolute_ticks: u64,
}

enum TrackRead<T> {
    Value(T),
    /// The file ended mid-track and lenient mode elected to stop.
    Eof,
}

/// The streaming decoder. Walks `MThd`/`MTrk` chunks and calls the handler
/// for each lifecycle point and event. The parser retains no reference to an
/// event after dispatch.
pub struct Parser<R: Read + Seek, H: EventHandler> {
    source: ByteSource<R>,
    handler: H,
    settings: ParserSettings,
    header: Option<Header>,
    current_track: Option<u16>,
    running_status: Option<u8>,
    sysex: Option<SysexAssembly>,
}

impl<H: EventHandler> Parser<BufReader<File>, H> {
    /// Construct a parser over a file on disk.
    pub fn open<P: AsRef<Path>>(path: P, handler: H, settings: ParserSettings) -> Result<Self> {
        let source = ByteSource::new_file(path).context(io!())?;
        Ok(Self::from_source(source, handler, settings))
    }
}

impl<R: Read + Seek, H: EventHandler> Parser<R, H> {
    /// Construct a strict parser.
    pub fn new(source: R, handler: H) -> Self {
        Self::with_settings(source, handler, ParserSettings::default())
    }

    pub fn with_settings(source: R, handler: H, settings: ParserSettings) -> Self {
        Self::from_source(ByteSource::new(source), handler, settings)
    }

    pub(crate) fn from_source(source: ByteSource<R>, handler: H, settings: ParserSettings) -> Self {
        Self {
            source,
            handler,
            settings,
            header: None,
            current_track: None,
            running_status: None,
            sysex: None,
        }
    }

    /// Recover the handler once parsing is done.
    pub fn into_handler(self) -> H {
        self.handler
    }

    /// The header of the file, once `parse_header` has run.
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Read exactly one `MThd` chunk and dispatch `header` to the handler.
    pub fn parse_header(&mut self) -> Result<()> {
        Ok(self.parse_header_inner()?)
    }

    /// Read chunks until the end of the file. Each `MTrk` chunk runs the
    /// track state machine; unknown chunks are skipped. Dispatches `eof`
    /// when the stream is exhausted.
    pub fn parse_tracks(&mut self) -> Result<()> {
        Ok(self.parse_tracks_inner()?)
    }

    fn parse_header_inner(&mut self) -> LibResult<()> {
        trace!("parsing header chunk");
        let chunk_id = trunc!(self.source.read4(), TruncatedHeaderSnafu);
        if &chunk_id != b"MThd" {
            return error::InvalidChunkIdSnafu {
                site: site!(),
                expected: "MThd",
                found: String::from_utf8_lossy(&chunk_id).to_string(),
            }
            .fail();
        }
        let chunk_length = trunc!(self.source.read_u32(), TruncatedHeaderSnafu);
        if chunk_length < 6 {
            violation!("header chunk length {} is less than 6", chunk_length);
        }
        let format_word = trunc!(self.source.read_u16(), TruncatedHeaderSnafu);
        let num_tracks = trunc!(self.source.read_u16(), TruncatedHeaderSnafu);
        let division_word = trunc!(self.source.read_u16(), TruncatedHeaderSnafu);
        let format = Format::from_u16(format_word)?;
        let division = Division::from_u16(division_word)?;

        if format == Format::Single && num_tracks > 1 {
            if self.settings.strict {
                violation!(
                    "invalid number of tracks ({}): a format 0 file may only contain one",
                    num_tracks
                );
            }
            warn!(
                "invalid number of tracks ({}): a format 0 file may only contain one",
                num_tracks
            );
        }

        // A header larger than 6 bytes is theoretically possible; ignore the
        // unknown trailing data.
        if chunk_length > 6 {
            warn!(
                "invalid header size ({}), skipping trailing header bytes",
                chunk_length
            );
            self.source
                .skip(u64::from(chunk_length) - 6)
                .context(io!())?;
        }

        let header = Header::new(format, num_tracks, division);
        debug!("parsed {:?}", header);
        self.handler
            .header(&header)
            .context(error::HandlerSnafu { site: site!() })?;
        self.header = Some(header);
        Ok(())
    }

    fn parse_tracks_inner(&mut self) -> LibResult<()> {
        loop {
            let (chunk_id, chunk_length) = match self.next_chunk()? {
                Some(chunk) => chunk,
                None => break,
            };
            if &chunk_id == b"MTrk" {
                trace!("parsing track chunk of {} bytes", chunk_length);
                match self.parse_track(chunk_length)? {
                    TrackRead::Value(()) => {}
                    TrackRead::Eof => break,
                }
            } else {
                self.skip_chunk(chunk_id, chunk_length)?;
            }
        }
        self.handler
            .eof()
            .context(error::HandlerSnafu { site: site!() })?;
        Ok(())
    }

    /// Read the next chunk id and length. `None` means a clean end of file.
    fn next_chunk(&mut self) -> LibResult<Option<([u8; 4], u32)>> {
        let first = match self.source.read().context(io!())? {
            Some(byte) => byte,
            None => return Ok(None),
        };
        let mut chunk_id = [first, 0, 0, 0];
        for slot in chunk_id.iter_mut().skip(1) {
            *slot = match self.source.read().context(io!())? {
                Some(byte) => byte,
                None => {
                    if self.settings.strict {
                        return error::TruncatedChunkSnafu { site: site!() }.fail();
                    }
                    warn!("the file ends inside a chunk id");
                    return Ok(None);
                }
            };
        }
        let chunk_length = match self.source.read_u32() {
            Ok(value) => value,
            Err(ByteError::End { .. }) => {
                if self.settings.strict {
                    return error::TruncatedChunkSnafu { site: site!() }.fail();
                }
                warn!("the file ends inside a chunk length");
                return Ok(None);
            }
            Err(e) => return Err(e).context(io!()),
        };
        Ok(Some((chunk_id, chunk_length)))
    }

    fn skip_chunk(&mut self, chunk_id: [u8; 4], chunk_length: u32) -> LibResult<()> {
        let printable = chunk_id
            .iter()
            .all(|b| b.is_ascii_graphic() || *b == b' ');
        if printable {
            debug!(
                "skipping unknown chunk '{}' of {} bytes",
                String::from_utf8_lossy(&chunk_id),
                chunk_length
            );
        } else {
            if self.settings.strict {
                return error::InvalidChunkIdSnafu {
                    site: site!(),
                    expected: "MTrk",
                    found: format!("{:02X?}", chunk_id),
                }
                .fail();
            }
            warn!("skipping unrecognizable chunk id {:02X?}", chunk_id);
        }
        self.source.skip(u64::from(chunk_length)).context(io!())?;
        Ok(())
    }

    /// The track state machine. This is the most important part of the
    /// parser.
    fn parse_track(&mut self, chunk_length: u32) -> LibResult<TrackRead<()>> {
        self.running_status = None;
        self.sysex = None;

        let track = match self.current_track {
            None => 0,
            Some(t) => t + 1,
        };
        self.current_track = Some(track);

        if let Some(header) = &self.header {
            if track >= header.num_tracks() {
                if self.settings.strict {
                    violation!(
                        "supernumerary track no. {}: the header declares only {} tracks",
                        track + 1,
                        header.num_tracks()
                    );
                }
                warn!(
                    "supernumerary track no. {}: the header declares only {} tracks",
                    track + 1,
                    header.num_tracks()
                );
            }
        }

        self.dispatch_reset_ticks()?;
        self.handler
            .start_of_track(track)
            .context(error::HandlerSnafu { site: site!() })?;

        let track_end = self.source.position() + u64::from(chunk_length);
        let mut absolute_ticks = 0u64;
        let mut track_ended = false;

        while self.source.position() < track_end {
            let delta_ticks = match self.read_delta()? {
                TrackRead::Value(v) => v,
                TrackRead::Eof => return Ok(TrackRead::Eof),
            };
            absolute_ticks += u64::from(delta_ticks);
            if delta_ticks > 0 {
                trace!("delta_time {}", delta_ticks);
                self.handler
                    .update_ticks(delta_ticks)
                    .context(error::HandlerSnafu { site: site!() })?;
            }

            // Be aware of running status: a data byte here means the last
            // channel voice status byte is still in effect.
            let peeked = match self.source.peek().context(io!())? {
                Some(byte) => byte,
                None => {
                    if self.settings.strict {
                        return error::TruncatedTrackSnafu { site: site!() }.fail();
                    }
                    warn!("the file ends inside track {}", track);
                    return Ok(TrackRead::Eof);
                }
            };
            let status = if peeked & 0x80 == 0x80 {
                let byte = self.source.read_or_die().context(io!())?;
                self.running_status = match byte {
                    0x80..=0xEF => Some(byte),
                    _ => None,
                };
                byte
            } else {
                match self.running_status {
                    // the data byte stays put for the data phase
                    Some(running_status) => running_status,
                    None => {
                        if self.settings.strict {
                            return error::UnexpectedDataByteSnafu {
                                site: site!(),
                                byte: peeked,
                                offset: self.source.position(),
                            }
                            .fail();
                        }
                        warn!(
                            "non-status byte {:#04X} at offset {} with no running status in \
                             effect, trying to re-synchronize",
                            peeked,
                            self.source.position()
                        );
                        let _ = self.source.read().context(io!())?;
                        continue;
                    }
                }
            };

            let outcome = match status {
                META_EVENT => self.parse_meta(track, delta_ticks, absolute_ticks, &mut track_ended)?,
                SYSTEM_EXCLUSIVE => self.parse_sysex(track, delta_ticks, absolute_ticks)?,
                END_OF_EXCLUSIVE => self.parse_escape(track, delta_ticks, absolute_ticks)?,
                0xF1..=0xFE => self.parse_invalid(status, track, delta_ticks, absolute_ticks)?,
                _ => self.parse_channel_voice(status, track, delta_ticks, absolute_ticks)?,
            };
            match outcome {
                TrackRead::Value(()) => {}
                TrackRead::Eof => return Ok(TrackRead::Eof),
            }

            if track_ended {
                break;
            }

            if self.source.position() > track_end {
                if self.settings.strict {
                    return error::TruncatedTrackSnafu { site: site!() }.fail();
                }
                warn!(
                    "an event in track {} overran the declared chunk length",
                    track
                );
                break;
            }
        }

        if self.sysex.take().is_some() {
            if self.settings.strict {
                return error::TruncatedTrackSnafu { site: site!() }.fail();
            }
            warn!(
                "discarding an unterminated system exclusive message in track {}",
                track
            );
        }

        if track_ended {
            // an early end-of-track still owns the rest of its chunk
            let position = self.source.position();
            if position < track_end {
                debug!(
                    "skipping {} bytes between the end-of-track event and the chunk boundary",
                    track_end - position
                );
                self.source.skip(track_end - position).context(io!())?;
            }
        } else {
            if self.settings.strict {
                violation!("track {} has no end-of-track event", track);
            }
            warn!("track {} has no end-of-track event", track);
            self.handler
                .end_of_track(track)
                .context(error::HandlerSnafu { site: site!() })?;
        }

        Ok(TrackRead::Value(()))
    }

    fn parse_meta(
        &mut self,
        track: u16,
        delta_ticks: u32,
        absolute_ticks: u64,
        track_ended: &mut bool,
    ) -> LibResult<TrackRead<()>> {
        let meta_type = match self.read_fixed(1)? {
            TrackRead::Value(bytes) => bytes[0],
            TrackRead::Eof => return Ok(TrackRead::Eof),
        };
        let data = match self.read_sized_payload()? {
            TrackRead::Value(data) => data,
            TrackRead::Eof => return Ok(TrackRead::Eof),
        };
        let event = Event::new(
            EventKind::Meta { meta_type },
            data,
            track,
            delta_ticks,
            absolute_ticks,
        );
        trace!("parsed {:?}", event);
        self.handler
            .meta_message(event)
            .context(error::HandlerSnafu { site: site!() })?;
        if meta_type == META_END_OF_TRACK {
            debug!("end of track event");
            *track_ended = true;
            self.handler
                .end_of_track(track)
                .context(error::HandlerSnafu { site: site!() })?;
        }
        Ok(TrackRead::Value(()))
    }

    fn parse_sysex(
        &mut self,
        track: u16,
        delta_ticks: u32,
        absolute_ticks: u64,
    ) -> LibResult<TrackRead<()>> {
        let data = match self.read_sized_payload()? {
            TrackRead::Value(data) => data,
            TrackRead::Eof => return Ok(TrackRead::Eof),
        };
        // Some manufacturers split a sysex message over several events. A
        // packet without the terminating EOX byte starts a continuation.
        if data.last() == Some(&END_OF_EXCLUSIVE) {
            let event = Event::new(
                EventKind::SystemExclusive,
                data,
                track,
                delta_ticks,
                absolute_ticks,
            );
            trace!("parsed {:?}", event);
            self.handler
                .sysex_message(event)
                .context(error::HandlerSnafu { site: site!() })?;
        } else {
            trace!("sysex message not terminated, awaiting continuation");
            self.sysex = Some(SysexAssembly {
                data,
                delta_ticks,
                absolute_ticks,
            });
        }
        Ok(TrackRead::Value(()))
    }

    fn parse_escape(
        &mut self,
        track: u16,
        delta_ticks: u32,
        absolute_ticks: u64,
    ) -> LibResult<TrackRead<()>> {
        let data = match self.read_sized_payload()? {
            TrackRead::Value(data) => data,
            TrackRead::Eof => return Ok(TrackRead::Eof),
        };
        match self.sysex.take() {
            Some(mut assembly) => {
                let terminated = data.last() == Some(&END_OF_EXCLUSIVE);
                assembly.data.extend_from_slice(&data);
                if terminated {
                    // the whole message carries the time of its first packet
                    let event = Event::new(
                        EventKind::SystemExclusive,
                        assembly.data,
                        track,
                        assembly.delta_ticks,
                        assembly.absolute_ticks,
                    );
                    trace!("parsed {:?}", event);
                    self.handler
                        .sysex_message(event)
                        .context(error::HandlerSnafu { site: site!() })?;
                } else {
                    trace!("sysex continuation not terminated, still buffering");
                    self.sysex = Some(assembly);
                }
            }
            None => {
                let event = Event::new(
                    EventKind::EscapeSequence,
                    data,
                    track,
                    delta_ticks,
                    absolute_ticks,
                );
                trace!("parsed {:?}", event);
                self.handler
                    .escape_sequence(event)
                    .context(error::HandlerSnafu { site: site!() })?;
            }
        }
        Ok(TrackRead::Value(()))
    }

    fn parse_invalid(
        &mut self,
        status: u8,
        track: u16,
        delta_ticks: u32,
        absolute_ticks: u64,
    ) -> LibResult<TrackRead<()>> {
        let data = match self.read_fixed(system_data_len(status))? {
            TrackRead::Value(data) => data,
            TrackRead::Eof => return Ok(TrackRead::Eof),
        };
        let event = Event::new(
            EventKind::InvalidSystemCommon { status },
            data,
            track,
            delta_ticks,
            absolute_ticks,
        );
        warn!("invalid system status {:#04X} inside track {}", status, track);
        self.handler
            .invalid_message(event)
            .context(error::HandlerSnafu { site: site!() })?;
        Ok(TrackRead::Value(()))
    }

    fn parse_channel_voice(
        &mut self,
        status: u8,
        track: u16,
        delta_ticks: u32,
        absolute_ticks: u64,
    ) -> LibResult<TrackRead<()>> {
        let status_type = StatusType::from_u8(status >> 4)?;
        let channel = status & 0x0F;
        let data = match self.read_fixed(status_type.data_len())? {
            TrackRead::Value(data) => data,
            TrackRead::Eof => return Ok(TrackRead::Eof),
        };
        let event = Event::new(
            EventKind::ChannelVoice {
                status: status_type,
                channel,
            },
            data,
            track,
            delta_ticks,
            absolute_ticks,
        );
        trace!("parsed {:?}", event);
        self.handler
            .channel_message(event)
            .context(error::HandlerSnafu { site: site!() })?;
        Ok(TrackRead::Value(()))
    }

    /// Read a delta-time quantity, honoring strictness on truncation.
    fn read_delta(&mut self) -> LibResult<TrackRead<u32>> {
        match self.source.read_vlq_u32() {
            Ok(value) => Ok(TrackRead::Value(value)),
            Err(ByteError::End { .. }) => {
                if self.settings.strict {
                    return error::TruncatedVarlenSnafu { site: site!() }.fail();
                }
                warn!("the file ends inside a delta time");
                Ok(TrackRead::Eof)
            }
            Err(ByteError::VlqTooBig { .. }) => error::InvalidVlqSnafu { site: site!() }.fail(),
            Err(e) => Err(e).context(io!()),
        }
    }

    /// Read a VLQ length followed by that many payload bytes.
    fn read_sized_payload(&mut self) -> LibResult<TrackRead<Vec<u8>>> {
        let length = match self.source.read_vlq_u32() {
            Ok(value) => value,
            Err(ByteError::End { .. }) => {
                if self.settings.strict {
                    return error::TruncatedVarlenSnafu { site: site!() }.fail();
                }
                warn!("the file ends inside an event length");
                return Ok(TrackRead::Eof);
            }
            Err(ByteError::VlqTooBig { .. }) => {
                return error::InvalidVlqSnafu { site: site!() }.fail()
            }
            Err(e) => return Err(e).context(io!()),
        };
        self.read_fixed(length as usize)
    }

    /// Read an exact number of payload bytes, honoring strictness on
    /// truncation.
    fn read_fixed(&mut self, num_bytes: usize) -> LibResult<TrackRead<Vec<u8>>> {
        match self.source.read_n(num_bytes) {
            Ok(data) => Ok(TrackRead::Value(data)),
            Err(ByteError::End { .. }) => {
                if self.settings.strict {
                    return error::TruncatedTrackSnafu { site: site!() }.fail();
                }
                warn!("the file ends inside an event payload");
                Ok(TrackRead::Eof)
            }
            Err(e) => Err(e).context(io!()),
        }
    }

    fn dispatch_reset_ticks(&mut self) -> LibResult<()> {
        self.handler
            .reset_ticks()
            .context(error::HandlerSnafu { site: site!() })?;
        Ok(())
    }
}
