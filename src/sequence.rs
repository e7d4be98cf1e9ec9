//! An in-memory, time-indexed container for all events of a file, with the
//! handler that builds it. Wall-clock times are computed by integrating
//! tempo changes against the header's tick division as the file streams by.

use crate::constants::{DEFAULT_MICROSECONDS_PER_QUARTER, META_SEQUENCE_NAME, META_TEMPO};
use crate::core::bew::read_bew;
use crate::file::{Division, Event, Header};
use crate::handler::{EventHandler, HandlerResult};
use crate::parser::{parse, parse_file};
use crate::text::Text;
use crate::Result;
use log::debug;
use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::path::Path;

/// An [`Event`] stamped with its wall-clock time in seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct TimedEvent {
    event: Event,
    seconds: f64,
}

impl TimedEvent {
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Seconds from the start of the sequence, derived from the tempo map
    /// (or from the SMPTE rate for time-code files).
    pub fn seconds(&self) -> f64 {
        self.seconds
    }
}

/// All events of a file in parse order, plus the names and the initial tempo
/// the file carries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sequence {
    header: Option<Header>,
    events: Vec<TimedEvent>,
    sequence_name: Option<Text>,
    track_names: BTreeMap<u16, Text>,
    initial_tempo: Option<u32>,
}

impl Sequence {
    /// Parse a file from disk into a sequence (strict mode).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Sequence> {
        let mut builder = SequenceBuilder::new();
        parse_file(path, &mut builder, true)?;
        Ok(builder.into_sequence())
    }

    /// Parse a seekable byte source into a sequence (strict mode).
    pub fn from_reader<R: Read + Seek>(source: R) -> Result<Sequence> {
        let mut builder = SequenceBuilder::new();
        parse(source, &mut builder, true)?;
        Ok(builder.into_sequence())
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// The sequence name from track 0, if the file carried one.
    pub fn sequence_name(&self) -> Option<&Text> {
        self.sequence_name.as_ref()
    }

    /// The name of a track other than track 0.
    pub fn track_name(&self, track: u16) -> Option<&Text> {
        self.track_names.get(&track)
    }

    /// The first tempo the file declares, if any.
    pub fn initial_tempo(&self) -> Option<u32> {
        self.initial_tempo
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// All events in parse order.
    pub fn events(&self) -> impl Iterator<Item = &TimedEvent> {
        self.events.iter()
    }

    /// Events grouped by absolute tick. Groups come in tick order; within a
    /// group events are ordered by track.
    pub fn events_by_ticks(&self) -> Vec<(u64, Vec<&TimedEvent>)> {
        let mut sorted: Vec<&TimedEvent> = self.events.iter().collect();
        sorted.sort_by_key(|te| (te.event.absolute_ticks(), te.event.track()));
        let mut groups: Vec<(u64, Vec<&TimedEvent>)> = Vec::new();
        for timed in sorted {
            let ticks = timed.event.absolute_ticks();
            match groups.last_mut() {
                Some((t, group)) if *t == ticks => group.push(timed),
                _ => groups.push((ticks, vec![timed])),
            }
        }
        groups
    }

    /// Events grouped by track, each group in time order.
    pub fn events_by_track(&self) -> BTreeMap<u16, Vec<&TimedEvent>> {
        let mut map: BTreeMap<u16, Vec<&TimedEvent>> = BTreeMap::new();
        for timed in &self.events {
            map.entry(timed.event.track()).or_default().push(timed);
        }
        map
    }

    /// System exclusive events, optionally restricted to one track.
    pub fn sysex_events(&self, track: Option<u16>) -> impl Iterator<Item = &TimedEvent> {
        self.filtered(track, Event::is_sysex)
    }

    /// Meta events, optionally restricted to one track.
    pub fn meta_events(&self, track: Option<u16>) -> impl Iterator<Item = &TimedEvent> {
        self.filtered(track, Event::is_meta)
    }

    /// Channel voice events, optionally restricted to one track.
    pub fn channel_events(&self, track: Option<u16>) -> impl Iterator<Item = &TimedEvent> {
        self.filtered(track, Event::is_channel_voice)
    }

    fn filtered(
        &self,
        track: Option<u16>,
        predicate: fn(&Event) -> bool,
    ) -> impl Iterator<Item = &TimedEvent> {
        self.events.iter().filter(move |te| {
            predicate(&te.event) && track.map_or(true, |t| te.event.track() == t)
        })
    }
}

/// One span of constant tempo: at `tick` the time was `seconds` and the
/// tempo became `microseconds_per_quarter`.
#[derive(Clone, Copy, Debug)]
struct TempoAnchor {
    tick: u64,
    seconds: f64,
    microseconds_per_quarter: u32,
}

/// Converts absolute ticks to seconds.
enum TimeMap {
    Metrical {
        ticks_per_quarter: f64,
        anchors: Vec<TempoAnchor>,
    },
    /// Time-code files have a fixed tick rate; tempo events do not affect
    /// the conversion.
    Smpte { ticks_per_second: f64 },
}

impl TimeMap {
    fn new(division: &Division) -> Self {
        match division {
            Division::QuarterNote(q) => TimeMap::Metrical {
                ticks_per_quarter: f64::from((*q).max(1)),
                anchors: vec![TempoAnchor {
                    tick: 0,
                    seconds: 0.0,
                    microseconds_per_quarter: DEFAULT_MICROSECONDS_PER_QUARTER,
                }],
            },
            Division::Smpte(smpte) => TimeMap::Smpte {
                ticks_per_second: smpte.ticks_per_second(),
            },
        }
    }

    fn seconds_at(&self, tick: u64) -> f64 {
        match self {
            TimeMap::Metrical {
                ticks_per_quarter,
                anchors,
            } => {
                let at = anchors.partition_point(|a| a.tick <= tick);
                // the initial anchor at tick 0 is always present
                let anchor = &anchors[at.saturating_sub(1)];
                let elapsed = (tick - anchor.tick) as f64;
                anchor.seconds
                    + elapsed * f64::from(anchor.microseconds_per_quarter)
                        / 1_000_000.0
                        / ticks_per_quarter
            }
            TimeMap::Smpte { ticks_per_second } => tick as f64 / ticks_per_second,
        }
    }

    fn set_tempo(&mut self, tick: u64, microseconds_per_quarter: u32) {
        let seconds = self.seconds_at(tick);
        if let TimeMap::Metrical { anchors, .. } = self {
            let at = anchors.partition_point(|a| a.tick < tick);
            let anchor = TempoAnchor {
                tick,
                seconds,
                microseconds_per_quarter,
            };
            if at < anchors.len() && anchors[at].tick == tick {
                anchors[at] = anchor;
            } else {
                anchors.insert(at, anchor);
            }
        }
    }
}

/// The handler that collects a whole file into a [`Sequence`].
pub struct SequenceBuilder {
    sequence: Sequence,
    time_map: TimeMap,
    current_track: Option<u16>,
}

impl Default for SequenceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceBuilder {
    pub fn new() -> Self {
        Self {
            sequence: Sequence::default(),
            // replaced when the header arrives; 96 ppqn is the customary
            // fallback for streams with no header
            time_map: TimeMap::new(&Division::QuarterNote(96)),
            current_track: None,
        }
    }

    pub fn into_sequence(self) -> Sequence {
        self.sequence
    }

    fn add_event(&mut self, event: Event) {
        let seconds = self.time_map.seconds_at(event.absolute_ticks());
        self.sequence.events.push(TimedEvent { event, seconds });
    }
}

impl EventHandler for SequenceBuilder {
    fn header(&mut self, header: &Header) -> HandlerResult {
        debug!("collecting sequence for {:?}", header);
        self.time_map = TimeMap::new(header.division());
        self.sequence.header = Some(*header);
        Ok(())
    }

    fn start_of_track(&mut self, track: u16) -> HandlerResult {
        self.current_track = Some(track);
        Ok(())
    }

    fn end_of_track(&mut self, _track: u16) -> HandlerResult {
        self.current_track = None;
        Ok(())
    }

    fn channel_message(&mut self, event: Event) -> HandlerResult {
        self.add_event(event);
        Ok(())
    }

    fn sysex_message(&mut self, event: Event) -> HandlerResult {
        self.add_event(event);
        Ok(())
    }

    fn escape_sequence(&mut self, event: Event) -> HandlerResult {
        self.add_event(event);
        Ok(())
    }

    fn meta_message(&mut self, event: Event) -> HandlerResult {
        match event.meta_type() {
            Some(META_TEMPO) if event.data().len() == 3 => {
                let tempo = read_bew(event.data());
                // the tempo event itself sits at the old rate; what follows
                // accrues at the new one
                self.time_map.set_tempo(event.absolute_ticks(), tempo);
                if self.sequence.initial_tempo.is_none() {
                    self.sequence.initial_tempo = Some(tempo);
                }
                debug!(
                    "tempo {:.2} ms per quarter note ({:.2} bpm)",
                    f64::from(tempo) / 1000.0,
                    60_000_000.0 / f64::from(tempo)
                );
            }
            Some(META_SEQUENCE_NAME) => {
                let name = Text::from(event.data());
                match event.track() {
                    0 => {
                        debug!("sequence name: {}", name);
                        self.sequence.sequence_name = Some(name);
                    }
                    track => {
                        debug!("track name ({:02}): {}", track, name);
                        self.sequence.track_names.insert(track, name);
                    }
                }
            }
            _ => {}
        }
        self.add_event(event);
        Ok(())
    }

    fn invalid_message(&mut self, event: Event) -> HandlerResult {
        log::warn!(
            "received invalid event type ({:#04X}) of {} bytes",
            event.status_byte(),
            event.data().len()
        );
        Ok(())
    }

    fn eof(&mut self) -> HandlerResult {
        self.current_track = None;
        Ok(())
    }
}
