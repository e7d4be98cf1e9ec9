//! Converts a parsed sequence to a format 0 file by merging every track into
//! one. Meta events that only make sense on the tempo/conductor track are
//! dropped when they originate anywhere else.

use crate::constants::{
    META_CUE_POINT, META_DEVICE_NAME, META_INSTRUMENT_NAME, META_KEY_SIGNATURE, META_MARKER,
    META_MIDI_PORT, META_SEQUENCE_NAME, META_SEQUENCE_NUMBER, META_SMPTE_OFFSET, META_TEMPO,
    META_TIME_SIGNATURE,
};
use crate::file::{Event, Format};
use crate::sequence::Sequence;
use crate::writer::Writer;
use crate::Result;
use log::{debug, warn};
use std::io::Write;

/// Meta event types that are excluded from the output when they occur on any
/// track other than track 0.
const TRACK_ZERO_ONLY_META: &[u8] = &[
    META_CUE_POINT,
    META_DEVICE_NAME,
    META_INSTRUMENT_NAME,
    META_KEY_SIGNATURE,
    META_MARKER,
    META_MIDI_PORT,
    META_SEQUENCE_NAME,
    META_SEQUENCE_NUMBER,
    META_SMPTE_OFFSET,
    META_TEMPO,
    META_TIME_SIGNATURE,
];

fn discard_for_type0(event: &Event) -> bool {
    if event.is_end_of_track() {
        // the merged track gets a single end-of-track of its own
        return true;
    }
    match event.meta_type() {
        Some(meta_type) => event.track() != 0 && TRACK_ZERO_ONLY_META.contains(&meta_type),
        None => false,
    }
}

/// Write `sequence` as a format 0 file: all tracks merged into one, events
/// interleaved by absolute tick. Within one tick, events are ordered by
/// status byte descending, so meta events come first, then sysex data, then
/// controller changes, then note data.
pub fn write_type0<W: Write>(sequence: &Sequence, sink: W) -> Result<()> {
    let division = sequence
        .header()
        .map(|h| *h.division())
        .unwrap_or_default();
    let mut writer = Writer::new(sink);
    debug!("writing format 0 header");
    writer.header(Format::Single, 1, division)?;
    writer.start_of_track()?;

    for (ticks, group) in sequence.events_by_ticks() {
        writer.set_absolute_ticks(ticks)?;

        let mut events: Vec<&Event> = group.iter().map(|te| te.event()).collect();
        events.sort_by(|a, b| b.status_byte().cmp(&a.status_byte()));

        for event in events {
            if discard_for_type0(event) {
                if !event.is_end_of_track() {
                    warn!("discarding {:?} from track {}", event.kind(), event.track());
                }
                continue;
            }
            writer.event_slice(&event.to_file_bytes())?;
        }
    }

    writer.end_of_track()?;
    writer.eof()?;
    Ok(())
}
