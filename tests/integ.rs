mod utils;

use smf_stream::file::{Division, Format};
use smf_stream::{write_type0, Sequence, Writer};
use std::io::Cursor;
use tempfile::TempDir;
use utils::enable_logging;

/// A little format 1 arrangement: a conductor track and two voices, with a
/// split sysex message on the second voice.
fn arrangement() -> Vec<u8> {
    let mut bytes = vec![
        0x4D, 0x54, 0x68, 0x64, 0x00, 0x00, 0x00, 0x06, // MThd
        0x00, 0x01, 0x00, 0x03, 0x01, 0xE0, // format 1, 3 tracks, 480 ppqn
    ];
    let conductor: &[u8] = &[
        0x00, 0xFF, 0x03, 0x05, 0x53, 0x75, 0x69, 0x74, 0x65, // "Suite"
        0x00, 0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40, // tempo 1000000
        0x00, 0xFF, 0x58, 0x04, 0x03, 0x02, 0x18, 0x08, // 3/4
        0x00, 0xFF, 0x2F, 0x00,
    ];
    let flute: &[u8] = &[
        0x00, 0xFF, 0x03, 0x05, 0x46, 0x6C, 0x75, 0x74, 0x65, // "Flute"
        0x00, 0xC0, 0x49, // program change
        0x00, 0x90, 0x4C, 0x50, //
        0x83, 0x60, 0x80, 0x4C, 0x00, // delta 480
        0x00, 0xFF, 0x2F, 0x00,
    ];
    let synth: &[u8] = &[
        0x00, 0xFF, 0x03, 0x05, 0x53, 0x79, 0x6E, 0x74, 0x68, // "Synth"
        // a sysex split into two packets, reassembled by the parser
        0x00, 0xF0, 0x03, 0x7E, 0x00, 0x06, //
        0x40, 0xF7, 0x02, 0x7F, 0xF7, // delta 64
        0x82, 0x60, 0x91, 0x30, 0x60, // delta 352, tick 416
        0x83, 0x60, 0x81, 0x30, 0x00, // delta 480, tick 896
        0x00, 0xFF, 0x2F, 0x00,
    ];
    for track in [conductor, flute, synth] {
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(track.len() as u32).to_be_bytes());
        bytes.extend_from_slice(track);
    }
    bytes
}

#[test]
fn sequence_collects_the_file() {
    enable_logging();
    let sequence = Sequence::from_reader(Cursor::new(arrangement())).unwrap();
    let header = sequence.header().unwrap();
    assert_eq!(Format::Multi, *header.format());
    assert_eq!(3, header.num_tracks());
    assert_eq!(Division::QuarterNote(480), *header.division());

    assert_eq!("Suite", sequence.sequence_name().unwrap().as_str());
    assert_eq!("Flute", sequence.track_name(1).unwrap().as_str());
    assert_eq!("Synth", sequence.track_name(2).unwrap().as_str());
    assert_eq!(Some(1_000_000), sequence.initial_tempo());

    // one coalesced sysex, stamped at the tick of its first packet
    let sysex: Vec<_> = sequence.sysex_events(None).collect();
    assert_eq!(1, sysex.len());
    assert_eq!(&[0x7E, 0x00, 0x06, 0x7F, 0xF7], sysex[0].event().data());
    assert_eq!(0, sysex[0].event().absolute_ticks());
    assert_eq!(2, sysex[0].event().track());

    // the flute note lasts one quarter at 1000000 us per quarter
    let note_off = sequence
        .channel_events(Some(1))
        .find(|te| te.event().is_note_off())
        .unwrap();
    assert_eq!(480, note_off.event().absolute_ticks());
    assert_eq!(1.0, note_off.seconds());

    // tick grouping: the synth note-on at 416 sits alone between groups
    let by_ticks = sequence.events_by_ticks();
    let group_ticks: Vec<u64> = by_ticks.iter().map(|(t, _)| *t).collect();
    assert_eq!(vec![0, 416, 480, 896], group_ticks);
}

#[test]
fn type1_to_type0() {
    enable_logging();
    let sequence = Sequence::from_reader(Cursor::new(arrangement())).unwrap();
    let mut merged_bytes = Vec::new();
    write_type0(&sequence, &mut merged_bytes).unwrap();

    let merged = Sequence::from_reader(Cursor::new(merged_bytes)).unwrap();
    let header = merged.header().unwrap();
    assert_eq!(Format::Single, *header.format());
    assert_eq!(1, header.num_tracks());

    // exactly one end-of-track
    assert_eq!(
        1,
        merged
            .meta_events(None)
            .filter(|te| te.event().is_end_of_track())
            .count()
    );

    // all channel voice events survive with the same time, status and data
    let project = |s: &Sequence| -> Vec<(u64, u8, Vec<u8>)> {
        s.channel_events(None)
            .map(|te| {
                (
                    te.event().absolute_ticks(),
                    te.event().status_byte(),
                    te.event().data().to_vec(),
                )
            })
            .collect()
    };
    let mut expected = project(&sequence);
    expected.sort();
    let mut actual = project(&merged);
    actual.sort();
    assert_eq!(expected, actual);

    // conductor metas survive, per-voice names are gone, the sysex stays
    assert_eq!(1, merged.sysex_events(None).count());
    assert_eq!("Suite", merged.sequence_name().unwrap().as_str());
    assert!(merged.track_name(1).is_none());
    assert_eq!(Some(1_000_000), merged.initial_tempo());
}

#[test]
fn sequence_from_file_on_disk() {
    enable_logging();
    let td = TempDir::new().unwrap();
    let path = td.path().join("arrangement.mid");
    std::fs::write(&path, arrangement()).unwrap();
    let sequence = Sequence::from_file(&path).unwrap();
    assert_eq!("Suite", sequence.sequence_name().unwrap().as_str());
    assert_eq!(14, sequence.len());
}

/// The classic sysex-extractor flow: write each sysex message to a `.syx`
/// file with the `0xF0` status prepended.
#[test]
fn extract_sysex_to_files() {
    enable_logging();
    let mut writer = Writer::new(Vec::new());
    writer
        .header(Format::Single, 1, Division::QuarterNote(96))
        .unwrap();
    writer.start_of_track().unwrap();
    writer.system_exclusive(&[0x41, 0x10, 0x42, 0x12, 0x40, 0x00, 0x7F, 0x00, 0x41]).unwrap();
    writer.update_ticks(96).unwrap();
    writer.system_exclusive(&[0x7E, 0x7F, 0x09, 0x01]).unwrap();
    writer.end_of_track().unwrap();
    writer.eof().unwrap();

    let sequence = Sequence::from_reader(Cursor::new(writer.into_inner())).unwrap();
    let td = TempDir::new().unwrap();
    let mut written = Vec::new();
    for (i, timed) in sequence.sysex_events(None).enumerate() {
        let data = timed.event().data();
        assert_eq!(Some(&0xF7), data.last());
        let path = td.path().join(format!("msg_{:03}.syx", i + 1));
        let mut contents = vec![0xF0];
        contents.extend_from_slice(data);
        std::fs::write(&path, &contents).unwrap();
        written.push(path);
    }
    assert_eq!(2, written.len());
    let first = std::fs::read(&written[0]).unwrap();
    assert_eq!(
        vec![0xF0, 0x41, 0x10, 0x42, 0x12, 0x40, 0x00, 0x7F, 0x00, 0x41, 0xF7],
        first
    );
}
