mod utils;

use smf_stream::file::{Division, Format};
use smf_stream::{parse, Writer};
use std::io::Cursor;
use utils::{assert_same_bytes, enable_logging};

/// Build a file with the writer, then parse it while feeding the callbacks
/// straight into a second writer. The replayed bytes must be identical (the
/// writer never emits running status, so its own output always replays).
fn round_trip(original: &[u8]) {
    enable_logging();
    let mut replayed = Writer::new(Vec::new());
    parse(Cursor::new(original.to_vec()), &mut replayed, true).unwrap();
    assert_same_bytes(original, &replayed.into_inner());
}

/// The minimal type 0 file: one note, held for two quarters at 96 ppqn.
fn minimal_type0() -> Vec<u8> {
    let mut writer = Writer::new(Vec::new());
    writer
        .header(Format::Single, 1, Division::QuarterNote(96))
        .unwrap();
    writer.start_of_track().unwrap();
    writer.note_on(0, 0x40, 0x40).unwrap();
    writer.update_ticks(192).unwrap();
    writer.note_off(0, 0x40, 0x40).unwrap();
    writer.end_of_track().unwrap();
    writer.eof().unwrap();
    writer.into_inner()
}

#[test]
fn minimal_type0_round_trip() {
    let bytes = minimal_type0();
    let expected: &[u8] = &[
        0x4D, 0x54, 0x68, 0x64, 0x00, 0x00, 0x00, 0x06, //
        0x00, 0x00, 0x00, 0x01, 0x00, 0x60, //
        0x4D, 0x54, 0x72, 0x6B, 0x00, 0x00, 0x00, 0x0D, //
        0x00, 0x90, 0x40, 0x40, //
        0x81, 0x40, 0x80, 0x40, 0x40, //
        0x00, 0xFF, 0x2F, 0x00,
    ];
    assert_same_bytes(expected, &bytes);
    round_trip(&bytes);
}

#[test]
fn deltas_survive_the_round_trip() {
    enable_logging();
    use smf_stream::file::Event;
    use smf_stream::{EventHandler, HandlerResult};

    #[derive(Default)]
    struct DeltaLog(Vec<u32>);
    impl EventHandler for DeltaLog {
        fn channel_message(&mut self, event: Event) -> HandlerResult {
            self.0.push(event.delta_ticks());
            Ok(())
        }

        fn meta_message(&mut self, event: Event) -> HandlerResult {
            self.0.push(event.delta_ticks());
            Ok(())
        }
    }

    let mut log = DeltaLog::default();
    parse(Cursor::new(minimal_type0()), &mut log, true).unwrap();
    assert_eq!(vec![0, 192, 0], log.0);
}

#[test]
fn multi_track_with_metadata() {
    enable_logging();
    let mut writer = Writer::new(Vec::new());
    writer
        .header(Format::Multi, 2, Division::QuarterNote(480))
        .unwrap();

    // conductor track
    writer.start_of_track().unwrap();
    writer.sequence_name("Round Trip").unwrap();
    writer.tempo(500_000).unwrap();
    writer.time_signature(6, 3, 36, 8).unwrap();
    writer.key_signature(-2, false).unwrap();
    writer.update_ticks(1920).unwrap();
    writer.tempo(650_000).unwrap();
    writer.end_of_track().unwrap();

    // one voice
    writer.start_of_track().unwrap();
    writer.sequence_name("Oboe").unwrap();
    writer.instrument_name("Oboe").unwrap();
    writer.program_change(0, 68).unwrap();
    writer.controller_change(0, 7, 100).unwrap();
    writer.note_on(0, 60, 90).unwrap();
    writer.update_ticks(480).unwrap();
    writer.note_off(0, 60, 0).unwrap();
    writer.pitch_bend(0, 0x2000).unwrap();
    writer.update_ticks(480).unwrap();
    writer.channel_pressure(0, 15).unwrap();
    writer.poly_pressure(0, 60, 20).unwrap();
    writer.end_of_track().unwrap();
    writer.eof().unwrap();

    round_trip(&writer.into_inner());
}

#[test]
fn sysex_and_escape_round_trip() {
    enable_logging();
    let mut writer = Writer::new(Vec::new());
    writer
        .header(Format::Single, 1, Division::QuarterNote(96))
        .unwrap();
    writer.start_of_track().unwrap();
    // a GM System On message
    writer
        .system_exclusive(&[0x7E, 0x7F, 0x09, 0x01])
        .unwrap();
    writer.update_ticks(10).unwrap();
    // a song select smuggled through an escape sequence
    writer.escape_sequence(&[0xF3, 0x01]).unwrap();
    writer.end_of_track().unwrap();
    writer.eof().unwrap();
    round_trip(&writer.into_inner());
}

#[test]
fn smpte_header_round_trip() {
    enable_logging();
    use smf_stream::file::{FrameRate, SmpteTiming};
    let mut writer = Writer::new(Vec::new());
    writer
        .header(
            Format::Single,
            1,
            Division::Smpte(SmpteTiming::new(FrameRate::N25, 40)),
        )
        .unwrap();
    writer.start_of_track().unwrap();
    writer.note_on(0, 60, 64).unwrap();
    writer.update_ticks(1000).unwrap();
    writer.note_off(0, 60, 64).unwrap();
    writer.end_of_track().unwrap();
    writer.eof().unwrap();
    round_trip(&writer.into_inner());
}

#[test]
fn drum_pattern_total_ticks() {
    enable_logging();
    // sixteen eighth notes at 96 ppqn; the deltas must add up to 768
    let mut writer = Writer::new(Vec::new());
    writer
        .header(Format::Single, 1, Division::QuarterNote(96))
        .unwrap();
    writer.start_of_track().unwrap();
    for i in 0..16u8 {
        let drum = if i % 2 == 0 { 35 } else { 42 };
        writer.note_on(9, drum, 0x64).unwrap();
        writer.update_ticks(48).unwrap();
    }
    writer.end_of_track().unwrap();
    writer.eof().unwrap();
    let bytes = writer.into_inner();
    round_trip(&bytes);

    use smf_stream::file::Event;
    use smf_stream::{EventHandler, HandlerResult};

    #[derive(Default)]
    struct TickSum(u64);
    impl EventHandler for TickSum {
        fn update_ticks(&mut self, delta_ticks: u32) -> HandlerResult {
            self.0 += u64::from(delta_ticks);
            Ok(())
        }
    }

    let mut sum = TickSum::default();
    parse(Cursor::new(bytes), &mut sum, true).unwrap();
    assert_eq!(768, sum.0);
}

#[test]
fn lenient_accepts_what_strict_rejects() {
    enable_logging();
    // format 0 claiming two tracks
    let mut bytes = vec![
        0x4D, 0x54, 0x68, 0x64, 0x00, 0x00, 0x00, 0x06, //
        0x00, 0x00, 0x00, 0x02, 0x00, 0x60,
    ];
    for _ in 0..2 {
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&4u32.to_be_bytes());
        bytes.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
    }
    assert!(parse(Cursor::new(bytes.clone()), smf_stream::NullHandler, true).is_err());
    parse(Cursor::new(bytes), smf_stream::NullHandler, false).unwrap();
}
