use crate::error::LibResult;
use crate::Error;
use snafu::ResultExt;
use std::convert::TryFrom;
use std::io::Write;

/// The contents of the `MThd` chunk: the file format, the number of track
/// chunks the file declares, and the meaning of delta-time ticks.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct Header {
    format: Format,
    num_tracks: u16,
    division: Division,
}

impl Header {
    /// Create a new `Header` object.
    pub fn new(format: Format, num_tracks: u16, division: Division) -> Self {
        Self {
            format,
            num_tracks,
            division,
        }
    }

    /// A getter for the `format` field.
    pub fn format(&self) -> &Format {
        &self.format
    }

    /// The number of tracks the header declares.
    pub fn num_tracks(&self) -> u16 {
        self.num_tracks
    }

    /// A getter for the `division` field.
    pub fn division(&self) -> &Division {
        &self.division
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> LibResult<()> {
        // write the header chunk identifier
        w.write_all(b"MThd").context(wr!())?;

        // write the header chunk length (always 6)
        w.write_all(&6u32.to_be_bytes()).context(wr!())?;

        // write the format indicator
        w.write_all(&(self.format as u16).to_be_bytes())
            .context(wr!())?;

        // write the number of tracks
        w.write_all(&self.num_tracks.to_be_bytes()).context(wr!())?;

        // write the division value
        self.division.write(w)?;
        Ok(())
    }
}

#[repr(u16)]
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum Format {
    /// 0 the file contains a single multi-channel track
    Single = 0,
    /// 1 the file contains one or more simultaneous tracks (or MIDI outputs) of a sequence
    Multi = 1,
    /// 2 the file contains one or more sequentially independent single-track patterns
    Sequential = 2,
}

impl Default for Format {
    fn default() -> Self {
        Format::Multi
    }
}

impl Format {
    pub(crate) fn from_u16(value: u16) -> LibResult<Self> {
        match value {
            0 => Ok(Format::Single),
            1 => Ok(Format::Multi),
            2 => Ok(Format::Sequential),
            _ => violation!("{} is not a MIDI file format", value),
        }
    }
}

impl TryFrom<u16> for Format {
    type Error = Error;

    fn try_from(value: u16) -> crate::Result<Self> {
        Ok(Self::from_u16(value)?)
    }
}

const DIVISION_TYPE_BIT: u16 = 0b1000_0000_0000_0000;

/// Specifies the meaning of the delta-times. It has two formats, one for
/// metrical time, and one for time-code-based time:
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum Division {
    /// If bit 15 of `<division>` is a zero, the bits 14 thru 0 represent the
    /// number of delta-time "ticks" which make up a quarter-note. For
    /// instance, if `<division>` is 96, then a time interval of an
    /// eighth-note between two events in the file would be 48.
    QuarterNote(u16),
    /// Frame rate and resolution within the frame.
    Smpte(SmpteTiming),
}

impl Default for Division {
    fn default() -> Self {
        Division::QuarterNote(96)
    }
}

impl Division {
    pub(crate) fn from_u16(value: u16) -> LibResult<Self> {
        if value & DIVISION_TYPE_BIT == DIVISION_TYPE_BIT {
            let frame_rate = FrameRate::from_fps_byte((value >> 8) as u8)?;
            Ok(Division::Smpte(SmpteTiming {
                frame_rate,
                resolution: (value & 0x00FF) as u8,
            }))
        } else {
            Ok(Division::QuarterNote(value))
        }
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> LibResult<()> {
        match self {
            Division::QuarterNote(q) => {
                w.write_all(&(q & 0x7FFF).to_be_bytes()).context(wr!())?
            }
            Division::Smpte(smpte) => w
                .write_all(&[smpte.frame_rate.fps_byte(), smpte.resolution])
                .context(wr!())?,
        }
        Ok(())
    }

    /// The ticks-per-quarter-note value for metrical timing, `None` for
    /// SMPTE timing.
    pub fn ticks_per_quarter(&self) -> Option<u16> {
        match self {
            Division::QuarterNote(q) => Some(*q),
            Division::Smpte(_) => None,
        }
    }
}

impl TryFrom<u16> for Division {
    type Error = Error;

    fn try_from(value: u16) -> crate::Result<Self> {
        Ok(Division::from_u16(value)?)
    }
}

/// `<division>` Bits 14 thru 8 contain one of the four values -24, -25, -29,
/// or -30, corresponding to the four standard SMPTE and MIDI time code
/// formats (-29 corresponds to 30 drop frame), and represents the number of
/// frames per second. These negative numbers are stored in two's complement
/// form.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum FrameRate {
    /// 24 frames per second
    N24,
    /// 25 frames per second
    N25,
    /// 30 drop
    N29,
    /// 30 frames per second
    N30,
}

impl Default for FrameRate {
    fn default() -> Self {
        FrameRate::N24
    }
}

impl FrameRate {
    pub(crate) fn from_fps_byte(value: u8) -> LibResult<Self> {
        match value as i8 {
            -24 => Ok(FrameRate::N24),
            -25 => Ok(FrameRate::N25),
            -29 => Ok(FrameRate::N29),
            -30 => Ok(FrameRate::N30),
            other => violation!("{} is not an SMPTE frame rate code", other),
        }
    }

    /// The negative two's complement byte stored in the division word.
    pub(crate) fn fps_byte(&self) -> u8 {
        match self {
            FrameRate::N24 => (-24i8) as u8,
            FrameRate::N25 => (-25i8) as u8,
            FrameRate::N29 => (-29i8) as u8,
            FrameRate::N30 => (-30i8) as u8,
        }
    }

    /// The actual frame rate. The -29 code means 30 drop frame, which runs
    /// at 29.97 frames per second.
    pub fn frames_per_second(&self) -> f64 {
        match self {
            FrameRate::N24 => 24.0,
            FrameRate::N25 => 25.0,
            FrameRate::N29 => 29.97,
            FrameRate::N30 => 30.0,
        }
    }
}

/// The time-code form of the division word: a frame rate and the number of
/// sub-frame units per frame. Typical resolutions are 4 (MIDI time code), 8,
/// 10, 80 (bit resolution), or 100. Millisecond-based tracks use 25
/// frames/sec and a resolution of 40 units per frame.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct SmpteTiming {
    frame_rate: FrameRate,
    resolution: u8,
}

impl Default for SmpteTiming {
    fn default() -> Self {
        // This is the 'millisecond-based tracks' example given by the spec.
        SmpteTiming {
            frame_rate: FrameRate::N25,
            resolution: 40,
        }
    }
}

impl SmpteTiming {
    pub fn new(frame_rate: FrameRate, resolution: u8) -> Self {
        Self {
            frame_rate,
            resolution,
        }
    }

    pub fn frame_rate(&self) -> &FrameRate {
        &self.frame_rate
    }

    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    /// The number of delta-time ticks in one second of time code.
    pub fn ticks_per_second(&self) -> f64 {
        self.frame_rate.frames_per_second() * f64::from(self.resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrical_division() {
        let division = Division::from_u16(96).unwrap();
        assert_eq!(Division::QuarterNote(96), division);
        assert_eq!(Some(96), division.ticks_per_quarter());
    }

    #[test]
    fn smpte_division() {
        // 0xE7 is -25 in two's complement, 40 sub-frames: millisecond timing
        let division = Division::from_u16(0xE728).unwrap();
        let smpte = match division {
            Division::Smpte(s) => s,
            other => panic!("wrong variant, got {:?}", other),
        };
        assert_eq!(FrameRate::N25, *smpte.frame_rate());
        assert_eq!(40, smpte.resolution());
        assert_eq!(1000.0, smpte.ticks_per_second());
        assert_eq!(None, division.ticks_per_quarter());
    }

    #[test]
    fn smpte_division_round_trip() {
        let division = Division::Smpte(SmpteTiming::new(FrameRate::N30, 80));
        let mut bytes = Vec::new();
        division.write(&mut bytes).unwrap();
        assert_eq!(vec![0xE2, 0x50], bytes);
        let value = u16::from_be_bytes([bytes[0], bytes[1]]);
        assert_eq!(division, Division::from_u16(value).unwrap());
    }

    #[test]
    fn bad_frame_rate_code() {
        assert!(Division::from_u16(0x8000).is_err());
    }

    #[test]
    fn header_bytes() {
        let header = Header::new(Format::Single, 1, Division::QuarterNote(96));
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        assert_eq!(
            vec![0x4D, 0x54, 0x68, 0x64, 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0x01, 0x00, 0x60],
            bytes
        );
    }
}
