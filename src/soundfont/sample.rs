// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use crate::riff::{Cursor, LoadError};

pub(crate) const RECORD_SIZE: usize = 46;

/// Channel routing of a sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleType {
    Mono,
    Right,
    Left,
    Linked,
    RomMono,
    RomRight,
    RomLeft,
    RomLinked,
}

impl SampleType {
    pub fn from_u16(value: u16) -> Option<SampleType> {
        match value {
            1 => Some(SampleType::Mono),
            2 => Some(SampleType::Right),
            4 => Some(SampleType::Left),
            8 => Some(SampleType::Linked),
            0x8001 => Some(SampleType::RomMono),
            0x8002 => Some(SampleType::RomRight),
            0x8004 => Some(SampleType::RomLeft),
            0x8008 => Some(SampleType::RomLinked),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            SampleType::Mono => 1,
            SampleType::Right => 2,
            SampleType::Left => 4,
            SampleType::Linked => 8,
            SampleType::RomMono => 0x8001,
            SampleType::RomRight => 0x8002,
            SampleType::RomLeft => 0x8004,
            SampleType::RomLinked => 0x8008,
        }
    }

    pub fn is_left(self) -> bool {
        matches!(self, SampleType::Left | SampleType::RomLeft)
    }

    pub fn is_right(self) -> bool {
        matches!(self, SampleType::Right | SampleType::RomRight)
    }

    pub fn is_rom(self) -> bool {
        self.as_u16() & 0x8000 != 0
    }
}

/// A sample header. All positions are absolute frame indexes into the shared
/// sample block.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub original_pitch: u8,
    pub pitch_correction: i8,
    pub sample_link: u16,
    pub sample_type: SampleType,
}

impl Sample {
    pub(crate) fn read(cursor: &mut Cursor) -> Result<Sample, LoadError> {
        let name = cursor.read_fixed_string(20)?;
        let start = cursor.read_u32()?;
        let end = cursor.read_u32()?;
        let loop_start = cursor.read_u32()?;
        let loop_end = cursor.read_u32()?;
        let sample_rate = cursor.read_u32()?;
        let original_pitch = cursor.read_u8()?;
        let pitch_correction = cursor.read_i8()?;
        let sample_link = cursor.read_u16()?;
        let raw_type = cursor.read_u16()?;

        // The terminal EOS record commonly carries a zero type.
        let sample_type = SampleType::from_u16(raw_type).unwrap_or(SampleType::Mono);

        Ok(Sample {
            name,
            start,
            end,
            loop_start,
            loop_end,
            sample_rate,
            original_pitch,
            pitch_correction,
            sample_link,
            sample_type,
        })
    }

    /// Number of frames between start and end.
    pub fn frame_count(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Duration of the sample at its own rate.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn has_loop(&self) -> bool {
        self.loop_end > self.loop_start
    }
}

/// A borrowed view over the 16-bit frames of the shared sample block.
#[derive(Clone, Copy)]
pub struct SampleFrames<'a> {
    data: &'a [u8],
}

impl<'a> SampleFrames<'a> {
    pub(crate) fn new(data: &'a [u8]) -> SampleFrames<'a> {
        SampleFrames { data }
    }

    /// Total number of frames in the block.
    pub fn len(&self) -> usize {
        self.data.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads a frame by absolute index. Reads outside the block are silent.
    pub fn frame(&self, index: usize) -> i16 {
        match self.data.get(index * 2..index * 2 + 2) {
            Some(bytes) => i16::from_le_bytes([bytes[0], bytes[1]]),
            None => 0,
        }
    }

    /// Reads a frame as a float in [-1, 1).
    pub fn frame_f32(&self, index: usize) -> f32 {
        self.frame(index) as f32 / 32768.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sample_type() {
        assert_eq!(SampleType::from_u16(4), Some(SampleType::Left));
        assert_eq!(SampleType::from_u16(0x8002), Some(SampleType::RomRight));
        assert_eq!(SampleType::from_u16(3), None);
        assert!(SampleType::RomLeft.is_left());
        assert!(SampleType::RomLeft.is_rom());
        assert!(!SampleType::Linked.is_rom());
    }

    #[test]
    fn test_read_sample() {
        let mut bytes = b"Sine\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0".to_vec();
        for value in [10u32, 110, 20, 100, 22050] {
            bytes.extend(value.to_le_bytes());
        }
        bytes.extend([69u8, 0xFB]);
        bytes.extend(0u16.to_le_bytes());
        bytes.extend(2u16.to_le_bytes());
        assert_eq!(bytes.len(), RECORD_SIZE);

        let sample = Sample::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(sample.name, "Sine");
        assert_eq!(sample.frame_count(), 100);
        assert_eq!(sample.original_pitch, 69);
        assert_eq!(sample.pitch_correction, -5);
        assert_eq!(sample.sample_type, SampleType::Right);
        assert!(sample.has_loop());
        assert!((sample.duration_secs() - 100.0 / 22050.0).abs() < 1e-9);
    }

    #[test]
    fn test_frames_out_of_range() {
        let data = [0x00, 0x40, 0xFF, 0xFF, 0x01];
        let frames = SampleFrames::new(&data);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames.frame(0), 0x4000);
        assert_eq!(frames.frame(1), -1);
        assert_eq!(frames.frame(2), 0);
        assert_eq!(frames.frame(1000), 0);
        assert_eq!(frames.frame_f32(0), 0.5);
    }
}
