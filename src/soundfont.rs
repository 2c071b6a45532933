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

//! SoundFont2 sample banks.
//!
//! A bank is decoded once into an immutable document: presets sorted by bank and
//! program, instruments and sample headers linked to each other by index, and the
//! raw PCM block kept as a range of the shared file buffer. The document is meant
//! to be wrapped in an `Arc` and read from any number of threads.

mod generator;
mod hydra;
mod modulator;
mod preset;
mod resolver;
mod sample;
mod zone;

use std::{fmt, path::Path, sync::Arc};

use tracing::{info, warn};

use crate::riff::{read_chunk, read_list, Cursor, Tag};

pub use crate::riff::LoadError;
pub use generator::{range_amount, Generator, GeneratorLimits, GeneratorSet, GeneratorType};
pub use modulator::{merge_by_identity, sum_by_identity, Modulator, ModulatorIdentity};
pub use preset::{Instrument, Preset, PresetId, PERCUSSION_BANK};
pub(crate) use resolver::merge_generators;
pub use resolver::PlayableUnit;
pub use sample::{Sample, SampleFrames, SampleType};
pub use zone::{Range, Zone, ZoneReference};

/// The result of a preset lookup. `substituted` is set when the requested bank and
/// program didn't exist and a fallback preset was chosen instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresetLookup {
    pub id: PresetId,
    pub substituted: bool,
}

/// A decoded SoundFont2 bank.
pub struct SoundFont {
    /// The whole file. The sample block is a range of it.
    data: Arc<[u8]>,
    sample_offset: usize,
    sample_len: usize,
    info: Vec<(Tag, String)>,
    presets: Vec<Preset>,
    instruments: Vec<Instrument>,
    samples: Vec<Sample>,
}

impl fmt::Debug for SoundFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundFont")
            .field("name", &self.name())
            .field("presets", &self.presets.len())
            .field("instruments", &self.instruments.len())
            .field("samples", &self.samples.len())
            .field("sample_bytes", &self.sample_len)
            .finish()
    }
}

impl SoundFont {
    /// Decodes a bank from memory.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<SoundFont, LoadError> {
        let data: Arc<[u8]> = bytes.into();
        let mut root = Cursor::new(&data);

        let mut riff = read_list(&mut root, Tag::RIFF, b"sfbk")?;
        let body = &mut riff.payload;

        let mut info_list = read_list(body, Tag::LIST, b"INFO")?;
        let mut info = Vec::new();
        while !info_list.payload.is_empty() {
            let mut chunk = read_chunk(&mut info_list.payload)?;
            let text = if chunk.tag == b"ifil" || chunk.tag == b"iver" {
                let major = chunk.payload.read_u16()?;
                let minor = chunk.payload.read_u16()?;
                format!("{}.{}", major, minor)
            } else {
                let len = chunk.payload.len();
                chunk.payload.read_fixed_string(len)?
            };
            info.push((chunk.tag, text));
        }

        let mut sdta = read_list(body, Tag::LIST, b"sdta")?;
        let (mut sample_offset, mut sample_len) = (0, 0);
        while !sdta.payload.is_empty() {
            let chunk = read_chunk(&mut sdta.payload)?;
            // 24-bit extension chunks are ignored, only the 16-bit block is played.
            if chunk.tag == b"smpl" {
                sample_offset = chunk.payload_offset();
                sample_len = chunk.size as usize;
            }
        }

        let mut pdta = read_list(body, Tag::LIST, b"pdta")?;
        let mut hydra = hydra::read_hydra(&mut pdta.payload)?;

        hydra
            .presets
            .sort_by(|a, b| (a.bank, a.program).cmp(&(b.bank, b.program)));

        Ok(SoundFont {
            data,
            sample_offset,
            sample_len,
            info,
            presets: hydra.presets,
            instruments: hydra.instruments,
            samples: hydra.samples,
        })
    }

    /// Reads and decodes a bank file.
    pub fn load(path: &Path) -> Result<SoundFont, LoadError> {
        let bytes = std::fs::read(path)?;
        let soundfont = SoundFont::from_bytes(bytes)?;
        info!(
            path = ?path,
            name = soundfont.name().unwrap_or(""),
            presets = soundfont.presets.len(),
            instruments = soundfont.instruments.len(),
            samples = soundfont.samples.len(),
            sample_bytes = soundfont.sample_len,
            "Loaded soundfont"
        );
        Ok(soundfont)
    }

    /// The bank name from the `INAM` info chunk.
    pub fn name(&self) -> Option<&str> {
        self.info_text(b"INAM")
    }

    /// The format version from the `ifil` info chunk.
    pub fn version(&self) -> Option<&str> {
        self.info_text(b"ifil")
    }

    fn info_text(&self, tag: &[u8; 4]) -> Option<&str> {
        self.info
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, text)| text.as_str())
    }

    /// Info chunks in file order.
    pub fn info(&self) -> &[(Tag, String)] {
        &self.info
    }

    /// Presets sorted by bank, then program.
    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn preset(&self, id: PresetId) -> Option<&Preset> {
        self.presets.get(id.0)
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn instrument(&self, index: usize) -> Option<&Instrument> {
        self.instruments.get(index)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    /// The shared 16-bit sample block.
    pub fn sample_frames(&self) -> SampleFrames<'_> {
        SampleFrames::new(&self.data[self.sample_offset..self.sample_offset + self.sample_len])
    }

    /// Finds the preset for a bank and program.
    ///
    /// When there is no exact match, percussion requests (bank 128) fall back to the
    /// first percussion preset, other requests to the first melodic preset with the
    /// same program, and anything still unmatched to the first preset in the bank.
    pub fn find_preset(&self, bank: u16, program: u16) -> PresetLookup {
        if let Some(index) = self
            .presets
            .iter()
            .position(|p| p.bank == bank && p.program == program)
        {
            return PresetLookup {
                id: PresetId(index),
                substituted: false,
            };
        }

        let fallback = if bank == PERCUSSION_BANK {
            self.presets.iter().position(|p| p.is_percussion())
        } else {
            self.presets
                .iter()
                .position(|p| p.program == program && !p.is_percussion())
        };
        let index = fallback.unwrap_or(0);

        warn!(
            bank,
            program,
            substitute = %self.presets[index],
            "Preset not found, substituting"
        );
        PresetLookup {
            id: PresetId(index),
            substituted: true,
        }
    }

    /// Finds a preset by its exact name, falling back to the first preset.
    pub fn find_preset_by_name(&self, name: &str) -> PresetLookup {
        match self.presets.iter().position(|p| p.name == name) {
            Some(index) => PresetLookup {
                id: PresetId(index),
                substituted: false,
            },
            None => {
                warn!(name, substitute = %self.presets[0], "Preset not found, substituting");
                PresetLookup {
                    id: PresetId(0),
                    substituted: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;
    use crate::testutil::soundfont::{SoundFontBuilder, TestInstrument, TestPreset, TestZone};

    fn bank_with_presets(presets: &[(&str, u16, u16)]) -> SoundFont {
        let mut builder = SoundFontBuilder::new();
        let sample = builder.add_sine_sample("sine", 60, 44100, 1000);
        let instrument = builder
            .add_instrument(TestInstrument::new("inst").with_zone(TestZone::sample(sample)));
        for (name, bank, program) in presets {
            builder.add_preset(
                TestPreset::new(name, *bank, *program).with_zone(TestZone::instrument(instrument)),
            );
        }
        SoundFont::from_bytes(builder.build()).unwrap()
    }

    #[test]
    fn test_rejects_non_riff() {
        let err = SoundFont::from_bytes(b"RIFX\x04\x00\x00\x00sfbk".to_vec()).unwrap_err();
        assert!(err.is_invalid_format());

        let mut bytes = SoundFontBuilder::new().build();
        bytes[8..12].copy_from_slice(b"WAVE");
        let err = SoundFont::from_bytes(bytes).unwrap_err();
        assert!(err.is_invalid_format());
    }

    #[test]
    fn test_truncated_file() {
        let mut builder = SoundFontBuilder::new();
        let sample = builder.add_sine_sample("sine", 60, 44100, 1000);
        let instrument = builder
            .add_instrument(TestInstrument::new("inst").with_zone(TestZone::sample(sample)));
        builder.add_preset(TestPreset::new("Piano", 0, 0).with_zone(TestZone::instrument(instrument)));
        let mut bytes = builder.build();
        bytes.truncate(bytes.len() - 10);

        let err = SoundFont::from_bytes(bytes).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_info_and_samples() {
        let soundfont = bank_with_presets(&[("Piano", 0, 0)]);
        assert_eq!(soundfont.name(), Some("Test Bank"));
        assert_eq!(soundfont.version(), Some("2.4"));

        let frames = soundfont.sample_frames();
        assert_eq!(frames.len(), 1000 + SoundFontBuilder::SAMPLE_PADDING);
        let sample = soundfont.sample(0).unwrap();
        assert_eq!(sample.frame_count(), 1000);
        assert_eq!(frames.frame(sample.start as usize), 0);
    }

    #[test]
    fn test_presets_sorted() {
        let soundfont = bank_with_presets(&[
            ("Drums", 128, 0),
            ("Strings", 0, 48),
            ("Organ", 8, 16),
            ("Piano", 0, 0),
        ]);
        let order: Vec<_> = soundfont.presets().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(order, vec!["Piano", "Strings", "Organ", "Drums"]);
    }

    #[test]
    fn test_find_preset_fallbacks() {
        let soundfont = bank_with_presets(&[
            ("Piano", 0, 0),
            ("Strings", 0, 48),
            ("Drums", 128, 0),
            ("Room", 128, 8),
        ]);

        let exact = soundfont.find_preset(128, 8);
        assert!(!exact.substituted);
        assert_eq!(soundfont.preset(exact.id).unwrap().name, "Room");

        let drums = soundfont.find_preset(128, 25);
        assert!(drums.substituted);
        assert_eq!(soundfont.preset(drums.id).unwrap().name, "Drums");

        let melodic = soundfont.find_preset(8, 48);
        assert!(melodic.substituted);
        assert_eq!(soundfont.preset(melodic.id).unwrap().name, "Strings");

        let first = soundfont.find_preset(3, 100);
        assert!(first.substituted);
        assert_eq!(first.id, PresetId(0));
    }

    #[test]
    fn test_percussion_fallback_without_kits() {
        let soundfont = bank_with_presets(&[("Piano", 0, 0), ("Strings", 0, 48)]);
        let lookup = soundfont.find_preset(128, 0);
        assert!(lookup.substituted);
        assert_eq!(lookup.id, PresetId(0));
    }

    #[test]
    fn test_find_preset_by_name() {
        let soundfont = bank_with_presets(&[("Piano", 0, 0), ("Strings", 0, 48)]);
        let lookup = soundfont.find_preset_by_name("Strings");
        assert_eq!(lookup.id, PresetId(1));
        assert!(!lookup.substituted);

        let missing = soundfont.find_preset_by_name("Banjo");
        assert_eq!(missing.id, PresetId(0));
        assert!(missing.substituted);
    }

    #[test]
    fn test_load_from_file() {
        let mut builder = SoundFontBuilder::new();
        let sample = builder.add_sine_sample("sine", 60, 44100, 1000);
        let instrument = builder
            .add_instrument(TestInstrument::new("inst").with_zone(TestZone::sample(sample)));
        builder.add_preset(TestPreset::new("Piano", 0, 0).with_zone(TestZone::instrument(instrument)));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&builder.build()).unwrap();

        let soundfont = SoundFont::load(file.path()).unwrap();
        assert_eq!(soundfont.presets().len(), 1);

        let err = SoundFont::load(Path::new("/nonexistent/bank.sf2")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
