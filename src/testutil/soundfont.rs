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

//! Builds SoundFont2 byte streams in memory for tests.

use std::f32::consts::PI;

use crate::{
    riff::write_chunk,
    soundfont::{range_amount, GeneratorType, Modulator, SampleType},
};

/// A zone to be encoded. The reference generator is always written last.
#[derive(Clone, Debug, Default)]
pub struct TestZone {
    key_range: Option<(u8, u8)>,
    vel_range: Option<(u8, u8)>,
    generators: Vec<(GeneratorType, i16)>,
    modulators: Vec<Modulator>,
    reference: Option<(GeneratorType, usize)>,
}

impl TestZone {
    pub fn global() -> TestZone {
        TestZone::default()
    }

    pub fn sample(index: usize) -> TestZone {
        TestZone {
            reference: Some((GeneratorType::SampleId, index)),
            ..Default::default()
        }
    }

    pub fn instrument(index: usize) -> TestZone {
        TestZone {
            reference: Some((GeneratorType::Instrument, index)),
            ..Default::default()
        }
    }

    pub fn with_generator(mut self, kind: GeneratorType, amount: i16) -> TestZone {
        self.generators.push((kind, amount));
        self
    }

    pub fn with_key_range(mut self, lo: u8, hi: u8) -> TestZone {
        self.key_range = Some((lo, hi));
        self
    }

    pub fn with_vel_range(mut self, lo: u8, hi: u8) -> TestZone {
        self.vel_range = Some((lo, hi));
        self
    }

    pub fn with_modulator(mut self, modulator: Modulator) -> TestZone {
        self.modulators.push(modulator);
        self
    }

    fn encoded_generators(&self) -> Vec<(u16, i16)> {
        let mut out = Vec::new();
        if let Some((lo, hi)) = self.key_range {
            out.push((GeneratorType::KeyRange as u16, range_amount(lo, hi)));
        }
        if let Some((lo, hi)) = self.vel_range {
            out.push((GeneratorType::VelRange as u16, range_amount(lo, hi)));
        }
        out.extend(self.generators.iter().map(|(k, a)| (*k as u16, *a)));
        if let Some((kind, index)) = self.reference {
            out.push((kind as u16, index as i16));
        }
        out
    }
}

#[derive(Clone, Debug)]
pub struct TestInstrument {
    name: String,
    zones: Vec<TestZone>,
}

impl TestInstrument {
    pub fn new(name: &str) -> TestInstrument {
        TestInstrument {
            name: name.to_string(),
            zones: Vec::new(),
        }
    }

    pub fn with_zone(mut self, zone: TestZone) -> TestInstrument {
        self.zones.push(zone);
        self
    }
}

#[derive(Clone, Debug)]
pub struct TestPreset {
    name: String,
    bank: u16,
    program: u16,
    zones: Vec<TestZone>,
}

impl TestPreset {
    pub fn new(name: &str, bank: u16, program: u16) -> TestPreset {
        TestPreset {
            name: name.to_string(),
            bank,
            program,
            zones: Vec::new(),
        }
    }

    pub fn with_zone(mut self, zone: TestZone) -> TestPreset {
        self.zones.push(zone);
        self
    }
}

/// A sample to be encoded. Loop points are relative to the first frame.
#[derive(Clone, Debug)]
pub struct TestSample {
    pub name: String,
    pub frames: Vec<i16>,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub original_pitch: u8,
    pub pitch_correction: i8,
    pub sample_type: SampleType,
    pub link: u16,
}

impl TestSample {
    pub fn new(name: &str, frames: Vec<i16>, sample_rate: u32, original_pitch: u8) -> TestSample {
        TestSample {
            name: name.to_string(),
            frames,
            loop_start: 0,
            loop_end: 0,
            sample_rate,
            original_pitch,
            pitch_correction: 0,
            sample_type: SampleType::Mono,
            link: 0,
        }
    }

    pub fn with_loop(mut self, start: u32, end: u32) -> TestSample {
        self.loop_start = start;
        self.loop_end = end;
        self
    }

    pub fn with_type(mut self, sample_type: SampleType) -> TestSample {
        self.sample_type = sample_type;
        self
    }
}

enum HydraEdit {
    Swap(usize, usize),
    Drop(usize),
    Pad(usize, usize),
    Patch(usize, usize, Vec<u8>),
}

/// Assembles a complete `sfbk` file.
pub struct SoundFontBuilder {
    name: String,
    samples: Vec<TestSample>,
    instruments: Vec<TestInstrument>,
    presets: Vec<TestPreset>,
    edits: Vec<HydraEdit>,
}

impl Default for SoundFontBuilder {
    fn default() -> Self {
        SoundFontBuilder::new()
    }
}

impl SoundFontBuilder {
    /// Zero frames written after every sample.
    pub const SAMPLE_PADDING: usize = 46;

    pub fn new() -> SoundFontBuilder {
        SoundFontBuilder {
            name: "Test Bank".to_string(),
            samples: Vec::new(),
            instruments: Vec::new(),
            presets: Vec::new(),
            edits: Vec::new(),
        }
    }

    pub fn add_sample(&mut self, sample: TestSample) -> usize {
        self.samples.push(sample);
        self.samples.len() - 1
    }

    /// Adds a half-scale sine at the frequency of `root`, looped over everything
    /// except the first and last eight frames.
    pub fn add_sine_sample(&mut self, name: &str, root: u8, sample_rate: u32, len: usize) -> usize {
        let frequency = 440.0 * 2f32.powf((root as f32 - 69.0) / 12.0);
        let frames = (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                ((2.0 * PI * frequency * t).sin() * 16384.0) as i16
            })
            .collect();
        let mut sample = TestSample::new(name, frames, sample_rate, root);
        if len > 16 {
            sample = sample.with_loop(8, len as u32 - 8);
        }
        self.add_sample(sample)
    }

    /// Adds a sample whose every frame has the same value.
    pub fn add_constant_sample(&mut self, name: &str, value: i16, len: usize) -> usize {
        self.add_sample(TestSample::new(name, vec![value; len], 44100, 60))
    }

    pub fn add_instrument(&mut self, instrument: TestInstrument) -> usize {
        self.instruments.push(instrument);
        self.instruments.len() - 1
    }

    pub fn add_preset(&mut self, preset: TestPreset) -> usize {
        self.presets.push(preset);
        self.presets.len() - 1
    }

    pub fn swap_hydra_chunks(&mut self, a: usize, b: usize) {
        self.edits.push(HydraEdit::Swap(a, b));
    }

    pub fn drop_hydra_chunk(&mut self, index: usize) {
        self.edits.push(HydraEdit::Drop(index));
    }

    /// Appends zero bytes to a hydra chunk's payload.
    pub fn pad_hydra_chunk(&mut self, index: usize, bytes: usize) {
        self.edits.push(HydraEdit::Pad(index, bytes));
    }

    /// Overwrites bytes of a hydra chunk's payload starting at `offset`.
    pub fn patch_hydra_chunk(&mut self, index: usize, offset: usize, bytes: &[u8]) {
        self.edits.push(HydraEdit::Patch(index, offset, bytes.to_vec()));
    }

    pub fn build(&self) -> Vec<u8> {
        let mut info = b"INFO".to_vec();
        let mut version = 2u16.to_le_bytes().to_vec();
        version.extend(4u16.to_le_bytes());
        info.extend(write_chunk(b"ifil", &version));
        let mut name = self.name.as_bytes().to_vec();
        name.push(0);
        if name.len() % 2 == 1 {
            name.push(0);
        }
        info.extend(write_chunk(b"INAM", &name));

        let mut smpl = Vec::new();
        let mut shdr = Vec::new();
        let mut position = 0u32;
        for sample in &self.samples {
            for frame in &sample.frames {
                smpl.extend(frame.to_le_bytes());
            }
            smpl.extend(vec![0u8; Self::SAMPLE_PADDING * 2]);

            let start = position;
            let end = start + sample.frames.len() as u32;
            shdr.extend(fixed_name(&sample.name));
            for value in [
                start,
                end,
                start + sample.loop_start,
                start + sample.loop_end,
                sample.sample_rate,
            ] {
                shdr.extend(value.to_le_bytes());
            }
            shdr.push(sample.original_pitch);
            shdr.push(sample.pitch_correction as u8);
            shdr.extend(sample.link.to_le_bytes());
            shdr.extend(sample.sample_type.as_u16().to_le_bytes());
            position = end + Self::SAMPLE_PADDING as u32;
        }
        shdr.extend(fixed_name("EOS"));
        shdr.extend(vec![0u8; 26]);

        let mut sdta = b"sdta".to_vec();
        sdta.extend(write_chunk(b"smpl", &smpl));

        let (inst, ibag, imod, igen) = encode_headers(
            self.instruments
                .iter()
                .map(|i| (fixed_name(&i.name).to_vec(), i.zones.as_slice())),
            "EOI",
        );

        let (phdr, pbag, pmod, pgen) = encode_headers(
            self.presets.iter().map(|p| {
                let mut header = fixed_name(&p.name).to_vec();
                header.extend(p.program.to_le_bytes());
                header.extend(p.bank.to_le_bytes());
                (header, p.zones.as_slice())
            }),
            "EOP",
        );

        let mut hydra: Vec<(&[u8; 4], Vec<u8>)> = vec![
            (b"phdr", phdr),
            (b"pbag", pbag),
            (b"pmod", pmod),
            (b"pgen", pgen),
            (b"inst", inst),
            (b"ibag", ibag),
            (b"imod", imod),
            (b"igen", igen),
            (b"shdr", shdr),
        ];
        for edit in &self.edits {
            match edit {
                HydraEdit::Swap(a, b) => hydra.swap(*a, *b),
                HydraEdit::Drop(index) => {
                    hydra.remove(*index);
                }
                HydraEdit::Pad(index, bytes) => hydra[*index].1.extend(vec![0u8; *bytes]),
                HydraEdit::Patch(index, offset, bytes) => {
                    hydra[*index].1[*offset..*offset + bytes.len()].copy_from_slice(bytes)
                }
            }
        }

        let mut pdta = b"pdta".to_vec();
        for (tag, payload) in &hydra {
            pdta.extend(write_chunk(tag, payload));
        }

        let mut body = b"sfbk".to_vec();
        body.extend(write_chunk(b"LIST", &info));
        body.extend(write_chunk(b"LIST", &sdta));
        body.extend(write_chunk(b"LIST", &pdta));
        write_chunk(b"RIFF", &body)
    }
}

fn fixed_name(name: &str) -> [u8; 20] {
    let mut out = [0u8; 20];
    for (slot, byte) in out.iter_mut().zip(name.bytes().take(19)) {
        *slot = byte;
    }
    out
}

/// Encodes header, bag, modulator and generator chunks for presets or instruments.
/// Preset headers get the library, genre and morphology words appended after the
/// bag index.
fn encode_headers<'a>(
    headers: impl Iterator<Item = (Vec<u8>, &'a [TestZone])>,
    terminal: &str,
) -> (Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>) {
    let preset_level = terminal == "EOP";
    let (mut records, mut bags, mut mods, mut gens) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    let (mut bag_count, mut gen_count, mut mod_count) = (0u16, 0u16, 0u16);

    let push_header = |records: &mut Vec<u8>, mut header: Vec<u8>, bag_index: u16| {
        if preset_level && header.len() == 20 {
            // The terminal preset header has no program or bank of its own.
            header.extend([0u8; 4]);
        }
        header.extend(bag_index.to_le_bytes());
        if preset_level {
            header.extend([0u8; 12]);
        }
        records.extend(header);
    };

    for (header, zones) in headers {
        push_header(&mut records, header, bag_count);
        for zone in zones {
            bags.extend(gen_count.to_le_bytes());
            bags.extend(mod_count.to_le_bytes());
            bag_count += 1;
            for (operator, amount) in zone.encoded_generators() {
                gens.extend(operator.to_le_bytes());
                gens.extend(amount.to_le_bytes());
                gen_count += 1;
            }
            for modulator in &zone.modulators {
                mods.extend(modulator.source.to_le_bytes());
                mods.extend(modulator.destination.to_le_bytes());
                mods.extend(modulator.amount.to_le_bytes());
                mods.extend(modulator.amount_source.to_le_bytes());
                mods.extend(modulator.transform.to_le_bytes());
                mod_count += 1;
            }
        }
    }

    push_header(&mut records, fixed_name(terminal).to_vec(), bag_count);
    bags.extend(gen_count.to_le_bytes());
    bags.extend(mod_count.to_le_bytes());
    mods.extend([0u8; 10]);
    gens.extend([0u8; 4]);
    (records, bags, mods, gens)
}
