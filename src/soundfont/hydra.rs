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
use std::ops::Range as IndexRange;

use tracing::debug;

use super::{
    generator::{Generator, GeneratorType},
    modulator::{self, Modulator},
    preset::{Instrument, Preset},
    sample::{self, Sample},
    zone::{Range, Zone, ZoneReference},
};
use crate::riff::{read_chunk, Chunk, Cursor, LoadError, Tag};

/// The preset data chunks in the order they must appear, with their record sizes.
const HYDRA: [(&[u8; 4], usize); 9] = [
    (b"phdr", 38),
    (b"pbag", 4),
    (b"pmod", modulator::RECORD_SIZE),
    (b"pgen", 4),
    (b"inst", 22),
    (b"ibag", 4),
    (b"imod", modulator::RECORD_SIZE),
    (b"igen", 4),
    (b"shdr", sample::RECORD_SIZE),
];

/// The decoded preset data.
#[derive(Debug)]
pub(crate) struct Hydra {
    pub presets: Vec<Preset>,
    pub instruments: Vec<Instrument>,
    pub samples: Vec<Sample>,
}

struct PresetHeader {
    name: String,
    program: u16,
    bank: u16,
    bag_index: u16,
    library: u32,
    genre: u32,
    morphology: u32,
}

struct InstrumentHeader {
    name: String,
    bag_index: u16,
}

#[derive(Clone, Copy)]
struct Bag {
    generator_index: u16,
    modulator_index: u16,
}

/// Zone lists reference either instruments (preset level) or samples (instrument level).
#[derive(Clone, Copy)]
enum Level {
    Preset { instruments: usize },
    Instrument { samples: usize },
}

impl Level {
    fn generator_chunk(&self) -> &'static str {
        match self {
            Level::Preset { .. } => "pgen",
            Level::Instrument { .. } => "igen",
        }
    }

    fn bag_chunk(&self) -> &'static str {
        match self {
            Level::Preset { .. } => "pbag",
            Level::Instrument { .. } => "ibag",
        }
    }

    fn modulator_chunk(&self) -> &'static str {
        match self {
            Level::Preset { .. } => "pmod",
            Level::Instrument { .. } => "imod",
        }
    }
}

/// Reads the nine hydra chunks and links them into presets, instruments and samples.
pub(crate) fn read_hydra(pdta: &mut Cursor) -> Result<Hydra, LoadError> {
    let mut chunks: Vec<Chunk> = Vec::with_capacity(HYDRA.len());
    while !pdta.is_empty() {
        let chunk = read_chunk(pdta)?;
        let position = chunks.len();
        let Some((expected, record_size)) = HYDRA.get(position) else {
            return Err(LoadError::invalid(
                chunk.tag.to_string(),
                format!("unexpected chunk after {} hydra chunks", HYDRA.len()),
            ));
        };
        if chunk.tag != *expected {
            return Err(LoadError::invalid(
                chunk.tag.to_string(),
                format!("expected '{}' at hydra position {}", Tag(**expected), position),
            ));
        }
        if chunk.size as usize % record_size != 0 || (chunk.size as usize) < *record_size {
            return Err(LoadError::invalid(
                chunk.tag.to_string(),
                format!(
                    "size {} is not a non-zero multiple of record size {}",
                    chunk.size, record_size
                ),
            ));
        }
        chunks.push(chunk);
    }
    if chunks.len() != HYDRA.len() {
        let missing = HYDRA[chunks.len()].0;
        return Err(LoadError::invalid(
            Tag(*missing).to_string(),
            format!("missing hydra chunk, found {} of {}", chunks.len(), HYDRA.len()),
        ));
    }

    let payloads: [Cursor; 9] = chunks
        .into_iter()
        .map(|c| c.payload)
        .collect::<Vec<_>>()
        .try_into()
        .map_err(|_| LoadError::invalid("pdta", "missing hydra chunk"))?;
    let [mut phdr, mut pbag, mut pmod, mut pgen, mut inst, mut ibag, mut imod, mut igen, mut shdr] =
        payloads;

    let preset_headers = read_records(&mut phdr, read_preset_header)?;
    let preset_bags = read_records(&mut pbag, read_bag)?;
    let preset_modulators = read_records(&mut pmod, Modulator::read)?;
    let preset_generators = read_records(&mut pgen, read_generator)?;
    let instrument_headers = read_records(&mut inst, read_instrument_header)?;
    let instrument_bags = read_records(&mut ibag, read_bag)?;
    let instrument_modulators = read_records(&mut imod, Modulator::read)?;
    let instrument_generators = read_records(&mut igen, read_generator)?;
    let mut samples = read_records(&mut shdr, Sample::read)?;

    // Drop the terminal EOS record.
    samples.pop();

    let instrument_level = Level::Instrument {
        samples: samples.len(),
    };
    let mut instruments = Vec::with_capacity(instrument_headers.len().saturating_sub(1));
    for (index, pair) in instrument_headers.windows(2).enumerate() {
        let bags = bag_range(pair[0].bag_index, pair[1].bag_index, "inst", index)?;
        instruments.push(Instrument {
            name: pair[0].name.clone(),
            zones: build_zones(
                bags,
                &instrument_bags,
                &instrument_generators,
                &instrument_modulators,
                instrument_level,
            )?,
        });
    }

    let preset_level = Level::Preset {
        instruments: instruments.len(),
    };
    let mut presets = Vec::with_capacity(preset_headers.len().saturating_sub(1));
    for (index, pair) in preset_headers.windows(2).enumerate() {
        let header = &pair[0];
        let bags = bag_range(header.bag_index, pair[1].bag_index, "phdr", index)?;
        presets.push(Preset {
            name: header.name.clone(),
            program: header.program,
            bank: header.bank,
            library: header.library,
            genre: header.genre,
            morphology: header.morphology,
            zones: build_zones(
                bags,
                &preset_bags,
                &preset_generators,
                &preset_modulators,
                preset_level,
            )?,
        });
    }

    if presets.is_empty() {
        return Err(LoadError::invalid("phdr", "bank contains no presets"));
    }

    debug!(
        presets = presets.len(),
        instruments = instruments.len(),
        samples = samples.len(),
        "Decoded hydra"
    );

    Ok(Hydra {
        presets,
        instruments,
        samples,
    })
}

fn read_records<'a, T>(
    cursor: &mut Cursor<'a>,
    read: impl Fn(&mut Cursor<'a>) -> Result<T, LoadError>,
) -> Result<Vec<T>, LoadError> {
    let mut records = Vec::new();
    while !cursor.is_empty() {
        records.push(read(cursor)?);
    }
    Ok(records)
}

fn read_preset_header(cursor: &mut Cursor) -> Result<PresetHeader, LoadError> {
    Ok(PresetHeader {
        name: cursor.read_fixed_string(20)?,
        program: cursor.read_u16()?,
        bank: cursor.read_u16()?,
        bag_index: cursor.read_u16()?,
        library: cursor.read_u32()?,
        genre: cursor.read_u32()?,
        morphology: cursor.read_u32()?,
    })
}

fn read_instrument_header(cursor: &mut Cursor) -> Result<InstrumentHeader, LoadError> {
    Ok(InstrumentHeader {
        name: cursor.read_fixed_string(20)?,
        bag_index: cursor.read_u16()?,
    })
}

fn read_bag(cursor: &mut Cursor) -> Result<Bag, LoadError> {
    Ok(Bag {
        generator_index: cursor.read_u16()?,
        modulator_index: cursor.read_u16()?,
    })
}

/// Reads a raw generator record. Unknown operators are skipped when zones are built.
fn read_generator(cursor: &mut Cursor) -> Result<(u16, i16), LoadError> {
    Ok((cursor.read_u16()?, cursor.read_i16()?))
}

fn bag_range(
    start: u16,
    end: u16,
    chunk: &str,
    index: usize,
) -> Result<IndexRange<usize>, LoadError> {
    if end < start {
        return Err(LoadError::invalid(
            chunk,
            format!("record {} has descending bag indexes {}..{}", index, start, end),
        ));
    }
    Ok(start as usize..end as usize)
}

fn build_zones(
    bags: IndexRange<usize>,
    all_bags: &[Bag],
    generators: &[(u16, i16)],
    modulators: &[Modulator],
    level: Level,
) -> Result<Vec<Zone>, LoadError> {
    // The last bag is the terminal record and only closes the final range.
    if bags.end >= all_bags.len() {
        return Err(LoadError::invalid(
            level.bag_chunk(),
            format!("bag index {} out of range ({} bags)", bags.end, all_bags.len()),
        ));
    }

    let mut zones = Vec::with_capacity(bags.len());
    for bag in bags {
        let (this, next) = (all_bags[bag], all_bags[bag + 1]);
        let generator_range = index_range(
            this.generator_index,
            next.generator_index,
            generators.len(),
            level.generator_chunk(),
        )?;
        let modulator_range = index_range(
            this.modulator_index,
            next.modulator_index,
            modulators.len(),
            level.modulator_chunk(),
        )?;

        let mut zone = Zone {
            modulators: modulators[modulator_range].to_vec(),
            ..Default::default()
        };
        for &(operator, amount) in &generators[generator_range] {
            let Some(kind) = GeneratorType::from_u16(operator) else {
                continue;
            };
            let generator = Generator::new(kind, amount);
            match (kind, level) {
                (GeneratorType::KeyRange, _) => {
                    let (lo, hi) = generator.range();
                    zone.set_key_range(Range::new(lo, hi));
                }
                (GeneratorType::VelRange, _) => {
                    let (lo, hi) = generator.range();
                    zone.set_vel_range(Range::new(lo, hi));
                }
                (GeneratorType::Instrument, Level::Preset { instruments }) => {
                    let index = generator.unsigned() as usize;
                    if index >= instruments {
                        return Err(LoadError::invalid(
                            "pgen",
                            format!("instrument {} out of range ({})", index, instruments),
                        ));
                    }
                    zone.reference = ZoneReference::Instrument(index);
                    // The reference generator terminates the zone.
                    break;
                }
                (GeneratorType::SampleId, Level::Instrument { samples }) => {
                    let index = generator.unsigned() as usize;
                    if index >= samples {
                        return Err(LoadError::invalid(
                            "igen",
                            format!("sample {} out of range ({})", index, samples),
                        ));
                    }
                    zone.reference = ZoneReference::Sample(index);
                    break;
                }
                (GeneratorType::Instrument | GeneratorType::SampleId, _) => {}
                _ => zone.generators.set(kind, amount),
            }
        }
        zones.push(zone);
    }
    Ok(zones)
}

fn index_range(
    start: u16,
    end: u16,
    len: usize,
    chunk: &str,
) -> Result<IndexRange<usize>, LoadError> {
    let (start, end) = (start as usize, end as usize);
    if end < start || end > len {
        return Err(LoadError::invalid(
            chunk,
            format!("index range {}..{} invalid for {} records", start, end, len),
        ));
    }
    Ok(start..end)
}
