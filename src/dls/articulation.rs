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

//! DLS level 2 connection blocks.

use tracing::{trace, warn};

use super::combine::CombinedZone;
use crate::{
    riff::{write_chunk, Cursor, LoadError},
    soundfont::{GeneratorType, Modulator},
};

/// Connection sources.
pub mod source {
    pub const NONE: u16 = 0x0000;
    pub const LFO: u16 = 0x0001;
    pub const VELOCITY: u16 = 0x0002;
    pub const KEYNUMBER: u16 = 0x0003;
    pub const EG1: u16 = 0x0004;
    pub const EG2: u16 = 0x0005;
    pub const PITCHWHEEL: u16 = 0x0006;
    pub const POLYPRESSURE: u16 = 0x0007;
    pub const CHANNELPRESSURE: u16 = 0x0008;
    pub const VIBRATO: u16 = 0x0009;

    /// A MIDI continuous controller.
    pub const fn cc(controller: u8) -> u16 {
        0x0080 + (controller & 0x7F) as u16
    }
}

/// Connection destinations.
pub mod destination {
    pub const GAIN: u16 = 0x0001;
    pub const PITCH: u16 = 0x0003;
    pub const PAN: u16 = 0x0004;
    pub const CHORUS: u16 = 0x0080;
    pub const REVERB: u16 = 0x0081;
    pub const LFO_FREQUENCY: u16 = 0x0104;
    pub const LFO_DELAY: u16 = 0x0105;
    pub const VIB_FREQUENCY: u16 = 0x0114;
    pub const VIB_DELAY: u16 = 0x0115;
    pub const EG1_ATTACK: u16 = 0x0206;
    pub const EG1_DECAY: u16 = 0x0207;
    pub const EG1_RELEASE: u16 = 0x0209;
    pub const EG1_SUSTAIN: u16 = 0x020A;
    pub const EG1_DELAY: u16 = 0x020B;
    pub const EG1_HOLD: u16 = 0x020C;
    pub const EG2_ATTACK: u16 = 0x030A;
    pub const EG2_DECAY: u16 = 0x030B;
    pub const EG2_HOLD: u16 = 0x030C;
    pub const EG2_RELEASE: u16 = 0x030D;
    pub const EG2_SUSTAIN: u16 = 0x030E;
    pub const EG2_DELAY: u16 = 0x030F;
    pub const FILTER_CUTOFF: u16 = 0x0500;
    pub const FILTER_Q: u16 = 0x0501;
}

/// Size of one connection block on disk.
pub const CONNECTION_BLOCK_SIZE: usize = 12;

/// Size of the `art2` header that precedes the blocks.
const ART2_HEADER_SIZE: u32 = 8;

/// Generators that live elsewhere in a DLS region (wave sample, region header)
/// or have no DLS equivalent.
const EXCLUDED: [GeneratorType; 17] = [
    GeneratorType::SampleModes,
    GeneratorType::InitialAttenuation,
    GeneratorType::KeyRange,
    GeneratorType::VelRange,
    GeneratorType::SampleId,
    GeneratorType::FineTune,
    GeneratorType::CoarseTune,
    GeneratorType::StartAddrsOffset,
    GeneratorType::StartAddrsCoarseOffset,
    GeneratorType::EndAddrsOffset,
    GeneratorType::EndAddrsCoarseOffset,
    GeneratorType::StartloopAddrsOffset,
    GeneratorType::StartloopAddrsCoarseOffset,
    GeneratorType::EndloopAddrsOffset,
    GeneratorType::EndloopAddrsCoarseOffset,
    GeneratorType::OverridingRootKey,
    GeneratorType::ExclusiveClass,
];

/// Key-number scaling generators and the absolute generator each one scales.
const KEY_SCALED: [(GeneratorType, GeneratorType); 4] = [
    (GeneratorType::KeynumToVolEnvHold, GeneratorType::HoldVolEnv),
    (GeneratorType::KeynumToVolEnvDecay, GeneratorType::DecayVolEnv),
    (GeneratorType::KeynumToModEnvHold, GeneratorType::HoldModEnv),
    (GeneratorType::KeynumToModEnvDecay, GeneratorType::DecayModEnv),
];

/// One DLS articulation connection: `source * control * scale -> destination`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionBlock {
    pub source: u16,
    pub control: u16,
    pub destination: u16,
    pub transform: u16,
    pub scale: i32,
}

impl ConnectionBlock {
    fn new(source: u16, destination: u16, value: i64) -> ConnectionBlock {
        ConnectionBlock {
            source,
            control: source::NONE,
            destination,
            transform: 0,
            scale: to_scale(value),
        }
    }

    pub fn read(cursor: &mut Cursor) -> Result<ConnectionBlock, LoadError> {
        Ok(ConnectionBlock {
            source: cursor.read_u16()?,
            control: cursor.read_u16()?,
            destination: cursor.read_u16()?,
            transform: cursor.read_u16()?,
            scale: cursor.read_u32()? as i32,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.source.to_le_bytes());
        out.extend_from_slice(&self.control.to_le_bytes());
        out.extend_from_slice(&self.destination.to_le_bytes());
        out.extend_from_slice(&self.transform.to_le_bytes());
        out.extend_from_slice(&self.scale.to_le_bytes());
    }
}

/// DLS scales are 16.16 fixed point.
fn to_scale(value: i64) -> i32 {
    (value * 65536).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Converts a key-number scaling pair to DLS form. The relative amount becomes
/// a scale over the whole key range, and the absolute amount is shifted so that
/// key 60 keeps its original value.
pub fn to_dls_key_scaling(relative: i32, absolute: i32) -> (i32, i32) {
    let dls_relative = relative * -128;
    let absolute = absolute as f64 - (60.0 / 128.0) * dls_relative as f64;
    (dls_relative, absolute.round() as i32)
}

/// The inverse of [`to_dls_key_scaling`].
pub fn from_dls_key_scaling(dls_relative: i32, absolute: i32) -> (i32, i32) {
    let relative = (-(dls_relative as f64) / 128.0).round() as i32;
    let absolute = absolute as f64 + (60.0 / 128.0) * dls_relative as f64;
    (relative, absolute.round() as i32)
}

/// The zone's generator amounts with key-number scaling rewritten to DLS form.
fn dls_amounts(zone: &CombinedZone) -> Vec<(GeneratorType, i32)> {
    let mut amounts: Vec<(GeneratorType, i32)> = zone
        .generators
        .iter()
        .map(|g| (g.kind, g.amount as i32))
        .collect();
    for (relative_kind, absolute_kind) in KEY_SCALED {
        let relative = amounts.iter().position(|(kind, _)| *kind == relative_kind);
        let absolute = amounts.iter().position(|(kind, _)| *kind == absolute_kind);
        let (Some(relative), Some(absolute)) = (relative, absolute) else {
            continue;
        };
        let (dls_relative, dls_absolute) =
            to_dls_key_scaling(amounts[relative].1, amounts[absolute].1);
        amounts[relative].1 = dls_relative;
        amounts[absolute].1 = dls_absolute;
    }
    amounts
}

fn generator_connection(kind: GeneratorType, amount: i32) -> Option<ConnectionBlock> {
    use destination as dst;
    use GeneratorType as G;

    let amount = amount as i64;
    let (source, destination, value) = match kind {
        G::Pan => (source::NONE, dst::PAN, amount),
        G::ChorusEffectsSend => (source::NONE, dst::CHORUS, amount),
        G::ReverbEffectsSend => (source::NONE, dst::REVERB, amount),
        G::InitialFilterFc => (source::NONE, dst::FILTER_CUTOFF, amount),
        G::InitialFilterQ => (source::NONE, dst::FILTER_Q, amount),
        G::ModLfoToPitch => (source::LFO, dst::PITCH, amount),
        G::VibLfoToPitch => (source::VIBRATO, dst::PITCH, amount),
        G::ModEnvToPitch => (source::EG2, dst::PITCH, amount),
        G::ModLfoToFilterFc => (source::LFO, dst::FILTER_CUTOFF, amount),
        G::ModEnvToFilterFc => (source::EG2, dst::FILTER_CUTOFF, amount),
        G::ModLfoToVolume => (source::LFO, dst::GAIN, amount),
        G::DelayModLfo => (source::NONE, dst::LFO_DELAY, amount),
        G::FreqModLfo => (source::NONE, dst::LFO_FREQUENCY, amount),
        G::DelayVibLfo => (source::NONE, dst::VIB_DELAY, amount),
        G::FreqVibLfo => (source::NONE, dst::VIB_FREQUENCY, amount),
        G::DelayModEnv => (source::NONE, dst::EG2_DELAY, amount),
        G::AttackModEnv => (source::NONE, dst::EG2_ATTACK, amount),
        G::HoldModEnv => (source::NONE, dst::EG2_HOLD, amount),
        G::DecayModEnv => (source::NONE, dst::EG2_DECAY, amount),
        G::SustainModEnv => (source::NONE, dst::EG2_SUSTAIN, (1000 - amount).max(0)),
        G::ReleaseModEnv => (source::NONE, dst::EG2_RELEASE, amount),
        G::KeynumToModEnvHold => (source::KEYNUMBER, dst::EG2_HOLD, amount),
        G::KeynumToModEnvDecay => (source::KEYNUMBER, dst::EG2_DECAY, amount),
        G::DelayVolEnv => (source::NONE, dst::EG1_DELAY, amount),
        G::AttackVolEnv => (source::NONE, dst::EG1_ATTACK, amount),
        G::HoldVolEnv => (source::NONE, dst::EG1_HOLD, amount),
        G::DecayVolEnv => (source::NONE, dst::EG1_DECAY, amount),
        G::SustainVolEnv => (source::NONE, dst::EG1_SUSTAIN, (1000 - amount).max(0)),
        G::ReleaseVolEnv => (source::NONE, dst::EG1_RELEASE, amount),
        G::KeynumToVolEnvHold => (source::KEYNUMBER, dst::EG1_HOLD, amount),
        G::KeynumToVolEnvDecay => (source::KEYNUMBER, dst::EG1_DECAY, amount),
        // Cents per key, scaled over the 128-key range.
        G::ScaleTuning => (source::KEYNUMBER, dst::PITCH, amount * 128),
        _ => return None,
    };
    Some(ConnectionBlock::new(source, destination, value))
}

/// Maps a modulator source operator to a DLS source.
fn modulator_source(operator: u16) -> Option<u16> {
    let index = (operator & 0x7F) as u8;
    if operator & 0x80 != 0 {
        return Some(source::cc(index));
    }
    match index {
        0 => Some(source::NONE),
        2 => Some(source::VELOCITY),
        3 => Some(source::KEYNUMBER),
        10 => Some(source::POLYPRESSURE),
        13 => Some(source::CHANNELPRESSURE),
        14 => Some(source::PITCHWHEEL),
        _ => None,
    }
}

/// Curve, polarity and direction of a source operator as DLS transform bits,
/// before shifting into the source or control position.
fn transform_bits(operator: u16) -> u16 {
    let curve = (operator >> 10) & 0x3;
    let bipolar = (operator >> 9) & 0x1;
    let negative = (operator >> 8) & 0x1;
    curve | (bipolar << 4) | (negative << 5)
}

fn modulator_connection(modulator: &Modulator) -> Option<ConnectionBlock> {
    use destination as dst;
    use GeneratorType as G;

    let source = modulator_source(modulator.source)?;
    let control = modulator_source(modulator.amount_source)?;
    let kind = G::from_u16(modulator.destination)?;
    let amount = modulator.amount as i64;
    let (destination, value) = match kind {
        G::InitialAttenuation => (dst::GAIN, -amount),
        G::FineTune => (dst::PITCH, amount),
        G::CoarseTune => (dst::PITCH, amount * 100),
        _ => {
            let connection = generator_connection(kind, modulator.amount as i32)?;
            if connection.source != source::NONE {
                return None;
            }
            (connection.destination, amount)
        }
    };

    let source_bits = transform_bits(modulator.source);
    let control_bits = transform_bits(modulator.amount_source);
    Some(ConnectionBlock {
        source,
        control,
        destination,
        transform: ((source_bits & 0xF) << 10)
            | (((source_bits >> 4) & 0x1) << 14)
            | (((source_bits >> 5) & 0x1) << 15)
            | ((control_bits & 0xF) << 4)
            | (((control_bits >> 4) & 0x1) << 8)
            | (((control_bits >> 5) & 0x1) << 9),
        scale: to_scale(value),
    })
}

/// Converts a combined zone's generators and modulators into connection blocks.
/// Entries with no DLS equivalent are skipped.
pub fn articulators(zone: &CombinedZone) -> Vec<ConnectionBlock> {
    let mut blocks = Vec::new();
    for (kind, amount) in dls_amounts(zone) {
        if EXCLUDED.contains(&kind) {
            continue;
        }
        match generator_connection(kind, amount) {
            Some(block) => blocks.push(block),
            None => warn!(generator = ?kind, amount, "Unable to convert generator to DLS"),
        }
    }
    for modulator in zone.modulators.iter() {
        match modulator_connection(modulator) {
            Some(block) => blocks.push(block),
            None => warn!(?modulator, "Unable to convert modulator to DLS"),
        }
    }
    trace!(blocks = blocks.len(), "Converted articulators");
    blocks
}

/// Encodes a zone's articulation as an `art2` chunk.
pub fn write_art2(zone: &CombinedZone) -> Vec<u8> {
    let blocks = articulators(zone);
    let mut payload =
        Vec::with_capacity(ART2_HEADER_SIZE as usize + blocks.len() * CONNECTION_BLOCK_SIZE);
    payload.extend_from_slice(&ART2_HEADER_SIZE.to_le_bytes());
    payload.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
    for block in blocks.iter() {
        block.write(&mut payload);
    }
    write_chunk(b"art2", &payload)
}
