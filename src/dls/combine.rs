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
use tracing::debug;

use crate::soundfont::{
    merge_by_identity, merge_generators, sum_by_identity, GeneratorSet, Modulator, PresetId,
    Range, SoundFont, Zone, ZoneReference,
};

/// One preset zone and one instrument zone flattened into a single zone.
#[derive(Clone, Debug, PartialEq)]
pub struct CombinedZone {
    pub key_range: Range,
    pub vel_range: Range,
    pub sample_index: usize,
    /// Merged but unclamped amounts.
    pub generators: GeneratorSet,
    pub modulators: Vec<Modulator>,
}

/// The ranges a zone covers, falling back to its global zone's when it has none.
fn ranges(zone: &Zone, global: Option<&Zone>) -> (Range, Range) {
    let key_range = match global {
        Some(global) if !zone.has_key_range => global.key_range,
        _ => zone.key_range,
    };
    let vel_range = match global {
        Some(global) if !zone.has_vel_range => global.vel_range,
        _ => zone.vel_range,
    };
    (key_range, vel_range)
}

/// Flattens a preset into instrument-level zones, one per overlapping pair of
/// preset and instrument zones. Pairs whose ranges don't overlap are dropped.
pub fn combine_zones(soundfont: &SoundFont, preset: PresetId) -> Vec<CombinedZone> {
    let Some(preset) = soundfont.preset(preset) else {
        return Vec::new();
    };

    let mut combined = Vec::new();
    let preset_global = preset.global_zone();
    let preset_global_modulators = preset_global.map_or(&[][..], |z| z.modulators.as_slice());
    for preset_zone in preset.local_zones() {
        let ZoneReference::Instrument(index) = preset_zone.reference else {
            continue;
        };
        let Some(instrument) = soundfont.instrument(index) else {
            continue;
        };
        let (preset_keys, preset_velocities) = ranges(preset_zone, preset_global);
        let preset_modulators =
            merge_by_identity(&preset_zone.modulators, preset_global_modulators);

        let instrument_global = instrument.global_zone();
        let instrument_global_modulators =
            instrument_global.map_or(&[][..], |z| z.modulators.as_slice());
        for instrument_zone in instrument.local_zones() {
            let ZoneReference::Sample(sample_index) = instrument_zone.reference else {
                continue;
            };
            let (keys, velocities) = ranges(instrument_zone, instrument_global);
            let (Some(key_range), Some(vel_range)) = (
                keys.intersect(&preset_keys),
                velocities.intersect(&preset_velocities),
            ) else {
                debug!(
                    preset = %preset,
                    instrument = instrument.name.as_str(),
                    "Dropping zone pair with no overlap"
                );
                continue;
            };

            let instrument_modulators =
                merge_by_identity(&instrument_zone.modulators, instrument_global_modulators);
            combined.push(CombinedZone {
                key_range,
                vel_range,
                sample_index,
                generators: merge_generators(
                    preset_zone,
                    preset_global,
                    instrument_zone,
                    instrument_global,
                ),
                modulators: sum_by_identity(&instrument_modulators, &preset_modulators),
            });
        }
    }
    combined
}
