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
use tracing::trace;

use super::{
    generator::GeneratorSet,
    preset::PresetId,
    sample::Sample,
    zone::{Zone, ZoneReference},
    SoundFont,
};

/// A sample and the final generator amounts to play it with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayableUnit {
    pub sample_index: usize,
    pub generators: GeneratorSet,
}

impl PlayableUnit {
    /// The sample header this unit plays.
    pub fn sample<'a>(&self, soundfont: &'a SoundFont) -> &'a Sample {
        // Sample references are validated when the bank is decoded.
        &soundfont.samples()[self.sample_index]
    }
}

/// Merges the generator lists of one preset zone and one instrument zone.
///
/// The instrument zone's own amounts win over its global zone. The preset zone's
/// amounts (falling back to the global preset zone) are then added on top, apart
/// from the generators that only make sense as absolute values. Nothing is clamped.
pub(crate) fn merge_generators(
    preset_zone: &Zone,
    preset_global: Option<&Zone>,
    instrument_zone: &Zone,
    instrument_global: Option<&Zone>,
) -> GeneratorSet {
    let mut generators = instrument_zone.generators;
    if let Some(global) = instrument_global {
        generators.fill_from(&global.generators);
    }

    let mut offsets = preset_zone.generators;
    if let Some(global) = preset_global {
        offsets.fill_from(&global.generators);
    }

    for offset in offsets.iter() {
        if offset.kind.is_non_additive() {
            continue;
        }
        generators.add(offset.kind, offset.amount);
    }
    generators
}

impl SoundFont {
    /// Resolves the samples and generator amounts that sound for a note.
    pub fn resolve(&self, preset: PresetId, note: u8, velocity: u8) -> Vec<PlayableUnit> {
        let mut units = Vec::new();
        self.resolve_into(preset, note, velocity, &mut units);
        units
    }

    /// Like [`SoundFont::resolve`], but reuses the caller's buffer. The buffer is
    /// cleared first.
    pub fn resolve_into(
        &self,
        preset: PresetId,
        note: u8,
        velocity: u8,
        units: &mut Vec<PlayableUnit>,
    ) {
        units.clear();
        let Some(preset) = self.preset(preset) else {
            return;
        };

        let preset_global = preset.global_zone();
        for preset_zone in preset.local_zones() {
            if !preset_zone.matches(note, velocity) {
                continue;
            }
            let ZoneReference::Instrument(instrument_index) = preset_zone.reference else {
                continue;
            };
            let Some(instrument) = self.instrument(instrument_index) else {
                continue;
            };

            let instrument_global = instrument.global_zone();
            for instrument_zone in instrument.local_zones() {
                if !instrument_zone.matches(note, velocity) {
                    continue;
                }
                let ZoneReference::Sample(sample_index) = instrument_zone.reference else {
                    continue;
                };

                let mut generators = merge_generators(
                    preset_zone,
                    preset_global,
                    instrument_zone,
                    instrument_global,
                );
                let clamped = generators.clamp_all();
                if clamped > 0 {
                    trace!(
                        preset = %preset,
                        instrument = instrument.name.as_str(),
                        note,
                        clamped,
                        "Clamped generators"
                    );
                }

                units.push(PlayableUnit {
                    sample_index,
                    generators,
                });
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{
        soundfont::{GeneratorType, PresetId, SoundFont},
        testutil::soundfont::{SoundFontBuilder, TestInstrument, TestPreset, TestZone},
    };

    #[test]
    fn test_inherits_global_instrument_zone() {
        let mut builder = SoundFontBuilder::new();
        let sample = builder.add_sine_sample("X", 60, 44100, 1000);
        let instrument = builder.add_instrument(
            TestInstrument::new("inst")
                .with_zone(
                    TestZone::global().with_generator(GeneratorType::InitialAttenuation, 60),
                )
                .with_zone(TestZone::sample(sample)),
        );
        builder.add_preset(TestPreset::new("Piano", 0, 0).with_zone(TestZone::instrument(instrument)));
        let soundfont = SoundFont::from_bytes(builder.build()).unwrap();

        let units = soundfont.resolve(PresetId(0), 60, 100);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].sample(&soundfont).name, "X");
        assert_eq!(
            units[0].generators.get(GeneratorType::InitialAttenuation),
            Some(60)
        );
    }

    #[test]
    fn test_local_beats_global_before_preset_sum() {
        let mut builder = SoundFontBuilder::new();
        let sample = builder.add_sine_sample("X", 60, 44100, 1000);
        let instrument = builder.add_instrument(
            TestInstrument::new("inst")
                .with_zone(TestZone::global().with_generator(GeneratorType::Pan, -300))
                .with_zone(TestZone::sample(sample).with_generator(GeneratorType::Pan, 100)),
        );
        builder.add_preset(
            TestPreset::new("Piano", 0, 0)
                .with_zone(TestZone::global().with_generator(GeneratorType::Pan, 50))
                .with_zone(TestZone::instrument(instrument).with_generator(GeneratorType::Pan, 20)),
        );
        let soundfont = SoundFont::from_bytes(builder.build()).unwrap();

        let units = soundfont.resolve(PresetId(0), 60, 100);
        // 100 from the local instrument zone plus 20 from the local preset zone.
        assert_eq!(units[0].generators.get(GeneratorType::Pan), Some(120));
    }

    #[test]
    fn test_preset_sum_uses_default_and_clamps() {
        let mut builder = SoundFontBuilder::new();
        let sample = builder.add_sine_sample("X", 60, 44100, 1000);
        let instrument = builder.add_instrument(
            TestInstrument::new("inst").with_zone(
                TestZone::sample(sample).with_generator(GeneratorType::InitialAttenuation, 1400),
            ),
        );
        builder.add_preset(
            TestPreset::new("Piano", 0, 0).with_zone(
                TestZone::instrument(instrument)
                    .with_generator(GeneratorType::ScaleTuning, -50)
                    .with_generator(GeneratorType::InitialAttenuation, 100)
                    .with_generator(GeneratorType::SampleModes, 1),
            ),
        );
        let soundfont = SoundFont::from_bytes(builder.build()).unwrap();

        let generators = soundfont.resolve(PresetId(0), 60, 100)[0].generators;
        assert_eq!(generators.get(GeneratorType::ScaleTuning), Some(50));
        assert_eq!(generators.get(GeneratorType::InitialAttenuation), Some(1440));
        // Loop mode is never summed from the preset level.
        assert_eq!(generators.get(GeneratorType::SampleModes), None);
    }

    #[test]
    fn test_ranges_filter_zones() {
        let mut builder = SoundFontBuilder::new();
        let low = builder.add_sine_sample("low", 48, 44100, 1000);
        let high = builder.add_sine_sample("high", 72, 44100, 1000);
        let soft = builder.add_sine_sample("soft", 72, 44100, 1000);
        let instrument = builder.add_instrument(
            TestInstrument::new("inst")
                .with_zone(TestZone::sample(low).with_key_range(0, 59))
                .with_zone(TestZone::sample(high).with_key_range(60, 127).with_vel_range(64, 127))
                .with_zone(TestZone::sample(soft).with_key_range(60, 127).with_vel_range(0, 63)),
        );
        builder.add_preset(
            TestPreset::new("Piano", 0, 0)
                .with_zone(TestZone::global().with_key_range(0, 10))
                .with_zone(TestZone::instrument(instrument).with_key_range(0, 100)),
        );
        let soundfont = SoundFont::from_bytes(builder.build()).unwrap();

        let names = |note, velocity| -> Vec<String> {
            soundfont
                .resolve(PresetId(0), note, velocity)
                .iter()
                .map(|u| u.sample(&soundfont).name.clone())
                .collect()
        };
        // The global preset zone's range doesn't constrain.
        assert_eq!(names(40, 100), vec!["low"]);
        assert_eq!(names(64, 100), vec!["high"]);
        assert_eq!(names(64, 20), vec!["soft"]);
        assert!(names(110, 100).is_empty());
    }

    #[test]
    fn test_resolve_into_reuses_buffer() {
        let mut builder = SoundFontBuilder::new();
        let sample = builder.add_sine_sample("X", 60, 44100, 1000);
        let instrument = builder.add_instrument(
            TestInstrument::new("inst")
                .with_zone(TestZone::sample(sample))
                .with_zone(TestZone::sample(sample)),
        );
        builder.add_preset(TestPreset::new("Piano", 0, 0).with_zone(TestZone::instrument(instrument)));
        let soundfont = SoundFont::from_bytes(builder.build()).unwrap();

        let mut units = Vec::with_capacity(8);
        soundfont.resolve_into(PresetId(0), 60, 100, &mut units);
        assert_eq!(units.len(), 2);
        soundfont.resolve_into(PresetId(0), 60, 100, &mut units);
        assert_eq!(units.len(), 2);
        soundfont.resolve_into(PresetId(5), 60, 100, &mut units);
        assert!(units.is_empty());
    }
}
