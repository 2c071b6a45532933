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

//! Conversion of resolved generator amounts into playback parameters.

use crate::soundfont::{GeneratorSet, GeneratorType, PlayableUnit, Sample};

/// Frames covered by one unit of a coarse address offset.
const COARSE_OFFSET_FRAMES: i64 = 32768;

/// Converts timecents to seconds.
pub fn timecents_to_seconds(timecents: f64) -> f64 {
    2f64.powf(timecents / 1200.0)
}

/// Converts an attenuation in centibels to a linear gain.
pub fn centibels_to_gain(centibels: f64) -> f64 {
    10f64.powf(-centibels / 200.0)
}

/// Sample loop behavior, from the `sampleModes` generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopMode {
    /// Play from start to end once.
    NoLoop,
    /// Loop for as long as the voice sounds, including the release.
    Continuous,
    /// Loop until note-off, then play through to the end of the sample.
    UntilRelease,
}

impl LoopMode {
    pub fn from_amount(amount: i16) -> LoopMode {
        match amount {
            1 => LoopMode::Continuous,
            3 => LoopMode::UntilRelease,
            _ => LoopMode::NoLoop,
        }
    }
}

/// Which output side a sample feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Routing {
    Both,
    Left,
    Right,
}

/// Volume envelope timings in seconds. The sustain level is a linear gain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeParams {
    pub delay: f64,
    pub attack: f64,
    pub hold: f64,
    pub decay: f64,
    pub sustain_level: f64,
    pub release: f64,
}

/// Everything a voice needs to play one sample for one note.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceParams {
    /// The key used for pitch and envelope scaling.
    pub key: u8,
    pub velocity: u8,
    pub root_key: u8,
    /// Pitch offset from the sample's recorded pitch, before pitch bend.
    pub pitch_cents: f64,
    /// Frames of sample data advanced per output frame, before pitch bend.
    pub base_ratio: f64,
    /// Linear gain from the initial attenuation.
    pub attenuation: f64,
    /// Pan in the generator's -500..=500 range.
    pub pan: i16,
    pub routing: Routing,
    pub envelope: EnvelopeParams,
    pub start: usize,
    pub end: usize,
    pub loop_start: usize,
    pub loop_end: usize,
    pub loop_mode: LoopMode,
    pub exclusive_class: u8,
}

impl VoiceParams {
    /// Computes playback parameters for a resolved unit.
    ///
    /// `data_frames` is the size of the whole sample block and bounds every address.
    pub fn new(
        unit: &PlayableUnit,
        sample: &Sample,
        note: u8,
        velocity: u8,
        output_rate: u32,
        data_frames: usize,
    ) -> VoiceParams {
        let generators = &unit.generators;
        let amount = |kind: GeneratorType| generators.amount(kind) as f64;

        let key = override_or(generators, GeneratorType::KeyNum, note);
        let velocity = override_or(generators, GeneratorType::Velocity, velocity);
        let root_key = override_or(
            generators,
            GeneratorType::OverridingRootKey,
            sample.original_pitch,
        );

        let pitch_cents = (key as f64 - root_key as f64) * amount(GeneratorType::ScaleTuning)
            + amount(GeneratorType::CoarseTune) * 100.0
            + amount(GeneratorType::FineTune)
            + sample.pitch_correction as f64;
        let rate_ratio = if output_rate == 0 {
            1.0
        } else {
            sample.sample_rate as f64 / output_rate as f64
        };
        let base_ratio = 2f64.powf(pitch_cents / 1200.0) * rate_ratio;

        let key_offset = 60.0 - key as f64;
        let envelope = EnvelopeParams {
            delay: timecents_to_seconds(amount(GeneratorType::DelayVolEnv)),
            attack: timecents_to_seconds(amount(GeneratorType::AttackVolEnv)),
            hold: timecents_to_seconds(
                amount(GeneratorType::HoldVolEnv)
                    + amount(GeneratorType::KeynumToVolEnvHold) * key_offset,
            ),
            decay: timecents_to_seconds(
                amount(GeneratorType::DecayVolEnv)
                    + amount(GeneratorType::KeynumToVolEnvDecay) * key_offset,
            ),
            sustain_level: centibels_to_gain(amount(GeneratorType::SustainVolEnv)),
            release: timecents_to_seconds(amount(GeneratorType::ReleaseVolEnv)),
        };

        let address = |base: u32, fine: GeneratorType, coarse: GeneratorType| -> usize {
            let position = base as i64
                + generators.amount(fine) as i64
                + generators.amount(coarse) as i64 * COARSE_OFFSET_FRAMES;
            position.clamp(0, data_frames as i64) as usize
        };
        let start = address(
            sample.start,
            GeneratorType::StartAddrsOffset,
            GeneratorType::StartAddrsCoarseOffset,
        );
        let end = address(
            sample.end,
            GeneratorType::EndAddrsOffset,
            GeneratorType::EndAddrsCoarseOffset,
        )
        .max(start);
        let loop_start = address(
            sample.loop_start,
            GeneratorType::StartloopAddrsOffset,
            GeneratorType::StartloopAddrsCoarseOffset,
        )
        .clamp(start, end);
        let loop_end = address(
            sample.loop_end,
            GeneratorType::EndloopAddrsOffset,
            GeneratorType::EndloopAddrsCoarseOffset,
        )
        .clamp(start, end);

        let loop_mode = if loop_end > loop_start {
            LoopMode::from_amount(generators.amount(GeneratorType::SampleModes))
        } else {
            LoopMode::NoLoop
        };

        let routing = if sample.sample_type.is_left() {
            Routing::Left
        } else if sample.sample_type.is_right() {
            Routing::Right
        } else {
            Routing::Both
        };

        VoiceParams {
            key,
            velocity,
            root_key,
            pitch_cents,
            base_ratio,
            attenuation: centibels_to_gain(amount(GeneratorType::InitialAttenuation)),
            pan: generators.amount(GeneratorType::Pan),
            routing,
            envelope,
            start,
            end,
            loop_start,
            loop_end,
            loop_mode,
            exclusive_class: generators.amount(GeneratorType::ExclusiveClass).clamp(0, 127) as u8,
        }
    }
}

/// Generators like `keyNum` hold -1 when unset and a MIDI value otherwise.
fn override_or(generators: &GeneratorSet, kind: GeneratorType, fallback: u8) -> u8 {
    match generators.amount(kind) {
        value @ 0..=127 => value as u8,
        _ => fallback,
    }
}

/// Equal-power gains for a pan amount in -500..=500.
pub fn pan_gains(pan: i16) -> (f32, f32) {
    let position = (pan.clamp(-500, 500) as f32 + 500.0) / 1000.0;
    let angle = position * std::f32::consts::FRAC_PI_2;
    (angle.cos(), angle.sin())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::soundfont::{GeneratorSet, SampleType};

    fn sample() -> Sample {
        Sample {
            name: "test".to_string(),
            start: 1000,
            end: 2000,
            loop_start: 1100,
            loop_end: 1900,
            sample_rate: 22050,
            original_pitch: 60,
            pitch_correction: 0,
            sample_link: 0,
            sample_type: SampleType::Mono,
        }
    }

    fn params(generators: GeneratorSet, sample: &Sample, note: u8) -> VoiceParams {
        let unit = PlayableUnit {
            sample_index: 0,
            generators,
        };
        VoiceParams::new(&unit, sample, note, 100, 44100, 100_000)
    }

    #[test]
    fn test_conversions() {
        assert!((timecents_to_seconds(0.0) - 1.0).abs() < 1e-12);
        assert!((timecents_to_seconds(1200.0) - 2.0).abs() < 1e-12);
        assert!((timecents_to_seconds(-12000.0) - 2f64.powi(-10)).abs() < 1e-12);
        assert!((centibels_to_gain(0.0) - 1.0).abs() < 1e-12);
        assert!((centibels_to_gain(200.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_pitch() {
        let sample = sample();
        let p = params(GeneratorSet::new(), &sample, 72);
        assert_eq!(p.root_key, 60);
        assert!((p.pitch_cents - 1200.0).abs() < 1e-9);
        // An octave up at half the output rate.
        assert!((p.base_ratio - 1.0).abs() < 1e-9);

        let mut generators = GeneratorSet::new();
        generators.set(GeneratorType::OverridingRootKey, 72);
        generators.set(GeneratorType::CoarseTune, -1);
        generators.set(GeneratorType::FineTune, 50);
        generators.set(GeneratorType::ScaleTuning, 50);
        let p = params(generators, &sample, 84);
        assert_eq!(p.root_key, 72);
        assert!((p.pitch_cents - (12.0 * 50.0 - 100.0 + 50.0)).abs() < 1e-9);
    }

    #[test]
    fn test_envelope_key_scaling() {
        let sample = sample();
        let mut generators = GeneratorSet::new();
        generators.set(GeneratorType::HoldVolEnv, 0);
        generators.set(GeneratorType::DecayVolEnv, 0);
        generators.set(GeneratorType::KeynumToVolEnvHold, 100);
        generators.set(GeneratorType::KeynumToVolEnvDecay, -100);
        generators.set(GeneratorType::SustainVolEnv, 200);

        let p = params(generators, &sample, 48);
        // 12 keys below 60 at +/-100 timecents per key is one octave.
        assert!((p.envelope.hold - 2.0).abs() < 1e-9);
        assert!((p.envelope.decay - 0.5).abs() < 1e-9);
        assert!((p.envelope.sustain_level - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_addressing_and_loop() {
        let sample = sample();
        let mut generators = GeneratorSet::new();
        generators.set(GeneratorType::StartAddrsOffset, 10);
        generators.set(GeneratorType::EndAddrsOffset, -10);
        generators.set(GeneratorType::StartloopAddrsOffset, -50);
        generators.set(GeneratorType::EndloopAddrsCoarseOffset, 1);
        generators.set(GeneratorType::SampleModes, 3);

        let p = params(generators, &sample, 60);
        assert_eq!(p.start, 1010);
        assert_eq!(p.end, 1990);
        assert_eq!(p.loop_start, 1050);
        // Pushed past the end by the coarse offset, then clamped.
        assert_eq!(p.loop_end, 1990);
        assert_eq!(p.loop_mode, LoopMode::UntilRelease);
    }

    #[test]
    fn test_empty_loop_disables_looping() {
        let mut sample = sample();
        sample.loop_end = sample.loop_start;
        let mut generators = GeneratorSet::new();
        generators.set(GeneratorType::SampleModes, 1);
        assert_eq!(params(generators, &sample, 60).loop_mode, LoopMode::NoLoop);
    }

    #[test]
    fn test_pan_gains() {
        let (left, right) = pan_gains(0);
        assert!((left - right).abs() < 1e-6);
        assert!((left * left + right * right - 1.0).abs() < 1e-6);

        let (left, right) = pan_gains(-500);
        assert!((left - 1.0).abs() < 1e-6);
        assert!(right.abs() < 1e-6);
    }
}
