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

//! A single sounding sample.

use std::{
    f64::consts::TAU,
    sync::atomic::{AtomicU64, Ordering},
};

use super::{
    channel::VibratoOptions,
    envelope::{EnvelopePhase, VolumeEnvelope},
    params::{pan_gains, LoopMode, Routing, VoiceParams},
};
use crate::soundfont::SampleFrames;

/// Global voice ID counter. IDs increase with age, so the smallest is the oldest.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// The pitch a voice starts with.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VoicePitch {
    /// Pitch bend in semitones.
    pub bend: f64,
    /// Channel and master tuning in cents, fixed for the life of the voice.
    pub tuning_cents: f64,
    pub vibrato: VibratoOptions,
}

/// One sample playing for one note.
pub struct Voice {
    id: u64,
    channel: u8,
    note: u8,
    params: VoiceParams,
    /// Absolute frame position in the sample block.
    position: f64,
    /// Current frames-per-output-frame, including pitch bend and tuning.
    ratio: f64,
    tuning_ratio: f64,
    vibrato: VibratoOptions,
    vibrato_delay: u64,
    /// Vibrato phase advance per output frame, in radians.
    vibrato_step: f64,
    vibrato_phase: f64,
    /// Output frames rendered.
    age: u64,
    looping: bool,
    envelope: VolumeEnvelope,
    /// Velocity, attenuation, master gain and the per-note divider.
    gain: f32,
    left_gain: f32,
    right_gain: f32,
    /// Note-off arrived while the sustain pedal was down.
    sustained: bool,
    /// The sample ran off its end.
    exhausted: bool,
}

impl Voice {
    /// Creates a voice. `pan_offset` is the channel pan added to the pan generator.
    pub fn new(
        channel: u8,
        note: u8,
        params: VoiceParams,
        gain: f32,
        pan_offset: i16,
        pitch: VoicePitch,
        output_rate: u32,
    ) -> Voice {
        let tuning_ratio = cents_to_ratio(pitch.tuning_cents);
        let (left_gain, right_gain) = match params.routing {
            Routing::Both => pan_gains(params.pan.saturating_add(pan_offset)),
            Routing::Left => (1.0, 0.0),
            Routing::Right => (0.0, 1.0),
        };
        Voice {
            id: NEXT_VOICE_ID.fetch_add(1, Ordering::Relaxed),
            channel,
            note,
            position: params.start as f64,
            ratio: params.base_ratio * bend_ratio(pitch.bend) * tuning_ratio,
            tuning_ratio,
            vibrato: pitch.vibrato,
            vibrato_delay: (pitch.vibrato.delay * output_rate as f64).round().max(0.0) as u64,
            vibrato_step: TAU * pitch.vibrato.rate / output_rate.max(1) as f64,
            vibrato_phase: 0.0,
            age: 0,
            looping: params.loop_mode != LoopMode::NoLoop,
            envelope: VolumeEnvelope::new(&params.envelope, output_rate),
            params,
            gain,
            left_gain,
            right_gain,
            sustained: false,
            exhausted: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn exclusive_class(&self) -> u8 {
        self.params.exclusive_class
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.envelope.phase()
    }

    pub fn is_releasing(&self) -> bool {
        self.envelope.is_releasing()
    }

    pub fn is_finished(&self) -> bool {
        self.exhausted || self.envelope.is_finished()
    }

    pub fn is_sustained(&self) -> bool {
        self.sustained
    }

    pub fn playback_ratio(&self) -> f64 {
        self.ratio
    }

    pub fn vibrato(&self) -> VibratoOptions {
        self.vibrato
    }

    /// Holds the note until the sustain pedal lifts.
    pub fn sustain(&mut self) {
        if !self.is_releasing() {
            self.sustained = true;
        }
    }

    /// Starts the release phase. Loop-until-release voices stop looping here.
    pub fn release(&mut self) {
        self.sustained = false;
        if self.params.loop_mode == LoopMode::UntilRelease {
            self.looping = false;
        }
        self.envelope.release();
    }

    /// Fades out over `frames`, ignoring the release generator.
    pub fn kill(&mut self, frames: u64) {
        self.sustained = false;
        self.envelope.kill(frames);
    }

    /// Retunes the voice without restarting it.
    pub fn set_bend(&mut self, semitones: f64) {
        self.ratio = self.params.base_ratio * bend_ratio(semitones) * self.tuning_ratio;
    }

    /// Advances the vibrato one frame and returns its playback-rate multiplier.
    fn vibrato_factor(&mut self) -> f64 {
        if !self.vibrato.is_active() {
            return 1.0;
        }
        self.age += 1;
        if self.age <= self.vibrato_delay {
            return 1.0;
        }
        let cents = self.vibrato.depth * self.vibrato_phase.sin();
        self.vibrato_phase = (self.vibrato_phase + self.vibrato_step) % TAU;
        cents_to_ratio(cents)
    }

    /// Mixes this voice into the output buffers.
    pub fn render(
        &mut self,
        data: &SampleFrames,
        channel_gain: f32,
        left: &mut [f32],
        right: &mut [f32],
    ) {
        let (loop_start, loop_end) = (self.params.loop_start, self.params.loop_end);
        let loop_len = (loop_end - loop_start) as f64;
        let end = self.params.end;

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            if self.is_finished() {
                return;
            }

            let index = self.position as usize;
            if !self.looping && index >= end {
                self.exhausted = true;
                return;
            }
            let fraction = (self.position - index as f64) as f32;
            let next = if self.looping && index + 1 >= loop_end {
                loop_start
            } else {
                index + 1
            };
            let current = data.frame_f32(index);
            let following = if next < end || self.looping {
                data.frame_f32(next)
            } else {
                0.0
            };
            let value = current + (following - current) * fraction;

            let gain = self.envelope.next_gain() * self.gain * channel_gain;
            *l += value * gain * self.left_gain;
            *r += value * gain * self.right_gain;

            self.position += self.ratio * self.vibrato_factor();
            if self.looping && loop_len > 0.0 {
                while self.position >= loop_end as f64 {
                    self.position -= loop_len;
                }
            }
        }
    }
}

fn bend_ratio(semitones: f64) -> f64 {
    cents_to_ratio(semitones * 100.0)
}

fn cents_to_ratio(cents: f64) -> f64 {
    2f64.powf(cents / 1200.0)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::synth::params::EnvelopeParams;

    fn params(loop_mode: LoopMode, release: f64) -> VoiceParams {
        VoiceParams {
            key: 60,
            velocity: 127,
            root_key: 60,
            pitch_cents: 0.0,
            base_ratio: 1.0,
            attenuation: 1.0,
            pan: 0,
            routing: Routing::Both,
            envelope: EnvelopeParams {
                delay: 0.0,
                attack: 0.0,
                hold: 0.0,
                decay: 0.0,
                sustain_level: 1.0,
                release,
            },
            start: 0,
            end: 8,
            loop_start: 2,
            loop_end: 6,
            loop_mode,
            exclusive_class: 0,
        }
    }

    fn voice(loop_mode: LoopMode, release: f64) -> Voice {
        Voice::new(0, 60, params(loop_mode, release), 1.0, 0, VoicePitch::default(), 1000)
    }

    fn data() -> Vec<u8> {
        (0..8i16)
            .flat_map(|i| (i * 1024).to_le_bytes())
            .collect()
    }

    #[test]
    fn test_ids_increase() {
        let a = voice(LoopMode::NoLoop, 0.0);
        let b = voice(LoopMode::NoLoop, 0.0);
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_plays_to_end_without_loop() {
        let bytes = data();
        let frames = SampleFrames::new(&bytes);
        let mut voice = Voice::new(
            0,
            60,
            params(LoopMode::NoLoop, 0.0),
            1.0,
            -500,
            VoicePitch::default(),
            1000,
        );

        let (mut left, mut right) = (vec![0.0; 16], vec![0.0; 16]);
        voice.render(&frames, 1.0, &mut left, &mut right);
        assert!(voice.is_finished());
        for (i, sample) in left.iter().take(8).enumerate() {
            assert!((sample - i as f32 * 1024.0 / 32768.0).abs() < 1e-6);
        }
        assert!(left[8..].iter().all(|s| *s == 0.0));
        assert!(right.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_loops_until_release() {
        let bytes = data();
        let frames = SampleFrames::new(&bytes);
        let mut voice = voice(LoopMode::UntilRelease, 1.0);

        let (mut left, mut right) = (vec![0.0; 64], vec![0.0; 64]);
        voice.render(&frames, 1.0, &mut left, &mut right);
        assert!(!voice.is_finished());
        // After the first pass the loop 2..6 repeats.
        assert!(left[6].abs() > 0.0);
        assert!((left[6] - left[2]).abs() < 1e-6);

        voice.release();
        let (mut left, mut right) = (vec![0.0; 64], vec![0.0; 64]);
        voice.render(&frames, 1.0, &mut left, &mut right);
        // The remainder plays out and the sample runs off its end.
        assert!(voice.is_finished());
    }

    #[test]
    fn test_pitch_bend_changes_ratio() {
        let mut voice = voice(LoopMode::Continuous, 0.0);
        assert!((voice.playback_ratio() - 1.0).abs() < 1e-12);
        voice.set_bend(12.0);
        assert!((voice.playback_ratio() - 2.0).abs() < 1e-12);
        voice.set_bend(-12.0);
        assert!((voice.playback_ratio() - 0.5).abs() < 1e-12);
        assert_eq!(voice.phase(), EnvelopePhase::Delay);
    }

    #[test]
    fn test_tuning_scales_ratio_through_bends() {
        let pitch = VoicePitch {
            tuning_cents: 100.0,
            ..VoicePitch::default()
        };
        let mut voice = Voice::new(0, 60, params(LoopMode::Continuous, 0.0), 1.0, 0, pitch, 1000);
        let semitone = 2f64.powf(1.0 / 12.0);
        assert!((voice.playback_ratio() - semitone).abs() < 1e-12);
        voice.set_bend(12.0);
        assert!((voice.playback_ratio() - 2.0 * semitone).abs() < 1e-12);
        voice.set_bend(0.0);
        assert!((voice.playback_ratio() - semitone).abs() < 1e-12);
    }

    #[test]
    fn test_vibrato_detunes_after_delay() {
        let pitch = VoicePitch {
            vibrato: VibratoOptions {
                depth: 50.0,
                rate: 10.0,
                delay: 0.05,
            },
            ..VoicePitch::default()
        };
        let mut vibrating =
            Voice::new(0, 60, params(LoopMode::Continuous, 0.0), 1.0, 0, pitch, 1000);
        assert_eq!(vibrating.vibrato(), pitch.vibrato);

        let factors: Vec<f64> = (0..200).map(|_| vibrating.vibrato_factor()).collect();
        assert!(factors[..50].iter().all(|f| *f == 1.0));
        let (lo, hi) = (cents_to_ratio(-50.0), cents_to_ratio(50.0));
        assert!(factors[50..].iter().all(|f| *f >= lo - 1e-12 && *f <= hi + 1e-12));
        assert!(factors[50..].iter().any(|f| *f > 1.01));
        assert!(factors[50..].iter().any(|f| *f < 0.99));

        // Without vibrato the rate never moves.
        let mut plain = voice(LoopMode::Continuous, 0.0);
        assert!((0..200).all(|_| plain.vibrato_factor() == 1.0));
    }

    #[test]
    fn test_sustain_and_kill() {
        let mut voice = voice(LoopMode::Continuous, 10.0);
        voice.sustain();
        assert!(voice.is_sustained());
        assert!(!voice.is_releasing());

        let bytes = data();
        let frames = SampleFrames::new(&bytes);
        let (mut left, mut right) = (vec![0.0; 4], vec![0.0; 4]);
        voice.render(&frames, 1.0, &mut left, &mut right);

        voice.kill(2);
        assert!(!voice.is_sustained());
        let (mut left, mut right) = (vec![0.0; 4], vec![0.0; 4]);
        voice.render(&frames, 1.0, &mut left, &mut right);
        assert!(voice.is_finished());
    }
}
