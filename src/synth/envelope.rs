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
use super::params::EnvelopeParams;

/// The level treated as silence, in dB.
const SILENCE_DB: f32 = -96.0;

/// The shortest time a voice sounds before a release takes effect.
const MIN_SOUNDING_SECS: f64 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopePhase {
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
    Finished,
}

/// A DAHDSR volume envelope advanced one frame at a time.
///
/// Attack is linear in amplitude. Decay and release are linear in dB. Release always
/// lasts exactly its length in frames, whatever level it starts from. A release
/// requested before the voice has sounded for [`MIN_SOUNDING_SECS`] is held until
/// it has.
#[derive(Clone, Debug)]
pub struct VolumeEnvelope {
    phase: EnvelopePhase,
    /// Frames spent in the current phase.
    elapsed: u64,
    delay: u64,
    attack: u64,
    hold: u64,
    decay: u64,
    release: u64,
    sustain_db: f32,
    /// Gain after the most recent frame.
    level: f32,
    release_start_db: f32,
    /// Frames rendered since the attack began.
    sounded: u64,
    min_sounding: u64,
    release_pending: bool,
}

fn seconds_to_frames(seconds: f64, sample_rate: u32) -> u64 {
    (seconds * sample_rate as f64).round().max(0.0) as u64
}

fn gain_to_db(gain: f32) -> f32 {
    if gain <= 0.0 {
        SILENCE_DB
    } else {
        (20.0 * gain.log10()).max(SILENCE_DB)
    }
}

fn db_to_gain(db: f32) -> f32 {
    if db <= SILENCE_DB {
        0.0
    } else {
        10f32.powf(db / 20.0)
    }
}

impl VolumeEnvelope {
    pub fn new(params: &EnvelopeParams, sample_rate: u32) -> VolumeEnvelope {
        VolumeEnvelope {
            phase: EnvelopePhase::Delay,
            elapsed: 0,
            delay: seconds_to_frames(params.delay, sample_rate),
            attack: seconds_to_frames(params.attack, sample_rate),
            hold: seconds_to_frames(params.hold, sample_rate),
            decay: seconds_to_frames(params.decay, sample_rate),
            release: seconds_to_frames(params.release, sample_rate),
            sustain_db: gain_to_db(params.sustain_level as f32),
            level: 0.0,
            release_start_db: SILENCE_DB,
            sounded: 0,
            min_sounding: seconds_to_frames(MIN_SOUNDING_SECS, sample_rate),
            release_pending: false,
        }
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// True once a release was requested, including one still held back.
    pub fn is_releasing(&self) -> bool {
        self.release_pending
            || matches!(self.phase, EnvelopePhase::Release | EnvelopePhase::Finished)
    }

    pub fn is_release_pending(&self) -> bool {
        self.release_pending
    }

    pub fn is_finished(&self) -> bool {
        self.phase == EnvelopePhase::Finished
    }

    /// Frames the release phase lasts.
    pub fn release_frames(&self) -> u64 {
        self.release
    }

    /// Begins the release phase with the envelope's own release time.
    pub fn release(&mut self) {
        if self.is_releasing() {
            return;
        }
        if self.sounded < self.min_sounding {
            self.release_pending = true;
            return;
        }
        self.enter_release(self.release);
    }

    /// Forces a release of the given length, even if already releasing. Used for
    /// kills, which must end quickly regardless of the release generator.
    pub fn kill(&mut self, frames: u64) {
        if self.is_finished() {
            return;
        }
        self.release_pending = false;
        let remaining = if self.phase == EnvelopePhase::Release {
            self.release.saturating_sub(self.elapsed)
        } else {
            u64::MAX
        };
        self.enter_release(frames.min(remaining));
    }

    fn enter_release(&mut self, frames: u64) {
        self.release_start_db = gain_to_db(self.level);
        self.release = frames;
        self.set_phase(EnvelopePhase::Release);
        if frames == 0 {
            self.level = 0.0;
            self.set_phase(EnvelopePhase::Finished);
        }
    }

    fn set_phase(&mut self, phase: EnvelopePhase) {
        self.phase = phase;
        self.elapsed = 0;
    }

    /// Advances one frame and returns the gain for it.
    pub fn next_gain(&mut self) -> f32 {
        let gain = self.advance();
        if matches!(
            self.phase,
            EnvelopePhase::Attack
                | EnvelopePhase::Hold
                | EnvelopePhase::Decay
                | EnvelopePhase::Sustain
        ) {
            self.sounded = self.sounded.saturating_add(1);
            if self.release_pending && self.sounded >= self.min_sounding {
                self.release_pending = false;
                self.enter_release(self.release);
            }
        }
        gain
    }

    fn advance(&mut self) -> f32 {
        loop {
            let (length, next) = match self.phase {
                EnvelopePhase::Delay => (self.delay, EnvelopePhase::Attack),
                EnvelopePhase::Attack => (self.attack, EnvelopePhase::Hold),
                EnvelopePhase::Hold => (self.hold, EnvelopePhase::Decay),
                EnvelopePhase::Decay => (self.decay, EnvelopePhase::Sustain),
                EnvelopePhase::Sustain => {
                    self.level = db_to_gain(self.sustain_db);
                    return self.level;
                }
                EnvelopePhase::Release => (self.release, EnvelopePhase::Finished),
                EnvelopePhase::Finished => {
                    self.level = 0.0;
                    return 0.0;
                }
            };
            if self.elapsed >= length {
                self.set_phase(next);
                continue;
            }

            let progress = self.elapsed as f32 / length as f32;
            self.level = match self.phase {
                EnvelopePhase::Delay => 0.0,
                EnvelopePhase::Attack => progress,
                EnvelopePhase::Hold => 1.0,
                EnvelopePhase::Decay => db_to_gain(self.sustain_db * progress),
                EnvelopePhase::Release => {
                    db_to_gain(self.release_start_db + (SILENCE_DB - self.release_start_db) * progress)
                }
                EnvelopePhase::Sustain | EnvelopePhase::Finished => self.level,
            };
            self.elapsed += 1;
            return self.level;
        }
    }
}
