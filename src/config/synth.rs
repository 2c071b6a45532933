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
use std::{error::Error, time::Duration};

use duration_string::DurationString;
use serde::Deserialize;

use crate::synth::SynthOptions;

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_BLOCK_SIZE: usize = 128;
const DEFAULT_MAX_VOICES: usize = 256;
const DEFAULT_VOICES_PER_NOTE: usize = 4;
const DEFAULT_KILL_FADE: Duration = Duration::from_millis(50);
const DEFAULT_SCHEDULER_INTERVAL: Duration = Duration::from_millis(5);
const DEFAULT_MASTER_GAIN: f32 = 1.0;
const DEFAULT_MASTER_TUNING: f64 = 0.0;

/// A YAML representation of the synthesizer and player configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Synth {
    /// Output sample rate in Hz (default: 44100).
    sample_rate: Option<u32>,

    /// Frames rendered per block (default: 128).
    block_size: Option<usize>,

    /// Voices that may sound at once before the oldest is stolen (default: 256).
    max_voices: Option<usize>,

    /// The most samples a single note may start (default: 4).
    voices_per_note: Option<usize>,

    /// Fade applied when voices are killed (default: 50ms).
    kill_fade: Option<String>,

    /// How often the sequencer dispatches due events (default: 5ms).
    scheduler_interval: Option<String>,

    /// Linear gain applied to the final mix (default: 1.0).
    master_gain: Option<f32>,

    /// Tuning added to every note, in cents (default: 0).
    master_tuning: Option<f64>,

    /// Restart from the beginning when the file ends.
    loop_playback: Option<bool>,

    /// The output device. The host default is used when unset.
    audio_device: Option<String>,
}

impl Synth {
    /// Returns the sample rate (default: 44100).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the block size in frames, never less than one.
    pub fn block_size(&self) -> usize {
        self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE).max(1)
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices.unwrap_or(DEFAULT_MAX_VOICES).max(1)
    }

    pub fn voices_per_note(&self) -> usize {
        self.voices_per_note.unwrap_or(DEFAULT_VOICES_PER_NOTE).max(1)
    }

    /// Returns the kill fade (default: 50ms).
    pub fn kill_fade(&self) -> Result<Duration, Box<dyn Error>> {
        match &self.kill_fade {
            Some(kill_fade) => Ok(DurationString::from_string(kill_fade.clone())?.into()),
            None => Ok(DEFAULT_KILL_FADE),
        }
    }

    /// Returns the scheduler interval (default: 5ms).
    pub fn scheduler_interval(&self) -> Result<Duration, Box<dyn Error>> {
        match &self.scheduler_interval {
            Some(interval) => Ok(DurationString::from_string(interval.clone())?.into()),
            None => Ok(DEFAULT_SCHEDULER_INTERVAL),
        }
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain.unwrap_or(DEFAULT_MASTER_GAIN)
    }

    pub fn master_tuning(&self) -> f64 {
        self.master_tuning.unwrap_or(DEFAULT_MASTER_TUNING)
    }

    pub fn loop_playback(&self) -> bool {
        self.loop_playback.unwrap_or(false)
    }

    pub fn audio_device(&self) -> Option<&str> {
        self.audio_device.as_deref()
    }

    /// Builds the engine options described by this configuration.
    pub fn synth_options(&self) -> Result<SynthOptions, Box<dyn Error>> {
        Ok(SynthOptions {
            sample_rate: self.sample_rate(),
            max_voices: self.max_voices(),
            voices_per_note: self.voices_per_note(),
            kill_fade: self.kill_fade()?,
            master_gain: self.master_gain(),
            master_tuning: self.master_tuning(),
            ..SynthOptions::default()
        })
    }
}
