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
use std::{error::Error, path::Path, sync::Arc, time::Duration};

use tracing::{info, span, Level};

use crate::{
    config,
    sequencer::{MasterClock, Sequencer, Timeline},
    soundfont::SoundFont,
    synth::Synthesizer,
};

/// The longest the renderer waits for voices to die out after the last event.
const MAX_TAIL: Duration = Duration::from_secs(10);

/// What an offline render produced.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderSummary {
    pub frames: u64,
    pub sample_rate: u32,
    /// Largest absolute sample value across both channels.
    pub peak: f32,
}

impl RenderSummary {
    pub fn seconds(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Renders the timeline block by block on the calling thread, handing each
/// stereo block to `write`. The sequencer is ticked before every block against
/// the synthesizer's sample clock, so the output doesn't depend on wall time.
pub fn render_blocks<F>(
    soundfont: Arc<SoundFont>,
    timeline: Arc<Timeline>,
    config: &config::Synth,
    mut write: F,
) -> Result<RenderSummary, Box<dyn Error>>
where
    F: FnMut(&[f32], &[f32]) -> Result<(), Box<dyn Error>>,
{
    let synth = Synthesizer::new(soundfont, config.synth_options()?);
    let sample_rate = synth.options().sample_rate;
    let clock: Arc<dyn MasterClock> = synth.clock();
    let mut sequencer = Sequencer::new(timeline, synth, clock);
    sequencer.set_loop_playback(false);

    let block_size = config.block_size();
    let mut left = vec![0.0f32; block_size];
    let mut right = vec![0.0f32; block_size];
    let mut summary = RenderSummary {
        sample_rate,
        ..RenderSummary::default()
    };
    let mut render = |sequencer: &mut Sequencer<Synthesizer>| -> Result<(), Box<dyn Error>> {
        sequencer.sink_mut().render(&mut left, &mut right);
        summary.peak = left
            .iter()
            .chain(right.iter())
            .fold(summary.peak, |peak, sample| peak.max(sample.abs()));
        summary.frames += block_size as u64;
        write(&left, &right)
    };

    sequencer.play(true);
    loop {
        sequencer.process_tick();
        if sequencer.is_finished() {
            break;
        }
        render(&mut sequencer)?;
    }

    let max_tail_frames = (MAX_TAIL.as_secs_f64() * sample_rate as f64) as u64;
    let mut tail_frames = 0;
    while !sequencer.sink().voices().is_empty() && tail_frames < max_tail_frames {
        render(&mut sequencer)?;
        tail_frames += block_size as u64;
    }
    Ok(summary)
}

/// Renders the timeline into a 32-bit float stereo WAV file.
pub fn render_to_wav(
    soundfont: Arc<SoundFont>,
    timeline: Arc<Timeline>,
    config: &config::Synth,
    path: &Path,
) -> Result<RenderSummary, Box<dyn Error>> {
    let span = span!(Level::INFO, "render (wav)");
    let _enter = span.enter();

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: config.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    let summary = render_blocks(soundfont, timeline, config, |left, right| {
        for (l, r) in left.iter().zip(right.iter()) {
            writer.write_sample(*l)?;
            writer.write_sample(*r)?;
        }
        Ok(())
    })?;
    writer.finalize()?;

    info!(
        path = %path.display(),
        seconds = summary.seconds(),
        peak = summary.peak,
        "Rendered file"
    );
    Ok(summary)
}
