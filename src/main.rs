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
use std::{error::Error, path::PathBuf, sync::Arc, thread};

use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sfplay::{
    audio, config, dls,
    player::{Player, PlayerOptions},
    sequencer::{MasterClock, Timeline},
    soundfont::{GeneratorType, SoundFont},
    synth::Synthesizer,
};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A SoundFont2 synthesizer and MIDI file player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the presets in a SoundFont.
    Presets {
        /// The SoundFont2 file.
        soundfont: PathBuf,
    },
    /// Shows the samples and parameters a note would play.
    Resolve {
        /// The SoundFont2 file.
        soundfont: PathBuf,
        bank: u16,
        program: u16,
        note: u8,
        #[arg(default_value_t = 100)]
        velocity: u8,
    },
    /// Flattens a preset into DLS style zones.
    Combine {
        /// The SoundFont2 file.
        soundfont: PathBuf,
        bank: u16,
        program: u16,
    },
    /// Renders a MIDI file to a WAV file.
    Render {
        /// The SoundFont2 file.
        soundfont: PathBuf,
        /// The standard MIDI file to render.
        midi: PathBuf,
        /// Where to write the WAV file.
        wav: PathBuf,
        /// The synth configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Plays a MIDI file through an audio device.
    Play {
        /// The SoundFont2 file.
        soundfont: PathBuf,
        /// The standard MIDI file to play.
        midi: PathBuf,
        /// The synth configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Lists the available audio output devices.
    Devices {},
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Presets { soundfont } => {
            let soundfont = SoundFont::load(&soundfont)?;
            let mut presets: Vec<_> = soundfont.presets().iter().collect();
            presets.sort_by_key(|preset| (preset.bank, preset.program));
            println!(
                "{} (presets: {}):",
                soundfont.name().unwrap_or("Untitled"),
                presets.len()
            );
            for preset in presets {
                println!("- {}", preset);
            }
        }
        Commands::Resolve {
            soundfont,
            bank,
            program,
            note,
            velocity,
        } => {
            let soundfont = SoundFont::load(&soundfont)?;
            let lookup = soundfont.find_preset(bank, program);
            if let Some(preset) = soundfont.preset(lookup.id) {
                let substituted = if lookup.substituted { " (substituted)" } else { "" };
                println!("Preset: {}{}", preset, substituted);
            }

            let units = soundfont.resolve(lookup.id, note, velocity);
            if units.is_empty() {
                println!("No samples for note {} at velocity {}.", note, velocity);
                return Ok(());
            }
            for unit in units {
                let sample = unit.sample(&soundfont);
                println!(
                    "- {} (root key {}, {} Hz)",
                    sample.name, sample.original_pitch, sample.sample_rate
                );
                for generator in unit.generators.iter() {
                    if generator.kind == GeneratorType::SampleId {
                        continue;
                    }
                    println!("    {}: {}", generator.kind, generator.amount);
                }
            }
        }
        Commands::Combine {
            soundfont,
            bank,
            program,
        } => {
            let soundfont = SoundFont::load(&soundfont)?;
            let lookup = soundfont.find_preset(bank, program);
            let zones = dls::combine_zones(&soundfont, lookup.id);
            println!("Zones (count: {}):", zones.len());
            for zone in zones {
                let sample = soundfont
                    .sample(zone.sample_index)
                    .map_or("?", |sample| sample.name.as_str());
                println!(
                    "- keys {}-{}, velocities {}-{}, sample {}, {} generators, {} modulators, {} connection blocks",
                    zone.key_range.lo,
                    zone.key_range.hi,
                    zone.vel_range.lo,
                    zone.vel_range.hi,
                    sample,
                    zone.generators.len(),
                    zone.modulators.len(),
                    dls::articulators(&zone).len(),
                );
            }
        }
        Commands::Render {
            soundfont,
            midi,
            wav,
            config,
        } => {
            let config = config::load_or_default(config.as_deref())?;
            let soundfont = Arc::new(SoundFont::load(&soundfont)?);
            let timeline = Arc::new(Timeline::load(&midi)?);
            let summary = audio::render_to_wav(soundfont, timeline, &config, &wav)?;
            println!(
                "Rendered {:.2}s to {} (peak {:.3}).",
                summary.seconds(),
                wav.display(),
                summary.peak
            );
        }
        Commands::Play {
            soundfont,
            midi,
            config,
        } => {
            let config = config::load_or_default(config.as_deref())?;
            let soundfont = Arc::new(SoundFont::load(&soundfont)?);
            let timeline = Arc::new(Timeline::load(&midi)?);

            let synth = Synthesizer::new(soundfont, config.synth_options()?);
            let handle = synth.handle();
            let clock: Arc<dyn MasterClock> = synth.clock();
            let kill_fade = synth.options().kill_fade;
            let output = audio::Output::start(config.audio_device(), synth, config.block_size())?;
            println!("Playing {} through {}.", midi.display(), output.name());

            let mut player = Player::start(
                timeline,
                handle,
                clock,
                PlayerOptions {
                    scheduler_interval: config.scheduler_interval()?,
                    loop_playback: config.loop_playback(),
                },
            );
            player.wait();
            // Let the final fade reach the device before closing it.
            thread::sleep(kill_fade * 4);
            drop(output);
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
    };

    Ok(())
}
