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

//! A MIDI file flattened into one time-ordered event list.

use std::{fs, path::Path};

use midly::{Format, MetaMessage, Smf, Timing, TrackEventKind};
use thiserror::Error;
use tracing::info;

/// Status used for a system reset, whatever SysEx it came from.
pub const SYSTEM_RESET: u8 = 0xFF;

/// 120 BPM.
pub const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("the MIDI file has no tracks or no events")]
    NoTracks,
    #[error("SMPTE timecode timing is not supported")]
    UnsupportedTiming,
    #[error("unable to parse MIDI file: {0}")]
    Parse(#[from] midly::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A channel message, or a system reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiMessage {
    pub ticks: u64,
    pub status: u8,
    pub data: [u8; 2],
}

impl MidiMessage {
    pub fn channel(&self) -> u8 {
        self.status & 0x0F
    }

    /// The status with the channel masked off.
    pub fn kind(&self) -> u8 {
        if self.status >= 0xF0 {
            self.status
        } else {
            self.status & 0xF0
        }
    }

    /// Note on or note off.
    pub fn is_note(&self) -> bool {
        matches!(self.kind(), 0x80 | 0x90)
    }

    pub fn is_system_reset(&self) -> bool {
        self.status == SYSTEM_RESET
    }

    fn from_midly(ticks: u64, channel: u8, message: &midly::MidiMessage) -> MidiMessage {
        let (kind, data) = match *message {
            midly::MidiMessage::NoteOff { key, vel } => (0x80, [key.as_int(), vel.as_int()]),
            midly::MidiMessage::NoteOn { key, vel } => (0x90, [key.as_int(), vel.as_int()]),
            midly::MidiMessage::Aftertouch { key, vel } => (0xA0, [key.as_int(), vel.as_int()]),
            midly::MidiMessage::Controller { controller, value } => {
                (0xB0, [controller.as_int(), value.as_int()])
            }
            midly::MidiMessage::ProgramChange { program } => (0xC0, [program.as_int(), 0]),
            midly::MidiMessage::ChannelAftertouch { vel } => (0xD0, [vel.as_int(), 0]),
            midly::MidiMessage::PitchBend { bend } => {
                let value = bend.0.as_int();
                (0xE0, [(value & 0x7F) as u8, (value >> 7) as u8])
            }
        };
        MidiMessage {
            ticks,
            status: kind | (channel & 0x0F),
            data,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TempoChange {
    pub ticks: u64,
    pub micros_per_quarter: u32,
}

/// Every event of a MIDI file on one tick-sorted list, plus its tempo map.
#[derive(Clone, Debug)]
pub struct Timeline {
    ticks_per_quarter: u16,
    events: Vec<MidiMessage>,
    /// Time in seconds of each event.
    times: Vec<f64>,
    tempos: Vec<TempoChange>,
    /// Time in seconds at which each tempo change starts.
    tempo_starts: Vec<f64>,
}

impl Timeline {
    pub fn load(path: &Path) -> Result<Timeline, TimelineError> {
        let timeline = Timeline::parse(&fs::read(path)?)?;
        info!(
            file = ?path,
            events = timeline.events.len(),
            tempos = timeline.tempos.len(),
            duration = timeline.duration(),
            "Loaded MIDI file"
        );
        Ok(timeline)
    }

    pub fn parse(bytes: &[u8]) -> Result<Timeline, TimelineError> {
        Timeline::from_smf(&Smf::parse(bytes)?)
    }

    pub fn from_smf(smf: &Smf) -> Result<Timeline, TimelineError> {
        let ticks_per_quarter = match smf.header.timing {
            Timing::Metrical(ticks) if ticks.as_int() > 0 => ticks.as_int(),
            _ => return Err(TimelineError::UnsupportedTiming),
        };
        if smf.tracks.is_empty() {
            return Err(TimelineError::NoTracks);
        }

        let mut events = Vec::new();
        let mut tempos = Vec::new();
        let mut track_start = 0u64;
        for track in smf.tracks.iter() {
            let mut ticks = track_start;
            for event in track.iter() {
                ticks += event.delta.as_int() as u64;
                match event.kind {
                    TrackEventKind::Midi { channel, message } => {
                        events.push(MidiMessage::from_midly(ticks, channel.as_int(), &message));
                    }
                    TrackEventKind::SysEx(data) if is_reset_sysex(data) => {
                        events.push(MidiMessage {
                            ticks,
                            status: SYSTEM_RESET,
                            data: [0, 0],
                        });
                    }
                    TrackEventKind::Meta(MetaMessage::Tempo(micros)) => tempos.push(TempoChange {
                        ticks,
                        micros_per_quarter: micros.as_int(),
                    }),
                    _ => {}
                }
            }
            // Sequential files play their tracks one after another.
            if smf.header.format == Format::Sequential {
                track_start = ticks;
            }
        }
        if events.is_empty() {
            return Err(TimelineError::NoTracks);
        }

        events.sort_by_key(|e| e.ticks);
        tempos.sort_by_key(|t| t.ticks);
        if tempos.first().map_or(true, |t| t.ticks > 0) {
            tempos.insert(
                0,
                TempoChange {
                    ticks: 0,
                    micros_per_quarter: DEFAULT_MICROS_PER_QUARTER,
                },
            );
        }

        let mut tempo_starts = Vec::with_capacity(tempos.len());
        let mut elapsed = 0.0;
        for (index, tempo) in tempos.iter().enumerate() {
            if let Some(previous) = index.checked_sub(1).map(|i| &tempos[i]) {
                elapsed += seconds_for(
                    tempo.ticks - previous.ticks,
                    previous.micros_per_quarter,
                    ticks_per_quarter,
                );
            }
            tempo_starts.push(elapsed);
        }

        let mut timeline = Timeline {
            ticks_per_quarter,
            events,
            times: Vec::new(),
            tempos,
            tempo_starts,
        };
        timeline.times = timeline
            .events
            .iter()
            .map(|e| timeline.ticks_to_seconds(e.ticks))
            .collect();
        Ok(timeline)
    }

    pub fn ticks_per_quarter(&self) -> u16 {
        self.ticks_per_quarter
    }

    pub fn events(&self) -> &[MidiMessage] {
        &self.events
    }

    pub fn tempos(&self) -> &[TempoChange] {
        &self.tempos
    }

    /// The time in seconds of the event at `index`.
    pub fn time_of(&self, index: usize) -> f64 {
        self.times.get(index).copied().unwrap_or_else(|| self.duration())
    }

    /// The index of the first event at or after `seconds`.
    pub fn first_index_at(&self, seconds: f64) -> usize {
        self.times.partition_point(|t| *t < seconds)
    }

    /// The time of the last event.
    pub fn duration(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Converts a tick position to seconds using the tempo map.
    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        let index = self
            .tempos
            .partition_point(|t| t.ticks <= ticks)
            .saturating_sub(1);
        let Some(tempo) = self.tempos.get(index) else {
            return 0.0;
        };
        self.tempo_starts[index]
            + seconds_for(
                ticks.saturating_sub(tempo.ticks),
                tempo.micros_per_quarter,
                self.ticks_per_quarter,
            )
    }
}

fn seconds_for(ticks: u64, micros_per_quarter: u32, ticks_per_quarter: u16) -> f64 {
    ticks as f64 * micros_per_quarter as f64 / 1_000_000.0 / ticks_per_quarter as f64
}

/// GM (and GM2) system on, GS reset and XG system on all reset the synth.
fn is_reset_sysex(data: &[u8]) -> bool {
    let data = data.strip_suffix(&[0xF7]).unwrap_or(data);
    match data {
        [0x7E, _, 0x09, 0x01 | 0x03] => true,
        [0x41, _, 0x42, 0x12, 0x40, 0x00, 0x7F, 0x00, ..] => true,
        [0x43, device, 0x4C, 0x00, 0x00, 0x7E, 0x00] => device & 0xF0 == 0x10,
        _ => false,
    }
}
