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

//! Standard MIDI files built in memory.

use midly::{
    num::{u14, u15, u24, u28, u4, u7},
    Format, Fps, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, TrackEvent,
    TrackEventKind,
};

/// A track described with absolute tick positions.
#[derive(Clone, Default)]
pub struct TestTrack {
    events: Vec<(u32, TrackEventKind<'static>)>,
}

impl TestTrack {
    pub fn new() -> TestTrack {
        TestTrack::default()
    }

    fn midi(mut self, ticks: u32, channel: u8, message: MidiMessage) -> TestTrack {
        self.events.push((
            ticks,
            TrackEventKind::Midi {
                channel: u4::new(channel),
                message,
            },
        ));
        self
    }

    pub fn note_on(self, ticks: u32, channel: u8, key: u8, velocity: u8) -> TestTrack {
        self.midi(
            ticks,
            channel,
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(velocity),
            },
        )
    }

    pub fn note_off(self, ticks: u32, channel: u8, key: u8) -> TestTrack {
        self.midi(
            ticks,
            channel,
            MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            },
        )
    }

    pub fn controller(self, ticks: u32, channel: u8, controller: u8, value: u8) -> TestTrack {
        self.midi(
            ticks,
            channel,
            MidiMessage::Controller {
                controller: u7::new(controller),
                value: u7::new(value),
            },
        )
    }

    pub fn program(self, ticks: u32, channel: u8, program: u8) -> TestTrack {
        self.midi(
            ticks,
            channel,
            MidiMessage::ProgramChange {
                program: u7::new(program),
            },
        )
    }

    pub fn pitch_bend(self, ticks: u32, channel: u8, value: u16) -> TestTrack {
        self.midi(
            ticks,
            channel,
            MidiMessage::PitchBend {
                bend: PitchBend(u14::new(value)),
            },
        )
    }

    pub fn tempo(mut self, ticks: u32, micros_per_quarter: u32) -> TestTrack {
        self.events.push((
            ticks,
            TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros_per_quarter))),
        ));
        self
    }

    pub fn sysex(mut self, ticks: u32, data: &'static [u8]) -> TestTrack {
        self.events.push((ticks, TrackEventKind::SysEx(data)));
        self
    }

    fn encode(&self) -> Vec<TrackEvent<'static>> {
        let mut events = self.events.clone();
        events.sort_by_key(|(ticks, _)| *ticks);

        let mut last = 0;
        let mut track: Vec<TrackEvent<'static>> = events
            .into_iter()
            .map(|(ticks, kind)| {
                let delta = ticks - last;
                last = ticks;
                TrackEvent {
                    delta: u28::new(delta),
                    kind,
                }
            })
            .collect();
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        track
    }
}

/// Encodes a metrical-timing file.
pub fn smf_bytes(format: Format, ticks_per_quarter: u16, tracks: &[TestTrack]) -> Vec<u8> {
    let smf = Smf {
        header: Header::new(format, Timing::Metrical(u15::new(ticks_per_quarter))),
        tracks: tracks.iter().map(TestTrack::encode).collect(),
    };
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes).unwrap();
    bytes
}

/// Encodes a file that uses SMPTE timecode timing.
pub fn smpte_bytes() -> Vec<u8> {
    let smf = Smf {
        header: Header::new(Format::SingleTrack, Timing::Timecode(Fps::Fps25, 40)),
        tracks: vec![TestTrack::new().note_on(0, 0, 60, 100).encode()],
    };
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes).unwrap();
    bytes
}
