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
use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use tracing::warn;

use super::channel::VibratoOptions;
use crate::{sequencer::MidiSink, soundfont::SoundFont};

/// A request for the engine, applied on the render thread before the next block.
#[derive(Clone, Debug)]
pub enum SynthCommand {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    KillNote { channel: u8, note: u8 },
    PitchWheel { channel: u8, value: u16 },
    PitchBend { channel: u8, semitones: f64 },
    ControllerChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    LockController { channel: u8, controller: u8, locked: bool },
    LockProgram { channel: u8, locked: bool },
    SetVibrato { channel: u8, vibrato: VibratoOptions },
    LockVibrato { channel: u8, locked: bool },
    MasterTuning { cents: f64 },
    StopAll,
    SystemReset,
    LoadSoundFont(Arc<SoundFont>),
}

/// A clonable, thread-safe way to drive a [`super::Synthesizer`].
#[derive(Clone)]
pub struct SynthHandle {
    sender: Sender<SynthCommand>,
}

impl SynthHandle {
    pub(crate) fn new(sender: Sender<SynthCommand>) -> SynthHandle {
        SynthHandle { sender }
    }

    /// Queues a command. Returns false if the queue was full or the engine is gone.
    pub fn send(&self, command: SynthCommand) -> bool {
        match self.sender.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(command)) => {
                warn!(?command, "Synth command queue full, dropping command");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn note_on(&self, channel: u8, note: u8, velocity: u8) -> bool {
        self.send(SynthCommand::NoteOn {
            channel,
            note,
            velocity,
        })
    }

    pub fn note_off(&self, channel: u8, note: u8) -> bool {
        self.send(SynthCommand::NoteOff { channel, note })
    }

    pub fn kill_note(&self, channel: u8, note: u8) -> bool {
        self.send(SynthCommand::KillNote { channel, note })
    }

    pub fn pitch_bend(&self, channel: u8, semitones: f64) -> bool {
        self.send(SynthCommand::PitchBend { channel, semitones })
    }

    pub fn controller_change(&self, channel: u8, controller: u8, value: u8) -> bool {
        self.send(SynthCommand::ControllerChange {
            channel,
            controller,
            value,
        })
    }

    pub fn program_change(&self, channel: u8, program: u8) -> bool {
        self.send(SynthCommand::ProgramChange { channel, program })
    }

    pub fn lock_controller(&self, channel: u8, controller: u8, locked: bool) -> bool {
        self.send(SynthCommand::LockController {
            channel,
            controller,
            locked,
        })
    }

    pub fn lock_program(&self, channel: u8, locked: bool) -> bool {
        self.send(SynthCommand::LockProgram { channel, locked })
    }

    pub fn set_vibrato(&self, channel: u8, vibrato: VibratoOptions) -> bool {
        self.send(SynthCommand::SetVibrato { channel, vibrato })
    }

    pub fn lock_vibrato(&self, channel: u8, locked: bool) -> bool {
        self.send(SynthCommand::LockVibrato { channel, locked })
    }

    pub fn set_master_tuning(&self, cents: f64) -> bool {
        self.send(SynthCommand::MasterTuning { cents })
    }

    pub fn stop_all(&self) -> bool {
        self.send(SynthCommand::StopAll)
    }

    pub fn system_reset(&self) -> bool {
        self.send(SynthCommand::SystemReset)
    }

    pub fn load_soundfont(&self, soundfont: Arc<SoundFont>) -> bool {
        self.send(SynthCommand::LoadSoundFont(soundfont))
    }
}

impl MidiSink for SynthHandle {
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        SynthHandle::note_on(self, channel, note, velocity);
    }

    fn note_off(&mut self, channel: u8, note: u8) {
        SynthHandle::note_off(self, channel, note);
    }

    fn pitch_wheel(&mut self, channel: u8, lsb: u8, msb: u8) {
        self.send(SynthCommand::PitchWheel {
            channel,
            value: ((msb as u16 & 0x7F) << 7) | (lsb as u16 & 0x7F),
        });
    }

    fn controller_change(&mut self, channel: u8, controller: u8, value: u8) {
        SynthHandle::controller_change(self, channel, controller, value);
    }

    fn program_change(&mut self, channel: u8, program: u8) {
        SynthHandle::program_change(self, channel, program);
    }

    fn system_reset(&mut self) {
        SynthHandle::system_reset(self);
    }

    fn stop_all(&mut self) {
        SynthHandle::stop_all(self);
    }
}
