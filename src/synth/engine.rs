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

//! The synthesizer: channels, voices and the render loop.

use std::{sync::Arc, time::Duration};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use super::{
    channel::{cc, Channel, VibratoOptions, CHANNEL_COUNT},
    events::{EventPublisher, SnapshotCells, SynthEvent, SynthSnapshot},
    params::VoiceParams,
    queue::{SynthCommand, SynthHandle},
    voice::{Voice, VoicePitch},
};
use crate::{
    sequencer::{MidiSink, SampleClock},
    soundfont::{GeneratorType, PlayableUnit, SoundFont},
};

/// Samples shorter than this are likely one-shot layers (clicks, noise) and are
/// the first to go when a note has too many candidates.
const SHORT_SAMPLE_SECS: f64 = 0.15;

/// Engine tuning.
#[derive(Clone, Debug)]
pub struct SynthOptions {
    pub sample_rate: u32,
    /// Voices that may sound before the oldest is stolen.
    pub max_voices: usize,
    /// The most samples a single note-on may start.
    pub voices_per_note: usize,
    /// Fade used for kills, stealing and exclusive classes.
    pub kill_fade: Duration,
    pub master_gain: f32,
    /// Tuning added to every channel, in cents.
    pub master_tuning: f64,
    pub command_capacity: usize,
}

impl Default for SynthOptions {
    fn default() -> Self {
        SynthOptions {
            sample_rate: 44100,
            max_voices: 256,
            voices_per_note: 4,
            kill_fade: Duration::from_millis(50),
            master_gain: 1.0,
            master_tuning: 0.0,
            command_capacity: 8192,
        }
    }
}

/// A polyphonic SoundFont synthesizer.
///
/// The synthesizer is owned by the render thread. Everything else talks to it
/// through a [`SynthHandle`], whose commands are applied at the start of each
/// rendered block.
pub struct Synthesizer {
    soundfont: Arc<SoundFont>,
    options: SynthOptions,
    channels: Vec<Channel>,
    voices: Vec<Voice>,
    /// Reused by the resolver on every note-on.
    scratch: Vec<PlayableUnit>,
    commands: Receiver<SynthCommand>,
    sender: Sender<SynthCommand>,
    events: EventPublisher,
    snapshot: Arc<SnapshotCells>,
    clock: Arc<SampleClock>,
    kill_fade_frames: u64,
    channel_gains: [f32; CHANNEL_COUNT],
    voice_counts: [u32; CHANNEL_COUNT],
}

impl Synthesizer {
    pub fn new(soundfont: Arc<SoundFont>, options: SynthOptions) -> Synthesizer {
        let (sender, commands) = crossbeam_channel::bounded(options.command_capacity.max(1));
        let kill_fade_frames =
            (options.kill_fade.as_secs_f64() * options.sample_rate as f64).round() as u64;
        let mut synth = Synthesizer {
            soundfont,
            channels: (0..CHANNEL_COUNT as u8).map(Channel::new).collect(),
            voices: Vec::with_capacity(options.max_voices * 2),
            scratch: Vec::with_capacity(options.voices_per_note.max(16)),
            commands,
            sender,
            events: EventPublisher::default(),
            snapshot: SnapshotCells::new(),
            clock: Arc::new(SampleClock::new(options.sample_rate)),
            kill_fade_frames,
            channel_gains: [0.0; CHANNEL_COUNT],
            voice_counts: [0; CHANNEL_COUNT],
            options,
        };
        synth.assign_default_presets();
        synth
    }

    pub fn options(&self) -> &SynthOptions {
        &self.options
    }

    pub fn soundfont(&self) -> &Arc<SoundFont> {
        &self.soundfont
    }

    /// A handle for queueing commands from other threads.
    pub fn handle(&self) -> SynthHandle {
        SynthHandle::new(self.sender.clone())
    }

    /// Subscribes to engine events. Events that don't fit in `capacity` are dropped.
    pub fn subscribe(&mut self, capacity: usize) -> Receiver<SynthEvent> {
        self.events.subscribe(capacity)
    }

    pub fn snapshot(&self) -> SynthSnapshot {
        SynthSnapshot::new(self.snapshot.clone())
    }

    /// The clock advanced by every rendered frame.
    pub fn clock(&self) -> Arc<SampleClock> {
        self.clock.clone()
    }

    pub fn channel(&self, channel: u8) -> &Channel {
        &self.channels[channel as usize % CHANNEL_COUNT]
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Voices that have not started releasing.
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| !v.is_releasing()).count()
    }

    /// Starts a note and returns the exclusive classes it triggered.
    pub fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Vec<u8> {
        let channel = channel % CHANNEL_COUNT as u8;
        let note = note & 0x7F;
        let velocity = velocity & 0x7F;
        if velocity == 0 {
            self.note_off(channel, note);
            return Vec::new();
        }

        let state = &self.channels[channel as usize];
        let Some(preset) = state.preset else {
            debug!(channel, note, "No preset assigned to channel");
            return Vec::new();
        };
        let pan_offset = state.pan_offset();
        let pitch = VoicePitch {
            bend: state.bend(),
            tuning_cents: state.tuning_cents() + self.options.master_tuning,
            vibrato: state.vibrato(),
        };

        let soundfont = self.soundfont.clone();
        let mut units = std::mem::take(&mut self.scratch);
        soundfont.resolve_into(preset, note, velocity, &mut units);
        if units.is_empty() {
            debug!(channel, note, velocity, %preset, "No voices for note");
            self.scratch = units;
            return Vec::new();
        }
        cap_units(&mut units, &soundfont, self.options.voices_per_note);

        // A re-struck note replaces whatever is still sounding for it.
        let fade = self.kill_fade_frames;
        for voice in self
            .voices
            .iter_mut()
            .filter(|v| v.channel() == channel && v.note() == note)
        {
            voice.kill(fade);
        }

        let mut classes = Vec::new();
        for unit in units.iter() {
            let class = unit
                .generators
                .amount(GeneratorType::ExclusiveClass)
                .clamp(0, 127) as u8;
            if class != 0 && !classes.contains(&class) {
                classes.push(class);
            }
        }
        if !classes.is_empty() {
            for voice in self
                .voices
                .iter_mut()
                .filter(|v| classes.contains(&v.exclusive_class()))
            {
                voice.kill(fade);
            }
        }

        let (mut lefts, mut rights) = (0usize, 0usize);
        for unit in units.iter() {
            let sample_type = unit.sample(&soundfont).sample_type;
            if !sample_type.is_right() {
                lefts += 1;
            }
            if !sample_type.is_left() {
                rights += 1;
            }
        }
        let divider = lefts.max(rights).max(1) as f32;

        let data_frames = soundfont.sample_frames().len();
        for unit in units.iter() {
            let params = VoiceParams::new(
                unit,
                unit.sample(&soundfont),
                note,
                velocity,
                self.options.sample_rate,
                data_frames,
            );
            let gain = params.velocity as f32 / 127.0 * params.attenuation as f32
                * self.options.master_gain
                / divider;
            self.make_room();
            self.voices.push(Voice::new(
                channel,
                note,
                params,
                gain,
                pan_offset,
                pitch,
                self.options.sample_rate,
            ));
        }
        debug!(channel, note, velocity, voices = units.len(), "Note on");
        self.scratch = units;

        self.events.publish(SynthEvent::NoteOn {
            channel,
            note,
            velocity,
        });
        classes
    }

    /// Releases a note, or defers the release while the sustain pedal is down.
    pub fn note_off(&mut self, channel: u8, note: u8) {
        let channel = channel % CHANNEL_COUNT as u8;
        let sustained = self.channels[channel as usize].sustain_pedal();
        for voice in self
            .voices
            .iter_mut()
            .filter(|v| v.channel() == channel && v.note() == note && !v.is_releasing())
        {
            if sustained {
                voice.sustain();
            } else {
                voice.release();
            }
        }
        self.events.publish(SynthEvent::NoteOff { channel, note });
    }

    /// Fades a note out quickly, ignoring its release time.
    pub fn kill_note(&mut self, channel: u8, note: u8) {
        let channel = channel % CHANNEL_COUNT as u8;
        let fade = self.kill_fade_frames;
        for voice in self
            .voices
            .iter_mut()
            .filter(|v| v.channel() == channel && v.note() == note)
        {
            voice.kill(fade);
        }
        self.events.publish(SynthEvent::NoteOff { channel, note });
    }

    /// Sets the 14-bit pitch wheel.
    pub fn pitch_wheel(&mut self, channel: u8, value: u16) {
        let channel = channel % CHANNEL_COUNT as u8;
        let semitones = self.channels[channel as usize].set_pitch_wheel(value);
        self.retune(channel, semitones);
    }

    /// Bends every voice on the channel without retriggering it.
    pub fn pitch_bend(&mut self, channel: u8, semitones: f64) {
        let channel = channel % CHANNEL_COUNT as u8;
        self.channels[channel as usize].set_bend(semitones);
        self.retune(channel, semitones);
    }

    pub fn controller_change(&mut self, channel: u8, controller: u8, value: u8) {
        let channel = channel % CHANNEL_COUNT as u8;
        let controller = controller & 0x7F;
        let value = value & 0x7F;
        let state = &mut self.channels[channel as usize];
        if state.is_controller_locked(controller) {
            debug!(channel, controller, value, "Ignoring locked controller");
            return;
        }
        let bend_before = state.bend();
        state.set_controller(controller, value);
        let bend_after = state.bend();

        match controller {
            cc::SUSTAIN_PEDAL if value < 64 => self.release_sustained(channel),
            cc::ALL_SOUND_OFF => {
                let fade = self.kill_fade_frames;
                self.voices_on(channel).for_each(|v| v.kill(fade));
            }
            cc::RESET_ALL_CONTROLLERS => self.release_sustained(channel),
            cc::ALL_NOTES_OFF => self.voices_on(channel).for_each(|v| v.release()),
            _ => {}
        }
        if bend_after != bend_before {
            self.retune(channel, bend_after);
        }

        self.snapshot.store_channel(&self.channels[channel as usize]);
        self.events.publish(SynthEvent::ControllerChange {
            channel,
            controller,
            value,
        });
    }

    /// Selects a preset from the channel's bank.
    pub fn program_change(&mut self, channel: u8, program: u8) {
        let channel = channel % CHANNEL_COUNT as u8;
        let state = &mut self.channels[channel as usize];
        if state.is_program_locked() {
            debug!(channel, program, "Ignoring locked program change");
            return;
        }
        let program = program & 0x7F;
        let lookup = self
            .soundfont
            .find_preset(state.effective_bank(), program as u16);
        state.program = program;
        state.preset = Some(lookup.id);
        let preset_name = self
            .soundfont
            .preset(lookup.id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        debug!(channel, program, preset = preset_name.as_str(), "Program change");

        self.snapshot.store_channel(&self.channels[channel as usize]);
        self.events.publish(SynthEvent::ProgramChange {
            channel,
            program,
            preset_name,
        });
    }

    pub fn lock_controller(&mut self, channel: u8, controller: u8, locked: bool) {
        self.channels[channel as usize % CHANNEL_COUNT].lock_controller(controller, locked);
    }

    pub fn lock_program(&mut self, channel: u8, locked: bool) {
        self.channels[channel as usize % CHANNEL_COUNT].lock_program(locked);
    }

    /// Sets the vibrato for notes started on the channel from now on.
    pub fn set_vibrato(&mut self, channel: u8, vibrato: VibratoOptions) {
        self.channels[channel as usize % CHANNEL_COUNT].set_vibrato(vibrato);
    }

    /// Turns the channel's vibrato off and keeps it off until unlocked.
    pub fn lock_vibrato(&mut self, channel: u8, locked: bool) {
        self.channels[channel as usize % CHANNEL_COUNT].lock_vibrato(locked);
    }

    /// Sets the tuning, in cents, added to every note started from now on.
    pub fn set_master_tuning(&mut self, cents: f64) {
        self.options.master_tuning = cents;
        debug!(cents, "Master tuning");
    }

    /// Fades out every voice.
    pub fn stop_all(&mut self) {
        let fade = self.kill_fade_frames;
        self.voices.iter_mut().for_each(|v| v.kill(fade));
    }

    /// Silences everything and returns every channel to its power-on state,
    /// locks included.
    pub fn system_reset(&mut self) {
        self.stop_all();
        for (index, channel) in self.channels.iter_mut().enumerate() {
            *channel = Channel::new(index as u8);
        }
        self.assign_default_presets();
        info!("System reset");
        self.events.publish(SynthEvent::SystemReset);
    }

    /// Swaps in a new bank. Sounding voices are killed and every channel's
    /// preset is looked up again.
    pub fn load_soundfont(&mut self, soundfont: Arc<SoundFont>) {
        self.voices.clear();
        self.soundfont = soundfont;
        for channel in self.channels.iter_mut() {
            let lookup = self
                .soundfont
                .find_preset(channel.effective_bank(), channel.program as u16);
            channel.preset = Some(lookup.id);
        }
        let presets = self.soundfont.presets().len();
        info!(presets, "Loaded new sound font");
        self.events
            .publish(SynthEvent::PresetListChanged { presets });
    }

    /// Applies queued commands.
    pub fn process_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
    }

    pub fn apply(&mut self, command: SynthCommand) {
        match command {
            SynthCommand::NoteOn {
                channel,
                note,
                velocity,
            } => {
                self.note_on(channel, note, velocity);
            }
            SynthCommand::NoteOff { channel, note } => self.note_off(channel, note),
            SynthCommand::KillNote { channel, note } => self.kill_note(channel, note),
            SynthCommand::PitchWheel { channel, value } => self.pitch_wheel(channel, value),
            SynthCommand::PitchBend { channel, semitones } => self.pitch_bend(channel, semitones),
            SynthCommand::ControllerChange {
                channel,
                controller,
                value,
            } => self.controller_change(channel, controller, value),
            SynthCommand::ProgramChange { channel, program } => {
                self.program_change(channel, program)
            }
            SynthCommand::LockController {
                channel,
                controller,
                locked,
            } => self.lock_controller(channel, controller, locked),
            SynthCommand::LockProgram { channel, locked } => self.lock_program(channel, locked),
            SynthCommand::SetVibrato { channel, vibrato } => self.set_vibrato(channel, vibrato),
            SynthCommand::LockVibrato { channel, locked } => self.lock_vibrato(channel, locked),
            SynthCommand::MasterTuning { cents } => self.set_master_tuning(cents),
            SynthCommand::StopAll => self.stop_all(),
            SynthCommand::SystemReset => self.system_reset(),
            SynthCommand::LoadSoundFont(soundfont) => self.load_soundfont(soundfont),
        }
    }

    /// Renders one block into `left` and `right`, overwriting their contents.
    /// Queued commands are applied first.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.process_commands();

        let frames = left.len().min(right.len());
        let (left, right) = (&mut left[..frames], &mut right[..frames]);
        left.fill(0.0);
        right.fill(0.0);

        for (gain, channel) in self.channel_gains.iter_mut().zip(self.channels.iter()) {
            *gain = channel.gain();
        }
        let data = self.soundfont.sample_frames();
        for voice in self.voices.iter_mut() {
            let gain = self.channel_gains[voice.channel() as usize];
            voice.render(&data, gain, left, right);
        }
        self.voices.retain(|v| !v.is_finished());

        self.voice_counts = [0; CHANNEL_COUNT];
        for voice in self.voices.iter() {
            self.voice_counts[voice.channel() as usize] += 1;
        }
        self.snapshot.store_voice_counts(&self.voice_counts);
        self.clock.advance(frames as u64);
    }

    fn assign_default_presets(&mut self) {
        for channel in self.channels.iter_mut() {
            let lookup = self.soundfont.find_preset(channel.effective_bank(), 0);
            channel.preset = Some(lookup.id);
            self.snapshot.store_channel(channel);
        }
    }

    fn voices_on(&mut self, channel: u8) -> impl Iterator<Item = &mut Voice> {
        self.voices.iter_mut().filter(move |v| v.channel() == channel)
    }

    fn release_sustained(&mut self, channel: u8) {
        self.voices_on(channel)
            .filter(|v| v.is_sustained())
            .for_each(|v| v.release());
    }

    fn retune(&mut self, channel: u8, semitones: f64) {
        self.voices_on(channel).for_each(|v| v.set_bend(semitones));
        self.events
            .publish(SynthEvent::PitchBend { channel, semitones });
    }

    /// Steals the oldest voice once the polyphony limit is reached. Stolen voices
    /// fade out, so the list may briefly hold more than `max_voices`; past twice
    /// the limit the oldest is dropped outright.
    fn make_room(&mut self) {
        let max_voices = self.options.max_voices.max(1);
        if self.voices.len() >= max_voices * 2 {
            if let Some(index) = self.oldest_voice(|_| true) {
                let voice = self.voices.remove(index);
                warn!(
                    channel = voice.channel(),
                    note = voice.note(),
                    "Voice limit exceeded, dropping voice"
                );
            }
            return;
        }
        if self.active_voices() >= max_voices {
            if let Some(index) = self.oldest_voice(|v| !v.is_releasing()) {
                let fade = self.kill_fade_frames;
                let voice = &mut self.voices[index];
                warn!(
                    channel = voice.channel(),
                    note = voice.note(),
                    max_voices,
                    "Voice limit reached, stealing oldest voice"
                );
                voice.kill(fade);
            }
        }
    }

    fn oldest_voice(&self, filter: impl Fn(&Voice) -> bool) -> Option<usize> {
        self.voices
            .iter()
            .enumerate()
            .filter(|(_, v)| filter(v))
            .min_by_key(|(_, v)| v.id())
            .map(|(index, _)| index)
    }
}

impl MidiSink for Synthesizer {
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        Synthesizer::note_on(self, channel, note, velocity);
    }

    fn note_off(&mut self, channel: u8, note: u8) {
        Synthesizer::note_off(self, channel, note);
    }

    fn pitch_wheel(&mut self, channel: u8, lsb: u8, msb: u8) {
        Synthesizer::pitch_wheel(
            self,
            channel,
            ((msb as u16 & 0x7F) << 7) | (lsb as u16 & 0x7F),
        );
    }

    fn controller_change(&mut self, channel: u8, controller: u8, value: u8) {
        Synthesizer::controller_change(self, channel, controller, value);
    }

    fn program_change(&mut self, channel: u8, program: u8) {
        Synthesizer::program_change(self, channel, program);
    }

    fn system_reset(&mut self) {
        Synthesizer::system_reset(self);
    }

    fn stop_all(&mut self) {
        Synthesizer::stop_all(self);
    }
}

/// Limits the samples one note may start.
///
/// When any candidate is shorter than [`SHORT_SAMPLE_SECS`], the longest are
/// preferred. With a cap of two, a left/right stereo pair wins if present.
pub(crate) fn cap_units(units: &mut Vec<PlayableUnit>, soundfont: &SoundFont, cap: usize) {
    if units.len() <= cap {
        return;
    }
    let duration = |unit: &PlayableUnit| unit.sample(soundfont).duration_secs();
    if units.iter().any(|u| duration(u) < SHORT_SAMPLE_SECS) {
        units.sort_by(|a, b| duration(b).total_cmp(&duration(a)));
    }

    if cap == 2 {
        let left = units
            .iter()
            .position(|u| u.sample(soundfont).sample_type.is_left());
        let right = units
            .iter()
            .position(|u| u.sample(soundfont).sample_type.is_right());
        if let (Some(left), Some(right)) = (left, right) {
            let pair = [units[left], units[right]];
            units.clear();
            units.extend_from_slice(&pair);
            return;
        }
    }
    units.truncate(cap);
}
