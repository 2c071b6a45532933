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

//! Plays a [`Timeline`] into a [`MidiSink`] against a master clock.
//!
//! The sequencer never sleeps or spawns anything itself. Whoever owns it calls
//! [`Sequencer::process_tick`] often enough (the player thread, or the offline
//! renderer between blocks) and every event that is due gets dispatched.

mod clock;
mod timeline;

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info};

pub use clock::{ManualClock, MasterClock, SampleClock, SystemClock};
pub use timeline::{
    MidiMessage, TempoChange, Timeline, TimelineError, DEFAULT_MICROS_PER_QUARTER, SYSTEM_RESET,
};

/// Something that reacts to MIDI messages.
pub trait MidiSink {
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8);
    fn note_off(&mut self, channel: u8, note: u8);
    fn pitch_wheel(&mut self, channel: u8, lsb: u8, msb: u8);
    fn controller_change(&mut self, channel: u8, controller: u8, value: u8);
    fn program_change(&mut self, channel: u8, program: u8);
    fn system_reset(&mut self);
    /// Silences everything without touching controller state.
    fn stop_all(&mut self);
}

/// Drives a sink from a timeline.
pub struct Sequencer<S: MidiSink> {
    timeline: Arc<Timeline>,
    sink: S,
    clock: Arc<dyn MasterClock>,
    /// Position while paused; `None` while playing.
    paused_time: Option<f64>,
    /// Master clock time that corresponds to position zero while playing.
    absolute_start: f64,
    playback_rate: f64,
    /// Index of the next event to dispatch.
    cursor: usize,
    loop_playback: bool,
    finished: bool,
    observer: Option<Sender<MidiMessage>>,
}

impl<S: MidiSink> Sequencer<S> {
    /// Creates a sequencer paused at the start of the timeline.
    pub fn new(timeline: Arc<Timeline>, sink: S, clock: Arc<dyn MasterClock>) -> Sequencer<S> {
        Sequencer {
            timeline,
            sink,
            clock,
            paused_time: Some(0.0),
            absolute_start: 0.0,
            playback_rate: 1.0,
            cursor: 0,
            loop_playback: false,
            finished: false,
            observer: None,
        }
    }

    pub fn timeline(&self) -> &Arc<Timeline> {
        &self.timeline
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Receives every message the sequencer dispatches while playing. Messages
    /// that don't fit in `capacity` are dropped.
    pub fn observe(&mut self, capacity: usize) -> Receiver<MidiMessage> {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        self.observer = Some(sender);
        receiver
    }

    pub fn loop_playback(&self) -> bool {
        self.loop_playback
    }

    pub fn set_loop_playback(&mut self, loop_playback: bool) {
        self.loop_playback = loop_playback;
    }

    pub fn play(&mut self, reset_time: bool) {
        if reset_time {
            self.set_current_time(0.0);
        }
        if let Some(position) = self.paused_time.take() {
            self.absolute_start = self.clock.now() - position / self.playback_rate;
        }
        self.finished = false;
        info!(position = self.current_time(), "Playback started");
    }

    pub fn pause(&mut self) {
        if self.paused_time.is_none() {
            self.paused_time = Some(self.current_time());
            self.sink.stop_all();
            debug!(position = self.paused_time, "Playback paused");
        }
    }

    /// Pauses and rewinds to the start.
    pub fn stop(&mut self) {
        self.paused_time = Some(0.0);
        self.cursor = 0;
        self.sink.stop_all();
    }

    pub fn paused(&self) -> bool {
        self.paused_time.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.paused_time.is_none()
    }

    /// True once the end of the timeline was reached without looping.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn current_time(&self) -> f64 {
        match self.paused_time {
            Some(position) => position,
            None => (self.clock.now() - self.absolute_start) * self.playback_rate,
        }
    }

    /// Seeks. Everything but notes before the new position is replayed so the
    /// sink's controllers and programs match what they would have been.
    pub fn set_current_time(&mut self, seconds: f64) {
        let playing = self.is_playing();
        let seconds = seconds.clamp(0.0, self.duration());
        self.sink.stop_all();

        let target = self.timeline.first_index_at(seconds);
        let timeline = self.timeline.clone();
        for message in timeline.events()[..target].iter().filter(|m| !m.is_note()) {
            dispatch(&mut self.sink, message);
        }
        self.cursor = target;
        self.finished = false;
        debug!(position = seconds, cursor = target, "Seeked");

        if playing {
            self.absolute_start = self.clock.now() - seconds / self.playback_rate;
        } else {
            self.paused_time = Some(seconds);
        }
    }

    pub fn duration(&self) -> f64 {
        self.timeline.duration()
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    /// Changes speed without moving the current position.
    pub fn set_playback_rate(&mut self, rate: f64) {
        if !(rate.is_finite() && rate > 0.0) {
            return;
        }
        let position = self.current_time();
        self.playback_rate = rate;
        if self.is_playing() {
            self.absolute_start = self.clock.now() - position / rate;
        }
    }

    /// Dispatches every event that is due. Returns the number dispatched.
    pub fn process_tick(&mut self) -> usize {
        if self.paused() {
            return 0;
        }
        let now = self.current_time();
        let events = self.timeline.events();
        let start = self.cursor;
        while self.cursor < events.len() && self.timeline.time_of(self.cursor) <= now {
            let message = &events[self.cursor];
            dispatch(&mut self.sink, message);
            if let Some(observer) = &self.observer {
                let _ = observer.try_send(*message);
            }
            self.cursor += 1;
        }
        let dispatched = self.cursor - start;

        if self.cursor >= events.len() {
            if self.loop_playback {
                info!("Looping playback");
                self.set_current_time(0.0);
            } else {
                info!("Playback finished");
                self.stop();
                self.finished = true;
            }
        }
        dispatched
    }
}

fn dispatch<S: MidiSink>(sink: &mut S, message: &MidiMessage) {
    let channel = message.channel();
    let [first, second] = message.data;
    match message.kind() {
        0x80 => sink.note_off(channel, first),
        0x90 if second == 0 => sink.note_off(channel, first),
        0x90 => sink.note_on(channel, first, second),
        0xB0 => sink.controller_change(channel, first, second),
        0xC0 => sink.program_change(channel, first),
        0xE0 => sink.pitch_wheel(channel, first, second),
        SYSTEM_RESET => sink.system_reset(),
        _ => {}
    }
}
