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

//! What the engine tells the outside world.
//!
//! Events are fanned out through bounded channels with `try_send`, so a slow or
//! absent reader can never stall rendering; events that don't fit are dropped.
//! Snapshots are plain atomics that any thread can read at any time.

use std::sync::{
    atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering},
    Arc,
};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use super::channel::{cc, Channel, CHANNEL_COUNT};

#[derive(Clone, Debug, PartialEq)]
pub enum SynthEvent {
    NoteOn {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        note: u8,
    },
    ControllerChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    ProgramChange {
        channel: u8,
        program: u8,
        preset_name: String,
    },
    PitchBend {
        channel: u8,
        semitones: f64,
    },
    SystemReset,
    PresetListChanged {
        presets: usize,
    },
}

/// Fan-out of engine events to any number of subscribers.
#[derive(Default)]
pub(crate) struct EventPublisher {
    subscribers: Vec<Sender<SynthEvent>>,
}

impl EventPublisher {
    pub fn subscribe(&mut self, capacity: usize) -> Receiver<SynthEvent> {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        self.subscribers.push(sender);
        receiver
    }

    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.is_empty()
    }

    pub fn publish(&mut self, event: SynthEvent) {
        if self.subscribers.is_empty() {
            return;
        }
        self.subscribers
            .retain(|subscriber| match subscriber.try_send(event.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            });
    }
}

/// A point-in-time copy of one channel's state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub voices: u32,
    pub bank: u16,
    pub program: u8,
    pub volume: u8,
    pub pan: u8,
    pub expression: u8,
    pub sustain: bool,
    pub pitch_wheel: u16,
}

struct ChannelCell {
    voices: AtomicU32,
    bank: AtomicU16,
    program: AtomicU8,
    pitch_wheel: AtomicU16,
    controllers: [AtomicU8; 128],
}

impl ChannelCell {
    fn new() -> ChannelCell {
        ChannelCell {
            voices: AtomicU32::new(0),
            bank: AtomicU16::new(0),
            program: AtomicU8::new(0),
            pitch_wheel: AtomicU16::new(8192),
            controllers: std::array::from_fn(|_| AtomicU8::new(0)),
        }
    }
}

/// Shared per-channel state written by the engine.
pub(crate) struct SnapshotCells {
    channels: [ChannelCell; CHANNEL_COUNT],
}

impl SnapshotCells {
    pub fn new() -> Arc<SnapshotCells> {
        Arc::new(SnapshotCells {
            channels: std::array::from_fn(|_| ChannelCell::new()),
        })
    }

    pub fn store_channel(&self, channel: &Channel) {
        let cell = &self.channels[channel.index() as usize];
        cell.bank.store(channel.bank, Ordering::Relaxed);
        cell.program.store(channel.program, Ordering::Relaxed);
        cell.pitch_wheel
            .store(channel.pitch_wheel(), Ordering::Relaxed);
        for (slot, value) in cell.controllers.iter().zip(channel.controllers()) {
            slot.store(*value, Ordering::Relaxed);
        }
    }

    pub fn store_voice_counts(&self, counts: &[u32; CHANNEL_COUNT]) {
        for (cell, count) in self.channels.iter().zip(counts) {
            cell.voices.store(*count, Ordering::Relaxed);
        }
    }
}

/// Read access to the engine's channel state from any thread.
#[derive(Clone)]
pub struct SynthSnapshot {
    cells: Arc<SnapshotCells>,
}

impl SynthSnapshot {
    pub(crate) fn new(cells: Arc<SnapshotCells>) -> SynthSnapshot {
        SynthSnapshot { cells }
    }

    pub fn channel(&self, channel: u8) -> ChannelSnapshot {
        let cell = &self.cells.channels[channel as usize % CHANNEL_COUNT];
        let controller = |number: u8| cell.controllers[number as usize].load(Ordering::Relaxed);
        ChannelSnapshot {
            voices: cell.voices.load(Ordering::Relaxed),
            bank: cell.bank.load(Ordering::Relaxed),
            program: cell.program.load(Ordering::Relaxed),
            volume: controller(cc::VOLUME),
            pan: controller(cc::PAN),
            expression: controller(cc::EXPRESSION),
            sustain: controller(cc::SUSTAIN_PEDAL) >= 64,
            pitch_wheel: cell.pitch_wheel.load(Ordering::Relaxed),
        }
    }

    pub fn controller(&self, channel: u8, controller: u8) -> u8 {
        self.cells.channels[channel as usize % CHANNEL_COUNT].controllers
            [controller as usize & 0x7F]
            .load(Ordering::Relaxed)
    }

    pub fn channels(&self) -> Vec<ChannelSnapshot> {
        (0..CHANNEL_COUNT as u8).map(|c| self.channel(c)).collect()
    }

    /// Voices sounding across all channels.
    pub fn total_voices(&self) -> u32 {
        self.cells
            .channels
            .iter()
            .map(|c| c.voices.load(Ordering::Relaxed))
            .sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_publish_drops_when_full() {
        let mut publisher = EventPublisher::default();
        let receiver = publisher.subscribe(1);
        publisher.publish(SynthEvent::SystemReset);
        publisher.publish(SynthEvent::PresetListChanged { presets: 1 });
        assert_eq!(receiver.try_recv(), Ok(SynthEvent::SystemReset));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_disconnected_subscribers_are_removed() {
        let mut publisher = EventPublisher::default();
        let receiver = publisher.subscribe(4);
        drop(receiver);
        publisher.publish(SynthEvent::SystemReset);
        assert!(!publisher.has_subscribers());
    }

    #[test]
    fn test_snapshot() {
        let cells = SnapshotCells::new();
        let snapshot = SynthSnapshot::new(cells.clone());

        let mut channel = Channel::new(3);
        channel.program = 42;
        channel.set_controller(cc::SUSTAIN_PEDAL, 127);
        cells.store_channel(&channel);
        let mut counts = [0; CHANNEL_COUNT];
        counts[3] = 2;
        counts[5] = 1;
        cells.store_voice_counts(&counts);

        let state = snapshot.channel(3);
        assert_eq!(state.program, 42);
        assert_eq!(state.volume, 100);
        assert!(state.sustain);
        assert_eq!(state.voices, 2);
        assert_eq!(snapshot.total_voices(), 3);
        assert_eq!(snapshot.channels().len(), CHANNEL_COUNT);
    }
}
