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

//! The voice engine.
//!
//! A [`Synthesizer`] turns MIDI messages into voices, one per resolved sample,
//! and mixes them into stereo blocks. It is single-threaded by construction:
//! other threads send [`SynthCommand`]s through a [`SynthHandle`], and read
//! state back through [`SynthEvent`]s and [`SynthSnapshot`]s.

pub mod channel;
mod engine;
pub mod envelope;
mod events;
pub mod params;
mod queue;
mod voice;

pub use channel::{cc, Channel, VibratoOptions, CHANNEL_COUNT, PERCUSSION_CHANNEL};
pub use engine::{SynthOptions, Synthesizer};
pub use envelope::{EnvelopePhase, VolumeEnvelope};
pub use events::{ChannelSnapshot, SynthEvent, SynthSnapshot};
pub use params::{LoopMode, Routing, VoiceParams};
pub use queue::{SynthCommand, SynthHandle};
pub use voice::{Voice, VoicePitch};
