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

//! Getting rendered audio out: to a device in real time, or to a WAV file.

pub mod cpal;
mod thread_priority;
pub mod wav;

pub use self::cpal::{list_devices, DeviceInfo, Output};
pub use self::wav::{render_blocks, render_to_wav, RenderSummary};
