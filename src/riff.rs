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

//! Low level RIFF reading.
//!
//! This module provides:
//! - A byte cursor over an in-memory buffer with little-endian fixed-width reads
//! - Chunk reading with nested, zero-copy payload cursors
//! - The load error taxonomy shared by everything built on top of it

mod chunk;
mod cursor;
mod error;

pub use chunk::{read_chunk, read_list, write_chunk, Chunk, Tag};
pub use cursor::Cursor;
pub use error::LoadError;
