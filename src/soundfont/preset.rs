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
use std::fmt;

use super::zone::{split_global, Zone};

/// The bank number reserved for percussion kits.
pub const PERCUSSION_BANK: u16 = 128;

/// An index into the bank's sorted preset list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PresetId(pub usize);

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instrument {
    pub name: String,
    pub zones: Vec<Zone>,
}

impl Instrument {
    pub fn global_zone(&self) -> Option<&Zone> {
        split_global(&self.zones).0
    }

    pub fn local_zones(&self) -> impl Iterator<Item = &Zone> {
        split_global(&self.zones).1
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Preset {
    pub name: String,
    pub program: u16,
    pub bank: u16,
    pub library: u32,
    pub genre: u32,
    pub morphology: u32,
    pub zones: Vec<Zone>,
}

impl Preset {
    pub fn is_percussion(&self) -> bool {
        self.bank == PERCUSSION_BANK
    }

    pub fn global_zone(&self) -> Option<&Zone> {
        split_global(&self.zones).0
    }

    pub fn local_zones(&self) -> impl Iterator<Item = &Zone> {
        split_global(&self.zones).1
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}:{:03} {}", self.bank, self.program, self.name)
    }
}
