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

//! Offline conversion of SoundFont presets into DLS shaped data.
//!
//! DLS has no preset layer, so every preset zone is flattened into the
//! instrument zones it covers ([`combine_zones`]) and each flattened zone's
//! parameters become level 2 connection blocks ([`articulators`]).

mod articulation;
mod combine;

pub use articulation::{
    articulators, destination, from_dls_key_scaling, source, to_dls_key_scaling, write_art2,
    ConnectionBlock, CONNECTION_BLOCK_SIZE,
};
pub use combine::{combine_zones, CombinedZone};
