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
use crate::riff::{Cursor, LoadError};

/// A modulator record as stored in the `pmod`/`imod` chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Modulator {
    /// Source operator: index, continuous-controller flag, direction, polarity and curve.
    pub source: u16,
    /// Destination generator number.
    pub destination: u16,
    pub amount: i16,
    /// Secondary source that scales the amount.
    pub amount_source: u16,
    pub transform: u16,
}

/// The fields that identify a modulator. Two modulators with the same identity
/// are the same connection regardless of amount.
pub type ModulatorIdentity = (u16, u16, u16, u16);

pub(crate) const RECORD_SIZE: usize = 10;

impl Modulator {
    pub(crate) fn read(cursor: &mut Cursor) -> Result<Modulator, LoadError> {
        Ok(Modulator {
            source: cursor.read_u16()?,
            destination: cursor.read_u16()?,
            amount: cursor.read_i16()?,
            amount_source: cursor.read_u16()?,
            transform: cursor.read_u16()?,
        })
    }

    pub fn identity(&self) -> ModulatorIdentity {
        (
            self.source,
            self.destination,
            self.amount_source,
            self.transform,
        )
    }

    pub fn is_identical(&self, other: &Modulator) -> bool {
        self.identity() == other.identity()
    }

    /// The source controller index (the low seven bits of the source operator).
    pub fn source_index(&self) -> u8 {
        (self.source & 0x7F) as u8
    }

    /// True if the source is a MIDI continuous controller rather than a general
    /// controller such as velocity or key number.
    pub fn source_is_cc(&self) -> bool {
        self.source & 0x80 != 0
    }

    pub fn source_curve(&self) -> u8 {
        ((self.source >> 10) & 0x3F) as u8
    }

    pub fn source_is_bipolar(&self) -> bool {
        self.source & 0x200 != 0
    }

    pub fn source_is_negative(&self) -> bool {
        self.source & 0x100 != 0
    }
}

/// Merges two modulator lists by identity: entries of `local` win, entries of
/// `global` are appended only when no local modulator has the same identity.
pub fn merge_by_identity(local: &[Modulator], global: &[Modulator]) -> Vec<Modulator> {
    let mut merged = local.to_vec();
    for modulator in global {
        if !merged.iter().any(|m| m.is_identical(modulator)) {
            merged.push(*modulator);
        }
    }
    merged
}

/// Adds `additions` onto `base`: identical modulators have their amounts summed,
/// the others are appended.
pub fn sum_by_identity(base: &[Modulator], additions: &[Modulator]) -> Vec<Modulator> {
    let mut merged = base.to_vec();
    for modulator in additions {
        match merged.iter_mut().find(|m| m.is_identical(modulator)) {
            Some(existing) => existing.amount = existing.amount.saturating_add(modulator.amount),
            None => merged.push(*modulator),
        }
    }
    merged
}

#[cfg(test)]
mod test {
    use super::*;

    fn modulator(source: u16, destination: u16, amount: i16) -> Modulator {
        Modulator {
            source,
            destination,
            amount,
            amount_source: 0,
            transform: 0,
        }
    }

    #[test]
    fn test_read() {
        let bytes = [0x02, 0x05, 0x30, 0x00, 0x60, 0xF0, 0x00, 0x00, 0x00, 0x00];
        let modulator = Modulator::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(modulator.source, 0x0502);
        assert_eq!(modulator.destination, 48);
        assert_eq!(modulator.amount, -4000);
        assert_eq!(modulator.source_index(), 2);
        assert!(!modulator.source_is_cc());
        assert!(modulator.source_is_negative());
        assert_eq!(modulator.source_curve(), 1);
    }

    #[test]
    fn test_identity_ignores_amount() {
        assert!(modulator(0x0502, 48, 960).is_identical(&modulator(0x0502, 48, -100)));
        assert!(!modulator(0x0502, 48, 960).is_identical(&modulator(0x0502, 17, 960)));
    }

    #[test]
    fn test_merge_by_identity() {
        let local = [modulator(1, 48, 10)];
        let global = [modulator(1, 48, 99), modulator(2, 17, 5)];
        let merged = merge_by_identity(&local, &global);
        assert_eq!(merged, vec![modulator(1, 48, 10), modulator(2, 17, 5)]);
    }

    #[test]
    fn test_sum_by_identity() {
        let base = [modulator(1, 48, 10)];
        let additions = [modulator(1, 48, 5), modulator(3, 8, 7)];
        let merged = sum_by_identity(&base, &additions);
        assert_eq!(merged, vec![modulator(1, 48, 15), modulator(3, 8, 7)]);
    }
}
