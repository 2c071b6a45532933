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
use super::{generator::GeneratorSet, modulator::Modulator};

/// An inclusive `lo..=hi` key or velocity range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    pub lo: u8,
    pub hi: u8,
}

impl Range {
    pub const FULL: Range = Range { lo: 0, hi: 127 };

    pub fn new(lo: u8, hi: u8) -> Range {
        Range { lo, hi }
    }

    pub fn contains(&self, value: u8) -> bool {
        self.lo <= value && value <= self.hi
    }

    /// The overlap of two ranges, or None if they don't overlap.
    pub fn intersect(&self, other: &Range) -> Option<Range> {
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        (lo <= hi).then_some(Range { lo, hi })
    }
}

impl Default for Range {
    fn default() -> Self {
        Range::FULL
    }
}

/// What a zone points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneReference {
    /// A global zone: its generators are defaults for the sibling zones.
    Global,
    /// A preset zone's instrument, by index.
    Instrument(usize),
    /// An instrument zone's sample, by index.
    Sample(usize),
}

/// A preset or instrument zone.
///
/// The range generators and the terminal reference generator are lifted out of the
/// generator list into `key_range`, `vel_range` and `reference`.
#[derive(Clone, Debug, PartialEq)]
pub struct Zone {
    pub key_range: Range,
    pub vel_range: Range,
    pub has_key_range: bool,
    pub has_vel_range: bool,
    pub generators: GeneratorSet,
    pub modulators: Vec<Modulator>,
    pub reference: ZoneReference,
}

impl Default for Zone {
    fn default() -> Self {
        Zone {
            key_range: Range::FULL,
            vel_range: Range::FULL,
            has_key_range: false,
            has_vel_range: false,
            generators: GeneratorSet::new(),
            modulators: Vec::new(),
            reference: ZoneReference::Global,
        }
    }
}

impl Zone {
    pub fn is_global(&self) -> bool {
        self.reference == ZoneReference::Global
    }

    /// True if the note and velocity fall inside both of this zone's ranges.
    pub fn matches(&self, note: u8, velocity: u8) -> bool {
        self.key_range.contains(note) && self.vel_range.contains(velocity)
    }

    pub fn set_key_range(&mut self, range: Range) {
        self.key_range = range;
        self.has_key_range = true;
    }

    pub fn set_vel_range(&mut self, range: Range) {
        self.vel_range = range;
        self.has_vel_range = true;
    }
}

/// Splits a zone list into its global zone (the first global zone, if any) and
/// its local zones.
pub fn split_global(zones: &[Zone]) -> (Option<&Zone>, impl Iterator<Item = &Zone>) {
    (
        zones.iter().find(|z| z.is_global()),
        zones.iter().filter(|z| !z.is_global()),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_intersect() {
        let a = Range::new(5, 10);
        assert_eq!(a.intersect(&Range::new(8, 20)), Some(Range::new(8, 10)));
        assert_eq!(Range::new(1, 4).intersect(&Range::new(8, 20)), None);
        assert_eq!(a.intersect(&Range::new(10, 10)), Some(Range::new(10, 10)));
    }

    #[test]
    fn test_matches() {
        let mut zone = Zone {
            reference: ZoneReference::Sample(0),
            ..Default::default()
        };
        assert!(zone.matches(0, 127));

        zone.set_key_range(Range::new(60, 72));
        zone.set_vel_range(Range::new(1, 64));
        assert!(zone.has_key_range);
        assert!(zone.matches(60, 64));
        assert!(!zone.matches(59, 64));
        assert!(!zone.matches(60, 65));
    }

    #[test]
    fn test_split_global() {
        let zones = vec![
            Zone::default(),
            Zone {
                reference: ZoneReference::Sample(3),
                ..Default::default()
            },
        ];
        let (global, local) = split_global(&zones);
        assert!(global.is_some());
        let local: Vec<_> = local.collect();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].reference, ZoneReference::Sample(3));
    }
}
