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

use tracing::trace;

/// The SoundFont 2.04 generator operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum GeneratorType {
    StartAddrsOffset = 0,
    EndAddrsOffset = 1,
    StartloopAddrsOffset = 2,
    EndloopAddrsOffset = 3,
    StartAddrsCoarseOffset = 4,
    ModLfoToPitch = 5,
    VibLfoToPitch = 6,
    ModEnvToPitch = 7,
    InitialFilterFc = 8,
    InitialFilterQ = 9,
    ModLfoToFilterFc = 10,
    ModEnvToFilterFc = 11,
    EndAddrsCoarseOffset = 12,
    ModLfoToVolume = 13,
    Unused1 = 14,
    ChorusEffectsSend = 15,
    ReverbEffectsSend = 16,
    Pan = 17,
    Unused2 = 18,
    Unused3 = 19,
    Unused4 = 20,
    DelayModLfo = 21,
    FreqModLfo = 22,
    DelayVibLfo = 23,
    FreqVibLfo = 24,
    DelayModEnv = 25,
    AttackModEnv = 26,
    HoldModEnv = 27,
    DecayModEnv = 28,
    SustainModEnv = 29,
    ReleaseModEnv = 30,
    KeynumToModEnvHold = 31,
    KeynumToModEnvDecay = 32,
    DelayVolEnv = 33,
    AttackVolEnv = 34,
    HoldVolEnv = 35,
    DecayVolEnv = 36,
    SustainVolEnv = 37,
    ReleaseVolEnv = 38,
    KeynumToVolEnvHold = 39,
    KeynumToVolEnvDecay = 40,
    Instrument = 41,
    Reserved1 = 42,
    KeyRange = 43,
    VelRange = 44,
    StartloopAddrsCoarseOffset = 45,
    KeyNum = 46,
    Velocity = 47,
    InitialAttenuation = 48,
    Reserved2 = 49,
    EndloopAddrsCoarseOffset = 50,
    CoarseTune = 51,
    FineTune = 52,
    SampleId = 53,
    SampleModes = 54,
    Reserved3 = 55,
    ScaleTuning = 56,
    ExclusiveClass = 57,
    OverridingRootKey = 58,
    Unused5 = 59,
    EndOper = 60,
}

/// Number of defined generator operators.
pub const GENERATOR_COUNT: usize = 61;

/// Default amount and inclusive valid range of a generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratorLimits {
    pub default: i16,
    pub min: i16,
    pub max: i16,
}

const fn limits(default: i16, min: i16, max: i16) -> GeneratorLimits {
    GeneratorLimits { default, min, max }
}

const FULL_RANGE: i16 = 0x7F00;

/// Defaults and ranges indexed by generator number.
const LIMITS: [GeneratorLimits; GENERATOR_COUNT] = [
    limits(0, 0, i16::MAX),              // startAddrsOffset
    limits(0, i16::MIN, 0),              // endAddrsOffset
    limits(0, i16::MIN, i16::MAX),       // startloopAddrsOffset
    limits(0, i16::MIN, i16::MAX),       // endloopAddrsOffset
    limits(0, 0, i16::MAX),              // startAddrsCoarseOffset
    limits(0, -12000, 12000),            // modLfoToPitch
    limits(0, -12000, 12000),            // vibLfoToPitch
    limits(0, -12000, 12000),            // modEnvToPitch
    limits(13500, 1500, 13500),          // initialFilterFc
    limits(0, 0, 960),                   // initialFilterQ
    limits(0, -12000, 12000),            // modLfoToFilterFc
    limits(0, -12000, 12000),            // modEnvToFilterFc
    limits(0, i16::MIN, 0),              // endAddrsCoarseOffset
    limits(0, -960, 960),                // modLfoToVolume
    limits(0, 0, 0),                     // unused1
    limits(0, 0, 1000),                  // chorusEffectsSend
    limits(0, 0, 1000),                  // reverbEffectsSend
    limits(0, -500, 500),                // pan
    limits(0, 0, 0),                     // unused2
    limits(0, 0, 0),                     // unused3
    limits(0, 0, 0),                     // unused4
    limits(-12000, -12000, 5000),        // delayModLFO
    limits(0, -16000, 4500),             // freqModLFO
    limits(-12000, -12000, 5000),        // delayVibLFO
    limits(0, -16000, 4500),             // freqVibLFO
    limits(-12000, -12000, 5000),        // delayModEnv
    limits(-12000, -12000, 8000),        // attackModEnv
    limits(-12000, -12000, 5000),        // holdModEnv
    limits(-12000, -12000, 8000),        // decayModEnv
    limits(0, 0, 1000),                  // sustainModEnv
    limits(-12000, -12000, 8000),        // releaseModEnv
    limits(0, -1200, 1200),              // keynumToModEnvHold
    limits(0, -1200, 1200),              // keynumToModEnvDecay
    limits(-12000, -12000, 5000),        // delayVolEnv
    limits(-12000, -12000, 8000),        // attackVolEnv
    limits(-12000, -12000, 5000),        // holdVolEnv
    limits(-12000, -12000, 8000),        // decayVolEnv
    limits(0, 0, 1440),                  // sustainVolEnv
    limits(-12000, -12000, 8000),        // releaseVolEnv
    limits(0, -1200, 1200),              // keynumToVolEnvHold
    limits(0, -1200, 1200),              // keynumToVolEnvDecay
    limits(0, 0, i16::MAX),              // instrument
    limits(0, 0, 0),                     // reserved1
    limits(FULL_RANGE, 0, FULL_RANGE),   // keyRange
    limits(FULL_RANGE, 0, FULL_RANGE),   // velRange
    limits(0, i16::MIN, i16::MAX),       // startloopAddrsCoarseOffset
    limits(-1, -1, 127),                 // keyNum
    limits(-1, -1, 127),                 // velocity
    limits(0, 0, 1440),                  // initialAttenuation
    limits(0, 0, 0),                     // reserved2
    limits(0, i16::MIN, i16::MAX),       // endloopAddrsCoarseOffset
    limits(0, -120, 120),                // coarseTune
    limits(0, -99, 99),                  // fineTune
    limits(0, 0, i16::MAX),              // sampleID
    limits(0, 0, 3),                     // sampleModes
    limits(0, 0, 0),                     // reserved3
    limits(100, 0, 1200),                // scaleTuning
    limits(0, 0, 127),                   // exclusiveClass
    limits(-1, -1, 127),                 // overridingRootKey
    limits(0, 0, 0),                     // unused5
    limits(0, 0, 0),                     // endOper
];

impl GeneratorType {
    /// Every generator, in numeric order.
    pub const ALL: [GeneratorType; GENERATOR_COUNT] = {
        use GeneratorType::*;
        [
            StartAddrsOffset,
            EndAddrsOffset,
            StartloopAddrsOffset,
            EndloopAddrsOffset,
            StartAddrsCoarseOffset,
            ModLfoToPitch,
            VibLfoToPitch,
            ModEnvToPitch,
            InitialFilterFc,
            InitialFilterQ,
            ModLfoToFilterFc,
            ModEnvToFilterFc,
            EndAddrsCoarseOffset,
            ModLfoToVolume,
            Unused1,
            ChorusEffectsSend,
            ReverbEffectsSend,
            Pan,
            Unused2,
            Unused3,
            Unused4,
            DelayModLfo,
            FreqModLfo,
            DelayVibLfo,
            FreqVibLfo,
            DelayModEnv,
            AttackModEnv,
            HoldModEnv,
            DecayModEnv,
            SustainModEnv,
            ReleaseModEnv,
            KeynumToModEnvHold,
            KeynumToModEnvDecay,
            DelayVolEnv,
            AttackVolEnv,
            HoldVolEnv,
            DecayVolEnv,
            SustainVolEnv,
            ReleaseVolEnv,
            KeynumToVolEnvHold,
            KeynumToVolEnvDecay,
            Instrument,
            Reserved1,
            KeyRange,
            VelRange,
            StartloopAddrsCoarseOffset,
            KeyNum,
            Velocity,
            InitialAttenuation,
            Reserved2,
            EndloopAddrsCoarseOffset,
            CoarseTune,
            FineTune,
            SampleId,
            SampleModes,
            Reserved3,
            ScaleTuning,
            ExclusiveClass,
            OverridingRootKey,
            Unused5,
            EndOper,
        ]
    };

    /// Decodes a generator number. Numbers past `endOper` are unknown and return None.
    pub fn from_u16(value: u16) -> Option<GeneratorType> {
        GeneratorType::ALL.get(value as usize).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn limits(self) -> GeneratorLimits {
        LIMITS[self.index()]
    }

    pub fn default_amount(self) -> i16 {
        self.limits().default
    }

    /// Clamps an amount to this generator's valid range.
    pub fn clamp(self, amount: i16) -> i16 {
        let limits = self.limits();
        amount.clamp(limits.min, limits.max)
    }

    /// Generators whose amounts are combined by replacement, never by summation.
    pub fn is_non_additive(self) -> bool {
        matches!(
            self,
            GeneratorType::KeyRange
                | GeneratorType::VelRange
                | GeneratorType::Instrument
                | GeneratorType::SampleId
                | GeneratorType::EndOper
                | GeneratorType::SampleModes
        )
    }

    /// Generators that are reserved or unused and carry no meaning.
    pub fn is_unused(self) -> bool {
        matches!(
            self,
            GeneratorType::Unused1
                | GeneratorType::Unused2
                | GeneratorType::Unused3
                | GeneratorType::Unused4
                | GeneratorType::Unused5
                | GeneratorType::Reserved1
                | GeneratorType::Reserved2
                | GeneratorType::Reserved3
        )
    }

    /// True for the generators whose amount is a `(lo, hi)` byte pair.
    pub fn is_range(self) -> bool {
        matches!(self, GeneratorType::KeyRange | GeneratorType::VelRange)
    }
}

impl fmt::Display for GeneratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single generator record: an operator and its raw amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Generator {
    pub kind: GeneratorType,
    pub amount: i16,
}

impl Generator {
    pub fn new(kind: GeneratorType, amount: i16) -> Generator {
        Generator { kind, amount }
    }

    /// Interprets the amount as a `(lo, hi)` pair, as used by the range generators.
    pub fn range(&self) -> (u8, u8) {
        let [lo, hi] = self.amount.to_le_bytes();
        (lo, hi)
    }

    /// The amount as an unsigned word, as used by index generators.
    pub fn unsigned(&self) -> u16 {
        self.amount as u16
    }
}

/// Packs a `(lo, hi)` range into a generator amount.
pub fn range_amount(lo: u8, hi: u8) -> i16 {
    i16::from_le_bytes([lo, hi])
}

/// A fixed-size generator table holding at most one amount per generator type.
///
/// Amounts are stored in file units. Presence is tracked separately so that an
/// explicit amount equal to the default is still distinguishable from absence.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct GeneratorSet {
    amounts: [i16; GENERATOR_COUNT],
    present: u64,
}

impl Default for GeneratorSet {
    fn default() -> Self {
        GeneratorSet {
            amounts: [0; GENERATOR_COUNT],
            present: 0,
        }
    }
}

impl GeneratorSet {
    pub fn new() -> GeneratorSet {
        GeneratorSet::default()
    }

    /// Builds a set from a generator list. Later duplicates replace earlier ones.
    pub fn from_generators(generators: &[Generator]) -> GeneratorSet {
        let mut set = GeneratorSet::new();
        for generator in generators {
            set.set(generator.kind, generator.amount);
        }
        set
    }

    pub fn contains(&self, kind: GeneratorType) -> bool {
        self.present & (1u64 << kind.index()) != 0
    }

    /// The explicit amount for this generator, if any.
    pub fn get(&self, kind: GeneratorType) -> Option<i16> {
        self.contains(kind).then(|| self.amounts[kind.index()])
    }

    /// The explicit amount, or the generator's default.
    pub fn amount(&self, kind: GeneratorType) -> i16 {
        self.get(kind).unwrap_or_else(|| kind.default_amount())
    }

    pub fn set(&mut self, kind: GeneratorType, amount: i16) {
        self.amounts[kind.index()] = amount;
        self.present |= 1 << kind.index();
    }

    pub fn remove(&mut self, kind: GeneratorType) {
        self.amounts[kind.index()] = 0;
        self.present &= !(1u64 << kind.index());
    }

    /// Adds to the current amount (or to the default if absent), saturating at the
    /// bounds of the 16-bit amount.
    pub fn add(&mut self, kind: GeneratorType, amount: i16) {
        let current = self.amount(kind);
        self.set(kind, current.saturating_add(amount));
    }

    /// Copies every generator of `other` that is absent here.
    pub fn fill_from(&mut self, other: &GeneratorSet) {
        for generator in other.iter() {
            if !self.contains(generator.kind) {
                self.set(generator.kind, generator.amount);
            }
        }
    }

    /// Clamps every present amount to its valid range. Returns the number of
    /// amounts that had to be changed.
    pub fn clamp_all(&mut self) -> usize {
        let mut clamped = 0;
        for kind in GeneratorType::ALL {
            if let Some(amount) = self.get(kind) {
                let fixed = kind.clamp(amount);
                if fixed != amount {
                    trace!(generator = %kind, amount, clamped = fixed, "Generator out of range");
                    self.amounts[kind.index()] = fixed;
                    clamped += 1;
                }
            }
        }
        clamped
    }

    pub fn len(&self) -> usize {
        self.present.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.present == 0
    }

    /// Present generators in numeric order.
    pub fn iter(&self) -> impl Iterator<Item = Generator> + '_ {
        GeneratorType::ALL
            .into_iter()
            .filter_map(move |kind| self.get(kind).map(|amount| Generator::new(kind, amount)))
    }
}

impl fmt::Debug for GeneratorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|g| (g.kind, g.amount)))
            .finish()
    }
}

impl FromIterator<Generator> for GeneratorSet {
    fn from_iter<I: IntoIterator<Item = Generator>>(iter: I) -> Self {
        let mut set = GeneratorSet::new();
        for generator in iter {
            set.set(generator.kind, generator.amount);
        }
        set
    }
}
