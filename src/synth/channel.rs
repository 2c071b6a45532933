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
use crate::soundfont::{PresetId, PERCUSSION_BANK};

/// Number of MIDI channels.
pub const CHANNEL_COUNT: usize = 16;

/// The General MIDI percussion channel (channel 10, zero based).
pub const PERCUSSION_CHANNEL: u8 = 9;

/// Controller numbers the engine interprets.
pub mod cc {
    pub const BANK_SELECT: u8 = 0;
    pub const DATA_ENTRY_MSB: u8 = 6;
    pub const VOLUME: u8 = 7;
    pub const PAN: u8 = 10;
    pub const EXPRESSION: u8 = 11;
    pub const DATA_ENTRY_LSB: u8 = 38;
    pub const SUSTAIN_PEDAL: u8 = 64;
    pub const NRPN_LSB: u8 = 98;
    pub const NRPN_MSB: u8 = 99;
    pub const RPN_LSB: u8 = 100;
    pub const RPN_MSB: u8 = 101;
    pub const ALL_SOUND_OFF: u8 = 120;
    pub const RESET_ALL_CONTROLLERS: u8 = 121;
    pub const ALL_NOTES_OFF: u8 = 123;
}

const PITCH_WHEEL_CENTER: u16 = 8192;
const DEFAULT_BEND_RANGE: f64 = 2.0;
const RPN_NULL: u8 = 127;

const RPN_BEND_RANGE: (u8, u8) = (0, 0);
const RPN_FINE_TUNING: (u8, u8) = (0, 1);
const RPN_COARSE_TUNING: (u8, u8) = (0, 2);
const NRPN_VIBRATO_RATE: (u8, u8) = (1, 8);
const NRPN_VIBRATO_DEPTH: (u8, u8) = (1, 9);
const NRPN_VIBRATO_DELAY: (u8, u8) = (1, 10);

/// The registered or non-registered parameter data entry applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Parameter {
    Registered(u8, u8),
    NonRegistered(u8, u8),
}

/// Pitch vibrato applied to notes started on a channel. A zero rate or depth
/// disables it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VibratoOptions {
    /// Peak detune in cents.
    pub depth: f64,
    /// Oscillation rate in Hz.
    pub rate: f64,
    /// Seconds after note-on before the vibrato starts.
    pub delay: f64,
}

impl VibratoOptions {
    pub fn is_active(&self) -> bool {
        self.rate > 0.0 && self.depth != 0.0
    }
}

/// Per-channel MIDI state.
#[derive(Clone, Debug)]
pub struct Channel {
    index: u8,
    pub bank: u16,
    pub program: u8,
    pub preset: Option<PresetId>,
    controllers: [u8; 128],
    locked_controllers: [bool; 128],
    program_locked: bool,
    pitch_wheel: u16,
    /// Current bend in semitones.
    bend: f64,
    /// Pitch bend sensitivity in semitones.
    bend_range: f64,
    parameter: Parameter,
    /// 14-bit channel fine tuning, centered on 8192.
    fine_tuning: u16,
    /// Channel coarse tuning in semitones.
    coarse_tuning: i8,
    vibrato: VibratoOptions,
    vibrato_locked: bool,
}

impl Channel {
    pub fn new(index: u8) -> Channel {
        let mut channel = Channel {
            index,
            bank: 0,
            program: 0,
            preset: None,
            controllers: [0; 128],
            locked_controllers: [false; 128],
            program_locked: false,
            pitch_wheel: PITCH_WHEEL_CENTER,
            bend: 0.0,
            bend_range: DEFAULT_BEND_RANGE,
            parameter: Parameter::Registered(RPN_NULL, RPN_NULL),
            fine_tuning: PITCH_WHEEL_CENTER,
            coarse_tuning: 0,
            vibrato: VibratoOptions::default(),
            vibrato_locked: false,
        };
        channel.controllers[cc::VOLUME as usize] = 100;
        channel.controllers[cc::PAN as usize] = 64;
        channel.reset_controllers();
        channel
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn is_percussion(&self) -> bool {
        self.index == PERCUSSION_CHANNEL
    }

    /// The bank used for program changes. The percussion channel always uses the
    /// percussion bank.
    pub fn effective_bank(&self) -> u16 {
        if self.is_percussion() {
            PERCUSSION_BANK
        } else {
            self.bank
        }
    }

    pub fn controller(&self, controller: u8) -> u8 {
        self.controllers[controller as usize & 0x7F]
    }

    pub fn controllers(&self) -> &[u8; 128] {
        &self.controllers
    }

    /// Stores a controller value and applies the side effects that live on the
    /// channel itself. Voice-level effects are the engine's job.
    pub fn set_controller(&mut self, controller: u8, value: u8) {
        let controller = controller & 0x7F;
        let value = value & 0x7F;
        self.controllers[controller as usize] = value;
        match controller {
            cc::BANK_SELECT if !self.is_percussion() => self.bank = value as u16,
            cc::RPN_MSB => {
                self.parameter = Parameter::Registered(value, self.controller(cc::RPN_LSB))
            }
            cc::RPN_LSB => {
                self.parameter = Parameter::Registered(self.controller(cc::RPN_MSB), value)
            }
            cc::NRPN_MSB => {
                self.parameter = Parameter::NonRegistered(value, self.controller(cc::NRPN_LSB))
            }
            cc::NRPN_LSB => {
                self.parameter = Parameter::NonRegistered(self.controller(cc::NRPN_MSB), value)
            }
            cc::DATA_ENTRY_MSB => self.data_entry_msb(value),
            cc::DATA_ENTRY_LSB => self.data_entry_lsb(value),
            cc::RESET_ALL_CONTROLLERS => self.reset_controllers(),
            _ => {}
        }
    }

    fn data_entry_msb(&mut self, value: u8) {
        match self.parameter {
            Parameter::Registered(msb, lsb) => match (msb, lsb) {
                RPN_BEND_RANGE => {
                    let cents = self.bend_range.fract();
                    self.bend_range = value as f64 + cents;
                    self.update_bend();
                }
                RPN_FINE_TUNING => {
                    self.fine_tuning = ((value as u16) << 7) | (self.fine_tuning & 0x7F);
                }
                RPN_COARSE_TUNING => self.coarse_tuning = value as i8 - 64,
                _ => {}
            },
            Parameter::NonRegistered(msb, lsb) if !self.vibrato_locked => match (msb, lsb) {
                NRPN_VIBRATO_RATE => self.vibrato.rate = value as f64 / 64.0 * 8.0,
                NRPN_VIBRATO_DEPTH => self.vibrato.depth = value as f64 / 2.0,
                NRPN_VIBRATO_DELAY => self.vibrato.delay = value as f64 / 64.0 / 3.0,
                _ => {}
            },
            Parameter::NonRegistered(..) => {}
        }
    }

    fn data_entry_lsb(&mut self, value: u8) {
        match self.parameter {
            Parameter::Registered(msb, lsb) if (msb, lsb) == RPN_BEND_RANGE => {
                self.bend_range = self.bend_range.trunc() + value as f64 / 100.0;
                self.update_bend();
            }
            Parameter::Registered(msb, lsb) if (msb, lsb) == RPN_FINE_TUNING => {
                self.fine_tuning = (self.fine_tuning & !0x7F) | value as u16;
            }
            _ => {}
        }
    }

    /// Resets the controllers a "reset all controllers" message covers. Volume,
    /// pan and bank are left alone.
    pub fn reset_controllers(&mut self) {
        let keep = [
            cc::BANK_SELECT,
            cc::VOLUME,
            cc::PAN,
            cc::RESET_ALL_CONTROLLERS,
        ];
        for (controller, value) in self.controllers.iter_mut().enumerate() {
            if !keep.contains(&(controller as u8)) {
                *value = 0;
            }
        }
        self.controllers[cc::EXPRESSION as usize] = 127;
        self.controllers[cc::RPN_MSB as usize] = RPN_NULL;
        self.controllers[cc::RPN_LSB as usize] = RPN_NULL;
        self.controllers[cc::NRPN_MSB as usize] = RPN_NULL;
        self.controllers[cc::NRPN_LSB as usize] = RPN_NULL;
        self.parameter = Parameter::Registered(RPN_NULL, RPN_NULL);
        self.pitch_wheel = PITCH_WHEEL_CENTER;
        self.bend = 0.0;
    }

    pub fn is_controller_locked(&self, controller: u8) -> bool {
        self.locked_controllers[controller as usize & 0x7F]
    }

    pub fn lock_controller(&mut self, controller: u8, locked: bool) {
        self.locked_controllers[controller as usize & 0x7F] = locked;
    }

    pub fn is_program_locked(&self) -> bool {
        self.program_locked
    }

    pub fn lock_program(&mut self, locked: bool) {
        self.program_locked = locked;
    }

    pub fn sustain_pedal(&self) -> bool {
        self.controller(cc::SUSTAIN_PEDAL) >= 64
    }

    /// Linear gain from channel volume and expression.
    pub fn gain(&self) -> f32 {
        self.controller(cc::VOLUME) as f32 / 127.0 * self.controller(cc::EXPRESSION) as f32 / 127.0
    }

    /// Channel pan as an offset in the pan generator's units (-500..=500).
    pub fn pan_offset(&self) -> i16 {
        ((self.controller(cc::PAN) as i16 - 64) * 500 / 64).clamp(-500, 500)
    }

    pub fn pitch_wheel(&self) -> u16 {
        self.pitch_wheel
    }

    /// Sets the 14-bit pitch wheel and returns the resulting bend in semitones.
    pub fn set_pitch_wheel(&mut self, value: u16) -> f64 {
        self.pitch_wheel = value.min(0x3FFF);
        self.update_bend();
        self.bend
    }

    pub fn bend(&self) -> f64 {
        self.bend
    }

    /// Sets the bend directly in semitones.
    pub fn set_bend(&mut self, semitones: f64) {
        self.bend = semitones;
    }

    pub fn bend_range(&self) -> f64 {
        self.bend_range
    }

    /// Channel tuning from the fine and coarse tuning RPNs, in cents.
    pub fn tuning_cents(&self) -> f64 {
        self.coarse_tuning as f64 * 100.0
            + (self.fine_tuning as f64 - PITCH_WHEEL_CENTER as f64) / PITCH_WHEEL_CENTER as f64
                * 100.0
    }

    pub fn vibrato(&self) -> VibratoOptions {
        self.vibrato
    }

    /// Sets the vibrato unless it is locked.
    pub fn set_vibrato(&mut self, vibrato: VibratoOptions) {
        if !self.vibrato_locked {
            self.vibrato = vibrato;
        }
    }

    pub fn is_vibrato_locked(&self) -> bool {
        self.vibrato_locked
    }

    /// Locking turns the vibrato off and ignores later vibrato changes.
    pub fn lock_vibrato(&mut self, locked: bool) {
        if locked {
            self.vibrato = VibratoOptions::default();
        }
        self.vibrato_locked = locked;
    }

    fn update_bend(&mut self) {
        self.bend = (self.pitch_wheel as f64 - PITCH_WHEEL_CENTER as f64)
            / PITCH_WHEEL_CENTER as f64
            * self.bend_range;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let channel = Channel::new(0);
        assert_eq!(channel.controller(cc::VOLUME), 100);
        assert_eq!(channel.controller(cc::EXPRESSION), 127);
        assert_eq!(channel.pan_offset(), 0);
        assert_eq!(channel.bend_range(), 2.0);
        assert!(!channel.is_percussion());
        assert!(Channel::new(9).is_percussion());
        assert_eq!(Channel::new(9).effective_bank(), PERCUSSION_BANK);
    }

    #[test]
    fn test_pitch_wheel() {
        let mut channel = Channel::new(0);
        assert_eq!(channel.set_pitch_wheel(8192), 0.0);
        assert_eq!(channel.set_pitch_wheel(0), -2.0);
        assert!((channel.set_pitch_wheel(0x3FFF) - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_bend_range_rpn() {
        let mut channel = Channel::new(0);
        channel.set_controller(cc::RPN_MSB, 0);
        channel.set_controller(cc::RPN_LSB, 0);
        channel.set_controller(cc::DATA_ENTRY_MSB, 12);
        channel.set_controller(cc::DATA_ENTRY_LSB, 50);
        assert!((channel.bend_range() - 12.5).abs() < 1e-9);
        assert!((channel.set_pitch_wheel(0) + 12.5).abs() < 1e-9);

        // Data entry without RPN 0 selected doesn't touch the range.
        channel.set_controller(cc::RPN_MSB, 127);
        channel.set_controller(cc::DATA_ENTRY_MSB, 2);
        assert!((channel.bend_range() - 12.5).abs() < 1e-9);
    }

    fn select(channel: &mut Channel, controllers: (u8, u8), parameter: (u8, u8)) {
        channel.set_controller(controllers.0, parameter.0);
        channel.set_controller(controllers.1, parameter.1);
    }

    #[test]
    fn test_tuning_rpns() {
        let mut channel = Channel::new(0);
        assert_eq!(channel.tuning_cents(), 0.0);

        select(&mut channel, (cc::RPN_MSB, cc::RPN_LSB), (0, 2));
        channel.set_controller(cc::DATA_ENTRY_MSB, 66);
        assert!((channel.tuning_cents() - 200.0).abs() < 1e-9);

        // Fine tuning at its lowest is a semitone down.
        select(&mut channel, (cc::RPN_MSB, cc::RPN_LSB), (0, 1));
        channel.set_controller(cc::DATA_ENTRY_MSB, 0);
        channel.set_controller(cc::DATA_ENTRY_LSB, 0);
        assert!((channel.tuning_cents() - 100.0).abs() < 1e-9);

        channel.set_controller(cc::DATA_ENTRY_MSB, 96);
        assert!((channel.tuning_cents() - 250.0).abs() < 1e-9);
        assert_eq!(channel.bend_range(), 2.0);
    }

    #[test]
    fn test_vibrato_nrpns() {
        let mut channel = Channel::new(0);
        assert!(!channel.vibrato().is_active());

        select(&mut channel, (cc::NRPN_MSB, cc::NRPN_LSB), (1, 8));
        channel.set_controller(cc::DATA_ENTRY_MSB, 64);
        select(&mut channel, (cc::NRPN_MSB, cc::NRPN_LSB), (1, 9));
        channel.set_controller(cc::DATA_ENTRY_MSB, 100);
        select(&mut channel, (cc::NRPN_MSB, cc::NRPN_LSB), (1, 10));
        channel.set_controller(cc::DATA_ENTRY_MSB, 32);

        let vibrato = channel.vibrato();
        assert_eq!(vibrato.rate, 8.0);
        assert_eq!(vibrato.depth, 50.0);
        assert!((vibrato.delay - 1.0 / 6.0).abs() < 1e-9);
        assert!(vibrato.is_active());
        // Data entry for an NRPN leaves the bend range alone.
        assert_eq!(channel.bend_range(), 2.0);

        channel.lock_vibrato(true);
        assert!(!channel.vibrato().is_active());
        select(&mut channel, (cc::NRPN_MSB, cc::NRPN_LSB), (1, 8));
        channel.set_controller(cc::DATA_ENTRY_MSB, 64);
        channel.set_vibrato(VibratoOptions {
            depth: 10.0,
            rate: 5.0,
            delay: 0.0,
        });
        assert_eq!(channel.vibrato(), VibratoOptions::default());
    }

    #[test]
    fn test_bank_select() {
        let mut channel = Channel::new(0);
        channel.set_controller(cc::BANK_SELECT, 8);
        assert_eq!(channel.effective_bank(), 8);

        let mut drums = Channel::new(PERCUSSION_CHANNEL);
        drums.set_controller(cc::BANK_SELECT, 8);
        assert_eq!(drums.effective_bank(), PERCUSSION_BANK);
    }

    #[test]
    fn test_reset_all_controllers() {
        let mut channel = Channel::new(0);
        channel.set_controller(cc::VOLUME, 50);
        channel.set_controller(cc::EXPRESSION, 10);
        channel.set_controller(cc::SUSTAIN_PEDAL, 127);
        channel.set_pitch_wheel(0);
        assert!(channel.sustain_pedal());

        channel.set_controller(cc::RESET_ALL_CONTROLLERS, 0);
        assert_eq!(channel.controller(cc::VOLUME), 50);
        assert_eq!(channel.controller(cc::EXPRESSION), 127);
        assert!(!channel.sustain_pedal());
        assert_eq!(channel.bend(), 0.0);
    }

    #[test]
    fn test_locks() {
        let mut channel = Channel::new(0);
        channel.lock_controller(cc::VOLUME, true);
        assert!(channel.is_controller_locked(cc::VOLUME));
        assert!(!channel.is_controller_locked(cc::PAN));
        channel.lock_program(true);
        assert!(channel.is_program_locked());
    }
}
