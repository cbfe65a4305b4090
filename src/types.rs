//! This module contains types relevant to the PSU Modbus data types.

use fugit::SecsDurationU32;

/// Used to be less ambiguous and whether something is on or off.
#[repr(u16)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum State {
    /// Disabled.
    #[default]
    Off = 0x00,
    /// Enabled.
    On = 0x01,
}

impl State {
    /// The opposite state.
    pub fn toggled(self) -> Self {
        match self {
            State::Off => State::On,
            State::On => State::Off,
        }
    }
}

impl From<State> for bool {
    fn from(value: State) -> Self {
        match value {
            State::Off => false,
            State::On => true,
        }
    }
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        match value {
            true => State::On,
            false => State::Off,
        }
    }
}

/// Represents the two possible power supply control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Constant voltage regulation mode.
    Cv,
    /// Constant current regulation mode.
    Cc,
}

impl From<u16> for ControlMode {
    fn from(value: u16) -> Self {
        if value == 0 {
            ControlMode::Cv
        } else {
            ControlMode::Cc
        }
    }
}

/// How long the output has been enabled, as the device reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OnTime {
    pub total_seconds: u32,
    pub hours: u16,
    pub minutes: u16,
    pub seconds: u16,
}

impl OnTime {
    pub fn new(hours: u16, minutes: u16, seconds: u16) -> Self {
        Self {
            total_seconds: u32::from(hours) * 3600 + u32::from(minutes) * 60 + u32::from(seconds),
            hours,
            minutes,
            seconds,
        }
    }

    pub fn duration(&self) -> SecsDurationU32 {
        SecsDurationU32::secs(self.total_seconds)
    }
}

/// Electrical maxima of the supply. Used when protections are reset to their permissive values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceLimits {
    /// Highest input voltage in volts.
    pub max_input_voltage: f64,
    /// Highest output current in amps.
    pub max_current: f64,
    /// Highest output power in watts.
    pub max_power: f64,
}

impl Default for DeviceLimits {
    /// SK120: 36 V in, 6 A, 120 W.
    fn default() -> Self {
        Self {
            max_input_voltage: 36.0,
            max_current: 6.0,
            max_power: 120.0,
        }
    }
}
