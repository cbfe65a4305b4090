//! Decoding of the 30 register monitoring window.
//!
//! The block at `0x0000..0x001E` carries nearly everything a live display needs. Reading it in one
//! transaction costs about 10 ms at 115200 baud, against roughly 20 separate round trips otherwise.

use crate::{
    alarm::{self, AlarmEntry, UnknownStatusCode},
    codec::{self, CompositeQuantity},
    command::{CommandTable, UnknownCommand},
    preset::{InvalidPreset, PresetGroup},
    types::{ControlMode, OnTime, State},
};

/// Position of each register within the snapshot block. Fixed by the hardware.
#[derive(Debug, Clone, Copy)]
#[repr(usize)]
enum Offset {
    VSet = 0,
    ISet = 1,
    VOut = 2,
    IOut = 3,
    Power = 4,
    UIn = 5,
    AhLow = 6,
    AhHigh = 7,
    WhLow = 8,
    WhHigh = 9,
    OutH = 10,
    OutM = 11,
    OutS = 12,
    TIn = 13,
    TEx = 14,
    Lock = 15,
    Protect = 16,
    CvCc = 17,
    OnOff = 18,
    Fc = 19,
    BLed = 20,
    Sleep = 21,
    Model = 22,
    Version = 23,
    SlaveAdd = 24,
    BaudRate = 25,
    Buzzer = 28,
    ExtractM = 29,
}

/// Everything in the monitoring window, decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Voltage setting, V.
    pub voltage_setpoint: f64,
    /// Current setting, A.
    pub current_setpoint: f64,
    /// Measured output voltage, V.
    pub output_voltage: f64,
    /// Measured output current, A.
    pub output_current: f64,
    /// Measured output power, W.
    pub power: f64,
    /// Measured input voltage, V.
    pub input_voltage: f64,
    /// Accumulated capacity, Ah.
    pub capacity: f64,
    /// Accumulated energy, Wh.
    pub energy: f64,
    pub on_time: OnTime,
    pub temperature_internal: f64,
    pub temperature_external: f64,
    pub lock: State,
    /// Raw `PROTECT` value, see [`Snapshot::alarm`].
    pub status: u16,
    pub control_mode: ControlMode,
    pub output: State,
    /// Raw `F-C` value. 0 is Celsius.
    pub temperature_unit: u16,
    pub backlight: u16,
    pub sleep: u16,
    pub model: u16,
    /// Decimal value of `136` -> `v1.3.6`.
    pub firmware: u16,
    pub slave_address: u16,
    pub baud_rate: u16,
    pub buzzer: State,
    /// Raw `EXTRACT-M` value, see [`Snapshot::preset`].
    pub active_preset: u16,
}

impl Snapshot {
    /// First register of the block.
    pub const ADDRESS: u16 = 0x00;
    /// Number of registers in the block.
    pub const LEN: usize = 30;

    /// Decode a block read at [`Self::ADDRESS`]. Scalar decimals are taken from the table.
    pub fn decode(words: &[u16; Self::LEN], table: &CommandTable) -> Result<Self, UnknownCommand> {
        let word = |offset: Offset| words[offset as usize];
        let scaled = |offset: Offset, name: &str| -> Result<f64, UnknownCommand> {
            Ok(codec::decode_scalar(word(offset), table.resolve(name)?.decimals))
        };
        let flag = |offset: Offset| State::from(word(offset) != 0);

        Ok(Snapshot {
            voltage_setpoint: scaled(Offset::VSet, "V-SET")?,
            current_setpoint: scaled(Offset::ISet, "I-SET")?,
            output_voltage: scaled(Offset::VOut, "VOUT")?,
            output_current: scaled(Offset::IOut, "IOUT")?,
            power: scaled(Offset::Power, "POWER")?,
            input_voltage: scaled(Offset::UIn, "UIN")?,
            capacity: codec::decode_composite(
                word(Offset::AhLow),
                word(Offset::AhHigh),
                CompositeQuantity::CAPACITY.divisor,
            ),
            energy: codec::decode_composite(
                word(Offset::WhLow),
                word(Offset::WhHigh),
                CompositeQuantity::ENERGY.divisor,
            ),
            on_time: OnTime::new(word(Offset::OutH), word(Offset::OutM), word(Offset::OutS)),
            temperature_internal: scaled(Offset::TIn, "T_IN")?,
            temperature_external: scaled(Offset::TEx, "T_EX")?,
            lock: flag(Offset::Lock),
            status: word(Offset::Protect),
            control_mode: ControlMode::from(word(Offset::CvCc)),
            output: flag(Offset::OnOff),
            temperature_unit: word(Offset::Fc),
            backlight: word(Offset::BLed),
            sleep: word(Offset::Sleep),
            model: word(Offset::Model),
            firmware: word(Offset::Version),
            slave_address: word(Offset::SlaveAdd),
            baud_rate: word(Offset::BaudRate),
            buzzer: flag(Offset::Buzzer),
            active_preset: word(Offset::ExtractM),
        })
    }

    /// Catalog entry for [`Self::status`].
    pub fn alarm(&self) -> Result<&'static AlarmEntry, UnknownStatusCode> {
        alarm::describe(self.status)
    }

    /// [`Self::active_preset`] as a preset group.
    pub fn preset(&self) -> Result<PresetGroup, InvalidPreset> {
        PresetGroup::try_from(self.active_preset)
    }
}
