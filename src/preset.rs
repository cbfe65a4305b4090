//! Addressing of the ten on-device parameter presets (M0 - M9).
//!
//! Every preset occupies a 16 register window. The window for group `n` starts at
//! `PRESET_BASE + n * PRESET_STRIDE`, and a preset-scoped command's table address is its
//! address within group 0.

use fugit::MinutesDurationU32;
use strum::EnumCount;
use strum_macros::{EnumCount as EnumCountMacro, EnumIter};
use thiserror::Error;

use crate::{
    codec::{self, CompositeQuantity},
    command::CommandTable,
    error::Result,
    types::State,
};

/// The base address of the first preset registers.
pub const PRESET_BASE: u16 = 0x50;

/// Distance between two preset windows. Fixed by the device's register map.
pub const PRESET_STRIDE: u16 = 0x10;

/// A preset index outside of 0 - 9 was given or reported.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid preset index {0}, expected 0 - 9")]
pub struct InvalidPreset(pub i64);

/// A preset address left the 16-bit register space.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Register {base:#06x} in preset {group} is outside of the register space")]
pub struct AddressOutOfRange {
    pub base: u16,
    pub group: u16,
}

/// This enum represents all possible preset groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumCountMacro)]
#[repr(u16)]
pub enum PresetGroup {
    Group0 = 0x00,
    Group1 = 0x01,
    Group2 = 0x02,
    Group3 = 0x03,
    Group4 = 0x04,
    Group5 = 0x05,
    Group6 = 0x06,
    Group7 = 0x07,
    Group8 = 0x08,
    Group9 = 0x09,
}

impl PresetGroup {
    /// Index of this group, 0 - 9.
    pub fn index(self) -> u16 {
        self as u16
    }

    /// Physical address of a preset-scoped register in this group.
    pub fn address_of(self, base: u16) -> core::result::Result<u16, AddressOutOfRange> {
        preset_address(base, self)
    }
}

impl TryFrom<i64> for PresetGroup {
    type Error = InvalidPreset;

    fn try_from(value: i64) -> core::result::Result<Self, Self::Error> {
        use PresetGroup as PG;
        match value {
            0 => Ok(PG::Group0),
            1 => Ok(PG::Group1),
            2 => Ok(PG::Group2),
            3 => Ok(PG::Group3),
            4 => Ok(PG::Group4),
            5 => Ok(PG::Group5),
            6 => Ok(PG::Group6),
            7 => Ok(PG::Group7),
            8 => Ok(PG::Group8),
            9 => Ok(PG::Group9),
            _ => Err(InvalidPreset(value)),
        }
    }
}

impl TryFrom<i32> for PresetGroup {
    type Error = InvalidPreset;

    fn try_from(value: i32) -> core::result::Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

impl TryFrom<u16> for PresetGroup {
    type Error = InvalidPreset;

    fn try_from(value: u16) -> core::result::Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

impl From<PresetGroup> for u16 {
    fn from(value: PresetGroup) -> Self {
        value as u16
    }
}

/// Return `base + group * PRESET_STRIDE`, failing instead of wrapping past `0xFFFF`.
pub fn preset_address(
    base: u16,
    group: PresetGroup,
) -> core::result::Result<u16, AddressOutOfRange> {
    PRESET_STRIDE
        .checked_mul(group.index())
        .and_then(|offset| base.checked_add(offset))
        .ok_or(AddressOutOfRange {
            base,
            group: group.index(),
        })
}

/// Offsets from the start of a preset window.
#[derive(Debug, Copy, Clone, EnumCountMacro, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u16)]
pub enum PresetOffset {
    /// __R/W__ - Voltage setting.
    VSet = 0x00,
    /// __R/W__ - Current setting.
    ISet = 0x01,
    /// __R/W__ - Input low voltage protection.
    SLvp = 0x02,
    /// __R/W__ - Over voltage protection.
    SOvp = 0x03,
    /// __R/W__ - Over current protection.
    SOcp = 0x04,
    /// __R/W__ - Over power protection.
    SOpp = 0x05,
    /// __R/W__ - Over time protection - hours.
    SOhpH = 0x06,
    /// __R/W__ - Over time protection - minutes.
    SOhpM = 0x07,
    /// __R/W__ - Over capacity protection lower 16 bits.
    SOahL = 0x08,
    /// __R/W__ - Over capacity protection upper 16 bits.
    SOahH = 0x09,
    /// __R/W__ - Over energy protection lower 16 bits.
    SOwhL = 0x0A,
    /// __R/W__ - Over energy protection upper 16 bits.
    SOwhH = 0x0B,
    /// __R/W__ - Internal over temperature protection.
    SOtp = 0x0C,
    /// __R/W__ - Output state when the preset is recalled.
    SIni = 0x0D,
    /// __R/W__ - External over temperature protection.
    SEtp = 0x0E,
}

/// Number of registers in one preset block.
pub const PRESET_LEN: usize = PresetOffset::COUNT;

/// Command names whose decimals scale each scalar slot of a preset block.
const SCALED_SLOTS: [(PresetOffset, &str); 8] = [
    (PresetOffset::VSet, "S-V-SET"),
    (PresetOffset::ISet, "S-I-SET"),
    (PresetOffset::SLvp, "S-LVP"),
    (PresetOffset::SOvp, "S-OVP"),
    (PresetOffset::SOcp, "S-OCP"),
    (PresetOffset::SOpp, "S-OPP"),
    (PresetOffset::SOtp, "S-OTP"),
    (PresetOffset::SEtp, "S-ETP"),
];

/// Contents of one preset group, in engineering units.
///
/// Read and written as a single block, see [`Sk120::read_preset`](crate::psu::Sk120::read_preset).
#[derive(Debug, Clone, PartialEq)]
pub struct PresetSettings {
    /// Output voltage setting in volts.
    pub voltage: f64,
    /// Output current limit in amps.
    pub current: f64,
    /// Input under-voltage protection level in volts.
    pub lvp: f64,
    /// Over-voltage protection level in volts.
    pub ovp: f64,
    /// Over-current protection level in amps.
    pub ocp: f64,
    /// Over-power protection level in watts.
    pub opp: f64,
    /// Output timer. Zero disables.
    pub timer: MinutesDurationU32,
    /// Capacity limit in Ah. Zero disables.
    pub capacity_limit: f64,
    /// Energy limit in Wh. Zero disables.
    pub energy_limit: f64,
    /// Internal over-temperature protection level.
    pub otp: f64,
    /// Output state applied when this preset is recalled.
    pub output_on_recall: State,
    /// External over-temperature protection level. Zero disables.
    pub etp: f64,
}

/// Default protections are essentially disabled.
impl Default for PresetSettings {
    fn default() -> Self {
        PresetSettings {
            voltage: 0.0,
            current: 0.0,
            lvp: 0.0,
            ovp: 36.0,
            ocp: 6.0,
            opp: 120.0,
            timer: MinutesDurationU32::minutes(0),
            capacity_limit: 0.0,
            energy_limit: 0.0,
            otp: 110.0,
            output_on_recall: State::Off,
            etp: 0.0,
        }
    }
}

impl PresetSettings {
    fn slot_value(&self, slot: PresetOffset) -> f64 {
        use PresetOffset as PO;
        match slot {
            PO::VSet => self.voltage,
            PO::ISet => self.current,
            PO::SLvp => self.lvp,
            PO::SOvp => self.ovp,
            PO::SOcp => self.ocp,
            PO::SOpp => self.opp,
            PO::SOtp => self.otp,
            PO::SEtp => self.etp,
            _ => 0.0,
        }
    }

    fn slot_mut(&mut self, slot: PresetOffset) -> Option<&mut f64> {
        use PresetOffset as PO;
        match slot {
            PO::VSet => Some(&mut self.voltage),
            PO::ISet => Some(&mut self.current),
            PO::SLvp => Some(&mut self.lvp),
            PO::SOvp => Some(&mut self.ovp),
            PO::SOcp => Some(&mut self.ocp),
            PO::SOpp => Some(&mut self.opp),
            PO::SOtp => Some(&mut self.otp),
            PO::SEtp => Some(&mut self.etp),
            _ => None,
        }
    }

    /// Generate the register words of a preset block.
    pub fn encode<E: embedded_io::Error>(
        &self,
        table: &CommandTable,
    ) -> Result<[u16; PRESET_LEN], E> {
        use PresetOffset as PO;

        let mut words = [0u16; PRESET_LEN];
        for (slot, name) in SCALED_SLOTS {
            let decimals = table.resolve(name)?.decimals;
            words[slot as usize] = codec::encode_scalar(self.slot_value(slot), decimals)?;
        }

        let minutes = self.timer.to_minutes();
        words[PO::SOhpH as usize] = u16::try_from(minutes / 60).map_err(|_| {
            codec::EncodingError {
                value: f64::from(minutes),
                limit: u32::from(u16::MAX) * 60,
            }
        })?;
        words[PO::SOhpM as usize] = (minutes % 60) as u16;

        let (low, high) = codec::encode_composite(
            self.capacity_limit,
            CompositeQuantity::PRESET_CAPACITY.divisor,
        )?;
        words[PO::SOahL as usize] = low;
        words[PO::SOahH as usize] = high;

        let (low, high) =
            codec::encode_composite(self.energy_limit, CompositeQuantity::PRESET_ENERGY.divisor)?;
        words[PO::SOwhL as usize] = low;
        words[PO::SOwhH as usize] = high;

        words[PO::SIni as usize] = self.output_on_recall as u16;
        Ok(words)
    }

    /// Interpret the register words of a preset block.
    pub fn decode<E: embedded_io::Error>(
        words: &[u16; PRESET_LEN],
        table: &CommandTable,
    ) -> Result<Self, E> {
        use PresetOffset as PO;

        let mut settings = PresetSettings {
            timer: MinutesDurationU32::minutes(
                u32::from(words[PO::SOhpH as usize]) * 60 + u32::from(words[PO::SOhpM as usize]),
            ),
            capacity_limit: codec::decode_composite(
                words[PO::SOahL as usize],
                words[PO::SOahH as usize],
                CompositeQuantity::PRESET_CAPACITY.divisor,
            ),
            energy_limit: codec::decode_composite(
                words[PO::SOwhL as usize],
                words[PO::SOwhH as usize],
                CompositeQuantity::PRESET_ENERGY.divisor,
            ),
            output_on_recall: State::from(words[PO::SIni as usize] != 0),
            ..Default::default()
        };
        for (slot, name) in SCALED_SLOTS {
            let decimals = table.resolve(name)?.decimals;
            if let Some(field) = settings.slot_mut(slot) {
                *field = codec::decode_scalar(words[slot as usize], decimals);
            }
        }
        Ok(settings)
    }
}
