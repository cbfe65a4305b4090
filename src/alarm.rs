//! Meaning of the values of the `PROTECT` status register.

use strum_macros::EnumIter;
use thiserror::Error;

/// The device reported a status code we have no description for.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Unknown status code {0}")]
pub struct UnknownStatusCode(pub u16);

/// Short code and human readable description of a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmEntry {
    pub short_code: &'static str,
    pub description: &'static str,
}

/// Ordered by the value the device reports in `PROTECT`, not alphabetically.
///
/// The wording follows the protection each code belongs to and the `S-*` preset register names.
/// Some host tools label these differently: 5 as "maximum time", 6 as "maximum output power",
/// 10 as "maximum input power" and 11 as `ETO`. Those labels do not match the limits that trip
/// the codes, so they are not used here.
pub static ALARM_CATALOG: [AlarmEntry; 12] = [
    AlarmEntry { short_code: "", description: "normal operation" },
    AlarmEntry { short_code: "OVP", description: "over voltage" },
    AlarmEntry { short_code: "OCP", description: "over current" },
    AlarmEntry { short_code: "OPP", description: "over power" },
    AlarmEntry { short_code: "LVP", description: "input under voltage" },
    AlarmEntry { short_code: "OAH", description: "maximum output capacity" },
    AlarmEntry { short_code: "OHP", description: "maximum output time" },
    AlarmEntry { short_code: "OTP", description: "maximum internal temperature" },
    AlarmEntry { short_code: "OEP", description: "no load" },
    AlarmEntry { short_code: "OWH", description: "maximum energy passed" },
    AlarmEntry { short_code: "ICP", description: "maximum input current" },
    AlarmEntry { short_code: "ETP", description: "maximum external temperature" },
];

/// Look up a status code.
pub fn describe(code: u16) -> Result<&'static AlarmEntry, UnknownStatusCode> {
    ALARM_CATALOG
        .get(usize::from(code))
        .ok_or(UnknownStatusCode(code))
}

/// "Protection status register".
#[derive(Debug, EnumIter, PartialEq, Eq, Clone, Copy)]
#[repr(u16)]
pub enum Alarm {
    /// 0: No protection has tripped.
    None = 0x00,
    /// 1: OVP overvoltage protection.
    OverVoltage = 0x01,
    /// 2: OCP overcurrent protection.
    OverCurrent = 0x02,
    /// 3: OPP, over-power protection.
    OverPower = 0x03,
    /// 4: LVP input undervoltage protection.
    InputUnderVoltage = 0x04,
    /// 5: OAH maximum output capacity.
    MaximumOutputCapacity = 0x05,
    /// 6: OHP maximum output time.
    MaximumOutputTime = 0x06,
    /// 7: OTP over-temperature protection.
    OverTemperature = 0x07,
    /// 8: OEP, with no output protection.
    NoOutput = 0x08,
    /// 9: OWH maximum energy output.
    MaximumEnergyOutput = 0x09,
    /// 10: ICP maximum input current protection.
    MaximumInputCurrent = 0x0A,
    /// 11: ETP, external temperature protection.
    ExternalTemperature = 0x0B,
}

impl Alarm {
    /// Catalog entry for this alarm.
    pub fn entry(self) -> &'static AlarmEntry {
        &ALARM_CATALOG[self as usize]
    }

    pub fn is_fault(self) -> bool {
        self != Alarm::None
    }
}

impl TryFrom<u16> for Alarm {
    type Error = UnknownStatusCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        use Alarm as A;
        match value {
            0x00 => Ok(A::None),
            0x01 => Ok(A::OverVoltage),
            0x02 => Ok(A::OverCurrent),
            0x03 => Ok(A::OverPower),
            0x04 => Ok(A::InputUnderVoltage),
            0x05 => Ok(A::MaximumOutputCapacity),
            0x06 => Ok(A::MaximumOutputTime),
            0x07 => Ok(A::OverTemperature),
            0x08 => Ok(A::NoOutput),
            0x09 => Ok(A::MaximumEnergyOutput),
            0x0A => Ok(A::MaximumInputCurrent),
            0x0B => Ok(A::ExternalTemperature),
            _ => Err(UnknownStatusCode(value)),
        }
    }
}
