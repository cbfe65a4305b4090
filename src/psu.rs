use fugit::MinutesDurationU32;
use tracing::{debug, warn};

use crate::{
    alarm::{self, Alarm, AlarmEntry},
    codec::{self, CompositeQuantity},
    command::{CommandTable, Direction},
    error::{CompoundFailure, Error, Operation, Result, Step},
    preset::{self, PRESET_LEN, PresetGroup, PresetSettings},
    snapshot::Snapshot,
    transport::Transport,
    types::{ControlMode, DeviceLimits, OnTime, State},
};

/// Order in which [`Sk120::remove_protection`] writes.
pub const REMOVE_PROTECTION_STEPS: [Step; 7] = [
    Step::Ovp,
    Step::Ocp,
    Step::Opp,
    Step::Oah,
    Step::Owh,
    Step::Etp,
    Step::Timer,
];

/// Order in which [`Sk120::reset_statistics`] writes.
pub const RESET_STATISTICS_STEPS: [Step; 3] = [Step::OnTime, Step::Energy, Step::Capacity];

/// Address, scale and direction of a resolved command.
#[derive(Debug, Clone, Copy)]
struct Register {
    address: u16,
    decimals: u8,
    direction: Direction,
}

/// A single write that is part of a multi-write operation.
#[derive(Debug, Clone, Copy)]
enum Action {
    Scalar(&'static str, f64),
    Composite(CompositeQuantity, f64),
    PresetScalar(&'static str, f64),
    PresetComposite(CompositeQuantity, f64),
    PresetTimer(MinutesDurationU32),
}

/// You can create a Sk120 using any [`Transport`] and a [`CommandTable`].
///
/// For it's methods, we generally use the nomenclature that "set" means to write a configuration and "get" means to read
/// back a configuration value. Where as "read" means to get a measured value.
///
/// Every method takes `&mut self` and issues its transactions one after another, so a single
/// controller never has more than one request on the bus. Share it between a polling loop and
/// interactive writes behind a [`std::sync::Mutex`], held for the whole call.
///
/// Preset-scoped methods take an `Option<PresetGroup>`. With `None` the active preset is read from
/// the device first.
pub struct Sk120<T: Transport> {
    transport: T,
    commands: CommandTable,
    limits: DeviceLimits,
}

impl<T: Transport> Sk120<T> {
    /// Create a new controller with the given transport and command table.
    pub fn new(transport: T, commands: CommandTable) -> Self {
        Self {
            transport,
            commands,
            limits: DeviceLimits::default(),
        }
    }

    /// Replace the electrical maxima used by [`Self::remove_protection`].
    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    pub fn limits(&self) -> DeviceLimits {
        self.limits
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Give back the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    fn register(&self, name: &str) -> Result<Register, T::Error> {
        let command = self.commands.resolve(name)?;
        Ok(Register {
            address: command.address,
            decimals: command.decimals,
            direction: command.direction,
        })
    }

    fn readable(&self, name: &str) -> Result<Register, T::Error> {
        let register = self.register(name)?;
        if !register.direction.readable() {
            return Err(Error::NotReadable(name.to_owned()));
        }
        Ok(register)
    }

    fn writable(&self, name: &str) -> Result<Register, T::Error> {
        let register = self.register(name)?;
        if !register.direction.writable() {
            return Err(Error::NotWritable(name.to_owned()));
        }
        Ok(register)
    }

    fn accessible(&self, name: &str, write: bool) -> Result<Register, T::Error> {
        if write {
            self.writable(name)
        } else {
            self.readable(name)
        }
    }

    fn read_words(&mut self, address: u16, words: &mut [u16]) -> Result<(), T::Error> {
        debug!(address, count = words.len(), "reading registers");
        self.transport
            .read_block(address, words)
            .map_err(|cause| Error::Transport {
                operation: Operation::Read,
                address,
                cause,
            })
    }

    fn read_word(&mut self, address: u16) -> Result<u16, T::Error> {
        let mut word = [0u16];
        self.read_words(address, &mut word)?;
        Ok(word[0])
    }

    fn write_word(&mut self, address: u16, word: u16) -> Result<(), T::Error> {
        debug!(address, word, "writing register");
        self.transport
            .write_single(address, word)
            .map_err(|cause| Error::Transport {
                operation: Operation::Write,
                address,
                cause,
            })
    }

    fn write_words(&mut self, address: u16, words: &[u16]) -> Result<(), T::Error> {
        debug!(address, words = ?words, "writing registers");
        self.transport
            .write_block(address, words)
            .map_err(|cause| Error::Transport {
                operation: Operation::WriteBlock,
                address,
                cause,
            })
    }

    /// Read registers which may or may not be neighbours. Neighbours are read in one transaction.
    fn read_group<const N: usize>(&mut self, addresses: [u16; N]) -> Result<[u16; N], T::Error> {
        let mut words = [0u16; N];
        if is_contiguous(&addresses) {
            self.read_words(addresses[0], &mut words)?;
        } else {
            for (word, address) in words.iter_mut().zip(addresses) {
                *word = self.read_word(address)?;
            }
        }
        Ok(words)
    }

    /// Write two registers that only make sense together.
    ///
    /// The firmware may keep only the last of two single writes to such a pair, so a block write
    /// is used when possible. Otherwise both words are written and read back.
    fn write_pair(&mut self, addresses: [u16; 2], words: [u16; 2]) -> Result<(), T::Error> {
        if is_contiguous(&addresses) && self.transport.supports_block_write() {
            return self.write_words(addresses[0], &words);
        }

        self.write_word(addresses[1], words[1])?;
        self.write_word(addresses[0], words[0])?;
        let observed = [self.read_word(addresses[0])?, self.read_word(addresses[1])?];
        if observed != words {
            warn!(address = addresses[0], expected = ?words, ?observed, "split register write was torn");
            return Err(Error::TornComposite {
                address: addresses[0],
                expected: words,
                observed,
            });
        }
        Ok(())
    }

    /// Read a register and scale it. `decimals` is the number of implied decimal places.
    pub fn read_register(&mut self, address: u16, decimals: u8) -> Result<f64, T::Error> {
        let raw = self.read_word(address)?;
        Ok(codec::decode_scalar(raw, decimals))
    }

    /// Scale a value and write it to a register.
    pub fn write_register(&mut self, address: u16, value: f64, decimals: u8) -> Result<(), T::Error> {
        let raw = codec::encode_scalar(value, decimals)?;
        self.write_word(address, raw)
    }

    fn get_raw(&mut self, name: &str) -> Result<u16, T::Error> {
        let register = self.readable(name)?;
        self.read_word(register.address)
    }

    fn set_raw(&mut self, name: &str, word: u16) -> Result<(), T::Error> {
        let register = self.writable(name)?;
        self.write_word(register.address, word)
    }

    /// Read a command's register in engineering units.
    pub fn get_scalar(&mut self, name: &str) -> Result<f64, T::Error> {
        let register = self.readable(name)?;
        self.read_register(register.address, register.decimals)
    }

    /// Write a command's register in engineering units.
    pub fn set_scalar(&mut self, name: &str, value: f64) -> Result<(), T::Error> {
        let register = self.writable(name)?;
        self.write_register(register.address, value, register.decimals)
    }

    /// Read every readable command, in table order.
    pub fn read_parameters(&mut self) -> Result<Vec<(String, f64)>, T::Error> {
        let readable: Vec<(String, u16, u8)> = self
            .commands
            .iter()
            .filter(|command| command.direction.readable())
            .map(|command| (command.name.clone(), command.address, command.decimals))
            .collect();

        let mut parameters = Vec::with_capacity(readable.len());
        for (name, address, decimals) in readable {
            let value = self.read_register(address, decimals)?;
            parameters.push((name, value));
        }
        Ok(parameters)
    }

    /// Activate preset by index. The device loads the preset's settings.
    pub fn set_active_preset(&mut self, group: PresetGroup) -> Result<(), T::Error> {
        self.set_raw("EXTRACT-M", group.into())
    }

    /// Get the currently active preset.
    pub fn get_active_preset(&mut self) -> Result<PresetGroup, T::Error> {
        let value = self.get_raw("EXTRACT-M")?;
        Ok(PresetGroup::try_from(value)?)
    }

    fn preset_group(&mut self, preset: Option<PresetGroup>) -> Result<PresetGroup, T::Error> {
        match preset {
            Some(group) => Ok(group),
            None => self.get_active_preset(),
        }
    }

    /// Physical address of a preset-scoped register. `None` targets the active preset.
    pub fn resolve_preset_address(
        &mut self,
        base: u16,
        preset: Option<PresetGroup>,
    ) -> Result<u16, T::Error> {
        let group = self.preset_group(preset)?;
        Ok(preset::preset_address(base, group)?)
    }

    /// Read a preset-scoped command in engineering units.
    pub fn get_preset_scalar(
        &mut self,
        name: &str,
        preset: Option<PresetGroup>,
    ) -> Result<f64, T::Error> {
        let register = self.readable(name)?;
        let address = self.resolve_preset_address(register.address, preset)?;
        self.read_register(address, register.decimals)
    }

    /// Write a preset-scoped command in engineering units.
    pub fn set_preset_scalar(
        &mut self,
        name: &str,
        value: f64,
        preset: Option<PresetGroup>,
    ) -> Result<(), T::Error> {
        let register = self.writable(name)?;
        let address = self.resolve_preset_address(register.address, preset)?;
        self.write_register(address, value, register.decimals)
    }

    fn composite_addresses(
        &mut self,
        quantity: CompositeQuantity,
        preset: Option<Option<PresetGroup>>,
        write: bool,
    ) -> Result<[u16; 2], T::Error> {
        let low = self.accessible(quantity.low, write)?.address;
        let high = self.accessible(quantity.high, write)?.address;
        match preset {
            None => Ok([low, high]),
            Some(preset) => {
                // Look the active preset up once so both halves land in the same group.
                let group = self.preset_group(preset)?;
                Ok([
                    preset::preset_address(low, group)?,
                    preset::preset_address(high, group)?,
                ])
            }
        }
    }

    /// Read a two register quantity.
    pub fn get_composite(&mut self, quantity: CompositeQuantity) -> Result<f64, T::Error> {
        let addresses = self.composite_addresses(quantity, None, false)?;
        let [low, high] = self.read_group(addresses)?;
        Ok(codec::decode_composite(low, high, quantity.divisor))
    }

    /// Write a two register quantity.
    pub fn set_composite(&mut self, quantity: CompositeQuantity, value: f64) -> Result<(), T::Error> {
        let (low, high) = codec::encode_composite(value, quantity.divisor)?;
        let addresses = self.composite_addresses(quantity, None, true)?;
        self.write_pair(addresses, [low, high])
    }

    /// Read a two register quantity stored in a preset.
    pub fn get_preset_composite(
        &mut self,
        quantity: CompositeQuantity,
        preset: Option<PresetGroup>,
    ) -> Result<f64, T::Error> {
        let addresses = self.composite_addresses(quantity, Some(preset), false)?;
        let [low, high] = self.read_group(addresses)?;
        Ok(codec::decode_composite(low, high, quantity.divisor))
    }

    /// Write a two register quantity stored in a preset.
    pub fn set_preset_composite(
        &mut self,
        quantity: CompositeQuantity,
        value: f64,
        preset: Option<PresetGroup>,
    ) -> Result<(), T::Error> {
        let (low, high) = codec::encode_composite(value, quantity.divisor)?;
        let addresses = self.composite_addresses(quantity, Some(preset), true)?;
        self.write_pair(addresses, [low, high])
    }

    /// Set the output target voltage in volts.
    pub fn set_voltage_setpoint(&mut self, volts: f64) -> Result<(), T::Error> {
        self.set_scalar("V-SET", volts)
    }

    /// Get the output target voltage in volts.
    pub fn get_voltage_setpoint(&mut self) -> Result<f64, T::Error> {
        self.get_scalar("V-SET")
    }

    /// Set the output current limit in amps.
    pub fn set_current_setpoint(&mut self, amps: f64) -> Result<(), T::Error> {
        self.set_scalar("I-SET", amps)
    }

    /// Get the output current limit in amps.
    pub fn get_current_setpoint(&mut self) -> Result<f64, T::Error> {
        self.get_scalar("I-SET")
    }

    /// Return the measured output voltage in volts.
    pub fn read_output_voltage(&mut self) -> Result<f64, T::Error> {
        self.get_scalar("VOUT")
    }

    /// Return the measured output current in amps.
    pub fn read_output_current(&mut self) -> Result<f64, T::Error> {
        self.get_scalar("IOUT")
    }

    /// Return the measured output power in watts.
    pub fn read_power(&mut self) -> Result<f64, T::Error> {
        self.get_scalar("POWER")
    }

    /// Return the measured supply input voltage in volts.
    pub fn read_input_voltage(&mut self) -> Result<f64, T::Error> {
        self.get_scalar("UIN")
    }

    /// Return the measured internal temperature. Unit depends on the device setting.
    pub fn read_temperature_internal(&mut self) -> Result<f64, T::Error> {
        self.get_scalar("T_IN")
    }

    /// Return the external temperature probe reading.
    pub fn read_temperature_external(&mut self) -> Result<f64, T::Error> {
        self.get_scalar("T_EX")
    }

    /// Return the accumulated output capacity in Ah.
    pub fn read_capacity(&mut self) -> Result<f64, T::Error> {
        self.get_composite(CompositeQuantity::CAPACITY)
    }

    /// Overwrite the accumulated output capacity, in Ah.
    pub fn set_capacity(&mut self, amp_hours: f64) -> Result<(), T::Error> {
        self.set_composite(CompositeQuantity::CAPACITY, amp_hours)
    }

    /// Return the accumulated output energy in Wh.
    pub fn read_energy(&mut self) -> Result<f64, T::Error> {
        self.get_composite(CompositeQuantity::ENERGY)
    }

    /// Overwrite the accumulated output energy, in Wh.
    pub fn set_energy(&mut self, watt_hours: f64) -> Result<(), T::Error> {
        self.set_composite(CompositeQuantity::ENERGY, watt_hours)
    }

    /// Return how long the output has been enabled.
    pub fn read_on_time(&mut self) -> Result<OnTime, T::Error> {
        let addresses = [
            self.readable("OUT_H")?.address,
            self.readable("OUT_M")?.address,
            self.readable("OUT_S")?.address,
        ];
        let [hours, minutes, seconds] = self.read_group(addresses)?;
        Ok(OnTime::new(hours, minutes, seconds))
    }

    /// Get the currently active control mode. (CV or CC.)
    pub fn get_control_mode(&mut self) -> Result<ControlMode, T::Error> {
        Ok(ControlMode::from(self.get_raw("CVCC")?))
    }

    /// Enable/disable the key lock.
    pub fn set_lock(&mut self, state: impl Into<State>) -> Result<(), T::Error> {
        self.set_raw("LOCK", state.into() as u16)
    }

    /// Get the current state of the key lock.
    pub fn get_lock(&mut self) -> Result<State, T::Error> {
        Ok(State::from(self.get_raw("LOCK")? != 0))
    }

    /// Enable/disable the beeper.
    pub fn set_beeper(&mut self, state: impl Into<State>) -> Result<(), T::Error> {
        self.set_raw("BUZZER", state.into() as u16)
    }

    /// Get the current beeper enable state.
    pub fn get_beeper(&mut self) -> Result<State, T::Error> {
        Ok(State::from(self.get_raw("BUZZER")? != 0))
    }

    /// Enable or disable constant power mode.
    pub fn set_constant_power_enabled(&mut self, state: impl Into<State>) -> Result<(), T::Error> {
        self.set_raw("CW-SW", state.into() as u16)
    }

    /// Get whether constant power mode is enabled.
    pub fn get_constant_power_enabled(&mut self) -> Result<State, T::Error> {
        Ok(State::from(self.get_raw("CW-SW")? != 0))
    }

    /// Set the constant power level in watts. Can be set without enabling constant power mode.
    pub fn set_constant_power(&mut self, watts: f64) -> Result<(), T::Error> {
        self.set_scalar("CW", watts)
    }

    /// Get the constant power level in watts.
    pub fn get_constant_power(&mut self) -> Result<f64, T::Error> {
        self.get_scalar("CW")
    }

    /// Output switches off when the current falls below this, in amps. Zero disables.
    pub fn set_battery_full_current(&mut self, amps: f64) -> Result<(), T::Error> {
        self.set_scalar("BAT-FUL", amps)
    }

    /// Get the battery-full cut off current in amps.
    pub fn get_battery_full_current(&mut self) -> Result<f64, T::Error> {
        self.get_scalar("BAT-FUL")
    }

    /// Enable/disable the output.
    pub fn set_output_state(&mut self, state: impl Into<State>) -> Result<(), T::Error> {
        self.set_raw("ONOFF", state.into() as u16)
    }

    /// Read whether the output is enabled or disabled.
    pub fn get_output_state(&mut self) -> Result<State, T::Error> {
        Ok(State::from(self.get_raw("ONOFF")? != 0))
    }

    /// True if the output is enabled.
    pub fn is_on(&mut self) -> Result<bool, T::Error> {
        Ok(self.get_output_state()?.into())
    }

    /// Enable the output.
    pub fn on(&mut self) -> Result<(), T::Error> {
        self.set_output_state(State::On)
    }

    /// Disable the output.
    pub fn off(&mut self) -> Result<(), T::Error> {
        self.set_output_state(State::Off)
    }

    /// Invert the output state and return the new state.
    ///
    /// One read followed by one write. Not atomic with respect to other callers of the same device.
    pub fn toggle(&mut self) -> Result<State, T::Error> {
        let state = self.get_output_state()?.toggled();
        self.set_output_state(state)?;
        Ok(state)
    }

    /// Return the protection status code. With `clear`, the latched status is reset to 0 after it
    /// was read, so the returned value is the one present at call time.
    pub fn status(&mut self, clear: bool) -> Result<u16, T::Error> {
        let code = self.get_raw("PROTECT")?;
        if clear {
            self.set_raw("PROTECT", 0)?;
        }
        Ok(code)
    }

    /// Short code and description of the current status.
    pub fn status_description(&mut self) -> Result<&'static AlarmEntry, T::Error> {
        let code = self.status(false)?;
        Ok(alarm::describe(code)?)
    }

    /// Return which protection has tripped, if any.
    pub fn get_alarm(&mut self) -> Result<Alarm, T::Error> {
        let code = self.status(false)?;
        Ok(Alarm::try_from(code)?)
    }

    /// Read the whole monitoring window in one transaction.
    pub fn read_snapshot(&mut self) -> Result<Snapshot, T::Error> {
        let mut words = [0u16; Snapshot::LEN];
        self.read_words(Snapshot::ADDRESS, &mut words)?;
        Ok(Snapshot::decode(&words, &self.commands)?)
    }

    /// Set the voltage setting stored in a preset, in volts.
    pub fn set_preset_voltage(&mut self, volts: f64, preset: Option<PresetGroup>) -> Result<(), T::Error> {
        self.set_preset_scalar("S-V-SET", volts, preset)
    }

    /// Get the voltage setting stored in a preset, in volts.
    pub fn get_preset_voltage(&mut self, preset: Option<PresetGroup>) -> Result<f64, T::Error> {
        self.get_preset_scalar("S-V-SET", preset)
    }

    /// Set the current limit stored in a preset, in amps.
    pub fn set_preset_current(&mut self, amps: f64, preset: Option<PresetGroup>) -> Result<(), T::Error> {
        self.set_preset_scalar("S-I-SET", amps, preset)
    }

    /// Get the current limit stored in a preset, in amps.
    pub fn get_preset_current(&mut self, preset: Option<PresetGroup>) -> Result<f64, T::Error> {
        self.get_preset_scalar("S-I-SET", preset)
    }

    /// Set the input under-voltage protection level, in volts.
    pub fn set_lvp(&mut self, volts: f64, preset: Option<PresetGroup>) -> Result<(), T::Error> {
        self.set_preset_scalar("S-LVP", volts, preset)
    }

    pub fn get_lvp(&mut self, preset: Option<PresetGroup>) -> Result<f64, T::Error> {
        self.get_preset_scalar("S-LVP", preset)
    }

    /// Set the over-voltage protection level, in volts.
    pub fn set_ovp(&mut self, volts: f64, preset: Option<PresetGroup>) -> Result<(), T::Error> {
        self.set_preset_scalar("S-OVP", volts, preset)
    }

    pub fn get_ovp(&mut self, preset: Option<PresetGroup>) -> Result<f64, T::Error> {
        self.get_preset_scalar("S-OVP", preset)
    }

    /// Set the over-current protection level, in amps.
    pub fn set_ocp(&mut self, amps: f64, preset: Option<PresetGroup>) -> Result<(), T::Error> {
        self.set_preset_scalar("S-OCP", amps, preset)
    }

    pub fn get_ocp(&mut self, preset: Option<PresetGroup>) -> Result<f64, T::Error> {
        self.get_preset_scalar("S-OCP", preset)
    }

    /// Set the over-power protection level, in watts.
    pub fn set_opp(&mut self, watts: f64, preset: Option<PresetGroup>) -> Result<(), T::Error> {
        self.set_preset_scalar("S-OPP", watts, preset)
    }

    pub fn get_opp(&mut self, preset: Option<PresetGroup>) -> Result<f64, T::Error> {
        self.get_preset_scalar("S-OPP", preset)
    }

    /// Set the internal over-temperature protection level.
    pub fn set_otp(&mut self, degrees: f64, preset: Option<PresetGroup>) -> Result<(), T::Error> {
        self.set_preset_scalar("S-OTP", degrees, preset)
    }

    pub fn get_otp(&mut self, preset: Option<PresetGroup>) -> Result<f64, T::Error> {
        self.get_preset_scalar("S-OTP", preset)
    }

    /// Set the external over-temperature protection level. Zero disables.
    pub fn set_etp(&mut self, degrees: f64, preset: Option<PresetGroup>) -> Result<(), T::Error> {
        self.set_preset_scalar("S-ETP", degrees, preset)
    }

    pub fn get_etp(&mut self, preset: Option<PresetGroup>) -> Result<f64, T::Error> {
        self.get_preset_scalar("S-ETP", preset)
    }

    /// Set the capacity after which the output switches off, in Ah. Zero disables.
    pub fn set_capacity_limit(&mut self, amp_hours: f64, preset: Option<PresetGroup>) -> Result<(), T::Error> {
        self.set_preset_composite(CompositeQuantity::PRESET_CAPACITY, amp_hours, preset)
    }

    pub fn get_capacity_limit(&mut self, preset: Option<PresetGroup>) -> Result<f64, T::Error> {
        self.get_preset_composite(CompositeQuantity::PRESET_CAPACITY, preset)
    }

    /// Set the energy after which the output switches off, in Wh. Zero disables.
    pub fn set_energy_limit(&mut self, watt_hours: f64, preset: Option<PresetGroup>) -> Result<(), T::Error> {
        self.set_preset_composite(CompositeQuantity::PRESET_ENERGY, watt_hours, preset)
    }

    pub fn get_energy_limit(&mut self, preset: Option<PresetGroup>) -> Result<f64, T::Error> {
        self.get_preset_composite(CompositeQuantity::PRESET_ENERGY, preset)
    }

    fn timer_addresses(&mut self, preset: Option<PresetGroup>, write: bool) -> Result<[u16; 2], T::Error> {
        let hours = self.accessible("S-OHP_H", write)?;
        let minutes = self.accessible("S-OHP_M", write)?;
        let group = self.preset_group(preset)?;
        Ok([
            preset::preset_address(hours.address, group)?,
            preset::preset_address(minutes.address, group)?,
        ])
    }

    /// Set the time after which the output switches off. Zero disables.
    pub fn set_preset_timer(
        &mut self,
        timer: MinutesDurationU32,
        preset: Option<PresetGroup>,
    ) -> Result<(), T::Error> {
        let minutes = timer.to_minutes();
        let hours = u16::try_from(minutes / 60).map_err(|_| codec::EncodingError {
            value: f64::from(minutes),
            limit: u32::from(u16::MAX) * 60,
        })?;
        let addresses = self.timer_addresses(preset, true)?;
        self.write_pair(addresses, [hours, (minutes % 60) as u16])
    }

    /// Get the output timer limit.
    pub fn get_preset_timer(&mut self, preset: Option<PresetGroup>) -> Result<MinutesDurationU32, T::Error> {
        let addresses = self.timer_addresses(preset, false)?;
        let [hours, minutes] = self.read_group(addresses)?;
        Ok(MinutesDurationU32::minutes(
            u32::from(hours) * 60 + u32::from(minutes),
        ))
    }

    fn preset_block_address(&mut self, preset: Option<PresetGroup>) -> Result<u16, T::Error> {
        let base = self.commands.resolve("S-V-SET")?.address;
        self.resolve_preset_address(base, preset)
    }

    /// Read all settings of a preset in one transaction.
    pub fn read_preset(&mut self, preset: Option<PresetGroup>) -> Result<PresetSettings, T::Error> {
        let address = self.preset_block_address(preset)?;
        let mut words = [0u16; PRESET_LEN];
        self.read_words(address, &mut words)?;
        PresetSettings::decode(&words, &self.commands)
    }

    /// Write all settings of a preset in one transaction.
    pub fn write_preset(
        &mut self,
        settings: &PresetSettings,
        preset: Option<PresetGroup>,
    ) -> Result<(), T::Error> {
        let words = settings.encode(&self.commands)?;
        let address = self.preset_block_address(preset)?;
        self.write_words(address, &words)
    }

    fn apply(&mut self, action: Action, preset: Option<PresetGroup>) -> Result<(), T::Error> {
        match action {
            Action::Scalar(name, value) => self.set_scalar(name, value),
            Action::Composite(quantity, value) => self.set_composite(quantity, value),
            Action::PresetScalar(name, value) => self.set_preset_scalar(name, value, preset),
            Action::PresetComposite(quantity, value) => {
                self.set_preset_composite(quantity, value, preset)
            }
            Action::PresetTimer(timer) => self.set_preset_timer(timer, preset),
        }
    }

    /// Apply the writes in order, stopping at the first failure.
    fn run_steps(
        &mut self,
        operation: &'static str,
        plan: &[(Step, Action)],
        preset: Option<PresetGroup>,
    ) -> Result<(), T::Error> {
        let mut completed = Vec::with_capacity(plan.len());
        for &(step, action) in plan {
            if let Err(cause) = self.apply(action, preset) {
                warn!(operation, %step, ?completed, error = %cause, "stopped part way, device left in a mixed state");
                return Err(Error::Compound(CompoundFailure {
                    operation,
                    completed,
                    failed: step,
                    cause: Box::new(cause),
                }));
            }
            completed.push(step);
        }
        debug!(operation, steps = completed.len(), "all steps applied");
        Ok(())
    }

    /// Zero the on-time, energy and capacity counters.
    ///
    /// The counters are listed as read-only by the manufacturer, but writing zero clears them.
    pub fn reset_statistics(&mut self) -> Result<(), T::Error> {
        let plan = [
            (Step::OnTime, Action::Scalar("OUT_H", 0.0)),
            (Step::Energy, Action::Composite(CompositeQuantity::ENERGY, 0.0)),
            (Step::Capacity, Action::Composite(CompositeQuantity::CAPACITY, 0.0)),
        ];
        self.run_steps("reset_statistics", &plan, None)
    }

    /// Reset all output protections of the active preset to their most permissive values.
    ///
    /// Voltage, current and power limits go to the [`DeviceLimits`], the capacity, energy,
    /// external temperature and timer limits are disabled. Input under-voltage and internal
    /// over-temperature protection are left untouched.
    pub fn remove_protection(&mut self) -> Result<(), T::Error> {
        let preset = Some(self.get_active_preset()?);
        let limits = self.limits;
        let plan = [
            (Step::Ovp, Action::PresetScalar("S-OVP", limits.max_input_voltage)),
            (Step::Ocp, Action::PresetScalar("S-OCP", limits.max_current)),
            (Step::Opp, Action::PresetScalar("S-OPP", limits.max_power)),
            (Step::Oah, Action::PresetComposite(CompositeQuantity::PRESET_CAPACITY, 0.0)),
            (Step::Owh, Action::PresetComposite(CompositeQuantity::PRESET_ENERGY, 0.0)),
            (Step::Etp, Action::PresetScalar("S-ETP", 0.0)),
            (Step::Timer, Action::PresetTimer(MinutesDurationU32::minutes(0))),
        ];
        self.run_steps("remove_protection", &plan, preset)
    }
}

fn is_contiguous(addresses: &[u16]) -> bool {
    addresses
        .windows(2)
        .all(|pair| pair[0].checked_add(1) == Some(pair[1]))
}
