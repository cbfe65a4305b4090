//! This crate provides an interface for communicating with and controlling the Sinilink SK120 programmable power supply.
//!
//! Each device parameter is a named command in a [`CommandTable`](command::CommandTable), loaded from a tab separated
//! descriptor. The built-in SK120 map can be swapped for a custom one, e.g. for a firmware with a different layout.
//! Scaling between raw register words and volts, amps, watts, Ah and Wh is handled for you, including the
//! two register quantities and the ten parameter presets (M0 - M9).
//!
//! Electrical limits of the SK120:
//! * Input voltage: 6 - 36 V
//! * Output current: 0 - 6 A
//! * Output power: 120 W
//!
//! Other XY series models with a compatible register map, such as the XY-SK60 or XY-SK150, should work with a
//! matching [`DeviceLimits`](types::DeviceLimits).
//!
//! It uses Modbus RTU under the hood via [`RtuTransport`](rtu::RtuTransport), and is suitable for interfacing with
//! the PSU over serial/UART or RS485, but not Wi-Fi. Any other [`Transport`](transport::Transport) can be plugged
//! in instead.
//!
//! The serial port used for PSU comms should be configured like so:
//! * Default baud rate: 115200
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//!
//! A [`Sk120`](psu::Sk120) keeps its transaction sequences in order through `&mut self`. To share one device between
//! threads, wrap it in a `Mutex` and hold the lock for each whole call.

pub mod alarm;
pub mod codec;
pub mod command;
pub mod error;
pub mod preset;
pub mod psu;
pub mod rtu;
pub mod snapshot;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock_serial;
#[cfg(test)]
mod mock_transport;
