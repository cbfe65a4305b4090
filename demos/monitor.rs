use std::env;

use inquire::Select;
use serialport::SerialPort;
use sinilink_sk120::{
    command::CommandTable,
    preset::PresetGroup,
    psu::Sk120,
    rtu::RtuTransport,
};
use tracing_subscriber::EnvFilter;

// Configuration constants - adjust these for your setup
const BAUD_RATE: u32 = 115200;
// The PSU can take a while to respond, a reasonably large time out is required.
const SERIAL_TIMEOUT_MS: u64 = 300;
const MODBUS_UNIT_ID: u8 = 0x01;
const OUTPUT_VOLTAGE: f64 = 5.5;
const CURRENT_LIMIT: f64 = 0.1;
const STABILIZATION_DELAY_MS: u64 = 1000;

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

fn main() {
    // RUST_LOG=sinilink_sk120=trace shows every frame on the wire.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {}", port_name);

    let port = serialport::new(&port_name, BAUD_RATE)
        .timeout(std::time::Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open()
        .expect("Failed to open serial port");

    let transport: RtuTransport<PortWrapper> = RtuTransport::new(PortWrapper(port), MODBUS_UNIT_ID);
    let commands = CommandTable::sk120().expect("Built-in command table is valid");
    let mut psu = Sk120::new(transport, commands);

    // One block read gives everything on the display
    let snapshot = psu.read_snapshot().unwrap();
    println!("{:#?}", snapshot);
    match snapshot.alarm() {
        Ok(entry) if entry.short_code.is_empty() => println!("No protection tripped"),
        Ok(entry) => println!("Protection tripped: {} ({})", entry.short_code, entry.description),
        Err(err) => println!("{}", err),
    }

    psu.set_voltage_setpoint(OUTPUT_VOLTAGE).unwrap();
    println!("Set output voltage to {}V", OUTPUT_VOLTAGE);

    psu.set_current_setpoint(CURRENT_LIMIT).unwrap();
    println!("Set current limit to {}A", CURRENT_LIMIT);

    psu.on().unwrap();
    println!("Output enabled");

    std::thread::sleep(std::time::Duration::from_millis(STABILIZATION_DELAY_MS));

    println!(
        "Measured output: {:.2}V {:.3}A {:.1}W",
        psu.read_output_voltage().unwrap(),
        psu.read_output_current().unwrap(),
        psu.read_power().unwrap()
    );

    println!("\n--- Active preset ---");
    let group = psu.get_active_preset().unwrap();
    println!("{:?}", group);
    println!("{:#?}", psu.read_preset(Some(group)).unwrap());

    println!("\n--- Preset M1 ---");
    println!("{:#?}", psu.read_preset(Some(PresetGroup::Group1)).unwrap());

    psu.off().unwrap();
    println!("\nOutput disabled, status code {}", psu.status(false).unwrap());
}
