//! Modbus RTU implementation of [`Transport`] over any serial interface implementing
//! [`embedded_io::Read`] & [`embedded_io::Write`].
//!
//! The serial port used for PSU comms should be configured like so:
//! * Default baud rate: 115200
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//!
//! The PSU can take a while to respond, a read timeout of a few hundred milliseconds on the
//! port is recommended.

use embedded_io::Error as _;
use thiserror::Error;
use tracing::trace;

use crate::transport::Transport;

/// Size of an exception response: unit id, function, exception code and CRC.
const EXCEPTION_LEN: usize = 5;

/// Errors from the RTU transport.
#[derive(Error, Debug)]
pub enum RtuError<I: embedded_io::Error> {
    #[error("Serial communication error: {0:?}")]
    Serial(I),
    #[error("Modbus protocol error: {0:?}")]
    Modbus(rmodbus::ErrorKind),
    #[error("Communication timeout with a partial response")]
    Timeout,
    #[error("Invalid response received")]
    InvalidResponse,
    #[error("Frame does not fit in the buffer")]
    BufferOverflow,
}

impl<I: embedded_io::Error> From<rmodbus::ErrorKind> for RtuError<I> {
    fn from(err: rmodbus::ErrorKind) -> Self {
        RtuError::Modbus(err)
    }
}

impl<I: embedded_io::Error> embedded_io::Error for RtuError<I> {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            RtuError::Serial(err) => err.kind(),
            RtuError::Timeout => embedded_io::ErrorKind::TimedOut,
            RtuError::Modbus(_) | RtuError::InvalidResponse => embedded_io::ErrorKind::InvalidData,
            RtuError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
        }
    }
}

/// Modbus RTU client for one unit on a serial line.
///
/// `L` is the capacity of the frame buffers in bytes.
pub struct RtuTransport<S: embedded_io::Read + embedded_io::Write, const L: usize = 128> {
    interface: S,
    /// Default for PSU is 0x01.
    unit_id: u8,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> RtuTransport<S, L> {
    /// Create a new transport with the given interface and unit ID.
    pub fn new(interface: S, unit_id: u8) -> Self {
        Self { interface, unit_id }
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    /// Give back the serial interface.
    pub fn into_inner(self) -> S {
        self.interface
    }

    fn request(&self) -> rmodbus::client::ModbusRequest {
        rmodbus::client::ModbusRequest::new(self.unit_id, rmodbus::ModbusProto::Rtu)
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), RtuError<S::Error>> {
        trace!(unit = self.unit_id, frame = ?frame, "sending frame");
        self.interface.write_all(frame).map_err(RtuError::Serial)
    }

    /// Keep reading until a full response of `expected` bytes, or an exception response, arrived.
    fn receive(
        &mut self,
        expected: usize,
        buff: &mut heapless::Vec<u8, L>,
    ) -> Result<(), RtuError<S::Error>> {
        buff.clear();
        let mut temp_buf = [0u8; 8];
        loop {
            match self.interface.read(&mut temp_buf) {
                Ok(0) => return Err(RtuError::InvalidResponse),
                Ok(bytes_read) => {
                    buff.extend_from_slice(&temp_buf[..bytes_read])
                        .map_err(|_| RtuError::BufferOverflow)?;
                    let exception = buff.len() >= EXCEPTION_LEN && buff[1] & 0x80 != 0;
                    if buff.len() >= expected || exception {
                        break;
                    }
                }
                Err(e) if buff.is_empty() => return Err(RtuError::Serial(e)),
                Err(e) if matches!(e.kind(), embedded_io::ErrorKind::TimedOut) => {
                    return Err(RtuError::Timeout);
                }
                Err(e) => return Err(RtuError::Serial(e)),
            }
        }
        trace!(unit = self.unit_id, frame = ?buff.as_slice(), "received frame");
        Ok(())
    }
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> Transport for RtuTransport<S, L> {
    type Error = RtuError<S::Error>;

    fn read_block(&mut self, address: u16, words: &mut [u16]) -> Result<(), Self::Error> {
        let count = u16::try_from(words.len()).map_err(|_| RtuError::BufferOverflow)?;
        let mut buff: heapless::Vec<u8, L> = heapless::Vec::new();
        let mut req = self.request();
        req.generate_get_holdings(address, count, &mut buff)?;
        self.send(&buff)?;

        // unit id + function + byte count + data + CRC
        self.receive(5 + words.len() * 2, &mut buff)?;

        let mut parsed: heapless::Vec<u16, L> = heapless::Vec::new();
        req.parse_u16(&buff, &mut parsed)?;
        if parsed.len() != words.len() {
            return Err(RtuError::InvalidResponse);
        }
        words.copy_from_slice(&parsed);
        Ok(())
    }

    fn write_single(&mut self, address: u16, word: u16) -> Result<(), Self::Error> {
        let mut buff: heapless::Vec<u8, L> = heapless::Vec::new();
        let mut req = self.request();
        req.generate_set_holding(address, word, &mut buff)?;
        self.send(&buff)?;

        // The device echoes the request.
        self.receive(8, &mut buff)?;
        req.parse_ok(&buff)?;
        Ok(())
    }

    fn write_block(&mut self, address: u16, words: &[u16]) -> Result<(), Self::Error> {
        let mut buff: heapless::Vec<u8, L> = heapless::Vec::new();
        let mut req = self.request();
        req.generate_set_holdings_bulk(address, words, &mut buff)?;
        self.send(&buff)?;

        // unit id + function + address + count + CRC
        self.receive(8, &mut buff)?;
        req.parse_ok(&buff)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_serial::MockSerial;
    use embedded_io::Error as _;

    #[test]
    fn test_read_block() {
        let mut mock_serial = MockSerial::new();
        // Registers 0x00 and 0x01 holding 1234 and 100.
        let response_data = [0x01, 0x03, 0x04, 0x04, 0xD2, 0x00, 0x64, 0x5A, 0xD1];
        mock_serial.set_read_data(&response_data).unwrap();

        let mut rtu: RtuTransport<MockSerial> = RtuTransport::new(mock_serial, 0x01);
        let mut words = [0u16; 2];
        rtu.read_block(0x00, &mut words).unwrap();
        assert_eq!(words, [1234, 100]);

        let written_data = rtu.interface.written_data();
        assert_eq!(written_data, [0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B]);
    }

    #[test]
    fn test_read_single() {
        let mut mock_serial = MockSerial::new();
        // CRC calculated using: https://homepages.plus.net/dougrice/dev/modbus/crc.html
        let response_data = [0x01, 0x03, 0x02, 0x56, 0x78, 0x87, 0xC6];
        mock_serial.set_read_data(&response_data).unwrap();

        let mut rtu: RtuTransport<MockSerial> = RtuTransport::new(mock_serial, 0x01);
        assert_eq!(rtu.read_single(0x20).unwrap(), 0x5678);

        let written_data = rtu.interface.written_data();
        assert_eq!(written_data[0], 0x01); // Unit ID
        assert_eq!(written_data[1], 0x03); // Function code for read holding registers
        assert_eq!(written_data[2], 0x00); // Register high byte
        assert_eq!(written_data[3], 0x20); // Register low byte
        assert_eq!(written_data[4], 0x00); // Count high byte
        assert_eq!(written_data[5], 0x01); // Count low byte
        assert_eq!(written_data[6], 0x85);
        assert_eq!(written_data[7], 0xC0);
    }

    #[test]
    fn test_read_bad_crc() {
        let mut mock_serial = MockSerial::new();
        let response_data = [0x01, 0x03, 0x02, 0x56, 0x78, 0x00, 0x00];
        mock_serial.set_read_data(&response_data).unwrap();

        let mut rtu: RtuTransport<MockSerial> = RtuTransport::new(mock_serial, 0x01);
        assert!(matches!(rtu.read_single(0x20), Err(RtuError::Modbus(_))));
    }

    #[test]
    fn test_write_single() {
        let mut mock_serial = MockSerial::new();
        let ideal_written = [0x01, 0x06, 0x00, 0x00, 0x04, 0xD2, 0x0B, 0x57];
        mock_serial.set_read_data(&ideal_written).unwrap();

        let mut rtu: RtuTransport<MockSerial> = RtuTransport::new(mock_serial, 0x01);
        rtu.write_single(0x00, 1234).unwrap();
        assert_eq!(rtu.interface.written_data(), ideal_written.as_slice());
    }

    #[test]
    fn test_write_block() {
        let mut mock_serial = MockSerial::new();
        let response_data = [0x01, 0x10, 0x00, 0x58, 0x00, 0x02, 0xC0, 0x1B];
        mock_serial.set_read_data(&response_data).unwrap();

        let mut rtu: RtuTransport<MockSerial> = RtuTransport::new(mock_serial, 0x01);
        rtu.write_block(0x58, &[0x1170, 0x0001]).unwrap();
        assert_eq!(
            rtu.interface.written_data(),
            [0x01, 0x10, 0x00, 0x58, 0x00, 0x02, 0x04, 0x11, 0x70, 0x00, 0x01, 0x32, 0x12]
        );
    }

    #[test]
    fn test_exception_response() {
        let mut mock_serial = MockSerial::new();
        // Illegal data address.
        mock_serial.set_read_data(&[0x01, 0x83, 0x02, 0xC0, 0xF1]).unwrap();

        let mut rtu: RtuTransport<MockSerial> = RtuTransport::new(mock_serial, 0x01);
        let err = rtu.read_single(0x200).unwrap_err();
        assert!(matches!(err, RtuError::Modbus(_)));
        assert!(matches!(err.kind(), embedded_io::ErrorKind::InvalidData));
    }

    #[test]
    fn test_silent_device_times_out() {
        let mock_serial = MockSerial::new();
        let mut rtu: RtuTransport<MockSerial> = RtuTransport::new(mock_serial, 0x01);

        let err = rtu.read_single(0x00).unwrap_err();
        assert!(matches!(err, RtuError::Serial(_)));
        assert!(matches!(err.kind(), embedded_io::ErrorKind::TimedOut));
    }

    #[test]
    fn test_truncated_response_times_out() {
        let mut mock_serial = MockSerial::new();
        mock_serial.set_read_data(&[0x01, 0x03, 0x04, 0x04]).unwrap();

        let mut rtu: RtuTransport<MockSerial> = RtuTransport::new(mock_serial, 0x01);
        let mut words = [0u16; 2];
        let err = rtu.read_block(0x00, &mut words).unwrap_err();
        assert!(matches!(err, RtuError::Timeout));
    }

    #[test]
    fn test_serial_write_failure() {
        let mut mock_serial = MockSerial::new();
        mock_serial.set_write_error(true);

        let mut rtu: RtuTransport<MockSerial> = RtuTransport::new(mock_serial, 0x01);
        assert!(matches!(rtu.write_single(0x00, 1), Err(RtuError::Serial(_))));
    }
}
