//! We use this mocking module in unit tests to emulate a serial port.

use thiserror::Error;

/// Our mock type used to emulate a serial port.
pub struct MockSerial {
    /// Buffer to store data written to the mock serial port
    write_buffer: heapless::Vec<u8, 256>,
    /// Buffer containing pre-configured response data to be read
    read_buffer: heapless::Vec<u8, 256>,
    /// Current position in the read buffer
    read_position: usize,
    /// Flag to simulate write errors
    should_error_on_write: bool,
}

#[derive(Error, Debug)]
pub enum MockSerialError {
    /// Nothing left to read, like a port whose read timeout elapsed.
    #[error("timed out")]
    Timeout,
    /// Simulated buffer overflow
    #[error("buffer overflow")]
    BufferOverflow,
    /// Generic simulated error for testing
    #[error("simulated error")]
    SimulatedError,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let remaining = &self.read_buffer[self.read_position..];
        if remaining.is_empty() {
            return Err(MockSerialError::Timeout);
        }
        let bytes_to_read = core::cmp::min(buf.len(), remaining.len());
        buf[..bytes_to_read].copy_from_slice(&remaining[..bytes_to_read]);
        self.read_position += bytes_to_read;
        Ok(bytes_to_read)
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            read_buffer: heapless::Vec::new(),
            read_position: 0,
            should_error_on_write: false,
        }
    }

    /// Set the data that will be returned when read() is called
    pub fn set_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.read_buffer.clear();
        self.read_position = 0;
        self.read_buffer
            .extend_from_slice(data)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, Write};

    #[test]
    fn test_read_partial_then_timeout() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"Hello World").unwrap();

        let mut buffer1 = [0u8; 5];
        let mut buffer2 = [0u8; 10];
        assert_eq!(mock.read(&mut buffer1).unwrap(), 5);
        assert_eq!(mock.read(&mut buffer2).unwrap(), 6);
        assert_eq!(&buffer1, b"Hello");
        assert_eq!(&buffer2[..6], b" World");

        let err = mock.read(&mut buffer2).unwrap_err();
        assert!(matches!(err.kind(), embedded_io::ErrorKind::TimedOut));
    }

    #[test]
    fn test_write_records_data() {
        let mut mock = MockSerial::new();
        mock.write_all(b"Hello, ").unwrap();
        mock.write_all(b"World!").unwrap();
        assert_eq!(mock.written_data(), b"Hello, World!");
    }

    #[test]
    fn test_write_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert!(matches!(
            mock.write(b"test"),
            Err(MockSerialError::SimulatedError)
        ));
        assert!(mock.written_data().is_empty());
    }

    #[test]
    fn test_set_read_data_buffer_overflow() {
        let mut mock = MockSerial::new();
        let large_data = vec![0u8; 300];
        assert!(matches!(
            mock.set_read_data(&large_data),
            Err(MockSerialError::BufferOverflow)
        ));
    }
}
