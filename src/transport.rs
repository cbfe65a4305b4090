//! The wire capability the protocol layer is built on.
//!
//! Implementations move raw 16-bit holding register words and nothing else. Scaling, addressing
//! of presets and composite quantities are all handled above this trait.
//!
//! [`RtuTransport`](crate::rtu::RtuTransport) implements it for Modbus RTU over any
//! [`embedded_io`] serial interface.

/// Raw holding register access. Every call is one request/response on the bus.
pub trait Transport {
    /// Failure reported by the transport. A bus timeout must report
    /// [`embedded_io::ErrorKind::TimedOut`] so callers can tell it apart.
    type Error: embedded_io::Error;

    /// Read `words.len()` contiguous holding registers starting at `address`.
    fn read_block(&mut self, address: u16, words: &mut [u16]) -> Result<(), Self::Error>;

    /// Write one holding register.
    fn write_single(&mut self, address: u16, word: u16) -> Result<(), Self::Error>;

    /// Write contiguous holding registers in one transaction.
    fn write_block(&mut self, address: u16, words: &[u16]) -> Result<(), Self::Error>;

    /// Whether [`Self::write_block`] is available. When it isn't, composite quantities are
    /// written register by register and then read back.
    fn supports_block_write(&self) -> bool {
        true
    }

    /// Read one holding register.
    fn read_single(&mut self, address: u16) -> Result<u16, Self::Error> {
        let mut word = [0u16];
        self.read_block(address, &mut word)?;
        Ok(word[0])
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn read_block(&mut self, address: u16, words: &mut [u16]) -> Result<(), Self::Error> {
        (**self).read_block(address, words)
    }

    fn write_single(&mut self, address: u16, word: u16) -> Result<(), Self::Error> {
        (**self).write_single(address, word)
    }

    fn write_block(&mut self, address: u16, words: &[u16]) -> Result<(), Self::Error> {
        (**self).write_block(address, words)
    }

    fn supports_block_write(&self) -> bool {
        (**self).supports_block_write()
    }

    fn read_single(&mut self, address: u16) -> Result<u16, Self::Error> {
        (**self).read_single(address)
    }
}
