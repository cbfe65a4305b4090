//! Register level stand-in for a device, used by unit tests of the controller.

use thiserror::Error;

use crate::transport::Transport;

/// One transaction seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Read { address: u16, count: usize },
    Write { address: u16, value: u16 },
    WriteBlock { address: u16, values: Vec<u16> },
}

impl Op {
    pub fn is_write(&self) -> bool {
        !matches!(self, Op::Read { .. })
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    #[error("timed out")]
    Timeout,
    #[error("bus fault")]
    Fault,
}

impl embedded_io::Error for MockError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockError::Fault => embedded_io::ErrorKind::Other,
        }
    }
}

pub struct MockTransport {
    registers: Vec<u16>,
    /// Every transaction attempted, including failed ones.
    pub log: Vec<Op>,
    /// Fail the write transaction with this index (counting from 0).
    fail_write: Option<(usize, MockError)>,
    fail_reads: Option<MockError>,
    block_writes: bool,
    /// Emulate firmware which only keeps the last of two single writes to neighbouring registers.
    last_write_wins: bool,
    /// Address and previous value of the last single write.
    pending: Option<(u16, u16)>,
    writes: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            registers: vec![0; 0x1_0000],
            log: Vec::new(),
            fail_write: None,
            fail_reads: None,
            block_writes: true,
            last_write_wins: false,
            pending: None,
            writes: 0,
        }
    }

    pub fn with(mut self, address: u16, value: u16) -> Self {
        self.set(address, value);
        self
    }

    pub fn set(&mut self, address: u16, value: u16) {
        self.registers[usize::from(address)] = value;
    }

    pub fn get(&self, address: u16) -> u16 {
        self.registers[usize::from(address)]
    }

    pub fn fail_write_at(mut self, index: usize, err: MockError) -> Self {
        self.fail_write = Some((index, err));
        self
    }

    pub fn fail_reads(mut self, err: MockError) -> Self {
        self.fail_reads = Some(err);
        self
    }

    pub fn without_block_writes(mut self) -> Self {
        self.block_writes = false;
        self
    }

    pub fn with_last_write_wins(mut self) -> Self {
        self.last_write_wins = true;
        self
    }

    pub fn writes(&self) -> Vec<&Op> {
        self.log.iter().filter(|op| op.is_write()).collect()
    }

    fn check_write(&mut self) -> Result<(), MockError> {
        let index = self.writes;
        self.writes += 1;
        match self.fail_write {
            Some((fail_at, err)) if fail_at == index => Err(err),
            _ => Ok(()),
        }
    }
}

impl Transport for MockTransport {
    type Error = MockError;

    fn read_block(&mut self, address: u16, words: &mut [u16]) -> Result<(), Self::Error> {
        self.log.push(Op::Read {
            address,
            count: words.len(),
        });
        if let Some(err) = self.fail_reads {
            return Err(err);
        }
        self.pending = None;
        let start = usize::from(address);
        words.copy_from_slice(&self.registers[start..start + words.len()]);
        Ok(())
    }

    fn write_single(&mut self, address: u16, word: u16) -> Result<(), Self::Error> {
        self.log.push(Op::Write {
            address,
            value: word,
        });
        self.check_write()?;
        if self.last_write_wins {
            if let Some((previous, old)) = self.pending.take() {
                if previous.abs_diff(address) == 1 {
                    self.set(previous, old);
                }
            }
            self.pending = Some((address, self.get(address)));
        }
        self.set(address, word);
        Ok(())
    }

    fn write_block(&mut self, address: u16, words: &[u16]) -> Result<(), Self::Error> {
        self.log.push(Op::WriteBlock {
            address,
            values: words.to_vec(),
        });
        assert!(self.block_writes, "block write on a transport without block writes");
        self.check_write()?;
        self.pending = None;
        let start = usize::from(address);
        self.registers[start..start + words.len()].copy_from_slice(words);
        Ok(())
    }

    fn supports_block_write(&self) -> bool {
        self.block_writes
    }
}
