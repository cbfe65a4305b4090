//! Our error types for the SK120 register protocol.

use strum_macros::Display;
use thiserror::Error;

use crate::{
    alarm::UnknownStatusCode,
    codec::EncodingError,
    command::{DescriptorError, UnknownCommand},
    preset::{AddressOutOfRange, InvalidPreset},
};

pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Custom error type for SK120 register protocol operations.
///
/// `E` is the error type of the [`Transport`](crate::transport::Transport) in use.
#[derive(Error, Debug)]
pub enum Error<E: embedded_io::Error> {
    #[error(transparent)]
    UnknownCommand(#[from] UnknownCommand),
    #[error(transparent)]
    MalformedDescriptor(#[from] DescriptorError),
    #[error(transparent)]
    InvalidPreset(#[from] InvalidPreset),
    #[error(transparent)]
    AddressOutOfRange(#[from] AddressOutOfRange),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("Transport {operation} at register {address:#06x} failed: {cause:?}")]
    Transport {
        operation: Operation,
        address: u16,
        cause: E,
    },
    #[error(transparent)]
    UnknownStatusCode(#[from] UnknownStatusCode),
    #[error("Command `{0}` is read-only")]
    NotWritable(String),
    #[error("Command `{0}` is write-only")]
    NotReadable(String),
    #[error(
        "Composite write at register {address:#06x} was torn: wrote {expected:?}, read back {observed:?}"
    )]
    TornComposite {
        address: u16,
        expected: [u16; 2],
        observed: [u16; 2],
    },
    #[error(transparent)]
    Compound(CompoundFailure<E>),
}

impl<E: embedded_io::Error> Error<E> {
    /// True if this is a transport failure caused by the bus timing out.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Transport { cause, .. } => {
                matches!(cause.kind(), embedded_io::ErrorKind::TimedOut)
            }
            Error::Compound(failure) => failure.cause.is_timeout(),
            _ => false,
        }
    }
}

/// Which kind of wire transaction failed.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    #[strum(to_string = "read")]
    Read,
    #[strum(to_string = "write")]
    Write,
    #[strum(to_string = "block write")]
    WriteBlock,
}

/// One sub-step of a multi-write operation such as
/// [`Sk120::remove_protection`](crate::psu::Sk120::remove_protection).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Over-voltage protection level.
    Ovp,
    /// Over-current protection level.
    Ocp,
    /// Over-power protection level.
    Opp,
    /// Capacity (Ah) limit.
    Oah,
    /// Energy (Wh) limit.
    Owh,
    /// External over-temperature limit.
    Etp,
    /// Output timer limit.
    Timer,
    /// Accumulated on-time.
    OnTime,
    /// Accumulated energy counter.
    Energy,
    /// Accumulated capacity counter.
    Capacity,
}

/// A multi-write operation stopped part way.
///
/// The device is left in a mixed state: every step in `completed` was applied,
/// `failed` was not, and nothing after `failed` was attempted.
#[derive(Debug)]
pub struct CompoundFailure<E: embedded_io::Error> {
    pub operation: &'static str,
    pub completed: Vec<Step>,
    pub failed: Step,
    pub cause: Box<Error<E>>,
}

// Written out by hand. The derive would bound this impl on `Error<E>: Display`, which in turn
// depends on this impl.
impl<E: embedded_io::Error> core::fmt::Display for CompoundFailure<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} stopped at {} after completing {:?}: {}",
            self.operation, self.failed, self.completed, self.cause
        )
    }
}

impl<E: embedded_io::Error> core::error::Error for CompoundFailure<E> {}

impl<E: embedded_io::Error> CompoundFailure<E> {
    /// Steps which were never attempted, given the full ordered step list.
    pub fn remaining<'a>(&self, plan: &'a [Step]) -> &'a [Step] {
        let next = self.completed.len() + 1;
        plan.get(next..).unwrap_or(&[])
    }
}
