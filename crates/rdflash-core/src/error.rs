//! Error types for rdflash-core
//!
//! This module provides a no_std compatible error type that is used
//! throughout the crate. Every variant is fatal for the running operation;
//! nothing in the engine retries.

use core::fmt;

use crate::flash::WriteState;
use crate::layout::LayoutError;

/// Why an operation plan was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// A region is both dumped and written in the same run
    ReadAndWrite,
    /// The same region is written twice
    DuplicateWrite,
    /// The jump region is written from a file and re-encoded in the same run
    JumpRegionWrittenTwice,
    /// Two dumps target the same output file
    DuplicateOutput,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Device errors
    /// The device did not report the expected identity code
    HardwareIdentityMismatch {
        /// Identity the configuration expects
        expected: [u8; 3],
        /// Identity the device returned
        found: [u8; 3],
    },
    /// An exchange returned fewer bytes than were sent, or failed outright
    TransportFailure {
        /// Number of bytes sent
        requested: usize,
        /// Number of bytes received
        received: usize,
    },
    /// The configured chunk or page needs a longer exchange than the transport allows
    ExchangeTooLong {
        /// Longest exchange the configuration needs
        needed: usize,
        /// Longest exchange the transport can carry
        max: usize,
    },
    /// Read-back data does not match the source
    VerificationMismatch {
        /// First address of the mismatching chunk
        start: u32,
        /// End address (exclusive) of the mismatching chunk
        end: u32,
    },

    // Request errors
    /// Mutually exclusive operations were requested together
    ConflictingOperationRequested(Conflict),
    /// No region with the requested name exists in the layout
    RegionNotFound,
    /// Layout validation failed
    Layout(LayoutError),
    /// Address is outside the region or chip
    AddressOutOfBounds,
    /// Operation requires a page or sector aligned address
    InvalidAlignment,
    /// The write state machine was asked to make an illegal transition
    InvalidStateTransition {
        /// State the writer was in
        from: WriteState,
        /// State that was requested
        to: WriteState,
    },
}

impl From<LayoutError> for Error {
    fn from(e: LayoutError) -> Self {
        Error::Layout(e)
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadAndWrite => write!(f, "refusing to read and write in the same run"),
            Self::DuplicateWrite => write!(f, "region is written more than once"),
            Self::JumpRegionWrittenTwice => {
                write!(f, "jump region is written from a file and encoded at once")
            }
            Self::DuplicateOutput => write!(f, "two dumps share the same output file"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardwareIdentityMismatch { expected, found } => write!(
                f,
                "bad chip id: got 0x{:02X} 0x{:02X} 0x{:02X}, expected 0x{:02X} 0x{:02X} 0x{:02X}",
                found[0], found[1], found[2], expected[0], expected[1], expected[2]
            ),
            Self::TransportFailure {
                requested,
                received,
            } => write!(
                f,
                "transfer failed: sent {} bytes, received {}",
                requested, received
            ),
            Self::ExchangeTooLong { needed, max } => write!(
                f,
                "exchange of {} bytes exceeds the transport limit of {}",
                needed, max
            ),
            Self::VerificationMismatch { start, end } => write!(
                f,
                "verification failed in chunk 0x{:06X}-0x{:06X}",
                start, end
            ),
            Self::ConflictingOperationRequested(c) => write!(f, "{}", c),
            Self::RegionNotFound => write!(f, "region not found"),
            Self::Layout(e) => write!(f, "invalid layout: {}", e),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::InvalidAlignment => write!(f, "invalid alignment"),
            Self::InvalidStateTransition { from, to } => {
                write!(f, "illegal write state transition {} -> {}", from, to)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
