//! Error types for et7xx-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate and by transport backends.

use core::fmt;

/// Opaque status reported by a failed bus exchange
///
/// Backends store whatever their platform reports here (typically a raw
/// OS errno); the protocol layer never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportStatus(pub i32);

impl TransportStatus {
    /// Generic I/O failure (EIO)
    pub const IO: Self = Self(5);

    /// Short transfer: the transport moved fewer bytes than requested
    pub const SHORT_TRANSFER: Self = Self(-1);
}

/// Ordering rule broken by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceViolation {
    /// EEPROM write or erase without a preceding write enable
    NotWriteEnabled,
    /// EEPROM read attempted while the write enable latch is set
    WriteEnableLatched,
    /// The device reports the write enable latch clear although the
    /// session asserted it
    LatchLost,
    /// Frame data requested without a completed pre-capture
    NoPreCapture,
    /// Non-secure entry point used while the session runs in secure mode
    SecureModeActive,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Length, address or parameter out of bounds
    InvalidArgument,
    /// Operation before the first open or after the last close
    NotOpen,
    /// The underlying bus exchange failed
    TransportError(TransportStatus),
    /// Protocol ordering rule violated
    SequenceError(SequenceViolation),
    /// EEPROM busy polling exceeded its retry budget
    Timeout,
    /// Scratch buffer allocation or registry slot exhausted
    ResourceExhausted,
    /// Multi-chunk transfer cancelled between chunks
    Interrupted {
        /// Chunks that completed before the cancellation was seen
        completed: u8,
        /// Chunks the transfer was split into
        total: u8,
    },
    /// Power rail or sleep pin could not be driven
    PowerControl,
}

impl fmt::Display for SequenceViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotWriteEnabled => write!(f, "EEPROM write/erase requires write enable"),
            Self::WriteEnableLatched => write!(f, "EEPROM read while write enable is latched"),
            Self::LatchLost => write!(f, "EEPROM write enable latch is not set on the device"),
            Self::NoPreCapture => write!(f, "frame requested without pre-capture"),
            Self::SecureModeActive => write!(f, "non-secure path used in secure mode"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::NotOpen => write!(f, "device is not open"),
            Self::TransportError(status) => {
                write!(f, "bus exchange failed (status {})", status.0)
            }
            Self::SequenceError(violation) => write!(f, "sequence error: {}", violation),
            Self::Timeout => write!(f, "operation timed out"),
            Self::ResourceExhausted => write!(f, "resource exhausted"),
            Self::Interrupted { completed, total } => {
                write!(f, "transfer interrupted after {}/{} chunks", completed, total)
            }
            Self::PowerControl => write!(f, "power control failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
