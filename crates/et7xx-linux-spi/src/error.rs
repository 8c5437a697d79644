//! Error types for Linux spidev operations

use et7xx_core::error::{Error as CoreError, TransportStatus};
use thiserror::Error;

/// Linux spidev specific errors
#[derive(Debug, Error)]
pub enum LinuxSpiError {
    /// Failed to open device
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set SPI mode
    #[error("Failed to set SPI mode to {mode}: {source}")]
    SetModeFailed {
        mode: u8,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set bits per word
    #[error("Failed to set bits per word to {bits}: {source}")]
    SetBitsPerWordFailed {
        bits: u8,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set clock speed
    #[error("Failed to set clock speed to {speed} Hz: {source}")]
    SetSpeedFailed {
        speed: u32,
        #[source]
        source: std::io::Error,
    },

    /// SPI transfer failed
    #[error("SPI transfer failed: {0}")]
    TransferFailed(#[source] std::io::Error),

    /// The kernel moved fewer bytes than requested
    #[error("Short SPI transfer: {done} of {expected} bytes")]
    ShortTransfer { done: usize, expected: usize },

    /// Exchange larger than the spidev buffer
    #[error("Transfer of {len} bytes exceeds spidev buffer of {max} bytes")]
    TooLong { len: usize, max: usize },

    /// No EEPROM chip select was configured
    #[error("No EEPROM device configured. Use eeprom=/dev/spidevX.Y")]
    NoEepromDevice,

    /// Device not specified
    #[error("No device specified. Use dev=/dev/spidevX.Y")]
    NoDevice,
}

impl LinuxSpiError {
    /// Status code carried into the core error
    pub fn status(&self) -> TransportStatus {
        let io = match self {
            Self::OpenFailed { source, .. }
            | Self::SetModeFailed { source, .. }
            | Self::SetBitsPerWordFailed { source, .. }
            | Self::SetSpeedFailed { source, .. }
            | Self::TransferFailed(source) => source.raw_os_error(),
            Self::ShortTransfer { .. } => return TransportStatus::SHORT_TRANSFER,
            Self::TooLong { .. } => Some(libc::EMSGSIZE),
            Self::NoEepromDevice | Self::NoDevice => Some(libc::ENODEV),
        };
        io.map(TransportStatus).unwrap_or(TransportStatus::IO)
    }
}

impl From<LinuxSpiError> for CoreError {
    fn from(e: LinuxSpiError) -> Self {
        CoreError::TransportError(e.status())
    }
}

/// Result type for Linux SPI operations
pub type Result<T> = std::result::Result<T, LinuxSpiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_is_carried() {
        let e = LinuxSpiError::TransferFailed(std::io::Error::from_raw_os_error(libc::ETIMEDOUT));
        assert_eq!(
            CoreError::from(e),
            CoreError::TransportError(TransportStatus(libc::ETIMEDOUT))
        );
    }

    #[test]
    fn test_status_without_errno() {
        let short = LinuxSpiError::ShortTransfer {
            done: 3,
            expected: 5,
        };
        assert_eq!(short.status(), TransportStatus::SHORT_TRANSFER);
        assert_eq!(LinuxSpiError::NoEepromDevice.status(), TransportStatus(libc::ENODEV));
        let other = LinuxSpiError::TransferFailed(std::io::Error::other("boom"));
        assert_eq!(other.status(), TransportStatus::IO);
    }
}
