//! Error types for Linux GPIO operations

use thiserror::Error;

/// Linux GPIO specific errors
#[derive(Debug, Error)]
pub enum LinuxGpioError {
    /// Failed to request a GPIO line
    #[error("Failed to request {name} line {offset} on '{chip}': {source}")]
    LineRequestFailed {
        name: &'static str,
        chip: String,
        offset: u32,
        #[source]
        source: gpiocdev::Error,
    },

    /// Failed to set GPIO line value
    #[error("Failed to drive {name} line: {source}")]
    SetValueFailed {
        name: &'static str,
        #[source]
        source: gpiocdev::Error,
    },

    /// GPIO chip not specified
    #[error("No GPIO chip specified. Use chip = \"/dev/gpiochipN\"")]
    NoDevice,
}

/// Result type for Linux GPIO operations
pub type Result<T> = std::result::Result<T, LinuxGpioError>;
