//! SPI types and command structures
//!
//! This module provides the ET7xx opcode table, address widths and the
//! command encoder.

mod address;
mod command;
pub mod opcodes;

pub use address::AddressWidth;
pub use command::{Command, DataPhase, Direction, Encoded, Header, Target, MAX_HEADER_LEN};
pub use opcodes::*;
