//! Command encoder
//!
//! Every logical sensor or EEPROM operation is one [`Command`] variant.
//! [`Command::encode`] is a pure function that turns it into the bytes
//! clocked out before the data phase plus a description of the data phase
//! itself. Transfers are full duplex: the response to a read occupies the
//! bytes that follow the header in the receive buffer.

use super::address::AddressWidth;
use super::opcodes::{Opcode, Region};

/// Longest header any command produces (FAST_READ: opcode + 3 address + dummy)
pub const MAX_HEADER_LEN: usize = 5;

/// Address walking direction of a burst transfer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Address increments after each byte
    #[default]
    Forward,
    /// Address decrements after each byte
    Backward,
}

/// Chip select a command is addressed to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// The sensor itself (registers, efuse, frames, CIS)
    Sensor,
    /// The SPI NOR EEPROM sharing the bus
    Eeprom,
}

/// Data phase following the header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataPhase {
    /// Header only
    None,
    /// Clock in this many bytes
    Read(usize),
    /// Clock out this many caller-supplied bytes
    Write(usize),
}

/// Fixed-capacity command header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    bytes: [u8; MAX_HEADER_LEN],
    len: u8,
}

impl Header {
    fn new(opcode: u8) -> Self {
        let mut bytes = [0u8; MAX_HEADER_LEN];
        bytes[0] = opcode;
        Self { bytes, len: 1 }
    }

    fn with_address(mut self, width: AddressWidth, address: u32) -> Self {
        let start = self.len as usize;
        let n = width.bytes() as usize;
        width.encode(address, &mut self.bytes[start..start + n]);
        self.len += n as u8;
        self
    }

    fn with_byte(mut self, byte: u8) -> Self {
        self.bytes[self.len as usize] = byte;
        self.len += 1;
        self
    }

    /// Header bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Number of header bytes
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always false; every header carries at least the opcode
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Wire form of a command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Encoded {
    /// Chip select
    pub target: Target,
    /// Bytes sent before the data phase
    pub header: Header,
    /// Data phase description
    pub data: DataPhase,
}

impl Encoded {
    /// The command byte
    pub fn opcode(&self) -> u8 {
        self.header.bytes[0]
    }

    /// Length of the data phase
    pub fn data_len(&self) -> usize {
        match self.data {
            DataPhase::None => 0,
            DataPhase::Read(n) | DataPhase::Write(n) => n,
        }
    }

    /// Total bytes exchanged on the bus
    pub fn total_len(&self) -> usize {
        self.header.len() + self.data_len()
    }

    /// Number of bytes the caller gets back
    pub fn response_len(&self) -> usize {
        match self.data {
            DataPhase::Read(n) => n,
            _ => 0,
        }
    }
}

/// One logical operation on the bus
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Read one sensor register
    ReadRegister {
        /// Register address
        addr: u8,
    },
    /// Write one sensor register
    WriteRegister {
        /// Register address
        addr: u8,
        /// Value to store
        value: u8,
    },
    /// Burst read of consecutive registers
    BurstRead {
        /// First register address
        addr: u8,
        /// Number of bytes
        len: usize,
        /// Address walking direction
        direction: Direction,
    },
    /// Burst write of consecutive registers
    BurstWrite {
        /// First register address
        addr: u8,
        /// Number of bytes
        len: usize,
        /// Address walking direction
        direction: Direction,
    },
    /// Efuse read
    ReadEfuse {
        /// First efuse address
        addr: u8,
        /// Number of bytes
        len: usize,
    },
    /// Efuse program
    WriteEfuse {
        /// First efuse address
        addr: u8,
        /// Number of bytes
        len: usize,
    },
    /// Frame buffer read (one chunk)
    GetFrame {
        /// Number of bytes
        len: usize,
    },
    /// Frame buffer write
    WriteFrame {
        /// Number of bytes
        len: usize,
    },
    /// Zone average table read
    GetZoneAverage {
        /// Number of bytes
        len: usize,
    },
    /// Histogram table read
    GetHistogram {
        /// Number of bytes
        len: usize,
    },
    /// Trigger a capture; same wire byte as [`Command::GetHistogram`]
    PreCapture,
    /// Read one CIS register
    ReadCisRegister {
        /// CIS register address
        addr: u8,
    },
    /// Write one CIS register
    WriteCisRegister {
        /// CIS register address
        addr: u8,
        /// Value to store
        value: u8,
    },
    /// CIS frame read (one chunk)
    GetCisFrame {
        /// Number of bytes
        len: usize,
    },
    /// EEPROM RDSR
    EepromReadStatus,
    /// EEPROM READ
    EepromRead {
        /// 24-bit address
        addr: u32,
        /// Number of bytes
        len: usize,
    },
    /// EEPROM FAST_READ
    EepromFastRead {
        /// 24-bit address
        addr: u32,
        /// Number of bytes
        len: usize,
    },
    /// EEPROM WREN
    EepromWriteEnable,
    /// EEPROM WRDI
    EepromWriteDisable,
    /// EEPROM page program
    EepromPageProgram {
        /// 24-bit address
        addr: u32,
        /// Number of bytes (must not cross a page)
        len: usize,
    },
    /// EEPROM chip erase
    EepromChipErase,
    /// EEPROM 4KB sector erase
    EepromSectorErase {
        /// 24-bit address inside the sector
        addr: u32,
    },
    /// EEPROM 64KB block erase
    EepromBlockErase {
        /// 24-bit address inside the block
        addr: u32,
    },
}

impl Command {
    /// Burst read in the given direction
    pub fn burst_read(addr: u8, len: usize, direction: Direction) -> Self {
        Self::BurstRead {
            addr,
            len,
            direction,
        }
    }

    /// Burst write in the given direction
    pub fn burst_write(addr: u8, len: usize, direction: Direction) -> Self {
        Self::BurstWrite {
            addr,
            len,
            direction,
        }
    }

    /// Chip select this command goes to
    pub fn target(&self) -> Target {
        match self.op().region() {
            Region::Eeprom => Target::Eeprom,
            _ => Target::Sensor,
        }
    }

    /// Opcode this command is sent with
    pub fn op(&self) -> Opcode {
        match self {
            Self::ReadRegister { .. } => Opcode::RegRead,
            Self::WriteRegister { .. } => Opcode::RegWrite,
            Self::BurstRead {
                direction: Direction::Forward,
                ..
            } => Opcode::RegBurstRead,
            Self::BurstRead {
                direction: Direction::Backward,
                ..
            } => Opcode::RegBurstReadBackward,
            Self::BurstWrite {
                direction: Direction::Forward,
                ..
            } => Opcode::RegBurstWrite,
            Self::BurstWrite {
                direction: Direction::Backward,
                ..
            } => Opcode::RegBurstWriteBackward,
            Self::ReadEfuse { .. } => Opcode::EfuseRead,
            Self::WriteEfuse { .. } => Opcode::EfuseWrite,
            Self::GetFrame { .. } => Opcode::FrameBufferRead,
            Self::WriteFrame { .. } => Opcode::FrameBufferWrite,
            Self::GetZoneAverage { .. } => Opcode::ZoneAverageRead,
            Self::GetHistogram { .. } => Opcode::HistogramRead,
            Self::PreCapture => Opcode::PreCapture,
            Self::ReadCisRegister { .. } => Opcode::CisAddrRead,
            Self::WriteCisRegister { .. } => Opcode::CisRegWrite,
            Self::GetCisFrame { .. } => Opcode::GetFrame,
            Self::EepromReadStatus => Opcode::EepromReadStatus,
            Self::EepromRead { .. } => Opcode::EepromRead,
            Self::EepromFastRead { .. } => Opcode::EepromFastRead,
            Self::EepromWriteEnable => Opcode::EepromWriteEnable,
            Self::EepromWriteDisable => Opcode::EepromWriteDisable,
            Self::EepromPageProgram { .. } => Opcode::EepromPageProgram,
            Self::EepromChipErase => Opcode::EepromChipErase,
            Self::EepromSectorErase { .. } => Opcode::EepromSectorErase,
            Self::EepromBlockErase { .. } => Opcode::EepromBlockErase,
        }
    }

    /// Sensor opcode, or `None` for EEPROM commands
    pub fn sensor_opcode(&self) -> Option<Opcode> {
        Some(self.op()).filter(|op| op.region() != Region::Eeprom)
    }

    /// The command byte sent first on the wire
    pub fn opcode(&self) -> u8 {
        self.op().value()
    }

    /// Encode the command into its wire form
    pub fn encode(&self) -> Encoded {
        let header = Header::new(self.opcode());
        let one = AddressWidth::OneByte;
        let three = AddressWidth::ThreeByte;

        let (header, data) = match *self {
            Self::ReadRegister { addr } | Self::ReadCisRegister { addr } => {
                (header.with_address(one, addr as u32), DataPhase::Read(1))
            }
            Self::WriteRegister { addr, value } | Self::WriteCisRegister { addr, value } => (
                header.with_address(one, addr as u32).with_byte(value),
                DataPhase::None,
            ),
            Self::BurstRead { addr, len, .. } | Self::ReadEfuse { addr, len } => {
                (header.with_address(one, addr as u32), DataPhase::Read(len))
            }
            Self::BurstWrite { addr, len, .. } | Self::WriteEfuse { addr, len } => {
                (header.with_address(one, addr as u32), DataPhase::Write(len))
            }
            Self::GetFrame { len }
            | Self::GetZoneAverage { len }
            | Self::GetHistogram { len }
            | Self::GetCisFrame { len } => (header, DataPhase::Read(len)),
            Self::WriteFrame { len } => (header, DataPhase::Write(len)),
            Self::PreCapture
            | Self::EepromWriteEnable
            | Self::EepromWriteDisable
            | Self::EepromChipErase => (header, DataPhase::None),
            Self::EepromReadStatus => (header, DataPhase::Read(1)),
            Self::EepromRead { addr, len } => {
                (header.with_address(three, addr), DataPhase::Read(len))
            }
            Self::EepromFastRead { addr, len } => (
                header.with_address(three, addr).with_byte(0x00),
                DataPhase::Read(len),
            ),
            Self::EepromPageProgram { addr, len } => {
                (header.with_address(three, addr), DataPhase::Write(len))
            }
            Self::EepromSectorErase { addr } | Self::EepromBlockErase { addr } => {
                (header.with_address(three, addr), DataPhase::None)
            }
        };

        Encoded {
            target: self.target(),
            header,
            data,
        }
    }
}
