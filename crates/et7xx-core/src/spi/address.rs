//! Address width types

/// Address width for sensor and EEPROM commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// No address phase
    #[default]
    None,
    /// 1-byte address - sensor register, efuse and CIS space
    OneByte,
    /// 3-byte (24-bit) address - EEPROM space
    ThreeByte,
}

impl AddressWidth {
    /// Returns the number of address bytes
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::OneByte => 1,
            Self::ThreeByte => 3,
        }
    }

    /// Returns the highest encodable address
    pub const fn max_address(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::OneByte => 0xFF,
            Self::ThreeByte => 0x00FF_FFFF,
        }
    }

    /// Encode an address into bytes (big-endian)
    pub fn encode(&self, address: u32, buf: &mut [u8]) {
        match self {
            Self::None => {}
            Self::OneByte => {
                buf[0] = address as u8;
            }
            Self::ThreeByte => {
                buf[0] = (address >> 16) as u8;
                buf[1] = (address >> 8) as u8;
                buf[2] = address as u8;
            }
        }
    }

    /// Decode a big-endian address from the first [`bytes`](Self::bytes) bytes
    ///
    /// Returns `None` when `buf` is too short.
    pub fn decode(&self, buf: &[u8]) -> Option<u32> {
        let n = self.bytes() as usize;
        if buf.len() < n {
            return None;
        }
        Some(
            buf[..n]
                .iter()
                .fold(0u32, |acc, &b| (acc << 8) | b as u32),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_byte_encode_decode() {
        let mut buf = [0u8; 3];
        AddressWidth::ThreeByte.encode(0x012345, &mut buf);
        assert_eq!(buf, [0x01, 0x23, 0x45]);
        assert_eq!(AddressWidth::ThreeByte.decode(&buf), Some(0x012345));
    }

    #[test]
    fn test_decode_short_buffer() {
        assert_eq!(AddressWidth::ThreeByte.decode(&[0x01, 0x02]), None);
        assert_eq!(AddressWidth::None.decode(&[]), Some(0));
    }
}
