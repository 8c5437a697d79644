//! Scratch-buffered command execution

use super::traits::BusTransport;
use crate::error::{Error, Result};
use crate::spi::{Command, DataPhase, Target, MAX_HEADER_LEN};

/// A transport bound to the session's scratch buffers
///
/// Every exchange is staged in `tx`/`rx`; caller buffers are only read
/// from or written to around the exchange. `capacity` is the largest data
/// phase accepted, the scratch buffers carry [`MAX_HEADER_LEN`] bytes of
/// headroom on top of it.
pub struct Bus<'a, T: BusTransport + ?Sized> {
    transport: &'a mut T,
    tx: &'a mut [u8],
    rx: &'a mut [u8],
    capacity: usize,
    speed_hz: u32,
}

impl<'a, T: BusTransport + ?Sized> Bus<'a, T> {
    /// Bind a transport to a pair of scratch buffers
    pub fn new(transport: &'a mut T, tx: &'a mut [u8], rx: &'a mut [u8], speed_hz: u32) -> Self {
        let capacity = core::cmp::min(tx.len(), rx.len()).saturating_sub(MAX_HEADER_LEN);
        Self {
            transport,
            tx,
            rx,
            capacity,
            speed_hz,
        }
    }

    /// Largest data phase a single exchange can carry
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clock used for exchanges
    pub fn speed_hz(&self) -> u32 {
        self.speed_hz
    }

    /// Fail with `InvalidArgument` if `len` does not fit one exchange
    pub fn check_len(&self, len: usize) -> Result<()> {
        if len > self.capacity {
            log::debug!(
                "et7xx: transfer of {} bytes exceeds buffer capacity {}",
                len,
                self.capacity
            );
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    /// Delay for the specified number of microseconds
    pub fn delay_us(&mut self, us: u32) {
        self.transport.delay_us(us)
    }

    /// Execute one encoded command
    ///
    /// `payload` must match the length of a write data phase and
    /// `response` the length of a read data phase; both are empty for
    /// header-only commands.
    pub fn run(&mut self, cmd: &Command, payload: &[u8], response: &mut [u8]) -> Result<()> {
        let enc = cmd.encode();
        self.check_len(enc.data_len())?;

        let header_len = enc.header.len();
        let total = enc.total_len();

        match enc.data {
            DataPhase::None => {
                if !payload.is_empty() || !response.is_empty() {
                    return Err(Error::InvalidArgument);
                }
            }
            DataPhase::Read(n) => {
                if response.len() != n || !payload.is_empty() {
                    return Err(Error::InvalidArgument);
                }
            }
            DataPhase::Write(n) => {
                if payload.len() != n || !response.is_empty() {
                    return Err(Error::InvalidArgument);
                }
            }
        }

        self.tx[..header_len].copy_from_slice(enc.header.as_slice());
        if payload.is_empty() {
            self.tx[header_len..total].fill(0);
        } else {
            self.tx[header_len..total].copy_from_slice(payload);
        }
        self.rx[..total].fill(0);

        log::trace!(
            "et7xx: {:?} opcode 0x{:02X}, {} bytes",
            enc.target,
            enc.opcode(),
            total
        );

        self.transport
            .exchange(enc.target, &self.tx[..total], &mut self.rx[..total], self.speed_hz)?;

        if !response.is_empty() {
            response.copy_from_slice(&self.rx[header_len..total]);
        }
        Ok(())
    }

    /// Pass caller-built bytes straight to the sensor
    ///
    /// `tx` and `rx` must have the same length; the bytes still travel
    /// through the scratch buffers.
    pub fn raw(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        if tx.len() != rx.len() {
            return Err(Error::InvalidArgument);
        }
        if tx.is_empty() {
            return Ok(());
        }
        self.check_len(tx.len())?;

        let len = tx.len();
        self.tx[..len].copy_from_slice(tx);
        self.rx[..len].fill(0);

        log::trace!("et7xx: raw transfer opcode 0x{:02X}, {} bytes", tx[0], len);

        self.transport
            .exchange(Target::Sensor, &self.tx[..len], &mut self.rx[..len], self.speed_hz)?;
        rx.copy_from_slice(&self.rx[..len]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::Direction;

    /// Loops tx back into rx, shifted by one byte like a shift register
    struct Loopback {
        exchanges: usize,
        last_target: Option<Target>,
    }

    impl BusTransport for Loopback {
        fn exchange(
            &mut self,
            target: Target,
            tx: &[u8],
            rx: &mut [u8],
            _speed_hz: u32,
        ) -> Result<()> {
            self.exchanges += 1;
            self.last_target = Some(target);
            rx[1..].copy_from_slice(&tx[..tx.len() - 1]);
            Ok(())
        }

        fn delay_us(&mut self, _us: u32) {}
    }

    #[test]
    fn test_capacity_excludes_header_headroom() {
        let mut t = Loopback {
            exchanges: 0,
            last_target: None,
        };
        let mut tx = [0u8; 16 + MAX_HEADER_LEN];
        let mut rx = [0u8; 16 + MAX_HEADER_LEN];
        let bus = Bus::new(&mut t, &mut tx, &mut rx, 1_000_000);
        assert_eq!(bus.capacity(), 16);
        assert!(bus.check_len(16).is_ok());
        assert_eq!(bus.check_len(17), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_write_payload_is_staged_after_header() {
        let mut t = Loopback {
            exchanges: 0,
            last_target: None,
        };
        let mut tx = [0u8; 32];
        let mut rx = [0u8; 32];
        let mut bus = Bus::new(&mut t, &mut tx, &mut rx, 1_000_000);
        bus.run(
            &Command::burst_write(0x10, 3, Direction::Forward),
            &[1, 2, 3],
            &mut [],
        )
        .unwrap();
        assert_eq!(&tx[..5], &[0x26, 0x10, 1, 2, 3]);
        assert_eq!(t.exchanges, 1);
        assert_eq!(t.last_target, Some(Target::Sensor));
    }

    #[test]
    fn test_mismatched_buffers_rejected_without_exchange() {
        let mut t = Loopback {
            exchanges: 0,
            last_target: None,
        };
        let mut tx = [0u8; 32];
        let mut rx = [0u8; 32];
        let mut bus = Bus::new(&mut t, &mut tx, &mut rx, 1_000_000);
        let mut short = [0u8; 2];
        let err = bus.run(&Command::GetHistogram { len: 4 }, &[], &mut short);
        assert_eq!(err, Err(Error::InvalidArgument));
        let err = bus.run(&Command::GetHistogram { len: 64 }, &[], &mut [0u8; 64]);
        assert_eq!(err, Err(Error::InvalidArgument));
        assert_eq!(t.exchanges, 0);
    }

    #[test]
    fn test_read_response_follows_header() {
        let mut t = Loopback {
            exchanges: 0,
            last_target: None,
        };
        let mut tx = [0u8; 32];
        let mut rx = [0u8; 32];
        let mut bus = Bus::new(&mut t, &mut tx, &mut rx, 1_000_000);
        let mut out = [0u8; 1];
        // Loopback returns the address byte one position later
        bus.run(&Command::ReadRegister { addr: 0x42 }, &[], &mut out)
            .unwrap();
        assert_eq!(out, [0x42]);
    }
}
