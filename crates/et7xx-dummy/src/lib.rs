//! et7xx-dummy - In-memory ET7xx sensor emulator for testing
//!
//! This crate provides a [`BusTransport`] that emulates the sensor and its
//! EEPROM in memory: register file, efuse, frame buffer, CIS path, zone
//! average and histogram tables, and an SPI NOR EEPROM with WEL/WIP
//! status. It's useful for testing and development without real hardware.
//!
//! Every exchange is recorded in a shared [`BusMonitor`] that outlives the
//! emulator once it has been moved into a session.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use et7xx_core::bus::{BusTransport, PowerRail, SleepPin};
use et7xx_core::error::{Error, Result, TransportStatus};
use et7xx_core::spi::{
    eeprom, AddressWidth, EepromStatus, Target, OP_CIS_ADDR_R, OP_CIS_REG_W, OP_EF_R, OP_EF_W,
    OP_FB_R, OP_FB_W, OP_GET_FRAME, OP_HSTG_R, OP_REG_R, OP_REG_R_S, OP_REG_R_S_BW, OP_REG_W,
    OP_REG_W_S, OP_REG_W_S_BW, OP_ZAVG_R, REG_EEPROM_WRITE_CTRL,
};

/// Configuration for the dummy sensor
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Frame buffer size in bytes
    pub frame_size: usize,
    /// EEPROM size in bytes
    pub eeprom_size: usize,
    /// Status reads that report WIP after each program or erase
    pub busy_polls: u32,
    /// Report WIP forever once a program or erase starts
    pub stuck_busy: bool,
    /// Ignore WREN, as a write-protected part would
    pub ignore_wren: bool,
    /// Highest clock the emulated bus accepts
    pub max_speed_hz: u32,
    /// Time each exchange takes
    pub exchange_delay: Option<Duration>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            frame_size: 64 * 1024,
            eeprom_size: 256 * 1024,
            busy_polls: 2,
            stuck_busy: false,
            ignore_wren: false,
            max_speed_hz: 50_000_000,
            exchange_delay: None,
        }
    }
}

/// One recorded bus exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEvent {
    /// Chip select
    pub target: Target,
    /// First byte clocked out
    pub opcode: u8,
    /// Total bytes exchanged
    pub len: usize,
    /// Clock the exchange ran at
    pub speed_hz: u32,
}

#[derive(Debug, Default)]
struct MonitorState {
    events: Mutex<Vec<BusEvent>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay_us: AtomicU64,
}

/// Shared log of bus activity
#[derive(Debug, Clone, Default)]
pub struct BusMonitor {
    state: Arc<MonitorState>,
}

impl BusMonitor {
    /// All recorded exchanges, oldest first
    pub fn events(&self) -> Vec<BusEvent> {
        self.state
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded exchanges
    pub fn exchanges(&self) -> usize {
        self.state
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Opcodes of the recorded exchanges for `target`
    pub fn opcodes(&self, target: Target) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter(|e| e.target == target)
            .map(|e| e.opcode)
            .collect()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.state
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.state.max_in_flight.store(0, Ordering::SeqCst);
        self.state.delay_us.store(0, Ordering::SeqCst);
    }

    /// Most exchanges ever seen in progress at the same time
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Sum of all requested delays in microseconds
    pub fn total_delay_us(&self) -> u64 {
        self.state.delay_us.load(Ordering::SeqCst)
    }

    fn begin(&self, event: BusEvent) -> InFlight {
        self.state
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(Arc::clone(&self.state))
    }
}

struct InFlight(Arc<MonitorState>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Emulated ET7xx sensor and EEPROM
pub struct DummySensor {
    config: DummyConfig,
    registers: [u8; 256],
    efuse: [u8; 256],
    cis_registers: [u8; 256],
    frame: Vec<u8>,
    frame_pos: usize,
    cis_frame: Vec<u8>,
    cis_pos: usize,
    zone_average: Vec<u8>,
    histogram: Vec<u8>,
    captures: usize,
    eeprom: Vec<u8>,
    wel: bool,
    busy: u32,
    stuck: bool,
    monitor: BusMonitor,
    exchanges: usize,
    fail_after: Option<usize>,
    trip: Option<(usize, Arc<AtomicBool>)>,
}

/// Byte `i` of the default frame contents
pub fn frame_pattern(i: usize) -> u8 {
    (i.wrapping_mul(7) ^ (i >> 8)) as u8
}

impl DummySensor {
    /// Create a new dummy sensor with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let frame = (0..config.frame_size).map(frame_pattern).collect();
        let cis_frame = (0..config.frame_size)
            .map(|i| !frame_pattern(i))
            .collect();
        let eeprom = vec![0xFF; config.eeprom_size];
        Self {
            registers: [0; 256],
            efuse: [0; 256],
            cis_registers: [0; 256],
            frame,
            frame_pos: 0,
            cis_frame,
            cis_pos: 0,
            zone_average: (0..64u8).collect(),
            histogram: (0..64u8).map(|i| 0xFF - i).collect(),
            captures: 0,
            eeprom,
            wel: false,
            busy: 0,
            stuck: false,
            monitor: BusMonitor::default(),
            exchanges: 0,
            fail_after: None,
            trip: None,
            config,
        }
    }

    /// Create a new dummy sensor with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Replace the frame buffer contents
    pub fn with_frame(mut self, frame: Vec<u8>) -> Self {
        self.frame = frame;
        self
    }

    /// Preload the EEPROM
    pub fn with_eeprom_data(mut self, addr: usize, data: &[u8]) -> Self {
        let end = core::cmp::min(addr + data.len(), self.eeprom.len());
        if addr < end {
            self.eeprom[addr..end].copy_from_slice(&data[..end - addr]);
        }
        self
    }

    /// Fail every exchange after the first `n` with an I/O status
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Set `flag` once `n` exchanges have completed
    pub fn trip_after(mut self, n: usize, flag: Arc<AtomicBool>) -> Self {
        self.trip = Some((n, flag));
        self
    }

    /// Handle to the exchange log
    pub fn monitor(&self) -> BusMonitor {
        self.monitor.clone()
    }

    /// Number of pre-captures seen
    pub fn captures(&self) -> usize {
        self.captures
    }

    /// Get a reference to the EEPROM contents
    pub fn eeprom_data(&self) -> &[u8] {
        &self.eeprom
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    fn write_gate_open(&self) -> bool {
        self.registers[REG_EEPROM_WRITE_CTRL as usize] & 0x01 != 0
    }

    fn sensor_exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        let op = tx[0];
        let n = tx.len();
        match op {
            OP_REG_R | OP_CIS_ADDR_R if n == 3 => {
                let regs = if op == OP_REG_R {
                    &self.registers
                } else {
                    &self.cis_registers
                };
                rx[2] = regs[tx[1] as usize];
            }
            OP_REG_W | OP_CIS_REG_W if n == 3 => {
                let regs = if op == OP_REG_W {
                    &mut self.registers
                } else {
                    &mut self.cis_registers
                };
                regs[tx[1] as usize] = tx[2];
            }
            OP_REG_R_S | OP_REG_R_S_BW | OP_EF_R if n >= 2 => {
                let addr = tx[1];
                for (i, out) in rx[2..].iter_mut().enumerate() {
                    let a = if op == OP_REG_R_S_BW {
                        addr.wrapping_sub(i as u8)
                    } else {
                        addr.wrapping_add(i as u8)
                    };
                    *out = if op == OP_EF_R {
                        self.efuse[a as usize]
                    } else {
                        self.registers[a as usize]
                    };
                }
            }
            OP_REG_W_S | OP_REG_W_S_BW | OP_EF_W if n >= 2 => {
                let addr = tx[1];
                for (i, &byte) in tx[2..].iter().enumerate() {
                    let a = if op == OP_REG_W_S_BW {
                        addr.wrapping_sub(i as u8)
                    } else {
                        addr.wrapping_add(i as u8)
                    };
                    if op == OP_EF_W {
                        // One-time programmable: bits can only be set
                        self.efuse[a as usize] |= byte;
                    } else {
                        self.registers[a as usize] = byte;
                    }
                }
            }
            OP_FB_R => {
                let len = self.frame.len();
                for out in rx[1..].iter_mut() {
                    *out = self.frame[self.frame_pos % len];
                    self.frame_pos += 1;
                }
            }
            OP_FB_W => {
                let len = self.frame.len();
                for &byte in &tx[1..] {
                    self.frame[self.frame_pos % len] = byte;
                    self.frame_pos += 1;
                }
            }
            OP_GET_FRAME => {
                let len = self.cis_frame.len();
                for out in rx[1..].iter_mut() {
                    *out = self.cis_frame[self.cis_pos % len];
                    self.cis_pos += 1;
                }
            }
            OP_ZAVG_R => {
                for (i, out) in rx[1..].iter_mut().enumerate() {
                    *out = self.zone_average[i % self.zone_average.len()];
                }
            }
            // Pre-capture and histogram share one opcode; a bare opcode is
            // a capture
            OP_HSTG_R if n == 1 => {
                self.frame_pos = 0;
                self.cis_pos = 0;
                self.captures += 1;
                log::debug!("dummy: pre-capture #{}", self.captures);
            }
            OP_HSTG_R => {
                for (i, out) in rx[1..].iter_mut().enumerate() {
                    *out = self.histogram[i % self.histogram.len()];
                }
            }
            _ => {
                log::debug!("dummy: unsupported sensor command 0x{:02X} ({} bytes)", op, n);
                return Err(Error::TransportError(TransportStatus::IO));
            }
        }
        Ok(())
    }

    fn eeprom_status(&mut self) -> u8 {
        let mut sr = EepromStatus::empty();
        if self.wel {
            sr |= EepromStatus::WEL;
        }
        if self.stuck || self.busy > 0 {
            sr |= EepromStatus::WIP;
            self.busy = self.busy.saturating_sub(1);
        }
        sr.bits()
    }

    /// Consume WEL for a program or erase; false if the command is ignored
    fn begin_modify(&mut self) -> bool {
        if !self.wel {
            log::debug!("dummy: eeprom modify ignored, WEL clear");
            return false;
        }
        self.wel = false;
        if !self.write_gate_open() {
            log::debug!("dummy: eeprom modify ignored, write controller closed");
            return false;
        }
        true
    }

    fn end_modify(&mut self) {
        self.busy = self.config.busy_polls;
        self.stuck = self.config.stuck_busy;
    }

    fn erase(&mut self, addr: usize, size: usize) {
        if self.begin_modify() {
            let len = self.eeprom.len();
            let start = (addr & !(size - 1)) % len;
            let end = core::cmp::min(start + size, len);
            self.eeprom[start..end].fill(0xFF);
            self.end_modify();
        }
    }

    fn eeprom_exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        let op = tx[0];
        if op == eeprom::RDSR {
            if rx.len() < 2 {
                return Err(Error::TransportError(TransportStatus::IO));
            }
            rx[1] = self.eeprom_status();
            return Ok(());
        }
        if self.stuck || self.busy > 0 {
            log::debug!("dummy: eeprom busy, ignoring 0x{:02X}", op);
            return Ok(());
        }

        let three = AddressWidth::ThreeByte;
        let address = |tx: &[u8]| {
            three
                .decode(&tx[1..])
                .map(|a| a as usize)
                .ok_or(Error::TransportError(TransportStatus::IO))
        };

        match op {
            eeprom::WREN => self.wel = !self.config.ignore_wren,
            eeprom::WRDI => self.wel = false,
            eeprom::READ | eeprom::FAST_READ => {
                let addr = address(tx)?;
                let start = if op == eeprom::FAST_READ { 5 } else { 4 };
                let len = self.eeprom.len();
                for (i, out) in rx.iter_mut().skip(start).enumerate() {
                    *out = self.eeprom[(addr + i) % len];
                }
            }
            eeprom::PP => {
                let addr = address(tx)?;
                if self.begin_modify() {
                    let page = addr & !(eeprom::PAGE_SIZE - 1);
                    let len = self.eeprom.len();
                    for (i, &byte) in tx.iter().skip(4).enumerate() {
                        let offset = (addr + i) % eeprom::PAGE_SIZE;
                        // Programming can only clear bits
                        self.eeprom[(page + offset) % len] &= byte;
                    }
                    self.end_modify();
                }
            }
            eeprom::SE => {
                let addr = address(tx)?;
                self.erase(addr, eeprom::SECTOR_SIZE as usize);
            }
            eeprom::BE => {
                let addr = address(tx)?;
                self.erase(addr, eeprom::BLOCK_SIZE as usize);
            }
            eeprom::CE => {
                if self.begin_modify() {
                    self.eeprom.fill(0xFF);
                    self.end_modify();
                }
            }
            _ => {
                log::debug!("dummy: unsupported eeprom command 0x{:02X}", op);
                return Err(Error::TransportError(TransportStatus::IO));
            }
        }
        Ok(())
    }
}

impl BusTransport for DummySensor {
    fn max_speed_hz(&self) -> u32 {
        self.config.max_speed_hz
    }

    fn exchange(&mut self, target: Target, tx: &[u8], rx: &mut [u8], speed_hz: u32) -> Result<()> {
        let _in_flight = self.monitor.begin(BusEvent {
            target,
            opcode: tx.first().copied().unwrap_or(0),
            len: tx.len(),
            speed_hz,
        });
        if let Some(delay) = self.config.exchange_delay {
            std::thread::sleep(delay);
        }

        if tx.is_empty() || tx.len() != rx.len() {
            return Err(Error::InvalidArgument);
        }

        self.exchanges += 1;
        if self.fail_after.is_some_and(|limit| self.exchanges > limit) {
            log::debug!("dummy: injected failure on exchange {}", self.exchanges);
            return Err(Error::TransportError(TransportStatus::IO));
        }

        let result = match target {
            Target::Sensor => self.sensor_exchange(tx, rx),
            Target::Eeprom => self.eeprom_exchange(tx, rx),
        };

        if let Some((n, flag)) = &self.trip {
            if self.exchanges >= *n {
                flag.store(true, Ordering::Release);
            }
        }
        result
    }

    fn delay_us(&mut self, us: u32) {
        // No real delay needed for in-memory operations
        self.monitor
            .state
            .delay_us
            .fetch_add(u64::from(us), Ordering::SeqCst);
    }
}

/// Power rail whose state can be observed through a clone
#[derive(Debug, Clone, Default)]
pub struct DummyRail {
    enabled: Arc<AtomicBool>,
    toggles: Arc<AtomicUsize>,
    fail: bool,
}

impl DummyRail {
    /// Rail that always switches
    pub fn new() -> Self {
        Self::default()
    }

    /// Rail that refuses to switch
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Whether the rail is on
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Number of successful switches
    pub fn toggles(&self) -> usize {
        self.toggles.load(Ordering::SeqCst)
    }

    fn set(&mut self, on: bool) -> Result<()> {
        if self.fail {
            return Err(Error::PowerControl);
        }
        self.enabled.store(on, Ordering::SeqCst);
        self.toggles.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl PowerRail for DummyRail {
    fn enable(&mut self) -> Result<()> {
        self.set(true)
    }

    fn disable(&mut self) -> Result<()> {
        self.set(false)
    }
}

/// Sleep pin that records every level it is driven to
#[derive(Debug, Clone, Default)]
pub struct DummyPin {
    levels: Arc<Mutex<Vec<bool>>>,
}

impl DummyPin {
    /// Create a pin with no history
    pub fn new() -> Self {
        Self::default()
    }

    /// Every level driven so far, oldest first
    pub fn history(&self) -> Vec<bool> {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Last level driven
    pub fn level(&self) -> Option<bool> {
        self.history().last().copied()
    }
}

impl SleepPin for DummyPin {
    fn set_level(&mut self, high: bool) -> Result<()> {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(high);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use et7xx_core::bus::Bus;
    use et7xx_core::protocol;
    use et7xx_core::spi::{Direction, MAX_HEADER_LEN};

    fn scratch() -> (Vec<u8>, Vec<u8>) {
        (vec![0u8; 1024 + MAX_HEADER_LEN], vec![0u8; 1024 + MAX_HEADER_LEN])
    }

    #[test]
    fn test_register_round_trip() {
        let mut sensor = DummySensor::new_default();
        let (mut tx, mut rx) = scratch();
        let mut bus = Bus::new(&mut sensor, &mut tx, &mut rx, 20_000_000);

        protocol::write_register(&mut bus, 0x10, 0x5A).unwrap();
        assert_eq!(protocol::read_register(&mut bus, 0x10).unwrap(), 0x5A);
    }

    #[test]
    fn test_backward_burst_reverses() {
        let mut sensor = DummySensor::new_default();
        let (mut tx, mut rx) = scratch();
        let mut bus = Bus::new(&mut sensor, &mut tx, &mut rx, 20_000_000);

        protocol::burst_write(&mut bus, 0x20, Direction::Forward, &[1, 2, 3, 4]).unwrap();
        let mut fwd = [0u8; 4];
        let mut bwd = [0u8; 4];
        protocol::burst_read(&mut bus, 0x20, Direction::Forward, &mut fwd).unwrap();
        protocol::burst_read(&mut bus, 0x23, Direction::Backward, &mut bwd).unwrap();
        assert_eq!(fwd, [1, 2, 3, 4]);
        assert_eq!(bwd, [4, 3, 2, 1]);
    }

    #[test]
    fn test_efuse_bits_only_set() {
        let mut sensor = DummySensor::new_default();
        let (mut tx, mut rx) = scratch();
        let mut bus = Bus::new(&mut sensor, &mut tx, &mut rx, 20_000_000);

        protocol::write_efuse(&mut bus, 0x00, &[0x0F]).unwrap();
        protocol::write_efuse(&mut bus, 0x00, &[0xF0]).unwrap();
        let mut out = [0u8; 1];
        protocol::read_efuse(&mut bus, 0x00, &mut out).unwrap();
        assert_eq!(out, [0xFF]);
    }

    #[test]
    fn test_pre_capture_rewinds_frame() {
        let mut sensor = DummySensor::new_default();
        let (mut tx, mut rx) = scratch();
        {
            let mut bus = Bus::new(&mut sensor, &mut tx, &mut rx, 20_000_000);
            let mut first = [0u8; 16];
            let mut second = [0u8; 16];
            protocol::pre_capture(&mut bus).unwrap();
            protocol::get_frame(&mut bus, &mut first, None).unwrap();
            protocol::pre_capture(&mut bus).unwrap();
            protocol::get_frame(&mut bus, &mut second, None).unwrap();
            assert_eq!(first, second);
        }
        assert_eq!(sensor.captures(), 2);
    }

    #[test]
    fn test_histogram_is_not_a_capture() {
        let mut sensor = DummySensor::new_default();
        let (mut tx, mut rx) = scratch();
        {
            let mut bus = Bus::new(&mut sensor, &mut tx, &mut rx, 20_000_000);
            let mut hist = [0u8; 4];
            protocol::get_histogram(&mut bus, &mut hist).unwrap();
            assert_eq!(hist, [0xFF, 0xFE, 0xFD, 0xFC]);
        }
        assert_eq!(sensor.captures(), 0);
    }

    #[test]
    fn test_eeprom_program_needs_gate_and_wel() {
        let mut sensor = DummySensor::new_default();
        let (mut tx, mut rx) = scratch();
        {
            let mut bus = Bus::new(&mut sensor, &mut tx, &mut rx, 20_000_000);
            // Gate closed: WEL is consumed, data untouched
            protocol::eeprom::write_enable(&mut bus).unwrap();
            protocol::eeprom::program(&mut bus, 0x100, &[0x12, 0x34]).unwrap();

            protocol::write_register(&mut bus, REG_EEPROM_WRITE_CTRL, 0x01).unwrap();
            protocol::eeprom::write_enable(&mut bus).unwrap();
            protocol::eeprom::program(&mut bus, 0x200, &[0x12, 0x34]).unwrap();
            let status = protocol::eeprom::read_status(&mut bus).unwrap();
            assert!(!status.contains(EepromStatus::WEL));
        }
        assert_eq!(&sensor.eeprom_data()[0x100..0x102], &[0xFF, 0xFF]);
        assert_eq!(&sensor.eeprom_data()[0x200..0x202], &[0x12, 0x34]);
    }

    #[test]
    fn test_eeprom_busy_then_ready() {
        let mut sensor = DummySensor::new_default();
        let monitor = sensor.monitor();
        let (mut tx, mut rx) = scratch();
        let mut bus = Bus::new(&mut sensor, &mut tx, &mut rx, 20_000_000);

        protocol::write_register(&mut bus, REG_EEPROM_WRITE_CTRL, 0x01).unwrap();
        protocol::eeprom::write_enable(&mut bus).unwrap();
        monitor.clear();
        protocol::eeprom::sector_erase(&mut bus, 0x1000).unwrap();
        // Erase, two busy polls, one ready poll
        assert_eq!(
            monitor.opcodes(Target::Eeprom),
            vec![eeprom::SE, eeprom::RDSR, eeprom::RDSR, eeprom::RDSR]
        );
    }

    #[test]
    fn test_injected_failure() {
        let mut sensor = DummySensor::new_default().fail_after(1);
        let (mut tx, mut rx) = scratch();
        let mut bus = Bus::new(&mut sensor, &mut tx, &mut rx, 20_000_000);

        protocol::write_register(&mut bus, 0x10, 1).unwrap();
        assert_eq!(
            protocol::read_register(&mut bus, 0x10),
            Err(Error::TransportError(TransportStatus::IO))
        );
    }
}
