//! Device session
//!
//! [`Et7xx`] owns the bus transport, the power and sleep capabilities and
//! the scratch buffers of one sensor. Every operation takes the device
//! mutex for its whole duration, so exchanges from different callers never
//! interleave and the scratch buffers are only ever used by one caller at
//! a time.
//!
//! The scratch buffers exist exactly while at least one session is open:
//! they are allocated by the first [`Et7xx::open`] and released by the
//! last [`Et7xx::close`]. Protocol operations fail with `NotOpen` outside
//! that window.

use core::ops::Range;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::boxed::Box;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::vec;
use std::vec::Vec;

use super::config::SensorConfig;
use super::eeprom::{write_ctrl_value, EepromState, WRITE_CTRL_ENABLE};
use super::request::{locked_runs, IoTransfer, Request, MAX_TRANSFERS};
use crate::bus::{AlwaysOn, Bus, BusTransport, PowerRail, SleepPin};
use crate::error::{Error, Result, SequenceViolation};
use crate::protocol::{self, eeprom, frame};
use crate::spi::{AddressWidth, Direction, EepromStatus, MAX_HEADER_LEN, REG_EEPROM_WRITE_CTRL};

/// Time the sleep pin is held low during a reset pulse
pub const RESET_LOW_US: u32 = 1_000;
/// Time allowed for the sensor to come out of reset
pub const RESET_SETTLE_US: u32 = 5_000;

/// Session ids are unique across every device in the process, so a
/// handle only ever closes the session it was issued for.
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Proof of an open session, consumed by [`Et7xx::close`]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SessionHandle(u64);

impl SessionHandle {
    /// Numeric identity of this session
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// EEPROM erase granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EepromErase {
    /// Whole device
    Chip,
    /// 4 KiB sector at the given address
    Sector(u32),
    /// 64 KiB block at the given address
    Block(u32),
}

struct Scratch {
    tx: Vec<u8>,
    rx: Vec<u8>,
}

impl Scratch {
    fn allocate(len: usize) -> Result<Self> {
        let mut tx = Vec::new();
        let mut rx = Vec::new();
        tx.try_reserve_exact(len)
            .map_err(|_| Error::ResourceExhausted)?;
        rx.try_reserve_exact(len)
            .map_err(|_| Error::ResourceExhausted)?;
        tx.resize(len, 0);
        rx.resize(len, 0);
        Ok(Self { tx, rx })
    }
}

/// Protocol state that ordering rules depend on
#[derive(Debug, Default)]
struct Flags {
    eeprom: EepromState,
    pre_captured: bool,
}

struct State<T> {
    transport: T,
    power: Box<dyn PowerRail + Send>,
    sleep: Box<dyn SleepPin + Send>,
    scratch: Option<Scratch>,
    users: u32,
    handles: BTreeSet<u64>,
    speed_hz: u32,
    speed_override: Option<u32>,
    clock_enabled: bool,
    powered: bool,
    sensor_type: u32,
    flags: Flags,
}

/// One ET7xx sensor
pub struct Et7xx<T: BusTransport> {
    config: SensorConfig,
    state: Mutex<State<T>>,
}

impl<T: BusTransport> Et7xx<T> {
    /// Create a device on `transport`
    ///
    /// Power and sleep pin default to [`AlwaysOn`]; use
    /// [`with_power_rail`](Self::with_power_rail) and
    /// [`with_sleep_pin`](Self::with_sleep_pin) on boards that control
    /// them.
    pub fn new(transport: T, config: SensorConfig) -> Self {
        let state = State {
            transport,
            power: Box::new(AlwaysOn),
            sleep: Box::new(AlwaysOn),
            scratch: None,
            users: 0,
            handles: BTreeSet::new(),
            speed_hz: config.spi_clock_hz,
            speed_override: None,
            clock_enabled: true,
            powered: false,
            sensor_type: config.sensor_type,
            flags: Flags::default(),
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Use `rail` to switch the sensor supply
    pub fn with_power_rail(mut self, rail: impl PowerRail + Send + 'static) -> Self {
        self.state_mut().power = Box::new(rail);
        self
    }

    /// Use `pin` as the sleep/reset line
    pub fn with_sleep_pin(mut self, pin: impl SleepPin + Send + 'static) -> Self {
        self.state_mut().sleep = Box::new(pin);
        self
    }

    fn state_mut(&mut self) -> &mut State<T> {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configuration the device was created with
    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    // --- Session lifecycle ---

    /// Open a session
    ///
    /// The first open allocates the scratch buffers; allocation failure is
    /// reported as `ResourceExhausted` and leaves the device closed.
    pub fn open(&self) -> Result<SessionHandle> {
        let mut state = self.lock();
        if state.users == 0 {
            if self.config.bufsiz == 0 {
                return Err(Error::InvalidArgument);
            }
            let len = self
                .config
                .bufsiz
                .checked_add(MAX_HEADER_LEN)
                .ok_or(Error::ResourceExhausted)?;
            state.scratch = Some(Scratch::allocate(len)?);
            log::debug!("et7xx: allocated {} byte scratch buffers", len);
        }
        state.users = state.users.checked_add(1).ok_or(Error::ResourceExhausted)?;

        let id = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        state.handles.insert(id);
        log::debug!("et7xx: session {} opened ({} users)", id, state.users);
        Ok(SessionHandle(id))
    }

    /// Close a session
    ///
    /// A handle issued by another device is rejected with
    /// `InvalidArgument`. The last close releases the scratch buffers and clears the EEPROM
    /// write-enable and pre-capture tracking.
    pub fn close(&self, handle: SessionHandle) -> Result<()> {
        let mut state = self.lock();
        if !state.handles.remove(&handle.0) {
            return Err(Error::InvalidArgument);
        }
        state.users -= 1;
        if state.users == 0 {
            state.scratch = None;
            state.flags = Flags::default();
            log::debug!("et7xx: last session closed, scratch buffers released");
        } else {
            log::debug!("et7xx: session {} closed ({} users)", handle.0, state.users);
        }
        Ok(())
    }

    /// Number of open sessions
    pub fn users(&self) -> u32 {
        self.lock().users
    }

    /// Whether the scratch buffers are allocated
    pub fn has_buffer(&self) -> bool {
        self.lock().scratch.is_some()
    }

    // --- Register and efuse access ---

    /// Read one sensor register
    pub fn read_register(&self, addr: u8) -> Result<u8> {
        self.lock().read_register(addr)
    }

    /// Write one sensor register
    pub fn write_register(&self, addr: u8, value: u8) -> Result<()> {
        self.lock().write_register(addr, value)
    }

    /// Burst read `len` registers starting at `addr`
    ///
    /// Backward bursts walk down from `addr`.
    pub fn burst_read(&self, addr: u8, len: usize, direction: Direction) -> Result<Vec<u8>> {
        self.lock().burst_read(addr, len, direction)
    }

    /// Burst write `data` starting at `addr`
    pub fn burst_write(&self, addr: u8, data: &[u8], direction: Direction) -> Result<()> {
        self.lock().burst_write(addr, data, direction)
    }

    /// Read `len` efuse bytes starting at `addr`
    pub fn read_efuse(&self, addr: u8, len: usize) -> Result<Vec<u8>> {
        self.lock().read_efuse(addr, len)
    }

    /// Program efuse bytes starting at `addr`
    pub fn write_efuse(&self, addr: u8, data: &[u8]) -> Result<()> {
        self.lock().write_efuse(addr, data)
    }

    // --- Frame access ---

    /// Trigger an image capture
    pub fn pre_capture(&self) -> Result<()> {
        self.lock().pre_capture(false)
    }

    /// Read a `size` byte frame
    ///
    /// Frames larger than the scratch buffer are read in four chunks. The
    /// result is either the complete frame or an error.
    pub fn get_frame(&self, size: usize) -> Result<Vec<u8>> {
        self.lock().read_frame(&self.config, size, None, false)
    }

    /// Like [`get_frame`](Self::get_frame), stopping between chunks once
    /// `cancel` is set
    pub fn get_frame_cancellable(&self, size: usize, cancel: &AtomicBool) -> Result<Vec<u8>> {
        self.lock().read_frame(&self.config, size, Some(cancel), false)
    }

    /// Write a frame into the frame buffer
    pub fn write_frame(&self, data: &[u8]) -> Result<()> {
        self.lock().write_frame(data)
    }

    /// Read the zone average table
    pub fn get_zone_average(&self, size: usize) -> Result<Vec<u8>> {
        self.lock().read_table(&self.config, size, false)
    }

    /// Read the histogram table
    pub fn get_histogram(&self, size: usize) -> Result<Vec<u8>> {
        self.lock().read_table(&self.config, size, true)
    }

    /// Send raw command bytes and return the full-duplex response
    pub fn transfer_command(&self, tx: &[u8]) -> Result<Vec<u8>> {
        self.lock().transfer_command(tx)
    }

    // --- CIS access ---

    /// Read a CIS register
    pub fn read_cis_register(&self, addr: u8) -> Result<u8> {
        self.lock().read_cis_register(addr)
    }

    /// Write a CIS register
    pub fn write_cis_register(&self, addr: u8, value: u8) -> Result<()> {
        self.lock().write_cis_register(addr, value)
    }

    /// Trigger a CIS capture
    pub fn pre_capture_cis(&self) -> Result<()> {
        self.lock().pre_capture(true)
    }

    /// Read a `size` byte CIS frame
    pub fn get_cis_frame(&self, size: usize) -> Result<Vec<u8>> {
        self.lock().read_frame(&self.config, size, None, true)
    }

    /// Like [`get_cis_frame`](Self::get_cis_frame) with cancellation
    pub fn get_cis_frame_cancellable(&self, size: usize, cancel: &AtomicBool) -> Result<Vec<u8>> {
        self.lock().read_frame(&self.config, size, Some(cancel), true)
    }

    // --- EEPROM access ---

    /// Current write-enable tracking state
    pub fn eeprom_state(&self) -> EepromState {
        self.lock().flags.eeprom
    }

    /// Read the EEPROM status register (allowed in any state)
    pub fn eeprom_read_status(&self) -> Result<EepromStatus> {
        let mut state = self.lock();
        let (mut bus, _) = state.bus()?;
        eeprom::read_status(&mut bus)
    }

    /// Read `len` bytes starting at `addr`
    pub fn eeprom_read(&self, addr: u32, len: usize) -> Result<Vec<u8>> {
        self.lock().eeprom_read(addr, len, false)
    }

    /// Read with the FAST_READ command
    pub fn eeprom_fast_read(&self, addr: u32, len: usize) -> Result<Vec<u8>> {
        self.lock().eeprom_read(addr, len, true)
    }

    /// Set the write enable latch
    pub fn eeprom_write_enable(&self) -> Result<()> {
        self.lock().eeprom_write_enable()
    }

    /// Clear the write enable latch
    pub fn eeprom_write_disable(&self) -> Result<()> {
        self.lock().eeprom_write_disable()
    }

    /// Program `data` at `addr`
    ///
    /// Requires a preceding [`eeprom_write_enable`](Self::eeprom_write_enable);
    /// fails with `SequenceError` and no bus traffic otherwise. Returns
    /// to `Idle` whether or not the write succeeds.
    pub fn eeprom_write(&self, addr: u32, data: &[u8]) -> Result<()> {
        self.lock().eeprom_write(addr, data)
    }

    /// Program `data` at `addr` through the non-secure path
    ///
    /// Opens the write-controller gate for the duration of the write if it
    /// is closed. Refused with `SequenceError` in secure mode.
    pub fn eeprom_write_non_secure(&self, addr: u32, data: &[u8]) -> Result<()> {
        self.lock().eeprom_write_non_secure(&self.config, addr, data)
    }

    /// Erase the whole EEPROM
    pub fn eeprom_chip_erase(&self) -> Result<()> {
        self.lock().eeprom_erase(EepromErase::Chip)
    }

    /// Erase the 4 KiB sector at `addr`
    pub fn eeprom_sector_erase(&self, addr: u32) -> Result<()> {
        self.lock().eeprom_erase(EepromErase::Sector(addr))
    }

    /// Erase the 64 KiB block at `addr`
    pub fn eeprom_block_erase(&self, addr: u32) -> Result<()> {
        self.lock().eeprom_erase(EepromErase::Block(addr))
    }

    /// Open or close the write-controller gate
    ///
    /// The gate persists until toggled again.
    pub fn eeprom_write_controller(&self, enable: bool) -> Result<()> {
        self.lock().eeprom_write_controller(enable)
    }

    // --- Power, reset and clock ---

    /// Pulse the sleep pin
    pub fn reset(&self) -> Result<()> {
        self.lock().reset()
    }

    /// Switch the sensor supply
    pub fn set_power(&self, on: bool) -> Result<()> {
        self.lock().set_power(on)
    }

    /// Whether the supply is on
    pub fn is_powered(&self) -> bool {
        self.lock().powered
    }

    /// Drive the sleep pin to `level`
    pub fn reset_control(&self, level: bool) -> Result<()> {
        self.lock().reset_control(level)
    }

    /// Change the bus clock
    ///
    /// Zero and values above the configured or hardware maximum are
    /// rejected with `InvalidArgument`.
    pub fn set_spi_clock(&self, hz: u32) -> Result<()> {
        self.lock().set_spi_clock(&self.config, hz)
    }

    /// Current bus clock
    pub fn spi_clock_hz(&self) -> u32 {
        self.lock().speed_hz
    }

    /// Gate the bus clock until the next exchange
    pub fn disable_spi_clock(&self) {
        self.lock().disable_spi_clock()
    }

    /// Whether the bus clock is running
    pub fn is_clock_enabled(&self) -> bool {
        self.lock().clock_enabled
    }

    /// Select the sensor variant
    pub fn set_sensor_type(&self, sensor_type: u32) {
        self.lock().sensor_type = sensor_type;
    }

    /// Selected sensor variant
    pub fn sensor_type(&self) -> u32 {
        self.lock().sensor_type
    }

    /// Configured SPI value
    pub fn spi_value(&self) -> u32 {
        self.config.spi_value
    }

    /// Configured model string
    pub fn model_info(&self) -> &str {
        &self.config.model_info
    }

    // --- Transfer records ---

    /// Execute one transfer record
    pub fn execute(&self, xfer: &mut IoTransfer<'_>) -> Result<()> {
        self.lock().execute(&self.config, xfer)
    }

    /// Execute up to [`MAX_TRANSFERS`] records in order
    ///
    /// With `atomic` the device lock is held across the whole array, so no
    /// other caller's traffic lands between records; a record with
    /// `cs_change` set ends the locked run early. Execution stops at the
    /// first failing record.
    pub fn message(&self, transfers: &mut [IoTransfer<'_>], atomic: bool) -> Result<()> {
        if transfers.len() > MAX_TRANSFERS {
            log::debug!(
                "et7xx: message of {} transfers exceeds {}",
                transfers.len(),
                MAX_TRANSFERS
            );
            return Err(Error::InvalidArgument);
        }

        if atomic {
            for run in locked_runs(transfers) {
                let mut state = self.lock();
                for xfer in run.iter_mut() {
                    state.execute(&self.config, xfer)?;
                }
            }
        } else {
            for xfer in transfers.iter_mut() {
                self.lock().execute(&self.config, xfer)?;
            }
        }
        Ok(())
    }
}

fn require_pre_capture(config: &SensorConfig, flags: &Flags) -> Result<()> {
    if config.require_pre_capture && !flags.pre_captured {
        log::warn!("et7xx: frame data requested without pre-capture");
        return Err(Error::SequenceError(SequenceViolation::NoPreCapture));
    }
    Ok(())
}

/// Check that the device still has WEL set before a write or erase
fn confirm_latch<T: BusTransport + ?Sized>(bus: &mut Bus<'_, T>) -> Result<()> {
    let status = eeprom::read_status(bus)?;
    if !status.contains(EepromStatus::WEL) {
        log::warn!(
            "et7xx: eeprom write enable latch lost (status 0x{:02X})",
            status.bits()
        );
        return Err(Error::SequenceError(SequenceViolation::LatchLost));
    }
    Ok(())
}

fn tx_slice<'a>(xfer: &IoTransfer<'a>, range: Range<usize>) -> Result<&'a [u8]> {
    xfer.tx
        .and_then(|tx| tx.get(range))
        .ok_or(Error::InvalidArgument)
}

fn rx_slice<'b>(xfer: &'b mut IoTransfer<'_>, len: usize) -> Result<&'b mut [u8]> {
    xfer.rx
        .as_deref_mut()
        .and_then(|rx| rx.get_mut(..len))
        .ok_or(Error::InvalidArgument)
}

fn tx_address(xfer: &IoTransfer<'_>) -> Result<u32> {
    let width = AddressWidth::ThreeByte;
    width
        .decode(tx_slice(xfer, 0..width.bytes() as usize)?)
        .ok_or(Error::InvalidArgument)
}

impl<T: BusTransport> State<T> {
    fn ensure_open(&self) -> Result<()> {
        if self.users == 0 {
            return Err(Error::NotOpen);
        }
        Ok(())
    }

    /// Bind the transport to the scratch buffers
    fn bus(&mut self) -> Result<(Bus<'_, T>, &mut Flags)> {
        self.ensure_open()?;
        if !self.clock_enabled {
            log::debug!("et7xx: re-enabling SPI clock at {} Hz", self.speed_hz);
            self.clock_enabled = true;
        }
        let speed = self.speed_override.unwrap_or(self.speed_hz);
        let scratch = self.scratch.as_mut().ok_or(Error::NotOpen)?;
        let bus = Bus::new(&mut self.transport, &mut scratch.tx, &mut scratch.rx, speed);
        Ok((bus, &mut self.flags))
    }

    fn max_speed_hz(&self, config: &SensorConfig) -> u32 {
        core::cmp::min(config.max_spi_clock_hz, self.transport.max_speed_hz())
    }

    fn read_register(&mut self, addr: u8) -> Result<u8> {
        let (mut bus, _) = self.bus()?;
        protocol::read_register(&mut bus, addr)
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<()> {
        let (mut bus, _) = self.bus()?;
        protocol::write_register(&mut bus, addr, value)
    }

    fn burst_read(&mut self, addr: u8, len: usize, direction: Direction) -> Result<Vec<u8>> {
        let (mut bus, _) = self.bus()?;
        bus.check_len(len)?;
        let mut out = vec![0u8; len];
        protocol::burst_read(&mut bus, addr, direction, &mut out)?;
        Ok(out)
    }

    fn burst_write(&mut self, addr: u8, data: &[u8], direction: Direction) -> Result<()> {
        let (mut bus, _) = self.bus()?;
        protocol::burst_write(&mut bus, addr, direction, data)
    }

    fn read_efuse(&mut self, addr: u8, len: usize) -> Result<Vec<u8>> {
        let (mut bus, _) = self.bus()?;
        bus.check_len(len)?;
        let mut out = vec![0u8; len];
        protocol::read_efuse(&mut bus, addr, &mut out)?;
        Ok(out)
    }

    fn write_efuse(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        let (mut bus, _) = self.bus()?;
        protocol::write_efuse(&mut bus, addr, data)
    }

    fn pre_capture(&mut self, cis: bool) -> Result<()> {
        let (mut bus, flags) = self.bus()?;
        flags.pre_captured = false;
        if cis {
            protocol::pre_capture_cis(&mut bus)?;
        } else {
            protocol::pre_capture(&mut bus)?;
        }
        flags.pre_captured = true;
        Ok(())
    }

    fn read_frame(
        &mut self,
        config: &SensorConfig,
        size: usize,
        cancel: Option<&AtomicBool>,
        cis: bool,
    ) -> Result<Vec<u8>> {
        let (mut bus, flags) = self.bus()?;
        require_pre_capture(config, flags)?;
        let plan = frame::chunk_plan(size, bus.capacity())?;

        // Read into a private buffer so a failed transfer never hands back
        // a partial frame
        let mut out = vec![0u8; size];
        flags.pre_captured = false;
        if cis {
            protocol::get_cis_frame(&mut bus, &mut out, cancel)?;
        } else {
            protocol::get_frame(&mut bus, &mut out, cancel)?;
        }
        log::debug!(
            "et7xx: read {} byte {}frame in {} chunk(s)",
            size,
            if cis { "CIS " } else { "" },
            plan.chunks
        );
        Ok(out)
    }

    fn write_frame(&mut self, data: &[u8]) -> Result<()> {
        let (mut bus, _) = self.bus()?;
        protocol::write_frame(&mut bus, data)
    }

    fn read_table(&mut self, config: &SensorConfig, size: usize, histogram: bool) -> Result<Vec<u8>> {
        let (mut bus, flags) = self.bus()?;
        require_pre_capture(config, flags)?;
        bus.check_len(size)?;
        let mut out = vec![0u8; size];
        if histogram {
            protocol::get_histogram(&mut bus, &mut out)?;
        } else {
            protocol::get_zone_average(&mut bus, &mut out)?;
        }
        Ok(out)
    }

    fn transfer_command(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
        let (mut bus, _) = self.bus()?;
        bus.check_len(tx.len())?;
        let mut rx = vec![0u8; tx.len()];
        protocol::transfer_command(&mut bus, tx, &mut rx)?;
        Ok(rx)
    }

    fn read_cis_register(&mut self, addr: u8) -> Result<u8> {
        let (mut bus, _) = self.bus()?;
        protocol::read_cis_register(&mut bus, addr)
    }

    fn write_cis_register(&mut self, addr: u8, value: u8) -> Result<()> {
        let (mut bus, _) = self.bus()?;
        protocol::write_cis_register(&mut bus, addr, value)
    }

    fn eeprom_read(&mut self, addr: u32, len: usize, fast: bool) -> Result<Vec<u8>> {
        let (mut bus, flags) = self.bus()?;
        flags.eeprom.check_read()?;
        eeprom::check_range(addr, len)?;
        let mut out = vec![0u8; len];
        if fast {
            eeprom::fast_read(&mut bus, addr, &mut out)?;
        } else {
            eeprom::read(&mut bus, addr, &mut out)?;
        }
        Ok(out)
    }

    fn eeprom_write_enable(&mut self) -> Result<()> {
        let (mut bus, flags) = self.bus()?;
        eeprom::write_enable(&mut bus)?;
        flags.eeprom = EepromState::WriteEnabled;
        Ok(())
    }

    fn eeprom_write_disable(&mut self) -> Result<()> {
        let (mut bus, flags) = self.bus()?;
        let result = eeprom::write_disable(&mut bus);
        flags.eeprom = EepromState::Idle;
        result
    }

    /// Run a write or erase sequence
    ///
    /// Checks the session latch before any traffic, then confirms WEL on
    /// the device. The state is `Idle` afterwards in every case.
    fn eeprom_modify<F>(&mut self, erase: bool, op: F) -> Result<()>
    where
        F: FnOnce(&mut Bus<'_, T>) -> Result<()>,
    {
        let (mut bus, flags) = self.bus()?;
        flags.eeprom.check_modify()?;
        if let Err(e) = confirm_latch(&mut bus) {
            flags.eeprom = EepromState::Idle;
            return Err(e);
        }

        flags.eeprom = EepromState::busy(erase);
        let result = op(&mut bus);
        flags.eeprom = EepromState::Idle;
        result
    }

    fn eeprom_write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.flags.eeprom.check_modify()?;
        eeprom::check_range(addr, data.len())?;
        // Nothing to program: the latch stays set on both sides
        if data.is_empty() {
            return Ok(());
        }
        self.eeprom_modify(false, |bus| eeprom::program(bus, addr, data))
    }

    fn eeprom_write_non_secure(&mut self, config: &SensorConfig, addr: u32, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if config.secure_mode {
            log::warn!("et7xx: non-secure eeprom write refused in secure mode");
            return Err(Error::SequenceError(SequenceViolation::SecureModeActive));
        }
        self.flags.eeprom.check_modify()?;
        eeprom::check_range(addr, data.len())?;
        if data.is_empty() {
            return Ok(());
        }

        self.eeprom_modify(false, |bus| {
            let ctrl = protocol::read_register(bus, REG_EEPROM_WRITE_CTRL)?;
            let opened = ctrl & WRITE_CTRL_ENABLE == 0;
            if opened {
                protocol::write_register(bus, REG_EEPROM_WRITE_CTRL, write_ctrl_value(ctrl, true))?;
            }
            let result = eeprom::program(bus, addr, data);
            if opened {
                let restored = protocol::write_register(bus, REG_EEPROM_WRITE_CTRL, ctrl);
                return result.and(restored);
            }
            result
        })
    }

    fn eeprom_erase(&mut self, kind: EepromErase) -> Result<()> {
        self.ensure_open()?;
        self.flags.eeprom.check_modify()?;
        match kind {
            EepromErase::Chip => {}
            EepromErase::Sector(addr) => eeprom::check_aligned(addr, crate::spi::eeprom::SECTOR_SIZE)?,
            EepromErase::Block(addr) => eeprom::check_aligned(addr, crate::spi::eeprom::BLOCK_SIZE)?,
        }
        log::debug!("et7xx: eeprom erase {:?}", kind);
        self.eeprom_modify(true, |bus| match kind {
            EepromErase::Chip => eeprom::chip_erase(bus),
            EepromErase::Sector(addr) => eeprom::sector_erase(bus, addr),
            EepromErase::Block(addr) => eeprom::block_erase(bus, addr),
        })
    }

    fn eeprom_write_controller(&mut self, enable: bool) -> Result<()> {
        let (mut bus, _) = self.bus()?;
        let ctrl = protocol::read_register(&mut bus, REG_EEPROM_WRITE_CTRL)?;
        protocol::write_register(&mut bus, REG_EEPROM_WRITE_CTRL, write_ctrl_value(ctrl, enable))?;
        log::debug!(
            "et7xx: eeprom write controller {}",
            if enable { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.flags = Flags::default();
        self.sleep.set_level(false)?;
        self.transport.delay_us(RESET_LOW_US);
        self.sleep.set_level(true)?;
        self.transport.delay_us(RESET_SETTLE_US);
        log::info!("et7xx: sensor reset");
        Ok(())
    }

    fn set_power(&mut self, on: bool) -> Result<()> {
        self.flags = Flags::default();
        if on {
            self.power.enable()?;
            self.sleep.set_level(true)?;
        } else {
            self.sleep.set_level(false)?;
            self.power.disable()?;
        }
        self.powered = on;
        log::info!("et7xx: power {}", if on { "on" } else { "off" });
        Ok(())
    }

    fn reset_control(&mut self, level: bool) -> Result<()> {
        if !level {
            self.flags = Flags::default();
        }
        self.sleep.set_level(level)?;
        log::debug!("et7xx: sleep pin {}", if level { "high" } else { "low" });
        Ok(())
    }

    fn set_spi_clock(&mut self, config: &SensorConfig, hz: u32) -> Result<()> {
        let max = self.max_speed_hz(config);
        if hz == 0 || hz > max {
            log::debug!("et7xx: rejecting SPI clock {} Hz (max {})", hz, max);
            return Err(Error::InvalidArgument);
        }
        self.speed_hz = hz;
        self.clock_enabled = true;
        log::debug!("et7xx: SPI clock set to {} Hz", hz);
        Ok(())
    }

    fn disable_spi_clock(&mut self) {
        self.clock_enabled = false;
        log::debug!("et7xx: SPI clock disabled");
    }

    fn execute(&mut self, config: &SensorConfig, xfer: &mut IoTransfer<'_>) -> Result<()> {
        self.ensure_open()?;
        let request = Request::decode(xfer.opcode, config.secure_mode).ok_or_else(|| {
            log::debug!("et7xx: unknown request 0x{:02X}", xfer.opcode);
            Error::InvalidArgument
        })?;
        if request.is_unsupported() {
            log::debug!("et7xx: unsupported request {:?}", request);
            return Err(Error::InvalidArgument);
        }
        if xfer.bits_per_word != 0 && xfer.bits_per_word != 8 {
            return Err(Error::InvalidArgument);
        }

        if xfer.speed_hz != 0 && request != Request::SetSpiClock {
            if xfer.speed_hz > self.max_speed_hz(config) {
                return Err(Error::InvalidArgument);
            }
            self.speed_override = Some(xfer.speed_hz);
        }
        let result = self.dispatch(config, request, xfer);
        self.speed_override = None;

        if result.is_ok() && xfer.delay_usecs > 0 {
            self.transport.delay_us(u32::from(xfer.delay_usecs));
        }
        result
    }

    fn dispatch(&mut self, config: &SensorConfig, request: Request, xfer: &mut IoTransfer<'_>) -> Result<()> {
        let len = xfer.len as usize;
        match request {
            Request::RegisterRead => {
                let addr = tx_slice(xfer, 0..1)?[0];
                let value = self.read_register(addr)?;
                rx_slice(xfer, 1)?[0] = value;
            }
            Request::RegisterWrite => {
                let buf = tx_slice(xfer, 0..2)?;
                self.write_register(buf[0], buf[1])?;
            }
            Request::BurstRead(direction) => {
                let addr = tx_slice(xfer, 0..1)?[0];
                let rx = rx_slice(xfer, len)?;
                let data = self.burst_read(addr, len, direction)?;
                rx.copy_from_slice(&data);
            }
            Request::BurstWrite(direction) => {
                let addr = tx_slice(xfer, 0..1)?[0];
                let data = tx_slice(xfer, 1..1 + len)?;
                self.burst_write(addr, data, direction)?;
            }
            Request::EfuseRead => {
                let addr = tx_slice(xfer, 0..1)?[0];
                let rx = rx_slice(xfer, len)?;
                let data = self.read_efuse(addr, len)?;
                rx.copy_from_slice(&data);
            }
            Request::EfuseWrite => {
                let addr = tx_slice(xfer, 0..1)?[0];
                let data = tx_slice(xfer, 1..1 + len)?;
                self.write_efuse(addr, data)?;
            }
            Request::GetFrame | Request::GetCisFrame => {
                let rx = rx_slice(xfer, len)?;
                let frame = self.read_frame(config, len, None, request == Request::GetCisFrame)?;
                rx.copy_from_slice(&frame);
            }
            Request::WriteFrame => {
                let data = tx_slice(xfer, 0..len)?;
                self.write_frame(data)?;
            }
            Request::GetZoneAverage | Request::GetHistogram => {
                let rx = rx_slice(xfer, len)?;
                let table = self.read_table(config, len, request == Request::GetHistogram)?;
                rx.copy_from_slice(&table);
            }
            Request::CisRegisterRead => {
                let addr = tx_slice(xfer, 0..1)?[0];
                let value = self.read_cis_register(addr)?;
                rx_slice(xfer, 1)?[0] = value;
            }
            Request::CisRegisterWrite => {
                let buf = tx_slice(xfer, 0..2)?;
                self.write_cis_register(buf[0], buf[1])?;
            }
            Request::CisPreCapture => self.pre_capture(true)?,
            Request::TransferCommand => {
                let tx = tx_slice(xfer, 0..len)?;
                let rx = rx_slice(xfer, len)?;
                let response = self.transfer_command(tx)?;
                rx.copy_from_slice(&response);
            }
            Request::EepromRead | Request::EepromFastRead => {
                let addr = tx_address(xfer)?;
                let rx = rx_slice(xfer, len)?;
                let data = self.eeprom_read(addr, len, request == Request::EepromFastRead)?;
                rx.copy_from_slice(&data);
            }
            Request::EepromWrite | Request::EepromWriteNonSecure => {
                let addr = tx_address(xfer)?;
                let start = AddressWidth::ThreeByte.bytes() as usize;
                let data = tx_slice(xfer, start..start + len)?;
                if request == Request::EepromWrite {
                    self.eeprom_write(addr, data)?;
                } else {
                    self.eeprom_write_non_secure(config, addr, data)?;
                }
            }
            Request::EepromChipErase => self.eeprom_erase(EepromErase::Chip)?,
            Request::EepromSectorErase => {
                let addr = tx_address(xfer)?;
                self.eeprom_erase(EepromErase::Sector(addr))?;
            }
            Request::EepromBlockErase => {
                let addr = tx_address(xfer)?;
                self.eeprom_erase(EepromErase::Block(addr))?;
            }
            Request::EepromWriteEnable => self.eeprom_write_enable()?,
            Request::EepromWriteDisable => self.eeprom_write_disable()?,
            Request::EepromReadStatus => {
                let rx = rx_slice(xfer, 1)?;
                let (mut bus, _) = self.bus()?;
                rx[0] = eeprom::read_status(&mut bus)?.bits();
            }
            Request::SensorReset => self.reset()?,
            Request::PowerControl => self.set_power(xfer.len != 0)?,
            Request::SetSpiClock => self.set_spi_clock(config, xfer.speed_hz)?,
            Request::ResetControl => self.reset_control(xfer.len != 0)?,
            Request::DisableSpiClock => self.disable_spi_clock(),
            Request::SetSensorType => {
                self.sensor_type = xfer.len;
                log::debug!("et7xx: sensor type set to {}", xfer.len);
            }
            Request::SpiValue => {
                rx_slice(xfer, 4)?.copy_from_slice(&config.spi_value.to_le_bytes());
            }
            Request::ModelInfo => {
                let model = config.model_info.as_bytes();
                let rx = xfer.rx.as_deref_mut().ok_or(Error::InvalidArgument)?;
                let n = core::cmp::min(model.len(), rx.len());
                rx[..n].copy_from_slice(&model[..n]);
                rx[n..].fill(0);
            }
            Request::CpuSpeedup | Request::IntTrigger(_) | Request::Reserved(_) => {
                return Err(Error::InvalidArgument);
            }
        }
        Ok(())
    }
}
