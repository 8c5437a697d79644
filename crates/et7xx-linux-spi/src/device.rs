//! Linux spidev bus implementation
//!
//! The sensor and its EEPROM sit on the same SPI controller behind two
//! chip selects, which spidev exposes as two device nodes. Each exchange
//! is a single full-duplex `spi_ioc_transfer`, so chip select stays
//! asserted for the whole command.

use crate::error::{LinuxSpiError, Result};

use et7xx_core::bus::BusTransport;
use et7xx_core::error::Result as CoreResult;
use et7xx_core::spi::{Target, SLOW_BAUD_RATE};

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// SPI mode constants
pub mod mode {
    /// SPI mode 0: CPOL=0, CPHA=0
    pub const MODE_0: u8 = 0;
    /// SPI mode 1: CPOL=0, CPHA=1
    pub const MODE_1: u8 = 1;
    /// SPI mode 2: CPOL=1, CPHA=0
    pub const MODE_2: u8 = 2;
    /// SPI mode 3: CPOL=1, CPHA=1
    pub const MODE_3: u8 = 3;
}

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    /// Size of struct spi_ioc_transfer
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// Calculate ioctl number for SPI_IOC_MESSAGE(n)
    ///
    /// `_IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(struct spi_ioc_transfer)])`
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// SPI transfer structure for ioctl
/// This must match the kernel's struct spi_ioc_transfer layout
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,          // __u64 tx_buf
    rx_buf: u64,          // __u64 rx_buf
    len: u32,             // __u32 len
    speed_hz: u32,        // __u32 speed_hz
    delay_usecs: u16,     // __u16 delay_usecs
    bits_per_word: u8,    // __u8 bits_per_word
    cs_change: u8,        // __u8 cs_change
    tx_nbits: u8,         // __u8 tx_nbits
    rx_nbits: u8,         // __u8 rx_nbits
    word_delay_usecs: u8, // __u8 word_delay_usecs
    _pad: u8,             // padding
}

/// Configuration for opening the sensor's spidev nodes
#[derive(Debug, Clone)]
pub struct LinuxSpiConfig {
    /// Sensor chip select (e.g., "/dev/spidev0.0")
    pub device: String,
    /// EEPROM chip select (e.g., "/dev/spidev0.1"), if wired
    pub eeprom: Option<String>,
    /// Default clock in Hz
    pub speed_hz: u32,
    /// Highest clock the controller may be asked for
    pub max_speed_hz: Option<u32>,
    /// SPI mode (0-3, default: 0)
    pub mode: u8,
}

impl Default for LinuxSpiConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            eeprom: None,
            speed_hz: SLOW_BAUD_RATE,
            max_speed_hz: None,
            mode: mode::MODE_0,
        }
    }
}

impl LinuxSpiConfig {
    /// Create a new configuration with the given sensor device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Use `device` for the EEPROM chip select
    pub fn with_eeprom(mut self, device: impl Into<String>) -> Self {
        self.eeprom = Some(device.into());
        self
    }

    /// Set the default clock in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Cap the clock in Hz
    pub fn with_max_speed(mut self, speed_hz: u32) -> Self {
        self.max_speed_hz = Some(speed_hz);
        self
    }

    /// Set the SPI mode (0-3)
    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }
}

/// ET7xx bus over Linux spidev
pub struct LinuxSpi {
    /// Sensor chip select
    sensor: File,
    /// EEPROM chip select
    eeprom: Option<File>,
    /// Maximum kernel buffer size
    max_kernel_buf_size: usize,
    /// Clock ceiling reported to the session
    max_speed_hz: u32,
}

/// Open one spidev node and apply mode, word size and default clock
fn open_node(path: &str, mode: u8, speed: u32) -> Result<File> {
    log::debug!("linux_spi: Opening device {}", path);

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| LinuxSpiError::OpenFailed {
            path: path.to_string(),
            source: e,
        })?;
    let fd = file.as_raw_fd();

    unsafe {
        ioctl::spi_ioc_wr_mode(fd, &mode).map_err(|e| LinuxSpiError::SetModeFailed {
            mode,
            source: std::io::Error::from_raw_os_error(e as i32),
        })?;
    }

    let bits: u8 = 8;
    unsafe {
        ioctl::spi_ioc_wr_bits_per_word(fd, &bits).map_err(|e| {
            LinuxSpiError::SetBitsPerWordFailed {
                bits,
                source: std::io::Error::from_raw_os_error(e as i32),
            }
        })?;
    }

    unsafe {
        ioctl::spi_ioc_wr_max_speed_hz(fd, &speed).map_err(|e| LinuxSpiError::SetSpeedFailed {
            speed,
            source: std::io::Error::from_raw_os_error(e as i32),
        })?;
    }

    log::info!(
        "linux_spi: Opened {} (mode={}, speed={} kHz)",
        path,
        mode,
        speed / 1000
    );
    Ok(file)
}

impl LinuxSpi {
    /// Open the sensor (and optional EEPROM) nodes
    pub fn open(config: &LinuxSpiConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxSpiError::NoDevice);
        }

        let sensor = open_node(&config.device, config.mode, config.speed_hz)?;
        let eeprom = config
            .eeprom
            .as_deref()
            .map(|path| open_node(path, config.mode, config.speed_hz))
            .transpose()?;

        let max_kernel_buf_size = get_max_kernel_buf_size();
        log::debug!(
            "linux_spi: Max kernel buffer size: {} bytes",
            max_kernel_buf_size
        );

        Ok(Self {
            sensor,
            eeprom,
            max_kernel_buf_size,
            max_speed_hz: config.max_speed_hz.unwrap_or(u32::MAX),
        })
    }

    /// Open a sensor node with default settings and no EEPROM
    pub fn open_device(device: &str) -> Result<Self> {
        Self::open(&LinuxSpiConfig::new(device))
    }

    /// Largest exchange the kernel accepts
    pub fn max_transfer_len(&self) -> usize {
        self.max_kernel_buf_size
    }

    /// Whether an EEPROM chip select is available
    pub fn has_eeprom(&self) -> bool {
        self.eeprom.is_some()
    }

    /// Perform one full-duplex transfer on `target`
    fn spi_transfer(&mut self, target: Target, tx: &[u8], rx: &mut [u8], speed_hz: u32) -> Result<()> {
        if tx.len() > self.max_kernel_buf_size {
            return Err(LinuxSpiError::TooLong {
                len: tx.len(),
                max: self.max_kernel_buf_size,
            });
        }
        let file = match target {
            Target::Sensor => &self.sensor,
            Target::Eeprom => self.eeprom.as_ref().ok_or(LinuxSpiError::NoEepromDevice)?,
        };

        let transfer = SpiIocTransfer {
            tx_buf: tx.as_ptr() as u64,
            rx_buf: rx.as_mut_ptr() as u64,
            len: tx.len() as u32,
            speed_hz,
            bits_per_word: 8,
            ..Default::default()
        };

        let ioctl_num = ioctl::spi_ioc_message(1);
        let ret = unsafe { libc::ioctl(file.as_raw_fd(), ioctl_num, &transfer as *const SpiIocTransfer) };

        if ret < 0 {
            return Err(LinuxSpiError::TransferFailed(
                std::io::Error::last_os_error(),
            ));
        }
        if ret as usize != tx.len() {
            return Err(LinuxSpiError::ShortTransfer {
                done: ret as usize,
                expected: tx.len(),
            });
        }
        Ok(())
    }
}

impl BusTransport for LinuxSpi {
    fn max_speed_hz(&self) -> u32 {
        self.max_speed_hz
    }

    fn exchange(&mut self, target: Target, tx: &[u8], rx: &mut [u8], speed_hz: u32) -> CoreResult<()> {
        self.spi_transfer(target, tx, rx, speed_hz).map_err(|e| {
            log::debug!("linux_spi: {:?} exchange failed: {}", target, e);
            e.into()
        })
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }
}

/// Read the maximum kernel buffer size from sysfs, or use page size as fallback
fn get_max_kernel_buf_size() -> usize {
    if let Ok(content) = std::fs::read_to_string(BUF_SIZE_SYSFS) {
        if let Ok(size) = content.trim().parse::<usize>() {
            if size > 0 {
                log::debug!("linux_spi: Using buffer size {} from sysfs", size);
                return size;
            }
        }
        log::warn!("linux_spi: Invalid buffer size in {}", BUF_SIZE_SYSFS);
    } else {
        log::debug!("linux_spi: Cannot read {}, using page size", BUF_SIZE_SYSFS);
    }

    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    log::debug!("linux_spi: Using page size {} as buffer size", page_size);
    page_size
}

/// Parse transport options from a list of key-value pairs
///
/// Keys: `dev` (required), `eeprom`, `spispeed` and `maxspeed` in kHz,
/// `mode`.
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<LinuxSpiConfig, String> {
    let mut config = LinuxSpiConfig::default();

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
            }
            "eeprom" => {
                config.eeprom = Some(value.to_string());
            }
            "spispeed" | "maxspeed" => {
                let speed_khz: u32 = value
                    .parse()
                    .map_err(|_| format!("Invalid {} value: {}", key, value))?;
                let hz = speed_khz
                    .checked_mul(1000)
                    .filter(|&hz| hz > 0)
                    .ok_or_else(|| format!("Invalid {} value: {}", key, value))?;
                if *key == "spispeed" {
                    config.speed_hz = hz;
                } else {
                    config.max_speed_hz = Some(hz);
                }
            }
            "mode" => {
                let mode: u8 = value
                    .parse()
                    .map_err(|_| format!("Invalid mode value: {}", value))?;
                if mode > 3 {
                    return Err(format!("Invalid SPI mode: {} (must be 0-3)", mode));
                }
                config.mode = mode;
            }
            _ => {
                log::warn!("linux_spi: Unknown option: {}={}", key, value);
            }
        }
    }

    if config.device.is_empty() {
        return Err("No device specified. Use dev=/dev/spidevX.Y".to_string());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_struct_layout() {
        assert_eq!(
            std::mem::size_of::<SpiIocTransfer>(),
            ioctl::SPI_IOC_TRANSFER_SIZE
        );
    }

    #[test]
    fn test_message_ioctl_number() {
        // SPI_IOC_MESSAGE(1) on Linux
        assert_eq!(ioctl::spi_ioc_message(1), 0x4020_6B00);
    }

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[
            ("dev", "/dev/spidev1.0"),
            ("eeprom", "/dev/spidev1.1"),
            ("spispeed", "8000"),
            ("mode", "3"),
        ])
        .unwrap();
        assert_eq!(config.device, "/dev/spidev1.0");
        assert_eq!(config.eeprom.as_deref(), Some("/dev/spidev1.1"));
        assert_eq!(config.speed_hz, 8_000_000);
        assert_eq!(config.mode, 3);
        assert_eq!(config.max_speed_hz, None);
    }

    #[test]
    fn test_parse_options_rejects_bad_values() {
        assert!(parse_options(&[("spispeed", "1000")]).is_err());
        assert!(parse_options(&[("dev", "/dev/spidev0.0"), ("mode", "4")]).is_err());
        assert!(parse_options(&[("dev", "/dev/spidev0.0"), ("spispeed", "0")]).is_err());
        assert!(parse_options(&[("dev", "/dev/spidev0.0"), ("maxspeed", "fast")]).is_err());
    }
}
