use et7xx_core::error::{Error, SequenceViolation};
use et7xx_core::session::{EepromState, Et7xx, SensorConfig, SessionHandle};
use et7xx_core::spi::{eeprom, EepromStatus, Target, REG_EEPROM_WRITE_CTRL};
use et7xx_dummy::{BusMonitor, DummyConfig, DummySensor};

fn device_with(config: DummyConfig, sensor_config: SensorConfig) -> (Et7xx<DummySensor>, BusMonitor) {
    let sensor = DummySensor::new(config);
    let monitor = sensor.monitor();
    (Et7xx::new(sensor, sensor_config), monitor)
}

/// Open device with the write controller gate open
fn writable() -> (Et7xx<DummySensor>, BusMonitor, SessionHandle) {
    let (device, monitor) = device_with(DummyConfig::default(), SensorConfig::default());
    let handle = device.open().unwrap();
    device.eeprom_write_controller(true).unwrap();
    monitor.clear();
    (device, monitor, handle)
}

#[test]
fn test_modify_without_write_enable_is_refused() {
    let (device, monitor, _handle) = writable();
    let refused = Err(Error::SequenceError(SequenceViolation::NotWriteEnabled));

    assert_eq!(device.eeprom_write(0x100, &[1, 2, 3]), refused);
    assert_eq!(device.eeprom_chip_erase(), refused);
    assert_eq!(device.eeprom_sector_erase(0x1000), refused);
    assert_eq!(device.eeprom_block_erase(0x10000), refused);
    assert_eq!(monitor.exchanges(), 0);
    assert_eq!(device.eeprom_state(), EepromState::Idle);
}

#[test]
fn test_write_then_read_back() {
    let (device, _monitor, _handle) = writable();

    device.eeprom_write_enable().unwrap();
    assert_eq!(device.eeprom_state(), EepromState::WriteEnabled);
    device.eeprom_write(0x0100, b"fingerprint").unwrap();
    assert_eq!(device.eeprom_state(), EepromState::Idle);

    assert_eq!(device.eeprom_read(0x0100, 11).unwrap(), b"fingerprint".to_vec());
    assert_eq!(device.eeprom_read(0x00FF, 1).unwrap(), vec![0xFF]);
}

#[test]
fn test_write_needs_fresh_latch_each_time() {
    let (device, _monitor, _handle) = writable();

    device.eeprom_write_enable().unwrap();
    device.eeprom_write(0, &[0x00]).unwrap();
    assert_eq!(
        device.eeprom_write(1, &[0x00]),
        Err(Error::SequenceError(SequenceViolation::NotWriteEnabled))
    );
}

#[test]
fn test_write_spanning_pages_reasserts_latch() {
    let (device, monitor, _handle) = writable();
    let data: Vec<u8> = (0..300u32).map(|i| i as u8).collect();

    device.eeprom_write_enable().unwrap();
    device.eeprom_write(0x0F0, &data).unwrap();

    let ops: Vec<u8> = monitor
        .opcodes(Target::Eeprom)
        .into_iter()
        .filter(|&op| op != eeprom::RDSR)
        .collect();
    assert_eq!(
        ops,
        vec![eeprom::WREN, eeprom::PP, eeprom::WREN, eeprom::PP, eeprom::WREN, eeprom::PP]
    );
    assert_eq!(device.eeprom_read(0x0F0, 300).unwrap(), data);
}

#[test]
fn test_read_while_latched_is_refused() {
    let (device, monitor, _handle) = writable();

    device.eeprom_write_enable().unwrap();
    let before = monitor.exchanges();
    assert_eq!(
        device.eeprom_read(0, 4),
        Err(Error::SequenceError(SequenceViolation::WriteEnableLatched))
    );
    assert_eq!(
        device.eeprom_fast_read(0, 4),
        Err(Error::SequenceError(SequenceViolation::WriteEnableLatched))
    );
    assert_eq!(monitor.exchanges(), before);

    // Status reads are allowed in any state
    let status = device.eeprom_read_status().unwrap();
    assert!(status.contains(EepromStatus::WEL));

    device.eeprom_write_disable().unwrap();
    assert_eq!(device.eeprom_state(), EepromState::Idle);
    assert_eq!(device.eeprom_read(0, 4).unwrap(), vec![0xFF; 4]);
}

#[test]
fn test_lost_latch_detected_before_modify() {
    let (device, monitor) = device_with(
        DummyConfig {
            ignore_wren: true,
            ..DummyConfig::default()
        },
        SensorConfig::default(),
    );
    let _handle = device.open().unwrap();
    device.eeprom_write_controller(true).unwrap();

    device.eeprom_write_enable().unwrap();
    monitor.clear();
    assert_eq!(
        device.eeprom_sector_erase(0),
        Err(Error::SequenceError(SequenceViolation::LatchLost))
    );
    assert_eq!(monitor.opcodes(Target::Eeprom), vec![eeprom::RDSR]);
    assert_eq!(device.eeprom_state(), EepromState::Idle);
}

#[test]
fn test_stuck_busy_times_out() {
    let (device, monitor) = device_with(
        DummyConfig {
            stuck_busy: true,
            ..DummyConfig::default()
        },
        SensorConfig::default(),
    );
    let _handle = device.open().unwrap();
    device.eeprom_write_controller(true).unwrap();

    device.eeprom_write_enable().unwrap();
    assert_eq!(device.eeprom_write(0, &[0x55]), Err(Error::Timeout));
    assert_eq!(device.eeprom_state(), EepromState::Idle);
    // 10 ms program timeout polled every 100 us
    assert_eq!(monitor.total_delay_us(), 10_000);
}

#[test]
fn test_non_secure_write_opens_and_restores_gate() {
    let (device, _monitor) = device_with(DummyConfig::default(), SensorConfig::default());
    let _handle = device.open().unwrap();
    assert_eq!(device.read_register(REG_EEPROM_WRITE_CTRL).unwrap(), 0x00);

    device.eeprom_write_enable().unwrap();
    device.eeprom_write_non_secure(0x2000, &[0xA5, 0x5A]).unwrap();

    assert_eq!(device.read_register(REG_EEPROM_WRITE_CTRL).unwrap(), 0x00);
    assert_eq!(device.eeprom_read(0x2000, 2).unwrap(), vec![0xA5, 0x5A]);
}

#[test]
fn test_non_secure_write_refused_in_secure_mode() {
    let (device, monitor) = device_with(
        DummyConfig::default(),
        SensorConfig::default().with_secure_mode(true),
    );
    let _handle = device.open().unwrap();

    device.eeprom_write_enable().unwrap();
    monitor.clear();
    assert_eq!(
        device.eeprom_write_non_secure(0, &[0]),
        Err(Error::SequenceError(SequenceViolation::SecureModeActive))
    );
    assert_eq!(monitor.exchanges(), 0);
}

#[test]
fn test_write_with_gate_closed_leaves_data() {
    let (device, _monitor) = device_with(DummyConfig::default(), SensorConfig::default());
    let _handle = device.open().unwrap();

    device.eeprom_write_enable().unwrap();
    device.eeprom_write(0x40, &[0x00, 0x00]).unwrap();
    assert_eq!(device.eeprom_read(0x40, 2).unwrap(), vec![0xFF, 0xFF]);
}

#[test]
fn test_sector_erase() {
    let sensor = DummySensor::new_default()
        .with_eeprom_data(0x0FFF, &[0x11])
        .with_eeprom_data(0x1000, &[0x22; 16])
        .with_eeprom_data(0x2000, &[0x33]);
    let device = Et7xx::new(sensor, SensorConfig::default());
    let _handle = device.open().unwrap();
    device.eeprom_write_controller(true).unwrap();

    device.eeprom_write_enable().unwrap();
    device.eeprom_sector_erase(0x1000).unwrap();

    assert_eq!(device.eeprom_read(0x0FFF, 1).unwrap(), vec![0x11]);
    assert_eq!(device.eeprom_read(0x1000, 16).unwrap(), vec![0xFF; 16]);
    assert_eq!(device.eeprom_read(0x2000, 1).unwrap(), vec![0x33]);
}

#[test]
fn test_chip_and_block_erase() {
    let sensor = DummySensor::new_default()
        .with_eeprom_data(0x10000, &[0x01; 8])
        .with_eeprom_data(0x20000, &[0x02; 8]);
    let device = Et7xx::new(sensor, SensorConfig::default());
    let _handle = device.open().unwrap();
    device.eeprom_write_controller(true).unwrap();

    device.eeprom_write_enable().unwrap();
    device.eeprom_block_erase(0x10000).unwrap();
    assert_eq!(device.eeprom_read(0x10000, 8).unwrap(), vec![0xFF; 8]);
    assert_eq!(device.eeprom_read(0x20000, 8).unwrap(), vec![0x02; 8]);

    device.eeprom_write_enable().unwrap();
    device.eeprom_chip_erase().unwrap();
    assert_eq!(device.eeprom_read(0x20000, 8).unwrap(), vec![0xFF; 8]);
}

#[test]
fn test_misaligned_erase_rejected_without_traffic() {
    let (device, monitor, _handle) = writable();

    device.eeprom_write_enable().unwrap();
    monitor.clear();
    assert_eq!(device.eeprom_sector_erase(0x1001), Err(Error::InvalidArgument));
    assert_eq!(device.eeprom_block_erase(0x1000), Err(Error::InvalidArgument));
    assert_eq!(monitor.exchanges(), 0);
    // The latch is still usable
    assert_eq!(device.eeprom_state(), EepromState::WriteEnabled);
}

#[test]
fn test_out_of_range_write_rejected() {
    let (device, monitor, _handle) = writable();

    device.eeprom_write_enable().unwrap();
    monitor.clear();
    assert_eq!(
        device.eeprom_write(0x00FF_FFFF, &[0, 0]),
        Err(Error::InvalidArgument)
    );
    assert_eq!(monitor.exchanges(), 0);
}

#[test]
fn test_bad_arguments_without_latch_report_sequence() {
    let (device, monitor, _handle) = writable();
    let refused = Err(Error::SequenceError(SequenceViolation::NotWriteEnabled));

    assert_eq!(device.eeprom_sector_erase(0x1001), refused);
    assert_eq!(device.eeprom_block_erase(0x1000), refused);
    assert_eq!(device.eeprom_write(0x00FF_FFFF, &[0, 0]), refused);
    assert_eq!(device.eeprom_write_non_secure(0x00FF_FFFF, &[0, 0]), refused);
    assert_eq!(monitor.exchanges(), 0);
    assert_eq!(device.eeprom_state(), EepromState::Idle);
}

#[test]
fn test_empty_write_keeps_latch() {
    let (device, monitor, _handle) = writable();

    device.eeprom_write_enable().unwrap();
    monitor.clear();
    device.eeprom_write(0x100, &[]).unwrap();
    assert!(monitor.opcodes(Target::Eeprom).is_empty());
    assert_eq!(device.eeprom_state(), EepromState::WriteEnabled);

    // The latch is still good for a real write
    device.eeprom_write(0x100, &[0x5A]).unwrap();
    assert_eq!(device.eeprom_state(), EepromState::Idle);
    assert_eq!(device.eeprom_read(0x100, 1).unwrap(), vec![0x5A]);
}

#[test]
fn test_write_split_to_buffer_capacity() {
    let (device, monitor) = device_with(
        DummyConfig::default(),
        SensorConfig::default().with_bufsiz(64),
    );
    let _handle = device.open().unwrap();
    device.eeprom_write_controller(true).unwrap();
    let data: Vec<u8> = (0..100u32).map(|i| (i as u8) ^ 0xA5).collect();

    device.eeprom_write_enable().unwrap();
    monitor.clear();
    device.eeprom_write(0x0F0, &data).unwrap();

    // 16 bytes up to the page end, then 64, then the remaining 20
    let ops: Vec<u8> = monitor
        .opcodes(Target::Eeprom)
        .into_iter()
        .filter(|&op| op != eeprom::RDSR)
        .collect();
    assert_eq!(
        ops,
        vec![eeprom::PP, eeprom::WREN, eeprom::PP, eeprom::WREN, eeprom::PP]
    );
    assert_eq!(device.eeprom_state(), EepromState::Idle);
    assert_eq!(device.eeprom_read(0x0F0, 100).unwrap(), data);
}

#[test]
fn test_write_disable_from_idle() {
    let (device, monitor, _handle) = writable();

    device.eeprom_write_disable().unwrap();
    assert_eq!(monitor.opcodes(Target::Eeprom), vec![eeprom::WRDI]);
    assert_eq!(device.eeprom_state(), EepromState::Idle);
}

#[test]
fn test_fast_read_matches_read() {
    let data: Vec<u8> = (0..2048u32).map(|i| (i * 13) as u8).collect();
    let sensor = DummySensor::new_default().with_eeprom_data(0x3000, &data);
    let monitor = sensor.monitor();
    let device = Et7xx::new(sensor, SensorConfig::default());
    let _handle = device.open().unwrap();

    let normal = device.eeprom_read(0x3000, 2048).unwrap();
    let fast = device.eeprom_fast_read(0x3000, 2048).unwrap();
    assert_eq!(normal, data);
    assert_eq!(fast, data);
    // 1024 byte buffer: two commands per read
    assert_eq!(
        monitor.opcodes(Target::Eeprom),
        vec![eeprom::READ, eeprom::READ, eeprom::FAST_READ, eeprom::FAST_READ]
    );
}

#[test]
fn test_last_close_clears_latch() {
    let (device, _monitor) = device_with(DummyConfig::default(), SensorConfig::default());
    let a = device.open().unwrap();
    let b = device.open().unwrap();

    device.eeprom_write_enable().unwrap();
    device.close(a).unwrap();
    assert_eq!(device.eeprom_state(), EepromState::WriteEnabled);
    device.close(b).unwrap();
    assert_eq!(device.eeprom_state(), EepromState::Idle);
}
