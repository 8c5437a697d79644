use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use et7xx_core::error::{Error, SequenceViolation};
use et7xx_core::session::{Et7xx, SensorConfig};
use et7xx_core::spi::{Target, OP_FB_R, OP_FB_W, OP_GET_FRAME, OP_HSTG_R, OP_REG_R};
use et7xx_dummy::{frame_pattern, BusMonitor, DummySensor};

fn open_device(config: SensorConfig) -> (Et7xx<DummySensor>, BusMonitor) {
    let sensor = DummySensor::new_default();
    let monitor = sensor.monitor();
    (Et7xx::new(sensor, config), monitor)
}

fn expected_frame(size: usize) -> Vec<u8> {
    (0..size).map(frame_pattern).collect()
}

#[test]
fn test_large_frame_read_in_four_chunks() {
    let (device, monitor) = open_device(SensorConfig::default());
    let _handle = device.open().unwrap();

    device.pre_capture().unwrap();
    monitor.clear();
    let frame = device.get_frame(4096).unwrap();

    assert_eq!(frame, expected_frame(4096));
    let events = monitor.events();
    assert_eq!(events.len(), 4);
    for event in &events {
        assert_eq!(event.opcode, OP_FB_R);
        assert_eq!(event.len, 1025);
    }
}

#[test]
fn test_small_frame_single_exchange() {
    let (device, monitor) = open_device(SensorConfig::default());
    let _handle = device.open().unwrap();

    device.pre_capture().unwrap();
    monitor.clear();
    let frame = device.get_frame(1000).unwrap();
    assert_eq!(frame, expected_frame(1000));
    assert_eq!(monitor.exchanges(), 1);
}

#[test]
fn test_unsplittable_frame_rejected() {
    let (device, monitor) = open_device(SensorConfig::default());
    let _handle = device.open().unwrap();

    // Not a multiple of four
    assert_eq!(device.get_frame(4098), Err(Error::InvalidArgument));
    // Quarter does not fit the buffer
    assert_eq!(device.get_frame(4100), Err(Error::InvalidArgument));
    assert_eq!(monitor.exchanges(), 0);
}

#[test]
fn test_failed_chunk_fails_whole_frame() {
    let sensor = DummySensor::new_default().fail_after(2);
    let device = Et7xx::new(sensor, SensorConfig::default());
    let _handle = device.open().unwrap();

    assert!(matches!(
        device.get_frame(4096),
        Err(Error::TransportError(_))
    ));
}

#[test]
fn test_cancel_between_chunks() {
    let cancel = Arc::new(AtomicBool::new(false));
    let sensor = DummySensor::new_default().trip_after(1, Arc::clone(&cancel));
    let monitor = sensor.monitor();
    let device = Et7xx::new(sensor, SensorConfig::default());
    let _handle = device.open().unwrap();

    assert_eq!(
        device.get_frame_cancellable(4096, &cancel),
        Err(Error::Interrupted {
            completed: 1,
            total: 4
        })
    );
    assert_eq!(monitor.exchanges(), 1);
}

#[test]
fn test_cancel_before_start_still_reads_first_chunk() {
    let cancel = AtomicBool::new(true);
    let (device, monitor) = open_device(SensorConfig::default());
    let _handle = device.open().unwrap();

    // A frame that fits is never interrupted
    assert_eq!(device.get_frame_cancellable(512, &cancel).unwrap().len(), 512);
    assert!(matches!(
        device.get_frame_cancellable(2048, &cancel),
        Err(Error::Interrupted { completed: 1, .. })
    ));
    assert_eq!(monitor.exchanges(), 2);
}

#[test]
fn test_pre_capture_required_when_configured() {
    let (device, monitor) = open_device(SensorConfig::default().with_require_pre_capture(true));
    let _handle = device.open().unwrap();
    let no_capture = Err(Error::SequenceError(SequenceViolation::NoPreCapture));

    assert_eq!(device.get_frame(64), no_capture);
    assert_eq!(device.get_zone_average(16), no_capture);
    assert_eq!(monitor.exchanges(), 0);

    device.pre_capture().unwrap();
    // Tables do not consume the capture
    device.get_zone_average(16).unwrap();
    device.get_histogram(16).unwrap();
    device.get_frame(64).unwrap();
    // Frames do
    assert_eq!(device.get_frame(64), no_capture);
    assert_eq!(device.get_cis_frame(64), no_capture);

    device.pre_capture_cis().unwrap();
    device.get_cis_frame(64).unwrap();
}

#[test]
fn test_pre_capture_and_histogram_share_opcode() {
    let (device, monitor) = open_device(SensorConfig::default());
    let _handle = device.open().unwrap();

    device.pre_capture().unwrap();
    let histogram = device.get_histogram(4).unwrap();

    assert_eq!(histogram, vec![0xFF, 0xFE, 0xFD, 0xFC]);
    let events = monitor.events();
    assert_eq!(events[0].opcode, OP_HSTG_R);
    assert_eq!(events[0].len, 1);
    assert_eq!(events[1].opcode, OP_HSTG_R);
    assert_eq!(events[1].len, 5);
}

#[test]
fn test_zone_average() {
    let (device, _monitor) = open_device(SensorConfig::default());
    let _handle = device.open().unwrap();

    let table = device.get_zone_average(64).unwrap();
    assert_eq!(table, (0..64u8).collect::<Vec<_>>());
    assert_eq!(device.get_zone_average(2048), Err(Error::InvalidArgument));
}

#[test]
fn test_write_frame_then_read_back() {
    let (device, monitor) = open_device(SensorConfig::default());
    let _handle = device.open().unwrap();
    let image: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();

    device.pre_capture().unwrap();
    device.write_frame(&image).unwrap();
    assert_eq!(
        monitor
            .opcodes(Target::Sensor)
            .iter()
            .filter(|&&op| op == OP_FB_W)
            .count(),
        4
    );

    device.pre_capture().unwrap();
    assert_eq!(device.get_frame(2048).unwrap(), image);
}

#[test]
fn test_cis_frame_uses_get_frame() {
    let (device, monitor) = open_device(SensorConfig::default());
    let _handle = device.open().unwrap();

    device.pre_capture_cis().unwrap();
    monitor.clear();
    let frame = device.get_cis_frame(4096).unwrap();

    let expected: Vec<u8> = (0..4096).map(|i| !frame_pattern(i)).collect();
    assert_eq!(frame, expected);
    assert_eq!(monitor.opcodes(Target::Sensor), vec![OP_GET_FRAME; 4]);
}

#[test]
fn test_transfer_command_is_raw() {
    let (device, monitor) = open_device(SensorConfig::default());
    let _handle = device.open().unwrap();

    device.write_register(0x42, 0x99).unwrap();
    let rx = device.transfer_command(&[OP_REG_R, 0x42, 0x00]).unwrap();
    assert_eq!(rx[2], 0x99);
    assert_eq!(monitor.events()[1].len, 3);
    assert_eq!(device.transfer_command(&[0u8; 2048]), Err(Error::InvalidArgument));
}
