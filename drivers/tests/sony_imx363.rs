use camera_sensor_drivers::controls::{self, Id};
use camera_sensor_drivers::devices::sony_imx363;
use camera_sensor_drivers::mock;
use camera_sensor_drivers::register;
use camera_sensor_drivers::types::{FormatCode, FormatRequest};
use camera_sensor_drivers::{bus, Sensor};

type Device = sony_imx363::Device<mock::Registers, mock::Sequencer>;

const FRAME_LENGTH_LINES: u16 = 0x0340;
const EXPOSURE: u16 = 0x0202;
const MODE_SELECT: u16 = 0x0100;
const ORIENTATION: u16 = 0x0101;
const CSI_DATA_FORMAT: u16 = 0x0112;

fn open() -> (Device, mock::Registers, mock::Board) {
    let registers = mock::Registers::with_chip_id(0x0016, sony_imx363::CHIP_ID);
    let board = mock::Board::new();
    let device = sony_imx363::open(
        registers.clone(),
        board.sequencer(),
        sony_imx363::DEFAULT_CONFIGURATION,
    )
    .unwrap();
    registers.clear_transactions();
    board.clear_events();
    (device, registers, board)
}

fn start_length() -> usize {
    sony_imx363::BASELINE.len()
        + sony_imx363::RAW10.len()
        + sony_imx363::MODES[0].registers.len()
        + 9
}

#[test]
fn open_identifies_and_leaves_the_sensor_off() {
    let registers = mock::Registers::with_chip_id(0x0016, sony_imx363::CHIP_ID);
    let board = mock::Board::new();
    let device = sony_imx363::open(
        registers.clone(),
        board.sequencer(),
        sony_imx363::DEFAULT_CONFIGURATION,
    )
    .unwrap();
    assert!(!device.is_powered());
    assert!(!device.is_streaming());
    assert_eq!(device.state(), sony_imx363::State::Standby);
    assert_eq!(
        registers.transactions(),
        vec![
            mock::Transaction::Read {
                address: 0x0016,
                length: 2
            },
            mock::Transaction::Write {
                address: MODE_SELECT,
                bytes: vec![1]
            },
            mock::Transaction::Write {
                address: MODE_SELECT,
                bytes: vec![0]
            },
        ]
    );
    assert_eq!(
        board.events(),
        vec![
            mock::Event::ClockRate(24_000_000),
            mock::Event::RegulatorsOn,
            mock::Event::ClockOn,
            mock::Event::ResetHigh,
            mock::Event::Delay { microseconds: 6200 },
            mock::Event::Delay { microseconds: 100 },
            mock::Event::Delay { microseconds: 100 },
            mock::Event::ResetLow,
            mock::Event::RegulatorsOff,
            mock::Event::ClockOff,
        ]
    );
}

#[test]
fn open_rejects_another_chip() {
    let registers = mock::Registers::with_chip_id(0x0016, 0x0219);
    let board = mock::Board::new();
    let result = sony_imx363::open(
        registers.clone(),
        board.sequencer(),
        sony_imx363::DEFAULT_CONFIGURATION,
    );
    assert_eq!(
        result.err(),
        Some(sony_imx363::Error::IdentityMismatch {
            expected: 0x0363,
            found: 0x0219
        })
    );
    assert_eq!(board.events().last(), Some(&mock::Event::ClockOff));
    assert_eq!(registers.writes_to(MODE_SELECT).len(), 0);
}

#[test]
fn initial_state_uses_the_first_mode() {
    let (device, _, _) = open();
    let format = device.get_format();
    assert_eq!((format.width, format.height), (4032, 3024));
    assert_eq!(format.code, FormatCode::Srggb10);
    assert_eq!(device.control(Id::VerticalBlank).value, 116);
    assert_eq!(device.control(Id::VerticalBlank).minimum, 116);
    assert_eq!(device.control(Id::Exposure).maximum, 3136);
    assert_eq!(device.control(Id::Exposure).value, 1600);
    assert_eq!(device.control(Id::HorizontalBlank).value, 8832 - 4032);
    assert_eq!(device.control(Id::PixelRate).value, 403_200_000);
}

#[test]
fn start_applies_lists_then_controls_then_streams() {
    let (mut device, registers, board) = open();
    device.start_stream().unwrap();
    assert!(device.is_streaming());
    assert!(device.is_powered());
    assert_eq!(registers.transaction_count(), start_length());
    let transactions = registers.transactions();
    assert_eq!(
        transactions[0],
        mock::Transaction::Read {
            address: 0x0016,
            length: 2
        }
    );
    assert_eq!(
        transactions.last(),
        Some(&mock::Transaction::Write {
            address: MODE_SELECT,
            bytes: vec![1]
        })
    );
    assert_eq!(registers.value(FRAME_LENGTH_LINES, 2), 3140);
    assert_eq!(registers.value(EXPOSURE, 2), 1600);
    assert_eq!(registers.value(0x020E, 2), 256);
    assert_eq!(registers.value(CSI_DATA_FORMAT, 2), 0x0A0A);
    assert_eq!(registers.value(0x034C, 2), 4032);
    assert_eq!(
        board.events()[..4],
        [
            mock::Event::RegulatorsOn,
            mock::Event::ClockOn,
            mock::Event::ResetHigh,
            mock::Event::Delay { microseconds: 6200 },
        ]
    );
}

#[test]
fn redundant_transitions_do_not_touch_the_bus() {
    let (mut device, registers, board) = open();
    device.stop_stream();
    device.set_stream(false).unwrap();
    assert_eq!(registers.transaction_count(), 0);
    assert!(board.events().is_empty());

    device.start_stream().unwrap();
    registers.clear_transactions();
    board.clear_events();
    device.start_stream().unwrap();
    device.set_stream(true).unwrap();
    assert_eq!(registers.transaction_count(), 0);
    assert!(board.events().is_empty());
}

#[test]
fn stop_disables_the_stream_and_powers_off() {
    let (mut device, registers, board) = open();
    device.start_stream().unwrap();
    registers.clear_transactions();
    board.clear_events();
    device.stop_stream();
    assert!(!device.is_streaming());
    assert!(!device.is_powered());
    assert_eq!(registers.writes_to(MODE_SELECT), vec![vec![0]]);
    assert_eq!(
        board.events(),
        vec![
            mock::Event::ResetLow,
            mock::Event::RegulatorsOff,
            mock::Event::ClockOff,
        ]
    );
}

#[test]
fn stop_powers_off_even_if_the_disable_write_fails() {
    let (mut device, registers, _) = open();
    device.start_stream().unwrap();
    registers.set_fail_at(Some(MODE_SELECT));
    device.stop_stream();
    assert!(!device.is_streaming());
    assert!(!device.is_powered());
}

#[test]
fn identity_mismatch_on_start_leaves_the_sensor_off() {
    let (mut device, registers, _) = open();
    registers.preset(0x0016, &[0x02, 0x19]);
    assert_eq!(
        device.start_stream(),
        Err(sony_imx363::Error::IdentityMismatch {
            expected: 0x0363,
            found: 0x0219
        })
    );
    assert!(!device.is_powered());
    assert!(!device.is_streaming());
    assert_eq!(device.state(), sony_imx363::State::Standby);
    assert_eq!(registers.writes_to(MODE_SELECT).len(), 0);
}

#[test]
fn failed_list_write_unwinds_to_standby() {
    let (mut device, registers, _) = open();
    registers.set_fail_at(Some(0x64D5));
    assert_eq!(
        device.start_stream(),
        Err(sony_imx363::Error::PartialApply(register::ApplyError {
            list: "baseline",
            address: 0x64D5,
            source: register::Error::Bus(bus::Error::Timeout {
                device_address: 0x10
            }),
        }))
    );
    assert!(!device.is_powered());
    assert!(!device.is_streaming());
    let written: Vec<u16> = registers
        .transactions()
        .iter()
        .filter(|transaction| matches!(transaction, mock::Transaction::Write { .. }))
        .map(mock::Transaction::address)
        .collect();
    assert_eq!(written.last(), Some(&0x64D5));
    assert!(!written.contains(&0x64D6));

    registers.set_fail_at(None);
    device.start_stream().unwrap();
    assert!(device.is_streaming());
}

#[test]
fn short_control_write_is_a_transport_error() {
    let (mut device, registers, _) = open();
    registers.set_short_write_at(Some(FRAME_LENGTH_LINES));
    assert_eq!(
        device.start_stream(),
        Err(sony_imx363::Error::Transport(register::Error::ShortWrite {
            address: FRAME_LENGTH_LINES,
            expected: 4,
            count: 3
        }))
    );
    assert!(!device.is_powered());
}

#[test]
fn vertical_blank_scenario() {
    let (mut device, registers, _) = open();
    device.start_stream().unwrap();
    registers.clear_transactions();
    device.set_control(Id::VerticalBlank, 200).unwrap();
    assert_eq!(device.control(Id::Exposure).maximum, 3220);
    assert_eq!(device.control(Id::Exposure).value, 1600);
    assert_eq!(registers.writes_to(FRAME_LENGTH_LINES), vec![vec![0x0C, 0x98]]);
    assert_eq!(registers.writes_to(EXPOSURE).len(), 0);
}

#[test]
fn shrinking_the_frame_pushes_the_clamped_exposure() {
    let (mut device, registers, _) = open();
    device.start_stream().unwrap();
    device.set_control(Id::VerticalBlank, 2000).unwrap();
    device.set_control(Id::Exposure, 4000).unwrap();
    registers.clear_transactions();
    device.set_control(Id::VerticalBlank, 116).unwrap();
    assert_eq!(device.control(Id::Exposure).value, 1600);
    assert_eq!(device.control(Id::Exposure).maximum, 3136);
    assert_eq!(registers.value(FRAME_LENGTH_LINES, 2), 3140);
    assert_eq!(registers.value(EXPOSURE, 2), 1600);
    let written: Vec<u16> = registers
        .transactions()
        .iter()
        .map(mock::Transaction::address)
        .collect();
    assert_eq!(written, vec![EXPOSURE, FRAME_LENGTH_LINES]);
}

#[test]
fn refused_control_write_keeps_the_previous_values() {
    let (mut device, registers, _) = open();
    device.start_stream().unwrap();
    registers.set_fail_at(Some(FRAME_LENGTH_LINES));
    assert!(matches!(
        device.set_control(Id::VerticalBlank, 200),
        Err(sony_imx363::Error::Transport(_))
    ));
    assert_eq!(device.control(Id::VerticalBlank).value, 116);
    assert_eq!(device.control(Id::Exposure).maximum, 3136);
    assert_eq!(registers.value(FRAME_LENGTH_LINES, 2), 3140);
    assert!(device.is_streaming());

    registers.set_fail_at(None);
    device.set_control(Id::VerticalBlank, 200).unwrap();
    assert_eq!(device.control(Id::Exposure).maximum, 3220);
    assert_eq!(registers.value(FRAME_LENGTH_LINES, 2), 3224);
}

#[test]
fn refused_clamped_exposure_keeps_the_frame_length() {
    let (mut device, registers, _) = open();
    device.start_stream().unwrap();
    device.set_control(Id::VerticalBlank, 2000).unwrap();
    device.set_control(Id::Exposure, 4000).unwrap();
    registers.set_fail_at(Some(EXPOSURE));
    assert!(device.set_control(Id::VerticalBlank, 116).is_err());
    assert_eq!(device.control(Id::VerticalBlank).value, 2000);
    assert_eq!(device.control(Id::Exposure).value, 4000);
    assert_eq!(device.control(Id::Exposure).maximum, 5020);
    assert_eq!(registers.value(FRAME_LENGTH_LINES, 2), 5024);
    assert_eq!(registers.writes_to(FRAME_LENGTH_LINES).len(), 2);
}

#[test]
fn refused_format_change_keeps_the_previous_format() {
    let (mut device, registers, _) = open();
    device.start_stream().unwrap();
    device.set_control(Id::VerticalBlank, 500).unwrap();
    registers.set_fail_at(Some(FRAME_LENGTH_LINES));
    assert!(device
        .set_format(FormatRequest {
            width: 4032,
            height: 3024,
            code: FormatCode::Srggb8.code(),
        })
        .is_err());
    assert_eq!(device.get_format().code, FormatCode::Srggb10);
    assert_eq!(device.control(Id::VerticalBlank).value, 500);
    assert_eq!(device.control(Id::Exposure).maximum, 3520);
}

#[test]
fn out_of_range_controls_are_rejected() {
    let (mut device, registers, _) = open();
    assert_eq!(
        device.set_control(Id::DigitalGain, 255),
        Err(sony_imx363::Error::Range(controls::Error::OutOfRange {
            id: Id::DigitalGain,
            value: 255,
            minimum: 256,
            maximum: 4095
        }))
    );
    assert_eq!(
        device.set_control(Id::HorizontalBlank, 0),
        Err(sony_imx363::Error::Range(controls::Error::ReadOnly {
            id: Id::HorizontalBlank
        }))
    );
    assert_eq!(device.control(Id::DigitalGain).value, 256);
    assert_eq!(registers.transaction_count(), 0);
}

#[test]
fn controls_are_cached_while_off_and_replayed_on_start() {
    let (mut device, registers, _) = open();
    device.set_control(Id::Exposure, 1000).unwrap();
    device.set_control(Id::AnalogGain, 200).unwrap();
    device.set_control(Id::TestPattern, 2).unwrap();
    assert_eq!(registers.transaction_count(), 0);
    device.start_stream().unwrap();
    assert_eq!(registers.value(EXPOSURE, 2), 1000);
    assert_eq!(registers.value(0x0204, 2), 200);
    assert_eq!(registers.value(0x0600, 2), 2);
    assert_eq!(
        device.controls().test_pattern_name(),
        "Eight Vertical Colour Bars"
    );
}

#[test]
fn flips_are_frozen_while_streaming() {
    let (mut device, registers, _) = open();
    device.start_stream().unwrap();
    registers.clear_transactions();
    assert_eq!(
        device.set_control(Id::HorizontalFlip, 1),
        Err(sony_imx363::Error::Range(controls::Error::Grabbed {
            id: Id::HorizontalFlip
        }))
    );
    assert_eq!(device.control(Id::HorizontalFlip).value, 0);
    assert_eq!(device.get_format().code, FormatCode::Srggb10);
    assert_eq!(registers.transaction_count(), 0);

    device.stop_stream();
    device.set_control(Id::HorizontalFlip, 1).unwrap();
    assert_eq!(device.get_format().code, FormatCode::Sgrbg10);
    device.set_control(Id::VerticalFlip, 1).unwrap();
    assert_eq!(device.get_format().code, FormatCode::Sbggr10);
    device.start_stream().unwrap();
    assert_eq!(registers.value(ORIENTATION, 1), 0b11);
}

#[test]
fn formats_follow_the_flips() {
    let (mut device, _, _) = open();
    assert_eq!(device.enumerate_formats(0), Ok(FormatCode::Srggb10));
    assert_eq!(device.enumerate_formats(1), Ok(FormatCode::Srggb8));
    assert!(device.enumerate_formats(2).is_err());
    device.set_control(Id::VerticalFlip, 1).unwrap();
    assert_eq!(device.enumerate_formats(0), Ok(FormatCode::Sgbrg10));
    assert_eq!(device.enumerate_formats(1), Ok(FormatCode::Sgbrg8));
}

#[test]
fn sizes_are_listed_for_the_current_variant_only() {
    let (mut device, _, _) = open();
    let size = device.enumerate_sizes(FormatCode::Srggb10.code(), 0).unwrap();
    assert_eq!((size.min_width, size.max_height), (4032, 3024));
    assert_eq!(
        device.enumerate_sizes(FormatCode::Sgrbg10.code(), 0),
        Err(sony_imx363::Error::FormatCode { code: 0x300A })
    );
    assert!(matches!(
        device.enumerate_sizes(FormatCode::Srggb10.code(), 1),
        Err(sony_imx363::Error::OutOfRange(_))
    ));
    device.set_control(Id::HorizontalFlip, 1).unwrap();
    assert!(device.enumerate_sizes(FormatCode::Sgrbg10.code(), 0).is_ok());
}

#[test]
fn try_format_does_not_change_anything() {
    let (device, _, _) = open();
    let format = device.try_format(FormatRequest {
        width: 1920,
        height: 1080,
        code: FormatCode::Sbggr8.code(),
    });
    assert_eq!((format.width, format.height), (4032, 3024));
    assert_eq!(format.code, FormatCode::Srggb8);
    assert_eq!(device.get_format().code, FormatCode::Srggb10);
}

#[test]
fn set_format_only_resets_controls_on_change() {
    let (mut device, registers, _) = open();
    device.set_control(Id::VerticalBlank, 500).unwrap();
    let current = device.get_format();
    device.set_format(current.into()).unwrap();
    assert_eq!(device.control(Id::VerticalBlank).value, 500);

    let format = device
        .set_format(FormatRequest {
            width: 4032,
            height: 3024,
            code: FormatCode::Sgbrg8.code(),
        })
        .unwrap();
    assert_eq!(format.code, FormatCode::Srggb8);
    assert_eq!(device.get_format(), format);
    assert_eq!(device.control(Id::VerticalBlank).value, 116);

    device.start_stream().unwrap();
    assert_eq!(registers.value(CSI_DATA_FORMAT, 2), 0x0808);
    assert_eq!(registers.value(0x0309, 1), 0x08);
}

#[test]
fn unknown_codes_fall_back_to_raw10() {
    let (mut device, _, _) = open();
    let format = device
        .set_format(FormatRequest {
            width: 640,
            height: 480,
            code: 0x2008,
        })
        .unwrap();
    assert_eq!(format.code, FormatCode::Srggb10);
    assert_eq!((format.width, format.height), (4032, 3024));
}

#[test]
fn suspend_only_disables_the_stream() {
    let (mut device, registers, board) = open();
    device.start_stream().unwrap();
    registers.clear_transactions();
    board.clear_events();
    device.suspend();
    assert!(device.is_suspended());
    assert!(device.is_streaming());
    assert!(device.is_powered());
    assert_eq!(registers.writes_to(MODE_SELECT), vec![vec![0]]);
    assert_eq!(registers.transaction_count(), 1);
    assert!(board.events().is_empty());

    registers.clear_transactions();
    device.resume().unwrap();
    assert!(!device.is_suspended());
    assert!(device.is_streaming());
    assert_eq!(registers.transaction_count(), start_length() - 1);
    assert_eq!(registers.value(MODE_SELECT, 1), 1);
}

#[test]
fn resume_without_suspend_does_nothing() {
    let (mut device, registers, _) = open();
    device.resume().unwrap();
    device.suspend();
    assert!(!device.is_suspended());
    device.start_stream().unwrap();
    registers.clear_transactions();
    device.resume().unwrap();
    assert_eq!(registers.transaction_count(), 0);
}

#[test]
fn failed_resume_forces_a_full_stop() {
    let (mut device, registers, _) = open();
    device.start_stream().unwrap();
    device.suspend();
    registers.set_fail_at(Some(0x0114));
    assert!(matches!(
        device.resume(),
        Err(sony_imx363::Error::PartialApply(register::ApplyError {
            list: "baseline",
            address: 0x0114,
            ..
        }))
    ));
    assert!(!device.is_streaming());
    assert!(!device.is_powered());
    assert!(!device.is_suspended());
    registers.set_fail_at(None);
    device.set_control(Id::HorizontalFlip, 1).unwrap();
}

#[test]
fn drop_stops_and_powers_off() {
    let (mut device, registers, board) = open();
    device.start_stream().unwrap();
    registers.clear_transactions();
    board.clear_events();
    drop(device);
    assert_eq!(registers.writes_to(MODE_SELECT), vec![vec![0]]);
    assert_eq!(
        board.events(),
        vec![
            mock::Event::ResetLow,
            mock::Event::RegulatorsOff,
            mock::Event::ClockOff,
        ]
    );
}

#[test]
fn settle_margin_is_bounded() {
    let registers = mock::Registers::with_chip_id(0x0016, sony_imx363::CHIP_ID);
    let board = mock::Board::new();
    let mut configuration = sony_imx363::DEFAULT_CONFIGURATION;
    configuration.settle_margin_us = 400;
    let mut device = sony_imx363::open(registers.clone(), board.sequencer(), configuration.clone())
        .unwrap();
    assert!(board
        .events()
        .contains(&mock::Event::Delay { microseconds: 6600 }));
    drop(device);

    let board = mock::Board::new();
    configuration.settle_margin_us = 5000;
    device = sony_imx363::open(registers, board.sequencer(), configuration).unwrap();
    board.clear_events();
    device.start_stream().unwrap();
    assert_eq!(
        board.events()[3],
        mock::Event::Delay { microseconds: 7200 }
    );
}
