use crate::bus;
use crate::catalog;
use crate::configuration;
use crate::controls;
use crate::device;
use crate::power;
use crate::properties;
use crate::register;
use crate::types;

use register::{Register, RegisterList, RegisterOp};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Configuration {
    pub device_address: u8,
    pub endpoint: configuration::Endpoint,
    /// Added to the reset settle time, capped at [`SETTLE_MARGIN_MAXIMUM_US`].
    pub settle_margin_us: u32,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] register::Error),

    #[error(transparent)]
    PartialApply(#[from] register::ApplyError),

    #[error(transparent)]
    Range(#[from] controls::Error),

    #[error(transparent)]
    HardwareConfiguration(#[from] configuration::Error),

    #[error(transparent)]
    Power(#[from] power::Error),

    #[error(transparent)]
    OutOfRange(#[from] catalog::Error),

    #[error("Unexpected chip id (expected {expected:#06X}, read {found:#06X})")]
    IdentityMismatch { expected: u16, found: u16 },

    #[error("Format code {code:#06X} does not match the current orientation")]
    FormatCode { code: u32 },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    Standby,
    Configuring,
    Streaming,
}

pub const CHIP_ID: u16 = 0x0363;
pub const DATA_LANES: u8 = 4;
pub const LINK_FREQUENCY: u64 = 504_000_000;
pub const CLOCK_FREQUENCY: u32 = 24_000_000;
pub const BITS_PER_SAMPLE: u64 = 10;
pub const PIXEL_RATE: u64 = LINK_FREQUENCY * 2 * DATA_LANES as u64 / BITS_PER_SAMPLE;

/// Total pixels per line, blanking included.
pub const LINE_LENGTH: u32 = 0x2280;

/// Minimum wait between releasing XCLR and the first register access.
pub const SETTLE_US: u32 = 6200;
pub const SETTLE_MARGIN_MAXIMUM_US: u32 = 1000;

/// The sensor only reaches the LP-11 state after it has streamed once.
const STREAM_TOGGLE_DELAY_US: u32 = 100;

pub const ENDPOINT_REQUIREMENTS: configuration::Requirements = configuration::Requirements {
    data_lanes: DATA_LANES,
    link_frequencies: &[LINK_FREQUENCY],
    clock_frequency: CLOCK_FREQUENCY,
    clock_tolerance_percent: 1,
};

const MODE_SELECT: Register = Register::new(0x0100, 1);
const ORIENTATION: Register = Register::new(0x0101, 1);
const CHIP_ID_REGISTER: Register = Register::new(0x0016, 2);
const CSI_DATA_FORMAT: Register = Register::new(0x0112, 2);
const CSI_LANE_MODE: Register = Register::new(0x0114, 1);
const EXTERNAL_CLOCK_INTEGER: Register = Register::new(0x0136, 1);
const EXTERNAL_CLOCK_FRACTION: Register = Register::new(0x0137, 1);
const COARSE_INTEGRATION_TIME: Register = Register::new(0x0202, 2);
const ANALOG_GAIN: Register = Register::new(0x0204, 2);
const DIGITAL_GAIN: Register = Register::new(0x020E, 2);
const SHORT_COARSE_INTEGRATION_TIME: Register = Register::new(0x0224, 2);
const SHORT_ANALOG_GAIN: Register = Register::new(0x0216, 2);
const SHORT_DIGITAL_GAIN: Register = Register::new(0x0226, 2);
const HDR_MODE: Register = Register::new(0x0220, 1);
const HDR_RESOLUTION_REDUCTION: Register = Register::new(0x0221, 1);
const FRAME_LENGTH_LINES: Register = Register::new(0x0340, 2);
const LINE_LENGTH_PIXELS: Register = Register::new(0x0342, 2);
const X_ADDRESS_START: Register = Register::new(0x0344, 2);
const Y_ADDRESS_START: Register = Register::new(0x0346, 2);
const X_ADDRESS_END: Register = Register::new(0x0348, 2);
const Y_ADDRESS_END: Register = Register::new(0x034A, 2);
const X_OUTPUT_SIZE: Register = Register::new(0x034C, 2);
const Y_OUTPUT_SIZE: Register = Register::new(0x034E, 2);
const X_EVEN_INCREMENT: Register = Register::new(0x0381, 1);
const X_ODD_INCREMENT: Register = Register::new(0x0383, 1);
const Y_EVEN_INCREMENT: Register = Register::new(0x0385, 1);
const Y_ODD_INCREMENT: Register = Register::new(0x0387, 1);
const DIGITAL_CROP_X_OFFSET: Register = Register::new(0x0408, 2);
const DIGITAL_CROP_Y_OFFSET: Register = Register::new(0x040A, 2);
const DIGITAL_CROP_WIDTH: Register = Register::new(0x040C, 2);
const DIGITAL_CROP_HEIGHT: Register = Register::new(0x040E, 2);
const VIDEO_TIMING_PIXEL_CLOCK_DIVIDER: Register = Register::new(0x0301, 1);
const VIDEO_TIMING_SYSTEM_CLOCK_DIVIDER: Register = Register::new(0x0303, 1);
const VIDEO_TIMING_PRE_PLL_DIVIDER: Register = Register::new(0x0305, 1);
const VIDEO_TIMING_PLL_MULTIPLIER: Register = Register::new(0x0306, 2);
const OUTPUT_PIXEL_CLOCK_DIVIDER: Register = Register::new(0x0309, 1);
const OUTPUT_SYSTEM_CLOCK_DIVIDER: Register = Register::new(0x030B, 1);
const OUTPUT_PRE_PLL_DIVIDER: Register = Register::new(0x030D, 1);
const OUTPUT_PLL_MULTIPLIER: Register = Register::new(0x030E, 2);
const PLL_MULTIPLIER_DRIVE: Register = Register::new(0x0310, 1);
const TEST_PATTERN: Register = Register::new(0x0600, 2);
const BINNING_MODE: Register = Register::new(0x0900, 1);
const BINNING_TYPE: Register = Register::new(0x0901, 1);
const DPHY_CONTROL: Register = Register::new(0x0808, 1);

const STANDBY: u32 = 0x00;
const STREAMING: u32 = 0x01;
const CSI_LANE_MODE_4: u32 = 0x03;

const BASELINE_OPERATIONS: &[RegisterOp] = &[
    MODE_SELECT.op(STANDBY),
    CSI_LANE_MODE.op(CSI_LANE_MODE_4),
    EXTERNAL_CLOCK_INTEGER.op(0x18),
    EXTERNAL_CLOCK_FRACTION.op(0x00),
    RegisterOp::new(0x31A3, 1, 0x00),
    RegisterOp::new(0x64D4, 1, 0x01),
    RegisterOp::new(0x64D5, 1, 0xAA),
    RegisterOp::new(0x64D6, 1, 0x01),
    RegisterOp::new(0x64D7, 1, 0xA9),
    RegisterOp::new(0x64D8, 1, 0x01),
    RegisterOp::new(0x64D9, 1, 0xA5),
    RegisterOp::new(0x64DA, 1, 0x01),
    RegisterOp::new(0x64DB, 1, 0xA1),
    RegisterOp::new(0x720A, 1, 0x24),
    RegisterOp::new(0x720B, 1, 0x89),
    RegisterOp::new(0x720C, 1, 0x85),
    RegisterOp::new(0x720D, 1, 0xA1),
    RegisterOp::new(0x720E, 1, 0x6E),
    RegisterOp::new(0x729C, 1, 0x59),
    RegisterOp::new(0x817C, 1, 0xFF),
    RegisterOp::new(0x817D, 1, 0x80),
    RegisterOp::new(0x9348, 1, 0x96),
    RegisterOp::new(0x934B, 1, 0x8C),
    RegisterOp::new(0x934C, 1, 0x82),
    RegisterOp::new(0x9353, 1, 0xAA),
    RegisterOp::new(0x9354, 1, 0xAA),
    LINE_LENGTH_PIXELS.op(LINE_LENGTH),
    X_EVEN_INCREMENT.op(0x01),
    X_ODD_INCREMENT.op(0x01),
    Y_EVEN_INCREMENT.op(0x01),
    Y_ODD_INCREMENT.op(0x01),
    BINNING_MODE.op(0x00),
    RegisterOp::new(0x30F4, 1, 0x02),
    RegisterOp::new(0x30F5, 1, 0x80),
    RegisterOp::new(0x31A5, 1, 0x00),
    RegisterOp::new(0x31A6, 1, 0x00),
    RegisterOp::new(0x560F, 1, 0xBE),
    RegisterOp::new(0x5856, 1, 0x08),
    RegisterOp::new(0x58D0, 1, 0x10),
    RegisterOp::new(0x734A, 1, 0x01),
    RegisterOp::new(0x734F, 1, 0x2B),
    RegisterOp::new(0x7441, 1, 0x55),
    RegisterOp::new(0x7914, 1, 0x03),
    RegisterOp::new(0x7928, 1, 0x04),
    RegisterOp::new(0x7929, 1, 0x04),
    RegisterOp::new(0x793F, 1, 0x03),
    RegisterOp::new(0xBC7B, 1, 0x18),
    VIDEO_TIMING_PIXEL_CLOCK_DIVIDER.op(0x03),
    VIDEO_TIMING_SYSTEM_CLOCK_DIVIDER.op(0x02),
    VIDEO_TIMING_PRE_PLL_DIVIDER.op(0x04),
    VIDEO_TIMING_PLL_MULTIPLIER.op(0x00D0),
    OUTPUT_SYSTEM_CLOCK_DIVIDER.op(0x01),
    OUTPUT_PRE_PLL_DIVIDER.op(0x04),
    OUTPUT_PLL_MULTIPLIER.op(0x00E6),
    PLL_MULTIPLIER_DRIVE.op(0x01),
    SHORT_COARSE_INTEGRATION_TIME.op(0x01F4),
    SHORT_ANALOG_GAIN.op(0x0000),
    SHORT_DIGITAL_GAIN.op(0x0100),
    HDR_MODE.op(0x00),
    HDR_RESOLUTION_REDUCTION.op(0x11),
    DPHY_CONTROL.op(0x00),
];

const RAW10_OPERATIONS: &[RegisterOp] = &[
    CSI_DATA_FORMAT.op(0x0A0A),
    OUTPUT_PIXEL_CLOCK_DIVIDER.op(0x0A),
];

const RAW8_OPERATIONS: &[RegisterOp] = &[
    CSI_DATA_FORMAT.op(0x0808),
    OUTPUT_PIXEL_CLOCK_DIVIDER.op(0x08),
];

// full readout, no binning
const MODE_4032_3024_OPERATIONS: &[RegisterOp] = &[
    X_ADDRESS_START.op(0),
    Y_ADDRESS_START.op(0),
    X_ADDRESS_END.op(4031),
    Y_ADDRESS_END.op(3023),
    X_OUTPUT_SIZE.op(4032),
    Y_OUTPUT_SIZE.op(3024),
    DIGITAL_CROP_X_OFFSET.op(0),
    DIGITAL_CROP_Y_OFFSET.op(0),
    DIGITAL_CROP_WIDTH.op(4032),
    DIGITAL_CROP_HEIGHT.op(3024),
    BINNING_TYPE.op(0x11),
];

pub static BASELINE: RegisterList = RegisterList::new("baseline", BASELINE_OPERATIONS);
pub static RAW10: RegisterList = RegisterList::new("raw10", RAW10_OPERATIONS);
pub static RAW8: RegisterList = RegisterList::new("raw8", RAW8_OPERATIONS);

pub static MODES: [catalog::Mode; 1] = [catalog::Mode {
    width: 4032,
    height: 3024,
    frame_length_default: 3140,
    frame_length_minimum: 3140,
    registers: RegisterList::new("mode 4032x3024", MODE_4032_3024_OPERATIONS),
}];

pub static CATALOG: catalog::Catalog = catalog::Catalog::new(&MODES);

pub const MINIMUM_VERTICAL_BLANK: u32 = 4;

pub static LIMITS: controls::Limits = controls::Limits {
    frame_length_maximum: 0xFFFF,
    line_length: LINE_LENGTH,
    exposure_minimum: 4,
    exposure_default: 0x0640,
    exposure_guard: 4,
    analog_gain: controls::Range {
        minimum: 0,
        maximum: 448,
        default: 0,
    },
    digital_gain: controls::Range {
        minimum: 256,
        maximum: 4095,
        default: 256,
    },
    link_frequencies: &[LINK_FREQUENCY as i64],
    test_patterns: &[
        "Disabled",
        "Solid Colour",
        "Eight Vertical Colour Bars",
        "Colour Bars With Fade to Grey",
        "Pseudorandom Sequence (PN9)",
    ],
};

pub const DEFAULT_CONFIGURATION: Configuration = Configuration {
    device_address: 0x10,
    endpoint: ENDPOINT_REQUIREMENTS.endpoint(),
    settle_margin_us: 0,
};

pub const PROPERTIES: properties::Sensor<Configuration> = properties::Sensor {
    name: "Sony IMX363",
    chip_id: CHIP_ID,
    width: 4032,
    height: 3024,
    default_configuration: DEFAULT_CONFIGURATION,
};

pub fn open<B: bus::Bus, P: power::Power>(
    bus: B,
    power: P,
    configuration: Configuration,
) -> Result<Device<B, P>, Error> {
    Device::open(bus, power, configuration)
}

fn format_registers(format_code: types::FormatCode) -> &'static RegisterList {
    if format_code.bits_per_sample() == 10 {
        &RAW10
    } else {
        &RAW8
    }
}

pub struct Device<B: bus::Bus, P: power::Power> {
    transport: register::Transport<B>,
    power: P,
    configuration: Configuration,
    mode: &'static catalog::Mode,
    format_code: types::FormatCode,
    controls: controls::Controls,
    state: State,
    suspended: bool,
}

impl<B: bus::Bus, P: power::Power> Device<B, P> {
    /// Checks the board description, identifies the sensor and leaves it in standby, powered off.
    pub fn open(bus: B, mut power: P, configuration: Configuration) -> Result<Self, Error> {
        configuration.endpoint.validate(&ENDPOINT_REQUIREMENTS)?;
        power.set_clock_rate(configuration.endpoint.clock_frequency)?;
        let mode = CATALOG.default_mode();
        let mut device = Self {
            transport: register::Transport::new(bus, configuration.device_address),
            power,
            configuration,
            mode,
            format_code: types::FormatCode::Srggb10,
            controls: controls::Controls::new(&LIMITS, PIXEL_RATE as i64, mode),
            state: State::Standby,
            suspended: false,
        };
        device.power_on()?;
        let result = device
            .identify()
            .and_then(|()| device.enter_low_power_state());
        device.power.power_off();
        result?;
        log::info!(
            "{} at {:#04X} ready ({}x{}, {})",
            PROPERTIES.name,
            device.configuration.device_address,
            mode.width,
            mode.height,
            device.format_code
        );
        Ok(device)
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn mode(&self) -> &'static catalog::Mode {
        self.mode
    }

    pub fn controls(&self) -> &controls::Controls {
        &self.controls
    }

    pub fn transport(&self) -> &register::Transport<B> {
        &self.transport
    }

    pub fn power(&self) -> &P {
        &self.power
    }

    fn settle_us(&self) -> u32 {
        SETTLE_US + self.configuration.settle_margin_us.min(SETTLE_MARGIN_MAXIMUM_US)
    }

    fn power_on(&mut self) -> Result<(), Error> {
        let settle_us = self.settle_us();
        self.power.power_on(settle_us)?;
        Ok(())
    }

    fn identify(&mut self) -> Result<(), Error> {
        let found = CHIP_ID_REGISTER.get(&mut self.transport)? as u16;
        if found != CHIP_ID {
            log::error!("chip id mismatch (expected {CHIP_ID:#06X}, read {found:#06X})");
            return Err(Error::IdentityMismatch {
                expected: CHIP_ID,
                found,
            });
        }
        Ok(())
    }

    fn enter_low_power_state(&mut self) -> Result<(), Error> {
        MODE_SELECT.set(&mut self.transport, STREAMING)?;
        self.power.delay_us(STREAM_TOGGLE_DELAY_US);
        MODE_SELECT.set(&mut self.transport, STANDBY)?;
        self.power.delay_us(STREAM_TOGGLE_DELAY_US);
        Ok(())
    }

    /// Register part of a stream start, the sensor must be powered.
    fn configure(&mut self) -> Result<(), Error> {
        self.transport.apply(
            BASELINE
                .then(format_registers(self.format_code))
                .then(&self.mode.registers),
        )?;
        let writable: Vec<controls::Id> = self.controls.writable().collect();
        for id in writable {
            self.write_control(id)?;
        }
        MODE_SELECT.set(&mut self.transport, STREAMING)?;
        Ok(())
    }

    fn write_control(&mut self, id: controls::Id) -> Result<(), register::Error> {
        let value = self.controls.value(id);
        match id {
            controls::Id::VerticalBlank => FRAME_LENGTH_LINES.set(
                &mut self.transport,
                (self.mode.height as i64 + value) as u32,
            ),
            controls::Id::Exposure => COARSE_INTEGRATION_TIME.set(&mut self.transport, value as u32),
            controls::Id::AnalogGain => ANALOG_GAIN.set(&mut self.transport, value as u32),
            controls::Id::DigitalGain => DIGITAL_GAIN.set(&mut self.transport, value as u32),
            controls::Id::HorizontalFlip | controls::Id::VerticalFlip => ORIENTATION.set(
                &mut self.transport,
                self.controls.hflip() as u32 | (self.controls.vflip() as u32) << 1,
            ),
            controls::Id::TestPattern => TEST_PATTERN.set(&mut self.transport, value as u32),
            controls::Id::PixelRate | controls::Id::LinkFrequency | controls::Id::HorizontalBlank => {
                Ok(())
            }
        }
    }

    fn write_controls(&mut self, ids: &[controls::Id]) -> Result<(), Error> {
        if self.power.is_powered() {
            for id in ids {
                self.write_control(*id)?;
            }
        }
        Ok(())
    }

    fn nearest_format(
        &self,
        request: types::FormatRequest,
    ) -> (&'static catalog::Mode, types::FormatCode) {
        (
            CATALOG.select_mode(request.width, request.height),
            catalog::select_format(request.code, self.controls.vflip(), self.controls.hflip()),
        )
    }

    /// Stops streaming and powers off, regardless of the current state.
    fn teardown(&mut self) {
        self.controls.grab_flips(false);
        self.power.power_off();
        self.state = State::Standby;
        self.suspended = false;
    }
}

impl<B: bus::Bus, P: power::Power> device::Sensor for Device<B, P> {
    type Configuration = Configuration;

    type Error = Error;

    type Properties = properties::Sensor<Self::Configuration>;

    const PROPERTIES: Self::Properties = PROPERTIES;

    fn current_configuration(&self) -> Self::Configuration {
        self.configuration.clone()
    }

    fn enumerate_formats(&self, index: usize) -> Result<types::FormatCode, Self::Error> {
        Ok(catalog::enumerate_formats(
            index,
            self.controls.vflip(),
            self.controls.hflip(),
        )?)
    }

    fn enumerate_sizes(
        &self,
        code: u32,
        index: usize,
    ) -> Result<types::FrameSizeRange, Self::Error> {
        if catalog::select_format(code, self.controls.vflip(), self.controls.hflip()).code() != code
        {
            return Err(Error::FormatCode { code });
        }
        Ok(CATALOG.enumerate_sizes(index)?)
    }

    fn get_format(&self) -> types::FrameFormat {
        types::FrameFormat {
            width: self.mode.width,
            height: self.mode.height,
            code: self.format_code,
        }
    }

    fn try_format(&self, request: types::FormatRequest) -> types::FrameFormat {
        let (mode, code) = self.nearest_format(request);
        types::FrameFormat {
            width: mode.width,
            height: mode.height,
            code,
        }
    }

    fn set_format(&mut self, request: types::FormatRequest) -> Result<types::FrameFormat, Self::Error> {
        let (mode, code) = self.nearest_format(request);
        let format = types::FrameFormat {
            width: mode.width,
            height: mode.height,
            code,
        };
        if !std::ptr::eq(mode, self.mode) || code != self.format_code {
            log::debug!(
                "format {}x{} {} -> {}x{} {}",
                self.mode.width,
                self.mode.height,
                self.format_code,
                format.width,
                format.height,
                format.code
            );
            let previous = (self.mode, self.format_code, self.controls.control_set().clone());
            self.mode = mode;
            self.format_code = code;
            let changed = self.controls.set_mode(mode);
            if let Err(error) = self.write_controls(&changed) {
                log::warn!("the sensor refused the new format: {error}");
                let (mode, format_code, set) = previous;
                self.mode = mode;
                self.format_code = format_code;
                self.controls.restore(set);
                return Err(error);
            }
        }
        Ok(format)
    }

    fn control(&self, id: controls::Id) -> controls::Control {
        *self.controls.get(id)
    }

    fn set_control(&mut self, id: controls::Id, value: i64) -> Result<(), Self::Error> {
        let previous = (self.controls.control_set().clone(), self.format_code);
        let changed = self.controls.set_value(self.mode, id, value)?;
        if matches!(id, controls::Id::HorizontalFlip | controls::Id::VerticalFlip) {
            self.format_code = catalog::select_format(
                self.format_code.code(),
                self.controls.vflip(),
                self.controls.hflip(),
            );
        }
        if let Err(error) = self.write_controls(&changed) {
            log::warn!("the sensor refused {id} = {value}: {error}");
            let (set, format_code) = previous;
            self.controls.restore(set);
            self.format_code = format_code;
            return Err(error);
        }
        Ok(())
    }

    fn start_stream(&mut self) -> Result<(), Self::Error> {
        if self.state == State::Streaming {
            return Ok(());
        }
        self.state = State::Configuring;
        if let Err(error) = self.power_on() {
            self.state = State::Standby;
            return Err(error);
        }
        match self.identify().and_then(|()| self.configure()) {
            Ok(()) => {
                self.controls.grab_flips(true);
                self.state = State::Streaming;
                log::info!(
                    "streaming {}x{} {}",
                    self.mode.width,
                    self.mode.height,
                    self.format_code
                );
                Ok(())
            }
            Err(error) => {
                log::error!("starting the stream failed: {error}");
                self.teardown();
                Err(error)
            }
        }
    }

    fn stop_stream(&mut self) {
        if self.state != State::Streaming {
            return;
        }
        if let Err(error) = MODE_SELECT.set(&mut self.transport, STANDBY) {
            log::warn!("disabling the stream failed: {error}");
        }
        self.teardown();
        log::info!("stream stopped");
    }

    fn suspend(&mut self) {
        if self.state != State::Streaming || self.suspended {
            return;
        }
        if let Err(error) = MODE_SELECT.set(&mut self.transport, STANDBY) {
            log::warn!("disabling the stream failed: {error}");
        }
        self.suspended = true;
        log::debug!("suspended");
    }

    fn resume(&mut self) -> Result<(), Self::Error> {
        if !self.suspended {
            return Ok(());
        }
        self.suspended = false;
        if let Err(error) = self.configure() {
            log::error!("resuming the stream failed: {error}");
            self.teardown();
            return Err(error);
        }
        log::debug!("resumed");
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.state == State::Streaming
    }

    fn is_powered(&self) -> bool {
        self.power.is_powered()
    }
}

impl<B: bus::Bus, P: power::Power> Drop for Device<B, P> {
    fn drop(&mut self) {
        if self.state != State::Standby {
            let _ = MODE_SELECT.set(&mut self.transport, STANDBY);
        }
        self.power.power_off();
    }
}
