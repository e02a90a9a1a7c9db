use embedded_hal::delay::DelayNs;
use embedded_hal::digital::Error as _;
use embedded_hal::digital::OutputPin;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("clock error: {0}")]
    Clock(String),

    #[error("regulator error: {0}")]
    Regulators(String),

    #[error("driving the reset line failed ({0})")]
    Reset(embedded_hal::digital::ErrorKind),
}

/// External clock feeding the sensor.
pub trait Clock {
    fn set_rate(&mut self, frequency: u32) -> Result<(), Error>;

    fn enable(&mut self) -> Result<(), Error>;

    fn disable(&mut self);
}

/// The sensor's supplies, switched together.
///
/// `enable_all` must leave every supply off when it fails.
pub trait Regulators {
    fn enable_all(&mut self) -> Result<(), Error>;

    fn disable_all(&mut self);
}

/// Power control as seen by a sensor state machine.
pub trait Power {
    fn set_clock_rate(&mut self, frequency: u32) -> Result<(), Error>;

    /// Powers the sensor and waits `settle_us` microseconds after releasing the reset line.
    /// Does nothing if the sensor is already powered.
    fn power_on(&mut self, settle_us: u32) -> Result<(), Error>;

    /// Never fails and does nothing if the sensor is not powered.
    fn power_off(&mut self);

    fn delay_us(&mut self, microseconds: u32);

    fn is_powered(&self) -> bool;
}

/// Regulators, clock and reset line (XCLR, active low), switched in the order the sensor requires.
pub struct Sequencer<C, R, P, D> {
    clock: C,
    regulators: R,
    reset: P,
    delay: D,
    powered: bool,
}

impl<C, R, P, D> Sequencer<C, R, P, D>
where
    C: Clock,
    R: Regulators,
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(clock: C, regulators: R, reset: P, delay: D) -> Self {
        Self {
            clock,
            regulators,
            reset,
            delay,
            powered: false,
        }
    }

    pub fn into_inner(self) -> (C, R, P, D) {
        (self.clock, self.regulators, self.reset, self.delay)
    }
}

impl<C, R, P, D> Power for Sequencer<C, R, P, D>
where
    C: Clock,
    R: Regulators,
    P: OutputPin,
    D: DelayNs,
{
    fn set_clock_rate(&mut self, frequency: u32) -> Result<(), Error> {
        self.clock.set_rate(frequency)
    }

    fn power_on(&mut self, settle_us: u32) -> Result<(), Error> {
        if self.powered {
            return Ok(());
        }
        self.regulators.enable_all()?;
        if let Err(error) = self.clock.enable() {
            log::error!("enabling the clock failed: {error}");
            self.regulators.disable_all();
            return Err(error);
        }
        if let Err(error) = self.reset.set_high() {
            let error = Error::Reset(error.kind());
            log::error!("{error}");
            self.clock.disable();
            self.regulators.disable_all();
            return Err(error);
        }
        self.delay.delay_us(settle_us);
        self.powered = true;
        log::debug!("powered on");
        Ok(())
    }

    fn power_off(&mut self) {
        if !self.powered {
            return;
        }
        if let Err(error) = self.reset.set_low() {
            log::warn!("driving the reset line low failed ({})", error.kind());
        }
        self.regulators.disable_all();
        self.clock.disable();
        self.powered = false;
        log::debug!("powered off");
    }

    fn delay_us(&mut self, microseconds: u32) {
        self.delay.delay_us(microseconds);
    }

    fn is_powered(&self) -> bool {
        self.powered
    }
}
