//! In-memory collaborators for running sensors without hardware.
//!
//! Every handle is cheap to clone and clones share their state, so a test can hand one clone to
//! a device and keep another to inspect traffic and inject failures.

use crate::bus;
use crate::power;

const POISONED: &str = "mock mutex is not poisoned";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Write { address: u16, bytes: Vec<u8> },
    Read { address: u16, length: usize },
}

impl Transaction {
    pub fn address(&self) -> u16 {
        match self {
            Transaction::Write { address, .. } | Transaction::Read { address, .. } => *address,
        }
    }
}

#[derive(Debug, Default)]
struct RegisterFile {
    values: std::collections::HashMap<u16, u8>,
    transactions: Vec<Transaction>,
    fail_at: Option<u16>,
    short_at: Option<u16>,
}

/// A byte-addressed register file behind a bus, 16-bit big-endian register addresses.
#[derive(Debug, Clone, Default)]
pub struct Registers {
    file: std::sync::Arc<std::sync::Mutex<RegisterFile>>,
}

impl Registers {
    /// Empty register file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register file answering with `chip_id` at `address`.
    pub fn with_chip_id(address: u16, chip_id: u16) -> Self {
        let registers = Self::new();
        registers.preset(address, &chip_id.to_be_bytes());
        registers
    }

    pub fn preset(&self, address: u16, bytes: &[u8]) {
        let mut file = self.file.lock().expect(POISONED);
        for (offset, byte) in bytes.iter().enumerate() {
            file.values
                .insert(address.wrapping_add(offset as u16), *byte);
        }
    }

    /// Big-endian value of `length` bytes starting at `address`, unset bytes read as zero.
    pub fn value(&self, address: u16, length: usize) -> u32 {
        let file = self.file.lock().expect(POISONED);
        (0..length).fold(0, |value, offset| {
            (value << 8)
                | *file
                    .values
                    .get(&address.wrapping_add(offset as u16))
                    .unwrap_or(&0) as u32
        })
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.file.lock().expect(POISONED).transactions.clone()
    }

    pub fn transaction_count(&self) -> usize {
        self.file.lock().expect(POISONED).transactions.len()
    }

    pub fn clear_transactions(&self) {
        self.file.lock().expect(POISONED).transactions.clear();
    }

    /// Values written to `address`, in order.
    pub fn writes_to(&self, address: u16) -> Vec<Vec<u8>> {
        self.file
            .lock()
            .expect(POISONED)
            .transactions
            .iter()
            .filter_map(|transaction| match transaction {
                Transaction::Write {
                    address: written,
                    bytes,
                } if *written == address => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// Transfers to `address` fail until cleared.
    pub fn set_fail_at(&self, address: Option<u16>) {
        self.file.lock().expect(POISONED).fail_at = address;
    }

    /// Writes to `address` lose their last byte until cleared.
    pub fn set_short_write_at(&self, address: Option<u16>) {
        self.file.lock().expect(POISONED).short_at = address;
    }
}

fn split_address(bytes: &[u8]) -> Result<(u16, &[u8]), bus::Error> {
    if bytes.len() < 2 {
        return Err(bus::Error::Other(format!(
            "expected a 2-byte register address, got {} bytes",
            bytes.len()
        )));
    }
    Ok((u16::from_be_bytes([bytes[0], bytes[1]]), &bytes[2..]))
}

impl bus::Bus for Registers {
    fn write(&mut self, device_address: u8, bytes: &[u8]) -> Result<usize, bus::Error> {
        let (address, payload) = split_address(bytes)?;
        let mut file = self.file.lock().expect(POISONED);
        file.transactions.push(Transaction::Write {
            address,
            bytes: payload.to_vec(),
        });
        if file.fail_at == Some(address) {
            return Err(bus::Error::Timeout { device_address });
        }
        let count = if file.short_at == Some(address) {
            payload.len().saturating_sub(1)
        } else {
            payload.len()
        };
        for (offset, byte) in payload[..count].iter().enumerate() {
            file.values
                .insert(address.wrapping_add(offset as u16), *byte);
        }
        Ok(2 + count)
    }

    fn write_read(
        &mut self,
        device_address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<usize, bus::Error> {
        let (address, _) = split_address(bytes)?;
        let mut file = self.file.lock().expect(POISONED);
        file.transactions.push(Transaction::Read {
            address,
            length: buffer.len(),
        });
        if file.fail_at == Some(address) {
            return Err(bus::Error::Timeout { device_address });
        }
        for (offset, byte) in buffer.iter_mut().enumerate() {
            *byte = *file
                .values
                .get(&address.wrapping_add(offset as u16))
                .unwrap_or(&0);
        }
        Ok(buffer.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    ClockRate(u32),
    ClockOn,
    ClockOff,
    RegulatorsOn,
    RegulatorsOff,
    ResetHigh,
    ResetLow,
    Delay { microseconds: u32 },
}

#[derive(Debug, Default)]
struct BoardState {
    events: Vec<Event>,
    fail_clock: bool,
    fail_regulators: bool,
    fail_reset: bool,
}

/// Clock, regulators, reset line and delay sharing one event journal.
#[derive(Debug, Clone, Default)]
pub struct Board {
    state: std::sync::Arc<std::sync::Mutex<BoardState>>,
}

pub type Sequencer = power::Sequencer<Clock, Regulators, ResetPin, Delay>;

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequencer(&self) -> Sequencer {
        power::Sequencer::new(
            Clock {
                board: self.clone(),
            },
            Regulators {
                board: self.clone(),
            },
            ResetPin {
                board: self.clone(),
            },
            Delay {
                board: self.clone(),
            },
        )
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().expect(POISONED).events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().expect(POISONED).events.clear();
    }

    /// Enabling the clock fails until cleared.
    pub fn set_clock_error(&self, enable: bool) {
        self.state.lock().expect(POISONED).fail_clock = enable;
    }

    /// Enabling the regulators fails until cleared.
    pub fn set_regulators_error(&self, enable: bool) {
        self.state.lock().expect(POISONED).fail_regulators = enable;
    }

    /// Driving the reset line fails until cleared.
    pub fn set_reset_error(&self, enable: bool) {
        self.state.lock().expect(POISONED).fail_reset = enable;
    }

    fn record(&self, event: Event) {
        self.state.lock().expect(POISONED).events.push(event);
    }
}

#[derive(Debug, Clone)]
pub struct Clock {
    board: Board,
}

impl power::Clock for Clock {
    fn set_rate(&mut self, frequency: u32) -> Result<(), power::Error> {
        self.board.record(Event::ClockRate(frequency));
        Ok(())
    }

    fn enable(&mut self) -> Result<(), power::Error> {
        if self.board.state.lock().expect(POISONED).fail_clock {
            return Err(power::Error::Clock("simulated clock failure".to_owned()));
        }
        self.board.record(Event::ClockOn);
        Ok(())
    }

    fn disable(&mut self) {
        self.board.record(Event::ClockOff);
    }
}

#[derive(Debug, Clone)]
pub struct Regulators {
    board: Board,
}

impl power::Regulators for Regulators {
    fn enable_all(&mut self) -> Result<(), power::Error> {
        if self.board.state.lock().expect(POISONED).fail_regulators {
            return Err(power::Error::Regulators(
                "simulated regulator failure".to_owned(),
            ));
        }
        self.board.record(Event::RegulatorsOn);
        Ok(())
    }

    fn disable_all(&mut self) {
        self.board.record(Event::RegulatorsOff);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinError;

impl embedded_hal::digital::Error for PinError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

#[derive(Debug, Clone)]
pub struct ResetPin {
    board: Board,
}

impl embedded_hal::digital::ErrorType for ResetPin {
    type Error = PinError;
}

impl embedded_hal::digital::OutputPin for ResetPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.board.record(Event::ResetLow);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if self.board.state.lock().expect(POISONED).fail_reset {
            return Err(PinError);
        }
        self.board.record(Event::ResetHigh);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Delay {
    board: Board,
}

impl embedded_hal::delay::DelayNs for Delay {
    fn delay_ns(&mut self, nanoseconds: u32) {
        self.board.record(Event::Delay {
            microseconds: nanoseconds.div_ceil(1000),
        });
    }

    fn delay_us(&mut self, microseconds: u32) {
        self.board.record(Event::Delay { microseconds });
    }
}
