use crate::bus;

const ADDRESS_LENGTH: usize = 2;
const MAXIMUM_VALUE_LENGTH: usize = 4;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Bus(#[from] bus::Error),

    #[error("Unsupported length for register {address:#06X} (expected 1, 2 or 4 bytes, got {length})")]
    Length { address: u16, length: u8 },

    #[error("Short read from register {address:#06X} (expected {expected} bytes, read {count} bytes)")]
    ShortRead {
        address: u16,
        expected: usize,
        count: usize,
    },

    #[error("Short write to register {address:#06X} (expected {expected} bytes, wrote {count} bytes)")]
    ShortWrite {
        address: u16,
        expected: usize,
        count: usize,
    },
}

/// A register list stopped partway. Writes before `address` have reached the sensor.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Applying {list} stopped at register {address:#06X}")]
pub struct ApplyError {
    pub list: &'static str,
    pub address: u16,
    #[source]
    pub source: Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterOp {
    pub address: u16,
    pub length: u8,
    pub value: u32,
}

impl RegisterOp {
    pub const fn new(address: u16, length: u8, value: u32) -> Self {
        Self {
            address,
            length,
            value,
        }
    }
}

/// Named, ordered register writes. Order matters, later writes may depend on earlier ones.
#[derive(Debug)]
pub struct RegisterList {
    name: &'static str,
    operations: &'static [RegisterOp],
}

impl RegisterList {
    pub const fn new(name: &'static str, operations: &'static [RegisterOp]) -> Self {
        Self { name, operations }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn operations(&self) -> &'static [RegisterOp] {
        self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn then<'a>(&'a self, next: &'a RegisterList) -> Sequence<'a> {
        Sequence::from(self).then(next)
    }
}

/// Register lists composed back to back.
#[derive(Debug, Clone)]
pub struct Sequence<'a> {
    lists: Vec<&'a RegisterList>,
}

impl<'a> Sequence<'a> {
    pub fn then(mut self, next: &'a RegisterList) -> Self {
        self.lists.push(next);
        self
    }

    pub fn lists(&self) -> &[&'a RegisterList] {
        &self.lists
    }

    pub fn len(&self) -> usize {
        self.lists.iter().map(|list| list.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn operations(&self) -> impl Iterator<Item = (&'static str, &'static RegisterOp)> + '_ {
        self.lists.iter().flat_map(|list| {
            let name = list.name;
            list.operations.iter().map(move |operation| (name, operation))
        })
    }
}

impl<'a> From<&'a RegisterList> for Sequence<'a> {
    fn from(list: &'a RegisterList) -> Self {
        Self { lists: vec![list] }
    }
}

/// Addressed register access on top of a bus.
///
/// Register addresses are 16-bit big-endian. Values are 1, 2 or 4 bytes, big-endian,
/// right-aligned in a 32-bit word.
pub struct Transport<B> {
    bus: B,
    device_address: u8,
}

impl<B: bus::Bus> Transport<B> {
    pub fn new(bus: B, device_address: u8) -> Self {
        Self {
            bus,
            device_address,
        }
    }

    pub fn device_address(&self) -> u8 {
        self.device_address
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn read(&mut self, address: u16, length: u8) -> Result<u32, Error> {
        let length = checked_length(address, length)?;
        let mut buffer = [0; MAXIMUM_VALUE_LENGTH];
        let count = self.bus.write_read(
            self.device_address,
            &address.to_be_bytes(),
            &mut buffer[MAXIMUM_VALUE_LENGTH - length..],
        )?;
        if count != length {
            return Err(Error::ShortRead {
                address,
                expected: length,
                count,
            });
        }
        Ok(u32::from_be_bytes(buffer))
    }

    pub fn write(&mut self, address: u16, length: u8, value: u32) -> Result<(), Error> {
        let length = checked_length(address, length)?;
        let buffer = pack(address, length, value);
        let expected = ADDRESS_LENGTH + length;
        let count = self
            .bus
            .write(self.device_address, &buffer[..expected])?;
        if count != expected {
            return Err(Error::ShortWrite {
                address,
                expected,
                count,
            });
        }
        Ok(())
    }

    /// Writes every operation in order and stops at the first failure, without rollback.
    pub fn apply<'a>(&mut self, sequence: impl Into<Sequence<'a>>) -> Result<(), ApplyError> {
        let sequence = sequence.into();
        log::debug!(
            "applying {} register writes ({})",
            sequence.len(),
            sequence
                .lists()
                .iter()
                .map(|list| list.name())
                .collect::<Vec<_>>()
                .join(" + ")
        );
        for (list, operation) in sequence.operations() {
            if let Err(error) = self.write(operation.address, operation.length, operation.value) {
                log::error!(
                    "write to register {:#06X} in {list} failed: {error}",
                    operation.address
                );
                return Err(ApplyError {
                    list,
                    address: operation.address,
                    source: error,
                });
            }
        }
        Ok(())
    }
}

fn checked_length(address: u16, length: u8) -> Result<usize, Error> {
    match length {
        1 | 2 | 4 => Ok(length as usize),
        _ => Err(Error::Length { address, length }),
    }
}

fn pack(address: u16, length: usize, value: u32) -> [u8; ADDRESS_LENGTH + MAXIMUM_VALUE_LENGTH] {
    let mut buffer = [0; ADDRESS_LENGTH + MAXIMUM_VALUE_LENGTH];
    buffer[..ADDRESS_LENGTH].copy_from_slice(&address.to_be_bytes());
    let shifted = value << (8 * (MAXIMUM_VALUE_LENGTH - length));
    buffer[ADDRESS_LENGTH..].copy_from_slice(&shifted.to_be_bytes());
    buffer
}

/// A register definition, used for one-off accesses and to build register lists.
pub struct Register {
    address: u16,
    length: u8,
}

impl Register {
    pub const fn new(address: u16, length: u8) -> Self {
        Self { address, length }
    }

    pub const fn address(&self) -> u16 {
        self.address
    }

    pub const fn length(&self) -> u8 {
        self.length
    }

    pub const fn op(&self, value: u32) -> RegisterOp {
        RegisterOp::new(self.address, self.length, value)
    }

    pub fn get<B: bus::Bus>(&self, transport: &mut Transport<B>) -> Result<u32, Error> {
        transport.read(self.address, self.length)
    }

    pub fn set<B: bus::Bus>(&self, transport: &mut Transport<B>, value: u32) -> Result<(), Error> {
        transport.write(self.address, self.length, value)
    }
}
