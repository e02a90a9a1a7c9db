use embedded_hal::i2c::Error as _;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("I2C transfer to {device_address:#04X} failed ({kind})")]
    I2c {
        device_address: u8,
        kind: embedded_hal::i2c::ErrorKind,
    },

    #[error("bus transfer to {device_address:#04X} timed out")]
    Timeout { device_address: u8 },

    #[error("bus error: {0}")]
    Other(String),
}

/// Addressed byte transfers, provided by the host.
///
/// Both methods report how many bytes actually crossed the bus so that callers can detect
/// transfers that completed only partially. Timeouts and retries belong to the implementation.
pub trait Bus {
    /// Single write phase, returns the number of bytes sent.
    fn write(&mut self, device_address: u8, bytes: &[u8]) -> Result<usize, Error>;

    /// Write phase followed by a read phase without releasing the bus,
    /// returns the number of bytes read.
    fn write_read(
        &mut self,
        device_address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<usize, Error>;
}

impl<T: Bus + ?Sized> Bus for &mut T {
    fn write(&mut self, device_address: u8, bytes: &[u8]) -> Result<usize, Error> {
        (**self).write(device_address, bytes)
    }

    fn write_read(
        &mut self,
        device_address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<usize, Error> {
        (**self).write_read(device_address, bytes, buffer)
    }
}

/// Bus over any embedded-hal I2C controller.
pub struct I2c<T> {
    i2c: T,
}

impl<T: embedded_hal::i2c::I2c> I2c<T> {
    pub fn new(i2c: T) -> Self {
        Self { i2c }
    }

    pub fn into_inner(self) -> T {
        self.i2c
    }
}

impl<T: embedded_hal::i2c::I2c> Bus for I2c<T> {
    fn write(&mut self, device_address: u8, bytes: &[u8]) -> Result<usize, Error> {
        self.i2c
            .write(device_address, bytes)
            .map_err(|error| Error::I2c {
                device_address,
                kind: error.kind(),
            })?;
        Ok(bytes.len())
    }

    fn write_read(
        &mut self,
        device_address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<usize, Error> {
        self.i2c
            .write_read(device_address, bytes, buffer)
            .map_err(|error| Error::I2c {
                device_address,
                kind: error.kind(),
            })?;
        Ok(buffer.len())
    }
}
