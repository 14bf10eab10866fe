/// Register-level access to one device on an I2C bus
use embedded_hal::i2c::{Error as _, I2c};

use crate::error::{BusError, BusTarget};

/// A device address bound to a bus handle.
///
/// Register reads use a write-then-read transfer (repeated start), so a
/// multi-byte read returns a consistent burst from auto-incrementing devices.
#[derive(Debug)]
pub struct RegisterDevice<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> RegisterDevice<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn read_byte(&mut self, register: u8) -> Result<u8, BusError> {
        let mut value = [0u8; 1];
        self.read_block(register, &mut value)?;
        Ok(value[0])
    }

    pub fn write_byte(&mut self, register: u8, value: u8) -> Result<(), BusError> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|e| self.error(BusTarget::Register(register), e))
    }

    /// Burst read starting at `register`.
    pub fn read_block(&mut self, register: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.i2c
            .write_read(self.address, &[register], buf)
            .map_err(|e| self.error(BusTarget::Register(register), e))
    }

    /// Burst write starting at `register`.
    pub fn write_block(&mut self, register: u8, bytes: &[u8]) -> Result<(), BusError> {
        let mut frame = Vec::with_capacity(bytes.len() + 1);
        frame.push(register);
        frame.extend_from_slice(bytes);
        self.i2c
            .write(self.address, &frame)
            .map_err(|e| self.error(BusTarget::Register(register), e))
    }

    /// Plain write for command-style devices with no register map.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        self.i2c
            .write(self.address, bytes)
            .map_err(|e| self.error(BusTarget::Raw, e))
    }

    /// Plain read for command-style devices with no register map.
    pub fn read_raw(&mut self, buf: &mut [u8]) -> Result<(), BusError> {
        self.i2c
            .read(self.address, buf)
            .map_err(|e| self.error(BusTarget::Raw, e))
    }

    fn error(&self, target: BusTarget, e: I::Error) -> BusError {
        BusError {
            address: self.address,
            target,
            kind: e.kind(),
        }
    }
}
