//! Low-level register and interface definitions for VEML7700
//!
//! Every register on the device is 16 bits wide and transferred little-endian:
//! a write is `[command, low, high]`, a read is the command code followed by a
//! repeated-start read of two bytes.

use embedded_hal::i2c::I2c;

#[cfg(feature = "async")]
use embedded_hal_async::i2c::I2c as AsyncI2c;

use crate::{Config, Gain, IntegrationTime, InterruptStatus, InvalidArgument, Persistence};

/// I2C address of the VEML7700
pub const I2C_ADDRESS: u8 = 0x10;

/// Register command codes
pub mod register {
    /// Gain, integration time, persistence, interrupt enable and shutdown
    pub const ALS_CONF: u8 = 0x00;
    /// High threshold window
    pub const ALS_WH: u8 = 0x01;
    /// Low threshold window
    pub const ALS_WL: u8 = 0x02;
    /// Ambient light output data
    pub const ALS: u8 = 0x04;
    /// White channel output data
    pub const WHITE: u8 = 0x05;
    /// Threshold interrupt flags
    pub const ALS_INT: u8 = 0x06;
}

// ALS_CONF field layout
const SD_BIT: u16 = 1 << 0;
const INT_EN_BIT: u16 = 1 << 1;
const PERS_SHIFT: u16 = 4;
const PERS_MASK: u16 = 0b11;
const IT_SHIFT: u16 = 6;
const IT_MASK: u16 = 0b1111;
const GAIN_SHIFT: u16 = 11;
const GAIN_MASK: u16 = 0b11;

// ALS_INT flags
const INT_TH_HIGH: u16 = 1 << 14;
const INT_TH_LOW: u16 = 1 << 15;

impl Gain {
    fn from_code(code: u16) -> Self {
        match code & GAIN_MASK {
            0b00 => Gain::One,
            0b01 => Gain::Two,
            0b10 => Gain::OneEighth,
            _ => Gain::OneQuarter,
        }
    }
}

impl IntegrationTime {
    fn from_code(code: u16) -> Result<Self, InvalidArgument> {
        match code & IT_MASK {
            0b1100 => Ok(IntegrationTime::Ms25),
            0b1000 => Ok(IntegrationTime::Ms50),
            0b0000 => Ok(IntegrationTime::Ms100),
            0b0001 => Ok(IntegrationTime::Ms200),
            0b0010 => Ok(IntegrationTime::Ms400),
            0b0011 => Ok(IntegrationTime::Ms800),
            _ => Err(InvalidArgument),
        }
    }
}

impl Persistence {
    fn from_code(code: u16) -> Self {
        match code & PERS_MASK {
            0b00 => Persistence::One,
            0b01 => Persistence::Two,
            0b10 => Persistence::Four,
            _ => Persistence::Eight,
        }
    }
}

impl Config {
    /// Pack the configuration into the `ALS_CONF` register value.
    ///
    /// Reserved bits are always zero.
    pub const fn bits(&self) -> u16 {
        let mut bits = ((self.gain as u16) & GAIN_MASK) << GAIN_SHIFT
            | ((self.integration_time as u16) & IT_MASK) << IT_SHIFT
            | ((self.persistence as u16) & PERS_MASK) << PERS_SHIFT;
        if self.interrupt_enabled {
            bits |= INT_EN_BIT;
        }
        if self.shutdown {
            bits |= SD_BIT;
        }
        bits
    }

    /// Unpack an `ALS_CONF` register value.
    ///
    /// Reserved bits are ignored. Fails if the integration time field holds
    /// one of the undefined codes.
    pub fn from_bits(bits: u16) -> Result<Self, InvalidArgument> {
        Ok(Config {
            gain: Gain::from_code(bits >> GAIN_SHIFT),
            integration_time: IntegrationTime::from_code(bits >> IT_SHIFT)?,
            persistence: Persistence::from_code(bits >> PERS_SHIFT),
            interrupt_enabled: bits & INT_EN_BIT != 0,
            shutdown: bits & SD_BIT != 0,
        })
    }
}

impl InterruptStatus {
    pub(crate) fn from_bits(bits: u16) -> Self {
        InterruptStatus {
            high_threshold_exceeded: bits & INT_TH_HIGH != 0,
            low_threshold_exceeded: bits & INT_TH_LOW != 0,
        }
    }
}

/// Device interface implementation
#[derive(Debug)]
pub struct DeviceInterface<I2c> {
    /// The I2C interface
    pub i2c: I2c,
}

impl<I2cTrait: I2c> DeviceInterface<I2cTrait> {
    /// Read a 16-bit register.
    pub fn read_register(&mut self, address: u8) -> Result<u16, I2cTrait::Error> {
        let mut data = [0u8; 2];
        self.i2c.write_read(I2C_ADDRESS, &[address], &mut data)?;
        let value = u16::from_le_bytes(data);
        trace!("read reg {} = {}", address, value);
        Ok(value)
    }

    /// Write a 16-bit register.
    pub fn write_register(&mut self, address: u8, value: u16) -> Result<(), I2cTrait::Error> {
        trace!("write reg {} = {}", address, value);
        let [low, high] = value.to_le_bytes();
        self.i2c.write(I2C_ADDRESS, &[address, low, high])
    }
}

#[cfg(feature = "async")]
impl<I2cTrait: AsyncI2c> DeviceInterface<I2cTrait> {
    /// Read a 16-bit register (async version)
    pub async fn read_register_async(&mut self, address: u8) -> Result<u16, I2cTrait::Error> {
        let mut data = [0u8; 2];
        self.i2c
            .write_read(I2C_ADDRESS, &[address], &mut data)
            .await?;
        let value = u16::from_le_bytes(data);
        trace!("read reg {} = {}", address, value);
        Ok(value)
    }

    /// Write a 16-bit register (async version)
    pub async fn write_register_async(
        &mut self,
        address: u8,
        value: u16,
    ) -> Result<(), I2cTrait::Error> {
        trace!("write reg {} = {}", address, value);
        let [low, high] = value.to_le_bytes();
        self.i2c.write(I2C_ADDRESS, &[address, low, high]).await
    }
}
