//! SGX MICS-6814 analog gas sensor, sampled through a TI ADS1015 ADC
//!
//! Each sensing element sits in a divider with a 56 kΩ load on a 3.3 V
//! rail. The ADC measures the divider midpoint and the driver reports the
//! element resistance in ohms.
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::info;

use crate::bus::RegisterDevice;
use crate::error::DriverError;

const SENSOR: &str = "MICS6814";

pub const DEFAULT_ADDRESS: u8 = 0x49;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

const CONFIG_OS: u16 = 0x8000;
/// ±6.144 V full scale
const CONFIG_PGA_6144: u16 = 0b000 << 9;
const CONFIG_MODE_SINGLE: u16 = 1 << 8;
const CONFIG_DR_1600: u16 = 0b100 << 5;
const CONFIG_COMP_DISABLE: u16 = 0b11;

const FULL_SCALE_VOLTS: f64 = 6.144;
const SUPPLY_VOLTS: f64 = 3.3;
const LOAD_OHMS: f64 = 56_000.0;

/// One sample period at 1600 SPS, rounded up
const CONVERSION_US: u32 = 700;
const READY_POLLS: u32 = 10;
const DISCARDED_PASSES: usize = 10;

/// ADC input wired to each sensing element (single-ended against ground)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Oxidising,
    Reducing,
    Nh3,
}

impl Channel {
    fn mux(self) -> u16 {
        let mux = match self {
            Channel::Oxidising => 0b100,
            Channel::Reducing => 0b101,
            Channel::Nh3 => 0b110,
        };
        mux << 12
    }
}

/// Sensing resistances in ohms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasReading {
    pub oxidising: f64,
    pub reducing: f64,
    pub nh3: f64,
}

pub struct Mics6814<I, D> {
    adc: RegisterDevice<I>,
    delay: D,
}

impl<I: I2c, D: DelayNs> Mics6814<I, D> {
    /// The ADS1015 has no identity register. The first conversions after
    /// power-up drift, so a few full passes are taken and thrown away.
    pub fn new(i2c: I, delay: D, address: u8) -> Result<Self, DriverError> {
        let mut sensor = Self {
            adc: RegisterDevice::new(i2c, address),
            delay,
        };

        for _ in 0..DISCARDED_PASSES {
            sensor.read_all()?;
        }

        info!("{} ready on ADS1015 0x{:02X}", SENSOR, address);
        Ok(sensor)
    }

    /// Single-shot conversion of one channel, in volts.
    pub fn read_voltage(&mut self, channel: Channel) -> Result<f64, DriverError> {
        let config = CONFIG_OS
            | channel.mux()
            | CONFIG_PGA_6144
            | CONFIG_MODE_SINGLE
            | CONFIG_DR_1600
            | CONFIG_COMP_DISABLE;
        self.adc
            .write_block(REG_CONFIG, &config.to_be_bytes())
            .map_err(DriverError::bus(SENSOR))?;
        self.delay.delay_us(CONVERSION_US);

        // OS reads back as 1 once the conversion is done
        for _ in 0..READY_POLLS {
            let mut status = [0u8; 2];
            self.adc
                .read_block(REG_CONFIG, &mut status)
                .map_err(DriverError::bus(SENSOR))?;
            if u16::from_be_bytes(status) & CONFIG_OS != 0 {
                break;
            }
            self.delay.delay_us(100);
        }

        let mut raw = [0u8; 2];
        self.adc
            .read_block(REG_CONVERSION, &mut raw)
            .map_err(DriverError::bus(SENSOR))?;
        Ok(conversion_to_volts(raw))
    }

    pub fn read_all(&mut self) -> Result<GasReading, DriverError> {
        let oxidising = resistance(self.read_voltage(Channel::Oxidising)?);
        let reducing = resistance(self.read_voltage(Channel::Reducing)?);
        let nh3 = resistance(self.read_voltage(Channel::Nh3)?);
        Ok(GasReading {
            oxidising,
            reducing,
            nh3,
        })
    }
}

/// 12 bit left-aligned two's complement result
pub fn conversion_to_volts(raw: [u8; 2]) -> f64 {
    let value = i16::from_be_bytes(raw) >> 4;
    f64::from(value) * FULL_SCALE_VOLTS / 2048.0
}

/// Element resistance from the divider voltage; 0 at the supply rail.
pub fn resistance(volts: f64) -> f64 {
    let headroom = SUPPLY_VOLTS - volts;
    if headroom == 0.0 {
        return 0.0;
    }
    volts * LOAD_OHMS / headroom
}
