//! Liteon LTR-559 ambient light and proximity sensor
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::info;

use crate::bus::RegisterDevice;
use crate::error::DriverError;
use crate::sensors::check_part_id;

const SENSOR: &str = "LTR559";

pub const DEFAULT_ADDRESS: u8 = 0x23;
const PART_ID: u8 = 0x92;

const REG_ALS_CONTROL: u8 = 0x80;
const REG_PS_CONTROL: u8 = 0x81;
const REG_PS_LED: u8 = 0x82;
const REG_PS_N_PULSES: u8 = 0x83;
const REG_PS_MEAS_RATE: u8 = 0x84;
const REG_ALS_MEAS_RATE: u8 = 0x85;
const REG_PART_ID: u8 = 0x86;
const REG_ALS_DATA: u8 = 0x88;
const REG_PS_DATA: u8 = 0x8D;

const ALS_ACTIVE: u8 = 0x01;
const ALS_SW_RESET: u8 = 0x02;
const PS_ACTIVE: u8 = 0x03;
/// 30 kHz pulses, 100 % duty, 50 mA
const PS_LED_SETTINGS: u8 = 0x1B;
const PS_PULSES: u8 = 0x01;
/// 100 ms
const PS_RATE: u8 = 0x02;
const PS_DATA_MASK: u16 = 0x07FF;

// Lux coefficients per channel-ratio band
const CH0_COEFF: [i64; 4] = [17743, 42785, 5926, 0];
const CH1_COEFF: [i64; 4] = [-11059, 19548, -1185, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlsGain {
    X1,
    X2,
    X4,
    X8,
    X48,
    X96,
}

impl AlsGain {
    fn bits(self) -> u8 {
        match self {
            AlsGain::X1 => 0b000,
            AlsGain::X2 => 0b001,
            AlsGain::X4 => 0b010,
            AlsGain::X8 => 0b011,
            AlsGain::X48 => 0b110,
            AlsGain::X96 => 0b111,
        }
    }

    pub fn factor(self) -> f64 {
        match self {
            AlsGain::X1 => 1.0,
            AlsGain::X2 => 2.0,
            AlsGain::X4 => 4.0,
            AlsGain::X8 => 8.0,
            AlsGain::X48 => 48.0,
            AlsGain::X96 => 96.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlsIntegration {
    Ms50,
    Ms100,
    Ms150,
    Ms200,
    Ms250,
    Ms300,
    Ms350,
    Ms400,
}

impl AlsIntegration {
    fn bits(self) -> u8 {
        match self {
            AlsIntegration::Ms100 => 0b000,
            AlsIntegration::Ms50 => 0b001,
            AlsIntegration::Ms200 => 0b010,
            AlsIntegration::Ms400 => 0b011,
            AlsIntegration::Ms150 => 0b100,
            AlsIntegration::Ms250 => 0b101,
            AlsIntegration::Ms300 => 0b110,
            AlsIntegration::Ms350 => 0b111,
        }
    }

    pub fn millis(self) -> f64 {
        match self {
            AlsIntegration::Ms50 => 50.0,
            AlsIntegration::Ms100 => 100.0,
            AlsIntegration::Ms150 => 150.0,
            AlsIntegration::Ms200 => 200.0,
            AlsIntegration::Ms250 => 250.0,
            AlsIntegration::Ms300 => 300.0,
            AlsIntegration::Ms350 => 350.0,
            AlsIntegration::Ms400 => 400.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ltr559Config {
    pub address: u8,
    pub gain: AlsGain,
    pub integration: AlsIntegration,
}

impl Default for Ltr559Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            gain: AlsGain::X4,
            integration: AlsIntegration::Ms50,
        }
    }
}

pub struct Ltr559<I> {
    device: RegisterDevice<I>,
    config: Ltr559Config,
}

impl<I: I2c> Ltr559<I> {
    pub fn new<D: DelayNs>(
        i2c: I,
        delay: &mut D,
        config: Ltr559Config,
    ) -> Result<Self, DriverError> {
        let mut device = RegisterDevice::new(i2c, config.address);

        let id = device
            .read_byte(REG_PART_ID)
            .map_err(DriverError::bus(SENSOR))?;
        check_part_id(SENSOR, PART_ID, id);

        device
            .write_byte(REG_ALS_CONTROL, ALS_SW_RESET)
            .map_err(DriverError::bus(SENSOR))?;
        delay.delay_ms(10);

        let als_control = (config.gain.bits() << 2) | ALS_ACTIVE;
        // integration in bits 5:3, repeat rate 50 ms in bits 2:0
        let als_rate = config.integration.bits() << 3;
        let writes = [
            (REG_ALS_CONTROL, als_control),
            (REG_PS_CONTROL, PS_ACTIVE),
            (REG_PS_LED, PS_LED_SETTINGS),
            (REG_PS_N_PULSES, PS_PULSES),
            (REG_PS_MEAS_RATE, PS_RATE),
            (REG_ALS_MEAS_RATE, als_rate),
        ];
        for (register, value) in writes {
            device
                .write_byte(register, value)
                .map_err(DriverError::bus(SENSOR))?;
        }

        info!("{} ready: ALS control 0x{:02X}, rate 0x{:02X}", SENSOR, als_control, als_rate);

        Ok(Self { device, config })
    }

    /// Raw (ch0, ch1). Visible+IR and IR-only.
    pub fn read_channels(&mut self) -> Result<(u16, u16), DriverError> {
        let mut raw = [0u8; 4];
        self.device
            .read_block(REG_ALS_DATA, &mut raw)
            .map_err(DriverError::bus(SENSOR))?;
        let ch1 = u16::from_le_bytes([raw[0], raw[1]]);
        let ch0 = u16::from_le_bytes([raw[2], raw[3]]);
        Ok((ch0, ch1))
    }

    pub fn read_lux(&mut self) -> Result<f64, DriverError> {
        let (ch0, ch1) = self.read_channels()?;
        Ok(lux(ch0, ch1, self.config.gain, self.config.integration))
    }

    /// 11 bit proximity count; larger is closer.
    pub fn read_proximity(&mut self) -> Result<u16, DriverError> {
        let mut raw = [0u8; 2];
        self.device
            .read_block(REG_PS_DATA, &mut raw)
            .map_err(DriverError::bus(SENSOR))?;
        Ok(u16::from_le_bytes(raw) & PS_DATA_MASK)
    }
}

pub fn lux(ch0: u16, ch1: u16, gain: AlsGain, integration: AlsIntegration) -> f64 {
    let (ch0, ch1) = (i64::from(ch0), i64::from(ch1));
    let ratio = if ch0 + ch1 > 0 {
        (ch1 * 100) as f64 / (ch0 + ch1) as f64
    } else {
        101.0
    };

    let band = if ratio < 45.0 {
        0
    } else if ratio < 64.0 {
        1
    } else if ratio < 85.0 {
        2
    } else {
        3
    };

    let counts = (ch0 * CH0_COEFF[band] - ch1 * CH1_COEFF[band]) as f64;
    counts / (integration.millis() / 100.0) / gain.factor() / 10000.0
}
