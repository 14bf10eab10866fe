/// Pimoroni Enviro+: BME280, LTR559, MICS6814 and a small front panel
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info};

use crate::boards::{BoardKind, BoardSettings, SharedSnapshot};
use crate::display::Display;
use crate::error::{DriverError, UpdateError};
use crate::models::{EnviroPlusValues, Snapshot};
use crate::sensors::{mics6814, Bme280, Bme280Config, Ltr559, Ltr559Config, Mics6814};
use crate::smoothing::{
    compensate_temperature, CircularAverageBuffer, CpuTemperatureSource, CpuThermalCompensator,
};

/// One smoothing window per published field
#[derive(Debug, Clone)]
struct Windows {
    proximity: CircularAverageBuffer,
    lux: CircularAverageBuffer,
    temperature: CircularAverageBuffer,
    humidity: CircularAverageBuffer,
    pressure: CircularAverageBuffer,
    reducing: CircularAverageBuffer,
    oxidising: CircularAverageBuffer,
    nh3: CircularAverageBuffer,
}

impl Windows {
    fn new(len: usize) -> Self {
        Self {
            proximity: CircularAverageBuffer::new(len),
            lux: CircularAverageBuffer::new(len),
            temperature: CircularAverageBuffer::new(len),
            humidity: CircularAverageBuffer::new(len),
            pressure: CircularAverageBuffer::new(len),
            reducing: CircularAverageBuffer::new(len),
            oxidising: CircularAverageBuffer::new(len),
            nh3: CircularAverageBuffer::new(len),
        }
    }
}

pub struct EnviroPlus<I, D, C> {
    bme280: Bme280<I, D>,
    ltr559: Ltr559<I>,
    gas: Mics6814<I, D>,
    cpu: CpuThermalCompensator<C>,
    display: Option<Box<dyn Display>>,
    windows: Windows,
    smooth_factor: f64,
    snapshot: SharedSnapshot,
}

impl<I, D, C> EnviroPlus<I, D, C>
where
    I: I2c,
    D: DelayNs + Clone,
    C: CpuTemperatureSource,
{
    /// `bus` hands out one device per driver, all on the same physical bus.
    pub fn open(
        mut bus: impl FnMut() -> I,
        mut delay: D,
        cpu: C,
        settings: &BoardSettings,
        display: Option<Box<dyn Display>>,
    ) -> Result<Self, DriverError> {
        let bme280 = Bme280::new(bus(), delay.clone(), Bme280Config::default())?;
        let ltr559 = Ltr559::new(bus(), &mut delay, Ltr559Config::default())?;
        let gas = Mics6814::new(bus(), delay, mics6814::DEFAULT_ADDRESS)?;

        info!(
            "{} ready (window {}, smooth factor {}, display {})",
            BoardKind::EnviroPlus,
            settings.window_len,
            settings.smooth_factor,
            if display.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            bme280,
            ltr559,
            gas,
            cpu: CpuThermalCompensator::new(cpu, settings.window_len),
            display,
            windows: Windows::new(settings.window_len),
            smooth_factor: settings.smooth_factor,
            snapshot: SharedSnapshot::new(BoardKind::EnviroPlus.initial_snapshot()),
        })
    }

    pub fn snapshot(&self) -> SharedSnapshot {
        self.snapshot.clone()
    }

    pub fn update(&mut self) -> Result<(), UpdateError> {
        self.cpu.update()?;

        let thp = self.bme280.read_thp()?;
        let raw_proximity = f64::from(self.ltr559.read_proximity()?);
        let lux = self.ltr559.read_lux()?;
        let gas = self.gas.read_all()?;
        let avg_cpu = self.cpu.temperature()?;

        let mut staged = self.windows.clone();
        let values = EnviroPlusValues {
            proximity: staged.proximity.push_mean(raw_proximity),
            lux: staged.lux.push_mean(lux),
            temperature: compensate_temperature(
                staged.temperature.push_mean(thp.temperature),
                avg_cpu,
                self.smooth_factor,
            ),
            humidity: staged.humidity.push_mean(thp.humidity),
            pressure: staged.pressure.push_mean(thp.pressure),
            reducing: staged.reducing.push_mean(gas.reducing),
            oxidising: staged.oxidising.push_mean(gas.oxidising),
            nh3: staged.nh3.push_mean(gas.nh3),
        };
        self.windows = staged;

        self.snapshot.publish(Snapshot::EnviroPlus(values));
        debug!("{} published {:?}", BoardKind::EnviroPlus, values);

        if let Some(display) = self.display.as_mut() {
            display.show(&values, raw_proximity);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::boards::tests::{FixedCpu, FlakyCpu};
    use crate::bus::mock::{MockI2c, RecordingDelay};
    use crate::sensors::{bme280, ltr559};
    use std::sync::{Arc, Mutex};

    const LTR559: u8 = 0x23;
    const ALS_DATA: u8 = 0x88;
    const PS_DATA: u8 = 0x8D;

    #[derive(Clone, Default)]
    struct RecordingDisplay {
        shown: Arc<Mutex<Vec<(EnviroPlusValues, f64)>>>,
    }

    impl Display for RecordingDisplay {
        fn show(&mut self, values: &EnviroPlusValues, raw_proximity: f64) {
            self.shown.lock().unwrap().push((*values, raw_proximity));
        }
    }

    fn set_proximity(mock: &MockI2c, count: u16) {
        mock.set_registers(LTR559, PS_DATA, &count.to_le_bytes());
    }

    pub(crate) fn primed_bus() -> MockI2c {
        let mock = MockI2c::new();
        bme280::tests::load_calibration(&mock, bme280::DEFAULT_ADDRESS);
        bme280::tests::load_sample(&mock, bme280::DEFAULT_ADDRESS);
        ltr559::tests::prime(&mock);
        mock.set_registers(LTR559, ALS_DATA, &[0xC8, 0x00, 0xE8, 0x03]);
        set_proximity(&mock, 40);
        mics6814::tests::load_sample(&mock);
        mock
    }

    fn board(
        mock: &MockI2c,
        display: Option<Box<dyn Display>>,
    ) -> EnviroPlus<MockI2c, RecordingDelay, FixedCpu> {
        EnviroPlus::open(
            || mock.clone(),
            RecordingDelay::new(),
            FixedCpu(40.0),
            &BoardSettings::default(),
            display,
        )
        .unwrap()
    }

    #[test]
    fn publishes_smoothed_values() {
        let mock = primed_bus();
        let mut board = board(&mock, None);

        board.update().unwrap();

        let values = match board.snapshot().current() {
            Snapshot::EnviroPlus(values) => values,
            other => panic!("unexpected snapshot {:?}", other),
        };
        assert_eq!(values.proximity, 40.0);
        assert!((values.lux - 997.74).abs() < 1e-6);
        // 25.0825 - (40 - 25.0825) / 0.9
        assert!((values.temperature - 8.5075).abs() < 1e-3);
        assert!((values.humidity - 55.0007).abs() < 1e-3);
        assert!((values.pressure - 1006.5327).abs() < 1e-3);
        assert!((values.reducing - 560_000.0).abs() < 1e-6);
        assert!((values.oxidising - 560_000.0).abs() < 1e-6);
        assert!((values.nh3 - 560_000.0).abs() < 1e-6);
    }

    #[test]
    fn failed_read_keeps_previous_snapshot() {
        let mock = primed_bus();
        set_proximity(&mock, 0);
        let mut board = board(&mock, None);
        board.update().unwrap();
        let before = board.snapshot().to_json().unwrap();

        set_proximity(&mock, 300);
        mock.fail_address(mics6814::DEFAULT_ADDRESS);
        match board.update() {
            Err(UpdateError::Driver(e)) => assert_eq!(e.sensor(), "MICS6814"),
            other => panic!("expected driver error, got {:?}", other),
        }
        assert_eq!(board.snapshot().to_json().unwrap(), before);

        // the failed pass left no samples behind
        mock.heal_address(mics6814::DEFAULT_ADDRESS);
        set_proximity(&mock, 0);
        board.update().unwrap();
        match board.snapshot().current() {
            Snapshot::EnviroPlus(values) => assert_eq!(values.proximity, 0.0),
            other => panic!("unexpected snapshot {:?}", other),
        }
    }

    #[test]
    fn failed_cpu_read_keeps_previous_snapshot() {
        let mock = primed_bus();
        let cpu = FlakyCpu::new(40.0);
        let mut board = EnviroPlus::open(
            || mock.clone(),
            RecordingDelay::new(),
            cpu.clone(),
            &BoardSettings::default(),
            None,
        )
        .unwrap();
        set_proximity(&mock, 0);
        board.update().unwrap();
        let before = board.snapshot().to_json().unwrap();

        set_proximity(&mock, 300);
        cpu.set_failing(true);
        assert!(matches!(board.update(), Err(UpdateError::Host(_))));
        assert_eq!(board.snapshot().to_json().unwrap(), before);

        cpu.set_failing(false);
        set_proximity(&mock, 0);
        board.update().unwrap();
        match board.snapshot().current() {
            Snapshot::EnviroPlus(values) => assert_eq!(values.proximity, 0.0),
            other => panic!("unexpected snapshot {:?}", other),
        }
    }

    #[test]
    fn window_averages_recent_samples() {
        let mock = primed_bus();
        let mut board = board(&mock, None);

        for count in [10u16, 20, 30] {
            set_proximity(&mock, count);
            board.update().unwrap();
        }

        match board.snapshot().current() {
            Snapshot::EnviroPlus(values) => assert_eq!(values.proximity, 20.0),
            other => panic!("unexpected snapshot {:?}", other),
        }
    }

    #[test]
    fn display_gets_raw_proximity() {
        let mock = primed_bus();
        let display = RecordingDisplay::default();
        let mut board = board(&mock, Some(Box::new(display.clone())));

        set_proximity(&mock, 0);
        board.update().unwrap();
        set_proximity(&mock, 200);
        board.update().unwrap();

        let shown = display.shown.lock().unwrap();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[1].1, 200.0);
        assert_eq!(shown[1].0.proximity, 100.0);
    }
}
