/// Waveshare Environment Sensor HAT: BME280, TSL2591, LTR390 and SGP40
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info};

use crate::boards::{BoardKind, BoardSettings, SharedSnapshot};
use crate::error::{DriverError, UpdateError};
use crate::models::{Snapshot, WaveshareEshValues};
use crate::sensors::{
    sgp40, Bme280, Bme280Config, Ltr390, Ltr390Config, Sgp40, Tsl2591, Tsl2591Config,
};
use crate::smoothing::{
    compensate_temperature, CircularAverageBuffer, CpuTemperatureSource, CpuThermalCompensator,
};

#[derive(Debug, Clone)]
struct Windows {
    temperature: CircularAverageBuffer,
    humidity: CircularAverageBuffer,
    pressure: CircularAverageBuffer,
    fullspectrum: CircularAverageBuffer,
    infrared: CircularAverageBuffer,
    lux1: CircularAverageBuffer,
    als: CircularAverageBuffer,
    lux2: CircularAverageBuffer,
    uvs: CircularAverageBuffer,
    uvi: CircularAverageBuffer,
    voci: CircularAverageBuffer,
}

impl Windows {
    fn new(len: usize) -> Self {
        Self {
            temperature: CircularAverageBuffer::new(len),
            humidity: CircularAverageBuffer::new(len),
            pressure: CircularAverageBuffer::new(len),
            fullspectrum: CircularAverageBuffer::new(len),
            infrared: CircularAverageBuffer::new(len),
            lux1: CircularAverageBuffer::new(len),
            als: CircularAverageBuffer::new(len),
            lux2: CircularAverageBuffer::new(len),
            uvs: CircularAverageBuffer::new(len),
            uvi: CircularAverageBuffer::new(len),
            voci: CircularAverageBuffer::new(len),
        }
    }
}

pub struct WaveshareEsh<I, D, C> {
    bme280: Bme280<I, D>,
    tsl2591: Tsl2591<I, D>,
    ltr390: Ltr390<I, D>,
    sgp40: Sgp40<I, D>,
    cpu: CpuThermalCompensator<C>,
    windows: Windows,
    smooth_factor: f64,
    snapshot: SharedSnapshot,
}

impl<I, D, C> WaveshareEsh<I, D, C>
where
    I: I2c,
    D: DelayNs + Clone,
    C: CpuTemperatureSource,
{
    /// Includes the SGP40 warm-up, roughly one second per warm-up sample.
    pub fn open(
        mut bus: impl FnMut() -> I,
        delay: D,
        cpu: C,
        settings: &BoardSettings,
    ) -> Result<Self, DriverError> {
        let bme280 = Bme280::new(bus(), delay.clone(), Bme280Config::default())?;
        let tsl2591 = Tsl2591::new(bus(), delay.clone(), Tsl2591Config::default())?;
        let ltr390 = Ltr390::new(bus(), delay.clone(), Ltr390Config::default())?;
        let mut sgp40 = Sgp40::new(bus(), delay, sgp40::DEFAULT_ADDRESS)?;
        sgp40.warm_up(settings.voc_warm_up_samples)?;

        info!(
            "{} ready (window {}, smooth factor {})",
            BoardKind::WaveshareEsh,
            settings.window_len,
            settings.smooth_factor
        );

        Ok(Self {
            bme280,
            tsl2591,
            ltr390,
            sgp40,
            cpu: CpuThermalCompensator::new(cpu, settings.window_len),
            windows: Windows::new(settings.window_len),
            smooth_factor: settings.smooth_factor,
            snapshot: SharedSnapshot::new(BoardKind::WaveshareEsh.initial_snapshot()),
        })
    }

    pub fn snapshot(&self) -> SharedSnapshot {
        self.snapshot.clone()
    }

    pub fn update(&mut self) -> Result<(), UpdateError> {
        self.cpu.update()?;

        let thp = self.bme280.read_thp()?;
        let light = self.tsl2591.read_luminosity()?;
        let uv = self.ltr390.read_all()?;
        let avg_cpu = self.cpu.temperature()?;

        let mut staged = self.windows.clone();
        let temperature = compensate_temperature(
            staged.temperature.push_mean(thp.temperature),
            avg_cpu,
            self.smooth_factor,
        );
        let humidity = staged.humidity.push_mean(thp.humidity);

        // VOC compensation uses this pass's smoothed values
        self.sgp40.set_compensation(humidity, temperature);
        let voc = self.sgp40.read_voc_index()?;

        let values = WaveshareEshValues {
            temperature,
            humidity,
            pressure: staged.pressure.push_mean(thp.pressure),
            fullspectrum: staged.fullspectrum.push_mean(light.full_spectrum),
            infrared: staged.infrared.push_mean(light.infrared),
            lux1: staged.lux1.push_mean(light.lux),
            als: staged.als.push_mean(uv.als),
            lux2: staged.lux2.push_mean(uv.lux),
            uvs: staged.uvs.push_mean(uv.uvs),
            uvi: staged.uvi.push_mean(uv.uvi),
            voci: staged.voci.push_mean(f64::from(voc)),
        };
        self.windows = staged;

        self.snapshot.publish(Snapshot::WaveshareEsh(values));
        debug!("{} published {:?}", BoardKind::WaveshareEsh, values);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boards::tests::{FixedCpu, FlakyCpu};
    use crate::bus::mock::{MockI2c, RecordingDelay};
    use crate::sensors::{bme280, ltr390, tsl2591};

    fn primed_bus() -> MockI2c {
        let mock = MockI2c::new();
        bme280::tests::load_calibration(&mock, bme280::DEFAULT_ADDRESS);
        bme280::tests::load_sample(&mock, bme280::DEFAULT_ADDRESS);
        tsl2591::tests::prime(&mock);
        tsl2591::tests::load_channels(&mock, 1000, 200);
        ltr390::tests::prime(&mock);
        ltr390::tests::load_sample(&mock, 1000, 4600);
        sgp40::tests::prime(&mock, 30000);
        mock
    }

    fn board(mock: &MockI2c) -> WaveshareEsh<MockI2c, RecordingDelay, FixedCpu> {
        WaveshareEsh::open(
            || mock.clone(),
            RecordingDelay::new(),
            FixedCpu(25.0825),
            &BoardSettings::default(),
        )
        .unwrap()
    }

    fn values(board: &WaveshareEsh<MockI2c, RecordingDelay, FixedCpu>) -> WaveshareEshValues {
        match board.snapshot().current() {
            Snapshot::WaveshareEsh(values) => values,
            other => panic!("unexpected snapshot {:?}", other),
        }
    }

    #[test]
    fn publishes_every_field() {
        let mock = primed_bus();
        let mut board = board(&mock);

        board.update().unwrap();

        let v = values(&board);
        // CPU at the sensor temperature leaves it (almost) unchanged
        assert!((v.temperature - 25.0825).abs() < 1e-3);
        assert!((v.humidity - 55.0007).abs() < 1e-3);
        assert!((v.pressure - 1006.5327).abs() < 1e-3);
        assert_eq!(v.fullspectrum, 1000.0);
        assert_eq!(v.infrared, 200.0);
        assert!((v.lux1 - 2741.76).abs() < 1e-6);
        assert_eq!(v.als, 1000.0);
        assert!((v.lux2 - 33.333).abs() < 1e-3);
        assert_eq!(v.uvs, 4600.0);
        assert!((v.uvi - 2.0).abs() < 1e-9);
        // warm-up plus one pass is still inside the VOC blackout
        assert_eq!(v.voci, 0.0);
    }

    #[test]
    fn voc_read_carries_smoothed_compensation() {
        let mock = primed_bus();
        let mut board = board(&mock);

        board.update().unwrap();

        let v = values(&board);
        let last = mock.writes_to(sgp40::DEFAULT_ADDRESS).pop().unwrap();
        let mut expected = vec![0x26, 0x0F];
        expected.extend_from_slice(&sgp40::compensation_words(v.humidity, v.temperature));
        assert_eq!(last, expected);
    }

    #[test]
    fn failed_cpu_read_discards_staged_samples() {
        let mock = primed_bus();
        let cpu = FlakyCpu::new(25.0825);
        let mut board = WaveshareEsh::open(
            || mock.clone(),
            RecordingDelay::new(),
            cpu.clone(),
            &BoardSettings::default(),
        )
        .unwrap();
        board.update().unwrap();
        let before = board.snapshot().to_json().unwrap();

        tsl2591::tests::load_channels(&mock, 3000, 200);
        cpu.set_failing(true);
        assert!(matches!(board.update(), Err(UpdateError::Host(_))));
        assert_eq!(board.snapshot().to_json().unwrap(), before);

        cpu.set_failing(false);
        tsl2591::tests::load_channels(&mock, 1000, 200);
        board.update().unwrap();
        match board.snapshot().current() {
            Snapshot::WaveshareEsh(values) => assert_eq!(values.fullspectrum, 1000.0),
            other => panic!("unexpected snapshot {:?}", other),
        }
    }

    #[test]
    fn failed_voc_read_discards_staged_samples() {
        let mock = primed_bus();
        let mut board = board(&mock);
        board.update().unwrap();
        let before = board.snapshot().to_json().unwrap();

        tsl2591::tests::load_channels(&mock, 3000, 200);
        mock.fail_address(sgp40::DEFAULT_ADDRESS);
        match board.update() {
            Err(UpdateError::Driver(e)) => assert_eq!(e.sensor(), "SGP40"),
            other => panic!("expected driver error, got {:?}", other),
        }
        assert_eq!(board.snapshot().to_json().unwrap(), before);

        mock.heal_address(sgp40::DEFAULT_ADDRESS);
        tsl2591::tests::load_channels(&mock, 1000, 200);
        board.update().unwrap();
        assert_eq!(values(&board).fullspectrum, 1000.0);
    }
}
