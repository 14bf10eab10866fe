//! Sensirion VOC gas index
//!
//! Turns raw SGP40 ticks into an index from 1 to 500 where 100 is the
//! average of the last day's conditions. The estimator learns the baseline
//! online, so the index only becomes meaningful after the first hours of
//! operation; the first 45 seconds always report 0.

// General
const INITIAL_BLACKOUT: f32 = 45.0;
const INDEX_GAIN: f32 = 230.0;
const INDEX_OFFSET: f32 = 100.0;
const SRAW_MINIMUM: i32 = 20000;
const SRAW_STD_INITIAL: f32 = 50.0;
const SRAW_STD_BONUS: f32 = 220.0;

// Mean/variance estimator
const TAU_MEAN_HOURS: f32 = 12.0;
const TAU_VARIANCE_HOURS: f32 = 12.0;
const TAU_INITIAL_MEAN: f32 = 20.0;
const INIT_DURATION_MEAN: f32 = 3600.0 * 0.75;
const INIT_TRANSITION_MEAN: f32 = 0.01;
const TAU_INITIAL_VARIANCE: f32 = 2500.0;
const INIT_DURATION_VARIANCE: f32 = 3600.0 * 1.45;
const INIT_TRANSITION_VARIANCE: f32 = 0.01;
const GATING_THRESHOLD: f32 = 340.0;
const GATING_THRESHOLD_INITIAL: f32 = 510.0;
const GATING_THRESHOLD_TRANSITION: f32 = 0.09;
const GATING_MAX_DURATION_MINUTES: f32 = 60.0 * 3.0;
const GATING_MAX_RATIO: f32 = 0.3;
const GAMMA_SCALING: f32 = 64.0;
const ADDITIONAL_GAMMA_MEAN_SCALING: f32 = 8.0;
const FIX16_MAX: f32 = 32767.0;

// Scaled sigmoid
const SIGMOID_L: f32 = 500.0;
const SIGMOID_K: f32 = -0.0065;
const SIGMOID_X0: f32 = 213.0;

// Adaptive low-pass
const LP_TAU_FAST: f32 = 20.0;
const LP_TAU_SLOW: f32 = 500.0;
const LP_ALPHA: f32 = -0.2;

/// Logistic step used for gating and the start-up transitions
#[derive(Debug, Clone, Copy, Default)]
struct Sigmoid {
    x0: f32,
    k: f32,
}

impl Sigmoid {
    fn new(x0: f32, k: f32) -> Self {
        Self { x0, k }
    }

    fn process(&self, sample: f32) -> f32 {
        let x = self.k * (sample - self.x0);
        if x < -50.0 {
            1.0
        } else if x > 50.0 {
            0.0
        } else {
            1.0 / (1.0 + x.exp())
        }
    }
}

#[derive(Debug, Clone)]
struct MeanVarianceEstimator {
    sampling_interval: f32,
    initialized: bool,
    mean: f32,
    sraw_offset: f32,
    std: f32,
    gamma_mean: f32,
    gamma_variance: f32,
    gamma_initial_mean: f32,
    gamma_initial_variance: f32,
    current_gamma_mean: f32,
    current_gamma_variance: f32,
    uptime_gamma: f32,
    uptime_gating: f32,
    gating_duration_minutes: f32,
}

impl MeanVarianceEstimator {
    fn new(sampling_interval: f32) -> Self {
        let hours = sampling_interval / 3600.0;
        Self {
            sampling_interval,
            initialized: false,
            mean: 0.0,
            sraw_offset: 0.0,
            std: SRAW_STD_INITIAL,
            gamma_mean: ADDITIONAL_GAMMA_MEAN_SCALING * GAMMA_SCALING * hours
                / (TAU_MEAN_HOURS + hours),
            gamma_variance: GAMMA_SCALING * hours / (TAU_VARIANCE_HOURS + hours),
            gamma_initial_mean: ADDITIONAL_GAMMA_MEAN_SCALING * GAMMA_SCALING * sampling_interval
                / (TAU_INITIAL_MEAN + sampling_interval),
            gamma_initial_variance: GAMMA_SCALING * sampling_interval
                / (TAU_INITIAL_VARIANCE + sampling_interval),
            current_gamma_mean: 0.0,
            current_gamma_variance: 0.0,
            uptime_gamma: 0.0,
            uptime_gating: 0.0,
            gating_duration_minutes: 0.0,
        }
    }

    fn std(&self) -> f32 {
        self.std
    }

    fn mean(&self) -> f32 {
        self.mean + self.sraw_offset
    }

    /// Adaptation rates for this step. Adaptation is gated off while the
    /// index is high so an ongoing event is not learned as the baseline.
    fn calculate_gamma(&mut self, gas_index: f32) {
        let uptime_limit = FIX16_MAX - self.sampling_interval;
        if self.uptime_gamma < uptime_limit {
            self.uptime_gamma += self.sampling_interval;
        }
        if self.uptime_gating < uptime_limit {
            self.uptime_gating += self.sampling_interval;
        }

        let init_mean = Sigmoid::new(INIT_DURATION_MEAN, INIT_TRANSITION_MEAN);
        let sigmoid_gamma_mean = init_mean.process(self.uptime_gamma);
        let gamma_mean =
            self.gamma_mean + (self.gamma_initial_mean - self.gamma_mean) * sigmoid_gamma_mean;
        let gating_threshold_mean = GATING_THRESHOLD
            + (GATING_THRESHOLD_INITIAL - GATING_THRESHOLD)
                * init_mean.process(self.uptime_gating);
        let sigmoid_gating_mean =
            Sigmoid::new(gating_threshold_mean, GATING_THRESHOLD_TRANSITION).process(gas_index);
        self.current_gamma_mean = sigmoid_gating_mean * gamma_mean;

        let init_variance = Sigmoid::new(INIT_DURATION_VARIANCE, INIT_TRANSITION_VARIANCE);
        let sigmoid_gamma_variance = init_variance.process(self.uptime_gamma);
        let gamma_variance = self.gamma_variance
            + (self.gamma_initial_variance - self.gamma_variance)
                * (sigmoid_gamma_variance - sigmoid_gamma_mean);
        let gating_threshold_variance = GATING_THRESHOLD
            + (GATING_THRESHOLD_INITIAL - GATING_THRESHOLD)
                * init_variance.process(self.uptime_gating);
        let sigmoid_gating_variance =
            Sigmoid::new(gating_threshold_variance, GATING_THRESHOLD_TRANSITION)
                .process(gas_index);
        self.current_gamma_variance = sigmoid_gating_variance * gamma_variance;

        self.gating_duration_minutes += (self.sampling_interval / 60.0)
            * ((1.0 - sigmoid_gating_mean) * (1.0 + GATING_MAX_RATIO) - GATING_MAX_RATIO);
        if self.gating_duration_minutes < 0.0 {
            self.gating_duration_minutes = 0.0;
        }
        // gated for too long: assume the baseline moved and restart the gating ramp
        if self.gating_duration_minutes > GATING_MAX_DURATION_MINUTES {
            self.uptime_gating = 0.0;
        }
    }

    fn process(&mut self, sraw: f32, gas_index: f32) {
        if !self.initialized {
            self.initialized = true;
            self.sraw_offset = sraw;
            self.mean = 0.0;
            return;
        }

        if self.mean >= 100.0 || self.mean <= -100.0 {
            self.sraw_offset += self.mean;
            self.mean = 0.0;
        }

        let sraw = sraw - self.sraw_offset;
        self.calculate_gamma(gas_index);

        let delta_sgp = (sraw - self.mean) / GAMMA_SCALING;
        let c = if delta_sgp < 0.0 {
            self.std - delta_sgp
        } else {
            self.std + delta_sgp
        };
        let additional_scaling = if c > 1440.0 {
            (c / 1440.0) * (c / 1440.0)
        } else {
            1.0
        };

        self.std = (additional_scaling * (GAMMA_SCALING - self.current_gamma_variance)).sqrt()
            * (self.std * (self.std / (GAMMA_SCALING * additional_scaling))
                + (self.current_gamma_variance * delta_sgp / additional_scaling) * delta_sgp)
                .sqrt();
        self.mean += self.current_gamma_mean * delta_sgp / ADDITIONAL_GAMMA_MEAN_SCALING;
    }
}

#[derive(Debug, Clone, Copy)]
struct MoxModel {
    sraw_std: f32,
    sraw_mean: f32,
}

impl MoxModel {
    fn process(&self, sraw: f32) -> f32 {
        (sraw - self.sraw_mean) / (-(self.sraw_std + SRAW_STD_BONUS)) * INDEX_GAIN
    }
}

/// Maps the MOX model output onto 0..500 with 100 at the learned mean.
fn sigmoid_scaled(sample: f32) -> f32 {
    let x = SIGMOID_K * (sample - SIGMOID_X0);
    if x < -50.0 {
        SIGMOID_L
    } else if x > 50.0 {
        0.0
    } else if sample >= 0.0 {
        let shift = (SIGMOID_L - 5.0 * INDEX_OFFSET) / 4.0;
        (SIGMOID_L + shift) / (1.0 + x.exp()) - shift
    } else {
        SIGMOID_L / (1.0 + x.exp())
    }
}

/// Low-pass whose time constant shrinks while the signal is moving fast.
#[derive(Debug, Clone)]
struct AdaptiveLowpass {
    sampling_interval: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    x3: f32,
    initialized: bool,
}

impl AdaptiveLowpass {
    fn new(sampling_interval: f32) -> Self {
        Self {
            sampling_interval,
            a1: sampling_interval / (LP_TAU_FAST + sampling_interval),
            a2: sampling_interval / (LP_TAU_SLOW + sampling_interval),
            x1: 0.0,
            x2: 0.0,
            x3: 0.0,
            initialized: false,
        }
    }

    fn process(&mut self, sample: f32) -> f32 {
        if !self.initialized {
            self.x1 = sample;
            self.x2 = sample;
            self.x3 = sample;
            self.initialized = true;
        }

        self.x1 = (1.0 - self.a1) * self.x1 + self.a1 * sample;
        self.x2 = (1.0 - self.a2) * self.x2 + self.a2 * sample;

        let abs_delta = (self.x1 - self.x2).abs();
        let f1 = (LP_ALPHA * abs_delta).exp();
        let tau_a = (LP_TAU_SLOW - LP_TAU_FAST) * f1 + LP_TAU_FAST;
        let a3 = self.sampling_interval / (self.sampling_interval + tau_a);
        self.x3 = (1.0 - a3) * self.x3 + a3 * sample;
        self.x3
    }
}

/// Online VOC index state. Feed one raw sample per sampling interval.
#[derive(Debug, Clone)]
pub struct VocIndex {
    sampling_interval: f32,
    uptime: f32,
    sraw: f32,
    gas_index: f32,
    estimator: MeanVarianceEstimator,
    mox: MoxModel,
    lowpass: AdaptiveLowpass,
}

impl Default for VocIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl VocIndex {
    /// One second sampling interval
    pub fn new() -> Self {
        Self::with_sampling_interval(1.0)
    }

    pub fn with_sampling_interval(seconds: f32) -> Self {
        let estimator = MeanVarianceEstimator::new(seconds);
        let mox = MoxModel {
            sraw_std: estimator.std(),
            sraw_mean: estimator.mean(),
        };
        Self {
            sampling_interval: seconds,
            uptime: 0.0,
            sraw: 0.0,
            gas_index: 0.0,
            estimator,
            mox,
            lowpass: AdaptiveLowpass::new(seconds),
        }
    }

    pub fn process(&mut self, sraw: u16) -> u16 {
        if self.uptime <= INITIAL_BLACKOUT {
            self.uptime += self.sampling_interval;
        } else {
            let sraw = i32::from(sraw);
            if sraw > 0 && sraw < 65000 {
                let clamped = sraw.clamp(SRAW_MINIMUM + 1, SRAW_MINIMUM + 32767);
                self.sraw = (clamped - SRAW_MINIMUM) as f32;
            }

            self.gas_index = sigmoid_scaled(self.mox.process(self.sraw));
            self.gas_index = self.lowpass.process(self.gas_index).max(0.5);

            if self.sraw > 0.0 {
                self.estimator.process(self.sraw, self.gas_index);
                self.mox = MoxModel {
                    sraw_std: self.estimator.std(),
                    sraw_mean: self.estimator.mean(),
                };
            }
        }

        (self.gas_index + 0.5) as u16
    }
}
