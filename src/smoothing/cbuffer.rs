/// Fixed-length sample window producing a rolling arithmetic mean
use std::collections::VecDeque;

use crate::error::EmptyBufferError;

/// Holds up to `capacity` of the most recent samples, oldest evicted first.
///
/// The mean is recomputed over the held samples on every call. Windows are
/// short (tens of samples), so exact summation costs nothing and never drifts.
#[derive(Debug, Clone)]
pub struct CircularAverageBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl CircularAverageBuffer {
    /// Create an empty window.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "sample window length must be at least 1");
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest once the window is full.
    pub fn push(&mut self, value: f64) {
        self.samples.push_back(value);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Arithmetic mean of the samples currently held.
    pub fn mean(&self) -> Result<f64, EmptyBufferError> {
        if self.samples.is_empty() {
            return Err(EmptyBufferError);
        }
        let sum: f64 = self.samples.iter().sum();
        Ok(sum / self.samples.len() as f64)
    }

    /// Push then return the new mean.
    pub fn push_mean(&mut self, value: f64) -> f64 {
        self.push(value);
        let sum: f64 = self.samples.iter().sum();
        sum / self.samples.len() as f64
    }
}
