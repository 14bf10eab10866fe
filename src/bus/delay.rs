/// Blocking delays for settle and conversion waits
use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;

/// Sleeps the calling thread. Sampling runs on a blocking worker thread, so
/// this never stalls the async runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl DelayNs for ThreadDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
