//! In-memory I2C bus and delay for driver and board tests
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

#[derive(Default)]
struct MockState {
    registers: HashMap<(u8, u8), u8>,
    scripted: HashMap<(u8, u8), VecDeque<Vec<u8>>>,
    pointers: HashMap<u8, u8>,
    writes: Vec<(u8, Vec<u8>)>,
    failing: HashSet<u8>,
}

/// Register-map bus. The first byte of each write selects the register
/// pointer and the remaining bytes are stored from there on.
///
/// Reads return scripted responses for `(address, pointer)` when present
/// (the last scripted response repeats), otherwise bytes from the register map.
#[derive(Clone, Default)]
pub struct MockI2c {
    state: Arc<Mutex<MockState>>,
}

impl MockI2c {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn set_register(&self, address: u8, register: u8, value: u8) {
        self.state().registers.insert((address, register), value);
    }

    pub fn set_registers(&self, address: u8, start: u8, values: &[u8]) {
        let mut state = self.state();
        for (offset, value) in values.iter().enumerate() {
            state
                .registers
                .insert((address, start.wrapping_add(offset as u8)), *value);
        }
    }

    pub fn register(&self, address: u8, register: u8) -> u8 {
        self.state()
            .registers
            .get(&(address, register))
            .copied()
            .unwrap_or(0)
    }

    pub fn script(&self, address: u8, pointer: u8, responses: &[&[u8]]) {
        let mut state = self.state();
        let queue = state.scripted.entry((address, pointer)).or_default();
        queue.clear();
        queue.extend(responses.iter().map(|r| r.to_vec()));
    }

    pub fn fail_address(&self, address: u8) {
        self.state().failing.insert(address);
    }

    pub fn heal_address(&self, address: u8) {
        self.state().failing.remove(&address);
    }

    pub fn writes_to(&self, address: u8) -> Vec<Vec<u8>> {
        self.state()
            .writes
            .iter()
            .filter(|(a, _)| *a == address)
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }
}

impl ErrorType for MockI2c {
    type Error = ErrorKind;
}

impl I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state();
        if state.failing.contains(&address) {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    state.writes.push((address, bytes.to_vec()));
                    if let Some((pointer, data)) = bytes.split_first() {
                        state.pointers.insert(address, *pointer);
                        for (offset, value) in data.iter().enumerate() {
                            state
                                .registers
                                .insert((address, pointer.wrapping_add(offset as u8)), *value);
                        }
                    }
                }
                Operation::Read(buf) => {
                    let pointer = state.pointers.get(&address).copied().unwrap_or(0);
                    let scripted = state.scripted.get_mut(&(address, pointer)).and_then(|queue| {
                        if queue.len() > 1 {
                            queue.pop_front()
                        } else {
                            queue.front().cloned()
                        }
                    });

                    match scripted {
                        Some(response) => {
                            for (slot, value) in buf.iter_mut().zip(response.iter()) {
                                *slot = *value;
                            }
                        }
                        None => {
                            for (offset, slot) in buf.iter_mut().enumerate() {
                                *slot = state
                                    .registers
                                    .get(&(address, pointer.wrapping_add(offset as u8)))
                                    .copied()
                                    .unwrap_or(0);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Records every requested delay in nanoseconds instead of sleeping.
#[derive(Clone, Default)]
pub struct RecordingDelay {
    log: Arc<Mutex<Vec<u64>>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls_ms(&self) -> Vec<u64> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|ns| ns / 1_000_000)
            .collect()
    }

    pub fn total_ms(&self) -> u64 {
        self.log.lock().unwrap().iter().sum::<u64>() / 1_000_000
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    fn record(&self, ns: u64) {
        self.log.lock().unwrap().push(ns);
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.record(u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.record(u64::from(us) * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.record(u64::from(ms) * 1_000_000);
    }
}
