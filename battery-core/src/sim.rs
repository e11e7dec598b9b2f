//! In-memory stand-ins for the board: scripted ADC, RAM-backed "EEPROM",
//! manual clock and delays. Used by unit tests and the host test crate.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use thiserror::Error;

use crate::config::BatteryConfig;
use crate::hal::{AdcChannel, AnalogInput, Clock, Delay, NvStorage};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("simulated ADC read failure")]
    AdcRead,
    #[error("access of {len} bytes at {address} is outside a {size} byte device")]
    OutOfBounds { address: usize, len: usize, size: usize },
    #[error("simulated commit failure")]
    Commit,
}

/// ADC count that converts to `volts` after divider and calibration
pub fn counts_for_volts(volts: f32, config: &BatteryConfig) -> u16 {
    let raw_volts = volts / config.calibration_factor;
    let counts = raw_volts / (config.reference_voltage * config.divider_ratio) * config.adc_max;
    counts.round().clamp(0.0, config.adc_max) as u16
}

#[derive(Default)]
struct AdcState {
    battery_script: VecDeque<u16>,
    battery_steady: u16,
    charge_counts: u16,
    fail_battery: bool,
    fail_charge: bool,
}

/// Scripted two-channel ADC; clones share the same state
#[derive(Clone, Default)]
pub struct ScriptedAdc {
    state: Rc<RefCell<AdcState>>,
}

impl ScriptedAdc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one-off battery counts, returned before the steady value
    pub fn with_battery_counts(self, counts: &[u16]) -> Self {
        self.state.borrow_mut().battery_script.extend(counts.iter().copied());
        self
    }

    pub fn set_battery_counts(&self, counts: u16) {
        let mut state = self.state.borrow_mut();
        state.battery_script.clear();
        state.battery_steady = counts;
    }

    pub fn set_battery_volts(&self, volts: f32, config: &BatteryConfig) {
        self.set_battery_counts(counts_for_volts(volts, config));
    }

    pub fn set_charge_counts(&self, counts: u16) {
        self.state.borrow_mut().charge_counts = counts;
    }

    pub fn set_charging(&self, charging: bool, config: &BatteryConfig) {
        let counts = if charging {
            config.charge_detect_threshold.saturating_add(500)
        } else {
            0
        };
        self.set_charge_counts(counts);
    }

    pub fn fail_battery_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_battery = fail;
    }

    pub fn fail_charge_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_charge = fail;
    }
}

impl AnalogInput for ScriptedAdc {
    type Error = SimError;

    fn read_raw(&mut self, channel: AdcChannel) -> Result<u16, Self::Error> {
        let mut state = self.state.borrow_mut();
        match channel {
            AdcChannel::BatteryVoltage => {
                if state.fail_battery {
                    return Err(SimError::AdcRead);
                }
                let steady = state.battery_steady;
                Ok(state.battery_script.pop_front().unwrap_or(steady))
            }
            AdcChannel::ChargeDetect => {
                if state.fail_charge {
                    Err(SimError::AdcRead)
                } else {
                    Ok(state.charge_counts)
                }
            }
        }
    }
}

/// RAM "EEPROM": writes land in a working image, commits copy it to the
/// image that survives [`RamStorage::restarted`].
#[derive(Debug, Clone)]
pub struct RamStorage {
    working: Vec<u8>,
    committed: Vec<u8>,
    fail_commits: bool,
    commit_count: u32,
}

impl RamStorage {
    /// Freshly erased device
    pub fn new(size: usize) -> Self {
        Self {
            working: vec![0xFF; size],
            committed: vec![0xFF; size],
            fail_commits: false,
            commit_count: 0,
        }
    }

    pub fn fail_commits(&mut self, fail: bool) {
        self.fail_commits = fail;
    }

    pub fn commit_count(&self) -> u32 {
        self.commit_count
    }

    /// Power cycle: uncommitted writes are lost
    pub fn restarted(self) -> Self {
        Self {
            working: self.committed.clone(),
            committed: self.committed,
            fail_commits: false,
            commit_count: 0,
        }
    }

    fn check(&self, address: usize, len: usize) -> Result<(), SimError> {
        match address.checked_add(len) {
            Some(end) if end <= self.working.len() => Ok(()),
            _ => Err(SimError::OutOfBounds {
                address,
                len,
                size: self.working.len(),
            }),
        }
    }
}

impl NvStorage for RamStorage {
    type Error = SimError;

    fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.check(address, buf.len())?;
        buf.copy_from_slice(&self.working[address..address + buf.len()]);
        Ok(())
    }

    fn write(&mut self, address: usize, data: &[u8]) -> Result<(), Self::Error> {
        self.check(address, data.len())?;
        self.working[address..address + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        if self.fail_commits {
            return Err(SimError::Commit);
        }
        self.committed.copy_from_slice(&self.working);
        self.commit_count += 1;
        Ok(())
    }
}

/// Clock advanced by hand; clones share the same time
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDelay;

impl Delay for NoopDelay {
    fn delay_ms(&mut self, _ms: u32) {}
}

/// Delay that only records how long it was asked to block
#[derive(Debug, Clone, Copy, Default)]
pub struct CountingDelay {
    pub calls: u32,
    pub total_ms: u64,
}

impl Delay for CountingDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        self.total_ms += ms as u64;
    }
}
