//! Persistent baseline voltage.
//!
//! The record is the IEEE-754 bit pattern of an `f32`, little-endian, at a
//! fixed address of the non-volatile storage. Anything that does not decode
//! to a value inside the configured baseline range (NaN from erased flash,
//! zero, garbage) loads as `None` and the caller picks a fallback.

use crate::config::BatteryConfig;
use crate::error::StoreError;
use crate::hal::NvStorage;

pub const RECORD_LEN: usize = 4;

pub fn encode(volts: f32) -> [u8; RECORD_LEN] {
    volts.to_bits().to_le_bytes()
}

pub fn decode(record: [u8; RECORD_LEN]) -> f32 {
    f32::from_bits(u32::from_le_bytes(record))
}

pub struct BaselineStore<S> {
    storage: S,
    address: usize,
    min: f32,
    max: f32,
    // Result of the first load, kept so repeated loads agree
    loaded: Option<Option<f32>>,
    last_committed: Option<[u8; RECORD_LEN]>,
}

impl<S: NvStorage> BaselineStore<S> {
    pub fn new(storage: S, config: &BatteryConfig) -> Self {
        Self {
            storage,
            address: config.baseline_address,
            min: config.baseline_min,
            max: config.baseline_max,
            loaded: None,
            last_committed: None,
        }
    }

    fn in_range(&self, volts: f32) -> bool {
        volts.is_finite() && volts >= self.min && volts <= self.max
    }

    /// Stored baseline, or `None` when the record is missing or corrupt
    pub fn load(&mut self) -> Option<f32> {
        if let Some(cached) = self.loaded {
            return cached;
        }

        let mut record = [0u8; RECORD_LEN];
        let value = match self.storage.read(self.address, &mut record) {
            Ok(()) => {
                let volts = decode(record);
                if self.in_range(volts) {
                    self.last_committed = Some(record);
                    Some(volts)
                } else {
                    log::warn!("Stored baseline {:?} is invalid, ignoring it", volts);
                    None
                }
            }
            Err(e) => {
                log::warn!("{}", StoreError::Read(e));
                None
            }
        };

        self.loaded = Some(value);
        value
    }

    /// Write and commit; a no-op when the record is already stored
    pub fn save(&mut self, volts: f32) -> Result<(), StoreError<S::Error>> {
        if !self.in_range(volts) {
            return Err(StoreError::OutOfRange(volts));
        }

        let record = encode(volts);
        if self.last_committed == Some(record) {
            self.loaded = Some(Some(volts));
            return Ok(());
        }

        self.storage
            .write(self.address, &record)
            .map_err(StoreError::Write)?;
        self.storage.commit().map_err(StoreError::Commit)?;

        self.last_committed = Some(record);
        self.loaded = Some(Some(volts));
        log::debug!("Baseline {:.3}V committed", volts);
        Ok(())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}
