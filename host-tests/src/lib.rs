//! Host-based tests for the referee controller battery subsystem
//! These tests run on the development machine, not on the ESP32

use battery_core::sim::{ManualClock, NoopDelay, RamStorage, ScriptedAdc};
use battery_core::{BatteryConfig, BatteryReport, ChargeEstimator};

pub type SimEstimator = ChargeEstimator<ScriptedAdc, NoopDelay, RamStorage, ManualClock>;

/// Simulated board: scripted ADC, RAM "EEPROM" and a clock that advances by
/// one poll interval per poll, like the firmware's battery task.
pub struct Rig {
    pub config: BatteryConfig,
    pub adc: ScriptedAdc,
    pub clock: ManualClock,
    estimator: Option<SimEstimator>,
}

impl Rig {
    pub fn new(config: BatteryConfig) -> Self {
        Self::with_storage(config, RamStorage::new(64))
    }

    pub fn with_storage(config: BatteryConfig, storage: RamStorage) -> Self {
        let adc = ScriptedAdc::new();
        let clock = ManualClock::new(0);
        let estimator = ChargeEstimator::new(
            config.clone(),
            adc.clone(),
            NoopDelay,
            storage,
            clock.clone(),
        );
        Self {
            config,
            adc,
            clock,
            estimator: Some(estimator),
        }
    }

    pub fn estimator(&self) -> &SimEstimator {
        self.estimator.as_ref().expect("estimator present between power cycles")
    }

    /// Wait one poll interval, then run one poll at `volts`
    pub fn poll(&mut self, volts: f32, charging: bool) -> BatteryReport {
        self.adc.set_battery_volts(volts, &self.config);
        self.adc.set_charging(charging, &self.config);
        self.clock.advance(self.config.poll_interval_ms as u64);
        self.estimator
            .as_mut()
            .expect("estimator present between power cycles")
            .poll()
    }

    /// Drop all RAM state; only committed storage survives
    pub fn power_cycle(&mut self) {
        let estimator = self.estimator.take().expect("estimator present between power cycles");
        let storage = estimator.into_storage().restarted();
        log::info!("Simulated power cycle");
        self.estimator = Some(ChargeEstimator::new(
            self.config.clone(),
            self.adc.clone(),
            NoopDelay,
            storage,
            self.clock.clone(),
        ));
    }
}

/// RAM storage holding `record` at address 0, as after a restart
pub fn storage_with_record(record: [u8; 4]) -> RamStorage {
    use battery_core::hal::NvStorage;

    let mut storage = RamStorage::new(64);
    storage.write(0, &record).expect("record fits");
    storage.commit().expect("commit succeeds");
    storage.restarted()
}
