//! Charge estimator.
//!
//! Turns live voltage samples into a stable 0/25/50/75/100% indicator. The
//! displayed level follows a persisted baseline voltage that may only fall
//! while the device is idle and only rise while it is on the charger, so
//! load and temperature swings of the cell voltage do not make the
//! indicator flicker. While charging, the level climbs in a sawtooth
//! animation until the compensated voltage reaches the full-charge
//! threshold.

use crate::animation::ChargingAnimation;
use crate::baseline::BaselineStore;
use crate::config::BatteryConfig;
use crate::hal::{AnalogInput, Clock, Delay, NvStorage};
use crate::levels::{bars, bars_to_percentage, MAX_BARS};
use crate::report::BatteryReport;
use crate::sampler::{VoltageSample, VoltageSampler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargePhase {
    NotCharging,
    Charging,
    ChargingFull,
}

pub struct ChargeEstimator<A, D, S, C> {
    config: BatteryConfig,
    sampler: VoltageSampler<A, D>,
    store: BaselineStore<S>,
    clock: C,
    // None until the first usable sample
    baseline: Option<f32>,
    was_charging: bool,
    charging_full: bool,
    animation: ChargingAnimation,
    last_sample: VoltageSample,
    last_report: BatteryReport,
}

impl<A, D, S, C> ChargeEstimator<A, D, S, C>
where
    A: AnalogInput,
    D: Delay,
    S: NvStorage,
    C: Clock,
{
    /// `config` is expected to have passed [`BatteryConfig::validate`].
    pub fn new(config: BatteryConfig, adc: A, delay: D, storage: S, clock: C) -> Self {
        let sampler = VoltageSampler::new(adc, delay, &config);
        let store = BaselineStore::new(storage, &config);
        let animation = ChargingAnimation::new(config.animation_interval_ms);

        Self {
            config,
            sampler,
            store,
            clock,
            baseline: None,
            was_charging: false,
            charging_full: false,
            animation,
            last_sample: VoltageSample::default(),
            last_report: BatteryReport::default(),
        }
    }

    /// One iteration of the battery task: sample, update, report
    pub fn poll(&mut self) -> BatteryReport {
        let sample = self.sampler.sample();
        let charging = self.sampler.is_charging();
        self.last_sample = sample;
        self.update(sample.volts, charging)
    }

    /// Apply one calibrated live reading. Samples that are not positive
    /// leave every piece of state untouched.
    pub fn update(&mut self, live: f32, charging: bool) -> BatteryReport {
        if !(live.is_finite() && live > 0.0) {
            log::debug!("Ignoring unusable battery sample {:?}", live);
            return self.last_report;
        }

        let now = self.clock.now_ms();
        let baseline = self.ensure_baseline(live);

        let shown_bars = if charging {
            self.update_charging(live, baseline, now)
        } else {
            self.update_idle(live, baseline)
        };
        self.was_charging = charging;

        let baseline = self.baseline.unwrap_or(baseline);
        let low_battery = !charging && baseline < self.config.critical_voltage;
        if low_battery && !self.last_report.low_battery {
            log::warn!("Battery critically low: baseline {:.3}V", baseline);
        }

        self.last_report = BatteryReport {
            percentage: bars_to_percentage(shown_bars),
            bars: shown_bars,
            low_battery,
            charging,
            charging_full: self.charging_full,
            voltage: live,
            baseline,
        };
        self.last_report
    }

    fn update_charging(&mut self, live: f32, baseline: f32, now: u64) -> u8 {
        let compensated = live - self.config.charging_offset;
        let target = self.clamp_baseline(compensated);

        if !self.was_charging {
            log::info!(
                "Charging started: {:.3}V live, {:.3}V compensated",
                live,
                compensated
            );
            self.charging_full = false;
            self.set_baseline(target);
            self.animation
                .reset(bars(target, &self.config.breakpoints), now);
        } else if target > baseline {
            self.set_baseline(target);
            let new_base = bars(target, &self.config.breakpoints);
            if new_base > self.animation.base_bars() {
                log::debug!("Charge level rose to {} bars", new_base);
                self.animation.reset(new_base, now);
            }
        }

        if compensated >= self.config.full_charge_voltage && !self.charging_full {
            log::info!("Battery full at {:.3}V compensated", compensated);
            self.charging_full = true;
        }

        if self.charging_full {
            MAX_BARS
        } else {
            self.animation.tick(now)
        }
    }

    fn update_idle(&mut self, live: f32, baseline: f32) -> u8 {
        if self.was_charging {
            log::info!("Charging stopped at {:.3}V", live);
            self.charging_full = false;
        }

        // A cell never reads below the baseline floor; such a reading is a glitch
        let baseline = if live < self.config.baseline_min {
            log::debug!("Idle reading {:.3}V below baseline floor, ignored", live);
            baseline
        } else if live < baseline {
            self.set_baseline(live)
        } else {
            baseline
        };

        bars(baseline, &self.config.breakpoints)
    }

    fn ensure_baseline(&mut self, live: f32) -> f32 {
        if let Some(baseline) = self.baseline {
            return baseline;
        }

        let baseline = match self.store.load() {
            Some(stored) => {
                log::info!("Loaded baseline {:.3}V", stored);
                stored
            }
            None => {
                let fallback = if self.config.baseline_in_range(live) {
                    live
                } else {
                    self.config.default_baseline
                };
                log::warn!("No valid stored baseline, starting from {:.3}V", fallback);
                self.persist(fallback);
                fallback
            }
        };

        self.baseline = Some(baseline);
        baseline
    }

    /// Memory and storage always receive the same in-range value
    fn set_baseline(&mut self, volts: f32) -> f32 {
        let volts = self.clamp_baseline(volts);
        self.baseline = Some(volts);
        self.persist(volts);
        volts
    }

    fn clamp_baseline(&self, volts: f32) -> f32 {
        volts.clamp(self.config.baseline_min, self.config.baseline_max)
    }

    fn persist(&mut self, volts: f32) {
        if let Err(e) = self.store.save(volts) {
            log::warn!("Baseline not persisted, keeping it in memory: {}", e);
        }
    }

    /// Last reported percentage, 0 to 100 in steps of 25
    pub fn battery_percentage(&self) -> u8 {
        self.last_report.percentage
    }

    pub fn low_battery(&self) -> bool {
        self.last_report.low_battery
    }

    pub fn last_report(&self) -> BatteryReport {
        self.last_report
    }

    pub fn last_sample(&self) -> VoltageSample {
        self.last_sample
    }

    pub fn baseline(&self) -> Option<f32> {
        self.baseline
    }

    pub fn phase(&self) -> ChargePhase {
        match (self.was_charging, self.charging_full) {
            (false, _) => ChargePhase::NotCharging,
            (true, false) => ChargePhase::Charging,
            (true, true) => ChargePhase::ChargingFull,
        }
    }

    pub fn animation(&self) -> &ChargingAnimation {
        &self.animation
    }

    pub fn config(&self) -> &BatteryConfig {
        &self.config
    }

    pub fn store(&self) -> &BaselineStore<S> {
        &self.store
    }

    /// Hand back the storage, e.g. to simulate a power cycle
    pub fn into_storage(self) -> S {
        self.store.into_storage()
    }
}
