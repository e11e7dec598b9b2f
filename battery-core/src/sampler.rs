// Battery voltage sampling: N averaged ADC reads, converted and calibrated

use heapless::HistoryBuffer;

use crate::config::BatteryConfig;
use crate::hal::{AdcChannel, AnalogInput, Delay};

/// Number of calibrated readings kept for the diagnostics average
pub const ROLLING_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VoltageSample {
    /// Divider-corrected voltage before calibration
    pub raw_volts: f32,
    /// Calibrated battery voltage
    pub volts: f32,
}

impl VoltageSample {
    pub fn is_valid(&self) -> bool {
        self.volts.is_finite() && self.volts > 0.0
    }
}

pub struct VoltageSampler<A, D> {
    adc: A,
    delay: D,
    adc_max: f32,
    reference_voltage: f32,
    divider_ratio: f32,
    sample_count: u8,
    sample_delay_ms: u32,
    calibration_factor: f32,
    charge_detect_threshold: u16,
}

impl<A: AnalogInput, D: Delay> VoltageSampler<A, D> {
    pub fn new(adc: A, delay: D, config: &BatteryConfig) -> Self {
        Self {
            adc,
            delay,
            adc_max: config.adc_max,
            reference_voltage: config.reference_voltage,
            divider_ratio: config.divider_ratio,
            sample_count: config.sample_count,
            sample_delay_ms: config.sample_delay_ms,
            calibration_factor: config.calibration_factor,
            charge_detect_threshold: config.charge_detect_threshold,
        }
    }

    /// Blocks for `sample_count * sample_delay_ms`.
    pub fn sample(&mut self) -> VoltageSample {
        let mut sum: u32 = 0;
        let mut valid: u32 = 0;

        for _ in 0..self.sample_count {
            match self.adc.read_raw(AdcChannel::BatteryVoltage) {
                Ok(count) if count > 0 => {
                    sum += count as u32;
                    valid += 1;
                }
                Ok(_) => {}
                Err(e) => log::warn!("Battery ADC read failed: {:?}", e),
            }
            self.delay.delay_ms(self.sample_delay_ms);
        }

        if valid == 0 {
            return VoltageSample::default();
        }

        let average = sum as f32 / valid as f32;
        let raw_volts = self.counts_to_volts(average);
        VoltageSample {
            raw_volts,
            volts: raw_volts * self.calibration_factor,
        }
    }

    /// Single read of the charger monitor channel against the fixed threshold
    pub fn is_charging(&mut self) -> bool {
        match self.adc.read_raw(AdcChannel::ChargeDetect) {
            Ok(count) => count > self.charge_detect_threshold,
            Err(e) => {
                log::warn!("Charge detect ADC read failed: {:?}", e);
                false
            }
        }
    }

    pub fn calibration_factor(&self) -> f32 {
        self.calibration_factor
    }

    pub fn into_inner(self) -> (A, D) {
        (self.adc, self.delay)
    }

    fn counts_to_volts(&self, counts: f32) -> f32 {
        (counts / self.adc_max) * self.reference_voltage * self.divider_ratio
    }

    #[cfg(test)]
    pub(crate) fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }
}

/// Moving average over the last [`ROLLING_WINDOW`] calibrated readings
pub struct RollingAverage {
    history: HistoryBuffer<f32, ROLLING_WINDOW>,
}

impl RollingAverage {
    pub fn new() -> Self {
        Self {
            history: HistoryBuffer::new(),
        }
    }

    pub fn push(&mut self, volts: f32) {
        self.history.write(volts);
    }

    /// Average of the positive readings; zero when there are none
    pub fn average(&self) -> f32 {
        let (sum, count) = self
            .history
            .as_slice()
            .iter()
            .filter(|v| **v > 0.0)
            .fold((0.0f32, 0u32), |(sum, count), v| (sum + v, count + 1));

        if count > 0 {
            sum / count as f32
        } else {
            0.0
        }
    }
}

impl Default for RollingAverage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{CountingDelay, ScriptedAdc};

    fn counts_for(volts: f32) -> u16 {
        // 3.3V reference, 2:1 divider
        (volts / 6.6 * 4095.0).round() as u16
    }

    #[test]
    fn test_sample_converts_and_calibrates() {
        let mut config = BatteryConfig::default();
        config.calibration_factor = 1.03;
        let adc = ScriptedAdc::new().with_battery_counts(&[2048; 10]);
        let mut sampler = VoltageSampler::new(adc, CountingDelay::default(), &config);

        let sample = sampler.sample();
        let expected_raw = 2048.0 / 4095.0 * 3.3 * 2.0;
        assert!((sample.raw_volts - expected_raw).abs() < 1e-4);
        assert!((sample.volts - expected_raw * 1.03).abs() < 1e-4);
    }

    #[test]
    fn test_sample_averages_reads() {
        let config = BatteryConfig::default();
        let adc = ScriptedAdc::new().with_battery_counts(&[1000, 2000, 1000, 2000, 1000, 2000, 1000, 2000, 1000, 2000]);
        let mut sampler = VoltageSampler::new(adc, CountingDelay::default(), &config);

        let sample = sampler.sample();
        let expected_raw = 1500.0 / 4095.0 * 6.6;
        assert!((sample.raw_volts - expected_raw).abs() < 1e-4);
    }

    #[test]
    fn test_sample_discards_zero_counts() {
        let config = BatteryConfig::default();
        let count = counts_for(3.7);
        let adc = ScriptedAdc::new().with_battery_counts(&[count, 0, count, 0, 0, count, 0, 0, 0, count]);
        let mut sampler = VoltageSampler::new(adc, CountingDelay::default(), &config);

        let sample = sampler.sample();
        let expected_raw = count as f32 / 4095.0 * 6.6;
        assert!((sample.raw_volts - expected_raw).abs() < 1e-4);
    }

    #[test]
    fn test_sample_without_valid_reads_is_zero() {
        let config = BatteryConfig::default();
        let adc = ScriptedAdc::new().with_battery_counts(&[0; 10]);
        let mut sampler = VoltageSampler::new(adc, CountingDelay::default(), &config);

        let sample = sampler.sample();
        assert_eq!(sample, VoltageSample::default());
        assert!(!sample.is_valid());
    }

    #[test]
    fn test_sample_survives_read_errors() {
        let config = BatteryConfig::default();
        let adc = ScriptedAdc::new().with_battery_counts(&[2000; 10]);
        adc.fail_battery_reads(true);
        let mut sampler = VoltageSampler::new(adc, CountingDelay::default(), &config);

        assert_eq!(sampler.sample().volts, 0.0);

        sampler.adc_mut().fail_battery_reads(false);
        assert!(sampler.sample().is_valid());
    }

    #[test]
    fn test_sample_delay_is_bounded() {
        let config = BatteryConfig::default();
        let adc = ScriptedAdc::new().with_battery_counts(&[2000; 10]);
        let delay = CountingDelay::default();
        let mut sampler = VoltageSampler::new(adc, delay, &config);

        sampler.sample();
        assert_eq!(sampler.delay.total_ms, 10 * config.sample_delay_ms as u64);
        assert_eq!(sampler.delay.calls, 10);
    }

    #[test]
    fn test_charge_detect_threshold() {
        let config = BatteryConfig::default();
        let adc = ScriptedAdc::new();
        adc.set_charge_counts(1000);
        let mut sampler = VoltageSampler::new(adc, CountingDelay::default(), &config);
        assert!(!sampler.is_charging());

        sampler.adc_mut().set_charge_counts(1001);
        assert!(sampler.is_charging());
    }

    #[test]
    fn test_charge_detect_error_reads_as_not_charging() {
        let config = BatteryConfig::default();
        let adc = ScriptedAdc::new();
        adc.set_charge_counts(3000);
        adc.fail_charge_reads(true);
        let mut sampler = VoltageSampler::new(adc, CountingDelay::default(), &config);
        assert!(!sampler.is_charging());
    }

    #[test]
    fn test_rolling_average_ignores_non_positive() {
        let mut avg = RollingAverage::new();
        assert_eq!(avg.average(), 0.0);

        avg.push(3.7);
        avg.push(0.0);
        avg.push(3.9);
        assert!((avg.average() - 3.8).abs() < 1e-5);
    }

    #[test]
    fn test_rolling_average_window() {
        let mut avg = RollingAverage::new();
        for _ in 0..ROLLING_WINDOW {
            avg.push(3.0);
        }
        for _ in 0..ROLLING_WINDOW {
            avg.push(4.0);
        }
        assert!((avg.average() - 4.0).abs() < 1e-5);
    }
}
