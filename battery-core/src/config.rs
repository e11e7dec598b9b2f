/// Battery estimation constants, serializable so the firmware can keep them in NVS
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatteryConfig {
    // ADC conversion
    pub adc_max: f32,
    pub reference_voltage: f32,
    pub divider_ratio: f32,
    pub sample_count: u8,
    pub sample_delay_ms: u32,
    pub calibration_factor: f32,

    // Charge level thresholds (volts) for 1, 2, 3 and 4 bars
    pub breakpoints: [f32; 4],

    // Charging detection and compensation
    pub charge_detect_threshold: u16,
    pub charging_offset: f32,
    pub full_charge_voltage: f32,
    pub critical_voltage: f32,

    // Persisted baseline
    pub default_baseline: f32,
    pub baseline_min: f32,
    pub baseline_max: f32,
    pub baseline_address: usize,

    // Timing
    pub animation_interval_ms: u32,
    pub poll_interval_ms: u32,
    pub diagnostics_interval_ms: u32,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            adc_max: 4095.0,
            reference_voltage: 3.3,
            divider_ratio: 2.0,
            sample_count: 10,
            sample_delay_ms: 5,
            calibration_factor: 1.08,
            breakpoints: [3.2, 3.5, 3.8, 4.0],
            charge_detect_threshold: 1000,
            charging_offset: 0.2,
            full_charge_voltage: 4.125,
            critical_voltage: 3.1,
            default_baseline: 4.0,
            baseline_min: 2.0,
            baseline_max: 5.0,
            baseline_address: 0,
            animation_interval_ms: 500,
            poll_interval_ms: 100,
            diagnostics_interval_ms: 2000,
        }
    }
}

impl BatteryConfig {
    /// Reject configurations the estimator cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.calibration_factor.is_finite() && self.calibration_factor > 0.0) {
            return Err(ConfigError::CalibrationFactor(self.calibration_factor));
        }
        if self.sample_count == 0 {
            return Err(ConfigError::NoSamples);
        }
        if !(self.adc_max > 0.0) {
            return Err(ConfigError::AdcMax(self.adc_max));
        }
        if self.breakpoints.iter().any(|v| !v.is_finite())
            || self.breakpoints.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(ConfigError::Breakpoints(self.breakpoints));
        }
        if !(self.baseline_min < self.baseline_max) {
            return Err(ConfigError::BaselineRange {
                min: self.baseline_min,
                max: self.baseline_max,
            });
        }
        if !self.baseline_in_range(self.default_baseline) {
            return Err(ConfigError::DefaultBaseline(self.default_baseline));
        }
        if self.animation_interval_ms == 0 {
            return Err(ConfigError::AnimationInterval);
        }
        Ok(())
    }

    /// True when `volts` is a physically sane baseline
    pub fn baseline_in_range(&self, volts: f32) -> bool {
        volts.is_finite() && volts >= self.baseline_min && volts <= self.baseline_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(BatteryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = BatteryConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: BatteryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: BatteryConfig =
            serde_json::from_str(r#"{"calibration_factor": 1.03}"#).unwrap();
        assert_eq!(config.calibration_factor, 1.03);
        assert_eq!(config.breakpoints, [3.2, 3.5, 3.8, 4.0]);
    }

    #[test]
    fn test_rejects_bad_calibration() {
        let mut config = BatteryConfig::default();
        config.calibration_factor = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::CalibrationFactor(_))));

        config.calibration_factor = f32::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::CalibrationFactor(_))));
    }

    #[test]
    fn test_rejects_unordered_breakpoints() {
        let mut config = BatteryConfig::default();
        config.breakpoints = [3.2, 3.8, 3.5, 4.0];
        assert!(matches!(config.validate(), Err(ConfigError::Breakpoints(_))));

        config.breakpoints = [3.2, 3.5, 3.5, 4.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_default_baseline_outside_range() {
        let mut config = BatteryConfig::default();
        config.default_baseline = 5.5;
        assert!(matches!(config.validate(), Err(ConfigError::DefaultBaseline(_))));
    }

    #[test]
    fn test_rejects_zero_samples_and_interval() {
        let mut config = BatteryConfig::default();
        config.sample_count = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NoSamples)));

        let mut config = BatteryConfig::default();
        config.animation_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::AnimationInterval)));
    }

    #[test]
    fn test_baseline_range_bounds() {
        let config = BatteryConfig::default();
        assert!(config.baseline_in_range(2.0));
        assert!(config.baseline_in_range(5.0));
        assert!(!config.baseline_in_range(1.99));
        assert!(!config.baseline_in_range(5.01));
        assert!(!config.baseline_in_range(f32::NAN));
    }
}
