use anyhow::Result;
use battery_core::calibration::compute_factor;
use battery_core::error::CalibrationError;
use battery_core::BatteryConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_NAMESPACE: &str = "referee";
const CONFIG_KEY: &str = "config";
const MAX_CONFIG_LEN: usize = 2048;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub battery: BatteryConfig,

    /// Multimeter reading of the battery terminals, turned into a
    /// calibration factor at the next boot and then cleared
    pub pending_calibration_volts: Option<f32>,

    pub log_level: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            battery: BatteryConfig::default(),
            pending_calibration_volts: None,
            log_level: "info".to_string(),
        }
    }
}

impl DeviceConfig {
    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Replace battery settings that fail validation with the defaults
    pub fn validated(mut self) -> Self {
        if let Err(e) = self.battery.validate() {
            log::warn!("Stored battery config rejected ({}), using defaults", e);
            self.battery = BatteryConfig::default();
        }
        self
    }

    /// Consume a pending calibration request against an uncalibrated reading.
    ///
    /// Returns the new factor, or `None` when nothing was pending. The request
    /// is cleared either way so a bad reading does not repeat on every boot.
    pub fn apply_pending_calibration(&mut self, raw_volts: f32) -> Result<Option<f32>, CalibrationError> {
        let Some(measured) = self.pending_calibration_volts.take() else {
            return Ok(None);
        };

        let factor = compute_factor(raw_volts, measured)?;
        log::info!(
            "Calibration: raw={:.3}V measured={:.3}V factor {:.4} -> {:.4}",
            raw_volts,
            measured,
            self.battery.calibration_factor,
            factor
        );
        self.battery.calibration_factor = factor;
        Ok(Some(factor))
    }
}

#[cfg(target_os = "espidf")]
mod nvs {
    use super::*;
    use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs};

    impl DeviceConfig {
        pub fn save(&self, partition: &EspDefaultNvsPartition) -> Result<()> {
            let mut nvs = EspNvs::new(partition.clone(), CONFIG_NAMESPACE, true)?;
            nvs.set_blob(CONFIG_KEY, &self.to_json()?)?;
            log::info!("Configuration saved to NVS");
            Ok(())
        }
    }

    pub fn load_or_default(partition: &EspDefaultNvsPartition) -> DeviceConfig {
        match load_from_nvs(partition) {
            Ok(config) => {
                log::info!("Loaded configuration from NVS");
                config.validated()
            }
            Err(e) => {
                log::warn!("Failed to load config from NVS: {:?}, using defaults", e);
                let config = DeviceConfig::default();

                // Try to save default config to NVS for next time
                if let Err(save_err) = config.save(partition) {
                    log::warn!("Failed to save default config to NVS: {:?}", save_err);
                }
                config
            }
        }
    }

    fn load_from_nvs(partition: &EspDefaultNvsPartition) -> Result<DeviceConfig> {
        let nvs = EspNvs::new(partition.clone(), CONFIG_NAMESPACE, true)?;

        let mut buf = vec![0u8; MAX_CONFIG_LEN];
        let data = nvs
            .get_blob(CONFIG_KEY, &mut buf)?
            .ok_or_else(|| anyhow::anyhow!("Config not found in NVS"))?;

        DeviceConfig::from_json(data)
    }
}

#[cfg(target_os = "espidf")]
pub use nvs::load_or_default;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = DeviceConfig::from_json(br#"{"battery":{"calibration_factor":1.02}}"#).unwrap();
        assert_eq!(config.battery.calibration_factor, 1.02);
        assert_eq!(config.battery.breakpoints, [3.2, 3.5, 3.8, 4.0]);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.pending_calibration_volts, None);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = DeviceConfig {
            pending_calibration_volts: Some(3.92),
            log_level: "debug".to_string(),
            ..Default::default()
        };
        let back = DeviceConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(DeviceConfig::from_json(b"\xff\xff\xff\xff").is_err());
    }

    #[test]
    fn test_invalid_battery_settings_fall_back() {
        let mut config = DeviceConfig::default();
        config.battery.breakpoints = [3.8, 3.5, 3.2, 4.0];
        config.log_level = "warn".to_string();

        let config = config.validated();
        assert_eq!(config.battery, BatteryConfig::default());
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_pending_calibration_applied_once() {
        let mut config = DeviceConfig {
            pending_calibration_volts: Some(4.0),
            ..Default::default()
        };

        let factor = config.apply_pending_calibration(3.7).unwrap().unwrap();
        assert!((factor - 4.0 / 3.7).abs() < 1e-6);
        assert_eq!(config.battery.calibration_factor, factor);
        assert_eq!(config.pending_calibration_volts, None);

        assert_eq!(config.apply_pending_calibration(3.5).unwrap(), None);
        assert_eq!(config.battery.calibration_factor, factor);
    }

    #[test]
    fn test_failed_calibration_keeps_factor_and_clears_request() {
        let mut config = DeviceConfig {
            pending_calibration_volts: Some(3.9),
            ..Default::default()
        };

        assert_eq!(
            config.apply_pending_calibration(0.0),
            Err(CalibrationError::RawReading(0.0))
        );
        assert_eq!(config.battery.calibration_factor, 1.08);
        assert_eq!(config.pending_calibration_volts, None);
    }
}
