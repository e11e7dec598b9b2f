// Calibration factor from a multimeter reading of the battery terminals

use crate::error::CalibrationError;

/// Factor that maps `raw_volts` onto `measured_volts`
pub fn compute_factor(raw_volts: f32, measured_volts: f32) -> Result<f32, CalibrationError> {
    if !(raw_volts.is_finite() && raw_volts > 0.0) {
        return Err(CalibrationError::RawReading(raw_volts));
    }
    if !(measured_volts.is_finite() && measured_volts > 0.0) {
        return Err(CalibrationError::MeasuredVoltage(measured_volts));
    }
    Ok(measured_volts / raw_volts)
}
