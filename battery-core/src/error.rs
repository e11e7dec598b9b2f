use core::fmt::Debug;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("calibration factor must be positive, got {0}")]
    CalibrationFactor(f32),
    #[error("sample count must be at least 1")]
    NoSamples,
    #[error("ADC full scale must be positive, got {0}")]
    AdcMax(f32),
    #[error("charge breakpoints must be strictly increasing: {0:?}")]
    Breakpoints([f32; 4]),
    #[error("baseline range is empty: {min}..={max}")]
    BaselineRange { min: f32, max: f32 },
    #[error("default baseline {0} lies outside the baseline range")]
    DefaultBaseline(f32),
    #[error("animation interval must be non-zero")]
    AnimationInterval,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("raw reading {0}V is not usable for calibration")]
    RawReading(f32),
    #[error("measured voltage {0}V is not usable for calibration")]
    MeasuredVoltage(f32),
}

/// Failure of the non-volatile backend behind the baseline store
#[derive(Error, Debug)]
pub enum StoreError<E: Debug> {
    #[error("storage read failed: {0:?}")]
    Read(E),
    #[error("storage write failed: {0:?}")]
    Write(E),
    #[error("storage commit failed: {0:?}")]
    Commit(E),
    #[error("baseline {0}V is outside the storable range")]
    OutOfRange(f32),
}
