//! Battery Core - Hardware-independent charge estimation for the referee controller
//!
//! This crate contains the battery estimation logic that can be tested on the
//! host platform without requiring ESP32 hardware. The firmware plugs its ADC,
//! NVS and clock drivers into the traits in [`hal`].

pub mod animation;
pub mod baseline;
pub mod calibration;
pub mod config;
pub mod error;
pub mod estimator;
pub mod hal;
pub mod levels;
pub mod report;
pub mod sampler;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use config::BatteryConfig;
pub use estimator::ChargeEstimator;
pub use report::BatteryReport;
