pub mod storage;

#[cfg(target_os = "espidf")]
pub use storage::{ensure_nvs_ready, NvsEeprom};
