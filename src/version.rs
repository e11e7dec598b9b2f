// Centralized version information

// Firmware version reported to the coordinator and printed at boot
pub const FIRMWARE_VERSION: &str = "v0.3-rust";

// Cargo package version from Cargo.toml
pub const CARGO_VERSION: &str = env!("CARGO_PKG_VERSION");

// Version info string for logging
pub fn version_info() -> String {
    format!("Firmware: {}, Cargo: {}", FIRMWARE_VERSION, CARGO_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info_mentions_both() {
        let info = version_info();
        assert!(info.contains(FIRMWARE_VERSION));
        assert!(info.contains(CARGO_VERSION));
    }
}
