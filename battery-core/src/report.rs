/// Per-poll battery summary handed to the display and the coordinator link
use serde::{Deserialize, Serialize};

pub const LOW_BATTERY_MESSAGE: &str = "Low battery";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct BatteryReport {
    /// 0, 25, 50, 75 or 100
    pub percentage: u8,
    pub bars: u8,
    pub low_battery: bool,
    pub charging: bool,
    pub charging_full: bool,
    /// Live calibrated voltage of this poll
    pub voltage: f32,
    pub baseline: f32,
}

impl BatteryReport {
    pub fn warning_message(&self) -> Option<&'static str> {
        self.low_battery.then_some(LOW_BATTERY_MESSAGE)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
