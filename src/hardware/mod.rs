pub mod battery;

pub use battery::{EspBatteryAdc, FreeRtosDelay, SystemClock};
