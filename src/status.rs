// Latest battery report, shared between the battery task and its consumers
use std::sync::{Arc, Mutex, MutexGuard};

use battery_core::BatteryReport;

/// Cloneable handle to the most recent [`BatteryReport`].
///
/// The battery task publishes after every poll; the UI and the coordinator
/// link read whenever they need a value. Readers never block on ADC work.
#[derive(Clone, Default)]
pub struct StatusHandle {
    inner: Arc<Mutex<BatteryReport>>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, report: BatteryReport) {
        *self.lock() = report;
    }

    pub fn latest(&self) -> BatteryReport {
        *self.lock()
    }

    pub fn battery_percentage(&self) -> u8 {
        self.lock().percentage
    }

    pub fn low_battery(&self) -> bool {
        self.lock().low_battery
    }

    // A panicking writer cannot leave a half-written Copy report behind
    fn lock(&self) -> MutexGuard<'_, BatteryReport> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Edge detector for the low-battery warning shown to the referee
#[derive(Debug, Default)]
pub struct LowBatteryWatch {
    warned: bool,
}

impl LowBatteryWatch {
    /// The warning text once per low-battery episode, `None` otherwise
    pub fn observe(&mut self, report: &BatteryReport) -> Option<&'static str> {
        let message = report.warning_message();
        let fresh = message.is_some() && !self.warned;
        self.warned = message.is_some();
        if fresh {
            message
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let status = StatusHandle::new();
        assert_eq!(status.battery_percentage(), 0);
        assert!(!status.low_battery());
        assert_eq!(status.latest(), BatteryReport::default());
    }

    #[test]
    fn clones_share_the_report() {
        let writer = StatusHandle::new();
        let reader = writer.clone();

        writer.publish(BatteryReport {
            percentage: 25,
            bars: 1,
            low_battery: true,
            voltage: 3.05,
            baseline: 3.05,
            ..Default::default()
        });

        assert_eq!(reader.battery_percentage(), 25);
        assert!(reader.low_battery());
        assert_eq!(reader.latest().bars, 1);
    }

    #[test]
    fn readable_across_threads() {
        let status = StatusHandle::new();
        let writer = status.clone();

        std::thread::spawn(move || {
            writer.publish(BatteryReport {
                percentage: 100,
                bars: 4,
                charging: true,
                charging_full: true,
                ..Default::default()
            });
        })
        .join()
        .unwrap();

        assert_eq!(status.battery_percentage(), 100);
        assert!(status.latest().charging_full);
    }

    #[test]
    fn low_battery_warning_fires_once_per_episode() {
        let mut watch = LowBatteryWatch::default();
        let ok = BatteryReport { percentage: 50, ..Default::default() };
        let low = BatteryReport { low_battery: true, ..Default::default() };

        assert_eq!(watch.observe(&ok), None);
        assert_eq!(watch.observe(&low), Some("Low battery"));
        assert_eq!(watch.observe(&low), None);
        assert_eq!(watch.observe(&ok), None);
        assert_eq!(watch.observe(&low), Some("Low battery"));
    }
}
