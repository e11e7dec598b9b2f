// Battery monitoring task
// Polls the charge estimator every poll interval, publishes the report and
// prints a diagnostics line every couple of seconds.

use battery_core::hal::{AnalogInput, Clock, Delay, NvStorage};
use battery_core::sampler::RollingAverage;
use battery_core::{BatteryReport, ChargeEstimator};

use crate::status::StatusHandle;

pub struct BatteryTask<A, D, S, C, K, P> {
    estimator: ChargeEstimator<A, D, S, C>,
    status: StatusHandle,
    clock: K,
    pause: P,
    rolling: RollingAverage,
    last_diagnostics_ms: Option<u64>,
    poll_interval_ms: u32,
    diagnostics_interval_ms: u32,
}

impl<A, D, S, C, K, P> BatteryTask<A, D, S, C, K, P>
where
    A: AnalogInput,
    D: Delay,
    S: NvStorage,
    C: Clock,
    K: Clock,
    P: Delay,
{
    pub fn new(estimator: ChargeEstimator<A, D, S, C>, status: StatusHandle, clock: K, pause: P) -> Self {
        let poll_interval_ms = estimator.config().poll_interval_ms;
        let diagnostics_interval_ms = estimator.config().diagnostics_interval_ms;
        log::info!(
            "Battery task: poll every {}ms, diagnostics every {}ms",
            poll_interval_ms,
            diagnostics_interval_ms
        );

        Self {
            estimator,
            status,
            clock,
            pause,
            rolling: RollingAverage::new(),
            last_diagnostics_ms: None,
            poll_interval_ms,
            diagnostics_interval_ms,
        }
    }

    /// One poll without the trailing pause
    pub fn step(&mut self) -> BatteryReport {
        let report = self.estimator.poll();
        let sample = self.estimator.last_sample();
        if sample.is_valid() {
            self.rolling.push(sample.volts);
        }

        self.status.publish(report);

        let now = self.clock.now_ms();
        let due = match self.last_diagnostics_ms {
            Some(last) => now.saturating_sub(last) >= self.diagnostics_interval_ms as u64,
            None => true,
        };
        if due {
            self.last_diagnostics_ms = Some(now);
            log::info!(
                "Battery: raw={:.3}V calibrated={:.3}V avg={:.3}V baseline={:.3}V {}% {}",
                sample.raw_volts,
                sample.volts,
                self.rolling.average(),
                self.estimator.baseline().unwrap_or(0.0),
                report.percentage,
                phase_label(&report)
            );
        }

        report
    }

    pub fn run(mut self) -> ! {
        loop {
            self.step();
            self.pause.delay_ms(self.poll_interval_ms);
        }
    }

    pub fn rolling_average(&self) -> f32 {
        self.rolling.average()
    }

    pub fn estimator(&self) -> &ChargeEstimator<A, D, S, C> {
        &self.estimator
    }
}

fn phase_label(report: &BatteryReport) -> &'static str {
    match (report.charging, report.charging_full) {
        (true, true) => "charging (full)",
        (true, false) => "charging",
        (false, _) if report.low_battery => "LOW",
        (false, _) => "idle",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battery_core::sim::{CountingDelay, ManualClock, NoopDelay, RamStorage, ScriptedAdc};
    use battery_core::BatteryConfig;

    type SimTask =
        BatteryTask<ScriptedAdc, NoopDelay, RamStorage, ManualClock, ManualClock, CountingDelay>;

    fn task(adc: &ScriptedAdc, clock: &ManualClock, status: &StatusHandle) -> SimTask {
        let estimator = ChargeEstimator::new(
            BatteryConfig::default(),
            adc.clone(),
            NoopDelay,
            RamStorage::new(16),
            clock.clone(),
        );
        BatteryTask::new(estimator, status.clone(), clock.clone(), CountingDelay::default())
    }

    #[test]
    fn step_publishes_report() {
        let config = BatteryConfig::default();
        let adc = ScriptedAdc::new();
        let clock = ManualClock::new(0);
        let status = StatusHandle::new();
        let mut task = task(&adc, &clock, &status);

        adc.set_battery_volts(3.85, &config);
        let report = task.step();

        assert_eq!(report.percentage, 75);
        assert_eq!(status.latest(), report);
        assert_eq!(status.battery_percentage(), 75);
    }

    #[test]
    fn low_battery_reaches_status() {
        let config = BatteryConfig::default();
        let adc = ScriptedAdc::new();
        let clock = ManualClock::new(0);
        let status = StatusHandle::new();
        let mut task = task(&adc, &clock, &status);

        adc.set_battery_volts(3.0, &config);
        task.step();

        assert!(status.low_battery());
        assert_eq!(status.latest().warning_message(), Some("Low battery"));
    }

    #[test]
    fn rolling_average_skips_dead_reads() {
        let config = BatteryConfig::default();
        let adc = ScriptedAdc::new();
        let clock = ManualClock::new(0);
        let status = StatusHandle::new();
        let mut task = task(&adc, &clock, &status);

        adc.set_battery_volts(3.8, &config);
        task.step();
        adc.fail_battery_reads(true);
        task.step();

        assert_eq!(task.estimator().last_sample().volts, 0.0);
        assert!((task.rolling_average() - 3.8).abs() < 0.01);
    }

    #[test_log::test]
    fn diagnostics_follow_interval() {
        let config = BatteryConfig::default();
        let adc = ScriptedAdc::new();
        let clock = ManualClock::new(0);
        let status = StatusHandle::new();
        let mut task = task(&adc, &clock, &status);
        adc.set_battery_volts(3.7, &config);

        task.step();
        assert_eq!(task.last_diagnostics_ms, Some(0));

        clock.advance(1_900);
        task.step();
        assert_eq!(task.last_diagnostics_ms, Some(0));

        clock.advance(100);
        task.step();
        assert_eq!(task.last_diagnostics_ms, Some(2_000));
    }

    #[test]
    fn phase_labels() {
        let mut report = BatteryReport::default();
        assert_eq!(phase_label(&report), "idle");
        report.low_battery = true;
        assert_eq!(phase_label(&report), "LOW");
        report.low_battery = false;
        report.charging = true;
        assert_eq!(phase_label(&report), "charging");
        report.charging_full = true;
        assert_eq!(phase_label(&report), "charging (full)");
    }
}
