// Board support lives behind target_os = "espidf"; the rest builds and tests on the host
#![cfg_attr(not(target_os = "espidf"), allow(dead_code))]

mod battery_task;
mod config;
mod logging;
mod status;
mod system;
mod version;

#[cfg(target_os = "espidf")]
mod hardware;

#[cfg(target_os = "espidf")]
use esp_idf_sys as _; // Binstart

// Generate ESP-IDF app descriptor
#[cfg(target_os = "espidf")]
#[allow(unexpected_cfgs)]
mod app_desc {
    esp_idf_sys::esp_app_desc!();
}

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use battery_core::sampler::VoltageSampler;
    use battery_core::ChargeEstimator;
    use esp_idf_hal::prelude::Peripherals;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;

    use crate::battery_task::BatteryTask;
    use crate::hardware::{EspBatteryAdc, FreeRtosDelay, SystemClock};
    use crate::status::StatusHandle;
    use crate::system::NvsEeprom;

    esp_idf_svc::sys::link_patches();
    logging::init_logger()?;
    log::info!("Referee controller {}", version::version_info());

    let peripherals = Peripherals::take()?;

    system::ensure_nvs_ready();
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let mut device_config = config::load_or_default(&nvs_partition);
    if !logging::set_max_level_from_str(&device_config.log_level) {
        log::warn!("Unknown log level '{}', keeping info", device_config.log_level);
    }

    let mut adc = EspBatteryAdc::new(peripherals.adc1, peripherals.pins.gpio35, peripherals.pins.gpio39)?;

    if device_config.pending_calibration_volts.is_some() {
        let mut sampler = VoltageSampler::new(adc, FreeRtosDelay, &device_config.battery);
        let raw_volts = sampler.sample().raw_volts;
        match device_config.apply_pending_calibration(raw_volts) {
            Ok(Some(factor)) => log::info!("Battery calibration factor now {:.4}", factor),
            Ok(None) => {}
            Err(e) => log::warn!("Calibration skipped: {}", e),
        }
        if let Err(e) = device_config.save(&nvs_partition) {
            log::warn!("Failed to save calibration: {:?}", e);
        }
        adc = sampler.into_inner().0;
    }

    let eeprom = NvsEeprom::new(&nvs_partition, config::CONFIG_NAMESPACE)?;
    let clock = SystemClock::new();
    let estimator = ChargeEstimator::new(device_config.battery, adc, FreeRtosDelay, eeprom, clock);

    let status = StatusHandle::new();
    let reporter_status = status.clone();
    let _reporter = std::thread::Builder::new()
        .name("battery-status".to_string())
        .stack_size(4096)
        .spawn(move || run_status_reporter(reporter_status))?;

    // Never returns
    BatteryTask::new(estimator, status, clock, FreeRtosDelay).run()
}

/// Surfaces the low-battery warning and the periodic coordinator report
#[cfg(target_os = "espidf")]
fn run_status_reporter(status: status::StatusHandle) {
    use esp_idf_hal::delay::FreeRtos;

    const CHECK_INTERVAL_MS: u32 = 1_000;
    const REPORT_EVERY: u32 = 10;

    let mut watch = status::LowBatteryWatch::default();
    let mut ticks: u32 = 0;
    loop {
        let report = status.latest();
        if let Some(message) = watch.observe(&report) {
            log::warn!("{} ({}%, baseline {:.2}V)", message, report.percentage, report.baseline);
        }

        ticks = ticks.wrapping_add(1);
        if ticks % REPORT_EVERY == 0 {
            match report.to_json() {
                Ok(json) => log::info!("Battery report: {}", json),
                Err(e) => log::warn!("Battery report not serializable: {}", e),
            }
        }

        FreeRtos::delay_ms(CHECK_INTERVAL_MS);
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    println!(
        "referee-controller {} runs on ESP-IDF; use `cargo test --workspace` on the host",
        version::version_info()
    );
}
