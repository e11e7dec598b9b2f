// Battery voltage and charger monitor inputs via ADC1

use std::sync::Arc;
use std::time::Instant;

use battery_core::hal::{AdcChannel, AnalogInput, Clock, Delay};
use esp_idf_hal::{
    adc::{
        attenuation::DB_11,
        oneshot::{config::AdcChannelConfig, AdcChannelDriver, AdcDriver},
        ADC1,
    },
    delay::FreeRtos,
    gpio::{Gpio35, Gpio39},
};
use esp_idf_sys::EspError;

type SharedAdc = Arc<AdcDriver<'static, ADC1>>;

/// Both battery inputs share ADC1: the battery divider on GPIO35 and the
/// charger monitor divider on GPIO39.
pub struct EspBatteryAdc {
    battery: AdcChannelDriver<'static, Gpio35, SharedAdc>,
    charge: AdcChannelDriver<'static, Gpio39, SharedAdc>,
}

impl EspBatteryAdc {
    pub fn new(adc1: ADC1, battery_pin: Gpio35, charge_pin: Gpio39) -> Result<Self, EspError> {
        let adc = Arc::new(AdcDriver::new(adc1)?);
        let config = battery_adc_config();

        let battery = AdcChannelDriver::new(adc.clone(), battery_pin, &config)?;
        let charge = AdcChannelDriver::new(adc, charge_pin, &config)?;
        log::info!("Battery ADC ready: GPIO35 battery, GPIO39 charger monitor, 11dB");

        Ok(Self { battery, charge })
    }
}

impl AnalogInput for EspBatteryAdc {
    type Error = EspError;

    fn read_raw(&mut self, channel: AdcChannel) -> Result<u16, Self::Error> {
        match channel {
            AdcChannel::BatteryVoltage => self.battery.read_raw(),
            AdcChannel::ChargeDetect => self.charge.read_raw(),
        }
    }
}

// Full 0-3.3V input range for the divided battery voltage
fn battery_adc_config() -> AdcChannelConfig {
    AdcChannelConfig {
        attenuation: DB_11,
        ..Default::default()
    }
}

/// Blocking delay that yields to FreeRTOS
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeRtosDelay;

impl Delay for FreeRtosDelay {
    fn delay_ms(&mut self, ms: u32) {
        FreeRtos::delay_ms(ms);
    }
}

/// Milliseconds since the clock was created
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
