//! Hardware seams between the estimator and the board.
//!
//! The firmware implements these with ESP-IDF drivers; the `sim` module
//! (behind the `sim` feature) has in-memory versions for host tests.

use core::fmt::Debug;

/// Logical ADC inputs used by the battery subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcChannel {
    /// Battery voltage through the resistor divider
    BatteryVoltage,
    /// Charger monitor divider, high while on the charger
    ChargeDetect,
}

pub trait AnalogInput {
    type Error: Debug;

    /// One raw conversion in ADC counts
    fn read_raw(&mut self, channel: AdcChannel) -> Result<u16, Self::Error>;
}

/// Byte-addressable non-volatile memory with an explicit commit
pub trait NvStorage {
    type Error: Debug;

    fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), Self::Error>;
    fn write(&mut self, address: usize, data: &[u8]) -> Result<(), Self::Error>;
    fn commit(&mut self) -> Result<(), Self::Error>;
}

/// Monotonic millisecond clock
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Bounded blocking delay used between ADC reads
pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
