// Charging animation: bars only climb, from the measured level to full, then
// snap back to the measured level

use crate::levels::MAX_BARS;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargingAnimation {
    current_bars: u8,
    base_bars: u8,
    last_tick_ms: u64,
    interval_ms: u64,
}

impl ChargingAnimation {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            current_bars: 0,
            base_bars: 0,
            last_tick_ms: 0,
            interval_ms: interval_ms as u64,
        }
    }

    /// Restart the climb from `base_bars`
    pub fn reset(&mut self, base_bars: u8, now_ms: u64) {
        let base_bars = base_bars.min(MAX_BARS);
        self.base_bars = base_bars;
        self.current_bars = base_bars;
        self.last_tick_ms = now_ms;
    }

    /// Advance at most one step; returns the bars to display
    pub fn tick(&mut self, now_ms: u64) -> u8 {
        if now_ms.saturating_sub(self.last_tick_ms) >= self.interval_ms {
            self.last_tick_ms = now_ms;
            self.current_bars += 1;
            if self.current_bars > MAX_BARS {
                self.current_bars = self.base_bars;
            }
        }
        self.current_bars
    }

    pub fn current_bars(&self) -> u8 {
        self.current_bars
    }

    pub fn base_bars(&self) -> u8 {
        self.base_bars
    }
}
