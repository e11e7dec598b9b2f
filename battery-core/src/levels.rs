/// Discrete charge levels ("bars") and their percentage mapping

pub const MAX_BARS: u8 = 4;
pub const PERCENT_PER_BAR: u8 = 25;

/// Number of breakpoints at or below `volts`
pub fn bars(volts: f32, breakpoints: &[f32; 4]) -> u8 {
    breakpoints.iter().filter(|threshold| volts >= **threshold).count() as u8
}

pub fn bars_to_percentage(bars: u8) -> u8 {
    bars.min(MAX_BARS) * PERCENT_PER_BAR
}
