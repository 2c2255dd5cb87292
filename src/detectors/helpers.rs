//! Common helpers for breakout/retracement detection
//!
//! Default thresholds and the range-relative arithmetic shared across detector modules.

use crate::{series::Candle, Direction, OHLCVExt};

// ============================================================
// DEFAULTS
// ============================================================

/// Minimum retracement (percent of prior range) for an event to qualify
pub const DEFAULT_QUALIFYING_THRESHOLD: f64 = 50.0;
/// Percent of prior range a gap open must cover to qualify on its own
pub const DEFAULT_GAP_THRESHOLD: f64 = 50.0;
/// Spacing of the tier ladder
pub const DEFAULT_TIER_STEP: f64 = 25.0;
/// Highest tier of the ladder
pub const DEFAULT_TIER_MAX: f64 = 200.0;

/// Bars after the pattern candle scanned for the target
pub const LOOKAHEAD: usize = 3;
/// Previous + current + look-ahead
pub const MIN_BARS: usize = LOOKAHEAD + 2;

// ============================================================
// HELPER FUNCTIONS
// ============================================================

/// `distance` as a percentage of `range`. `None` for a zero range.
#[inline]
pub fn pct_of_range(distance: f64, range: f64) -> Option<f64> {
    (range > 0.0).then(|| distance / range * 100.0)
}

/// Did `curr` take out `prev` on the breakout side?
#[inline]
pub fn is_breakout(prev: &Candle, curr: &Candle, direction: Direction) -> bool {
    match direction {
        Direction::Up => curr.high > prev.high,
        Direction::Down => curr.low < prev.low,
    }
}

/// Did `curr` open beyond `prev` on the breakout side?
#[inline]
pub fn opened_beyond(prev: &Candle, curr: &Candle, direction: Direction) -> bool {
    match direction {
        Direction::Up => curr.open > prev.high,
        Direction::Down => curr.open < prev.low,
    }
}

/// Opposite extreme of the prior candle: the level a retracement is heading for
#[inline]
pub fn target_level(prev: &Candle, direction: Direction) -> f64 {
    match direction {
        Direction::Up => prev.low,
        Direction::Down => prev.high,
    }
}

/// Does `candle` trade at or through `target`?
#[inline]
pub fn reaches(candle: &Candle, target: f64, direction: Direction) -> bool {
    match direction {
        Direction::Up => candle.low <= target,
        Direction::Down => candle.high >= target,
    }
}

/// Lowest low (Up) / highest high (Down) over `window`; `None` when empty
#[inline]
pub fn window_extreme(window: &[Candle], direction: Direction) -> Option<f64> {
    match direction {
        Direction::Up => window.iter().map(|c| c.low).reduce(f64::min),
        Direction::Down => window.iter().map(|c| c.high).reduce(f64::max),
    }
}

/// Previous candle usable as a denominator
#[inline]
pub fn usable_prev(prev: &Candle) -> bool {
    !prev.is_flat()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(NaiveDateTime::default(), o, h, l, c, 1.0)
    }

    #[test]
    fn test_pct_of_range() {
        assert_eq!(pct_of_range(5.0, 10.0), Some(50.0));
        assert_eq!(pct_of_range(5.0, 0.0), None);
    }

    #[test]
    fn test_breakout_sides() {
        let prev = bar(105.0, 110.0, 100.0, 106.0);
        assert!(is_breakout(&prev, &bar(108.0, 115.0, 103.0, 104.0), Direction::Up));
        assert!(!is_breakout(&prev, &bar(108.0, 110.0, 103.0, 104.0), Direction::Up));
        assert!(is_breakout(&prev, &bar(101.0, 104.0, 99.0, 103.0), Direction::Down));
    }

    #[test]
    fn test_window_extreme() {
        let window = [bar(100.0, 104.0, 98.0, 101.0), bar(101.0, 106.0, 99.0, 105.0)];
        assert_eq!(window_extreme(&window, Direction::Up), Some(98.0));
        assert_eq!(window_extreme(&window, Direction::Down), Some(106.0));
        assert_eq!(window_extreme(&[], Direction::Up), None);
    }

    #[test]
    fn test_targets() {
        let prev = bar(105.0, 110.0, 100.0, 106.0);
        assert_eq!(target_level(&prev, Direction::Up), 100.0);
        assert_eq!(target_level(&prev, Direction::Down), 110.0);
        assert!(reaches(&bar(101.0, 102.0, 100.0, 101.0), 100.0, Direction::Up));
        assert!(!reaches(&bar(101.0, 109.9, 100.0, 101.0), 110.0, Direction::Down));
    }
}
