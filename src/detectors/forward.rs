//! Forward target classification
//!
//! After a breakout/retracement at index `i`, how soon does price reach the prior
//! candle's opposite extreme? The pattern candle itself is checked first, then the
//! next two candles, then the third.

use serde::{Deserialize, Serialize};

use super::{
    helpers::{reaches, target_level, window_extreme, LOOKAHEAD},
    PatternEvent,
};
use crate::{
    series::{Candle, CandleSeries},
    Direction,
};

/// How quickly the target was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetOutcome {
    SameCandle,
    Within2,
    Within3,
    Never,
}

impl TargetOutcome {
    pub const ALL: [TargetOutcome; 4] = [
        TargetOutcome::SameCandle,
        TargetOutcome::Within2,
        TargetOutcome::Within3,
        TargetOutcome::Never,
    ];

    #[inline]
    pub fn reached(self) -> bool {
        !matches!(self, TargetOutcome::Never)
    }
}

/// Classifies events over the fixed three-bar horizon
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardTargetClassifier;

impl ForwardTargetClassifier {
    /// `None` when the event is not backed by `series` or lacks three look-ahead candles
    pub fn classify(&self, series: &CandleSeries, event: &PatternEvent) -> Option<TargetOutcome> {
        let i = event.index;
        if i < 1 || i.checked_add(LOOKAHEAD).map_or(true, |end| end >= series.len()) {
            return None;
        }
        let bars = series.as_slice();
        let prev = &bars[i - 1];
        let curr = &bars[i];
        let direction = event.direction;
        let target = target_level(prev, direction);

        if reaches(curr, target, direction) {
            return Some(TargetOutcome::SameCandle);
        }

        let hit = |window: &[Candle]| {
            window_extreme(window, direction).is_some_and(|extreme| match direction {
                Direction::Up => extreme <= target,
                Direction::Down => extreme >= target,
            })
        };

        let outcome = if hit(&bars[i + 1..=i + 2]) {
            TargetOutcome::Within2
        } else if hit(&bars[i + 1..=i + LOOKAHEAD]) {
            TargetOutcome::Within3
        } else {
            TargetOutcome::Never
        };
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resample::Timeframe;
    use chrono::{NaiveDate, TimeDelta};

    fn series(rows: &[(f64, f64, f64, f64)]) -> CandleSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        CandleSeries::new(
            rows.iter()
                .enumerate()
                .map(|(i, &(o, h, l, c))| {
                    Candle::new(start + TimeDelta::hours(i as i64), o, h, l, c, 1.0)
                })
                .collect(),
        )
        .unwrap()
    }

    fn event(direction: Direction, index: usize) -> PatternEvent {
        PatternEvent {
            timeframe: "1h".parse::<Timeframe>().unwrap(),
            direction,
            index,
            timestamp: chrono::NaiveDateTime::default(),
            is_gap: false,
            retrace_pct: 70.0,
        }
    }

    const PRIOR: (f64, f64, f64, f64) = (105.0, 110.0, 100.0, 106.0);
    const UP_BAR: (f64, f64, f64, f64) = (108.0, 115.0, 103.0, 104.0);
    const HOLD: (f64, f64, f64, f64) = (104.0, 106.0, 102.0, 105.0);

    fn classify(rows: &[(f64, f64, f64, f64)], direction: Direction) -> Option<TargetOutcome> {
        ForwardTargetClassifier.classify(&series(rows), &event(direction, 1))
    }

    #[test]
    fn test_same_candle() {
        let outcome = classify(
            &[PRIOR, (108.0, 115.0, 99.0, 101.0), HOLD, HOLD, HOLD],
            Direction::Up,
        );
        assert_eq!(outcome, Some(TargetOutcome::SameCandle));
    }

    #[test]
    fn test_within_2_first_bar() {
        let outcome = classify(
            &[PRIOR, UP_BAR, (104.0, 106.0, 100.0, 101.0), HOLD, HOLD],
            Direction::Up,
        );
        assert_eq!(outcome, Some(TargetOutcome::Within2));
    }

    #[test]
    fn test_within_2_second_bar() {
        let outcome = classify(
            &[PRIOR, UP_BAR, HOLD, (103.0, 104.0, 99.5, 100.0), HOLD],
            Direction::Up,
        );
        assert_eq!(outcome, Some(TargetOutcome::Within2));
    }

    #[test]
    fn test_within_3() {
        let outcome = classify(
            &[PRIOR, UP_BAR, HOLD, HOLD, (103.0, 104.0, 98.0, 99.0)],
            Direction::Up,
        );
        assert_eq!(outcome, Some(TargetOutcome::Within3));
    }

    #[test]
    fn test_never() {
        let outcome = classify(&[PRIOR, UP_BAR, HOLD, HOLD, HOLD], Direction::Up);
        assert_eq!(outcome, Some(TargetOutcome::Never));
    }

    #[test]
    fn test_fourth_bar_ignored() {
        let outcome = classify(
            &[PRIOR, UP_BAR, HOLD, HOLD, HOLD, (101.0, 102.0, 90.0, 91.0)],
            Direction::Up,
        );
        assert_eq!(outcome, Some(TargetOutcome::Never));
    }

    #[test]
    fn test_down_targets_prior_high() {
        let down_bar = (101.0, 106.0, 98.0, 105.0);
        assert_eq!(
            classify(&[PRIOR, down_bar, (105.0, 110.0, 104.0, 109.0), HOLD, HOLD], Direction::Down),
            Some(TargetOutcome::Within2)
        );
        assert_eq!(
            classify(&[PRIOR, (101.0, 111.0, 98.0, 110.0), HOLD, HOLD, HOLD], Direction::Down),
            Some(TargetOutcome::SameCandle)
        );
        assert_eq!(
            classify(&[PRIOR, down_bar, HOLD, HOLD, HOLD], Direction::Down),
            Some(TargetOutcome::Never)
        );
    }

    #[test]
    fn test_insufficient_lookahead() {
        assert_eq!(classify(&[PRIOR, UP_BAR, HOLD, HOLD], Direction::Up), None);
        let s = series(&[PRIOR, UP_BAR, HOLD, HOLD, HOLD]);
        assert_eq!(ForwardTargetClassifier.classify(&s, &event(Direction::Up, 0)), None);
        assert_eq!(ForwardTargetClassifier.classify(&s, &event(Direction::Up, 2)), None);
        assert_eq!(ForwardTargetClassifier.classify(&s, &event(Direction::Up, usize::MAX)), None);
        assert_eq!(
            ForwardTargetClassifier.classify(&s, &event(Direction::Down, usize::MAX - 1)),
            None
        );
    }

    #[test]
    fn test_reached() {
        assert!(TargetOutcome::Within3.reached());
        assert!(!TargetOutcome::Never.reached());
    }
}
