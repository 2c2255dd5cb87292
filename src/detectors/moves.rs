//! Single-bar absolute-move detector
//!
//! After a breakout of the prior high (Up) the candle's excursion below its own
//! open is measured against the distance from that open to the prior low; the
//! Down side mirrors it. No look-ahead is involved, so every pair `1..=len-2`
//! is examined.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::trace;

use super::helpers::{is_breakout, pct_of_range, usable_prev};
use crate::{series::CandleSeries, Direction};

impl_with_defaults!(MoveDetector);

/// A breakout whose candle then moved back past its own open
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoveEvent {
    pub direction: Direction,
    pub index: usize,
    pub timestamp: NaiveDateTime,
    /// Points moved past the open, against the breakout
    pub move_points: f64,
    /// Points from the open to the prior candle's opposite extreme
    pub target_distance: f64,
    /// `move_points / target_distance * 100`
    pub move_pct: f64,
}

/// Events of one direction plus the pairs skipped for a flat prior candle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveScan {
    pub events: Vec<MoveEvent>,
    pub skipped_flat: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MoveDetector;

impl MoveDetector {
    pub fn scan(&self, series: &CandleSeries, direction: Direction) -> MoveScan {
        let mut scan = MoveScan::default();
        let end = series.len().saturating_sub(1);

        for index in 1..end {
            let prev = &series[index - 1];
            if !usable_prev(prev) {
                scan.skipped_flat += 1;
                continue;
            }
            if let Some(event) = self.detect_at(series, direction, index) {
                scan.events.push(event);
            }
        }
        trace!(
            direction = %direction,
            events = scan.events.len(),
            skipped_flat = scan.skipped_flat,
            "move scan complete"
        );
        scan
    }

    pub fn detect_at(
        &self,
        series: &CandleSeries,
        direction: Direction,
        index: usize,
    ) -> Option<MoveEvent> {
        if index < 1 {
            return None;
        }
        let prev = series.get(index - 1)?;
        let curr = series.get(index)?;
        if !usable_prev(prev) || !is_breakout(prev, curr, direction) {
            return None;
        }

        let (move_points, target_distance) = match direction {
            Direction::Up => (curr.open - curr.low, curr.open - prev.low),
            Direction::Down => (curr.high - curr.open, prev.high - curr.open),
        };
        if move_points <= 0.0 || target_distance <= 0.0 {
            return None;
        }

        Some(MoveEvent {
            direction,
            index,
            timestamp: curr.timestamp,
            move_points,
            target_distance,
            move_pct: pct_of_range(move_points, target_distance)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Candle;
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
                    Candle::new(start + TimeDelta::days(i as i64), o, h, l, c, 1.0)
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_up_move() {
        let s = series(&[
            (105.0, 110.0, 100.0, 106.0),
            (108.0, 115.0, 103.0, 104.0),
            (104.0, 106.0, 102.0, 105.0),
        ]);
        let scan = MoveDetector::with_defaults().scan(&s, Direction::Up);
        assert_eq!(scan.events.len(), 1);
        let e = scan.events[0];
        assert_eq!(e.move_points, 5.0);
        assert_eq!(e.target_distance, 8.0);
        assert!((e.move_pct - 62.5).abs() < 1e-9);
    }

    #[test]
    fn test_down_move() {
        // low 98 < 100; open 101 -> high 106 is 5 past open; prior high 110 is 9 away
        let s = series(&[
            (105.0, 110.0, 100.0, 106.0),
            (101.0, 106.0, 98.0, 105.0),
            (104.0, 106.0, 102.0, 105.0),
        ]);
        let scan = MoveDetector.scan(&s, Direction::Down);
        assert_eq!(scan.events.len(), 1);
        assert!((scan.events[0].move_pct - 500.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_move_past_open() {
        // opens at its low: nothing below the open
        let s = series(&[
            (105.0, 110.0, 100.0, 106.0),
            (103.0, 115.0, 103.0, 114.0),
            (104.0, 106.0, 102.0, 105.0),
        ]);
        assert!(MoveDetector.scan(&s, Direction::Up).events.is_empty());
    }

    #[test]
    fn test_open_below_target_invalid() {
        // opens under the prior low: target distance is negative
        let s = series(&[
            (105.0, 110.0, 100.0, 106.0),
            (99.0, 111.0, 98.0, 110.0),
            (104.0, 106.0, 102.0, 105.0),
        ]);
        assert!(MoveDetector.scan(&s, Direction::Up).events.is_empty());
    }

    #[test]
    fn test_last_pair_not_examined() {
        let s = series(&[(105.0, 110.0, 100.0, 106.0), (108.0, 115.0, 103.0, 104.0)]);
        assert!(MoveDetector.scan(&s, Direction::Up).events.is_empty());
    }

    #[test]
    fn test_flat_prior_counted() {
        let s = series(&[
            (100.0, 100.0, 100.0, 100.0),
            (100.0, 105.0, 99.0, 101.0),
            (104.0, 106.0, 102.0, 105.0),
        ]);
        let scan = MoveDetector.scan(&s, Direction::Up);
        assert!(scan.events.is_empty());
        assert_eq!(scan.skipped_flat, 1);
    }
}
